//! # 原生桥接层
//!
//! ## 设计思路
//!
//! 网页端通过命名通道按“方法名 + 参数表”调用原生能力。本模块只做：
//! - 方法分发与参数提取；
//! - 把 `PersistError` 转成结构化的 `BridgeError { code, stage, message }` 返回给调用方。
//!
//! 真正的保存逻辑全部在 [`crate::gallery::PersistImagePipeline`] 中，桥接层保持薄而稳定。
//!
//! ## 支持的方法
//!
//! | 方法 | 参数 | 返回 |
//! |------|------|------|
//! | `downloadImage` | `dataUrl: String` | `true` 或错误 |
//! | `downloadImageUrl` | `dataUrl: String` | `null`，结果只通过状态通知告知 |
//! | `checkStatus` | 无 | `"Native Bridge is ACTIVE"` |

#[cfg(feature = "desktop")]
pub mod tauri_plugin;

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::gallery::{MediaStore, PermissionGate, PersistError, PersistImagePipeline};

/// 网页端使用的通道名。
pub const CHANNEL: &str = "com.example.coop_digital_app/native_bridge";

/// `checkStatus` 的固定回复。
pub const STATUS_REPLY: &str = "Native Bridge is ACTIVE";

pub const METHOD_DOWNLOAD_IMAGE: &str = "downloadImage";
pub const METHOD_DOWNLOAD_IMAGE_URL: &str = "downloadImageUrl";
pub const METHOD_CHECK_STATUS: &str = "checkStatus";

/// 跨边界返回的结构化错误。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BridgeError {
    pub code: &'static str,
    pub stage: &'static str,
    pub message: String,
}

impl BridgeError {
    fn not_implemented(method: &str) -> Self {
        Self {
            code: "NOT_IMPLEMENTED",
            stage: "dispatch",
            message: format!("未实现的方法：{method}"),
        }
    }
}

impl From<PersistError> for BridgeError {
    fn from(error: PersistError) -> Self {
        Self {
            code: error.code(),
            stage: error.stage(),
            message: error.to_string(),
        }
    }
}

impl std::fmt::Display for BridgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for BridgeError {}

/// 从参数表中取出非空的 `dataUrl`。
fn data_url_arg(args: &Map<String, Value>) -> Result<&str, PersistError> {
    match args.get("dataUrl") {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s),
        Some(Value::String(_)) => Err(PersistError::InvalidArgument("dataUrl 为空".to_string())),
        Some(Value::Null) | None => Err(PersistError::InvalidArgument("缺少 dataUrl 参数".to_string())),
        Some(other) => Err(PersistError::InvalidArgument(format!(
            "dataUrl 必须是字符串，实际为：{}",
            json_type_name(other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// 通道方法分发器。
pub struct NativeBridge<G, S> {
    pipeline: Arc<PersistImagePipeline<G, S>>,
}

impl<G, S> Clone for NativeBridge<G, S> {
    fn clone(&self) -> Self {
        Self {
            pipeline: Arc::clone(&self.pipeline),
        }
    }
}

impl<G: PermissionGate, S: MediaStore> NativeBridge<G, S> {
    pub fn new(pipeline: PersistImagePipeline<G, S>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }

    pub fn pipeline(&self) -> &PersistImagePipeline<G, S> {
        &self.pipeline
    }

    /// 保存图片，成功返回 `true`。
    pub async fn download_image(&self, data_url: &str) -> Result<bool, BridgeError> {
        self.pipeline.persist(data_url).await?;
        Ok(true)
    }

    pub fn check_status(&self) -> &'static str {
        STATUS_REPLY
    }

    /// 按方法名分发一次调用。
    pub async fn handle(&self, method: &str, args: &Map<String, Value>) -> Result<Value, BridgeError> {
        log::debug!("🔌 {} <- {}", CHANNEL, method);

        match method {
            METHOD_DOWNLOAD_IMAGE => {
                let data_url = data_url_arg(args)?;
                let saved = self.download_image(data_url).await?;
                Ok(Value::Bool(saved))
            }
            METHOD_DOWNLOAD_IMAGE_URL => {
                match data_url_arg(args) {
                    Ok(data_url) => {
                        // 结果已由管道通过状态通知告知
                        let _ = self.pipeline.persist(data_url).await;
                    }
                    Err(err) => {
                        log::warn!("⚠️ {} 参数无效：{}", METHOD_DOWNLOAD_IMAGE_URL, err);
                        self.pipeline
                            .sink()
                            .notify(&crate::gallery::SaveStatus::failed(err.code(), err.to_string()));
                    }
                }
                Ok(Value::Null)
            }
            METHOD_CHECK_STATUS => Ok(Value::String(self.check_status().to_string())),
            other => {
                log::warn!("⚠️ 收到未实现的方法调用：{}", other);
                Err(BridgeError::not_implemented(other))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    use serde_json::json;

    use super::*;
    use crate::config::GalleryConfig;
    use crate::gallery::{AlwaysGranted, SaveStage, SaveStatus, StagedMediaStore, StatusSink};

    static DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<SaveStatus>>,
    }

    impl StatusSink for RecordingSink {
        fn notify(&self, status: &SaveStatus) {
            self.events.lock().expect("sink lock").push(status.clone());
        }
    }

    fn bridge_in_temp_dir() -> (NativeBridge<AlwaysGranted, StagedMediaStore>, Arc<RecordingSink>) {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock error")
            .as_nanos();
        let seq = DIR_COUNTER.fetch_add(1, Ordering::SeqCst);
        let root = std::env::temp_dir().join(format!("coop-gallery-bridge-test-{nanos}-{seq}"));
        let sink = Arc::new(RecordingSink::default());
        let store = StagedMediaStore::new(&root, "Pictures/Coop", "coop_");
        let pipeline = PersistImagePipeline::new(AlwaysGranted, store, GalleryConfig::default(), sink.clone());
        (NativeBridge::new(pipeline), sink)
    }

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[tokio::test]
    async fn check_status_replies_fixed_string() {
        let (bridge, _) = bridge_in_temp_dir();
        let reply = bridge.handle("checkStatus", &Map::new()).await.expect("status");
        assert_eq!(reply, json!("Native Bridge is ACTIVE"));
    }

    #[tokio::test]
    async fn unknown_method_is_not_implemented() {
        let (bridge, _) = bridge_in_temp_dir();
        let err = bridge.handle("shareImage", &Map::new()).await.expect_err("unknown method");
        assert_eq!(err.code, "NOT_IMPLEMENTED");
    }

    #[tokio::test]
    async fn missing_or_non_string_data_url_is_invalid_argument() {
        let (bridge, _) = bridge_in_temp_dir();

        for payload in [json!({}), json!({ "dataUrl": null }), json!({ "dataUrl": 42 }), json!({ "dataUrl": "" })] {
            let err = bridge
                .handle("downloadImage", &args(payload))
                .await
                .expect_err("invalid argument");
            assert_eq!(err.code, "INVALID_ARGUMENT");
            assert_eq!(err.stage, "argument");
        }
    }

    #[tokio::test]
    async fn decode_failure_maps_to_decode_error_code() {
        let (bridge, _) = bridge_in_temp_dir();
        let err = bridge
            .handle("downloadImage", &args(json!({ "dataUrl": "data:image/png;base64,###notbase64###" })))
            .await
            .expect_err("decode failure");
        assert_eq!(err.code, "DECODE_ERROR");
    }

    #[tokio::test]
    async fn download_image_url_returns_null_and_reports_via_sink() {
        let (bridge, sink) = bridge_in_temp_dir();
        let reply = bridge
            .handle("downloadImageUrl", &args(json!({ "dataUrl": "###" })))
            .await
            .expect("fire and forget");
        assert_eq!(reply, Value::Null);

        let events = sink.events.lock().expect("sink lock");
        let last = events.last().expect("at least one status");
        assert_eq!(last.stage, SaveStage::Failed);
        assert_eq!(last.error_code, Some("DECODE_ERROR"));
    }
}

//! # Tauri 插件形态
//!
//! ## 设计思路
//!
//! 桌面端以插件形式挂到宿主应用上，前端通过 IPC 调用：
//! - `plugin:coop-bridge|download_image`：保存图片，返回 `true` 或结构化错误；
//! - `plugin:coop-bridge|check_status`：连通性探测；
//! - `plugin:coop-bridge|invoke`：按通道方法名通用分发。
//!
//! 授权提示使用系统对话框（宿主需同时注册 `tauri_plugin_dialog`），
//! 保存进度以 `gallery-save-status` 事件推送给前端。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{Map, Value};
use tauri::plugin::{Builder, TauriPlugin};
use tauri::{AppHandle, Emitter, Manager, Runtime, State};
use tauri_plugin_dialog::{DialogExt, MessageDialogButtons, MessageDialogKind};

use super::{BridgeError, NativeBridge};
use crate::config::load_config_from_path;
use crate::gallery::{
    AuthorizationPrompt, BoxFuture, PermissionState, PlatformGate, PlatformStore, SaveStatus, StatusSink,
    build_pipeline,
};

/// 前端监听的保存进度事件。
pub const SAVE_STATUS_EVENT: &str = "gallery-save-status";

const CONFIG_FILE_NAME: &str = "gallery.json";

/// 插件托管状态。
pub struct BridgeState {
    bridge: NativeBridge<PlatformGate, PlatformStore>,
}

/// 以前端事件推送保存进度。
struct EventStatusSink<R: Runtime> {
    app: AppHandle<R>,
}

impl<R: Runtime> StatusSink for EventStatusSink<R> {
    fn notify(&self, status: &SaveStatus) {
        if let Err(err) = self.app.emit(SAVE_STATUS_EVENT, status) {
            log::warn!("推送保存进度事件失败: {err}");
        }
    }
}

/// 系统对话框授权提示。同意一次后在本进程内保持已授权。
struct DialogPrompt<R: Runtime> {
    app: AppHandle<R>,
    granted: AtomicBool,
}

impl<R: Runtime> AuthorizationPrompt for DialogPrompt<R> {
    fn status(&self) -> PermissionState {
        if self.granted.load(Ordering::SeqCst) {
            PermissionState::Granted
        } else {
            PermissionState::Unknown
        }
    }

    fn request(&self) -> BoxFuture<'_, bool> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.app
            .dialog()
            .message("需要访问相册以保存图片，是否允许？")
            .title("相册访问权限")
            .kind(MessageDialogKind::Info)
            .buttons(MessageDialogButtons::OkCancel)
            .show(move |answer| {
                let _ = tx.send(answer);
            });

        Box::pin(async move {
            let answer = rx.await.unwrap_or(false);
            if answer {
                self.granted.store(true, Ordering::SeqCst);
            }
            answer
        })
    }
}

/// 保存图片。
#[tauri::command]
async fn download_image(state: State<'_, BridgeState>, data_url: Option<String>) -> Result<bool, BridgeError> {
    state.bridge.download_image(data_url.as_deref().unwrap_or_default()).await
}

#[tauri::command]
fn check_status(state: State<'_, BridgeState>) -> &'static str {
    state.bridge.check_status()
}

/// 按通道方法名分发。
#[tauri::command]
async fn invoke(
    state: State<'_, BridgeState>,
    method: String,
    args: Option<Map<String, Value>>,
) -> Result<Value, BridgeError> {
    state.bridge.handle(&method, &args.unwrap_or_default()).await
}

/// 构建插件。
pub fn init<R: Runtime>() -> TauriPlugin<R> {
    Builder::new("coop-bridge")
        .invoke_handler(tauri::generate_handler![download_image, check_status, invoke])
        .setup(|app, _api| {
            let config = match app.path().app_config_dir() {
                Ok(dir) => load_config_from_path(&dir.join(CONFIG_FILE_NAME)),
                Err(err) => {
                    log::warn!("⚠️ 无法定位配置目录，使用默认配置: {err}");
                    Default::default()
                }
            };

            let prompt = Arc::new(DialogPrompt {
                app: app.clone(),
                granted: AtomicBool::new(false),
            });
            let sink = Arc::new(EventStatusSink { app: app.clone() });

            match build_pipeline(config, prompt, sink) {
                Ok(pipeline) => {
                    app.manage(BridgeState {
                        bridge: NativeBridge::new(pipeline),
                    });
                    log::info!("setup: coop-bridge state managed");
                }
                Err(err) => {
                    log::error!("setup: 相册保存初始化失败，保存功能不可用: {err}");
                }
            }
            Ok(())
        })
        .build()
}

//! # 保存进度通知
//!
//! 对应移动端的 Toast 提示：每个阶段向外部发一条简短状态，发完即忘，
//! 不影响保存结果。默认实现只写日志；Tauri 侧可替换为前端事件。

use serde::Serialize;

/// 保存链路阶段。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveStage {
    Received,
    AwaitingPermission,
    Decoding,
    Saving,
    Completed,
    Failed,
}

/// 一条状态通知。
#[derive(Debug, Clone, Serialize)]
pub struct SaveStatus {
    pub stage: SaveStage,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
}

impl SaveStatus {
    pub fn new(stage: SaveStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            error_code: None,
        }
    }

    pub fn failed(error_code: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage: SaveStage::Failed,
            message: message.into(),
            error_code: Some(error_code),
        }
    }
}

/// 状态通知出口。
pub trait StatusSink: Send + Sync {
    fn notify(&self, status: &SaveStatus);
}

/// 仅记录日志的通知出口。
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStatusSink;

impl StatusSink for LogStatusSink {
    fn notify(&self, status: &SaveStatus) {
        match status.stage {
            SaveStage::Failed => log::warn!(
                "📣 [{:?}] {} ({})",
                status.stage,
                status.message,
                status.error_code.unwrap_or("-")
            ),
            _ => log::info!("📣 [{:?}] {}", status.stage, status.message),
        }
    }
}

//! # 权限闸门
//!
//! ## 设计思路
//!
//! 两种平台授权模型统一为 `PermissionGate::ensure_authorized`：
//! - 默认即有写权限的平台（应用私有/作用域存储）：`AlwaysGranted`，从不弹窗。
//! - 需要运行时授权的平台：`RuntimePermissionGate`，先同步查询状态，
//!   未授权则发起一次请求并挂起等待用户答复。
//!
//! 弹窗本身由外部的 `AuthorizationPrompt` 提供（Tauri 对话框、终端确认、测试桩等），
//! 闸门只负责“查询 → 至多请求一次 → 给出结论”。
//! 被拒绝时不自动重试，重试由调用方重新发起。

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::status::{SaveStage, SaveStatus, StatusSink};

/// 动态分发用的 boxed future。
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 授权状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Unknown,
    Granted,
    Denied,
}

/// 外部授权服务：查询当前状态，或弹出系统授权提示。
pub trait AuthorizationPrompt: Send + Sync {
    /// 同步查询当前授权状态。
    fn status(&self) -> PermissionState;

    /// 请求授权，用户答复后返回是否同意。
    fn request(&self) -> BoxFuture<'_, bool>;
}

/// 保存链路使用的权限闸门。
pub trait PermissionGate: Send + Sync + 'static {
    /// 确认当前是否可以写入媒体库；必要时请求授权并等待。
    fn ensure_authorized(&self) -> impl Future<Output = PermissionState> + Send;
}

/// 默认已授权的平台。
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysGranted;

impl PermissionGate for AlwaysGranted {
    fn ensure_authorized(&self) -> impl Future<Output = PermissionState> + Send {
        std::future::ready(PermissionState::Granted)
    }
}

/// 运行时授权模型。
pub struct RuntimePermissionGate {
    prompt: Arc<dyn AuthorizationPrompt>,
    sink: Arc<dyn StatusSink>,
}

impl RuntimePermissionGate {
    pub fn new(prompt: Arc<dyn AuthorizationPrompt>, sink: Arc<dyn StatusSink>) -> Self {
        Self { prompt, sink }
    }
}

impl PermissionGate for RuntimePermissionGate {
    fn ensure_authorized(&self) -> impl Future<Output = PermissionState> + Send {
        async move {
            let current = self.prompt.status();
            if current == PermissionState::Granted {
                return PermissionState::Granted;
            }

            log::warn!("🔒 媒体库未授权（当前：{:?}），发起授权请求", current);
            self.sink.notify(&SaveStatus::new(SaveStage::AwaitingPermission, "需要相册访问权限"));

            if self.prompt.request().await {
                log::info!("🔓 用户已授予媒体库权限");
                self.sink.notify(&SaveStatus::new(SaveStage::AwaitingPermission, "已获得相册访问权限"));
                PermissionState::Granted
            } else {
                log::warn!("🔒 用户拒绝了媒体库权限");
                self.sink.notify(&SaveStatus::new(SaveStage::AwaitingPermission, "未获得相册访问权限"));
                PermissionState::Denied
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gallery::status::LogStatusSink;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedPrompt {
        status: PermissionState,
        answer: bool,
        requests: AtomicUsize,
    }

    impl ScriptedPrompt {
        fn new(status: PermissionState, answer: bool) -> Arc<Self> {
            Arc::new(Self {
                status,
                answer,
                requests: AtomicUsize::new(0),
            })
        }
    }

    impl AuthorizationPrompt for ScriptedPrompt {
        fn status(&self) -> PermissionState {
            self.status
        }

        fn request(&self) -> BoxFuture<'_, bool> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                tokio::task::yield_now().await;
                self.answer
            })
        }
    }

    fn gate_for(prompt: Arc<ScriptedPrompt>) -> RuntimePermissionGate {
        RuntimePermissionGate::new(prompt, Arc::new(LogStatusSink))
    }

    #[tokio::test]
    async fn always_granted_never_prompts() {
        assert_eq!(AlwaysGranted.ensure_authorized().await, PermissionState::Granted);
    }

    #[tokio::test]
    async fn granted_status_skips_request() {
        let prompt = ScriptedPrompt::new(PermissionState::Granted, false);
        let state = gate_for(Arc::clone(&prompt)).ensure_authorized().await;

        assert_eq!(state, PermissionState::Granted);
        assert_eq!(prompt.requests.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_status_requests_once_and_follows_answer() {
        let prompt = ScriptedPrompt::new(PermissionState::Unknown, true);
        let state = gate_for(Arc::clone(&prompt)).ensure_authorized().await;

        assert_eq!(state, PermissionState::Granted);
        assert_eq!(prompt.requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn denial_is_reported_without_retry() {
        let prompt = ScriptedPrompt::new(PermissionState::Denied, false);
        let state = gate_for(Arc::clone(&prompt)).ensure_authorized().await;

        assert_eq!(state, PermissionState::Denied);
        assert_eq!(prompt.requests.load(Ordering::SeqCst), 1);
    }
}

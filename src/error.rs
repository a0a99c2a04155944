//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 保存链路内部使用 `PersistError`（五类结构化失败），
//! 链路之外的配置、存储目录、I/O 等问题统一收敛到 `AppError`。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 为 `PersistError` / `BridgeError` / `std::io::Error` 提供 `From` 转换，无需手动 map。
//! - 实现 `Serialize` 将错误序列化为字符串，满足 IPC 返回要求。

use serde::Serialize;

use crate::bridge::BridgeError;
use crate::gallery::PersistError;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 配置非法或读写失败
    #[error("配置错误: {0}")]
    Config(String),

    /// 图片保存链路错误
    #[error("{0}")]
    Persist(#[from] PersistError),

    /// 桥接调用返回的结构化错误
    #[error("{0}")]
    Bridge(#[from] BridgeError),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 共享媒体目录不可用
    #[error("存储目录不可用: {0}")]
    Storage(String),
}

/// 将错误序列化为人类可读的字符串。
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 保存链路只有五类失败：参数、权限、解码、存储分配、写入。
//! 使用单一枚举承载，调用侧可按分支匹配，桥接层再转成 `(code, message)`。

/// 图片保存链路统一错误类型。
///
/// 每个分支都携带可读消息；`code()` / `stage()` 供桥接层输出结构化错误。
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("参数错误：{0}")]
    InvalidArgument(String),

    #[error("权限不足：{0}")]
    PermissionDenied(String),

    #[error("解码错误：{0}")]
    DecodeFailure(String),

    #[error("存储分配失败：{0}")]
    StorageAllocationFailure(String),

    #[error("写入失败：{0}")]
    WriteFailure(String),
}

impl PersistError {
    /// 稳定错误码，与移动端原生桥保持一致。
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::PermissionDenied(_) => "PERMISSION_DENIED",
            Self::DecodeFailure(_) => "DECODE_ERROR",
            Self::StorageAllocationFailure(_) => "STORAGE_ALLOCATION_FAILED",
            Self::WriteFailure(_) => "SAVE_FAILED",
        }
    }

    /// 出错所在阶段，用于日志与前端诊断。
    pub fn stage(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "argument",
            Self::PermissionDenied(_) => "permission",
            Self::DecodeFailure(_) => "decode",
            Self::StorageAllocationFailure(_) => "allocate",
            Self::WriteFailure(_) => "write",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_stages_are_stable() {
        let cases = [
            (PersistError::InvalidArgument("x".into()), "INVALID_ARGUMENT", "argument"),
            (PersistError::PermissionDenied("x".into()), "PERMISSION_DENIED", "permission"),
            (PersistError::DecodeFailure("x".into()), "DECODE_ERROR", "decode"),
            (PersistError::StorageAllocationFailure("x".into()), "STORAGE_ALLOCATION_FAILED", "allocate"),
            (PersistError::WriteFailure("x".into()), "SAVE_FAILED", "write"),
        ];

        for (error, code, stage) in cases {
            assert_eq!(error.code(), code);
            assert_eq!(error.stage(), stage);
        }
    }

    #[test]
    fn message_keeps_detail() {
        let error = PersistError::WriteFailure("磁盘已满".into());
        assert!(error.to_string().contains("磁盘已满"));
    }
}

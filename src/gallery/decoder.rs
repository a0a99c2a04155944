//! # Base64 载荷解码
//!
//! 标准字母表、带填充。载荷中的换行/空白会被忽略（与移动端 `Base64.DEFAULT` 行为一致）。
//! 解码前先按长度估算体积上限，超限直接拒绝，避免无谓的大块内存分配。

use std::borrow::Cow;

use base64::{Engine as _, engine::general_purpose};

use super::PersistError;

/// 将 base64 文本解码为原始字节。要么整体成功，要么整体失败。
pub fn decode_payload(payload: &str, max_payload_bytes: u64) -> Result<Vec<u8>, PersistError> {
    let normalized = strip_ascii_whitespace(payload);

    let estimated = estimate_decoded_upper_bound_len(&normalized)?;
    if estimated > max_payload_bytes {
        return Err(PersistError::DecodeFailure(format!(
            "Base64 预计解码体积过大：{:.2} MB（限制：{:.2} MB）",
            estimated as f64 / 1024.0 / 1024.0,
            max_payload_bytes as f64 / 1024.0 / 1024.0
        )));
    }

    general_purpose::STANDARD
        .decode(normalized.as_bytes())
        .map_err(|e| PersistError::DecodeFailure(format!("Base64 解码失败：{}", e)))
}

fn strip_ascii_whitespace(payload: &str) -> Cow<'_, str> {
    if payload.bytes().any(|b| b.is_ascii_whitespace()) {
        Cow::Owned(payload.chars().filter(|c| !c.is_ascii_whitespace()).collect())
    } else {
        Cow::Borrowed(payload)
    }
}

fn estimate_decoded_upper_bound_len(payload: &str) -> Result<u64, PersistError> {
    let groups = (payload.len() as u64)
        .checked_add(3)
        .ok_or_else(|| PersistError::DecodeFailure("Base64 输入长度溢出".to_string()))?
        / 4;

    groups
        .checked_mul(3)
        .ok_or_else(|| PersistError::DecodeFailure("Base64 解码体积估算溢出".to_string()))
}

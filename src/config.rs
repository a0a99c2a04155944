//! # 配置模块
//!
//! ## 设计思路
//!
//! 将相册位置、文件命名与解码资源上限集中到 `GalleryConfig`，
//! 以 JSON 持久化；配置文件缺失或损坏时回退默认值，保证保存功能始终可用。

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// 图片保存配置。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GalleryConfig {
    /// 共享媒体根目录；为空时使用用户主目录。
    pub media_root: Option<String>,
    /// 相册逻辑目录（相对媒体根目录）。
    pub relative_path: String,
    /// 文件名前缀。
    pub file_prefix: String,
    /// Base64 载荷解码后允许的最大体积（字节）。
    pub max_payload_bytes: u64,
    /// 解码后的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 解码阶段允许的预计内存上限（按 RGBA 估算，字节）。
    pub max_decoded_bytes: u64,
    /// 宽/高单边最大值。
    pub max_dimension: u32,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            media_root: None,
            relative_path: "Pictures/Coop".to_string(),
            file_prefix: "coop_".to_string(),
            max_payload_bytes: 50 * 1024 * 1024,
            max_decoded_pixels: 40_000_000,
            max_decoded_bytes: 160 * 1024 * 1024,
            max_dimension: 16_384,
        }
    }
}

impl GalleryConfig {
    /// 校验配置取值范围。
    pub fn validate(&self) -> Result<(), AppError> {
        let relative = self.relative_path.trim_matches('/');
        if relative.is_empty() {
            return Err(AppError::Config("relative_path 不能为空".to_string()));
        }
        if self.relative_path.starts_with('/') || relative.split('/').any(|s| s == "..") {
            return Err(AppError::Config(format!(
                "relative_path 必须是媒体根目录下的相对路径：{}",
                self.relative_path
            )));
        }
        if self.file_prefix.is_empty() || self.file_prefix.contains(['/', '\\']) {
            return Err(AppError::Config(format!("file_prefix 非法：{:?}", self.file_prefix)));
        }
        if !(1024..=512 * 1024 * 1024).contains(&self.max_payload_bytes) {
            return Err(AppError::Config("max_payload_bytes 必须在 1KB~512MB 之间".to_string()));
        }
        if self.max_decoded_pixels == 0 {
            return Err(AppError::Config("max_decoded_pixels 不能为 0".to_string()));
        }
        if self.max_decoded_bytes < 8 * 1024 * 1024 {
            return Err(AppError::Config("max_decoded_bytes 不能小于 8MB".to_string()));
        }
        if !(1..=65_535).contains(&self.max_dimension) {
            return Err(AppError::Config("max_dimension 必须在 1~65535 之间".to_string()));
        }
        Ok(())
    }

    /// 解析共享媒体根目录。
    pub fn resolve_media_root(&self) -> Result<PathBuf, AppError> {
        if let Some(root) = self.media_root.as_deref() {
            if !root.is_empty() {
                return Ok(PathBuf::from(root));
            }
        }

        dirs::home_dir().ok_or_else(|| AppError::Storage("无法确定用户主目录".to_string()))
    }
}

/// 从文件加载配置；文件缺失或内容无法解析时回退默认值。
pub fn load_config_from_path(config_path: &Path) -> GalleryConfig {
    if config_path.exists() {
        match fs::read_to_string(config_path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => return config,
                Err(err) => log::warn!("⚠️ 配置文件解析失败，使用默认配置：{}", err),
            },
            Err(err) => log::warn!("⚠️ 配置文件读取失败，使用默认配置：{}", err),
        }
    }
    GalleryConfig::default()
}

/// 将配置写入文件（格式化 JSON）。
pub fn save_config_to_path(config_path: &Path, config: &GalleryConfig) -> Result<(), AppError> {
    config.validate()?;

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::Config(format!("创建配置目录失败: {}", e)))?;
    }

    let content = serde_json::to_string_pretty(config)
        .map_err(|e| AppError::Config(format!("序列化配置失败: {}", e)))?;
    fs::write(config_path, content)
        .map_err(|e| AppError::Config(format!("写入配置文件失败: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    fn unique_temp_dir() -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock error")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("coop-gallery-config-test-{nanos}"));
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[test]
    fn save_and_load_config_roundtrip() {
        let dir = unique_temp_dir();
        let config_path = dir.join("gallery.json");

        let mut config = GalleryConfig::default();
        config.media_root = Some("/sdcard".to_string());
        config.relative_path = "DCIM/Coop".to_string();

        save_config_to_path(&config_path, &config).expect("save config");
        assert_eq!(load_config_from_path(&config_path), config);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn load_bad_config_falls_back_to_default() {
        let dir = unique_temp_dir();
        let config_path = dir.join("gallery.json");
        fs::write(&config_path, "not-json").expect("write invalid config");

        assert_eq!(load_config_from_path(&config_path), GalleryConfig::default());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn partial_config_keeps_defaults_for_missing_fields() {
        let dir = unique_temp_dir();
        let config_path = dir.join("gallery.json");
        fs::write(&config_path, r#"{"file_prefix":"shot_"}"#).expect("write partial config");

        let loaded = load_config_from_path(&config_path);
        assert_eq!(loaded.file_prefix, "shot_");
        assert_eq!(loaded.relative_path, "Pictures/Coop");

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn validate_rejects_escaping_relative_path() {
        let mut config = GalleryConfig::default();
        config.relative_path = "Pictures/../../etc".to_string();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        config.relative_path = "/abs".to_string();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn validate_rejects_tiny_decode_budget() {
        let mut config = GalleryConfig::default();
        config.max_decoded_bytes = 1024;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn explicit_media_root_wins() {
        let mut config = GalleryConfig::default();
        config.media_root = Some("/data/media".to_string());
        assert_eq!(config.resolve_media_root().expect("root"), PathBuf::from("/data/media"));
    }
}

//! # 平台装配
//!
//! 按编译目标选择媒体库实现与权限模型：
//! - Apple 平台：相册一次性提交，写入前需要运行时授权。
//! - 其他平台：pending 文件分阶段可见，应用默认即有写权限。

use std::sync::Arc;

use super::media_store::MediaStore;
use super::permission::AuthorizationPrompt;
use super::pipeline::PersistImagePipeline;
use super::status::StatusSink;
use crate::config::GalleryConfig;
use crate::error::AppError;

#[cfg(any(target_os = "ios", target_os = "macos"))]
pub type PlatformStore = super::photo_library::PhotoLibraryStore;
#[cfg(any(target_os = "ios", target_os = "macos"))]
pub type PlatformGate = super::permission::RuntimePermissionGate;

#[cfg(not(any(target_os = "ios", target_os = "macos")))]
pub type PlatformStore = super::staged_store::StagedMediaStore;
#[cfg(not(any(target_os = "ios", target_os = "macos")))]
pub type PlatformGate = super::permission::AlwaysGranted;

/// 当前平台的保存管道。
pub type PlatformPipeline = PersistImagePipeline<PlatformGate, PlatformStore>;

/// 校验配置并组装当前平台的保存管道。
///
/// `prompt` 只在需要运行时授权的平台上使用。
pub fn build_pipeline(
    config: GalleryConfig,
    prompt: Arc<dyn AuthorizationPrompt>,
    sink: Arc<dyn StatusSink>,
) -> Result<PlatformPipeline, AppError> {
    config.validate()?;
    let media_root = config.resolve_media_root()?;
    let store = PlatformStore::new(&media_root, &config.relative_path, &config.file_prefix);

    #[cfg(any(target_os = "ios", target_os = "macos"))]
    let gate = PlatformGate::new(prompt, Arc::clone(&sink));
    #[cfg(not(any(target_os = "ios", target_os = "macos")))]
    let gate = {
        drop(prompt);
        PlatformGate::default()
    };

    log::info!(
        "🖼️ 相册保存管道就绪：{}（pending 支持：{}）",
        store.album_dir().display(),
        store.supports_pending()
    );

    Ok(PersistImagePipeline::new(gate, store, config, sink))
}

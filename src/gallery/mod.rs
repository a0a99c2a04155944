//! # 相册保存模块
//!
//! ## 设计思路
//!
//! 把“网页传来的 Data URL 图片 → 设备相册中的 PNG 文件”拆成若干可独立测试的阶段：
//!
//! | 子模块 | 职责 |
//! |--------|------|
//! | [`data_url`] | 拆分 `data:<mime>;base64,<payload>` |
//! | [`decoder`] | 标准 Base64 解码（含体积上限） |
//! | [`validator`] | 签名嗅探 + 尺寸/内存上限 + 完整解码 |
//! | [`media_store`] | 媒体库条目生命周期与统一写入流程 |
//! | [`staged_store`] | 分阶段可见（pending 文件）的媒体库实现 |
//! | [`photo_library`] | 一次性提交的相册实现 |
//! | [`permission`] | 权限闸门 |
//! | [`status`] | 保存进度通知 |
//! | [`pipeline`] | 串联以上各阶段 |
//! | [`platform`] | 按目标平台选择媒体库与权限模型 |
//!
//! ## 实现思路
//!
//! 常用类型在本模块根部统一导出，调用方无需关心子模块划分。

pub mod data_url;
pub mod decoder;
pub mod error;
pub mod media_store;
pub mod permission;
pub mod photo_library;
pub mod pipeline;
pub mod platform;
pub mod staged_store;
pub mod status;
pub mod validator;

pub use data_url::DataUrl;
pub use decoder::decode_payload;
pub use error::PersistError;
pub use media_store::{DisplayNameGenerator, MediaEntry, MediaStore, PNG_MIME_TYPE, write_entry};
pub use permission::{AlwaysGranted, AuthorizationPrompt, BoxFuture, PermissionGate, PermissionState, RuntimePermissionGate};
pub use photo_library::PhotoLibraryStore;
pub use pipeline::PersistImagePipeline;
pub use platform::{PlatformGate, PlatformPipeline, PlatformStore, build_pipeline};
pub use staged_store::StagedMediaStore;
pub use status::{LogStatusSink, SaveStage, SaveStatus, StatusSink};
pub use validator::{DecodedImage, validate_image};

//! # Coop 相册保存桥 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │              网页端 (WebView / 前端页面)                  │
//! │   canvas.toDataURL() ──► invoke("downloadImage", ...)    │
//! └───────┬──────────────────────────────────────────────────┘
//!         ↕ 通道 com.example.coop_digital_app/native_bridge
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↕            原生侧 (Rust)                          │
//! │                                                          │
//! │  bridge ───── 方法分发 + BridgeError { code, stage }     │
//! │    └─ tauri_plugin   桌面端插件 (feature = "desktop")    │
//! │                                                          │
//! │  gallery ──── PersistImagePipeline                       │
//! │    ├─ permission     权限闸门                             │
//! │    ├─ data_url       Data URL 拆分                        │
//! │    ├─ decoder        Base64 解码                          │
//! │    ├─ validator      图片签名/尺寸校验 + 解码             │
//! │    ├─ media_store    条目生命周期 + 回滚守卫 (RAII)       │
//! │    ├─ staged_store   pending 文件存储                     │
//! │    └─ photo_library  一次性提交存储                       │
//! │                                                          │
//! │  config ───── GalleryConfig (JSON)                       │
//! │  error ────── AppError                                   │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 应用级错误 `AppError` |
//! | [`config`] | 相册位置、命名与解码上限配置 |
//! | [`gallery`] | 解码、校验、写入相册的完整保存链路 |
//! | [`bridge`] | 通道方法分发与结构化错误返回 |

pub mod bridge;
pub mod config;
pub mod error;
pub mod gallery;

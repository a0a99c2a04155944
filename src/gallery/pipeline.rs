//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `PersistImagePipeline` 只负责流程编排，不直接与任何 IPC 框架绑定。
//! 处理链路固定为：
//! 1. 入参检查
//! 2. 权限闸门（唯一可能等待用户的挂起点）
//! 3. 拆分 Data URL
//! 4. Base64 解码
//! 5. 图片校验
//! 6. 写入媒体库（阻塞线程执行）
//!
//! 任一阶段失败立即返回该阶段的错误，后续阶段不再执行。
//!
//! ## 实现思路
//!
//! - 管道对象显式持有所需能力（权限闸门、媒体库、配置、通知出口），构造时注入。
//! - 每次调用独占自己的解码结果与媒体条目，调用之间不共享可变状态。
//! - 记录 `permission/decode/validate/write/total` 阶段耗时，便于性能诊断。

use std::sync::Arc;
use std::time::Instant;

use super::data_url::DataUrl;
use super::decoder::decode_payload;
use super::media_store::write_entry;
use super::permission::{PermissionGate, PermissionState};
use super::status::{SaveStage, SaveStatus, StatusSink};
use super::validator::validate_image;
use super::{MediaEntry, MediaStore, PersistError};
use crate::config::GalleryConfig;

/// 图片保存管道。
pub struct PersistImagePipeline<G, S> {
    gate: G,
    store: Arc<S>,
    config: Arc<GalleryConfig>,
    sink: Arc<dyn StatusSink>,
}

impl<G: PermissionGate, S: MediaStore> PersistImagePipeline<G, S> {
    pub fn new(gate: G, store: S, config: GalleryConfig, sink: Arc<dyn StatusSink>) -> Self {
        Self {
            gate,
            store: Arc::new(store),
            config: Arc::new(config),
            sink,
        }
    }

    /// 底层媒体库。
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &GalleryConfig {
        &self.config
    }

    pub(crate) fn sink(&self) -> &Arc<dyn StatusSink> {
        &self.sink
    }

    /// 保存主入口：把 Data URL 中的图片写入媒体库相册。
    ///
    /// 成功时返回已提交的条目；失败时媒体库中不会残留本次调用的任何条目。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use std::sync::Arc;
    /// use coop_gallery::config::GalleryConfig;
    /// use coop_gallery::gallery::{AlwaysGranted, LogStatusSink, PersistImagePipeline, StagedMediaStore};
    ///
    /// # async fn demo(data_url: &str) -> Result<(), coop_gallery::gallery::PersistError> {
    /// let store = StagedMediaStore::new("/sdcard", "Pictures/Coop", "coop_");
    /// let pipeline = PersistImagePipeline::new(AlwaysGranted, store, GalleryConfig::default(), Arc::new(LogStatusSink));
    /// let entry = pipeline.persist(data_url).await?;
    /// println!("saved {}", entry.display_name);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn persist(&self, data_url: &str) -> Result<MediaEntry, PersistError> {
        self.sink.notify(&SaveStatus::new(SaveStage::Received, "已收到图片数据"));

        let result = self.run(data_url).await;

        match &result {
            Ok(entry) => self.sink.notify(&SaveStatus::new(
                SaveStage::Completed,
                format!("图片已保存到相册：{}", entry.display_name),
            )),
            Err(err) => self.sink.notify(&SaveStatus::failed(err.code(), err.to_string())),
        }

        result
    }

    async fn run(&self, data_url: &str) -> Result<MediaEntry, PersistError> {
        if data_url.trim().is_empty() {
            return Err(PersistError::InvalidArgument("dataUrl 为空".to_string()));
        }

        let total_start = Instant::now();
        log::info!("📝 开始保存图片（输入长度：{}）", data_url.len());

        let permission_start = Instant::now();
        if self.gate.ensure_authorized().await != PermissionState::Granted {
            return Err(PersistError::PermissionDenied(
                "未获得相册访问权限，授权后请重新点击保存".to_string(),
            ));
        }
        let permission_elapsed = permission_start.elapsed();

        self.sink.notify(&SaveStatus::new(SaveStage::Decoding, "正在解码图片"));
        let decode_start = Instant::now();
        let parsed = DataUrl::parse(data_url);
        let bytes = decode_payload(parsed.payload, self.config.max_payload_bytes)?;
        let decode_elapsed = decode_start.elapsed();

        let validate_start = Instant::now();
        let image = validate_image(bytes, &self.config)?;
        if let Some(declared) = parsed.declared_mime_type.as_deref() {
            let detected = image.format.to_mime_type();
            if declared != detected {
                log::warn!("⚠️ 声明的 MIME（{}）与实际格式（{}）不一致，按实际格式处理", declared, detected);
            }
        }
        let validate_elapsed = validate_start.elapsed();

        self.sink.notify(&SaveStatus::new(SaveStage::Saving, "正在保存到相册"));
        let write_start = Instant::now();
        let store = Arc::clone(&self.store);
        let entry = tokio::task::spawn_blocking(move || write_entry(store.as_ref(), &image))
            .await
            .map_err(|e| PersistError::WriteFailure(format!("写入线程执行失败：{}", e)))??;
        let write_elapsed = write_start.elapsed();

        log::info!(
            "✅ 图片保存完成 - {} permission={}ms decode={}ms validate={}ms write={}ms total={}ms",
            entry.display_name,
            permission_elapsed.as_millis(),
            decode_elapsed.as_millis(),
            validate_elapsed.as_millis(),
            write_elapsed.as_millis(),
            total_start.elapsed().as_millis()
        );

        Ok(entry)
    }
}

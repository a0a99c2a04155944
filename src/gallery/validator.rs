//! # 图片校验模块
//!
//! ## 设计思路
//!
//! 解码后的字节必须是受支持的栅格图片。为避免恶意或超大输入触发高内存开销，
//! 先做签名与尺寸检查，再在 `image::Limits` 约束下完整解码。
//!
//! ## 实现思路
//!
//! 1. `infer` 签名探测，非图片直接拒绝
//! 2. 读取 header 尺寸，按像素/单边/内存上限快速拒绝
//! 3. 带限额完整解码
//! 4. 复核解码结果尺寸

use std::io::Cursor;

use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader, Limits};

use super::PersistError;
use crate::config::GalleryConfig;

/// 校验通过的图片。仅在本次保存请求内存在。
pub struct DecodedImage {
    /// 解码前的原始图片字节。
    pub bytes: Vec<u8>,
    /// 像素宽度。
    pub width: u32,
    /// 像素高度。
    pub height: u32,
    /// 识别出的源格式。
    pub format: ImageFormat,
    pub(crate) image: DynamicImage,
}

impl std::fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedImage")
            .field("bytes", &self.bytes.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .finish()
    }
}

/// 校验并解码图片字节。
pub fn validate_image(bytes: Vec<u8>, config: &GalleryConfig) -> Result<DecodedImage, PersistError> {
    validate_image_signature(&bytes)?;

    let (header_width, header_height) = inspect_dimensions(&bytes)?;
    validate_dimension_limits(config, header_width, header_height)?;

    let mut reader = ImageReader::new(Cursor::new(bytes.as_slice()))
        .with_guessed_format()
        .map_err(|e| PersistError::DecodeFailure(format!("无法识别图片格式：{}", e)))?;
    let format = reader
        .format()
        .ok_or_else(|| PersistError::DecodeFailure("不支持的图片格式".to_string()))?;
    reader.limits(decode_limits(config));

    let image = reader
        .decode()
        .map_err(|e| PersistError::DecodeFailure(format!("图片解码失败：{}", e)))?;

    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(PersistError::DecodeFailure("解码结果为空图片".to_string()));
    }
    validate_dimension_limits(config, width, height)?;

    log::info!(
        "✅ 图片校验通过 - 格式: {:?} 尺寸: {}x{} 大小: {}KB",
        format,
        width,
        height,
        bytes.len() / 1024
    );

    Ok(DecodedImage {
        bytes,
        width,
        height,
        format,
        image,
    })
}

/// 通过文件签名（magic bytes）判断是否为图片。
fn validate_image_signature(bytes: &[u8]) -> Result<(), PersistError> {
    if bytes.is_empty() {
        return Err(PersistError::DecodeFailure("图片内容为空".to_string()));
    }

    let kind = infer::get(bytes)
        .ok_or_else(|| PersistError::DecodeFailure("无法识别图片类型".to_string()))?;

    if kind.matcher_type() != infer::MatcherType::Image {
        return Err(PersistError::DecodeFailure(format!(
            "文件签名不是图片类型：{}",
            kind.mime_type()
        )));
    }

    Ok(())
}

/// 仅读取图片头信息中的宽高。
fn inspect_dimensions(bytes: &[u8]) -> Result<(u32, u32), PersistError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| PersistError::DecodeFailure(format!("无法识别图片格式：{}", e)))?
        .into_dimensions()
        .map_err(|e| PersistError::DecodeFailure(format!("无法读取图片尺寸：{}", e)))
}

fn validate_dimension_limits(config: &GalleryConfig, width: u32, height: u32) -> Result<(), PersistError> {
    if width > config.max_dimension || height > config.max_dimension {
        return Err(PersistError::DecodeFailure(format!(
            "图片尺寸过大：{}x{}（单边限制：{}）",
            width, height, config.max_dimension
        )));
    }

    let pixels = (width as u64) * (height as u64);
    if pixels > config.max_decoded_pixels {
        return Err(PersistError::DecodeFailure(format!(
            "图片像素过大：{} 像素（限制：{} 像素）",
            pixels, config.max_decoded_pixels
        )));
    }

    let estimated = pixels.saturating_mul(4);
    if estimated > config.max_decoded_bytes {
        return Err(PersistError::DecodeFailure(format!(
            "图片解码预计内存过大：{:.2} MB（限制：{:.2} MB）",
            estimated as f64 / 1024.0 / 1024.0,
            config.max_decoded_bytes as f64 / 1024.0 / 1024.0
        )));
    }

    Ok(())
}

fn decode_limits(config: &GalleryConfig) -> Limits {
    let mut limits = Limits::default();
    limits.max_image_width = Some(config.max_dimension);
    limits.max_image_height = Some(config.max_dimension);
    limits.max_alloc = Some(config.max_decoded_bytes);
    limits
}

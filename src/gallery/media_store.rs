//! # 媒体库写入协议
//!
//! ## 设计思路
//!
//! 不同平台的共享媒体库接口差异很大（分阶段可见的 pending 条目 / 一次性提交的相册插入），
//! 这里用 `MediaStore` trait 抽象出统一的条目生命周期：
//!
//! ```text
//! allocate（pending）→ open_writer → close_writer → finalize
//!                          └──────── 任一步失败 ────────→ delete
//! ```
//!
//! `write_entry` 负责按顺序驱动这个生命周期，并保证：
//! - 写句柄在任何退出路径上都会被释放；
//! - 分配成功但未能完成的条目一定会被删除，不留下半写入或零字节文件。

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageEncoder, ImageFormat};

use super::{DecodedImage, PersistError};

/// 固定输出 MIME。
pub const PNG_MIME_TYPE: &str = "image/png";

/// 媒体库中的一条记录。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaEntry {
    /// 不透明句柄，由具体存储生成。
    pub uri: String,
    /// 展示文件名，形如 `coop_<epoch-millis>.png`。
    pub display_name: String,
    /// 相册逻辑目录，如 `Pictures/Coop`。
    pub relative_path: String,
    pub mime_type: &'static str,
    /// 是否仍处于对其他应用不可见的 pending 状态。
    pub pending: bool,
}

/// 平台共享媒体库抽象。
///
/// 实现方只负责单步操作，顺序与回滚由 [`write_entry`] 统一保证。
pub trait MediaStore: Send + Sync + 'static {
    /// 条目的写句柄。
    type Writer: Write;

    /// 是否支持“分阶段可见”（pending 标记）。
    fn supports_pending(&self) -> bool;

    /// 相册在宿主文件系统中的目录。
    fn album_dir(&self) -> &Path;

    /// 分配一个新条目；支持 pending 的平台须在此时即标记为 pending。
    fn allocate(&self) -> io::Result<MediaEntry>;

    /// 打开条目的写句柄。
    fn open_writer(&self, entry: &MediaEntry) -> io::Result<Self::Writer>;

    /// 刷新并释放写句柄。
    fn close_writer(&self, entry: &MediaEntry, writer: Self::Writer) -> io::Result<()>;

    /// 提交条目：清除 pending，使其对其他应用可见。
    fn finalize(&self, entry: &mut MediaEntry) -> io::Result<()>;

    /// 删除条目（可见或 pending）。条目不存在时视为成功。
    fn delete(&self, entry: &MediaEntry) -> io::Result<()>;
}

/// 基于毫秒时间戳的文件名生成器。
///
/// 同一毫秒内的连续调用会顺延到下一个毫秒值，保证单个存储实例内严格递增。
#[derive(Debug)]
pub struct DisplayNameGenerator {
    prefix: String,
    last_issued: AtomicI64,
}

impl DisplayNameGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            last_issued: AtomicI64::new(0),
        }
    }

    /// 生成下一个 `<prefix><millis>.png`。
    pub fn next_name(&self) -> String {
        let now = chrono::Utc::now().timestamp_millis();
        let mut previous = self.last_issued.load(Ordering::SeqCst);
        let issued = loop {
            let candidate = now.max(previous + 1);
            match self.last_issued.compare_exchange(previous, candidate, Ordering::SeqCst, Ordering::SeqCst) {
                Ok(_) => break candidate,
                Err(actual) => previous = actual,
            }
        };
        format!("{}{}.png", self.prefix, issued)
    }
}

/// 相册目录：`media_root/relative_path`。
pub(crate) fn album_dir_of(media_root: &Path, relative_path: &str) -> PathBuf {
    relative_path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .fold(media_root.to_path_buf(), |dir, segment| dir.join(segment))
}

/// 分配阶段遇到重名时的最大重试次数。
pub(crate) const ALLOCATE_MAX_ATTEMPTS: usize = 16;

/// 把写完的隐藏文件提交为正式文件名。目标已存在时返回 `AlreadyExists`，绝不覆盖。
///
/// 优先用硬链接原子提交；文件系统不支持硬链接时，先以 `create_new` 独占目标名再 `rename`。
pub(crate) fn commit_without_overwrite(staged: &Path, final_path: &Path) -> io::Result<()> {
    match fs::hard_link(staged, final_path) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => return Err(target_exists(final_path)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Err(err),
        Err(err) => {
            log::debug!("硬链接提交不可用，改用独占占位 + rename：{}", err);
            match OpenOptions::new().write(true).create_new(true).open(final_path) {
                Ok(_) => {}
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => return Err(target_exists(final_path)),
                Err(err) => return Err(err),
            }
            if let Err(err) = fs::rename(staged, final_path) {
                let _ = fs::remove_file(final_path);
                return Err(err);
            }
            return Ok(());
        }
    }

    if let Err(err) = fs::remove_file(staged) {
        log::warn!("⚠️ 清理暂存文件失败：{} - {}", staged.display(), err);
    }
    Ok(())
}

fn target_exists(final_path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("目标文件已存在：{}", final_path.display()),
    )
}

/// 条目回滚守卫：未解除就被丢弃（含 panic 展开）时删除条目。
struct EntryGuard<'a, S: MediaStore> {
    store: &'a S,
    entry: MediaEntry,
    armed: bool,
}

impl<'a, S: MediaStore> EntryGuard<'a, S> {
    fn new(store: &'a S, entry: MediaEntry) -> Self {
        Self {
            store,
            entry,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }

    fn rollback(mut self) {
        self.armed = false;
        delete_quietly(self.store, &self.entry);
    }
}

impl<S: MediaStore> Drop for EntryGuard<'_, S> {
    fn drop(&mut self) {
        if self.armed {
            log::warn!("⚠️ 写入流程异常中断，回收条目：{}", self.entry.display_name);
            delete_quietly(self.store, &self.entry);
        }
    }
}

fn delete_quietly<S: MediaStore>(store: &S, entry: &MediaEntry) {
    match store.delete(entry) {
        Ok(()) => log::info!("🧹 已删除未完成条目：{}", entry.display_name),
        Err(err) => log::error!("❌ 删除未完成条目失败：{} - {}", entry.display_name, err),
    }
}

/// 将校验通过的图片以 PNG 写入媒体库。
///
/// 成功时返回已提交（非 pending）的条目；失败时已分配的条目已被删除。
pub fn write_entry<S: MediaStore>(store: &S, image: &DecodedImage) -> Result<MediaEntry, PersistError> {
    let mut entry = store
        .allocate()
        .map_err(|e| PersistError::StorageAllocationFailure(format!("无法创建媒体库条目：{}", e)))?;

    log::info!(
        "📁 已分配媒体库条目 - {}/{} pending={}",
        entry.relative_path,
        entry.display_name,
        entry.pending
    );

    let mut guard = EntryGuard::new(store, entry.clone());

    match write_and_finalize(store, &mut entry, image) {
        Ok(()) => {
            guard.disarm();
            Ok(entry)
        }
        Err(err) => {
            log::error!("❌ 写入媒体库失败，回滚条目：{}", err);
            guard.rollback();
            Err(PersistError::WriteFailure(err.to_string()))
        }
    }
}

fn write_and_finalize<S: MediaStore>(store: &S, entry: &mut MediaEntry, image: &DecodedImage) -> io::Result<()> {
    let mut writer = store.open_writer(entry)?;
    let encoded = encode_png(image, &mut writer);
    // 无论编码是否成功都先释放写句柄
    let closed = store.close_writer(entry, writer);
    encoded?;
    closed?;

    store.finalize(entry)
}

/// PNG 源直接透传原始字节，其它格式无损重新编码为 PNG。
fn encode_png<W: Write>(image: &DecodedImage, writer: &mut W) -> io::Result<()> {
    if image.format == ImageFormat::Png {
        return writer.write_all(&image.bytes);
    }

    let widened;
    let pixels = match &image.image {
        DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
            widened = DynamicImage::ImageRgba16(image.image.to_rgba16());
            &widened
        }
        other => other,
    };

    PngEncoder::new(writer)
        .write_image(pixels.as_bytes(), pixels.width(), pixels.height(), pixels.color().into())
        .map_err(io::Error::other)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn names_follow_prefix_and_extension() {
        let names = DisplayNameGenerator::new("coop_");
        let name = names.next_name();

        let millis = name
            .strip_prefix("coop_")
            .and_then(|rest| rest.strip_suffix(".png"))
            .expect("name pattern");
        assert!(millis.parse::<i64>().expect("millis digits") > 0);
    }

    #[test]
    fn rapid_names_never_collide() {
        let names = DisplayNameGenerator::new("coop_");
        let issued: Vec<String> = (0..1_000).map(|_| names.next_name()).collect();
        let unique: HashSet<&String> = issued.iter().collect();

        assert_eq!(unique.len(), issued.len());
    }

    #[test]
    fn concurrent_names_never_collide() {
        let names = Arc::new(DisplayNameGenerator::new("coop_"));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let names = Arc::clone(&names);
            handles.push(thread::spawn(move || {
                (0..200).map(|_| names.next_name()).collect::<Vec<_>>()
            }));
        }

        let mut all = HashSet::new();
        for handle in handles {
            for name in handle.join().expect("worker thread should not panic") {
                assert!(all.insert(name), "duplicate display name issued");
            }
        }
        assert_eq!(all.len(), 8 * 200);
    }

    #[test]
    fn album_dir_joins_relative_segments() {
        let dir = album_dir_of(Path::new("/media"), "Pictures/Coop/");
        assert_eq!(dir, Path::new("/media").join("Pictures").join("Coop"));
    }

    static DIR_COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);

    fn unique_temp_dir() -> PathBuf {
        let seq = DIR_COUNTER.fetch_add(1, Ordering::SeqCst);
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("clock error")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("coop-gallery-commit-test-{nanos}-{seq}"));
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[test]
    fn commit_moves_staged_file_into_place() {
        let dir = unique_temp_dir();
        let staged = dir.join(".staged");
        let target = dir.join("coop_1.png");
        fs::write(&staged, b"new").expect("write staged");

        commit_without_overwrite(&staged, &target).expect("commit");

        assert_eq!(fs::read(&target).expect("read target"), b"new");
        assert!(!staged.exists());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn commit_never_replaces_existing_file() {
        let dir = unique_temp_dir();
        let staged = dir.join(".staged");
        let target = dir.join("coop_1.png");
        fs::write(&staged, b"new").expect("write staged");
        fs::write(&target, b"other call").expect("write target");

        let err = commit_without_overwrite(&staged, &target).expect_err("target exists");

        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read(&target).expect("read target"), b"other call");
        assert!(staged.exists());

        let _ = fs::remove_dir_all(dir);
    }
}

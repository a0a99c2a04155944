//! # 相册直插存储（一次性提交）
//!
//! ## 设计思路
//!
//! 对应 “照片库授权 + 变更块内创建资源” 一类的平台模型：平台没有 pending 标记，
//! 资源在提交变更之前根本不存在于相册中。这里把写入内容暂存在内存里，
//! `finalize` 时才一次性落盘。
//!
//! ## 实现思路
//!
//! - 分配：以 `create_new` 独占创建隐藏的 `.<name>.tmp` 占位文件，
//!   同一相册上的多个存储实例（例如桌面插件与命令行）因此不会拿到同一个文件名。
//! - 写入：写句柄为内存缓冲，关闭时把内容挂到对应预留上。
//! - 提交：内容写入占位文件并 `sync_all`，再以不覆盖的方式改为正式文件名。
//! - 删除：丢弃预留与暂存内容，同时删除占位文件。

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::media_store::{ALLOCATE_MAX_ATTEMPTS, PNG_MIME_TYPE, album_dir_of, commit_without_overwrite};
use super::{DisplayNameGenerator, MediaEntry, MediaStore};

/// 相册直插模型的媒体库。
#[derive(Debug)]
pub struct PhotoLibraryStore {
    album_dir: PathBuf,
    relative_path: String,
    names: DisplayNameGenerator,
    /// 已预留但未提交的条目：文件名 → 暂存内容（写句柄关闭前为 `None`）。
    reserved: Mutex<HashMap<String, Option<Vec<u8>>>>,
}

impl PhotoLibraryStore {
    pub fn new(media_root: impl AsRef<Path>, relative_path: &str, file_prefix: &str) -> Self {
        Self {
            album_dir: album_dir_of(media_root.as_ref(), relative_path),
            relative_path: relative_path.trim_matches('/').to_string(),
            names: DisplayNameGenerator::new(file_prefix),
            reserved: Mutex::new(HashMap::new()),
        }
    }

    fn reservations(&self) -> io::Result<std::sync::MutexGuard<'_, HashMap<String, Option<Vec<u8>>>>> {
        self.reserved
            .lock()
            .map_err(|_| io::Error::other("相册预留表锁已中毒"))
    }

    fn temp_path(&self, display_name: &str) -> PathBuf {
        self.album_dir.join(format!(".{display_name}.tmp"))
    }

    /// 当前未提交的预留数量。
    pub fn reserved_count(&self) -> usize {
        self.reserved.lock().map(|guard| guard.len()).unwrap_or(0)
    }
}

impl MediaStore for PhotoLibraryStore {
    type Writer = Vec<u8>;

    fn supports_pending(&self) -> bool {
        false
    }

    fn album_dir(&self) -> &Path {
        &self.album_dir
    }

    fn allocate(&self) -> io::Result<MediaEntry> {
        fs::create_dir_all(&self.album_dir)?;
        let mut reserved = self.reservations()?;

        for _ in 0..ALLOCATE_MAX_ATTEMPTS {
            let display_name = self.names.next_name();
            if reserved.contains_key(&display_name) || self.album_dir.join(&display_name).exists() {
                continue;
            }

            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.temp_path(&display_name))
            {
                Ok(_) => {}
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err),
            }

            reserved.insert(display_name.clone(), None);
            return Ok(MediaEntry {
                uri: format!("photos://{}/{}", self.relative_path, display_name),
                display_name,
                relative_path: self.relative_path.clone(),
                mime_type: PNG_MIME_TYPE,
                pending: false,
            });
        }

        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("连续 {} 次未能分配唯一文件名", ALLOCATE_MAX_ATTEMPTS),
        ))
    }

    fn open_writer(&self, entry: &MediaEntry) -> io::Result<Self::Writer> {
        if !self.reservations()?.contains_key(&entry.display_name) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("条目未预留：{}", entry.display_name),
            ));
        }
        Ok(Vec::new())
    }

    fn close_writer(&self, entry: &MediaEntry, writer: Self::Writer) -> io::Result<()> {
        match self.reservations()?.get_mut(&entry.display_name) {
            Some(slot) => {
                *slot = Some(writer);
                Ok(())
            }
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("条目未预留：{}", entry.display_name),
            )),
        }
    }

    fn finalize(&self, entry: &mut MediaEntry) -> io::Result<()> {
        let content = self
            .reservations()?
            .get_mut(&entry.display_name)
            .and_then(Option::take)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("条目没有可提交的内容：{}", entry.display_name),
                )
            })?;

        if content.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "拒绝提交空内容"));
        }

        let tmp = self.temp_path(&entry.display_name);
        {
            let mut file = OpenOptions::new().write(true).truncate(true).open(&tmp)?;
            file.write_all(&content)?;
            file.sync_all()?;
        }
        commit_without_overwrite(&tmp, &self.album_dir.join(&entry.display_name))?;

        if let Err(err) = File::open(&self.album_dir).and_then(|dir| dir.sync_all()) {
            log::debug!("相册目录同步失败（忽略）：{}", err);
        }

        self.reservations()?.remove(&entry.display_name);
        Ok(())
    }

    fn delete(&self, entry: &MediaEntry) -> io::Result<()> {
        self.reservations()?.remove(&entry.display_name);

        match fs::remove_file(self.temp_path(&entry.display_name)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
}

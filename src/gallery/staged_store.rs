//! # 分阶段可见存储（pending 条目）
//!
//! ## 设计思路
//!
//! 对应 “内容解析器 + IS_PENDING” 一类的平台模型：条目一经分配就以隐藏的
//! `.pending-<name>` 文件存在于相册目录，写完后再重命名为正式文件名，
//! 其他应用只能看到完整文件。
//!
//! ## 实现思路
//!
//! - 分配：`create_new` 独占创建 pending 文件，重名则换名重试。
//! - 写入：带缓冲的文件句柄，关闭时 `flush` + `sync_all`。
//! - 提交：以不覆盖的方式改为正式文件名（目标已存在则失败），随后尽力同步目录。
//! - 删除：移除 pending 文件，不存在视为成功。

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use super::media_store::{ALLOCATE_MAX_ATTEMPTS, PNG_MIME_TYPE, album_dir_of, commit_without_overwrite};
use super::{DisplayNameGenerator, MediaEntry, MediaStore};

const PENDING_PREFIX: &str = ".pending-";

/// 以 pending 文件实现分阶段可见的媒体库。
#[derive(Debug)]
pub struct StagedMediaStore {
    album_dir: PathBuf,
    relative_path: String,
    names: DisplayNameGenerator,
}

impl StagedMediaStore {
    pub fn new(media_root: impl AsRef<Path>, relative_path: &str, file_prefix: &str) -> Self {
        Self {
            album_dir: album_dir_of(media_root.as_ref(), relative_path),
            relative_path: relative_path.trim_matches('/').to_string(),
            names: DisplayNameGenerator::new(file_prefix),
        }
    }

    fn pending_path(&self, display_name: &str) -> PathBuf {
        self.album_dir.join(format!("{PENDING_PREFIX}{display_name}"))
    }

    fn final_path(&self, display_name: &str) -> PathBuf {
        self.album_dir.join(display_name)
    }

    /// 是否为 pending 文件名（供清点相册时排除）。
    pub fn is_pending_file_name(name: &str) -> bool {
        name.starts_with(PENDING_PREFIX)
    }
}

impl MediaStore for StagedMediaStore {
    type Writer = BufWriter<File>;

    fn supports_pending(&self) -> bool {
        true
    }

    fn album_dir(&self) -> &Path {
        &self.album_dir
    }

    fn allocate(&self) -> io::Result<MediaEntry> {
        fs::create_dir_all(&self.album_dir)?;

        for _ in 0..ALLOCATE_MAX_ATTEMPTS {
            let display_name = self.names.next_name();
            let final_path = self.final_path(&display_name);
            if final_path.exists() {
                continue;
            }

            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.pending_path(&display_name))
            {
                Ok(_) => {
                    return Ok(MediaEntry {
                        uri: format!("file://{}", final_path.display()),
                        display_name,
                        relative_path: self.relative_path.clone(),
                        mime_type: PNG_MIME_TYPE,
                        pending: true,
                    });
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err),
            }
        }

        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("连续 {} 次未能分配唯一文件名", ALLOCATE_MAX_ATTEMPTS),
        ))
    }

    fn open_writer(&self, entry: &MediaEntry) -> io::Result<Self::Writer> {
        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(self.pending_path(&entry.display_name))?;
        Ok(BufWriter::new(file))
    }

    fn close_writer(&self, _entry: &MediaEntry, writer: Self::Writer) -> io::Result<()> {
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()
    }

    fn finalize(&self, entry: &mut MediaEntry) -> io::Result<()> {
        commit_without_overwrite(
            &self.pending_path(&entry.display_name),
            &self.final_path(&entry.display_name),
        )?;
        entry.pending = false;

        if let Err(err) = File::open(&self.album_dir).and_then(|dir| dir.sync_all()) {
            log::debug!("相册目录同步失败（忽略）：{}", err);
        }
        Ok(())
    }

    fn delete(&self, entry: &MediaEntry) -> io::Result<()> {
        let path = if entry.pending {
            self.pending_path(&entry.display_name)
        } else {
            self.final_path(&entry.display_name)
        };

        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
}

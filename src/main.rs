//! # Coop 相册保存桥 — 命令行入口
//!
//! 通过命令行驱动与网页端相同的桥接方法，便于在没有 WebView 的环境下诊断：
//!
//! ```text
//! coop-gallery check-status
//! coop-gallery download-image --data-url-file shot.txt
//! cat shot.txt | coop-gallery download-image --data-url-file -
//! coop-gallery --config gallery.json --media-root /sdcard init-config
//! ```

use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use coop_gallery::bridge::{self, NativeBridge};
use coop_gallery::config::{GalleryConfig, load_config_from_path, save_config_to_path};
use coop_gallery::error::AppError;
use coop_gallery::gallery::{AuthorizationPrompt, BoxFuture, LogStatusSink, PermissionState, build_pipeline};
use serde_json::{Map, Value};

#[derive(Parser, Debug)]
#[command(name = "coop-gallery", version, about = "Save data-URL images into the photo gallery")]
struct Cli {
    /// JSON 配置文件路径
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// 覆盖配置中的媒体根目录
    #[arg(long, global = true)]
    media_root: Option<String>,
    /// 需要授权时自动同意，不再询问
    #[arg(long, global = true, default_value_t = false)]
    assume_yes: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 保存 Data URL 图片到相册
    DownloadImage(DownloadImageArgs),
    /// 连通性探测
    CheckStatus,
    /// 将当前生效的配置写入 `--config` 指定的文件
    InitConfig,
}

#[derive(Args, Debug)]
struct DownloadImageArgs {
    /// 包含 Data URL 的文件，`-` 表示标准输入
    #[arg(long, value_name = "PATH")]
    data_url_file: String,
}

/// 终端确认式授权提示。
struct ConsolePrompt {
    assume_yes: bool,
}

impl AuthorizationPrompt for ConsolePrompt {
    fn status(&self) -> PermissionState {
        if self.assume_yes {
            PermissionState::Granted
        } else {
            PermissionState::Unknown
        }
    }

    fn request(&self) -> BoxFuture<'_, bool> {
        Box::pin(async {
            let answer = tokio::task::spawn_blocking(|| {
                eprint!("允许访问相册以保存图片？[y/N] ");
                let _ = io::stderr().flush();
                let mut line = String::new();
                io::stdin().lock().read_line(&mut line).map(|_| line)
            })
            .await;

            matches!(answer, Ok(Ok(line)) if matches!(line.trim(), "y" | "Y" | "yes"))
        })
    }
}

fn load_config(cli: &Cli) -> GalleryConfig {
    let mut config = match cli.config.as_deref() {
        Some(path) => load_config_from_path(path),
        None => GalleryConfig::default(),
    };
    if let Some(root) = cli.media_root.clone() {
        config.media_root = Some(root);
    }
    config
}

fn init_config(cli: &Cli) -> Result<Value, AppError> {
    let path = cli
        .config
        .as_deref()
        .ok_or_else(|| AppError::Config("init-config 需要 --config <PATH>".to_string()))?;
    let config = load_config(cli);
    save_config_to_path(path, &config)?;
    log::info!("💾 配置已写入：{}", path.display());
    Ok(Value::String(path.display().to_string()))
}

fn read_data_url(source: &str) -> Result<String, AppError> {
    let mut content = String::new();
    if source == "-" {
        io::stdin().read_to_string(&mut content)?;
    } else {
        content = std::fs::read_to_string(Path::new(source))?;
    }
    Ok(content.trim().to_string())
}

async fn run(cli: Cli) -> Result<Value, AppError> {
    let data_url_file = match &cli.command {
        // 探测不依赖相册是否可用
        Commands::CheckStatus => return Ok(Value::String(bridge::STATUS_REPLY.to_string())),
        Commands::InitConfig => return init_config(&cli),
        Commands::DownloadImage(args) => args.data_url_file.clone(),
    };

    let config = load_config(&cli);
    let prompt = Arc::new(ConsolePrompt {
        assume_yes: cli.assume_yes,
    });
    let pipeline = build_pipeline(config, prompt, Arc::new(LogStatusSink))?;
    let native = NativeBridge::new(pipeline);

    let mut args = Map::new();
    args.insert("dataUrl".to_string(), Value::String(read_data_url(&data_url_file)?));

    match native.handle(bridge::METHOD_DOWNLOAD_IMAGE, &args).await {
        Ok(value) => Ok(value),
        Err(err) => {
            let body = serde_json::to_string(&err).unwrap_or_else(|_| err.to_string());
            eprintln!("{body}");
            Err(err.into())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(value) => {
            println!("{value}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("❌ {err}");
            ExitCode::FAILURE
        }
    }
}

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, Command};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use broadcaster_core::config::AppConfig;

mod app;
mod shutdown;

use app::{AppMode, Application};
use shutdown::ShutdownManager;

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("broadcaster")
        .version("1.0.0")
        .about("客户消息广播分发系统")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径")
                .default_value("config/broadcaster.toml"),
        )
        .arg(
            Arg::new("mode")
                .short('m')
                .long("mode")
                .value_name("MODE")
                .help("运行模式")
                .value_parser(["serve", "drain"])
                .default_value("serve"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .default_value("info"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式")
                .value_parser(["json", "pretty"])
                .default_value("pretty"),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").cloned().unwrap_or_default();
    let mode_str = matches.get_one::<String>("mode").cloned().unwrap_or_default();
    let log_level = matches.get_one::<String>("log-level").cloned().unwrap_or_default();
    let log_format = matches.get_one::<String>("log-format").cloned().unwrap_or_default();

    init_logging(&log_level, &log_format)?;

    info!("启动客户消息广播分发系统");
    info!("配置文件: {config_path}");
    info!("运行模式: {mode_str}");

    let config = AppConfig::load(Some(&config_path))
        .with_context(|| format!("加载配置文件失败: {config_path}"))?;

    let mode = match mode_str.as_str() {
        "drain" => AppMode::Drain,
        _ => AppMode::Serve,
    };

    let shutdown_manager = ShutdownManager::new();
    let app = Application::new(config, mode.clone()).await?;

    match mode {
        // 一次性排空：前台运行直到完成
        AppMode::Drain => {
            app.run(shutdown_manager.subscribe()).await?;
        }
        // HTTP服务：后台运行，等待关闭信号
        AppMode::Serve => {
            let app = Arc::new(app);
            let shutdown_rx = shutdown_manager.subscribe();
            let app_handle = {
                let app = Arc::clone(&app);
                tokio::spawn(async move {
                    if let Err(e) = app.run(shutdown_rx).await {
                        error!("应用运行失败: {e}");
                    }
                })
            };

            wait_for_shutdown_signal().await;
            info!("收到关闭信号，开始优雅关闭...");
            shutdown_manager.shutdown().await;

            match tokio::time::timeout(Duration::from_secs(30), app_handle).await {
                Ok(result) => {
                    if let Err(e) = result {
                        error!("应用关闭时发生错误: {e}");
                    } else {
                        info!("应用已优雅关闭");
                    }
                }
                Err(_) => {
                    error!("应用关闭超时，强制退出");
                }
            }
        }
    }

    Ok(())
}

fn init_logging(log_level: &str, log_format: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("broadcaster={log_level},info")));

    match log_format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .context("初始化JSON日志失败")?;
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .context("初始化日志失败")?;
        }
    }
    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("监听Ctrl+C信号失败: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("监听SIGTERM信号失败: {e}");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("收到Ctrl+C信号");
        }
        _ = terminate => {
            info!("收到SIGTERM信号");
        }
    }
}

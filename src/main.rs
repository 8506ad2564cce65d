use anyhow::{Context, Result};
use clap::{Arg, Command};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pricewatch_core::config::AppConfig;

mod app;
mod shutdown;

use app::Application;
use shutdown::ShutdownSignal;

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let matches = Command::new("pricewatch")
        .version("1.0.0")
        .about("自托管商品价格追踪系统")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式")
                .value_parser(["json", "pretty"]),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").map(|s| s.as_str());
    let config = AppConfig::load(config_path).context("配置加载失败")?;

    // 命令行参数覆盖配置文件中的日志设置
    let log_level = matches
        .get_one::<String>("log-level")
        .unwrap_or(&config.observability.log_level)
        .clone();
    let log_format = matches
        .get_one::<String>("log-format")
        .unwrap_or(&config.observability.log_format)
        .clone();
    init_logging(&log_level, &log_format)?;

    info!("启动pricewatch");
    if let Some(path) = config_path {
        info!("配置文件: {path}");
    }

    let shutdown = ShutdownSignal::new();
    shutdown.listen();

    let application = Application::new(config).await?;
    application.run(shutdown).await
}

/// 初始化日志系统
fn init_logging(log_level: &str, log_format: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pricewatch={log_level},info")));

    match log_format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .context("日志系统初始化失败")?;
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .try_init()
                .context("日志系统初始化失败")?;
        }
    }
    Ok(())
}

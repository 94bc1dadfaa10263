//! LIS网关服务器主程序

use std::net::SocketAddr;

use clap::Parser;
use tracing::{error, info};

mod config;

use crate::config::GatewayConfig;
use lis_web::WebServer;

/// LIS网关命令行参数
#[derive(Parser, Debug)]
#[command(name = "lis-server")]
#[command(about = "血液学LIS结果网关服务器")]
struct Args {
    /// 监听端口 (覆盖配置文件)
    #[arg(short, long)]
    port: Option<u16>,

    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 日志级别
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(args.log_level.as_str())
        .init();

    info!("启动LIS网关服务器...");

    let mut config = GatewayConfig::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    info!("网关配置:");
    info!("  监听地址: {}:{}", config.server.host, config.server.port);
    info!(
        "  数据库: {}:{}/{}",
        config.database.host, config.database.port, config.database.database
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid listen address: {}", e))?;

    let server = WebServer::new(addr, config.database.to_db_config());
    if let Err(e) = server.run().await {
        error!("服务器启动失败: {}", e);
        return Err(e.into());
    }

    Ok(())
}

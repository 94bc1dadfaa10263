//! 配置管理
//!
//! 支持配置文件与`LIS_`前缀环境变量两级来源。

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::info;

use lis_database::DbConfig;

/// 网关完整配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// HTTP服务配置
    pub server: ServerConfig,
    /// 数据库配置
    pub database: DatabaseConfig,
}

/// HTTP服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听主机
    pub host: String,
    /// 监听端口
    pub port: u16,
}

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// 数据库主机
    pub host: String,
    /// 数据库端口
    pub port: u16,
    /// 用户名
    pub username: String,
    /// 密码
    pub password: String,
    /// 库名
    pub database: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5000,
            username: "sa".to_string(),
            password: String::new(),
            database: "spo".to_string(),
        }
    }
}

impl GatewayConfig {
    /// 从可选配置文件与环境变量加载
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder =
            Config::builder().add_source(Config::try_from(&GatewayConfig::default())?);

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path));
        }

        let settings = builder
            .add_source(Environment::with_prefix("LIS").separator("_"))
            .build()
            .context("Failed to build configuration")?;

        let config: GatewayConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        if let Some(path) = config_path {
            info!("Configuration loaded from: {}", path);
        }
        Ok(config)
    }
}

impl DatabaseConfig {
    /// 转换为连接参数
    pub fn to_db_config(&self) -> DbConfig {
        DbConfig {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            database: self.database.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.database.database, "spo");
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = GatewayConfig::load(None).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.database.to_db_config().database, "spo");
    }
}

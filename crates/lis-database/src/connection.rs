//! 数据库连接管理

use tiberius::{AuthMethod, Client, Config, EncryptionLevel};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, warn};

use lis_core::{LisError, Result};

/// 单个请求持有的短连接TDS客户端
pub type DbClient = Client<Compat<TcpStream>>;

/// 数据库连接参数
#[derive(Debug, Clone)]
pub struct DbConfig {
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

impl Default for DbConfig {
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

impl DbConfig {
    /// 建立一条短生命周期连接，由调用方在请求结束时关闭
    pub async fn connect(&self) -> Result<DbClient> {
        let mut config = Config::new();
        config.host(&self.host);
        config.port(self.port);
        config.database(&self.database);
        config.authentication(AuthMethod::sql_server(&self.username, &self.password));
        // 遗留服务器不支持TLS握手
        config.encryption(EncryptionLevel::NotSupported);
        config.trust_cert();

        let addr = config.get_addr();
        let tcp = TcpStream::connect(&addr)
            .await
            .map_err(|e| LisError::Database(format!("connect to {} failed: {}", addr, e)))?;
        tcp.set_nodelay(true)
            .map_err(|e| LisError::Database(e.to_string()))?;

        let client = Client::connect(config, tcp.compat_write())
            .await
            .map_err(|e| LisError::Database(format!("login to {} failed: {}", addr, e)))?;

        debug!("database connection established to {}", addr);
        Ok(client)
    }
}

/// 关闭连接并记录失败; 请求路径上对每条连接恰好调用一次
pub async fn close(client: DbClient) {
    if let Err(e) = client.close().await {
        warn!("failed to close database connection: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_points_at_legacy_database() {
        let config = DbConfig::default();
        assert_eq!(config.database, "spo");
        assert_eq!(config.port, 5000);
    }
}

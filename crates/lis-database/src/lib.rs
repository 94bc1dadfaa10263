//! # LIS数据库模块
//!
//! 负责与遗留Sybase库的短连接会话和参数化查询。每个HTTP请求
//! 自行建立并关闭一条连接，不做连接池。

pub mod connection;
pub mod models;
pub mod queries;

// 重新导出主要类型
pub use connection::{close, DbClient, DbConfig};
pub use queries::LisQueries;

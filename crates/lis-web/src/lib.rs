//! # LIS Web模块
//!
//! 旧网关REST接口的axum实现，路径与响应形态沿用既有客户端的约定。

pub mod handlers;
pub mod server;

pub use handlers::AppState;
pub use server::WebServer;

//! Web服务器

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use lis_core::{LisError, Result};
use lis_database::DbConfig;

use crate::handlers::{
    api_root, get_cbc_image, get_cbc_results, health, save_comment, save_uimd_result,
    update_uimd_crc, AppState,
};

pub struct WebServer {
    addr: SocketAddr,
    app: Router,
}

impl WebServer {
    pub fn new(addr: SocketAddr, db: DbConfig) -> Self {
        let app = create_app(Arc::new(AppState { db }));
        Self { addr, app }
    }

    pub async fn run(self) -> Result<()> {
        info!("Starting web server on {}", self.addr);

        let listener = TcpListener::bind(self.addr).await?;
        axum::serve(listener, self.app)
            .await
            .map_err(|e| LisError::Internal(format!("web server terminated: {}", e)))?;

        Ok(())
    }
}

/// 路由表; 路径沿用旧网关, 既有客户端不改一行
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        // 根路径
        .route("/", get(api_root))
        // 健康检查
        .route("/health", get(health))
        // 结果检索
        .route("/cbc-results", get(get_cbc_results))
        .route("/cbcImgGet", get(get_cbc_image))
        // 结果保存
        .route("/save-uimd-result", put(save_uimd_result).post(save_uimd_result))
        .route("/save-comment", post(save_comment))
        .route("/updateUimdCrcData", post(update_uimd_crc))
        .with_state(state)
        // 全局中间件
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
}

//! HTTP处理器

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use lis_core::hexblob::decode_hex_image;
use lis_core::models::{CbcResultRow, ImageUpdate, NumericUpdate, ResultKey};
use lis_core::LisError;
use lis_database::{close, DbClient, LisQueries};

/// 各处理器共享的应用状态
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: lis_database::DbConfig,
}

/// API根路径处理器
pub async fn api_root() -> impl IntoResponse {
    Json(json!({
        "service": "LIS CBC Gateway",
        "version": "1.0.0",
        "status": "running",
        "endpoints": {
            "health": "/health",
            "cbc_results": "/cbc-results",
            "cbc_image_meta": "/cbcImgGet",
            "save_uimd_result": "/save-uimd-result",
            "save_comment": "/save-comment",
            "update_uimd_crc": "/updateUimdCrcData"
        }
    }))
}

/// 健康检查处理器
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": "1.0.0"
    }))
}

/// CBC结果检索处理器
pub async fn get_cbc_results(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CbcResultParams>,
) -> Result<impl IntoResponse, ApiError> {
    info!("GET /cbc-results smp_no={:?} slip={:?}", params.smp_no, params.slip);

    let smp_no = require(params.smp_no.as_deref(), "smp_no")?;

    let mut client = state.db.connect().await?;
    let outcome = fetch_results(&mut client, smp_no, params.slip.as_deref()).await;
    close(client).await;

    let rows = outcome?;
    Ok(Json(json!({ "data": rows })))
}

/// 直接命中为空时回退到同一患者最近的既往结果
async fn fetch_results(
    client: &mut DbClient,
    smp_no: &str,
    slip: Option<&str>,
) -> lis_core::Result<Vec<CbcResultRow>> {
    let mut queries = LisQueries::new(client);
    let rows = queries.fetch_cbc_results(smp_no, slip).await?;
    if !rows.is_empty() {
        return Ok(rows);
    }
    match queries.fetch_latest_prior_sample(smp_no).await? {
        Some(prior) => queries.fetch_cbc_results(&prior, slip).await,
        None => Ok(rows),
    }
}

/// 图像元数据检索处理器
pub async fn get_cbc_image(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CbcImageParams>,
) -> Result<impl IntoResponse, ApiError> {
    info!("GET /cbcImgGet smp_no={:?}", params.smp_no);

    let smp_no = match params.smp_no.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(smp_no) => smp_no,
        // 旧接口对缺失参数返回纯文本
        None => return Err(ApiError::text(StatusCode::BAD_REQUEST, "smp_no is required")),
    };

    let mut client = state.db.connect().await?;
    let outcome = LisQueries::new(&mut client).fetch_image_meta(smp_no).await;
    close(client).await;

    Ok(Json(outcome?))
}

/// UIMD图像结果保存处理器
pub async fn save_uimd_result(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SaveUimdResultRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!("save-uimd-result exam_cd={:?}", body.exam_cd);

    let key = match image_key(&body) {
        Some(key) => key,
        None => return Err(ApiError::text(StatusCode::BAD_REQUEST, "Missing required fields")),
    };
    let image_rslt = match body.image_rslt.as_deref() {
        Some(payload) => decode_hex_image(payload)?,
        None => Vec::new(),
    };

    let update = ImageUpdate {
        key,
        size: body.size.unwrap_or(0),
        width: body.width.unwrap_or(0),
        height: body.height.unwrap_or(0),
        rslt_stus: body.rslt_stus.unwrap_or_default(),
        image_rslt,
    };

    let mut client = state.db.connect().await?;
    let outcome = LisQueries::new(&mut client).save_image_result(&update).await;
    close(client).await;

    outcome?;
    Ok("Update successful")
}

/// 批注/文本结果保存处理器
pub async fn save_comment(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SaveCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!("save-comment tsmp_no={:?}", body.tsmp_no);

    let smp_no = require(body.tsmp_no.as_deref(), "tsmp_no")?;
    let text_rslt = body
        .ttext_rslt
        .as_deref()
        .ok_or_else(|| LisError::Validation("ttext_rslt is required".to_string()))?;

    let mut client = state.db.connect().await?;
    let outcome = save_comment_inner(&mut client, smp_no, text_rslt).await;
    close(client).await;

    outcome?;
    Ok(Json(json!({ "data": "update ok" })))
}

/// 终审样本拒绝写入
async fn save_comment_inner(
    client: &mut DbClient,
    smp_no: &str,
    text_rslt: &str,
) -> lis_core::Result<u64> {
    let mut queries = LisQueries::new(client);
    match queries.fetch_acceptance_status(smp_no).await? {
        None => Err(LisError::NotFound(format!("sample {} not found", smp_no))),
        Some(status) if status.is_final() => Err(LisError::Validation(format!(
            "sample {} is finalized and can no longer be edited",
            smp_no
        ))),
        Some(_) => queries.save_text_result(smp_no, text_rslt).await,
    }
}

/// 全量数值结果保存处理器 (设备回传)
pub async fn update_uimd_crc(
    State(state): State<Arc<AppState>>,
    Json(body): Json<UpdateUimdCrcRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!("updateUimdCrcData smp_no={:?} exam_cd={:?}", body.smp_no, body.exam_cd);

    let smp_no = require(body.smp_no.as_deref(), "smp_no")?;
    let key = match numeric_key(&body) {
        Some(key) => key,
        None => {
            return Err(LisError::Validation("Missing required fields".to_string()).into());
        }
    };

    let update = NumericUpdate {
        key,
        smp_no: smp_no.to_string(),
        numeric_rslt: body.numeric_rslt,
        text_rslt: body.text_rslt.clone(),
        unit: body.unit.clone(),
        rslt_stus: body.rslt_stus.clone().unwrap_or_default(),
        ref_stus: body.ref_stus.clone(),
        eqp_cd: body.eqp_cd.clone().unwrap_or_default(),
        eqp_no: body.eqp_no.clone().unwrap_or_default(),
        // 未指定时按已出结果处理
        exam_stus: body.exam_stus.clone().unwrap_or_else(|| "R".to_string()),
    };

    let mut client = state.db.connect().await?;
    let outcome = update_crc_inner(&mut client, &update).await;
    close(client).await;

    outcome?;
    Ok(Json(json!({ "data": "update ok" })))
}

async fn update_crc_inner(client: &mut DbClient, update: &NumericUpdate) -> lis_core::Result<u64> {
    let mut queries = LisQueries::new(client);
    match queries.fetch_acceptance_status(&update.smp_no).await? {
        None => Err(LisError::NotFound(format!("sample {} not found", update.smp_no))),
        Some(status) if status.is_final() => Err(LisError::Validation(format!(
            "sample {} is finalized and can no longer be edited",
            update.smp_no
        ))),
        Some(_) => queries.save_numeric_result(update).await,
    }
}

/// 必填字段校验
fn require<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, ApiError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(LisError::Validation(format!("{} is required", field)).into()),
    }
}

/// 五个复合键字段全部存在时组装键
fn image_key(body: &SaveUimdResultRequest) -> Option<ResultKey> {
    Some(ResultKey {
        exam_ymd_unit: body.exam_ymd_unit.clone()?,
        slip: body.slip.clone()?,
        wrk_no: body.wrk_no?,
        exam_cd: body.exam_cd.clone()?,
        spc: body.spc.clone()?,
    })
}

fn numeric_key(body: &UpdateUimdCrcRequest) -> Option<ResultKey> {
    Some(ResultKey {
        exam_ymd_unit: body.exam_ymd_unit.clone()?,
        slip: body.slip.clone()?,
        wrk_no: body.wrk_no?,
        exam_cd: body.exam_cd.clone()?,
        spc: body.spc.clone()?,
    })
}

/// 结果检索查询参数
#[derive(Debug, Deserialize)]
pub struct CbcResultParams {
    pub smp_no: Option<String>,
    pub slip: Option<String>,
}

/// 图像元数据查询参数
#[derive(Debug, Deserialize)]
pub struct CbcImageParams {
    pub smp_no: Option<String>,
}

/// 图像保存请求体
#[derive(Debug, Deserialize)]
pub struct SaveUimdResultRequest {
    pub exam_ymd_unit: Option<String>,
    pub slip: Option<String>,
    pub wrk_no: Option<i32>,
    pub exam_cd: Option<String>,
    pub spc: Option<String>,
    pub size: Option<i32>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub rslt_stus: Option<String>,
    pub image_rslt: Option<String>, // 十六进制字符串
}

/// 批注/文本结果保存请求体 (沿用旧接口字段名)
#[derive(Debug, Deserialize)]
pub struct SaveCommentRequest {
    pub tsmp_no: Option<String>,
    pub ttext_rslt: Option<String>,
}

/// 全量数值结果保存请求体
#[derive(Debug, Deserialize)]
pub struct UpdateUimdCrcRequest {
    pub smp_no: Option<String>,
    pub exam_ymd_unit: Option<String>,
    pub slip: Option<String>,
    pub wrk_no: Option<i32>,
    pub exam_cd: Option<String>,
    pub spc: Option<String>,
    pub numeric_rslt: Option<f64>,
    pub text_rslt: Option<String>,
    pub unit: Option<String>,
    pub rslt_stus: Option<String>,
    pub ref_stus: Option<String>,
    pub eqp_cd: Option<String>,
    pub eqp_no: Option<String>,
    pub exam_stus: Option<String>,
}

/// 错误响应包装; 处理器经`?`转换为HTTP响应
#[derive(Debug)]
pub enum ApiError {
    /// 按旧接口返回纯文本
    Text(StatusCode, String),
    /// 统一JSON错误体
    Lis(LisError),
}

impl ApiError {
    fn text(status: StatusCode, message: &str) -> Self {
        ApiError::Text(status, message.to_string())
    }
}

impl From<LisError> for ApiError {
    fn from(err: LisError) -> Self {
        ApiError::Lis(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Text(status, message) => (status, message).into_response(),
            ApiError::Lis(err) => {
                let status = match &err {
                    LisError::Validation(_) => StatusCode::BAD_REQUEST,
                    LisError::NotFound(_) => StatusCode::NOT_FOUND,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    error!("request failed: {}", err);
                }
                let body = Json(json!({
                    "error": true,
                    "message": err.to_string(),
                    "status": status.as_u16()
                }));
                (status, body).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::create_app;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    // 不可达的数据库地址; 校验失败的请求必须在触达数据库之前被拒绝
    fn test_app() -> axum::Router {
        let db = lis_database::DbConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            username: "sa".to_string(),
            password: String::new(),
            database: "spo".to_string(),
        };
        create_app(Arc::new(AppState { db }))
    }

    fn json_post(uri: &str, method: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_smp_no_is_rejected() {
        let response = test_app()
            .oneshot(Request::builder().uri("/cbc-results").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_blank_smp_no_is_rejected() {
        let response = test_app()
            .oneshot(Request::builder().uri("/cbc-results?smp_no=").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_image_meta_requires_smp_no() {
        use http_body_util::BodyExt;

        let response = test_app()
            .oneshot(Request::builder().uri("/cbcImgGet").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // 旧接口约定: 纯文本错误体
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"smp_no is required");
    }

    #[tokio::test]
    async fn test_image_save_requires_composite_key() {
        // slip缺失
        let body = serde_json::json!({
            "exam_ymd_unit": "20240101-1",
            "wrk_no": 17,
            "exam_cd": "L70081",
            "spc": "B",
            "size": 0
        });
        let response = test_app()
            .oneshot(json_post("/save-uimd-result", "PUT", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_hex_payload_is_rejected() {
        let body = serde_json::json!({
            "exam_ymd_unit": "20240101-1",
            "slip": "H1",
            "wrk_no": 17,
            "exam_cd": "L70081",
            "spc": "B",
            "size": 2,
            "width": 1,
            "height": 1,
            "rslt_stus": "R",
            "image_rslt": "zz"
        });
        let response = test_app()
            .oneshot(json_post("/save-uimd-result", "POST", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_save_comment_requires_sample() {
        let response = test_app()
            .oneshot(json_post("/save-comment", "POST", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_update_crc_requires_key_fields() {
        let body = serde_json::json!({ "smp_no": "S240101001" });
        let response = test_app()
            .oneshot(json_post("/updateUimdCrcData", "POST", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health_reports_ok() {
        let response = test_app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

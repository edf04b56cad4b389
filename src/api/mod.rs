use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post},
    Json, Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi, ToSchema,
};

use crate::{
    api::{
        middleware::{require_auth, trace_id_middleware},
        response::{success_response, ApiResponse},
    },
    app_state::AppState,
    config::StorageBackend,
    error::AppError,
};

pub mod extract;
pub mod history_api;
pub mod htlc_api;
pub mod middleware;
pub mod network_api;
pub mod response; // 统一响应格式

#[derive(OpenApi)]
#[openapi(
    paths(
        htlc_api::new_contract,
        htlc_api::withdraw,
        htlc_api::refund,
        htlc_api::get_event_by_block,
        htlc_api::get_contract,
        network_api::add_network,
        network_api::list_networks,
        network_api::update_network,
        history_api::list_transactions,
        health,
    ),
    components(
        schemas(
            htlc_api::NewContractBody,
            htlc_api::WithdrawBody,
            htlc_api::RefundBody,
            htlc_api::EventByBlockBody,
            htlc_api::GetContractBody,
            network_api::AddNetworkDoc,
            crate::error::ErrorBodyDoc,
            HealthResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "HTLC Bridge API", description = "Auto-generated OpenAPI via utoipa")
    )
)]
pub struct ApiDoc;

/// 注册 `bearer_auth`（JWT）安全方案
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub storage: String,
    pub chains: Vec<String>,
}

#[utoipa::path(
    get,
    path = "/blockchain-transaction/health",
    responses((status = 200, description = "OK", body = HealthResponse))
)]
pub async fn health(
    State(st): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<HealthResponse>>, AppError> {
    let storage_ok = match &st.pool {
        Some(pool) => crate::infrastructure::db::health_check(pool).await.is_ok(),
        None => true,
    };
    let storage = match st.config.storage.backend {
        StorageBackend::Postgres => "postgres",
        StorageBackend::Memory => "memory",
    };

    success_response(HealthResponse {
        status: if storage_ok { "ok" } else { "degraded" }.into(),
        storage: storage.into(),
        chains: st.htlc.chains().registry().supported_chain_ids(),
    })
}

/// CORS：`CORS_ALLOW_ORIGINS` 为 `*` 或逗号分隔的来源列表
fn cors_layer() -> CorsLayer {
    let allow_origins = std::env::var("CORS_ALLOW_ORIGINS").unwrap_or_else(|_| "*".into());

    let origin = if allow_origins.trim() == "*" {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(
            allow_origins
                .split(',')
                .filter_map(|o| HeaderValue::from_str(o.trim()).ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

pub fn routes(state: Arc<AppState>) -> Router {
    // 需要登录
    let protected_routes = Router::new()
        .route("/withdraw", post(htlc_api::withdraw))
        .route("/transaction", get(history_api::list_transactions))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let public_routes = Router::new()
        .route("/new-contract", post(htlc_api::new_contract))
        .route("/refund", post(htlc_api::refund))
        .route("/get-event-by-Block", post(htlc_api::get_event_by_block))
        .route("/get-contract", post(htlc_api::get_contract))
        .route(
            "/network",
            post(network_api::add_network).get(network_api::list_networks),
        )
        .route("/network/:name", patch(network_api::update_network))
        .route("/health", get(health));

    Router::new()
        .nest(
            "/blockchain-transaction",
            public_routes.merge(protected_routes),
        )
        .merge(utoipa_swagger_ui::SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(from_fn(trace_id_middleware))
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer()),
        )
        .with_state(state)
}

pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};

use crate::state::AppState;
use crate::{canva, export, library, proposal, rfp, templates};

/// Multipart bodies get headroom above the file limits so oversize files
/// reach the handlers and fail with PAYLOAD_TOO_LARGE.
const RFP_UPLOAD_BODY_LIMIT: usize = 12 * 1024 * 1024;
const ATTACHMENT_BODY_LIMIT: usize = 52 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .merge(rfp_routes())
        .merge(proposal_routes())
        .merge(template_routes())
        .merge(content_routes())
        .merge(canva_routes())
        .with_state(state)
}

fn rfp_routes() -> Router<AppState> {
    use rfp::handlers::*;

    Router::new()
        .route(
            "/api/rfp/upload",
            post(handle_upload).layer(DefaultBodyLimit::max(RFP_UPLOAD_BODY_LIMIT)),
        )
        .route("/api/rfp/analyze-url", post(handle_analyze_url))
        .route("/api/rfp/analyze-text", post(handle_analyze_text))
        .route("/api/rfp", get(handle_list_rfps))
        .route(
            "/api/rfp/:id",
            get(handle_get_rfp)
                .put(handle_update_rfp)
                .delete(handle_delete_rfp),
        )
        .route(
            "/api/rfp/:id/attachments",
            post(handle_add_attachment).layer(DefaultBodyLimit::max(ATTACHMENT_BODY_LIMIT)),
        )
}

fn proposal_routes() -> Router<AppState> {
    use export::handlers::*;
    use proposal::handlers::*;

    Router::new()
        .route("/api/proposals/generate", post(handle_generate))
        .route("/api/proposals", get(handle_list_proposals))
        .route(
            "/api/proposals/:id",
            get(handle_get_proposal).delete(handle_delete_proposal),
        )
        .route("/api/proposals/:id/sections", put(handle_update_sections))
        .route("/api/proposals/:id/status", put(handle_update_status))
        .route(
            "/api/proposals/:id/export/markdown",
            get(handle_export_markdown),
        )
        .route("/api/proposals/:id/export/docx", get(handle_export_docx))
        .route("/api/proposals/:id/export/pdf", get(handle_export_pdf))
}

fn template_routes() -> Router<AppState> {
    use templates::handlers::*;

    Router::new()
        .route(
            "/api/templates",
            get(handle_list_templates).post(handle_create_template),
        )
        .route(
            "/api/templates/:templateId",
            get(handle_get_template)
                .put(handle_update_template)
                .delete(handle_delete_template),
        )
}

fn content_routes() -> Router<AppState> {
    use library::handlers::*;

    Router::new()
        .route(
            "/api/content/companies",
            get(handle_list_companies).post(handle_create_company),
        )
        .route(
            "/api/content/companies/:companyId",
            get(handle_get_company).put(handle_update_company),
        )
        .route(
            "/api/content/companies/:companyId/team",
            get(handle_list_team).post(handle_create_team_member),
        )
        .route(
            "/api/content/team/:memberId",
            put(handle_update_team_member).delete(handle_delete_team_member),
        )
        .route(
            "/api/content/companies/:companyId/references",
            get(handle_list_references).post(handle_create_reference),
        )
        .route(
            "/api/content/references/:referenceId",
            put(handle_update_reference).delete(handle_delete_reference),
        )
}

fn canva_routes() -> Router<AppState> {
    use canva::handlers::*;

    Router::new()
        .route("/api/canva/connect", get(handle_connect))
        .route("/api/canva/callback", get(handle_callback))
        .route("/api/canva/status", get(handle_status))
        .route(
            "/api/canva/companies/:companyId/template",
            get(handle_get_company_template).put(handle_put_company_template),
        )
        .route("/api/canva/proposals/:id/diagnose", post(handle_diagnose))
        .route(
            "/api/canva/proposals/:id/create-design",
            post(handle_create_design),
        )
        .route("/api/canva/proposals/:id/export", post(handle_export_design))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::auth::JwtService;
    use crate::canva::client::CanvaClient;
    use crate::config::{CanvaConfig, Config};
    use crate::llm_client::testing::ScriptedGenerator;

    fn test_config() -> Config {
        Config {
            database_url: "postgres://localhost/proposals_test".to_string(),
            redis_url: None,
            s3_bucket: "test".to_string(),
            s3_endpoint: "http://localhost:9000".to_string(),
            aws_access_key_id: "key".to_string(),
            aws_secret_access_key: "secret".to_string(),
            anthropic_api_key: "test".to_string(),
            jwt_secret: "router-test-secret".to_string(),
            canva: CanvaConfig {
                client_id: String::new(),
                client_secret: String::new(),
                redirect_uri: "http://localhost:8080/api/canva/callback".to_string(),
                api_base: "http://localhost:1".to_string(),
                authorize_url: "http://localhost:1/authorize".to_string(),
            },
            pdf_service_url: "http://localhost:1".to_string(),
            expose_error_details: true,
            port: 0,
            rust_log: "info".to_string(),
        }
    }

    /// Router over a lazy pool; requests that reach the database would fail.
    fn test_router() -> Router {
        let config = test_config();
        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new("us-east-1"))
            .build();
        let state = AppState {
            db: PgPoolOptions::new()
                .connect_lazy(&config.database_url)
                .unwrap(),
            redis: None,
            s3: aws_sdk_s3::Client::from_conf(s3_config),
            llm: Arc::new(ScriptedGenerator::new()),
            jwt: JwtService::new(&config.jwt_secret),
            canva: CanvaClient::new(config.canva.clone()).unwrap(),
            http: reqwest::Client::new(),
            config,
        };
        build_router(state)
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let response = test_router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["service"], "proposal-api");
    }

    #[tokio::test]
    async fn test_api_routes_require_bearer_token() {
        for uri in ["/api/rfp", "/api/proposals", "/api/templates", "/api/canva/status"] {
            let response = test_router()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(json_body(response).await["code"], "UNAUTHORIZED");
        }
    }

    #[tokio::test]
    async fn test_callback_rejects_forged_state_without_auth() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/api/canva/callback?code=abc&state=not-a-jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_connect_reports_missing_canva_credentials() {
        let token = JwtService::new("router-test-secret")
            .create_token("u-1", "dana")
            .unwrap();
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/api/canva/connect")
                    .header("Authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(json_body(response).await["code"], "UPSTREAM_ERROR");
    }
}

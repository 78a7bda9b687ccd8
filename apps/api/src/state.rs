use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use redis::Client as RedisClient;
use sqlx::PgPool;

use crate::auth::JwtService;
use crate::canva::client::CanvaClient;
use crate::config::Config;
use crate::llm_client::TextGenerator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Section classification cache; `None` when REDIS_URL is unset.
    pub redis: Option<RedisClient>,
    pub s3: S3Client,
    pub llm: Arc<dyn TextGenerator>,
    pub jwt: JwtService,
    pub canva: CanvaClient,
    /// Outbound client for URL fetches, image downloads and the PDF service.
    pub http: reqwest::Client,
    pub config: Config,
}

use anyhow::{Context, Result};

const DEFAULT_JWT_SECRET: &str = "proposal-builder-dev-secret";

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Optional: the section classification cache is skipped when unset.
    pub redis_url: Option<String>,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub anthropic_api_key: String,
    pub jwt_secret: String,
    pub canva: CanvaConfig,
    /// Base URL of the DOCX -> PDF conversion service.
    pub pdf_service_url: String,
    /// Include debug `message` fields in error responses.
    pub expose_error_details: bool,
    pub port: u16,
    pub rust_log: String,
}

#[derive(Debug, Clone)]
pub struct CanvaConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub api_base: String,
    pub authorize_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let expose_error_details = match std::env::var("EXPOSE_ERROR_DETAILS") {
            Ok(v) => parse_bool(&v).context("EXPOSE_ERROR_DETAILS must be true or false")?,
            Err(_) => app_env != "production",
        };

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: std::env::var("REDIS_URL").ok().filter(|v| !v.is_empty()),
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            jwt_secret: std::env::var("JWT_SECRET")
                .unwrap_or_else(|_| DEFAULT_JWT_SECRET.to_string()),
            canva: CanvaConfig {
                client_id: std::env::var("CANVA_CLIENT_ID").unwrap_or_default(),
                client_secret: std::env::var("CANVA_CLIENT_SECRET").unwrap_or_default(),
                redirect_uri: std::env::var("CANVA_REDIRECT_URI").unwrap_or_else(|_| {
                    "http://localhost:8080/api/canva/callback".to_string()
                }),
                api_base: std::env::var("CANVA_API_BASE")
                    .unwrap_or_else(|_| "https://api.canva.com/rest/v1".to_string()),
                authorize_url: std::env::var("CANVA_AUTHORIZE_URL")
                    .unwrap_or_else(|_| "https://www.canva.com/api/oauth/authorize".to_string()),
            },
            pdf_service_url: std::env::var("PDF_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            expose_error_details,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => anyhow::bail!("invalid boolean '{other}'"),
    }
}

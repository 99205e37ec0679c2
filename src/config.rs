use std::env;
use std::str::FromStr;

use thiserror::Error;

const HOST: &str = "0.0.0.0";
const PORT: u16 = 8080;
const DATABASE_NAME: &str = "stayhub";
const JWT_EXPIRES_HOURS: i64 = 24;
const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
const EMAIL_FROM: &str = "no-reply@stayhub.local";
const CLIENT_URL: &str = "http://localhost:3000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{0} has an invalid value: {1}")]
    Invalid(&'static str, String),
}

/// Runtime settings, read once at startup from the process environment
/// (and `.env` when present).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub mongodb_uri: String,
    pub database_name: String,
    pub jwt_secret: String,
    pub jwt_expires_hours: i64,
    pub media_bucket: String,
    /// Upper bound for a single uploaded image or payment proof.
    pub max_upload_bytes: usize,
    /// Outbound email is disabled when no key is configured.
    pub sendgrid_api_key: Option<String>,
    pub email_from: String,
    /// Base URL used to build links in outbound email.
    pub client_url: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| HOST.to_string()),
            port: parsed("PORT", PORT)?,
            mongodb_uri: required("MONGODB_URI")?,
            database_name: env::var("DATABASE_NAME").unwrap_or_else(|_| DATABASE_NAME.to_string()),
            jwt_secret: required("JWT_SECRET")?,
            jwt_expires_hours: parsed("JWT_EXPIRES_HOURS", JWT_EXPIRES_HOURS)?,
            media_bucket: required("MEDIA_BUCKET")?,
            max_upload_bytes: parsed("MAX_UPLOAD_BYTES", MAX_UPLOAD_BYTES)?,
            sendgrid_api_key: env::var("SENDGRID_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            email_from: env::var("EMAIL_FROM").unwrap_or_else(|_| EMAIL_FROM.to_string()),
            client_url: env::var("CLIENT_URL").unwrap_or_else(|_| CLIENT_URL.to_string()),
        })
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn parsed<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(key, raw)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsed_falls_back_to_default_when_unset() {
        let port: u16 = parsed("STAYHUB_TEST_UNSET_PORT", 8080).unwrap();
        assert_eq!(port, 8080);
    }

    #[test]
    fn required_reports_the_missing_key() {
        match required("STAYHUB_TEST_UNSET_SECRET") {
            Err(ConfigError::Missing(key)) => assert_eq!(key, "STAYHUB_TEST_UNSET_SECRET"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}

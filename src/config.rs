use anyhow::{bail, Context, Result};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

impl Environment {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "prod" | "production" => Self::Prod,
            "staging" => Self::Staging,
            _ => Self::Dev,
        }
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, Self::Dev)
    }
}

/// Which destination backend to construct at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    /// Real Drive/Sheets APIs.
    Google,
    /// In-process recording backend; dry runs and local development.
    Memory,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub env: Environment,
    pub server_addr: String,

    // CORS
    pub cors_allow_origins: Vec<String>,

    // Destination backend
    pub backend: BackendKind,
    pub drive_api_url: String,
    pub drive_upload_url: String,
    pub sheets_api_url: String,
    /// OAuth access token for the Drive/Sheets calls. Required for the
    /// google backend; the session layer that refreshes it lives upstream.
    pub google_access_token: String,
    /// Drive folder all work-order asset folders are created under.
    pub assets_root_folder_id: String,
    pub api_timeout_seconds: u64,

    // Asset uploads
    pub upload_timeout_seconds: u64,
    pub upload_pacing_ms: u64,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let env = Environment::from_str(&env::var("ENV").unwrap_or_else(|_| "dev".to_string()));
        let server_addr = env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        // CORS
        let cors_allow_origins = env::var("CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        // Destination backend
        let backend = match env::var("BACKEND")
            .unwrap_or_else(|_| "google".to_string())
            .to_lowercase()
            .as_str()
        {
            "google" => BackendKind::Google,
            "memory" => BackendKind::Memory,
            other => bail!("unknown BACKEND '{other}' (expected 'google' or 'memory')"),
        };

        let drive_api_url = env::var("DRIVE_API_URL")
            .unwrap_or_else(|_| "https://www.googleapis.com/drive/v3".to_string());
        let drive_upload_url = env::var("DRIVE_UPLOAD_URL")
            .unwrap_or_else(|_| "https://www.googleapis.com/upload/drive/v3".to_string());
        let sheets_api_url = env::var("SHEETS_API_URL")
            .unwrap_or_else(|_| "https://sheets.googleapis.com/v4".to_string());

        // Credentials and the destination container are preconditions for
        // the real backend; fail at startup, not mid-submission.
        let (google_access_token, assets_root_folder_id) = match backend {
            BackendKind::Google => (
                env::var("GOOGLE_ACCESS_TOKEN").context("GOOGLE_ACCESS_TOKEN must be set")?,
                env::var("ASSETS_ROOT_FOLDER_ID").context("ASSETS_ROOT_FOLDER_ID must be set")?,
            ),
            BackendKind::Memory => (
                env::var("GOOGLE_ACCESS_TOKEN").unwrap_or_default(),
                env::var("ASSETS_ROOT_FOLDER_ID").unwrap_or_default(),
            ),
        };

        let api_timeout_seconds = env::var("API_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        // Asset uploads
        let upload_timeout_seconds = env::var("UPLOAD_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);
        let upload_pacing_ms = env::var("UPLOAD_PACING_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1200);

        Ok(Settings {
            env,
            server_addr,
            cors_allow_origins,
            backend,
            drive_api_url,
            drive_upload_url,
            sheets_api_url,
            google_access_token,
            assets_root_folder_id,
            api_timeout_seconds,
            upload_timeout_seconds,
            upload_pacing_ms,
        })
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_seconds)
    }

    pub fn upload_pacing(&self) -> Duration {
        Duration::from_millis(self.upload_pacing_ms)
    }
}

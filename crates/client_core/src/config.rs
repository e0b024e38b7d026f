use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use shared::protocol::ANALYZE_RESUME_FUNCTION;

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_FILE: &str = "recruitiq.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_key: String,
    pub auth_domain: String,
    pub project_id: String,
    pub storage_bucket: String,
    pub functions_region: String,
    pub scoring_function: String,
    pub identity_base_url: String,
    pub token_base_url: String,
    pub storage_base_url: String,
    pub functions_base_url: Option<String>,
    pub request_timeout_secs: u64,
    pub session_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            auth_domain: String::new(),
            project_id: String::new(),
            storage_bucket: String::new(),
            functions_region: "us-central1".into(),
            scoring_function: ANALYZE_RESUME_FUNCTION.into(),
            identity_base_url: "https://identitytoolkit.googleapis.com/v1".into(),
            token_base_url: "https://securetoken.googleapis.com/v1".into(),
            storage_base_url: "https://firebasestorage.googleapis.com/v0".into(),
            functions_base_url: None,
            request_timeout_secs: 70,
            session_file: dirs::data_dir().map(|dir| dir.join("recruitiq").join("session.json")),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Missing("api_key"));
        }
        if self.project_id.trim().is_empty() {
            return Err(ConfigError::Missing("project_id"));
        }
        if self.storage_bucket.trim().is_empty() {
            return Err(ConfigError::Missing("storage_bucket"));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "request_timeout_secs",
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn functions_endpoint(&self) -> String {
        match &self.functions_base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!(
                "https://{}-{}.cloudfunctions.net",
                self.functions_region, self.project_id
            ),
        }
    }

    /// Handler URL the provider redirects back to after federated sign-in.
    pub fn auth_handler_url(&self) -> String {
        let domain = if self.auth_domain.is_empty() {
            format!("{}.firebaseapp.com", self.project_id)
        } else {
            self.auth_domain.clone()
        };
        format!("https://{domain}/__/auth/handler")
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_key: Option<String>,
    auth_domain: Option<String>,
    project_id: Option<String>,
    storage_bucket: Option<String>,
    functions_region: Option<String>,
    scoring_function: Option<String>,
    identity_base_url: Option<String>,
    token_base_url: Option<String>,
    storage_base_url: Option<String>,
    functions_base_url: Option<String>,
    request_timeout_secs: Option<u64>,
    session_file: Option<PathBuf>,
}

/// Defaults, then the TOML file (explicit path or `recruitiq.toml`), then
/// environment variables.
pub fn load_settings(config_path: Option<&Path>) -> Settings {
    let mut settings = Settings::default();

    let path = config_path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<FileSettings>(&raw) {
            Ok(file_cfg) => apply_file_settings(&mut settings, file_cfg),
            Err(err) => tracing::warn!(
                path = %path.display(),
                error = %err,
                "ignoring unreadable settings file"
            ),
        }
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_file_settings(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.api_key {
        settings.api_key = v;
    }
    if let Some(v) = file_cfg.auth_domain {
        settings.auth_domain = v;
    }
    if let Some(v) = file_cfg.project_id {
        settings.project_id = v;
    }
    if let Some(v) = file_cfg.storage_bucket {
        settings.storage_bucket = v;
    }
    if let Some(v) = file_cfg.functions_region {
        settings.functions_region = v;
    }
    if let Some(v) = file_cfg.scoring_function {
        settings.scoring_function = v;
    }
    if let Some(v) = file_cfg.identity_base_url {
        settings.identity_base_url = v;
    }
    if let Some(v) = file_cfg.token_base_url {
        settings.token_base_url = v;
    }
    if let Some(v) = file_cfg.storage_base_url {
        settings.storage_base_url = v;
    }
    if let Some(v) = file_cfg.functions_base_url {
        settings.functions_base_url = Some(v);
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = file_cfg.session_file {
        settings.session_file = Some(v);
    }
}

/// Each key is read as `RECRUITIQ_<KEY>` and then `APP__<KEY>`; the later
/// spelling wins.
fn apply_env_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    let get = |key: &str| {
        lookup(&format!("APP__{key}")).or_else(|| lookup(&format!("RECRUITIQ_{key}")))
    };

    if let Some(v) = get("API_KEY") {
        settings.api_key = v;
    }
    if let Some(v) = get("AUTH_DOMAIN") {
        settings.auth_domain = v;
    }
    if let Some(v) = get("PROJECT_ID") {
        settings.project_id = v;
    }
    if let Some(v) = get("STORAGE_BUCKET") {
        settings.storage_bucket = v;
    }
    if let Some(v) = get("FUNCTIONS_REGION") {
        settings.functions_region = v;
    }
    if let Some(v) = get("SCORING_FUNCTION") {
        settings.scoring_function = v;
    }
    if let Some(v) = get("IDENTITY_BASE_URL") {
        settings.identity_base_url = v;
    }
    if let Some(v) = get("TOKEN_BASE_URL") {
        settings.token_base_url = v;
    }
    if let Some(v) = get("STORAGE_BASE_URL") {
        settings.storage_base_url = v;
    }
    if let Some(v) = get("FUNCTIONS_BASE_URL") {
        settings.functions_base_url = Some(v);
    }
    if let Some(v) = get("REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }
    if let Some(v) = get("SESSION_FILE") {
        settings.session_file = Some(PathBuf::from(v));
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;

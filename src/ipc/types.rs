use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use rusqlite::Connection;
use serde::Deserialize;

use crate::api::{ApiError, HttpApi};
use crate::config::{self, BackendSettings, EnvConfig, SetupSection};
use crate::session::AttendanceSession;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// What an HTTP client was built for; a change in any field rebuilds it.
#[derive(Clone, PartialEq, Eq)]
struct ClientKey {
    base_url: String,
    timeout: Duration,
    token: Option<String>,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub env: EnvConfig,
    pub token: Option<String>,
    pub sessions: HashMap<String, AttendanceSession>,
    http: Option<(ClientKey, HttpApi)>,
    clients_built: usize,
}

impl AppState {
    pub fn new(env: EnvConfig) -> Self {
        let token = env.token.clone();
        Self {
            workspace: None,
            db: None,
            env,
            token,
            sessions: HashMap::new(),
            http: None,
            clients_built: 0,
        }
    }

    pub fn section(&self, section: SetupSection) -> anyhow::Result<serde_json::Value> {
        config::load_section(self.db.as_ref(), section, &self.env)
    }

    pub fn backend_settings(&self) -> anyhow::Result<BackendSettings> {
        let v = self.section(SetupSection::Backend)?;
        Ok(BackendSettings::from_section(&v, &self.env))
    }

    /// Backend client for the current settings and token. The underlying
    /// connection pool is reused until one of them changes.
    pub fn api(&mut self, settings: &BackendSettings) -> Result<HttpApi, ApiError> {
        let key = ClientKey {
            base_url: settings.base_url.clone(),
            timeout: settings.timeout,
            token: self.token.clone(),
        };
        if let Some((cached_key, api)) = &self.http {
            if *cached_key == key {
                return Ok(api.clone());
            }
        }
        let api = HttpApi::new(&key.base_url, key.token.clone(), key.timeout)?;
        self.clients_built += 1;
        log::debug!(
            "http client {} built for {} (timeout {:?})",
            self.clients_built,
            key.base_url,
            key.timeout
        );
        self.http = Some((key, api.clone()));
        Ok(api)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SaveMode;

    fn env() -> EnvConfig {
        EnvConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            token: None,
            timeout_secs: 5,
        }
    }

    fn settings(base_url: &str, secs: u64) -> BackendSettings {
        BackendSettings {
            base_url: base_url.to_string(),
            timeout: Duration::from_secs(secs),
            save_mode: SaveMode::Sequential,
        }
    }

    #[test]
    fn http_client_is_reused_until_settings_or_token_change() {
        let mut state = AppState::new(env());
        let s = settings("http://127.0.0.1:9", 5);
        state.api(&s).expect("client");
        state.api(&s).expect("client");
        assert_eq!(state.clients_built, 1);

        state.api(&settings("http://127.0.0.1:9", 6)).expect("client");
        assert_eq!(state.clients_built, 2);

        state.token = Some("secret".to_string());
        state.api(&settings("http://127.0.0.1:9", 6)).expect("client");
        assert_eq!(state.clients_built, 3);

        state.api(&settings("http://127.0.0.1:10", 6)).expect("client");
        state.api(&settings("http://127.0.0.1:10", 6)).expect("client");
        assert_eq!(state.clients_built, 4);
    }
}

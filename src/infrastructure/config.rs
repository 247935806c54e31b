use crate::domain::module::ModuleConfig;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

const ENV_PREFIX: &str = "GRAPHS";

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    pub home_assistant: HomeAssistantSettings,
    /// Directory of the persisted history cache; memory only when unset
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
    #[serde(default = "default_state_refresh_secs")]
    pub state_refresh_secs: u64,
    #[serde(default = "default_history_refresh_secs")]
    pub history_refresh_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HomeAssistantSettings {
    pub base_url: String,
    pub token: String,
    #[serde(default = "default_prefer_websocket")]
    pub prefer_websocket: bool,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct GraphsConfig {
    #[serde(default)]
    pub modules: Vec<ModuleConfig>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_state_refresh_secs() -> u64 {
    30
}

fn default_history_refresh_secs() -> u64 {
    300
}

fn default_prefer_websocket() -> bool {
    true
}

fn default_request_timeout_secs() -> u64 {
    15
}

pub fn load_server_config() -> anyhow::Result<ServerConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/server"))
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

pub fn load_graphs_config() -> anyhow::Result<GraphsConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/graphs").required(false))
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Replace `${name}` template variables in a request path
pub fn prepare_query(query: &str, vars: &HashMap<String, String>) -> String {
    let mut result = query.to_string();
    for (key, value) in vars {
        let placeholder = format!("${{{}}}", key);
        result = result.replace(&placeholder, value);
    }
    result
}

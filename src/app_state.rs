use std::path::{Path, PathBuf};

use crate::constants::CONFIG_PATH_ENV;
use crate::seerr::client::SeerrClient;
use crate::seerr::config::AppConfig;

pub struct AppState {
    pub config_path: PathBuf,
    pub seerr: SeerrClient,
}

/// `SEERR_GATEWAY_CONFIG`, else `./user-data/config.toml`.
pub fn config_path_from_env() -> PathBuf {
    if let Ok(p) = std::env::var(CONFIG_PATH_ENV) {
        if !p.trim().is_empty() {
            return PathBuf::from(p);
        }
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    cwd.join("user-data").join("config.toml")
}

pub fn load_or_init_config(path: &Path) -> anyhow::Result<AppConfig> {
    if path.exists() {
        let txt = std::fs::read_to_string(path)?;
        let cfg: AppConfig = toml::from_str(&txt)?;
        return Ok(cfg);
    }
    let cfg = AppConfig::default_config();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(&cfg)?)?;
    log::info!("wrote default config to {}", path.display());
    Ok(cfg)
}

pub fn build_state(config_path: PathBuf) -> anyhow::Result<AppState> {
    let cfg = load_or_init_config(&config_path)?;
    let seerr = SeerrClient::new(cfg)?;
    Ok(AppState { config_path, seerr })
}

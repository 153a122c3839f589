use std::path::{Path, PathBuf};

use super::types::AppConfig;

/// Get the default data directory: ~/.triggerfail
fn get_data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".triggerfail"))
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    // Priority 1: ~/.triggerfail/config.toml
    let user_config = get_data_dir().ok().map(|d| d.join("config.toml"));

    // Priority 2: ./triggerfail.toml (current directory)
    let local_config = Path::new("triggerfail.toml");

    let cfg = match user_config.filter(|p| p.exists()) {
        Some(p) => read_config(&p)?,
        None if local_config.exists() => read_config(local_config)?,
        None => AppConfig::default(),
    };

    Ok(apply_env_overrides(cfg))
}

pub fn load_from_path(path: impl AsRef<Path>) -> anyhow::Result<AppConfig> {
    let cfg = read_config(path.as_ref())?;
    Ok(apply_env_overrides(cfg))
}

fn read_config(path: &Path) -> anyhow::Result<AppConfig> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("read {} failed: {e}", path.display()))?;
    let cfg = toml::from_str::<AppConfig>(&s)
        .map_err(|e| anyhow::anyhow!("parse {} failed: {e}", path.display()))?;
    Ok(cfg)
}

// Environment variable overrides (Priority 0: highest)
fn apply_env_overrides(mut cfg: AppConfig) -> AppConfig {
    if let Some(v) = env_flag("TRIGGERFAIL_ABORT") {
        cfg.run.abort = v;
    }
    if let Some(v) = env_flag("TRIGGERFAIL_VERBOSE") {
        cfg.run.verbose = v;
    }
    if let Ok(v) = std::env::var("TRIGGERFAIL_LOG") {
        if !v.trim().is_empty() {
            cfg.logging.level = v;
        }
    }
    cfg
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name).ok().and_then(|v| parse_flag(&v))
}

fn parse_flag(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "" => None,
        "1" | "true" | "yes" | "on" => Some(true),
        _ => Some(false),
    }
}

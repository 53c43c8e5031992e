//! `celsia config`: configuration management commands.

use super::{config_file, load_config};
use celsia_config::AppConfig;
use std::path::Path;

const MASK: &str = "********";

pub async fn show(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = masked(load_config(config_path)?);
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn init(config_path: Option<&Path>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_file(config_path);
    if path.exists() && !force {
        return Err(format!("{} already exists (use --force to overwrite)", path.display()).into());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, AppConfig::default_toml())?;
    println!("✅ Wrote default configuration to {}", path.display());
    Ok(())
}

pub async fn path(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", config_file(config_path).display());
    Ok(())
}

fn masked(mut config: AppConfig) -> AppConfig {
    if config.llm.api_key.is_some() {
        config.llm.api_key = Some(MASK.into());
    }
    if config.embedding.api_key.is_some() {
        config.embedding.api_key = Some(MASK.into());
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_is_valid() {
        let path = config_file(None);
        assert!(path.to_str().unwrap().contains("config.toml"));
        assert_eq!(config_file(Some(Path::new("/etc/celsia.toml"))), Path::new("/etc/celsia.toml"));
    }

    #[test]
    fn api_keys_are_masked() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("sk-secret".into());
        let shown = toml::to_string_pretty(&masked(config)).unwrap();
        assert!(!shown.contains("sk-secret"));
        assert!(shown.contains(MASK));
    }

    #[tokio::test]
    async fn init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        init(Some(path.as_path()), false).await.unwrap();
        let written = AppConfig::load_from(&path).unwrap();
        assert_eq!(written.llm.model, AppConfig::default().llm.model);

        assert!(init(Some(path.as_path()), false).await.is_err());
        assert!(init(Some(path.as_path()), true).await.is_ok());
    }
}

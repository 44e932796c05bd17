use std::{collections::HashMap, env, fs, path::PathBuf};

use crate::errors::ConfigError;

use super::container_config::{
    ContainerConfig, PartialContainerConfig, ENV_ALLOW_PROVIDER_RESOURCES,
    ENV_USE_DEFAULT_PROVIDERS,
};

/// Configuration loader: optional TOML file, then environment, then defaults.
pub struct ConfigLoader {
    path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Environment and defaults only
    pub fn new() -> Self {
        Self { path: None }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn load(&self) -> Result<ContainerConfig, ConfigError> {
        let partial = self.load_partial_config()?;
        let env_map = collect_env_vars();
        let config = ContainerConfig::from_partial_and_env(partial, &env_map);
        tracing::debug!(?config, path = ?self.path, "container configuration loaded");
        Ok(config)
    }

    /// A missing file is not an error; an unreadable or malformed one is.
    fn load_partial_config(&self) -> Result<Option<PartialContainerConfig>, ConfigError> {
        let Some(path) = &self.path else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string_lossy().to_string(), e))?;
        let partial = toml::from_str(&content).map_err(ConfigError::TomlParse)?;
        Ok(Some(partial))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn collect_env_vars() -> HashMap<String, String> {
    let mut env_map = HashMap::new();
    for key in [ENV_ALLOW_PROVIDER_RESOURCES, ENV_USE_DEFAULT_PROVIDERS] {
        if let Ok(value) = env::var(key) {
            env_map.insert(key.to_string(), value);
        }
    }
    env_map
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_falls_back() {
        let loader = ConfigLoader::with_path("/definitely/not/here/wiring.toml");
        assert!(loader.load_partial_config().unwrap().is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "allow_provider_resources = true").unwrap();
        writeln!(file, "use_default_providers = false").unwrap();

        let partial = ConfigLoader::with_path(file.path())
            .load_partial_config()
            .unwrap()
            .unwrap();
        assert_eq!(partial.allow_provider_resources, Some(true));
        assert_eq!(partial.use_default_providers, Some(false));
    }

    #[test]
    fn test_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "use_default_providers = [").unwrap();

        let err = ConfigLoader::with_path(file.path()).load().unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse(_)));
    }
}

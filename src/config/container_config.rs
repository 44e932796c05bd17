use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::errors::ConfigError;

pub const ENV_ALLOW_PROVIDER_RESOURCES: &str = "WIRING_ALLOW_PROVIDER_RESOURCES";
pub const ENV_USE_DEFAULT_PROVIDERS: &str = "WIRING_USE_DEFAULT_PROVIDERS";

/// 容器行为配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// 是否允许直接请求提供者的私有资源与覆盖资源
    pub allow_provider_resources: bool,
    /// 只声明了模块的注册在关闭时是否回退到模块的默认提供者
    pub use_default_providers: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            allow_provider_resources: false,
            use_default_providers: true,
        }
    }
}

/// Configuration as read from a file: every field optional.
#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct PartialContainerConfig {
    pub allow_provider_resources: Option<bool>,
    pub use_default_providers: Option<bool>,
}

impl ContainerConfig {
    /// Permissive preset, mostly useful in tests that poke at provider internals.
    pub fn permissive() -> Self {
        Self {
            allow_provider_resources: true,
            use_default_providers: true,
        }
    }

    pub fn with_provider_resources(mut self, allow: bool) -> Self {
        self.allow_provider_resources = allow;
        self
    }

    pub fn with_default_providers(mut self, enabled: bool) -> Self {
        self.use_default_providers = enabled;
        self
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let partial: PartialContainerConfig =
            toml::from_str(content).map_err(ConfigError::TomlParse)?;
        Ok(Self::from_partial_and_env(Some(partial), &HashMap::new()))
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(ConfigError::TomlSerialize)
    }

    /// 文件配置优先，其次环境变量，最后是默认值
    pub fn from_partial_and_env(
        partial: Option<PartialContainerConfig>,
        env_map: &HashMap<String, String>,
    ) -> Self {
        let partial = partial.unwrap_or_default();
        let defaults = Self::default();
        let env_flag = |key: &str| env_map.get(key).and_then(|value| parse_flag(value));

        Self {
            allow_provider_resources: partial
                .allow_provider_resources
                .or_else(|| env_flag(ENV_ALLOW_PROVIDER_RESOURCES))
                .unwrap_or(defaults.allow_provider_resources),
            use_default_providers: partial
                .use_default_providers
                .or_else(|| env_flag(ENV_USE_DEFAULT_PROVIDERS))
                .unwrap_or(defaults.use_default_providers),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ContainerConfig::default();
        assert!(!config.allow_provider_resources);
        assert!(config.use_default_providers);
    }

    #[test]
    fn test_from_toml_str_fills_missing_fields() {
        let config = ContainerConfig::from_toml_str("allow_provider_resources = true\n").unwrap();
        assert!(config.allow_provider_resources);
        assert!(config.use_default_providers);

        let empty = ContainerConfig::from_toml_str("").unwrap();
        assert_eq!(empty, ContainerConfig::default());
    }

    #[test]
    fn test_invalid_toml() {
        let err = ContainerConfig::from_toml_str("allow_provider_resources = \"maybe\"").unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse(_)));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = ContainerConfig::permissive().with_default_providers(false);
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("use_default_providers = false"));
        assert_eq!(ContainerConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_file_values_win_over_env() {
        let mut env_map = HashMap::new();
        env_map.insert(ENV_ALLOW_PROVIDER_RESOURCES.to_string(), "yes".to_string());
        env_map.insert(ENV_USE_DEFAULT_PROVIDERS.to_string(), "off".to_string());

        let from_env = ContainerConfig::from_partial_and_env(None, &env_map);
        assert!(from_env.allow_provider_resources);
        assert!(!from_env.use_default_providers);

        let partial = PartialContainerConfig {
            allow_provider_resources: Some(false),
            use_default_providers: None,
        };
        let merged = ContainerConfig::from_partial_and_env(Some(partial), &env_map);
        assert!(!merged.allow_provider_resources);
        assert!(!merged.use_default_providers);
    }

    #[test]
    fn test_unparseable_env_flag_is_ignored() {
        let mut env_map = HashMap::new();
        env_map.insert(ENV_USE_DEFAULT_PROVIDERS.to_string(), "sometimes".to_string());
        let config = ContainerConfig::from_partial_and_env(None, &env_map);
        assert!(config.use_default_providers);
    }
}

//! Configuration management for Arbor.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (ARBOR__ prefix, `__` separator)
//! 2. Config file (arbor.toml by default)
//! 3. Defaults

use serde::Deserialize;

/// Store-level settings, the `[store]` section of the config file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct StoreConfig {
    /// JSON snapshot the graph is loaded from and saved to.
    #[serde(default)]
    pub snapshot_path: Option<String>,

    /// Page size used when a listing request does not specify one.
    #[serde(default = "default_per_page")]
    pub default_per_page: u32,

    /// Largest accepted page size.
    #[serde(default = "default_max_per_page")]
    pub max_per_page: u32,

    /// Prepended to every search index name on dispatch.
    #[serde(default)]
    pub search_index_prefix: Option<String>,

    /// Username of the administrator created at bootstrap.
    #[serde(default = "default_admin_username")]
    pub admin_username: String,
}

fn default_per_page() -> u32 {
    25
}

fn default_max_per_page() -> u32 {
    1000
}

fn default_admin_username() -> String {
    "admin".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            default_per_page: default_per_page(),
            max_per_page: default_max_per_page(),
            search_index_prefix: None,
            admin_username: default_admin_username(),
        }
    }
}

impl StoreConfig {
    /// Load the `[store]` section from `<file_prefix>.toml` (optional) and
    /// `ARBOR__STORE__*` environment variables. Falls back to defaults when
    /// the section is absent.
    pub fn load(file_prefix: &str) -> Result<Self, config::ConfigError> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("ARBOR")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        match cfg.get::<StoreConfig>("store") {
            Ok(c) => Ok(c),
            Err(config::ConfigError::NotFound(_)) => Ok(StoreConfig::default()),
            Err(e) => {
                tracing::warn!(error = %e, "Invalid [store] configuration");
                Err(e)
            }
        }
    }
}

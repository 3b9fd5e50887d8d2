//! Application state for the field server.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

use field_engine::{FieldServer, FileGridStore, ServerConfig};

/// Shared application state.
pub struct AppState {
    /// Request handling over the archive tree.
    pub server: FieldServer<FileGridStore>,

    /// Root directory of the archives.
    pub data_root: PathBuf,

    /// Renders `/metrics`; absent when no recorder is installed (tests).
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    /// Build state from an already-loaded configuration.
    pub fn new(data_root: impl Into<PathBuf>, config: ServerConfig) -> Result<Self> {
        let data_root = data_root.into();
        let store = Arc::new(FileGridStore::new(data_root.clone()));
        let server = FieldServer::new(store, config).context("Invalid server configuration")?;

        Ok(Self {
            server,
            data_root,
            prometheus: None,
        })
    }

    /// Load the configuration file (or defaults), apply `FIELD_*`
    /// environment overrides and build state.
    pub fn load(data_root: impl Into<PathBuf>, config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => ServerConfig::from_file(path)?,
            None => ServerConfig::default(),
        }
        .with_env_overrides();

        info!(
            default_url = %config.url,
            domains = config.domains.len(),
            derived_fields = config.derived_fields.len(),
            rhi = config.rhi.enabled,
            "Loaded server configuration"
        );
        Self::new(data_root, config)
    }

    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }
}

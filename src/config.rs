//! Runtime configuration for the query server.
//!
//! Values come from, in increasing precedence: built-in defaults, an optional
//! TOML file, and `FTDCWATCH_*` environment variables. The binary applies CLI
//! flags on top.
//!
//! ```toml
//! listen_addr = "0.0.0.0:5408"
//! base_path = "/grafana"
//! latest = 10
//! verbose = true
//! ```

use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:5408";
const DEFAULT_BASE_PATH: &str = "/grafana";
const DEFAULT_DASHBOARD: &str = "/d/simagix-grafana/mongodb-mongo-ftdc";
const DEFAULT_DISKS_DASHBOARD: &str = "/d/simagix-grafana-disks/mongodb-disks-stats";
const DEFAULT_BLOCKS: usize = 3;

/// Configuration for the dashboard datasource server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "0.0.0.0:5408")
    pub listen_addr: String,
    /// Prefix stripped from request paths before routing
    pub base_path: String,
    /// Main dashboard path used for endpoint links
    pub dashboard_path: String,
    /// Disk statistics dashboard path used for endpoint links
    pub disks_dashboard_path: String,
    /// Keep unscored assessment rows and show host names
    pub verbose: bool,
    /// Only ingest the last N files
    pub latest: Option<usize>,
    /// Metric blocks per assessment table row
    pub blocks: usize,
    /// Ingestion worker threads
    pub workers: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            base_path: DEFAULT_BASE_PATH.to_string(),
            dashboard_path: DEFAULT_DASHBOARD.to_string(),
            disks_dashboard_path: DEFAULT_DISKS_DASHBOARD.to_string(),
            verbose: false,
            latest: None,
            blocks: DEFAULT_BLOCKS,
            workers: None,
        }
    }
}

impl ServerConfig {
    /// Create a new builder for ServerConfig.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Load from an optional file layered under `FTDCWATCH_*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        builder
            .add_source(Environment::with_prefix("FTDCWATCH").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Replace the port of the listen address, keeping the host.
    pub fn set_port(&mut self, port: u16) {
        let host = self
            .listen_addr
            .rsplit_once(':')
            .map(|(host, _)| host)
            .unwrap_or(self.listen_addr.as_str());
        self.listen_addr = format!("{}:{}", host, port);
    }

    /// Dashboard paths that endpoint links are generated for.
    pub fn dashboards(&self) -> [&str; 2] {
        [&self.dashboard_path, &self.disks_dashboard_path]
    }
}

/// Builder for ServerConfig.
#[derive(Debug, Default)]
pub struct ServerConfigBuilder {
    listen_addr: Option<String>,
    base_path: Option<String>,
    verbose: bool,
    latest: Option<usize>,
    blocks: Option<usize>,
    workers: Option<usize>,
}

impl ServerConfigBuilder {
    /// Set the listen address.
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = Some(addr.into());
        self
    }

    /// Set the path prefix.
    pub fn base_path(mut self, path: impl Into<String>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Only ingest the last `n` files.
    pub fn latest(mut self, n: usize) -> Self {
        self.latest = Some(n);
        self
    }

    pub fn blocks(mut self, blocks: usize) -> Self {
        self.blocks = Some(blocks);
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Build the ServerConfig.
    pub fn build(self) -> ServerConfig {
        let defaults = ServerConfig::default();
        ServerConfig {
            listen_addr: self.listen_addr.unwrap_or(defaults.listen_addr),
            base_path: self.base_path.unwrap_or(defaults.base_path),
            verbose: self.verbose,
            latest: self.latest,
            blocks: self.blocks.unwrap_or(defaults.blocks),
            workers: self.workers,
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_builder_defaults() {
        let config = ServerConfig::builder().build();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.listen_addr, "0.0.0.0:5408");
        assert_eq!(config.base_path, "/grafana");
    }

    #[test]
    fn test_builder_overrides() {
        let config = ServerConfig::builder()
            .listen_addr("127.0.0.1:3000")
            .base_path("")
            .verbose(true)
            .latest(5)
            .blocks(2)
            .build();
        assert_eq!(config.listen_addr, "127.0.0.1:3000");
        assert!(config.base_path.is_empty());
        assert!(config.verbose);
        assert_eq!(config.latest, Some(5));
        assert_eq!(config.blocks, 2);
        assert_eq!(config.dashboard_path, DEFAULT_DASHBOARD);
    }

    #[test]
    fn test_set_port_keeps_host() {
        let mut config = ServerConfig::default();
        config.set_port(3030);
        assert_eq!(config.listen_addr, "0.0.0.0:3030");
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "listen_addr = \"127.0.0.1:9999\"").unwrap();
        writeln!(file, "latest = 3").unwrap();
        writeln!(file, "dashboard_path = \"/d/custom\"").unwrap();

        let config = ServerConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:9999");
        assert_eq!(config.latest, Some(3));
        assert_eq!(config.dashboards(), ["/d/custom", DEFAULT_DISKS_DASHBOARD]);
        assert_eq!(config.blocks, DEFAULT_BLOCKS);
    }
}

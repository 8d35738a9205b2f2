//! Configuration management for the modelgate service.
//!
//! Configuration is loaded from multiple sources, in order of precedence:
//! 1. Built-in defaults
//! 2. User-specified configuration file (TOML)
//! 3. Environment variables (prefixed with `MODELGATE_`, `__` as the
//!    section separator, e.g. `MODELGATE_SERVER__PORT`)
//! 4. Command-line arguments
//!
//! Artifact-store credentials are never read from the config file:
//! - `MODELGATE_ARTIFACT_KEY` - remote artifact store access key
//! - `MODELGATE_ARTIFACT_SECRET` - remote artifact store secret

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::artifact::Credentials;
use crate::error::{Error, Result};
use crate::factory::ServiceKind;

/// Command-line arguments
#[derive(Debug, Parser)]
#[clap(version, about)]
pub struct Args {
    /// Configuration file path
    #[clap(short, long)]
    pub config: Option<PathBuf>,

    /// Artifact location (folder containing manifest.json)
    #[clap(long)]
    pub artifact: Option<String>,

    /// Model name override (defaults to the name in the artifact manifest)
    #[clap(long)]
    pub model_name: Option<String>,

    /// Service kind to assemble
    #[clap(long, value_enum)]
    pub service: Option<ServiceKind>,

    /// Comma-separated cache server list, e.g. 127.0.0.1:11211,127.0.0.1:11212
    #[clap(long)]
    pub cache_servers: Option<String>,

    /// Cache client pool size
    #[clap(long)]
    pub cache_pool_size: Option<usize>,

    /// RPC worker count
    #[clap(long)]
    pub workers: Option<usize>,

    /// Listen host
    #[clap(long)]
    pub host: Option<String>,

    /// Listen port
    #[clap(long)]
    pub port: Option<u16>,
}

/// Service configuration, immutable once loaded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Which service to assemble
    #[serde(default)]
    pub service: ServiceKind,
    /// Listener configuration
    #[serde(default)]
    pub server: ServerSettings,
    /// Artifact configuration
    #[serde(default)]
    pub artifact: ArtifactSettings,
    /// Cache configuration
    #[serde(default)]
    pub cache: CacheSettings,
    /// RPC configuration
    #[serde(default)]
    pub rpc: RpcSettings,
}

/// Network listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Listen host
    #[serde(default = "default_host")]
    pub host: String,
    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Graceful-shutdown drain deadline in seconds
    #[serde(default = "default_drain_secs")]
    pub drain_secs: u64,
}

/// Artifact location and naming
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactSettings {
    /// Folder or URI the artifact loader resolves
    #[serde(default)]
    pub location: String,
    /// Model name override
    #[serde(default)]
    pub name: Option<String>,
}

/// Cache backend and client pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Comma-separated `host:port` cache server list; cache disabled if unset
    #[serde(default)]
    pub servers: Option<String>,
    /// Fixed client pool size
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Bounded wait for a pool checkout, in milliseconds
    #[serde(default = "default_wait_ms")]
    pub wait_ms: u64,
    /// Cached entry expiry in seconds, 0 for no expiry
    #[serde(default)]
    pub ttl_secs: u64,
}

/// RPC service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcSettings {
    /// Fixed worker pool size bounding concurrent calls
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            drain_secs: default_drain_secs(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            servers: None,
            pool_size: default_pool_size(),
            wait_ms: default_wait_ms(),
            ttl_secs: 0,
        }
    }
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

impl ServerSettings {
    /// Parse the configured listen address.
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| Error::Config(format!("invalid listen address: {}", e)))
    }

    pub fn drain(&self) -> Duration {
        Duration::from_secs(self.drain_secs)
    }
}

impl CacheSettings {
    pub fn checkout_wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Settings {
    /// Load configuration from all sources.
    pub fn load(args: &Args) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Load user config if specified
        if let Some(path) = &args.config {
            builder = builder.add_source(config::File::from(path.as_path()));
        }

        // Add environment variables
        builder = builder.add_source(
            config::Environment::with_prefix("MODELGATE").separator("__"),
        );

        // Build config
        let mut settings: Settings = builder.build()?.try_deserialize()?;

        // Override with command line args
        if let Some(artifact) = &args.artifact {
            settings.artifact.location = artifact.clone();
        }
        if let Some(name) = &args.model_name {
            settings.artifact.name = Some(name.clone());
        }
        if let Some(service) = args.service {
            settings.service = service;
        }
        if let Some(servers) = &args.cache_servers {
            settings.cache.servers = Some(servers.clone());
        }
        if let Some(pool_size) = args.cache_pool_size {
            settings.cache.pool_size = pool_size;
        }
        if let Some(workers) = args.workers {
            settings.rpc.workers = workers;
        }
        if let Some(host) = &args.host {
            settings.server.host = host.clone();
        }
        if let Some(port) = args.port {
            settings.server.port = port;
        }

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.cache.pool_size == 0 {
            return Err(Error::Config("cache pool size must be positive".into()));
        }
        if self.rpc.workers == 0 {
            return Err(Error::Config("RPC worker count must be positive".into()));
        }
        Ok(())
    }

    /// Get artifact store credentials from environment
    pub fn get_credentials(&self) -> Option<Credentials> {
        let key = env::var("MODELGATE_ARTIFACT_KEY").ok()?;
        let secret = env::var("MODELGATE_ARTIFACT_SECRET").ok()?;
        Some(Credentials { key, secret })
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_drain_secs() -> u64 {
    30
}

fn default_pool_size() -> usize {
    2
}

fn default_wait_ms() -> u64 {
    250
}

fn default_workers() -> usize {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_args() -> Args {
        Args {
            config: None,
            artifact: None,
            model_name: None,
            service: None,
            cache_servers: None,
            cache_pool_size: None,
            workers: None,
            host: None,
            port: None,
        }
    }

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::load(&empty_args()).unwrap();
        assert_eq!(settings.service, ServiceKind::PredictionRest);
        assert_eq!(settings.server.port, 5000);
        assert_eq!(settings.cache.pool_size, 2);
        assert_eq!(settings.rpc.workers, 10);
        assert!(settings.cache.servers.is_none());
    }

    #[test]
    fn test_cli_overrides() {
        let mut args = empty_args();
        args.port = Some(7001);
        args.service = Some(ServiceKind::RecommendationRest);
        args.cache_servers = Some("127.0.0.1:11211".to_string());
        args.cache_pool_size = Some(4);

        let settings = Settings::load(&args).unwrap();
        assert_eq!(settings.server.port, 7001);
        assert_eq!(settings.service, ServiceKind::RecommendationRest);
        assert_eq!(settings.cache.servers.as_deref(), Some("127.0.0.1:11211"));
        assert_eq!(settings.cache.pool_size, 4);
    }

    #[test]
    fn test_zero_pool_size_rejected() {
        let mut args = empty_args();
        args.cache_pool_size = Some(0);
        assert!(Settings::load(&args).is_err());
    }
}

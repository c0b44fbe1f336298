// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Runtime orchestration.
//!
//! This module assembles the tapline components from a loaded
//! configuration and runs them until shutdown:
//!
//! - History sink selection (SQLite, CSV, or in-memory)
//! - Transport and session construction from the endpoint
//! - Historian pipeline wiring and optional autostart
//! - API server with graceful shutdown
//!
//! The same wiring helpers back the one-shot CLI commands, which build
//! a session or a sink without the full runtime.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use tapline_api::{ApiResult, ApiServer, AppState};
use tapline_client::{SessionConfig, SessionManager, SimTransport, Transport};
use tapline_config::{load_config, ClientConfig, ServerRegistry, StoreConfig, TaplineConfig};
use tapline_core::RetryPolicy;
use tapline_historian::{HistorianConfig, HistorianPipeline};
use tapline_store::{CsvSink, HistorySink, MemorySink, SqliteHistorySink};

use crate::error::{BinError, BinResult};
use crate::shutdown::{ShutdownCoordinator, ShutdownGuard};

/// Registry file kept next to the configuration file.
const REGISTRY_FILE: &str = "servers.json";

// =============================================================================
// TaplineRuntime
// =============================================================================

/// The main runtime that orchestrates all components.
///
/// The runtime is responsible for:
/// - Initializing the sink, session, pipeline, and registry in order
/// - Starting collection when the config asks for autostart
/// - Serving the REST API
/// - Coordinating graceful shutdown
pub struct TaplineRuntime {
    config: Arc<TaplineConfig>,
    registry_path: PathBuf,
    shutdown: ShutdownCoordinator,
    skip_api: bool,
    skip_autostart: bool,
}

impl TaplineRuntime {
    /// Creates a runtime over an already loaded configuration.
    pub fn new(config: TaplineConfig) -> Self {
        Self {
            config: Arc::new(config),
            registry_path: PathBuf::from(REGISTRY_FILE),
            shutdown: ShutdownCoordinator::new(),
            skip_api: false,
            skip_autostart: false,
        }
    }

    /// Returns the loaded configuration.
    pub fn config(&self) -> &TaplineConfig {
        &self.config
    }

    /// Runs until shutdown is signaled.
    pub async fn run(self) -> BinResult<()> {
        info!("Starting tapline v{}", tapline_core::VERSION);

        let components = self.initialize_components().await?;

        if self.autostart_enabled() {
            self.autostart_historian(&components).await?;
        }

        info!(
            endpoint = components.session.endpoint(),
            store = components.pipeline.sink().name(),
            "tapline is ready"
        );

        self.shutdown.wait_for_shutdown().await;

        info!("Shutdown initiated, cleaning up...");
        components.pipeline.stop().await;
        components.session.disconnect().await;
        components.pipeline.sink().close().await;

        if let Some(task) = components.api_task {
            match task.await {
                Ok(result) => result?,
                Err(e) => {
                    return Err(BinError::Runtime(format!("API server task failed: {}", e)))
                }
            }
        }

        info!("tapline shutdown complete");
        Ok(())
    }

    /// Initializes all components in dependency order.
    async fn initialize_components(&self) -> BinResult<RuntimeComponents> {
        info!("Initializing components...");

        let sink = open_sink(&self.config.store).await?;
        info!(backend = sink.name(), "History store ready");

        let session = build_session(&self.config.client)?;

        let historian_config = HistorianConfig::new()
            .with_flush_interval(self.config.historian.flush_interval())
            .with_retry(RetryPolicy::new().with_max_attempts(self.config.historian.write_attempts));
        let pipeline = Arc::new(HistorianPipeline::new(
            Arc::clone(&session),
            sink,
            historian_config,
        ));

        let api_task = if self.serve_api() {
            let registry = Arc::new(ServerRegistry::new(&self.registry_path));
            Some(self.spawn_api_server(&session, &pipeline, &registry))
        } else {
            info!("REST API disabled");
            None
        };

        Ok(RuntimeComponents {
            session,
            pipeline,
            api_task,
        })
    }

    /// Spawns the API server on its own task.
    ///
    /// The attached guard initiates shutdown if the server exits on its
    /// own (for example a failed bind), so the main loop never hangs on
    /// a dead API. The bind error itself surfaces when the task is
    /// joined during cleanup.
    fn spawn_api_server(
        &self,
        session: &Arc<SessionManager>,
        pipeline: &Arc<HistorianPipeline>,
        registry: &Arc<ServerRegistry>,
    ) -> JoinHandle<ApiResult<()>> {
        let api_config = map_api_config(&self.config.api);
        let state = AppState::new(
            api_config,
            Arc::clone(session),
            Arc::clone(pipeline),
            Arc::clone(registry),
        );
        let server = ApiServer::new(state);
        let addr = server.addr();

        let signal = self.shutdown.shutdown_signal();
        let guard = ShutdownGuard::new(self.shutdown.clone());

        info!("REST API serving on {}", addr);
        tokio::spawn(async move {
            let result = server.run_with_shutdown(signal.wait()).await;
            if let Err(e) = &result {
                error!("API server failed: {}", e);
            }
            drop(guard);
            result
        })
    }

    /// Starts collection for the configured nodes.
    ///
    /// A failure is fatal when nothing else could start collection
    /// later; with the API serving it is downgraded to a warning.
    async fn autostart_historian(&self, components: &RuntimeComponents) -> BinResult<()> {
        let nodes = &self.config.historian.nodes;
        if nodes.is_empty() {
            warn!("Historian autostart is enabled but no nodes are configured");
            return Ok(());
        }

        match components
            .pipeline
            .start(nodes, self.config.historian.interval_ms)
            .await
        {
            Ok(()) => {
                info!(
                    nodes = nodes.len(),
                    interval_ms = self.config.historian.interval_ms,
                    "Historian collecting"
                );
                Ok(())
            }
            Err(e) if components.api_task.is_some() => {
                warn!(
                    "Historian autostart failed: {}; collection can be started via the API",
                    e
                );
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn serve_api(&self) -> bool {
        self.config.api.enabled && !self.skip_api
    }

    fn autostart_enabled(&self) -> bool {
        self.config.historian.autostart && !self.skip_autostart
    }
}

// =============================================================================
// RuntimeComponents
// =============================================================================

/// Container for the running components.
struct RuntimeComponents {
    session: Arc<SessionManager>,
    pipeline: Arc<HistorianPipeline>,
    api_task: Option<JoinHandle<ApiResult<()>>>,
}

// =============================================================================
// Wiring Helpers
// =============================================================================

/// Builds a transport for the configured endpoint.
///
/// The simulator scheme is built in; real protocol bindings implement
/// [`Transport`] and get wired here.
pub fn build_transport(endpoint: &str) -> BinResult<Arc<dyn Transport>> {
    if endpoint.starts_with("sim://") {
        return Ok(Arc::new(SimTransport::new(endpoint)));
    }

    Err(BinError::Configuration(format!(
        "No transport for endpoint '{}': sim:// is the only built-in scheme",
        endpoint
    )))
}

/// Builds an unconnected session from the client configuration.
pub fn build_session(client: &ClientConfig) -> BinResult<Arc<SessionManager>> {
    let transport = build_transport(&client.endpoint)?;

    let mut session_config = SessionConfig::new()
        .with_auto_reconnect(client.auto_reconnect)
        .with_liveness_interval(client.liveness_interval());
    if let Some(security) = &client.security {
        session_config = session_config.with_security(security.clone());
    }

    Ok(Arc::new(SessionManager::new(transport, session_config)))
}

/// Builds and connects a session, for one-shot commands.
pub async fn connect_session(config: &TaplineConfig) -> BinResult<Arc<SessionManager>> {
    let session = build_session(&config.client)?;
    session.connect().await?;
    Ok(session)
}

/// Opens the configured history sink.
pub async fn open_sink(store: &StoreConfig) -> BinResult<Arc<dyn HistorySink>> {
    let sink: Arc<dyn HistorySink> = match store {
        StoreConfig::Sqlite(cfg) => {
            let sink = SqliteHistorySink::connect(&cfg.url).await.map_err(|e| {
                BinError::Initialization(format!(
                    "Failed to open SQLite store {}: {}",
                    cfg.url, e
                ))
            })?;
            Arc::new(sink)
        }
        StoreConfig::Csv(cfg) => Arc::new(CsvSink::new(&cfg.path)),
        StoreConfig::Memory => Arc::new(MemorySink::new()),
    };

    Ok(sink)
}

/// Maps the config-file API section onto the server's own config.
///
/// An empty origin list in the file means "allow any", which the
/// server spells as `*`.
pub fn map_api_config(api: &tapline_config::ApiConfig) -> tapline_api::ApiConfig {
    let allowed_origins = if api.cors.allowed_origins.is_empty() {
        vec!["*".to_string()]
    } else {
        api.cors.allowed_origins.clone()
    };

    tapline_api::ApiConfig {
        host: api.bind_address,
        port: api.port,
        cors: tapline_api::CorsConfig { allowed_origins },
        request_timeout: api.request_timeout(),
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for constructing the runtime.
pub struct RuntimeBuilder {
    config_path: Option<PathBuf>,
    config: Option<TaplineConfig>,
    registry_path: Option<PathBuf>,
    skip_api: bool,
    skip_autostart: bool,
}

impl RuntimeBuilder {
    /// Creates a new runtime builder.
    pub fn new() -> Self {
        Self {
            config_path: None,
            config: None,
            registry_path: None,
            skip_api: false,
            skip_autostart: false,
        }
    }

    /// Sets the configuration file path.
    pub fn config_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the configuration directly.
    pub fn config(mut self, config: TaplineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Overrides where the saved-server registry lives.
    ///
    /// Defaults to `servers.json` next to the configuration file.
    pub fn registry_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.registry_path = Some(path.into());
        self
    }

    /// Skips the REST API even when the config enables it.
    pub fn skip_api(mut self, skip: bool) -> Self {
        self.skip_api = skip;
        self
    }

    /// Skips historian autostart regardless of the config.
    pub fn skip_autostart(mut self, skip: bool) -> Self {
        self.skip_autostart = skip;
        self
    }

    /// Builds the runtime, loading the config file if one was not
    /// provided directly.
    pub fn build(self) -> BinResult<TaplineRuntime> {
        let (config, default_registry) = match self.config {
            Some(cfg) => (cfg, PathBuf::from(REGISTRY_FILE)),
            None => {
                let path = self
                    .config_path
                    .ok_or_else(|| BinError::Configuration("No configuration provided".into()))?;

                let config = load_config(&path).map_err(|e| {
                    BinError::Configuration(format!(
                        "Failed to load config from {}: {}",
                        path.display(),
                        e
                    ))
                })?;

                let dir = path
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."));
                (config, dir.join(REGISTRY_FILE))
            }
        };

        Ok(TaplineRuntime {
            config: Arc::new(config),
            registry_path: self.registry_path.unwrap_or(default_registry),
            shutdown: ShutdownCoordinator::new(),
            skip_api: self.skip_api,
            skip_autostart: self.skip_autostart,
        })
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_runtime_builder() {
        let runtime = RuntimeBuilder::new()
            .config(TaplineConfig::for_testing())
            .skip_api(true)
            .build()
            .unwrap();

        assert!(runtime.skip_api);
        assert!(!runtime.serve_api());
        assert_eq!(runtime.config().client.endpoint, "sim://test");
    }

    #[test]
    fn test_runtime_builder_requires_config() {
        let result = RuntimeBuilder::new().build();
        assert!(result.is_err());
    }

    #[test]
    fn test_build_transport_simulator() {
        let transport = build_transport("sim://plant-a").unwrap();
        assert_eq!(transport.endpoint(), "sim://plant-a");
    }

    #[test]
    fn test_build_transport_rejects_unknown_scheme() {
        let result = build_transport("opc.tcp://plant:4840");
        assert!(matches!(result, Err(BinError::Configuration(_))));
    }

    #[test]
    fn test_build_session_from_client_config() {
        let config = TaplineConfig::for_testing();
        let session = build_session(&config.client).unwrap();
        assert_eq!(session.endpoint(), "sim://test");
    }

    #[tokio::test]
    async fn test_open_sink_memory() {
        let sink = open_sink(&StoreConfig::Memory).await.unwrap();
        assert_eq!(sink.name(), "memory");
    }

    #[test]
    fn test_map_api_config_defaults_to_any_origin() {
        let mut api = tapline_config::ApiConfig::default();
        api.cors.allowed_origins.clear();
        api.request_timeout_secs = 12;

        let mapped = map_api_config(&api);
        assert_eq!(mapped.cors.allowed_origins, vec!["*".to_string()]);
        assert_eq!(mapped.request_timeout, Duration::from_secs(12));
    }

    #[test]
    fn test_map_api_config_keeps_explicit_origins() {
        let mut api = tapline_config::ApiConfig::default();
        api.cors.allowed_origins = vec!["https://hmi.plant".to_string()];

        let mapped = map_api_config(&api);
        assert_eq!(
            mapped.cors.allowed_origins,
            vec!["https://hmi.plant".to_string()]
        );
    }
}

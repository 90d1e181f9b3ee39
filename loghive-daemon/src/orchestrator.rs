//! Component orchestration -- assembly, wiring, and lifecycle management.
//!
//! The [`Orchestrator`] is the central coordinator of `loghive-daemon`.
//! It loads configuration, builds the collaborators and the log pipeline,
//! manages startup/shutdown ordering, and runs the main event loop.
//!
//! # Startup Order
//!
//! 1. Index templates (under the distributed lock, skipped if another process holds it)
//! 2. Resolution cache reset
//! 3. Log pipeline workers (consumers)
//! 4. UDP syslog collector (producer)
//!
//! # Shutdown Order (producers first)
//!
//! 1. UDP syslog collector
//! 2. Log pipeline workers

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use loghive_core::config::LoghiveConfig;
use loghive_core::pipeline::{HealthStatus, Pipeline};
use loghive_pipeline::{
    AuditEvent, AuditLogger, DistributedLock, InventoryRepository, KvBackend, LockOptions,
    LogPipeline, PipelineConfig, QueueBackend, SearchBackend, SyslogUdpCollector,
    SyslogUdpConfig,
};

use crate::health::{ComponentHealth, DaemonHealth, aggregate_status};
use crate::metrics_server;

/// Pipeline type assembled by the daemon.
pub type DaemonPipeline =
    LogPipeline<InventoryRepository, KvBackend, SearchBackend, QueueBackend>;

/// Lock key guarding index template installation.
const TEMPLATE_LOCK_KEY: &str = "templates";

/// Identical lifecycle audit events inside this window are recorded once.
const AUDIT_DEDUP_WINDOW: Duration = Duration::from_secs(60);

/// Interval between health reports in the main loop.
const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(30);

/// Actor name written to audit events.
const DAEMON_ACTOR: &str = "loghive-daemon";

/// The main daemon orchestrator.
///
/// Owns the log pipeline and its collaborators, the UDP collector task
/// and the audit logger.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: LoghiveConfig,
    /// Pipeline view of the configuration.
    pipeline_config: PipelineConfig,
    pipeline: DaemonPipeline,
    kv: Arc<KvBackend>,
    search: Arc<SearchBackend>,
    queue: Arc<QueueBackend>,
    lock: Arc<DistributedLock<KvBackend>>,
    audit: AuditLogger<KvBackend, SearchBackend>,
    /// Cancels the collector task.
    cancel: CancellationToken,
    collector_task: Option<JoinHandle<()>>,
    collector_addr: Option<SocketAddr>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read or parsed
    /// - Configuration validation fails
    /// - The inventory file cannot be loaded
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = LoghiveConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    pub async fn build_from_config(config: LoghiveConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            record_build_info();
        }

        let pipeline_config = PipelineConfig::from_core(&config);

        let repository = InventoryRepository::from_file(&pipeline_config.inventory_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load inventory: {}", e))?;

        let kv = Arc::new(
            KvBackend::from_config(&pipeline_config)
                .await
                .map_err(|e| anyhow::anyhow!("failed to create kv backend: {}", e))?,
        );
        let search = Arc::new(
            SearchBackend::from_config(&pipeline_config)
                .map_err(|e| anyhow::anyhow!("failed to create search backend: {}", e))?,
        );
        let queue = Arc::new(
            QueueBackend::from_config(&pipeline_config)
                .map_err(|e| anyhow::anyhow!("failed to create queue backend: {}", e))?,
        );

        let pipeline = LogPipeline::builder(pipeline_config.clone())
            .repository(Arc::new(repository))
            .kv(Arc::clone(&kv))
            .search(Arc::clone(&search))
            .queue(Arc::clone(&queue))
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build log pipeline: {}", e))?;

        let lock = Arc::new(DistributedLock::new(
            Arc::clone(&kv),
            pipeline_config.key_prefix.clone(),
            pipeline_config.lock_poll_interval,
        ));
        let audit = AuditLogger::new(
            Arc::clone(&lock),
            Arc::clone(&search),
            Arc::clone(pipeline.schemas()),
            pipeline_config.lock_expiry,
            AUDIT_DEDUP_WINDOW,
        );

        tracing::info!(
            partitions = pipeline_config.partitions,
            queue_backend = %pipeline_config.queue_backend,
            kv_backend = %pipeline_config.cache_backend,
            search_backend = %pipeline_config.search_backend,
            "orchestrator initialized"
        );

        Ok(Self {
            config,
            pipeline_config,
            pipeline,
            kv,
            search,
            queue,
            lock,
            audit,
            cancel: CancellationToken::new(),
            collector_task: None,
            collector_addr: None,
            start_time: Instant::now(),
        })
    }

    /// Start all components and enter the main event loop.
    ///
    /// This method blocks until a shutdown signal is received.
    ///
    /// # Shutdown Triggers
    ///
    /// - `SIGTERM` (from systemd, Docker, or `kill`)
    /// - `SIGINT` (Ctrl+C)
    pub async fn run(&mut self) -> Result<()> {
        self.start().await?;

        tracing::info!("entering main event loop");
        let shutdown = wait_for_shutdown_signal();
        tokio::pin!(shutdown);

        let mut interval = tokio::time::interval(HEALTH_LOG_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let signal = loop {
            tokio::select! {
                signal = &mut shutdown => break signal?,
                _ = interval.tick() => self.log_health().await,
            }
        };
        tracing::info!(signal = signal, "shutdown signal received");

        self.shutdown().await
    }

    /// Start the components in dependency order.
    ///
    /// If the collector cannot be started, the already running pipeline is stopped again.
    pub async fn start(&mut self) -> Result<()> {
        self.install_templates().await?;

        let removed = self
            .pipeline
            .clean_cache()
            .await
            .map_err(|e| anyhow::anyhow!("failed to reset resolution cache: {}", e))?;
        tracing::debug!(removed, "resolution cache reset");

        self.pipeline
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start log pipeline: {}", e))?;

        if self.pipeline_config.collector_enabled {
            if let Err(e) = self.start_collector().await {
                tracing::warn!("collector startup failed, stopping log pipeline");
                if let Err(stop_err) = self.pipeline.stop().await {
                    tracing::error!(
                        startup_error = %e,
                        rollback_error = %stop_err,
                        "rollback also failed during startup failure cleanup"
                    );
                }
                return Err(e);
            }
        } else {
            tracing::info!("syslog collector disabled");
        }

        self.record_audit("daemon_start").await;
        tracing::info!("loghive-daemon running");
        Ok(())
    }

    /// Perform graceful shutdown.
    ///
    /// Stops the collector first so no new lines are queued, then the workers.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.cancel.cancel();
        if let Some(task) = self.collector_task.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "collector task panicked");
            }
        }

        self.record_audit("daemon_stop").await;

        tracing::info!("stopping log pipeline");
        self.pipeline
            .stop()
            .await
            .map_err(|e| anyhow::anyhow!("failed to stop log pipeline: {}", e))
    }

    /// Install index templates while holding the template lock.
    ///
    /// Another process holding the lock is installing the same templates,
    /// so the installation is skipped instead of waiting.
    async fn install_templates(&self) -> Result<()> {
        let options = LockOptions::new(self.pipeline_config.lock_expiry).force_drop(true);
        let installed = self
            .lock
            .run_locked(
                TEMPLATE_LOCK_KEY,
                options,
                self.pipeline.schemas().install_templates(self.search.as_ref()),
            )
            .await
            .map_err(|e| anyhow::anyhow!("failed to install index templates: {}", e))?;

        match installed {
            Some(count) => tracing::info!(count, "index templates ready"),
            None => tracing::info!("template lock held by another process, installation skipped"),
        }
        Ok(())
    }

    async fn start_collector(&mut self) -> Result<()> {
        let config = SyslogUdpConfig {
            bind_addr: self.pipeline_config.collector_bind.clone(),
            ..SyslogUdpConfig::default()
        };
        let mut collector =
            SyslogUdpCollector::bind(config, Arc::clone(&self.queue), self.cancel.child_token())
                .await
                .map_err(|e| anyhow::anyhow!("failed to start syslog collector: {}", e))?;

        let addr = collector
            .local_addr()
            .map_err(|e| anyhow::anyhow!("failed to read collector address: {}", e))?;
        tracing::info!(listen_addr = %addr, "syslog collector bound");

        self.collector_addr = Some(addr);
        self.collector_task = Some(tokio::spawn(async move {
            if let Err(e) = collector.run().await {
                tracing::error!(error = %e, "syslog collector failed");
            }
        }));
        Ok(())
    }

    /// Write a lifecycle audit event. Failures are only logged.
    async fn record_audit(&self, event: &str) {
        let dedup_key = format!("{event}:{}", std::process::id());
        let audit_event = AuditEvent::new(event, DAEMON_ACTOR)
            .detail(format!("version {}", env!("CARGO_PKG_VERSION")));
        if let Err(e) = self.audit.record(&dedup_key, audit_event).await {
            tracing::warn!(event, error = %e, "failed to record audit event");
        }
    }

    async fn log_health(&self) {
        let health = self.health().await;
        let report = serde_json::to_string(&health).unwrap_or_else(|e| e.to_string());
        if health.status.is_healthy() {
            tracing::debug!(report = %report, "daemon health");
        } else {
            tracing::warn!(status = %health.status, report = %report, "daemon health degraded");
        }
    }

    /// Get the current aggregated health status.
    pub async fn health(&self) -> DaemonHealth {
        let collector = match &self.collector_task {
            Some(task) if task.is_finished() => ComponentHealth::enabled(
                "syslog-udp",
                HealthStatus::Unhealthy("collector task exited".to_owned()),
            ),
            Some(_) => ComponentHealth::enabled("syslog-udp", HealthStatus::Healthy),
            None if self.pipeline_config.collector_enabled => ComponentHealth::enabled(
                "syslog-udp",
                HealthStatus::Unhealthy("not running".to_owned()),
            ),
            None => ComponentHealth::disabled("syslog-udp"),
        };
        let components = vec![
            ComponentHealth::enabled("log-pipeline", self.pipeline.health_check().await),
            collector,
        ];

        let uptime_secs = self.start_time.elapsed().as_secs();
        if self.config.metrics.enabled {
            use loghive_core::metrics as m;
            #[allow(clippy::cast_precision_loss)]
            metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(uptime_secs as f64);
        }

        DaemonHealth {
            status: aggregate_status(&components),
            uptime_secs,
            components,
        }
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &LoghiveConfig {
        &self.config
    }

    /// Get the log pipeline.
    pub fn pipeline(&self) -> &DaemonPipeline {
        &self.pipeline
    }

    /// Get the key-value store shared by the cache, lock and statistics.
    pub fn kv(&self) -> &Arc<KvBackend> {
        &self.kv
    }

    /// Get the search backend.
    pub fn search(&self) -> &Arc<SearchBackend> {
        &self.search
    }

    /// Get the message queue fed by the collector.
    pub fn queue(&self) -> &Arc<QueueBackend> {
        &self.queue
    }

    /// Address the syslog collector is bound to, once started.
    pub fn collector_addr(&self) -> Option<SocketAddr> {
        self.collector_addr
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Record the build info gauge (always 1, with version label).
fn record_build_info() {
    use loghive_core::metrics as m;

    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "daemon metrics recorded");
}

use anyhow::Result;
use clap::Parser;

use loghive_core::config::LoghiveConfig;
use loghive_daemon::cli::DaemonCli;
use loghive_daemon::logging;
use loghive_daemon::orchestrator::Orchestrator;
use loghive_pipeline::InventoryRepository;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    // 설정 로드 (기본값 < 파일 < 환경변수 < CLI)
    let mut config = LoghiveConfig::load(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config {}: {}", cli.config.display(), e))?;
    cli.apply_overrides(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    if cli.validate {
        let inventory = InventoryRepository::from_file(&config.inventory.path)
            .await
            .map_err(|e| anyhow::anyhow!("inventory validation failed: {}", e))?;
        println!(
            "configuration OK ({} devices in {})",
            inventory.device_count(),
            config.inventory.path
        );
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "loghive-daemon starting"
    );

    let mut orchestrator = Orchestrator::build_from_config(config).await?;
    if let Err(e) = orchestrator.run().await {
        tracing::error!(error = %e, "loghive-daemon terminated with error");
        return Err(e);
    }

    tracing::info!("loghive-daemon shut down");
    Ok(())
}

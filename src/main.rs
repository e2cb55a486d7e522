use std::fs::File;
use std::io::Read;
use std::sync::Arc;

use lotl_trust::{
    config::Config,
    lotl::{LotlService, LotlValidator},
    telemetry,
};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    // Load configuration
    let config = Config::load()?;
    tracing::info!("Loaded configuration: {:?}", config);

    let service = Arc::new(LotlService::from_config(&config)?);

    match config.lotl.snapshot_path.as_deref().filter(|path| path.exists()) {
        Some(path) => {
            let mut file = File::open(path)?;
            let reader: &mut (dyn Read + Send) = &mut file;
            if let Err(e) = service.initialize_cache(Some(reader)).await {
                tracing::warn!("Snapshot {} not usable ({e}), bootstrapping from the network", path.display());
                service.initialize_cache(None).await?;
            }
        }
        None => service.initialize_cache(None).await?,
    }

    let outcome = LotlValidator::new(service.clone()).validate().await?;
    tracing::info!(
        "Trusted lists loaded: valid={}, {} service contexts",
        outcome.is_valid(),
        outcome.contexts.len()
    );

    if let Some(path) = &config.lotl.snapshot_path {
        let mut file = File::create(path)?;
        service.write_snapshot(&mut file)?;
        tracing::info!("Wrote trusted-list snapshot to {}", path.display());
    }

    service.start_refresh_task();
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    service.close();
    Ok(())
}

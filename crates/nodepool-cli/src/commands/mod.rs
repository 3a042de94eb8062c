pub mod addresses;
pub mod replace;
pub mod right_size;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tokio::sync::watch;
use tracing::info;

use nodepool_core::{FleetConfig, FleetContext, Settings};
use nodepool_sim::SimulatedFleet;

/// Settings from `config`, or the defaults when no file is given.
pub fn load_settings(config: Option<&Path>) -> Result<Settings> {
    let Some(path) = config else {
        return Ok(Settings::default());
    };

    let config = FleetConfig::from_file(path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    let settings = config
        .resolve()
        .with_context(|| format!("invalid configuration in {}", path.display()))?;
    info!(path = %path.display(), instance_types = settings.catalog.len(), "loaded configuration");
    Ok(settings)
}

/// Build the run context over the fleet snapshot at `fleet`.
pub fn build_context(
    fleet: Option<&Path>,
    config: Option<&Path>,
    shutdown: watch::Receiver<bool>,
) -> Result<FleetContext> {
    let settings = load_settings(config)?;

    let Some(fleet) = fleet else {
        bail!("no fleet backend configured; pass --fleet <snapshot.json>");
    };
    let backend = Arc::new(SimulatedFleet::from_json_file(fleet)?);
    info!(fleet = %fleet.display(), "using simulated fleet");

    Ok(backend.context_with_shutdown(settings, shutdown))
}

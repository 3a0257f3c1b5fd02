//! Application state module
//!
//! Contains the shared state used by the receive loop.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::game::catalog::{CatalogLoader, JsonCatalogLoader};
use crate::game::persistence::{JsonRosterStore, RosterStore};
use crate::game::world::{GameWorld, WorldSettings};

/// Application state shared across the server
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,
    /// Game world, locked for the duration of each command
    pub world: Arc<Mutex<GameWorld>>,
    /// Shutdown signal sender
    pub shutdown_tx: broadcast::Sender<()>,
}

impl AppState {
    /// Create the application state with file-backed catalog and rosters
    pub fn new(config: ServerConfig, shutdown_tx: broadcast::Sender<()>) -> Self {
        let loader: Arc<dyn CatalogLoader> = Arc::new(JsonCatalogLoader::new(config.catalog_path()));
        let rosters: Arc<dyn RosterStore> = Arc::new(JsonRosterStore::new(config.rosters_dir()));

        info!(
            catalog = %config.catalog_path().display(),
            rosters = %config.rosters_dir().display(),
            "Using file storage"
        );

        Self::with_collaborators(config, shutdown_tx, loader, rosters)
    }

    /// Create the application state with explicit collaborators
    pub fn with_collaborators(
        config: ServerConfig,
        shutdown_tx: broadcast::Sender<()>,
        loader: Arc<dyn CatalogLoader>,
        rosters: Arc<dyn RosterStore>,
    ) -> Self {
        let settings = WorldSettings::from_config(&config);
        if settings.rng_seed.is_some() {
            warn!("RNG seed is fixed, battles are reproducible");
        }

        let mut world = GameWorld::new(settings, loader, rosters);

        // Failure is not fatal, the next join or catch retries
        match world.ensure_catalog() {
            Ok(catalog) => info!(creatures = catalog.len(), "Creature catalog ready"),
            Err(e) => warn!(error = %e, "Starting without a creature catalog"),
        }

        Self {
            config,
            world: Arc::new(Mutex::new(world)),
            shutdown_tx,
        }
    }
}

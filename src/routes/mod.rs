use std::sync::Arc;

use axum::Router;

use crate::{Config, TimeSeriesStore};

mod health;
mod temperature;

/// Store handle shared by all handlers.
pub type SharedStore = Arc<dyn TimeSeriesStore>;

// ---

pub fn router(store: SharedStore, config: Config) -> Router {
    // ---
    Router::new()
        .merge(temperature::router())
        .merge(health::router())
        .with_state((store, config))
}

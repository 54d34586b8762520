use std::time::Instant;

use tokio::sync::broadcast;

use crate::error::AppError;
use crate::models::picker::LocationEvent;
use crate::observability::metrics::Metrics;
use crate::simulation::LocationStrategy;
use crate::store::{Document, IdGenerator, JsonStore};

pub struct AppState {
    pub store: JsonStore,
    pub locations: Box<dyn LocationStrategy>,
    pub location_events_tx: broadcast::Sender<LocationEvent>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        store: JsonStore,
        locations: Box<dyn LocationStrategy>,
        event_buffer_size: usize,
    ) -> Self {
        let (location_events_tx, _unused_rx) = broadcast::channel(event_buffer_size.max(1));

        Self {
            store,
            locations,
            location_events_tx,
            metrics: Metrics::new(),
        }
    }

    /// Runs a document mutation through the store, recording its outcome.
    pub async fn write<R>(
        &self,
        apply: impl FnOnce(&mut Document, &IdGenerator) -> Result<R, AppError>,
    ) -> Result<R, AppError> {
        self.write_and_then(apply, |_| ()).await
    }

    /// [`write`](Self::write) with a hook that runs only once the mutation is
    /// persisted. See [`JsonStore::write_and_then`].
    pub async fn write_and_then<R>(
        &self,
        apply: impl FnOnce(&mut Document, &IdGenerator) -> Result<R, AppError>,
        on_commit: impl FnOnce(&R),
    ) -> Result<R, AppError> {
        let start = Instant::now();
        let result = self.store.write_and_then(apply, on_commit).await;

        let outcome = if result.is_ok() { "success" } else { "error" };
        self.metrics
            .store_write_latency_seconds
            .observe(start.elapsed().as_secs_f64());
        self.metrics
            .store_writes_total
            .with_label_values(&[outcome])
            .inc();

        result
    }
}

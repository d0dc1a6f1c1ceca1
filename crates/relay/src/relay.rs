use std::sync::Arc;

use tracefall_core::filter::ExcludeTerms;
use tracefall_core::model::payload::ExportPayload;
use tracing::{debug, warn};

use crate::otlp::extract::extract;
use crate::publish::Publisher;

/// Extract-then-publish path shared by every ingest endpoint.
#[derive(Clone)]
pub struct Relay {
    exclude: Arc<ExcludeTerms>,
    publisher: Publisher,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayOutcome {
    pub retained: usize,
    pub delivered: usize,
}

impl Relay {
    pub fn new(exclude: ExcludeTerms, publisher: Publisher) -> Self {
        Self {
            exclude: Arc::new(exclude),
            publisher,
        }
    }

    pub fn submit(&self, payload: &ExportPayload) -> RelayOutcome {
        let batch = extract(payload, &self.exclude);
        if batch.is_empty() {
            debug!("no relayable spans in payload");
            return RelayOutcome::default();
        }

        let retained = batch.len();
        let delivered = match self.publisher.publish(&batch) {
            Ok(n) => n,
            Err(e) => {
                warn!(error = ?e, retained, "failed to publish span batch");
                0
            }
        };
        debug!(retained, delivered, "span batch published");
        RelayOutcome {
            retained,
            delivered,
        }
    }
}

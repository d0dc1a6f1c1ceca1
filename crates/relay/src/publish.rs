use std::sync::Arc;

use tracefall_core::error::{RelayError, Result};
use tracefall_core::model::span::SimplifiedSpan;

use crate::hub::Broadcast;

#[derive(Clone)]
pub struct Publisher {
    sink: Arc<dyn Broadcast>,
}

impl Publisher {
    pub fn new(sink: Arc<dyn Broadcast>) -> Self {
        Self { sink }
    }

    /// Serializes `batch` once and broadcasts it. An empty batch is never
    /// sent: subscribers treat any message as new data.
    pub fn publish(&self, batch: &[SimplifiedSpan]) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        let message = serde_json::to_string(batch)
            .map_err(|e| RelayError::Publish(format!("failed to serialize batch: {e}")))?;
        Ok(self.sink.broadcast(Arc::from(message)))
    }
}

use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{ChartKind, ChartPayload};

/// Per-request holder for the most recent chart produced by a tool.
///
/// Each chat turn owns its own slot, so a chart rendered for one request can
/// never surface in another. Storing a second chart replaces the first.
#[derive(Debug, Default)]
pub struct ChartSlot {
    payload: Mutex<Option<ChartPayload>>,
}

impl ChartSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, payload: ChartPayload) {
        let mut slot = self.lock();
        if let Some(previous) = slot.as_ref() {
            tracing::debug!(
                previous = %previous.kind,
                next = %payload.kind,
                "replacing chart from earlier tool call"
            );
        }
        *slot = Some(payload);
    }

    pub fn take(&self) -> Option<ChartPayload> {
        self.lock().take()
    }

    pub fn kind(&self) -> Option<ChartKind> {
        self.lock().as_ref().map(|payload| payload.kind)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_none()
    }

    pub fn reset(&self) {
        *self.lock() = None;
    }

    fn lock(&self) -> MutexGuard<'_, Option<ChartPayload>> {
        self.payload.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

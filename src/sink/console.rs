/*!
 * Console Sink
 * Emits one JSON line per item through the tracing diagnostic channel
 */

use crate::core::errors::SinkError;
use crate::core::types::SinkResult;
use crate::track::{Severity, Trackable};
use std::collections::HashMap;
use std::sync::Arc;

use super::{EventSink, SinkCore, SinkErrorListener};

/// Concrete sink writing serialized items to the `trackway::sink` target
pub struct ConsoleSink {
    core: SinkCore,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self {
            core: SinkCore::new("console"),
        }
    }

    fn emit(&self, item: &Trackable, json: &str) {
        match item.severity() {
            Severity::Trace => tracing::trace!(target: "trackway::sink", kind = item.kind(), "{}", json),
            Severity::Debug => tracing::debug!(target: "trackway::sink", kind = item.kind(), "{}", json),
            Severity::Info => tracing::info!(target: "trackway::sink", kind = item.kind(), "{}", json),
            Severity::Warning => tracing::warn!(target: "trackway::sink", kind = item.kind(), "{}", json),
            _ => tracing::error!(target: "trackway::sink", kind = item.kind(), "{}", json),
        }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for ConsoleSink {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn open(&self) -> SinkResult<()> {
        self.core.mark_open();
        Ok(())
    }

    fn close(&self) -> SinkResult<()> {
        self.core.mark_closed();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.core.is_open()
    }

    fn log_item(&self, item: Trackable) -> SinkResult<()> {
        if !self.core.is_open() {
            let kind = item.kind();
            return Err(self
                .core
                .fail(SinkError::Closed(self.core.name().into()), kind));
        }
        match serde_json::to_string(&item) {
            Ok(json) => {
                self.emit(&item, &json);
                self.core.stats.count(&item);
                Ok(())
            }
            Err(err) => {
                let kind = item.kind();
                Err(self.core.fail(
                    SinkError::WriteFailed {
                        sink: self.core.name().into(),
                        reason: err.to_string().into(),
                    },
                    kind,
                ))
            }
        }
    }

    fn add_error_listener(&self, listener: Arc<dyn SinkErrorListener>) {
        self.core.listeners.add(listener);
    }

    fn remove_error_listener(&self, listener: &Arc<dyn SinkErrorListener>) {
        self.core.listeners.remove(listener);
    }

    fn collect_stats(&self, out: &mut HashMap<&'static str, i64>) {
        self.core.stats.collect(out);
    }
}

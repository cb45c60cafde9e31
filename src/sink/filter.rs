/*!
 * Filter Stage
 * Predicate gate in front of the sink chain
 *
 * An item is delivered only if every registered filter accepts it; the first
 * rejection short-circuits and counts toward `sink-skipped`.
 */

use crate::core::data_structures::InlineString;
use crate::core::types::SinkResult;
use crate::track::{Severity, Trackable};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::{EventSink, SinkErrorListener};

/// Pluggable delivery predicate
pub trait SinkFilter: Send + Sync {
    fn accept(&self, item: &Trackable) -> bool;
}

/// Severity threshold filter
#[derive(Debug, Clone, Copy)]
pub struct LevelFilter {
    min: Severity,
}

impl LevelFilter {
    pub fn new(min: Severity) -> Self {
        Self { min }
    }
}

impl SinkFilter for LevelFilter {
    #[inline]
    fn accept(&self, item: &Trackable) -> bool {
        item.severity() >= self.min
    }
}

/// Filtering decorator
pub struct FilteredSink {
    name: InlineString,
    inner: Arc<dyn EventSink>,
    filters: RwLock<Vec<Arc<dyn SinkFilter>>>,
    skipped: AtomicU64,
}

impl FilteredSink {
    pub fn new(inner: Arc<dyn EventSink>, filters: Vec<Arc<dyn SinkFilter>>) -> Self {
        let mut name = InlineString::from(inner.name());
        name.push_str("+filter");
        Self {
            name,
            inner,
            filters: RwLock::new(filters),
            skipped: AtomicU64::new(0),
        }
    }

    pub fn add_filter(&self, filter: Arc<dyn SinkFilter>) {
        self.filters.write().push(filter);
    }

    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }
}

impl EventSink for FilteredSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> SinkResult<()> {
        self.inner.open()
    }

    fn close(&self) -> SinkResult<()> {
        self.inner.close()
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    fn log_item(&self, item: Trackable) -> SinkResult<()> {
        {
            let filters = self.filters.read();
            for filter in filters.iter() {
                if !filter.accept(&item) {
                    self.skipped.fetch_add(1, Ordering::Relaxed);
                    return Ok(());
                }
            }
        }
        self.inner.log_item(item)
    }

    fn add_error_listener(&self, listener: Arc<dyn SinkErrorListener>) {
        self.inner.add_error_listener(listener);
    }

    fn remove_error_listener(&self, listener: &Arc<dyn SinkErrorListener>) {
        self.inner.remove_error_listener(listener);
    }

    fn collect_stats(&self, out: &mut HashMap<&'static str, i64>) {
        *out.entry("sink-skipped").or_insert(0) += self.skipped.load(Ordering::Relaxed) as i64;
        self.inner.collect_stats(out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use crate::track::PropertySnapshot;

    fn snapshot_item(severity: Severity) -> Trackable {
        Trackable::Snapshot(PropertySnapshot::new("cat", "name").with_severity(severity))
    }

    #[test]
    fn test_all_filters_must_accept() {
        let memory = Arc::new(MemorySink::new(16));
        memory.open().unwrap();
        let filtered = FilteredSink::new(
            memory.clone(),
            vec![
                Arc::new(LevelFilter::new(Severity::Info)),
                Arc::new(LevelFilter::new(Severity::Warning)),
            ],
        );

        filtered.log_item(snapshot_item(Severity::Info)).unwrap();
        assert_eq!(filtered.skipped(), 1);
        assert_eq!(memory.len(), 0, "rejected item must not reach the sink");

        filtered.log_item(snapshot_item(Severity::Error)).unwrap();
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn test_no_filters_passes_everything() {
        let memory = Arc::new(MemorySink::new(16));
        memory.open().unwrap();
        let filtered = FilteredSink::new(memory.clone(), Vec::new());

        filtered.log_item(snapshot_item(Severity::Trace)).unwrap();
        assert_eq!(filtered.skipped(), 0);
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn test_skipped_counter_in_stats() {
        let memory = Arc::new(MemorySink::new(16));
        memory.open().unwrap();
        let filtered =
            FilteredSink::new(memory, vec![Arc::new(LevelFilter::new(Severity::Halt))]);

        filtered.log_item(snapshot_item(Severity::Info)).unwrap();

        let mut stats = HashMap::new();
        filtered.collect_stats(&mut stats);
        assert_eq!(stats["sink-skipped"], 1);
    }
}

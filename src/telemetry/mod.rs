//! Telemetry for ingestion and query phases
//!
//! In-process event collection with aggregate statistics; the CLI renders
//! a summary after each batch or request.

use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Telemetry event types
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    // Ingestion events
    UrlScheduled {
        url: String,
        timestamp: Instant,
    },
    UrlFetched {
        url: String,
        bytes: usize,
        timestamp: Instant,
    },
    UrlFailed {
        url: String,
        stage: String,
        reason: String,
        timestamp: Instant,
    },
    ChunksStored {
        url: String,
        count: usize,
        timestamp: Instant,
    },

    // Query events
    QueryParsed {
        intent: String,
        timestamp: Instant,
    },
    VectorSearchIssued {
        scoped_parts: usize,
        timestamp: Instant,
    },
    ChunksDiscarded {
        above_threshold: usize,
        timestamp: Instant,
    },
    ResponseWithheld {
        reason: String,
        timestamp: Instant,
    },
}

/// Aggregate statistics
#[derive(Debug, Clone, Default)]
pub struct TelemetryStats {
    pub urls_scheduled: usize,
    pub urls_fetched: usize,
    pub urls_failed: usize,
    pub chunks_stored: usize,
    pub queries_parsed: usize,
    pub vector_searches: usize,
    pub chunks_discarded: usize,
    pub responses_withheld: usize,
}

/// Cloneable event collector shared across pipeline workers
#[derive(Clone)]
pub struct TelemetryCollector {
    events: Arc<Mutex<Vec<TelemetryEvent>>>,
    stats: Arc<Mutex<TelemetryStats>>,
    start_time: Instant,
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryCollector {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            stats: Arc::new(Mutex::new(TelemetryStats::default())),
            start_time: Instant::now(),
        }
    }

    /// Record an event and fold it into the aggregate stats
    pub fn record(&self, event: TelemetryEvent) {
        {
            let mut stats = self.stats.lock().unwrap();
            match &event {
                TelemetryEvent::UrlScheduled { .. } => stats.urls_scheduled += 1,
                TelemetryEvent::UrlFetched { .. } => stats.urls_fetched += 1,
                TelemetryEvent::UrlFailed { .. } => stats.urls_failed += 1,
                TelemetryEvent::ChunksStored { count, .. } => stats.chunks_stored += count,
                TelemetryEvent::QueryParsed { .. } => stats.queries_parsed += 1,
                TelemetryEvent::VectorSearchIssued { .. } => stats.vector_searches += 1,
                TelemetryEvent::ChunksDiscarded { above_threshold, .. } => {
                    stats.chunks_discarded += above_threshold
                }
                TelemetryEvent::ResponseWithheld { .. } => stats.responses_withheld += 1,
            }
        }
        self.events.lock().unwrap().push(event);
    }

    pub fn stats(&self) -> TelemetryStats {
        self.stats.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_accumulate() {
        let collector = TelemetryCollector::new();

        collector.record(TelemetryEvent::UrlScheduled {
            url: "https://example.com/a.pdf".to_string(),
            timestamp: Instant::now(),
        });
        collector.record(TelemetryEvent::ChunksStored {
            url: "https://example.com/a.pdf".to_string(),
            count: 7,
            timestamp: Instant::now(),
        });
        collector.record(TelemetryEvent::UrlFailed {
            url: "https://example.com/b.pdf".to_string(),
            stage: "fetch".to_string(),
            reason: "status 404".to_string(),
            timestamp: Instant::now(),
        });

        let stats = collector.stats();
        assert_eq!(stats.urls_scheduled, 1);
        assert_eq!(stats.chunks_stored, 7);
        assert_eq!(stats.urls_failed, 1);
        assert_eq!(collector.events().len(), 3);
    }

    #[test]
    fn test_collector_clones_share_state() {
        let collector = TelemetryCollector::new();
        let clone = collector.clone();

        clone.record(TelemetryEvent::QueryParsed {
            intent: "part_info".to_string(),
            timestamp: Instant::now(),
        });

        assert_eq!(collector.stats().queries_parsed, 1);
    }
}

use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

pub struct Metrics {
    // Counters
    total_requests: AtomicUsize,
    successful_requests: AtomicUsize,
    failed_requests: AtomicUsize,

    // Timing (in microseconds)
    total_ingest_time_us: AtomicU64,
    total_query_time_us: AtomicU64,

    // Counts
    ingest_runs: AtomicUsize,
    queries_answered: AtomicUsize,
    total_pages_ingested: AtomicUsize,
    total_chunks_ingested: AtomicUsize,
    total_files_skipped: AtomicUsize,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            total_requests: AtomicUsize::new(0),
            successful_requests: AtomicUsize::new(0),
            failed_requests: AtomicUsize::new(0),
            total_ingest_time_us: AtomicU64::new(0),
            total_query_time_us: AtomicU64::new(0),
            ingest_runs: AtomicUsize::new(0),
            queries_answered: AtomicUsize::new(0),
            total_pages_ingested: AtomicUsize::new(0),
            total_chunks_ingested: AtomicUsize::new(0),
            total_files_skipped: AtomicUsize::new(0),
        })
    }

    pub fn record_request(&self, success: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_ingest(&self, duration: Duration, report: &ingest::IngestReport) {
        self.total_ingest_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.ingest_runs.fetch_add(1, Ordering::Relaxed);
        self.total_pages_ingested.fetch_add(report.pages, Ordering::Relaxed);
        self.total_chunks_ingested.fetch_add(report.chunks, Ordering::Relaxed);
        self.total_files_skipped.fetch_add(report.skipped().count(), Ordering::Relaxed);
    }

    pub fn record_query(&self, duration: Duration) {
        self.total_query_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.queries_answered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            avg_ingest_time_ms: Self::avg_time_ms(&self.total_ingest_time_us, &self.ingest_runs),
            avg_query_time_ms: Self::avg_time_ms(&self.total_query_time_us, &self.queries_answered),
            queries_answered: self.queries_answered.load(Ordering::Relaxed),
            total_pages_ingested: self.total_pages_ingested.load(Ordering::Relaxed),
            total_chunks_ingested: self.total_chunks_ingested.load(Ordering::Relaxed),
            total_files_skipped: self.total_files_skipped.load(Ordering::Relaxed),
        }
    }

    fn avg_time_ms(total_us: &AtomicU64, count: &AtomicUsize) -> f64 {
        let total = total_us.load(Ordering::Relaxed) as f64;
        let cnt = count.load(Ordering::Relaxed) as f64;
        if cnt > 0.0 {
            total / cnt / 1000.0 // Convert to ms
        } else {
            0.0
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub avg_ingest_time_ms: f64,
    pub avg_query_time_ms: f64,
    pub queries_answered: usize,
    pub total_pages_ingested: usize,
    pub total_chunks_ingested: usize,
    pub total_files_skipped: usize,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingest::{FileOutcome, IngestReport};

    #[test]
    fn test_snapshot_counts() {
        let metrics = Metrics::new();
        metrics.record_request(true);
        metrics.record_request(false);
        metrics.record_query(Duration::from_millis(30));
        metrics.record_query(Duration::from_millis(10));

        let report = IngestReport {
            files: vec![FileOutcome::Skipped {
                file: "bad.pdf".into(),
                reason: "corrupt".into(),
            }],
            pages: 4,
            chunks: 9,
        };
        metrics.record_ingest(Duration::from_millis(500), &report);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests, 2);
        assert_eq!(snapshot.failed_requests, 1);
        assert_eq!(snapshot.queries_answered, 2);
        assert!((snapshot.avg_query_time_ms - 20.0).abs() < 1e-9);
        assert!((snapshot.avg_ingest_time_ms - 500.0).abs() < 1e-9);
        assert_eq!(snapshot.total_pages_ingested, 4);
        assert_eq!(snapshot.total_chunks_ingested, 9);
        assert_eq!(snapshot.total_files_skipped, 1);
    }
}

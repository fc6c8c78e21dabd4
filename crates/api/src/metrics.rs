use query::Route;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

#[derive(Default)]
pub struct Metrics {
    // Counters
    total_requests: AtomicUsize,
    successful_requests: AtomicUsize,
    failed_requests: AtomicUsize,

    documents_ingested: AtomicUsize,
    chunks_indexed: AtomicUsize,
    graph_nodes_extracted: AtomicUsize,
    vector_answers: AtomicUsize,
    graph_answers: AtomicUsize,
    translations: AtomicUsize,
    exports: AtomicUsize,

    // Timing (in microseconds)
    total_ingest_time_us: AtomicU64,
    total_qa_time_us: AtomicU64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_request(&self, success: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_ingest(&self, duration: Duration, chunks: usize, graph_nodes: usize) {
        self.documents_ingested.fetch_add(1, Ordering::Relaxed);
        self.chunks_indexed.fetch_add(chunks, Ordering::Relaxed);
        self.graph_nodes_extracted.fetch_add(graph_nodes, Ordering::Relaxed);
        self.total_ingest_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_answer(&self, duration: Duration, route: Route) {
        match route {
            Route::Vector => self.vector_answers.fetch_add(1, Ordering::Relaxed),
            Route::Graph => self.graph_answers.fetch_add(1, Ordering::Relaxed),
        };
        self.total_qa_time_us.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_translation(&self) {
        self.translations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_export(&self) {
        self.exports.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let documents_ingested = self.documents_ingested.load(Ordering::Relaxed);
        let vector_answers = self.vector_answers.load(Ordering::Relaxed);
        let graph_answers = self.graph_answers.load(Ordering::Relaxed);

        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            documents_ingested,
            chunks_indexed: self.chunks_indexed.load(Ordering::Relaxed),
            graph_nodes_extracted: self.graph_nodes_extracted.load(Ordering::Relaxed),
            vector_answers,
            graph_answers,
            translations: self.translations.load(Ordering::Relaxed),
            exports: self.exports.load(Ordering::Relaxed),
            avg_ingest_time_ms: avg_time_ms(&self.total_ingest_time_us, documents_ingested),
            avg_qa_time_ms: avg_time_ms(&self.total_qa_time_us, vector_answers + graph_answers),
        }
    }
}

fn avg_time_ms(total_us: &AtomicU64, count: usize) -> f64 {
    let total = total_us.load(Ordering::Relaxed) as f64;
    if count > 0 {
        total / count as f64 / 1000.0 // Convert to ms
    } else {
        0.0
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub documents_ingested: usize,
    pub chunks_indexed: usize,
    pub graph_nodes_extracted: usize,
    pub vector_answers: usize,
    pub graph_answers: usize,
    pub translations: usize,
    pub exports: usize,
    pub avg_ingest_time_ms: f64,
    pub avg_qa_time_ms: f64,
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

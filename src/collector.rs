use crate::config::ExporterConfig;
use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::fetcher::{DataFetcher, StatusFetcher};
use crate::metrics::descriptor::{
    self, MetricDescs, ValueKind, WORKER_LIFETIME_KEY, WORKER_REQUESTS_KEY,
};
use crate::metrics::sink::MetricSink;
use crate::metrics::summary::RunningSummary;
use crate::status::{self, Field};
use prometheus::core::Desc;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Phases of one scrape. A cycle always ends in `Done`; the next scrape starts from `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Fetching,
    Parsing,
    Mapping,
    Done,
}

/// Polls one pool endpoint and maps its status report onto metrics.
///
/// Clones share the failure counter, so a single collector can serve
/// concurrent scrapes without losing increments.
#[derive(Clone)]
pub struct Collector {
    endpoint: Arc<Endpoint>,
    fetcher: Arc<dyn StatusFetcher>,
    descs: Arc<MetricDescs>,
    failures: Arc<AtomicU64>,
}

impl Collector {
    pub fn new(endpoint: Endpoint, fetcher: Arc<dyn StatusFetcher>, descs: MetricDescs) -> Self {
        Self {
            endpoint: Arc::new(endpoint),
            fetcher,
            descs: Arc::new(descs),
            failures: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn from_config(config: &ExporterConfig) -> Result<Self> {
        let descs = MetricDescs::new(&config.namespace, &config.const_labels, &config.pool_label)?;
        let fetcher = DataFetcher::new(config.timeout())?;
        Ok(Self::new(config.endpoint()?, Arc::new(fetcher), descs))
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Descriptions of everything this collector can emit.
    pub fn describe(&self) -> Vec<&Desc> {
        self.descs.all()
    }

    /// Hands every description to `sink`; observations follow only after this.
    pub fn register(&self, sink: &mut dyn MetricSink) -> Result<()> {
        for desc in self.describe() {
            sink.register(desc)?;
        }
        Ok(())
    }

    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::SeqCst)
    }

    /// Runs one fetch-parse-map cycle into `sink`.
    ///
    /// `up` and `scrape_failures_total` are emitted on every call; everything
    /// else only when the fetch succeeds. Returns whether the pool was reachable.
    pub async fn collect(&self, sink: &mut dyn MetricSink) -> bool {
        let mut state = CycleState::Idle;
        self.transition(&mut state, CycleState::Fetching);

        let body = match self.fetcher.fetch(&self.endpoint).await {
            Ok(body) => body,
            Err(e) => {
                log::error!("failed to get php-fpm status from {}: {}", self.endpoint, e);
                let failures = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
                self.emit_availability(sink, false, failures);
                self.transition(&mut state, CycleState::Done);
                return false;
            }
        };

        self.emit_availability(sink, true, self.failure_count());

        self.transition(&mut state, CycleState::Parsing);
        let text = String::from_utf8_lossy(&body);
        let report = status::parse_report(&text);

        self.transition(&mut state, CycleState::Mapping);
        self.map_pool(&report.pool, sink);
        self.map_workers(&report.workers, sink);

        self.transition(&mut state, CycleState::Done);
        true
    }

    fn transition(&self, state: &mut CycleState, next: CycleState) {
        log::debug!("scrape of {}: {:?} -> {:?}", self.endpoint, state, next);
        *state = next;
    }

    fn emit_availability(&self, sink: &mut dyn MetricSink, up: bool, failures: u64) {
        let up = if up { 1.0 } else { 0.0 };
        emit(sink, &self.descs.up, ValueKind::Gauge, up, &[]);
        emit(
            sink,
            &self.descs.scrape_failures,
            ValueKind::Counter,
            failures as f64,
            &[],
        );
    }

    fn map_pool(&self, fields: &[Field<'_>], sink: &mut dyn MetricSink) {
        for field in fields {
            let Some(mapped) = descriptor::lookup(field.key) else {
                continue;
            };
            let Some(desc) = self.descs.pool_metric(mapped.metric.name) else {
                continue;
            };
            emit(
                sink,
                desc,
                mapped.kind,
                field.value as f64,
                mapped.label.as_slice(),
            );
        }
    }

    fn map_workers(&self, workers: &[Vec<Field<'_>>], sink: &mut dyn MetricSink) {
        let mut lifetime = RunningSummary::new();
        let mut requests = RunningSummary::new();

        for field in workers.iter().flatten() {
            match field.key {
                WORKER_LIFETIME_KEY => lifetime.observe(field.value as f64),
                WORKER_REQUESTS_KEY => requests.observe(field.value as f64),
                _ => {}
            }
        }

        emit_summary(sink, &self.descs.workers_lifetime, &lifetime);
        emit_summary(sink, &self.descs.workers_requests, &requests);
    }
}

fn emit(sink: &mut dyn MetricSink, desc: &Desc, kind: ValueKind, value: f64, labels: &[&str]) {
    if let Err(e) = sink.observe(desc, kind, value, labels) {
        log::error!("failed to create metric {}: {}", desc.fq_name, e);
    }
}

fn emit_summary(sink: &mut dyn MetricSink, desc: &Desc, summary: &RunningSummary) {
    if let Err(e) = sink.observe_summary(desc, summary) {
        log::error!("failed to create metric {}: {}", desc.fq_name, e);
    }
}

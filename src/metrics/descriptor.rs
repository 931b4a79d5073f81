//! Static description of every metric the exporter publishes, and the
//! lookup table from pool-summary keys to those metrics.

use crate::error::{Error, Result};
use prometheus::core::Desc;
use std::collections::HashMap;
use std::sync::LazyLock;

/// How the sink should type a single-valued observation. Counters are not
/// accumulated here; the pool manager already reports cumulative totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Counter,
    Gauge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricSpec {
    pub name: &'static str,
    pub help: &'static str,
    pub variable_labels: &'static [&'static str],
}

impl MetricSpec {
    const fn plain(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            help,
            variable_labels: &[],
        }
    }
}

pub const UP: MetricSpec = MetricSpec::plain("up", "able to contact php-fpm");
pub const SCRAPE_FAILURES: MetricSpec = MetricSpec::plain(
    "scrape_failures_total",
    "Number of errors while scraping php_fpm",
);
pub const ACCEPTED_CONNECTIONS: MetricSpec = MetricSpec::plain(
    "accepted_connections_total",
    "Total number of accepted connections",
);
pub const LISTEN_QUEUE: MetricSpec = MetricSpec::plain(
    "listen_queue_connections",
    "Number of connections that have been initiated but not yet accepted",
);
pub const LISTEN_QUEUE_MAX: MetricSpec = MetricSpec::plain(
    "listen_queue_max_connections",
    "Max number of connections the listen queue has reached since FPM start",
);
pub const LISTEN_QUEUE_LENGTH: MetricSpec = MetricSpec::plain(
    "listen_queue_length_connections",
    "The length of the socket queue, dictating maximum number of pending connections",
);
pub const PROCESSES: MetricSpec = MetricSpec {
    name: "processes_total",
    help: "process count",
    variable_labels: &["state"],
};
pub const ACTIVE_MAX_PROCESSES: MetricSpec =
    MetricSpec::plain("active_max_processes", "Maximum active process count");
pub const MAX_CHILDREN_REACHED: MetricSpec = MetricSpec::plain(
    "max_children_reached_total",
    "Number of times the process limit has been reached",
);
pub const SLOW_REQUESTS: MetricSpec = MetricSpec::plain(
    "slow_requests_total",
    "Number of requests that exceed request_slowlog_timeout",
);
pub const WORKERS_REQUESTS: MetricSpec = MetricSpec::plain(
    "workers_requests_summary",
    "summary of requests processed by workers",
);
pub const WORKERS_LIFETIME: MetricSpec =
    MetricSpec::plain("workers_lifetime_summary", "summary of workers lifetime");

/// Metrics fed from the pool-summary block, in exposition order.
pub const POOL_METRICS: [MetricSpec; 8] = [
    ACCEPTED_CONNECTIONS,
    LISTEN_QUEUE,
    LISTEN_QUEUE_MAX,
    LISTEN_QUEUE_LENGTH,
    PROCESSES,
    ACTIVE_MAX_PROCESSES,
    MAX_CHILDREN_REACHED,
    SLOW_REQUESTS,
];

/// Worker-block key aggregated into the lifetime summary.
pub const WORKER_LIFETIME_KEY: &str = "start since";
/// Worker-block key aggregated into the requests summary.
pub const WORKER_REQUESTS_KEY: &str = "requests";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMetric {
    pub metric: MetricSpec,
    pub kind: ValueKind,
    /// Value for the metric's single variable label, if it has one
    pub label: Option<&'static str>,
}

const fn field(metric: MetricSpec, kind: ValueKind, label: Option<&'static str>) -> FieldMetric {
    FieldMetric {
        metric,
        kind,
        label,
    }
}

/// Recognized pool-summary keys. Matching is exact and case-sensitive.
pub static POOL_FIELDS: LazyLock<HashMap<&'static str, FieldMetric>> = LazyLock::new(|| {
    use ValueKind::{Counter, Gauge};

    HashMap::from([
        ("accepted conn", field(ACCEPTED_CONNECTIONS, Counter, None)),
        ("listen queue", field(LISTEN_QUEUE, Gauge, None)),
        ("max listen queue", field(LISTEN_QUEUE_MAX, Counter, None)),
        ("listen queue len", field(LISTEN_QUEUE_LENGTH, Gauge, None)),
        ("idle processes", field(PROCESSES, Gauge, Some("idle"))),
        ("active processes", field(PROCESSES, Gauge, Some("active"))),
        ("max active processes", field(ACTIVE_MAX_PROCESSES, Counter, None)),
        ("max children reached", field(MAX_CHILDREN_REACHED, Counter, None)),
        ("slow requests", field(SLOW_REQUESTS, Counter, None)),
    ])
});

pub fn lookup(key: &str) -> Option<&'static FieldMetric> {
    POOL_FIELDS.get(key)
}

/// Joins a namespace and a metric name the way Prometheus builds fully qualified names.
pub fn fq_name(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}_{}", namespace, name)
    }
}

/// Concrete descriptions for one collector: namespaced names plus const labels.
#[derive(Debug)]
pub struct MetricDescs {
    pub up: Desc,
    pub scrape_failures: Desc,
    pub workers_requests: Desc,
    pub workers_lifetime: Desc,
    pool: Vec<(&'static str, Desc)>,
}

impl MetricDescs {
    pub fn new(
        namespace: &str,
        const_labels: &HashMap<String, String>,
        pool_label: &str,
    ) -> Result<Self> {
        let build = |spec: &MetricSpec, labels: HashMap<String, String>| {
            Desc::new(
                fq_name(namespace, spec.name),
                spec.help.to_string(),
                spec.variable_labels.iter().map(|l| l.to_string()).collect(),
                labels,
            )
        };

        if const_labels.contains_key("pool") {
            return Err(Error::Config(
                "const label `pool` is reserved for the worker summaries".to_string(),
            ));
        }

        let mut summary_labels = const_labels.clone();
        summary_labels.insert("pool".to_string(), pool_label.to_string());

        let pool = POOL_METRICS
            .iter()
            .map(|spec| -> Result<(&'static str, Desc)> {
                Ok((spec.name, build(spec, const_labels.clone())?))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            up: build(&UP, const_labels.clone())?,
            scrape_failures: build(&SCRAPE_FAILURES, const_labels.clone())?,
            workers_requests: build(&WORKERS_REQUESTS, summary_labels.clone())?,
            workers_lifetime: build(&WORKERS_LIFETIME, summary_labels)?,
            pool,
        })
    }

    pub fn pool_metric(&self, name: &str) -> Option<&Desc> {
        self.pool
            .iter()
            .find(|(metric, _)| *metric == name)
            .map(|(_, desc)| desc)
    }

    /// Every description in registration order.
    pub fn all(&self) -> Vec<&Desc> {
        let mut descs = vec![&self.up, &self.scrape_failures];
        descs.extend(self.pool.iter().map(|(_, desc)| desc));
        descs.push(&self.workers_requests);
        descs.push(&self.workers_lifetime);
        descs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_matches_known_keys() {
        let conn = lookup("accepted conn").unwrap();
        assert_eq!(conn.metric.name, "accepted_connections_total");
        assert_eq!(conn.kind, ValueKind::Counter);

        let queue = lookup("listen queue").unwrap();
        assert_eq!(queue.metric.name, "listen_queue_connections");
        assert_eq!(queue.kind, ValueKind::Gauge);

        assert_eq!(lookup("max listen queue").unwrap().kind, ValueKind::Counter);
        assert_eq!(lookup("listen queue len").unwrap().kind, ValueKind::Gauge);
        assert_eq!(lookup("slow requests").unwrap().metric, SLOW_REQUESTS);
    }

    #[test]
    fn process_states_share_one_metric() {
        let idle = lookup("idle processes").unwrap();
        let active = lookup("active processes").unwrap();
        assert_eq!(idle.metric, active.metric);
        assert_eq!(idle.label, Some("idle"));
        assert_eq!(active.label, Some("active"));
    }

    #[test]
    fn unknown_and_miscased_keys_are_ignored() {
        assert!(lookup("total processes").is_none());
        assert!(lookup("Accepted Conn").is_none());
        assert!(lookup("start since").is_none());
    }

    #[test]
    fn every_table_metric_has_a_description() {
        let descs = MetricDescs::new("php_fpm", &HashMap::new(), "www").unwrap();
        for field in POOL_FIELDS.values() {
            let desc = descs.pool_metric(field.metric.name).unwrap();
            assert_eq!(desc.variable_labels.len(), usize::from(field.label.is_some()));
        }
        assert_eq!(descs.all().len(), 12);
        assert_eq!(descs.up.fq_name, "php_fpm_up");
    }

    #[test]
    fn summaries_carry_pool_label() {
        let const_labels = HashMap::from([("env".to_string(), "prod".to_string())]);
        let descs = MetricDescs::new("", &const_labels, "www").unwrap();

        assert_eq!(descs.workers_lifetime.fq_name, "workers_lifetime_summary");
        let pairs = &descs.workers_lifetime.const_label_pairs;
        assert_eq!(pairs.len(), 2);
        assert!(pairs
            .iter()
            .any(|p| p.get_name() == "pool" && p.get_value() == "www"));
        assert_eq!(descs.up.const_label_pairs.len(), 1);
    }

    #[test]
    fn pool_const_label_is_reserved() {
        let const_labels = HashMap::from([("pool".to_string(), "other".to_string())]);
        assert!(matches!(
            MetricDescs::new("", &const_labels, "www"),
            Err(Error::Config(_))
        ));
    }
}

use crate::error::{Error, Result};
use crate::metrics::descriptor::ValueKind;
use crate::metrics::summary::RunningSummary;
use prometheus::core::Desc;
use prometheus::proto::{
    Counter, Gauge, LabelPair, Metric, MetricFamily, MetricType, Quantile,
    Summary as SummaryValue,
};
use prometheus::{Encoder, TextEncoder};
use std::collections::{HashMap, HashSet};

/// Receives the typed observations of one collection cycle.
pub trait MetricSink: Send {
    /// Accepts a description before anything is observed against it.
    fn register(&mut self, desc: &Desc) -> Result<()>;

    /// `label_values` must line up with `desc.variable_labels`.
    fn observe(
        &mut self,
        desc: &Desc,
        kind: ValueKind,
        value: f64,
        label_values: &[&str],
    ) -> Result<()>;

    fn observe_summary(&mut self, desc: &Desc, summary: &RunningSummary) -> Result<()>;
}

/// Collects observations as Prometheus metric families for text exposition.
///
/// Only registered descriptions are accepted. A registered but still empty
/// sink can be cloned once per scrape.
#[derive(Debug, Default, Clone)]
pub struct PrometheusSink {
    registered: HashSet<u64>,
    dims: HashMap<String, u64>,
    families: Vec<MetricFamily>,
}

impl PrometheusSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_descs(descs: &[&Desc]) -> Result<Self> {
        let mut sink = Self::new();
        for desc in descs {
            sink.register(desc)?;
        }
        Ok(sink)
    }

    pub fn families(&self) -> &[MetricFamily] {
        &self.families
    }

    pub fn encode(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.families, &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }

    fn ensure_registered(&self, desc: &Desc) -> Result<()> {
        if self.registered.contains(&desc.id) {
            Ok(())
        } else {
            Err(prometheus::Error::Msg(format!("{} was not registered", desc.fq_name)).into())
        }
    }

    fn push(&mut self, desc: &Desc, metric_type: MetricType, metric: Metric) {
        if let Some(family) = self
            .families
            .iter_mut()
            .find(|f| f.get_name() == desc.fq_name)
        {
            family.mut_metric().push(metric);
            return;
        }

        let mut family = MetricFamily::default();
        family.set_name(desc.fq_name.clone());
        family.set_help(desc.help.clone());
        family.set_field_type(metric_type);
        family.mut_metric().push(metric);
        self.families.push(family);
    }
}

impl MetricSink for PrometheusSink {
    fn register(&mut self, desc: &Desc) -> Result<()> {
        if self.registered.contains(&desc.id) {
            return Err(prometheus::Error::AlreadyReg.into());
        }
        if let Some(dim_hash) = self.dims.get(&desc.fq_name) {
            if *dim_hash != desc.dim_hash {
                return Err(prometheus::Error::Msg(format!(
                    "{} is already registered with different label names or help",
                    desc.fq_name
                ))
                .into());
            }
        }

        self.dims.insert(desc.fq_name.clone(), desc.dim_hash);
        self.registered.insert(desc.id);
        Ok(())
    }

    fn observe(
        &mut self,
        desc: &Desc,
        kind: ValueKind,
        value: f64,
        label_values: &[&str],
    ) -> Result<()> {
        self.ensure_registered(desc)?;
        let mut metric = Metric::default();
        for pair in label_pairs(desc, label_values)? {
            metric.mut_label().push(pair);
        }

        let metric_type = match kind {
            ValueKind::Counter => {
                let mut counter = Counter::default();
                counter.set_value(value);
                metric.set_counter(counter);
                MetricType::COUNTER
            }
            ValueKind::Gauge => {
                let mut gauge = Gauge::default();
                gauge.set_value(value);
                metric.set_gauge(gauge);
                MetricType::GAUGE
            }
        };

        self.push(desc, metric_type, metric);
        Ok(())
    }

    fn observe_summary(&mut self, desc: &Desc, summary: &RunningSummary) -> Result<()> {
        self.ensure_registered(desc)?;
        let mut metric = Metric::default();
        for pair in label_pairs(desc, &[])? {
            metric.mut_label().push(pair);
        }

        let mut value = SummaryValue::default();
        value.set_sample_count(summary.count());
        value.set_sample_sum(summary.sum());
        for (q, v) in summary.quantiles() {
            let mut quantile = Quantile::default();
            quantile.set_quantile(q);
            quantile.set_value(v);
            value.mut_quantile().push(quantile);
        }
        metric.set_summary(value);

        self.push(desc, MetricType::SUMMARY, metric);
        Ok(())
    }
}

/// Const labels plus the variable labels, sorted by name.
fn label_pairs(desc: &Desc, label_values: &[&str]) -> Result<Vec<LabelPair>> {
    if desc.variable_labels.len() != label_values.len() {
        return Err(prometheus::Error::InconsistentCardinality {
            expect: desc.variable_labels.len(),
            got: label_values.len(),
        }
        .into());
    }

    let mut pairs = desc.const_label_pairs.clone();
    for (name, value) in desc.variable_labels.iter().zip(label_values) {
        let mut pair = LabelPair::default();
        pair.set_name(name.clone());
        pair.set_value(value.to_string());
        pairs.push(pair);
    }
    pairs.sort_by(|a, b| a.get_name().cmp(b.get_name()));
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn desc(name: &str, labels: &[&str]) -> Desc {
        Desc::new(
            name.to_string(),
            "help".to_string(),
            labels.iter().map(|l| l.to_string()).collect(),
            HashMap::from([("instance".to_string(), "a".to_string())]),
        )
        .unwrap()
    }

    #[test]
    fn groups_observations_by_name() {
        let processes = desc("processes_total", &["state"]);
        let mut sink = PrometheusSink::with_descs(&[&processes]).unwrap();
        sink.observe(&processes, ValueKind::Gauge, 3.0, &["idle"]).unwrap();
        sink.observe(&processes, ValueKind::Gauge, 7.0, &["active"]).unwrap();

        assert_eq!(sink.families().len(), 1);
        let metrics = sink.families()[0].get_metric();
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[1].get_gauge().get_value(), 7.0);

        let labels: Vec<_> = metrics[0]
            .get_label()
            .iter()
            .map(|l| (l.get_name(), l.get_value()))
            .collect();
        assert_eq!(labels, vec![("instance", "a"), ("state", "idle")]);
    }

    #[test]
    fn rejects_label_mismatch() {
        let processes = desc("processes_total", &["state"]);
        let mut sink = PrometheusSink::with_descs(&[&processes]).unwrap();

        let err = sink
            .observe(&processes, ValueKind::Gauge, 1.0, &[])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Prometheus(prometheus::Error::InconsistentCardinality { expect: 1, got: 0 })
        ));
        assert!(sink.families().is_empty());
    }

    #[test]
    fn rejects_unregistered_descriptions() {
        let up = desc("up", &[]);
        let stray = desc("stray", &[]);
        let mut sink = PrometheusSink::with_descs(&[&up]).unwrap();

        let err = sink.observe(&stray, ValueKind::Gauge, 1.0, &[]).unwrap_err();
        assert!(matches!(err, Error::Prometheus(prometheus::Error::Msg(_))));
        assert!(sink
            .observe_summary(&stray, &RunningSummary::new())
            .is_err());
        assert!(sink.families().is_empty());

        sink.observe(&up, ValueKind::Gauge, 1.0, &[]).unwrap();
        assert_eq!(sink.families().len(), 1);
    }

    #[test]
    fn rejects_conflicting_registrations() {
        let up = desc("up", &[]);
        let mut sink = PrometheusSink::with_descs(&[&up]).unwrap();

        assert!(matches!(
            sink.register(&up).unwrap_err(),
            Error::Prometheus(prometheus::Error::AlreadyReg)
        ));
        assert!(sink.register(&desc("up", &["state"])).is_err());
    }

    #[test]
    fn encodes_text_exposition() {
        let up = desc("up", &[]);
        let lifetime_desc = desc("workers_lifetime_summary", &[]);
        let requests_desc = desc("workers_requests_summary", &[]);
        let mut sink = PrometheusSink::with_descs(&[&up, &lifetime_desc, &requests_desc]).unwrap();
        sink.observe(&up, ValueKind::Gauge, 1.0, &[]).unwrap();

        let mut lifetime = RunningSummary::new();
        lifetime.observe(10.0);
        lifetime.observe(20.0);
        sink.observe_summary(&lifetime_desc, &lifetime).unwrap();
        sink.observe_summary(&requests_desc, &RunningSummary::new())
            .unwrap();

        let text = sink.encode().unwrap();
        assert!(text.contains("# TYPE up gauge"));
        assert!(text.contains("up{instance=\"a\"} 1"));
        assert!(text.contains("# TYPE workers_lifetime_summary summary"));
        assert!(text.contains("workers_lifetime_summary{instance=\"a\",quantile=\"0.5\"} 10"));
        assert!(text.contains("workers_lifetime_summary_sum{instance=\"a\"} 30"));
        assert!(text.contains("workers_lifetime_summary_count{instance=\"a\"} 2"));
        assert!(text.contains("workers_requests_summary_count{instance=\"a\"} 0"));
    }
}

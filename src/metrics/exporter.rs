use std::io::Write;

use parking_lot::Mutex;

use crate::metrics::snapshot::{BulkEntriesSnapshot, OutcomeSnapshot};
use crate::metrics::traits::MetricsExporter;

/// Prometheus text exporter for cache outcome snapshots.
///
/// This exporter writes in the Prometheus text exposition format so it can be
/// scraped by Prometheus or forwarded to an OpenTelemetry collector.
#[derive(Debug)]
pub struct PrometheusTextExporter<W: Write + Send> {
    prefix: String,
    cache: String,
    writer: Mutex<W>,
}

impl<W: Write + Send> PrometheusTextExporter<W> {
    pub fn new(prefix: impl Into<String>, cache: impl Into<String>, writer: W) -> Self {
        Self {
            prefix: prefix.into(),
            cache: cache.into(),
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn write_family(&self, name: &str, samples: impl Iterator<Item = (String, u64)>) {
        let mut writer = self.writer.lock();
        let _ = writeln!(writer, "# TYPE {} counter", name);
        for (labels, value) in samples {
            let _ = writeln!(writer, "{}{{{}}} {}", name, labels, value);
        }
    }

    fn metric_name(&self, suffix: &str) -> String {
        if self.prefix.is_empty() {
            suffix.to_string()
        } else {
            format!("{}_{}", self.prefix, suffix)
        }
    }
}

impl<W: Write + Send> MetricsExporter<OutcomeSnapshot> for PrometheusTextExporter<W> {
    fn export(&self, snapshot: &OutcomeSnapshot) {
        let samples = snapshot.iter().map(|(outcome, count)| {
            (
                format!(
                    "cache=\"{}\",operation=\"{}\",outcome=\"{}\"",
                    self.cache,
                    outcome.operation().name(),
                    outcome.label()
                ),
                count,
            )
        });
        self.write_family(&self.metric_name("operations_total"), samples);
    }
}

impl<W: Write + Send> MetricsExporter<BulkEntriesSnapshot> for PrometheusTextExporter<W> {
    fn export(&self, snapshot: &BulkEntriesSnapshot) {
        let samples = snapshot.iter().map(|(op, count)| {
            (
                format!("cache=\"{}\",kind=\"{}\"", self.cache, op.name()),
                count,
            )
        });
        self.write_family(&self.metric_name("bulk_entries_total"), samples);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::counters::{BulkMethodEntries, BulkOps, OutcomeCounters};
    use crate::metrics::outcome::GetOutcome;
    use crate::metrics::traits::{MetricsSnapshotProvider, OutcomeRecorder};

    #[test]
    fn exports_outcome_counters() {
        let counters = OutcomeCounters::new();
        counters.record(GetOutcome::Hit.into());
        counters.record(GetOutcome::Hit.into());

        let exporter = PrometheusTextExporter::new("guardcache", "users", Vec::new());
        exporter.export(&counters.snapshot());
        let text = String::from_utf8(exporter.into_inner()).unwrap();

        assert!(text.starts_with("# TYPE guardcache_operations_total counter\n"));
        assert!(text.contains(
            "guardcache_operations_total{cache=\"users\",operation=\"get\",outcome=\"hit\"} 2"
        ));
        assert!(text.contains(
            "guardcache_operations_total{cache=\"users\",operation=\"clear\",outcome=\"failure\"} 0"
        ));
    }

    #[test]
    fn exports_bulk_entries_without_prefix() {
        let entries = BulkMethodEntries::new();
        entries.add(BulkOps::GetAllMiss, 3);

        let exporter = PrometheusTextExporter::new("", "users", Vec::new());
        exporter.export(&entries.snapshot());
        let text = String::from_utf8(exporter.into_inner()).unwrap();

        assert!(text.contains("bulk_entries_total{cache=\"users\",kind=\"get_all_miss\"} 3"));
    }
}

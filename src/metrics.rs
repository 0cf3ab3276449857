//! Latency recording.

use std::sync::Arc;
use std::time::Instant;

use opentelemetry::metrics::{Histogram, Meter};
use opentelemetry::KeyValue;

use crate::labels::{LATENCY_DESCRIPTION, LATENCY_METRIC};

/// Sink for per-query latency, in microseconds.
///
/// One recorder is shared by every query running through a hook, so
/// implementations must tolerate concurrent calls.
pub trait LatencyRecorder: Send + Sync {
    fn record(&self, micros: u64, labels: &[KeyValue]);
}

impl LatencyRecorder for Histogram<u64> {
    fn record(&self, micros: u64, labels: &[KeyValue]) {
        Histogram::record(self, micros, labels);
    }
}

/// Registers the query latency histogram on `meter`.
pub fn latency_histogram(meter: &Meter) -> Histogram<u64> {
    meter
        .u64_histogram(LATENCY_METRIC)
        .with_description(LATENCY_DESCRIPTION)
        .init()
}

/// Metric labels for one query.
///
/// When armed with a recorder, the latency since `start` is recorded with the
/// labels accumulated so far when this value is dropped.
pub(crate) struct MetricLabels<'a> {
    labels: Vec<KeyValue>,
    recorder: Option<(&'a Arc<dyn LatencyRecorder>, Instant)>,
}

impl<'a> MetricLabels<'a> {
    pub(crate) fn new(recorder: Option<&'a Arc<dyn LatencyRecorder>>, start: Instant) -> Self {
        Self {
            labels: Vec::with_capacity(4),
            recorder: recorder.map(|r| (r, start)),
        }
    }

    pub(crate) fn push(&mut self, label: KeyValue) {
        self.labels.push(label);
    }
}

impl Drop for MetricLabels<'_> {
    fn drop(&mut self) {
        if let Some((recorder, start)) = self.recorder {
            let micros = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
            recorder.record(micros, &self.labels);
        }
    }
}

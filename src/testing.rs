//! Test support: a subscriber layer that captures spans and a recording latency sink.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use opentelemetry::KeyValue;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::metrics::LatencyRecorder;

/// A closed span with the fields recorded on it and the events parented to it.
#[derive(Debug, Clone, Default)]
pub(crate) struct CapturedSpan {
    pub name: &'static str,
    pub fields: HashMap<String, String>,
    pub events: Vec<HashMap<String, String>>,
}

impl CapturedSpan {
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

#[derive(Clone, Default)]
pub(crate) struct SpanCapture {
    closed: Arc<Mutex<Vec<CapturedSpan>>>,
}

impl SpanCapture {
    pub fn subscriber(&self) -> impl Subscriber + Send + Sync {
        tracing_subscriber::registry().with(self.clone())
    }

    pub fn closed(&self) -> Vec<CapturedSpan> {
        self.closed.lock().unwrap().clone()
    }

    pub fn queries(&self) -> Vec<CapturedSpan> {
        self.closed()
            .into_iter()
            .filter(|span| span.name == "db.query")
            .collect()
    }

    pub fn single_query(&self) -> CapturedSpan {
        let mut queries = self.queries();
        assert_eq!(queries.len(), 1, "expected exactly one db.query span");
        queries.remove(0)
    }
}

struct FieldMap<'a>(&'a mut HashMap<String, String>);

impl Visit for FieldMap<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{value:?}"));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.0.insert(field.name().to_string(), value.to_string());
    }
}

impl<S> Layer<S> for SpanCapture
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut captured = CapturedSpan {
            name: attrs.metadata().name(),
            ..Default::default()
        };
        attrs.record(&mut FieldMap(&mut captured.fields));
        span.extensions_mut().insert(captured);
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        if let Some(captured) = span.extensions_mut().get_mut::<CapturedSpan>() {
            values.record(&mut FieldMap(&mut captured.fields));
        };
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.event_span(event) else {
            return;
        };
        let mut fields = HashMap::new();
        event.record(&mut FieldMap(&mut fields));
        fields.insert("level".to_string(), event.metadata().level().to_string());
        if let Some(captured) = span.extensions_mut().get_mut::<CapturedSpan>() {
            captured.events.push(fields);
        };
    }

    fn on_close(&self, id: Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(&id) else {
            return;
        };
        if let Some(captured) = span.extensions_mut().remove::<CapturedSpan>() {
            self.closed.lock().unwrap().push(captured);
        };
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Recorded {
    pub micros: u64,
    pub labels: Vec<KeyValue>,
}

impl Recorded {
    pub fn label(&self, key: &str) -> Option<String> {
        self.labels
            .iter()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| kv.value.as_str().into_owned())
    }
}

#[derive(Debug, Default)]
pub(crate) struct RecordingRecorder {
    records: Mutex<Vec<Recorded>>,
}

impl RecordingRecorder {
    pub fn records(&self) -> Vec<Recorded> {
        self.records.lock().unwrap().clone()
    }
}

impl LatencyRecorder for RecordingRecorder {
    fn record(&self, micros: u64, labels: &[KeyValue]) {
        self.records.lock().unwrap().push(Recorded {
            micros,
            labels: labels.to_vec(),
        });
    }
}

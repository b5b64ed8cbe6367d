use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;
use tracing::{Id, Subscriber};
use tracing_subscriber::{Layer, layer::Context, registry::LookupSpan};

/// A closed span, as captured by [`SpanCaptureLayer`].
#[derive(Debug, Clone, Serialize)]
pub struct SpanRecord {
    /// Hex span id.
    pub id: String,
    pub name: String,
    /// Hex id of the enclosing span, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Nanoseconds since the Unix epoch.
    pub start_time: u128,
    pub end_time: u128,
    /// Fields recorded on the span, at creation or later.
    pub fields: HashMap<String, serde_json::Value>,
    /// Fields of every event emitted directly inside the span, in order.
    pub events: Vec<HashMap<String, serde_json::Value>>,
}

impl SpanRecord {
    /// Span duration in nanoseconds.
    pub fn duration_nanos(&self) -> u128 {
        self.end_time.saturating_sub(self.start_time)
    }

    /// Look up a recorded field.
    pub fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.fields.get(key)
    }

    /// The `message` of each event inside the span.
    pub fn messages(&self) -> Vec<&str> {
        self.events.iter().filter_map(|e| e.get("message").and_then(|m| m.as_str())).collect()
    }
}

/// Shared storage for captured spans, in the order they closed.
#[derive(Debug, Clone, Default)]
pub struct SpanStore {
    spans: Arc<RwLock<Vec<SpanRecord>>>,
}

impl SpanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every captured span.
    pub fn spans(&self) -> Vec<SpanRecord> {
        self.spans.read().map(|spans| spans.clone()).unwrap_or_default()
    }

    /// Captured spans with the given name, e.g. `rag.answer`.
    pub fn named(&self, name: &str) -> Vec<SpanRecord> {
        self.spans
            .read()
            .map(|spans| spans.iter().filter(|s| s.name == name).cloned().collect())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut spans) = self.spans.write() {
            spans.clear();
        }
    }

    fn push(&self, span: SpanRecord) {
        if let Ok(mut spans) = self.spans.write() {
            spans.push(span);
        }
    }
}

/// A tracing layer that records closed spans into a [`SpanStore`].
pub struct SpanCaptureLayer {
    store: SpanStore,
}

impl SpanCaptureLayer {
    pub fn new(store: SpanStore) -> Self {
        Self { store }
    }
}

struct StartTime(u128);

#[derive(Default)]
struct SpanFields(HashMap<String, serde_json::Value>);

#[derive(Default)]
struct SpanEvents(Vec<HashMap<String, serde_json::Value>>);

fn now_nanos() -> u128 {
    SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default().as_nanos()
}

impl<S> Layer<S> for SpanCaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &tracing::span::Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut visitor = JsonVisitor::default();
        attrs.record(&mut visitor);

        let mut extensions = span.extensions_mut();
        extensions.insert(StartTime(now_nanos()));
        extensions.insert(SpanFields(visitor.0));
        extensions.insert(SpanEvents::default());
    }

    fn on_record(&self, id: &Id, values: &tracing::span::Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut extensions = span.extensions_mut();
        if let Some(fields) = extensions.get_mut::<SpanFields>() {
            let mut visitor = JsonVisitor::default();
            values.record(&mut visitor);
            fields.0.extend(visitor.0);
        }
    }

    fn on_event(&self, event: &tracing::Event<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.event_span(event) else { return };
        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);
        let mut extensions = span.extensions_mut();
        if let Some(events) = extensions.get_mut::<SpanEvents>() {
            events.0.push(visitor.0);
        }
    }

    fn on_close(&self, id: Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(&id) else { return };
        let mut extensions = span.extensions_mut();
        let start_time = extensions.remove::<StartTime>().map(|s| s.0).unwrap_or(0);
        let fields = extensions.remove::<SpanFields>().unwrap_or_default().0;
        let events = extensions.remove::<SpanEvents>().unwrap_or_default().0;

        self.store.push(SpanRecord {
            id: format!("{:016x}", id.into_u64()),
            name: span.metadata().name().to_string(),
            parent_id: span.parent().map(|p| format!("{:016x}", p.id().into_u64())),
            start_time,
            end_time: now_nanos(),
            fields,
            events,
        });
    }
}

#[derive(Default)]
struct JsonVisitor(HashMap<String, serde_json::Value>);

impl tracing::field::Visit for JsonVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().to_string(), serde_json::Value::String(format!("{value:?}")));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.0.insert(field.name().to_string(), serde_json::Value::Bool(value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }
}

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tracing::{field::Field, span, subscriber::Interest, Level, Metadata};

/// Models the data reported in a tracing event.
#[derive(Debug, Clone)]
pub(crate) struct TracingEvent {
    /// The verbosity level.
    pub(crate) level: Level,
    /// The target, i.e. component the event corresponds to.
    pub(crate) target: String,
    /// Map of key/value pairs attached to the event. The event's message is stored under
    /// `"message"`.
    pub(crate) fields: HashMap<String, TracingEventValue>,
}

impl TracingEvent {
    fn new(level: Level, target: String) -> TracingEvent {
        TracingEvent {
            level,
            target,
            fields: Default::default(),
        }
    }

    pub(crate) fn message(&self) -> Option<&str> {
        match self.fields.get("message") {
            Some(TracingEventValue::String(message)) => Some(message),
            _ => None,
        }
    }
}

/// Models the value of a field in a tracing event.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TracingEventValue {
    I64(i64),
    U64(u64),
    Bool(bool),
    String(String),
}

/// A type for use in tests that need to consume tracing events. Install it with
/// `set_as_default` for the current thread; every event at or above `max_verbosity_level`
/// is recorded and can be inspected with `events`.
#[derive(Clone)]
pub(crate) struct TracingHandler {
    max_verbosity_level: Level,
    events: Arc<Mutex<Vec<TracingEvent>>>,
}

impl TracingHandler {
    pub(crate) fn new(max_verbosity_level: Level) -> TracingHandler {
        Self {
            max_verbosity_level,
            events: Default::default(),
        }
    }

    /// Installs this via `tracing` as the default handler for tracing events until the returned
    /// guard is dropped.
    pub(crate) fn set_as_default(&self) -> tracing::subscriber::DefaultGuard {
        tracing::subscriber::set_default(self.clone())
    }

    /// Returns the events recorded so far for `target`.
    pub(crate) fn events(&self, target: &str) -> Vec<TracingEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.target == target)
            .cloned()
            .collect()
    }
}

/// Implementation allowing `TracingHandler` to subscribe to `tracing` events.
impl tracing::Subscriber for TracingHandler {
    /// Always re-evaluate `enabled`, since other tests may install handlers with different
    /// levels on other threads.
    fn register_callsite(&self, _metadata: &'static Metadata<'static>) -> Interest {
        Interest::sometimes()
    }

    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= &self.max_verbosity_level
    }

    fn event(&self, event: &tracing::Event<'_>) {
        let mut test_event = TracingEvent::new(
            *event.metadata().level(),
            event.metadata().target().to_string(),
        );
        let mut visitor = TracingEventVisitor {
            event: &mut test_event,
        };
        event.record(&mut visitor);
        self.events.lock().unwrap().push(test_event);
    }

    /// These methods all relate to spans. Since we don't create any spans ourselves or need
    /// to make any assertions about them, we do not need real implementations.
    fn new_span(&self, _span: &span::Attributes<'_>) -> span::Id {
        span::Id::from_u64(1)
    }
    fn record(&self, _span: &span::Id, _values: &span::Record<'_>) {}
    fn record_follows_from(&self, _span: &span::Id, _follows: &span::Id) {}
    fn enter(&self, _span: &span::Id) {}
    fn exit(&self, _span: &span::Id) {}
}

/// A visitor which traverses each value in a tracing event and stores it in the underlying
/// `TracingEvent`.
struct TracingEventVisitor<'a> {
    event: &'a mut TracingEvent,
}

impl TracingEventVisitor<'_> {
    fn insert(&mut self, field: &Field, value: TracingEventValue) {
        self.event.fields.insert(field.name().to_string(), value);
    }
}

impl tracing::field::Visit for TracingEventVisitor<'_> {
    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, TracingEventValue::I64(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, TracingEventValue::U64(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, TracingEventValue::Bool(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, TracingEventValue::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.insert(field, TracingEventValue::String(format!("{value:?}")));
    }
}

use crate::buffer::with_output_buffer;
use crate::config::EcsConfig;
use crate::encoder::EcsEncoder;
use crate::record::EcsRecord;
use crate::serializer::{EcsObject, FieldValue, Origin, ThreadRef};
use crate::throwable::serialize_error;
use chrono::Utc;
use std::error::Error;
use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::Thread;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Event field holding the message.
const MESSAGE_FIELD: &str = "message";
/// Event field holding comma-separated tags.
const TAGS_FIELD: &str = "tags";
/// Event field overriding `error.type` of the recorded error.
const ERROR_TYPE_FIELD: &str = "error_type";

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_ID: u64 = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
}

/// `tracing_subscriber` layer that writes every event as one ECS JSON line.
///
/// Fields of the spans an event is in are written as context fields, root
/// span first, followed by the event's own fields. An error recorded on the
/// event (`error = &err as &dyn Error`) becomes the `error.*` fields; its
/// source chain is the stack trace.
///
/// Each line is built in a thread-local buffer and handed to the writer with
/// a single `write_all`.
pub struct EcsLayer<W = fn() -> io::Stdout> {
    encoder: EcsEncoder,
    make_writer: W,
    /// Lines written successfully.
    pub written_events: Arc<AtomicU64>,
    /// Lines lost because the writer failed.
    pub failed_events: Arc<AtomicU64>,
}

impl EcsLayer {
    /// Layer writing to stdout.
    pub fn new(config: EcsConfig) -> Self {
        Self::with_writer(config, io::stdout)
    }
}

impl<W> EcsLayer<W>
where
    W: for<'w> MakeWriter<'w> + 'static,
{
    /// Layer writing through `make_writer`.
    pub fn with_writer(config: EcsConfig, make_writer: W) -> Self {
        EcsLayer {
            encoder: EcsEncoder::new(config),
            make_writer,
            written_events: Arc::new(AtomicU64::new(0)),
            failed_events: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn encoder(&self) -> &EcsEncoder {
        &self.encoder
    }
}

/// Context fields recorded on a span.
struct SpanFields(Vec<(String, FieldValue)>);

impl<S, W> Layer<S> for EcsLayer<W>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
    W: for<'w> MakeWriter<'w> + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut fields = Vec::new();
        attrs.record(&mut FieldVisitor { fields: &mut fields });
        span.extensions_mut().insert(SpanFields(fields));
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut extensions = span.extensions_mut();
        if let Some(SpanFields(fields)) = extensions.get_mut::<SpanFields>() {
            values.record(&mut FieldVisitor { fields });
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let timestamp_millis = Utc::now().timestamp_millis();
        let meta = event.metadata();

        let mut collected = EventFields::default();
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                if let Some(SpanFields(fields)) = span.extensions().get::<SpanFields>() {
                    for (key, value) in fields {
                        upsert(&mut collected.fields, key, value.clone());
                    }
                }
            }
        }
        event.record(&mut EventVisitor { collected: &mut collected });

        let current = std::thread::current();
        let thread = thread_ref(&current);

        let origin = meta.file().map(|file| Origin {
            file,
            function: meta.module_path().unwrap_or_else(|| meta.target()),
            line: meta.line(),
        });

        let record = EcsRecord {
            timestamp_millis,
            level: meta.level().as_str(),
            message: collected.message.as_deref(),
            logger: Some(meta.target()),
            thread,
            tags: &collected.tags,
            fields: &collected.fields,
            origin,
            exception: None,
        };

        with_output_buffer(|buf| {
            self.encoder.encode_with(buf, &record, |obj, as_array| {
                if let Some(field) = collected.error_field {
                    let type_name = collected.error_type.as_deref().unwrap_or(field);
                    event.record(&mut ErrorVisitor { obj, field, type_name, as_array });
                }
            });

            let mut writer = self.make_writer.make_writer_for(meta);
            match writer.write_all(buf.as_bytes()) {
                Ok(()) => {
                    self.written_events.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    self.failed_events.fetch_add(1, Ordering::Relaxed);
                    eprintln!("failed to write ECS log line: {}", e);
                }
            }
        });
    }
}

/// Name of `thread`, or its numeric id when unnamed. `None` once this
/// thread's locals are being torn down.
fn thread_ref(thread: &Thread) -> Option<ThreadRef<'_>> {
    match thread.name() {
        Some(name) => Some(ThreadRef::Name(name)),
        None => THREAD_ID.try_with(|id| *id).ok().map(ThreadRef::Id),
    }
}

/// Replaces the value of `key` in place, or appends it.
fn upsert(fields: &mut Vec<(String, FieldValue)>, key: &str, value: FieldValue) {
    match fields.iter_mut().find(|(k, _)| k == key) {
        Some((_, existing)) => *existing = value,
        None => fields.push((key.to_string(), value)),
    }
}

/// Records every field as a context field.
pub struct FieldVisitor<'a> {
    pub fields: &'a mut Vec<(String, FieldValue)>,
}

impl Visit for FieldVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        upsert(self.fields, field.name(), FieldValue::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        upsert(self.fields, field.name(), FieldValue::Integer(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        let value = match i64::try_from(value) {
            Ok(value) => FieldValue::Integer(value),
            Err(_) => FieldValue::Text(value.to_string()),
        };
        upsert(self.fields, field.name(), value);
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        upsert(self.fields, field.name(), FieldValue::Boolean(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        upsert(self.fields, field.name(), FieldValue::Text(value.to_string()));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn Error + 'static)) {
        upsert(self.fields, field.name(), FieldValue::Text(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        upsert(self.fields, field.name(), FieldValue::Text(format!("{:?}", value)));
    }
}

#[derive(Default)]
struct EventFields {
    message: Option<String>,
    tags: Vec<String>,
    error_type: Option<String>,
    /// Name of the first error-valued field.
    error_field: Option<&'static str>,
    fields: Vec<(String, FieldValue)>,
}

/// Picks the message, tags and error out of an event's fields and records
/// everything else as context fields.
struct EventVisitor<'a> {
    collected: &'a mut EventFields,
}

impl EventVisitor<'_> {
    fn context(&mut self) -> FieldVisitor<'_> {
        FieldVisitor { fields: &mut self.collected.fields }
    }

    fn text(&mut self, field: &Field, value: String) {
        match field.name() {
            MESSAGE_FIELD => self.collected.message = Some(value),
            TAGS_FIELD => {
                self.collected.tags = value
                    .split(',')
                    .map(str::trim)
                    .filter(|tag| !tag.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            ERROR_TYPE_FIELD => self.collected.error_type = Some(value),
            _ => upsert(&mut self.collected.fields, field.name(), FieldValue::Text(value)),
        }
    }
}

impl Visit for EventVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.text(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.context().record_i64(field, value);
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.context().record_u64(field, value);
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.context().record_bool(field, value);
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.context().record_f64(field, value);
    }

    fn record_error(&mut self, field: &Field, value: &(dyn Error + 'static)) {
        if self.collected.error_field.is_none() {
            self.collected.error_field = Some(field.name());
        } else {
            self.context().record_error(field, value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.text(field, format!("{:?}", value));
    }
}

/// Second pass over an event: serializes the chosen error field while the
/// error value is still borrowed.
struct ErrorVisitor<'o, 'b> {
    obj: &'o mut EcsObject<'b>,
    field: &'static str,
    type_name: &'o str,
    as_array: bool,
}

impl Visit for ErrorVisitor<'_, '_> {
    fn record_error(&mut self, field: &Field, value: &(dyn Error + 'static)) {
        if field.name() == self.field {
            serialize_error(self.obj.buffer(), self.type_name, value, None, self.as_array);
        }
    }

    fn record_debug(&mut self, _field: &Field, _value: &dyn fmt::Debug) {}
}

//! Field-by-field construction of one ECS JSON line.
//!
//! [`EcsObject::start`] opens the object and writes `@timestamp`. Every field
//! writer appends `"key":value,` or nothing at all when its value is absent.
//! [`EcsObject::end`] drops the last trailing comma and closes the line.
//! Because `end` consumes the builder, nothing can be written after it.

use std::fmt;

use crate::escape::quote;
use crate::throwable::{serialize_exception, Exception};
use crate::timestamp::serialize_timestamp;

/// ECS version written to `ecs.version`.
pub const ECS_VERSION: &str = "1.2.0";

/// Width the `log.level` value is padded to.
const LEVEL_WIDTH: usize = 5;

/// Value of an arbitrary key/value field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Boolean(bool),
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::Boolean(b) => write!(f, "{b}"),
        }
    }
}

/// Which thread emitted an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadRef<'a> {
    Name(&'a str),
    Id(u64),
}

/// Where in the source an event was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Origin<'a> {
    pub file: &'a str,
    pub function: &'a str,
    pub line: Option<u32>,
}

/// An open JSON object writing into a borrowed buffer.
pub struct EcsObject<'b> {
    buf: &'b mut String,
}

impl<'b> EcsObject<'b> {
    /// Opens the object: `{"@timestamp":"<iso-8601>",`.
    pub fn start(buf: &'b mut String, epoch_millis: i64) -> Self {
        buf.push_str("{\"@timestamp\":\"");
        serialize_timestamp(buf, epoch_millis);
        buf.push_str("\",");
        EcsObject { buf }
    }

    /// Closes the object: removes one trailing comma, appends `}` and `\n`.
    pub fn end(self) {
        if self.buf.ends_with(',') {
            self.buf.pop();
        }
        self.buf.push('}');
        self.buf.push('\n');
    }

    /// `log.level`, left-padded with spaces inside the value so that levels
    /// line up: `" WARN"`, `"ERROR"`.
    pub fn log_level(&mut self, level: &str) -> &mut Self {
        self.buf.push_str("\"log.level\":\"");
        for _ in level.chars().count()..LEVEL_WIDTH {
            self.buf.push(' ');
        }
        quote(self.buf, level);
        self.buf.push_str("\",");
        self
    }

    /// `message`. An absent message writes nothing.
    pub fn message(&mut self, message: Option<&str>) -> &mut Self {
        self.text_field("message", message)
    }

    pub fn ecs_version(&mut self) -> &mut Self {
        self.text_field("ecs.version", Some(ECS_VERSION))
    }

    /// `tags` as a JSON array. Nothing is written when `tags` is empty.
    pub fn tags<'t>(&mut self, tags: impl IntoIterator<Item = &'t str>) -> &mut Self {
        let rollback = self.buf.len();
        self.buf.push_str("\"tags\":[");
        let mut empty = true;
        for tag in tags {
            if !empty {
                self.buf.push(',');
            }
            empty = false;
            self.buf.push('"');
            quote(self.buf, tag);
            self.buf.push('"');
        }
        if empty {
            self.buf.truncate(rollback);
        } else {
            self.buf.push_str("],");
        }
        self
    }

    pub fn service_name(&mut self, name: Option<&str>) -> &mut Self {
        self.text_field("service.name", name)
    }

    pub fn service_version(&mut self, version: Option<&str>) -> &mut Self {
        self.text_field("service.version", version)
    }

    pub fn service_environment(&mut self, environment: Option<&str>) -> &mut Self {
        self.text_field("service.environment", environment)
    }

    pub fn service_node_name(&mut self, node_name: Option<&str>) -> &mut Self {
        self.text_field("service.node.name", node_name)
    }

    pub fn event_dataset(&mut self, dataset: Option<&str>) -> &mut Self {
        self.text_field("event.dataset", dataset)
    }

    pub fn data_stream_namespace(&mut self, namespace: Option<&str>) -> &mut Self {
        self.text_field("data_stream.namespace", namespace)
    }

    /// `process.thread.name` or, for unnamed threads, the numeric
    /// `process.thread.id`.
    pub fn thread(&mut self, thread: Option<ThreadRef<'_>>) -> &mut Self {
        match thread {
            Some(ThreadRef::Name(name)) => self.text_field("process.thread.name", Some(name)),
            Some(ThreadRef::Id(id)) => {
                self.buf.push_str("\"process.thread.id\":");
                self.buf.push_str(itoa::Buffer::new().format(id));
                self.buf.push(',');
                self
            }
            None => self,
        }
    }

    pub fn logger_name(&mut self, logger: Option<&str>) -> &mut Self {
        self.text_field("log.logger", logger)
    }

    /// One `"key":value,` fragment with the key used verbatim.
    pub fn field(&mut self, key: &str, value: &FieldValue) -> &mut Self {
        self.buf.push('"');
        quote(self.buf, key);
        self.buf.push_str("\":");
        match value {
            FieldValue::Text(text) => {
                self.buf.push('"');
                quote(self.buf, text);
                self.buf.push('"');
            }
            FieldValue::Integer(i) => self.buf.push_str(itoa::Buffer::new().format(*i)),
            FieldValue::Boolean(b) => self.buf.push_str(if *b { "true" } else { "false" }),
        }
        self.buf.push(',');
        self
    }

    /// Context fields, in iteration order.
    pub fn fields<'f>(&mut self, fields: impl IntoIterator<Item = (&'f str, &'f FieldValue)>) -> &mut Self {
        for (key, value) in fields {
            self.field(key, value);
        }
        self
    }

    /// Static string fields, in iteration order.
    pub fn string_fields<'f>(&mut self, fields: impl IntoIterator<Item = (&'f str, &'f str)>) -> &mut Self {
        for (key, value) in fields {
            self.buf.push('"');
            quote(self.buf, key);
            self.buf.push_str("\":\"");
            quote(self.buf, value);
            self.buf.push_str("\",");
        }
        self
    }

    /// `log.origin` as a nested object. The line number is left out when
    /// unknown.
    pub fn origin(&mut self, origin: Option<Origin<'_>>) -> &mut Self {
        let Some(origin) = origin else {
            return self;
        };
        self.buf.push_str("\"log\":{\"origin\":{\"file\":{\"name\":\"");
        quote(self.buf, origin.file);
        self.buf.push('"');
        if let Some(line) = origin.line {
            self.buf.push_str(",\"line\":");
            self.buf.push_str(itoa::Buffer::new().format(line));
        }
        self.buf.push_str("},\"function\":\"");
        quote(self.buf, origin.function);
        self.buf.push_str("\"}},");
        self
    }

    /// `error.type`, `error.message` and `error.stack_trace`.
    pub fn exception(&mut self, exception: &Exception<'_>, stack_trace_as_array: bool) -> &mut Self {
        serialize_exception(
            self.buf,
            exception.type_name,
            exception.message,
            exception.stack,
            stack_trace_as_array,
        );
        self
    }

    /// Direct access for callers writing fields of their own. Every fragment
    /// written must end with a comma.
    pub fn buffer(&mut self) -> &mut String {
        &mut *self.buf
    }

    fn text_field(&mut self, key: &str, value: Option<&str>) -> &mut Self {
        if let Some(value) = value {
            self.buf.push('"');
            self.buf.push_str(key);
            self.buf.push_str("\":\"");
            quote(self.buf, value);
            self.buf.push_str("\",");
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::throwable::StackTrace;
    use proptest::prelude::*;
    use serde_json::Value;

    const MILLIS: i64 = 1_771_588_800_123;

    fn build(f: impl FnOnce(&mut EcsObject<'_>)) -> String {
        let mut buf = String::new();
        let mut obj = EcsObject::start(&mut buf, MILLIS);
        f(&mut obj);
        obj.end();
        buf
    }

    fn parse(line: &str) -> Value {
        assert!(line.ends_with("}\n"), "{line:?}");
        serde_json::from_str(line).unwrap_or_else(|e| panic!("{e}: {line}"))
    }

    #[test]
    fn empty_object() {
        let line = build(|_| {});
        assert_eq!(line, "{\"@timestamp\":\"2026-02-20T12:00:00.123Z\"}\n");
    }

    #[test]
    fn timestamp_is_first() {
        let line = build(|obj| {
            obj.log_level("INFO").message(Some("hi"));
        });
        assert!(line.starts_with("{\"@timestamp\":\"2026-02-20T12:00:00.123Z\","));
        assert_eq!(line.matches("@timestamp").count(), 1);
        parse(&line);
    }

    #[test]
    fn level_is_padded_inside_the_value() {
        let line = build(|obj| {
            obj.log_level("WARN");
        });
        assert!(line.contains("\"log.level\":\" WARN\""), "{line}");

        let line = build(|obj| {
            obj.log_level("ERROR");
        });
        assert!(line.contains("\"log.level\":\"ERROR\""), "{line}");
    }

    #[test]
    fn absent_values_write_nothing() {
        let line = build(|obj| {
            obj.message(None)
                .service_name(None)
                .logger_name(None)
                .thread(None)
                .origin(None)
                .tags(std::iter::empty());
        });
        assert_eq!(line, "{\"@timestamp\":\"2026-02-20T12:00:00.123Z\"}\n");
    }

    #[test]
    fn tags_array() {
        let line = build(|obj| {
            obj.tags(["a", "b\"c"]).ecs_version();
        });
        assert!(line.contains(r#""tags":["a","b\"c"],"ecs.version""#), "{line}");
        assert_eq!(parse(&line)["tags"], serde_json::json!(["a", "b\"c"]));
    }

    #[test]
    fn thread_id_is_a_number() {
        let json = parse(&build(|obj| {
            obj.thread(Some(ThreadRef::Id(42)));
        }));
        assert_eq!(json["process.thread.id"], 42);

        let json = parse(&build(|obj| {
            obj.thread(Some(ThreadRef::Name("main")));
        }));
        assert_eq!(json["process.thread.name"], "main");
    }

    #[test]
    fn typed_context_fields() {
        let fields = vec![
            ("user.id".to_string(), FieldValue::from("u-1")),
            ("attempt".to_string(), FieldValue::from(3i64)),
            ("cached".to_string(), FieldValue::from(false)),
        ];
        let line = build(|obj| {
            obj.fields(fields.iter().map(|(k, v)| (k.as_str(), v)));
        });
        assert!(line.contains(r#""user.id":"u-1","attempt":3,"cached":false}"#), "{line}");
    }

    #[test]
    fn keys_are_escaped_verbatim() {
        let json = parse(&build(|obj| {
            obj.string_fields([("key\"", "=value\"")]);
        }));
        assert_eq!(json["key\""], "=value\"");
    }

    #[test]
    fn origin_with_and_without_line() {
        let json = parse(&build(|obj| {
            obj.origin(Some(Origin { file: "main.rs", function: "app::run", line: Some(7) }));
        }));
        assert_eq!(json["log"]["origin"]["file"]["name"], "main.rs");
        assert_eq!(json["log"]["origin"]["file"]["line"], 7);
        assert_eq!(json["log"]["origin"]["function"], "app::run");

        let json = parse(&build(|obj| {
            obj.origin(Some(Origin { file: "main.rs", function: "run", line: None }));
        }));
        assert!(json["log"]["origin"]["file"].get("line").is_none());
    }

    #[test]
    fn exception_is_last_and_closes_cleanly() {
        let line = build(|obj| {
            obj.message(Some("boom")).exception(
                &Exception::new("Crash", None, StackTrace::Text("Crash\n\tat main")),
                true,
            );
        });
        assert!(line.ends_with("\"error.stack_trace\":[\"Crash\",\"\\tat main\"]}\n"), "{line}");
        parse(&line);
    }

    #[test]
    fn escaping_in_every_text_field() {
        let json = parse(&build(|obj| {
            obj.logger_name(Some("logger\""))
                .service_name(Some("test\""))
                .service_version(Some("test-version\""))
                .service_environment(Some("test-environment\""))
                .service_node_name(Some("test-node\""))
                .event_dataset(Some("event-dataset\""))
                .thread(Some(ThreadRef::Name("thread\"")));
        }));
        assert_eq!(json["log.logger"], "logger\"");
        assert_eq!(json["service.name"], "test\"");
        assert_eq!(json["service.version"], "test-version\"");
        assert_eq!(json["service.environment"], "test-environment\"");
        assert_eq!(json["service.node.name"], "test-node\"");
        assert_eq!(json["event.dataset"], "event-dataset\"");
        assert_eq!(json["process.thread.name"], "thread\"");
    }

    #[test]
    fn custom_fragment_through_buffer() {
        let json = parse(&build(|obj| {
            obj.buffer().push_str("\"custom\":1,");
        }));
        assert_eq!(json["custom"], 1);
    }

    fn apply(obj: &mut EcsObject<'_>, op: u8, text: &str, number: i64) {
        match op % 16 {
            0 => obj.log_level(text),
            1 => obj.message(Some(text)),
            2 => obj.ecs_version(),
            3 => obj.tags(text.split(',')),
            4 => obj.service_name(Some(text)),
            5 => obj.service_version(Some(text)),
            6 => obj.service_environment(Some(text)),
            7 => obj.service_node_name(Some(text)),
            8 => obj.event_dataset(Some(text)).data_stream_namespace(Some(text)),
            9 => obj.thread(Some(ThreadRef::Name(text))),
            10 => obj.thread(Some(ThreadRef::Id(number.unsigned_abs()))),
            11 => obj.logger_name(Some(text)),
            12 => obj.field(text, &FieldValue::Integer(number)).field(text, &FieldValue::Boolean(number > 0)),
            13 => obj.string_fields([(text, text)]),
            14 => obj.origin(Some(Origin { file: text, function: text, line: u32::try_from(number).ok() })),
            _ => obj.exception(&Exception::new(text, Some(&text), StackTrace::Text(text)), number % 2 == 0),
        };
    }

    proptest! {
        #[test]
        fn any_sequence_of_writes_is_one_json_line(
            millis in any::<i64>(),
            ops in prop::collection::vec((any::<u8>(), ".*", any::<i64>()), 0..24),
        ) {
            let mut buf = String::new();
            let mut obj = EcsObject::start(&mut buf, millis);
            for (op, text, number) in &ops {
                apply(&mut obj, *op, text, *number);
            }
            obj.end();

            prop_assert!(buf.starts_with("{\"@timestamp\":\""), "bad prefix: {}", buf);
            prop_assert!(buf.ends_with("}\n"), "bad suffix: {}", buf);
            prop_assert_eq!(buf.matches('\n').count(), 1);
            let parsed: Result<Value, _> = serde_json::from_str(&buf);
            prop_assert!(parsed.is_ok(), "{:?}: {}", parsed.as_ref().err(), buf);
            prop_assert!(parsed.unwrap().is_object());
        }
    }
}

//! Writes a whole [`EcsRecord`] in the fixed field order:
//!
//! 1. `@timestamp`
//! 2. `log.level`
//! 3. `message`
//! 4. `ecs.version`
//! 5. `tags`
//! 6. `service.name`, `service.version`, `service.environment`, `service.node.name`
//! 7. `event.dataset`, `data_stream.namespace`
//! 8. `process.thread.name` or `process.thread.id`
//! 9. `log.logger`
//! 10. additional fields from the config
//! 11. context fields of the record
//! 12. `log.origin`, when enabled
//! 13. `error.type`, `error.message`, `error.stack_trace`

use crate::buffer::with_output_buffer;
use crate::config::EcsConfig;
use crate::record::EcsRecord;
use crate::serializer::EcsObject;

/// Encoder holding a finalized [`EcsConfig`].
#[derive(Debug, Clone)]
pub struct EcsEncoder {
    config: EcsConfig,
}

impl EcsEncoder {
    /// Finalizes `config` (dataset default, sanitizing) and keeps it.
    pub fn new(config: EcsConfig) -> Self {
        EcsEncoder { config: config.finalize() }
    }

    pub fn config(&self) -> &EcsConfig {
        &self.config
    }

    /// Appends the JSON line for `record` to `buf`.
    pub fn encode(&self, buf: &mut String, record: &EcsRecord<'_>) {
        self.encode_with(buf, record, |obj, as_array| {
            if let Some(exception) = &record.exception {
                obj.exception(exception, as_array);
            }
        });
    }

    /// Like [`encode`](Self::encode), but the error fields are written by
    /// `write_exception` instead of coming from `record.exception`.
    ///
    /// Adapters whose error values only live inside a callback use this to
    /// write them in place. The closure receives the open object and whether
    /// stack traces should be arrays.
    pub fn encode_with<F>(&self, buf: &mut String, record: &EcsRecord<'_>, write_exception: F)
    where
        F: FnOnce(&mut EcsObject<'_>, bool),
    {
        let config = &self.config;
        let mut obj = EcsObject::start(buf, record.timestamp_millis);

        obj.log_level(record.level)
            .message(record.message)
            .ecs_version()
            .tags(record.tags.iter().map(String::as_str))
            .service_name(config.service_name.as_deref())
            .service_version(config.service_version.as_deref())
            .service_environment(config.service_environment.as_deref())
            .service_node_name(config.service_node_name.as_deref())
            .event_dataset(config.event_dataset.as_deref())
            .data_stream_namespace(config.data_stream_namespace.as_deref())
            .thread(record.thread)
            .logger_name(record.logger)
            .string_fields(
                config
                    .additional_fields
                    .iter()
                    .map(|field| (field.key.as_str(), field.value.as_str())),
            )
            .fields(record.fields.iter().map(|(key, value)| (key.as_str(), value)));

        if config.include_origin {
            obj.origin(record.origin);
        }

        write_exception(&mut obj, config.stack_trace_as_array);
        obj.end();
    }

    /// Returns the JSON line for `record`, built in this thread's output
    /// buffer.
    pub fn to_line(&self, record: &EcsRecord<'_>) -> String {
        with_output_buffer(|buf| {
            self.encode(buf, record);
            buf.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdditionalField;
    use crate::serializer::{FieldValue, Origin, ThreadRef};
    use crate::throwable::{Exception, StackTrace};
    use serde_json::Value;

    const MILLIS: i64 = 1_771_588_800_123;

    fn keys(line: &str) -> Vec<String> {
        let json: serde_json::Map<String, Value> = serde_json::from_str(line).unwrap();
        json.keys().cloned().collect()
    }

    fn full_config() -> EcsConfig {
        EcsConfig {
            service_name: Some("billing".to_string()),
            service_version: Some("1.0".to_string()),
            service_environment: Some("prod".to_string()),
            service_node_name: Some("node-1".to_string()),
            event_dataset: None,
            data_stream_namespace: Some("Default".to_string()),
            include_origin: true,
            stack_trace_as_array: false,
            additional_fields: vec![AdditionalField::new("team", "payments")],
        }
    }

    #[test]
    fn minimal_record() {
        let encoder = EcsEncoder::new(EcsConfig::default());
        let line = encoder.to_line(&EcsRecord::new(MILLIS, "INFO"));
        assert_eq!(
            line,
            "{\"@timestamp\":\"2026-02-20T12:00:00.123Z\",\"log.level\":\" INFO\",\"ecs.version\":\"1.2.0\"}\n"
        );
    }

    #[test]
    fn fields_come_in_catalog_order() {
        let encoder = EcsEncoder::new(full_config());
        let tags = vec!["audit".to_string()];
        let fields = vec![("order.id".to_string(), FieldValue::from(17i64))];
        let record = EcsRecord {
            message: Some("charged"),
            logger: Some("billing::charge"),
            thread: Some(ThreadRef::Name("worker-1")),
            tags: &tags,
            fields: &fields,
            origin: Some(Origin { file: "src/charge.rs", function: "billing::charge", line: Some(12) }),
            exception: Some(Exception::new("Declined", Some(&"card declined"), StackTrace::Text("Declined\n\tat charge"))),
            ..EcsRecord::new(MILLIS, "WARN")
        };

        let line = encoder.to_line(&record);
        // serde_json's Map is ordered by key unless `preserve_order` is on, so
        // check the order on the raw text.
        let order = [
            "\"@timestamp\"",
            "\"log.level\"",
            "\"message\"",
            "\"ecs.version\"",
            "\"tags\"",
            "\"service.name\"",
            "\"service.version\"",
            "\"service.environment\"",
            "\"service.node.name\"",
            "\"event.dataset\"",
            "\"data_stream.namespace\"",
            "\"process.thread.name\"",
            "\"log.logger\"",
            "\"team\"",
            "\"order.id\"",
            "\"log\":{",
            "\"error.type\"",
            "\"error.message\"",
            "\"error.stack_trace\"",
        ];
        let positions: Vec<usize> = order
            .iter()
            .map(|key| line.find(key).unwrap_or_else(|| panic!("{key} missing in {line}")))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{line}");

        let json: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(json["event.dataset"], "billing");
        assert_eq!(json["data_stream.namespace"], "default");
        assert_eq!(json["order.id"], 17);
        assert_eq!(json["error.stack_trace"], "Declined\n\tat charge");
        assert_eq!(keys(&line).len(), order.len());
    }

    #[test]
    fn origin_needs_to_be_enabled() {
        let encoder = EcsEncoder::new(EcsConfig::default());
        let record = EcsRecord {
            origin: Some(Origin { file: "main.rs", function: "main", line: None }),
            ..EcsRecord::new(MILLIS, "INFO")
        };
        assert!(!encoder.to_line(&record).contains("\"log\":"));
    }

    #[test]
    fn stack_trace_mode_follows_config() {
        let encoder = EcsEncoder::new(EcsConfig { stack_trace_as_array: true, ..Default::default() });
        let record = EcsRecord {
            exception: Some(Exception::new("E", None, StackTrace::Text("E\n\tat a\n\tat b"))),
            ..EcsRecord::new(MILLIS, "ERROR")
        };
        let json: Value = serde_json::from_str(&encoder.to_line(&record)).unwrap();
        assert_eq!(json["error.stack_trace"], serde_json::json!(["E", "\tat a", "\tat b"]));
    }

    #[test]
    fn absent_message_omits_the_key() {
        let encoder = EcsEncoder::new(EcsConfig::default());
        let line = encoder.to_line(&EcsRecord::new(MILLIS, "INFO"));
        assert!(!line.contains("\"message\""));
    }

    #[test]
    fn encode_with_custom_exception_writer() {
        let encoder = EcsEncoder::new(EcsConfig::default());
        let mut buf = String::new();
        encoder.encode_with(&mut buf, &EcsRecord::new(MILLIS, "ERROR"), |obj, as_array| {
            assert!(!as_array);
            obj.exception(&Exception::new("Custom", None, StackTrace::Text("trace")), as_array);
        });
        let json: Value = serde_json::from_str(&buf).unwrap();
        assert_eq!(json["error.type"], "Custom");
        assert!(buf.ends_with("\"error.stack_trace\":\"trace\"}\n"));
    }

    #[test]
    fn every_line_is_one_object() {
        let encoder = EcsEncoder::new(full_config());
        let mut buf = String::new();
        for level in ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"] {
            buf.clear();
            encoder.encode(&mut buf, &EcsRecord { message: Some("a\nb\"c"), ..EcsRecord::new(-5, level) });
            assert_eq!(buf.matches('\n').count(), 1);
            let json: Value = serde_json::from_str(&buf).unwrap();
            assert_eq!(json["@timestamp"], "1969-12-31T23:59:59.995Z");
            assert_eq!(json["log.level"].as_str().unwrap().trim_start(), level);
            assert_eq!(json["message"], "a\nb\"c");
        }
    }
}

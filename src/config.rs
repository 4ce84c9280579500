use serde::Deserialize;
use tracing::debug;

use crate::env::*;
use crate::sanitize::{compute_event_dataset, sanitize_dataset, sanitize_namespace};

/// Error returned when configuration values cannot be parsed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid boolean {value:?} for {key}, expected true/false/1/0/yes/no")]
    InvalidBool { key: &'static str, value: String },

    #[error("invalid additional field {0:?}, expected key=value")]
    InvalidAdditionalField(String),
}

/// A static key/value pair added to every event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AdditionalField {
    pub key: String,
    pub value: String,
}

impl AdditionalField {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        AdditionalField { key: key.into(), value: value.into() }
    }

    /// Parses `key=value,key2=value2`. Whitespace around keys and values is
    /// trimmed and empty entries are skipped. Values may contain `=`.
    pub fn parse_list(list: &str) -> Result<Vec<AdditionalField>, ConfigError> {
        list.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| match entry.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => {
                    Ok(AdditionalField::new(key.trim(), value.trim()))
                }
                _ => Err(ConfigError::InvalidAdditionalField(entry.to_string())),
            })
            .collect()
    }
}

/// Static settings of the ECS encoder.
///
/// **Fields**
/// - `service_name`, `service_version`, `service_environment`,
///   `service_node_name`: written as the matching `service.*` fields.
/// - `event_dataset`: `event.dataset`; falls back to `service_name`.
/// - `data_stream_namespace`: `data_stream.namespace`.
/// - `include_origin`: add `log.origin` (file, line, function).
/// - `stack_trace_as_array`: write `error.stack_trace` as one array element
///   per line instead of a single string.
/// - `additional_fields`: static fields added to every event, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EcsConfig {
    pub service_name: Option<String>,
    pub service_version: Option<String>,
    pub service_environment: Option<String>,
    pub service_node_name: Option<String>,
    pub event_dataset: Option<String>,
    pub data_stream_namespace: Option<String>,
    pub include_origin: bool,
    pub stack_trace_as_array: bool,
    pub additional_fields: Vec<AdditionalField>,
}

impl EcsConfig {
    /// Build a config from the `ECS_LOGGING_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_value)
    }

    /// Build a config reading each variable through `lookup`.
    ///
    /// `lookup` returns `None` for unset variables. Values are expected to be
    /// trimmed already.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let additional_fields = match lookup(ECS_ADDITIONAL_FIELDS_ENV) {
            Some(list) => AdditionalField::parse_list(&list)?,
            None => Vec::new(),
        };

        Ok(EcsConfig {
            service_name: lookup(ECS_SERVICE_NAME_ENV),
            service_version: lookup(ECS_SERVICE_VERSION_ENV),
            service_environment: lookup(ECS_SERVICE_ENVIRONMENT_ENV),
            service_node_name: lookup(ECS_SERVICE_NODE_NAME_ENV),
            event_dataset: lookup(ECS_EVENT_DATASET_ENV),
            data_stream_namespace: lookup(ECS_DATA_STREAM_NAMESPACE_ENV),
            include_origin: parse_bool(ECS_INCLUDE_ORIGIN_ENV, lookup(ECS_INCLUDE_ORIGIN_ENV))?,
            stack_trace_as_array: parse_bool(
                ECS_STACK_TRACE_AS_ARRAY_ENV,
                lookup(ECS_STACK_TRACE_AS_ARRAY_ENV),
            )?,
            additional_fields,
        })
    }

    /// Fill in the dataset from the service name and sanitize dataset and
    /// namespace so both can be used in an index name.
    pub fn finalize(mut self) -> Self {
        let dataset = compute_event_dataset(self.event_dataset.as_deref(), self.service_name.as_deref());
        self.event_dataset = dataset.map(|dataset| {
            let sanitized = sanitize_dataset(&dataset);
            if sanitized != dataset {
                debug!(configured = %dataset, sanitized = %sanitized, "event dataset sanitized");
            }
            sanitized
        });
        self.data_stream_namespace = self.data_stream_namespace.take().map(|namespace| {
            let sanitized = sanitize_namespace(&namespace);
            if sanitized != namespace {
                debug!(configured = %namespace, sanitized = %sanitized, "data stream namespace sanitized");
            }
            sanitized
        });
        self
    }
}

fn parse_bool(key: &'static str, value: Option<String>) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(false);
    };
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidBool { key, value }),
    }
}

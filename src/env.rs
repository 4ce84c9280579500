//! Environment variable names read by [`EcsConfig::from_env`].
//!
//! [`EcsConfig::from_env`]: crate::config::EcsConfig::from_env

/// `service.name` of every event.
pub const ECS_SERVICE_NAME_ENV: &str = "ECS_LOGGING_SERVICE_NAME";

/// `service.version` of every event.
pub const ECS_SERVICE_VERSION_ENV: &str = "ECS_LOGGING_SERVICE_VERSION";

/// `service.environment` of every event.
pub const ECS_SERVICE_ENVIRONMENT_ENV: &str = "ECS_LOGGING_SERVICE_ENVIRONMENT";

/// `service.node.name` of every event.
pub const ECS_SERVICE_NODE_NAME_ENV: &str = "ECS_LOGGING_SERVICE_NODE_NAME";

/// Dataset; defaults to the service name when unset.
pub const ECS_EVENT_DATASET_ENV: &str = "ECS_LOGGING_EVENT_DATASET";

/// Data stream namespace.
pub const ECS_DATA_STREAM_NAMESPACE_ENV: &str = "ECS_LOGGING_DATA_STREAM_NAMESPACE";

/// `true` to add `log.origin` to every event.
pub const ECS_INCLUDE_ORIGIN_ENV: &str = "ECS_LOGGING_INCLUDE_ORIGIN";

/// `true` to write stack traces as arrays of lines.
pub const ECS_STACK_TRACE_AS_ARRAY_ENV: &str = "ECS_LOGGING_STACK_TRACE_AS_ARRAY";

/// Static fields, as `key=value,key2=value2`.
pub const ECS_ADDITIONAL_FIELDS_ENV: &str = "ECS_LOGGING_ADDITIONAL_FIELDS";

/// Read an environment variable, trimmed. Unset and blank are both `None`.
pub fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

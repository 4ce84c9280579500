pub mod escape;
pub mod timestamp;
pub mod buffer;
pub mod serializer;
pub mod throwable;
pub mod sanitize;

pub mod record;
pub mod encoder;
pub mod env;
pub mod config;
pub mod layer;
pub mod init;

pub use config::{AdditionalField, ConfigError, EcsConfig};
pub use encoder::EcsEncoder;
pub use layer::EcsLayer;
pub use record::EcsRecord;
pub use serializer::{EcsObject, FieldValue, Origin, ThreadRef};
pub use throwable::{Exception, StackTrace};

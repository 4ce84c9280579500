use crate::serializer::{FieldValue, Origin, ThreadRef};
use crate::throwable::Exception;

/// One event's values, already extracted from the host logging framework.
///
/// Everything is borrowed: an adapter fills this in from its own event type
/// and hands it to [`EcsEncoder`](crate::encoder::EcsEncoder) for the
/// duration of one call.
#[derive(Clone, Copy)]
pub struct EcsRecord<'a> {
    pub timestamp_millis: i64,
    pub level: &'a str,
    pub message: Option<&'a str>,
    pub logger: Option<&'a str>,
    pub thread: Option<ThreadRef<'a>>,
    pub tags: &'a [String],
    /// Context fields in the order they should be written.
    pub fields: &'a [(String, FieldValue)],
    pub origin: Option<Origin<'a>>,
    pub exception: Option<Exception<'a>>,
}

impl<'a> EcsRecord<'a> {
    /// A record with only the two mandatory values set.
    pub fn new(timestamp_millis: i64, level: &'a str) -> Self {
        EcsRecord {
            timestamp_millis,
            level,
            message: None,
            logger: None,
            thread: None,
            tags: &[],
            fields: &[],
            origin: None,
            exception: None,
        }
    }
}

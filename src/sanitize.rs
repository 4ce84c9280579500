//! Normalizes data stream dataset and namespace names so they can become
//! part of an index name.

/// Characters a dataset must not contain.
const DISALLOWED_IN_DATASET: &[char] = &['\\', '/', '*', '?', '"', '<', '>', '|', ' ', ',', '#', ':', '-'];

/// Characters a namespace must not contain. Unlike datasets, `-` is allowed.
const DISALLOWED_IN_NAMESPACE: &[char] = &['\\', '/', '*', '?', '"', '<', '>', '|', ' ', ',', '#', ':'];

/// Maximum length of a sanitized name, in characters.
pub const MAX_LENGTH: usize = 100;

const REPLACEMENT_CHAR: char = '_';

/// Lower-cases `dataset`, truncates it to [`MAX_LENGTH`] characters and
/// replaces every disallowed character with `_`.
///
/// Empty input is returned unchanged.
pub fn sanitize_dataset(dataset: &str) -> String {
    sanitize(dataset, DISALLOWED_IN_DATASET)
}

/// Like [`sanitize_dataset`], but keeps `-`.
pub fn sanitize_namespace(namespace: &str) -> String {
    sanitize(namespace, DISALLOWED_IN_NAMESPACE)
}

/// Dataset to use when none is configured: the service name, if any.
pub fn compute_event_dataset(dataset: Option<&str>, service_name: Option<&str>) -> Option<String> {
    match (dataset, service_name) {
        (Some(dataset), _) => Some(dataset.to_string()),
        (None, Some(service)) if !service.is_empty() => Some(service.to_string()),
        _ => None,
    }
}

fn sanitize(name: &str, disallowed: &[char]) -> String {
    name.to_lowercase()
        .chars()
        .take(MAX_LENGTH)
        .map(|c| if disallowed.contains(&c) { REPLACEMENT_CHAR } else { c })
        .collect()
}

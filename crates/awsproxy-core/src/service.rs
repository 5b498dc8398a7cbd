//! AWS service name canonicalization.

/// Fixed aliases from protocol-specific service identifiers to the
/// canonical service name used in proxy configurations.
const SERVICE_NAME_ALIASES: &[(&str, &str)] = &[("monitoring", "cloudwatch"), ("sqs-query", "sqs")];

/// Map a service identifier to its canonical name.
///
/// Names without an alias are returned unchanged.
///
/// # Examples
///
/// ```
/// use awsproxy_core::canonical_service_name;
///
/// assert_eq!(canonical_service_name("sqs-query"), "sqs");
/// assert_eq!(canonical_service_name("dynamodb"), "dynamodb");
/// ```
#[must_use]
pub fn canonical_service_name(name: &str) -> &str {
    SERVICE_NAME_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map_or(name, |(_, canonical)| canonical)
}

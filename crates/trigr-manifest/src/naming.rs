//! Endpoint key derivation
//!
//! Manifest keys are the contract between the compiler and the runtime
//! dispatcher: both sides derive them with the functions in this module.
//!
//! - Explicitly named families (HTTPS, callable, task queue) use the name verbatim
//! - Address families use `<method>_<sanitized address>`
//! - The scheduler uses `onSchedule_<sanitized cron>`
//! - Families without an address use the method name alone

/// How a family turns its addressing argument into a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyScheme {
    Explicit,
    Address,
    Schedule,
    Method,
}

/// Derive the manifest key for a registration
///
/// `address` is the family's addressing argument (name, topic, document,
/// reference, bucket, cron, event type) when it has one.
pub fn endpoint_key(scheme: KeyScheme, method: &str, address: Option<&str>) -> String {
    match (scheme, address) {
        (KeyScheme::Explicit, Some(name)) => name.to_string(),
        (KeyScheme::Address, Some(address)) => join(method, &sanitize_address(address)),
        (KeyScheme::Schedule, Some(cron)) => join(method, &sanitize_schedule(cron)),
        _ => method.to_string(),
    }
}

fn join(method: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        method.to_string()
    } else {
        format!("{}_{}", method, suffix)
    }
}

/// Sanitize an event address (topic, document path, reference, bucket)
///
/// Leading and trailing `/` are trimmed; `/`, `-`, `.` and space become `_`;
/// capture braces are dropped while the capture name is kept; anything else
/// that is not ASCII alphanumeric or `_` is dropped.
///
/// - `users/{userId}` -> `users_userId`
/// - `my-topic` -> `my_topic`
pub fn sanitize_address(address: &str) -> String {
    address
        .trim_matches('/')
        .chars()
        .filter_map(|ch| match ch {
            '/' | '-' | '.' | ' ' => Some('_'),
            c if c.is_ascii_alphanumeric() || c == '_' => Some(c),
            _ => None,
        })
        .collect()
}

/// Sanitize a cron expression
///
/// Space and `-` become `_`; `*`, `/`, `,` and every other character that is
/// not ASCII alphanumeric or `_` is dropped.
///
/// - `0 0 * * *` -> `0_0___`
/// - `every 5 minutes` -> `every_5_minutes`
pub fn sanitize_schedule(cron: &str) -> String {
    cron.chars()
        .filter_map(|ch| match ch {
            ' ' | '-' => Some('_'),
            c if c.is_ascii_alphanumeric() || c == '_' => Some(c),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::naming::*;

    #[test]
    fn test_sanitize_address() {
        assert_eq!(sanitize_address("my-topic"), "my_topic");
        assert_eq!(sanitize_address("users/{userId}"), "users_userId");
        assert_eq!(sanitize_address("/users/{userId}/"), "users_userId");
        assert_eq!(sanitize_address("my-bucket.appspot.com"), "my_bucket_appspot_com");
        assert_eq!(sanitize_address("rooms/{roomId}/messages/*"), "rooms_roomId_messages_");
        assert_eq!(sanitize_address("a b"), "a_b");
    }

    #[test]
    fn test_sanitize_schedule() {
        assert_eq!(sanitize_schedule("0 0 * * *"), "0_0___");
        assert_eq!(sanitize_schedule("*/5 * * * *"), "5____");
        assert_eq!(sanitize_schedule("0 9 * * 1-5"), "0_9___1_5");
        assert_eq!(sanitize_schedule("every 5 minutes"), "every_5_minutes");
        assert_eq!(sanitize_schedule("0 0,12 * * *"), "0_012___");
    }

    #[test]
    fn test_endpoint_key() {
        assert_eq!(
            endpoint_key(KeyScheme::Explicit, "onRequest", Some("helloWorld")),
            "helloWorld"
        );
        assert_eq!(
            endpoint_key(KeyScheme::Address, "onMessagePublished", Some("my-topic")),
            "onMessagePublished_my_topic"
        );
        assert_eq!(
            endpoint_key(KeyScheme::Address, "onValueCreated", Some("/users/{userId}")),
            "onValueCreated_users_userId"
        );
        assert_eq!(
            endpoint_key(KeyScheme::Schedule, "onSchedule", Some("0 0 * * *")),
            "onSchedule_0_0___"
        );
        assert_eq!(
            endpoint_key(KeyScheme::Method, "beforeUserCreated", None),
            "beforeUserCreated"
        );
    }

    #[test]
    fn test_empty_sanitized_address_falls_back_to_method() {
        assert_eq!(
            endpoint_key(KeyScheme::Address, "onValueWritten", Some("/")),
            "onValueWritten"
        );
    }
}

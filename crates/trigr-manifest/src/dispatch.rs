//! Runtime routing over a compiled manifest
//!
//! The dispatcher is the consumer side of the key contract: an inbound event
//! or HTTP request is mapped back to the manifest key of the endpoint that
//! should handle it.
//!
//! Keys of event, blocking and schedule endpoints are re-derived from the
//! trigger alone with [`derive_key`]: the event type gives the registration
//! method, and the filter or pattern holding the address gives the suffix.
//! A manifest whose keys disagree with that derivation is rejected.

use ahash::AHashSet;
use std::collections::BTreeMap;
use tracing::trace;

use crate::errors::ManifestError;
use crate::naming::{endpoint_key, KeyScheme};
use crate::pattern::PathPattern;
use crate::types::{EventTrigger, Manifest, Trigger};

const PUBSUB_PUBLISHED: &str = "google.cloud.pubsub.topic.v1.messagePublished";
const REMOTE_CONFIG_UPDATED: &str = "google.firebase.remoteconfig.remoteConfig.v1.updated";
const TEST_MATRIX_COMPLETED: &str = "google.firebase.testlab.testMatrix.v1.completed";
const BEFORE_CREATE: &str = "providers/cloud.auth/eventTypes/user.beforeCreate";
const BEFORE_SIGN_IN: &str = "providers/cloud.auth/eventTypes/user.beforeSignIn";

/// Event type prefix, method prefix and address attribute of the
/// families whose method follows the event type's last segment
const SUFFIXED_FAMILIES: &[(&str, &str, &str)] = &[
    ("google.cloud.firestore.document.v1.", "onDocument", "document"),
    ("google.firebase.database.ref.v1.", "onValue", "ref"),
    ("google.cloud.storage.object.v1.", "onObject", "bucket"),
];

/// Derive the manifest key of an endpoint from its trigger
///
/// Returns `None` for explicitly named triggers (HTTPS, callable, task
/// queue), whose key is the name they were registered under.
pub fn derive_key(trigger: &Trigger) -> Option<String> {
    match trigger {
        Trigger::Https(_) | Trigger::Callable(_) | Trigger::TaskQueue(_) => None,
        Trigger::Schedule(schedule) => Some(endpoint_key(
            KeyScheme::Schedule,
            "onSchedule",
            Some(&schedule.schedule),
        )),
        Trigger::Blocking(blocking) => {
            let method = match blocking.event_type.as_str() {
                BEFORE_CREATE => "beforeUserCreated",
                BEFORE_SIGN_IN => "beforeUserSignedIn",
                _ => return None,
            };
            Some(endpoint_key(KeyScheme::Method, method, None))
        }
        Trigger::Event(event) => Some(event_key(event)),
    }
}

fn event_key(event: &EventTrigger) -> String {
    let event_type = event.event_type.as_str();
    match event_type {
        PUBSUB_PUBLISHED => address_key("onMessagePublished", event, "topic"),
        REMOTE_CONFIG_UPDATED => endpoint_key(KeyScheme::Method, "onConfigUpdated", None),
        TEST_MATRIX_COMPLETED => endpoint_key(KeyScheme::Method, "onTestMatrixCompleted", None),
        _ => {
            for (prefix, method_prefix, attribute) in SUFFIXED_FAMILIES {
                if let Some(action) = event_type.strip_prefix(prefix) {
                    let method = format!("{}{}", method_prefix, capitalize(action));
                    return address_key(&method, event, attribute);
                }
            }
            // Custom Eventarc events are addressed by their event type
            endpoint_key(KeyScheme::Address, "onCustomEventPublished", Some(event_type))
        }
    }
}

fn address_key(method: &str, event: &EventTrigger, attribute: &str) -> String {
    let address = event
        .event_filter_path_patterns
        .get(attribute)
        .or_else(|| event.event_filters.get(attribute));
    endpoint_key(KeyScheme::Address, method, address.map(String::as_str))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_ascii_uppercase().to_string() + chars.as_str()
    })
}

/// A delivered event: its type plus the resource attributes it carries
/// (`topic`, `bucket`, `document`, `ref`, `instance`, ...)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundEvent {
    pub event_type: String,
    pub attributes: BTreeMap<String, String>,
}

impl InboundEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        InboundEvent {
            event_type: event_type.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<'a> {
    pub key: &'a str,
    /// Values bound by `{name}` captures in path patterns
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
struct EventRoute {
    key: String,
    event_type: String,
    filters: BTreeMap<String, String>,
    patterns: Vec<(String, PathPattern)>,
}

impl EventRoute {
    fn matches(&self, event: &InboundEvent) -> Option<BTreeMap<String, String>> {
        if self.event_type != event.event_type {
            return None;
        }
        for (attribute, expected) in &self.filters {
            if event.attributes.get(attribute) != Some(expected) {
                return None;
            }
        }
        let mut params = BTreeMap::new();
        for (attribute, pattern) in &self.patterns {
            let value = event.attributes.get(attribute)?;
            params.extend(pattern.matches(value)?);
        }
        Some(params)
    }
}

/// Index of a manifest's endpoints by how they are invoked
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    events: Vec<EventRoute>,
    http: AHashSet<String>,
}

impl RouteTable {
    /// Index every endpoint, checking each derivable key against the manifest
    pub fn from_manifest(manifest: &Manifest) -> Result<Self, ManifestError> {
        let mut table = RouteTable::default();

        for (key, endpoint) in &manifest.endpoints {
            let key = match derive_key(&endpoint.trigger) {
                Some(derived) if derived != *key => {
                    return Err(ManifestError::KeyMismatch {
                        key: key.clone(),
                        derived,
                    });
                }
                Some(derived) => derived,
                None => key.clone(),
            };
            match &endpoint.trigger {
                Trigger::Https(_) | Trigger::Callable(_) => {
                    table.http.insert(key);
                }
                Trigger::Event(event) => {
                    let patterns = event
                        .event_filter_path_patterns
                        .iter()
                        .map(|(attr, raw)| Ok((attr.clone(), PathPattern::parse(raw)?)))
                        .collect::<Result<Vec<_>, ManifestError>>()?;
                    table.events.push(EventRoute {
                        key,
                        event_type: event.event_type.clone(),
                        filters: event.event_filters.clone(),
                        patterns,
                    });
                }
                Trigger::Blocking(blocking) => table.events.push(EventRoute {
                    key,
                    event_type: blocking.event_type.clone(),
                    filters: BTreeMap::new(),
                    patterns: Vec::new(),
                }),
                // Invoked by the scheduler and task queue services directly
                Trigger::Schedule(_) | Trigger::TaskQueue(_) => {}
            }
        }

        Ok(table)
    }

    /// First endpoint, in manifest order, whose trigger accepts the event
    pub fn route(&self, event: &InboundEvent) -> Option<RouteMatch<'_>> {
        self.events.iter().find_map(|route| {
            let params = route.matches(event)?;
            trace!("Routed {} to {}", event.event_type, route.key);
            Some(RouteMatch {
                key: &route.key,
                params,
            })
        })
    }

    /// Map `/<key>/...` to an HTTPS or callable endpoint key
    pub fn route_http(&self, path: &str) -> Option<&str> {
        let first = path.trim_start_matches('/').split('/').next()?;
        self.http.get(first).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.events.len() + self.http.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//! Trigger family table
//!
//! One entry per supported registration namespace. The table decides which
//! calls the scanner picks up, which keywords the resolver accepts and how
//! the name generator builds the manifest key.

use trigr_manifest::KeyScheme;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Https,
    Callable,
    TaskQueue,
    PubSub,
    Firestore,
    Database,
    Storage,
    Scheduler,
    Eventarc,
    Identity,
    RemoteConfig,
    TestLab,
}

/// Options every family accepts
pub const BASE_OPTIONS: &[&str] = &[
    "region",
    "memory",
    "cpu",
    "timeoutSeconds",
    "minInstances",
    "maxInstances",
    "concurrency",
    "serviceAccount",
    "ingressSettings",
    "vpcConnector",
    "vpcConnectorEgressSettings",
    "labels",
    "secrets",
    "omit",
];

impl Family {
    pub const ALL: [Family; 12] = [
        Family::Https,
        Family::Callable,
        Family::TaskQueue,
        Family::PubSub,
        Family::Firestore,
        Family::Database,
        Family::Storage,
        Family::Scheduler,
        Family::Eventarc,
        Family::Identity,
        Family::RemoteConfig,
        Family::TestLab,
    ];

    /// Canonical namespace followed by its aliases
    pub fn namespaces(self) -> &'static [&'static str] {
        match self {
            Family::Https | Family::Callable => &["https", "https_fn"],
            Family::TaskQueue => &["tasks", "tasks_fn"],
            Family::PubSub => &["pubsub", "pubsub_fn"],
            Family::Firestore => &["firestore", "firestore_fn"],
            Family::Database => &["database", "db_fn"],
            Family::Storage => &["storage", "storage_fn"],
            Family::Scheduler => &["scheduler", "scheduler_fn"],
            Family::Eventarc => &["eventarc", "eventarc_fn"],
            Family::Identity => &["identity", "identity_fn"],
            Family::RemoteConfig => &["remoteConfig", "remote_config_fn"],
            Family::TestLab => &["testLab", "test_lab_fn"],
        }
    }

    pub fn methods(self) -> &'static [&'static str] {
        match self {
            Family::Https => &["onRequest"],
            Family::Callable => &["onCall"],
            Family::TaskQueue => &["onTaskDispatched"],
            Family::PubSub => &["onMessagePublished"],
            Family::Firestore => &[
                "onDocumentCreated",
                "onDocumentUpdated",
                "onDocumentDeleted",
                "onDocumentWritten",
            ],
            Family::Database => &[
                "onValueCreated",
                "onValueUpdated",
                "onValueDeleted",
                "onValueWritten",
            ],
            Family::Storage => &[
                "onObjectFinalized",
                "onObjectArchived",
                "onObjectDeleted",
                "onObjectMetadataUpdated",
            ],
            Family::Scheduler => &["onSchedule"],
            Family::Eventarc => &["onCustomEventPublished"],
            Family::Identity => &["beforeUserCreated", "beforeUserSignedIn"],
            Family::RemoteConfig => &["onConfigUpdated"],
            Family::TestLab => &["onTestMatrixCompleted"],
        }
    }

    /// Keyword naming the addressing argument; it may also be passed as the
    /// first positional argument
    pub fn address_keyword(self) -> Option<&'static str> {
        match self {
            Family::Https | Family::Callable | Family::TaskQueue => Some("name"),
            Family::PubSub => Some("topic"),
            Family::Firestore => Some("document"),
            Family::Database => Some("reference"),
            Family::Storage => Some("bucket"),
            Family::Scheduler => Some("schedule"),
            Family::Eventarc => Some("eventType"),
            Family::Identity | Family::RemoteConfig | Family::TestLab => None,
        }
    }

    pub fn key_scheme(self) -> KeyScheme {
        match self {
            Family::Https | Family::Callable | Family::TaskQueue => KeyScheme::Explicit,
            Family::PubSub
            | Family::Firestore
            | Family::Database
            | Family::Storage
            | Family::Eventarc => KeyScheme::Address,
            Family::Scheduler => KeyScheme::Schedule,
            Family::Identity | Family::RemoteConfig | Family::TestLab => KeyScheme::Method,
        }
    }

    /// Options accepted on top of [`BASE_OPTIONS`]
    pub fn trigger_options(self) -> &'static [&'static str] {
        match self {
            Family::Https => &["invoker"],
            Family::Callable => &[],
            Family::TaskQueue => &[
                "invoker",
                "maxAttempts",
                "maxRetrySeconds",
                "minBackoffSeconds",
                "maxBackoffSeconds",
                "maxDoublings",
                "maxConcurrentDispatches",
                "maxDispatchesPerSecond",
            ],
            Family::PubSub | Family::Storage | Family::RemoteConfig | Family::TestLab => {
                &["retry"]
            }
            Family::Firestore => &["retry", "database", "namespace"],
            Family::Database => &["retry", "instance"],
            Family::Eventarc => &["retry", "channel", "filters"],
            Family::Scheduler => &[
                "timeZone",
                "retryCount",
                "maxRetrySeconds",
                "minBackoffSeconds",
                "maxBackoffSeconds",
                "maxDoublings",
            ],
            Family::Identity => &["idToken", "accessToken", "refreshToken"],
        }
    }

    pub fn accepts_option(self, keyword: &str) -> bool {
        BASE_OPTIONS.contains(&keyword) || self.trigger_options().contains(&keyword)
    }

    /// API the deployment needs enabled beyond the core functions API
    pub fn required_api(self) -> Option<(&'static str, &'static str)> {
        match self {
            Family::Scheduler => Some((
                "cloudscheduler.googleapis.com",
                "Needed for scheduled functions.",
            )),
            Family::TaskQueue => Some((
                "cloudtasks.googleapis.com",
                "Needed for task queue functions.",
            )),
            Family::Identity => Some((
                "identitytoolkit.googleapis.com",
                "Needed for auth blocking functions.",
            )),
            _ => None,
        }
    }

    /// Event type for event and blocking families; Eventarc takes it from source
    pub fn event_type(self, method: &str) -> Option<String> {
        let suffix = |prefix: &str| {
            method.strip_prefix(prefix).map(|rest| {
                let mut chars = rest.chars();
                chars.next().map_or_else(String::new, |first| {
                    first.to_ascii_lowercase().to_string() + chars.as_str()
                })
            })
        };
        match self {
            Family::PubSub => Some("google.cloud.pubsub.topic.v1.messagePublished".to_string()),
            Family::Firestore => {
                suffix("onDocument").map(|s| format!("google.cloud.firestore.document.v1.{}", s))
            }
            Family::Database => {
                suffix("onValue").map(|s| format!("google.firebase.database.ref.v1.{}", s))
            }
            Family::Storage => {
                suffix("onObject").map(|s| format!("google.cloud.storage.object.v1.{}", s))
            }
            Family::RemoteConfig => {
                Some("google.firebase.remoteconfig.remoteConfig.v1.updated".to_string())
            }
            Family::TestLab => Some("google.firebase.testlab.testMatrix.v1.completed".to_string()),
            Family::Identity => match method {
                "beforeUserCreated" => {
                    Some("providers/cloud.auth/eventTypes/user.beforeCreate".to_string())
                }
                "beforeUserSignedIn" => {
                    Some("providers/cloud.auth/eventTypes/user.beforeSignIn".to_string())
                }
                _ => None,
            },
            _ => None,
        }
    }

    /// Whether the family emits an `eventTrigger`
    pub fn is_event(self) -> bool {
        matches!(
            self,
            Family::PubSub
                | Family::Firestore
                | Family::Database
                | Family::Storage
                | Family::Eventarc
                | Family::RemoteConfig
                | Family::TestLab
        )
    }
}

/// Find the family registered under `namespace.method`
pub fn lookup(namespace: &str, method: &str) -> Option<Family> {
    Family::ALL
        .into_iter()
        .find(|family| family.namespaces().contains(&namespace) && family.methods().contains(&method))
}

#[cfg(test)]
mod tests {
    use crate::families::*;

    #[test]
    fn test_lookup_with_aliases() {
        assert_eq!(lookup("https", "onRequest"), Some(Family::Https));
        assert_eq!(lookup("https_fn", "onCall"), Some(Family::Callable));
        assert_eq!(lookup("db_fn", "onValueCreated"), Some(Family::Database));
        assert_eq!(lookup("remote_config_fn", "onConfigUpdated"), Some(Family::RemoteConfig));
        assert_eq!(lookup("https", "onMessagePublished"), None);
        assert_eq!(lookup("requests", "get"), None);
    }

    #[test]
    fn test_event_types() {
        assert_eq!(
            Family::Firestore.event_type("onDocumentWritten").as_deref(),
            Some("google.cloud.firestore.document.v1.written")
        );
        assert_eq!(
            Family::Storage.event_type("onObjectMetadataUpdated").as_deref(),
            Some("google.cloud.storage.object.v1.metadataUpdated")
        );
        assert_eq!(
            Family::Database.event_type("onValueCreated").as_deref(),
            Some("google.firebase.database.ref.v1.created")
        );
        assert_eq!(
            Family::Identity.event_type("beforeUserSignedIn").as_deref(),
            Some("providers/cloud.auth/eventTypes/user.beforeSignIn")
        );
        assert_eq!(Family::Https.event_type("onRequest"), None);
    }

    #[test]
    fn test_every_method_maps_back_to_its_family() {
        for family in Family::ALL {
            for namespace in family.namespaces() {
                for method in family.methods() {
                    assert_eq!(lookup(namespace, method), Some(family));
                }
            }
        }
    }

    #[test]
    fn test_accepts_option() {
        assert!(Family::PubSub.accepts_option("retry"));
        assert!(Family::PubSub.accepts_option("memory"));
        assert!(!Family::Https.accepts_option("retry"));
        assert!(Family::Identity.accepts_option("idToken"));
    }
}

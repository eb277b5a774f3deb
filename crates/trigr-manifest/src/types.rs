//! Manifest data model
//!
//! This module provides:
//! - Source locations attached to every discovered record
//! - Option values (literal, parameter reference, ternary, reset)
//! - Deploy-time parameter declarations
//! - Endpoints with their closed set of trigger variants
//!
//! Field presence encodes "value vs. platform default": every optional wire
//! field is skipped when absent or reset, never written as `null`.

use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

pub const SPEC_VERSION: &str = "v1alpha1";
pub const PLATFORM: &str = "gcfv2";
pub const DEFAULT_REGION: &str = "us-central1";
pub const CORE_API: &str = "cloudfunctions.googleapis.com";
pub const CORE_API_REASON: &str = "Needed to deploy functions";

// =============================================================================
// SOURCE LOCATION
// =============================================================================

/// Position of a construct in the scanned source tree
///
/// `file` is relative to the source root and always uses `/` separators so
/// manifests and error messages are identical across platforms.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceLocation {
    pub file: String,
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: usize, column: usize) -> Self {
        SourceLocation {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

// =============================================================================
// OPTION VALUES
// =============================================================================

/// A constant value taken verbatim from source
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Literal>),
    Map(BTreeMap<String, Literal>),
}

impl Literal {
    pub fn type_name(&self) -> &'static str {
        match self {
            Literal::Bool(_) => "boolean",
            Literal::Int(_) => "int",
            Literal::Float(_) => "float",
            Literal::Str(_) => "string",
            Literal::List(_) => "list",
            Literal::Map(_) => "map",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, Literal::List(_) | Literal::Map(_))
    }

    /// JSON rendering, used for ternary branches inside substitution syntax
    pub fn to_wire_string(&self) -> String {
        match self {
            Literal::Bool(b) => b.to_string(),
            Literal::Int(i) => i.to_string(),
            Literal::Float(f) => serde_json::to_string(f).unwrap_or_else(|_| f.to_string()),
            other => serde_json::to_string(other).unwrap_or_default(),
        }
    }
}

impl Serialize for Literal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Literal::Bool(b) => serializer.serialize_bool(*b),
            Literal::Int(i) => serializer.serialize_i64(*i),
            Literal::Float(f) => serializer.serialize_f64(*f),
            Literal::Str(s) => serializer.serialize_str(s),
            Literal::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Literal::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

/// Single-level conditional over a boolean parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Ternary {
    pub condition: String,
    pub then: Box<OptionValue>,
    pub otherwise: Box<OptionValue>,
}

/// Value of one configuration field after evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Literal(Literal),
    ParamRef(String),
    Ternary(Ternary),
    /// Explicit "use the platform default"; the field is left out of the manifest
    Reset,
}

impl OptionValue {
    pub fn str(value: impl Into<String>) -> Self {
        OptionValue::Literal(Literal::Str(value.into()))
    }

    pub fn int(value: i64) -> Self {
        OptionValue::Literal(Literal::Int(value))
    }

    pub fn bool(value: bool) -> Self {
        OptionValue::Literal(Literal::Bool(value))
    }

    pub fn is_reset(&self) -> bool {
        matches!(self, OptionValue::Reset)
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            OptionValue::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    /// Substitution text for parameter-dependent values
    ///
    /// `{{ params.NAME }}` for references and `{{ params.NAME ? A : B }}` for
    /// ternaries. Literals and resets have no expression form.
    pub fn expression(&self) -> Option<String> {
        match self {
            OptionValue::ParamRef(name) => Some(format!("{{{{ params.{} }}}}", name)),
            OptionValue::Ternary(t) => Some(format!(
                "{{{{ params.{} ? {} : {} }}}}",
                t.condition,
                branch_text(&t.then),
                branch_text(&t.otherwise)
            )),
            OptionValue::Literal(_) | OptionValue::Reset => None,
        }
    }
}

fn branch_text(value: &OptionValue) -> String {
    match value {
        OptionValue::Literal(lit) => lit.to_wire_string(),
        OptionValue::ParamRef(name) => format!("params.{}", name),
        // The evaluator never produces these as branches
        OptionValue::Ternary(_) | OptionValue::Reset => String::new(),
    }
}

impl Serialize for OptionValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            OptionValue::Literal(lit) => lit.serialize(serializer),
            OptionValue::ParamRef(_) | OptionValue::Ternary(_) => {
                serializer.serialize_str(&self.expression().unwrap_or_default())
            }
            OptionValue::Reset => serializer.serialize_none(),
        }
    }
}

/// `skip_serializing_if` predicate shared by every optional wire field
pub fn is_omitted(value: &Option<OptionValue>) -> bool {
    matches!(value, None | Some(OptionValue::Reset))
}

// =============================================================================
// PARAMS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Int,
    Boolean,
    Float,
    List,
    Secret,
}

impl ParamKind {
    /// Map a `params.defineX` method name to its kind
    pub fn from_define_method(method: &str) -> Option<Self> {
        match method {
            "defineString" => Some(ParamKind::String),
            "defineInt" => Some(ParamKind::Int),
            "defineBoolean" => Some(ParamKind::Boolean),
            "defineFloat" => Some(ParamKind::Float),
            "defineList" => Some(ParamKind::List),
            "defineSecret" => Some(ParamKind::Secret),
            _ => None,
        }
    }

    /// Whether a literal default is compatible with this kind
    pub fn accepts(&self, literal: &Literal) -> bool {
        match (self, literal) {
            (ParamKind::String, Literal::Str(_)) => true,
            (ParamKind::Int, Literal::Int(_)) => true,
            (ParamKind::Boolean, Literal::Bool(_)) => true,
            (ParamKind::Float, Literal::Float(_) | Literal::Int(_)) => true,
            (ParamKind::List, Literal::List(items)) => {
                items.iter().all(|item| matches!(item, Literal::Str(_)))
            }
            _ => false,
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamKind::String => "string",
            ParamKind::Int => "int",
            ParamKind::Boolean => "boolean",
            ParamKind::Float => "float",
            ParamKind::List => "list",
            ParamKind::Secret => "secret",
        };
        f.write_str(name)
    }
}

/// A deploy-time parameter declaration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Param {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParamKind,
    #[serde(skip_serializing_if = "is_omitted")]
    pub default: Option<OptionValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip)]
    pub location: SourceLocation,
}

impl Param {
    /// Parameter names are upper snake case: `^[A-Z][A-Z0-9_]*$`
    pub fn is_valid_name(name: &str) -> bool {
        let mut chars = name.chars();
        chars.next().is_some_and(|c| c.is_ascii_uppercase())
            && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequiredApi {
    pub api: String,
    pub reason: String,
}

// =============================================================================
// ENDPOINTS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VpcSettings {
    pub connector: OptionValue,
    #[serde(skip_serializing_if = "is_omitted")]
    pub egress_settings: Option<OptionValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecretEnvVar {
    pub key: String,
}

/// One deployable function
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    #[serde(skip)]
    pub key: String,
    #[serde(skip)]
    pub location: SourceLocation,
    pub entry_point: String,
    pub platform: String,
    #[serde(skip_serializing_if = "is_omitted")]
    pub region: Option<OptionValue>,
    #[serde(skip_serializing_if = "is_omitted")]
    pub available_memory_mb: Option<OptionValue>,
    #[serde(skip_serializing_if = "is_omitted")]
    pub cpu: Option<OptionValue>,
    #[serde(skip_serializing_if = "is_omitted")]
    pub timeout_seconds: Option<OptionValue>,
    #[serde(skip_serializing_if = "is_omitted")]
    pub min_instances: Option<OptionValue>,
    #[serde(skip_serializing_if = "is_omitted")]
    pub max_instances: Option<OptionValue>,
    #[serde(skip_serializing_if = "is_omitted")]
    pub concurrency: Option<OptionValue>,
    #[serde(skip_serializing_if = "is_omitted")]
    pub service_account_email: Option<OptionValue>,
    #[serde(skip_serializing_if = "is_omitted")]
    pub ingress_settings: Option<OptionValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpc: Option<VpcSettings>,
    #[serde(skip_serializing_if = "is_omitted")]
    pub labels: Option<OptionValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub secret_environment_variables: Vec<SecretEnvVar>,
    #[serde(skip_serializing_if = "is_omitted")]
    pub omit: Option<OptionValue>,
    #[serde(flatten)]
    pub trigger: Trigger,
}

impl Endpoint {
    /// Endpoint with every base option unset
    pub fn new(
        key: impl Into<String>,
        entry_point: impl Into<String>,
        location: SourceLocation,
        trigger: Trigger,
    ) -> Self {
        Endpoint {
            key: key.into(),
            location,
            entry_point: entry_point.into(),
            platform: PLATFORM.to_string(),
            region: None,
            available_memory_mb: None,
            cpu: None,
            timeout_seconds: None,
            min_instances: None,
            max_instances: None,
            concurrency: None,
            service_account_email: None,
            ingress_settings: None,
            vpc: None,
            labels: None,
            secret_environment_variables: Vec::new(),
            omit: None,
            trigger,
        }
    }
}

/// Closed set of trigger variants, one per manifest trigger key
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Trigger {
    #[serde(rename = "httpsTrigger")]
    Https(HttpsTrigger),
    #[serde(rename = "callableTrigger")]
    Callable(CallableTrigger),
    #[serde(rename = "eventTrigger")]
    Event(EventTrigger),
    #[serde(rename = "blockingTrigger")]
    Blocking(BlockingTrigger),
    #[serde(rename = "scheduleTrigger")]
    Schedule(ScheduleTrigger),
    #[serde(rename = "taskQueueTrigger")]
    TaskQueue(TaskQueueTrigger),
}

impl Trigger {
    pub fn wire_name(&self) -> &'static str {
        match self {
            Trigger::Https(_) => "httpsTrigger",
            Trigger::Callable(_) => "callableTrigger",
            Trigger::Event(_) => "eventTrigger",
            Trigger::Blocking(_) => "blockingTrigger",
            Trigger::Schedule(_) => "scheduleTrigger",
            Trigger::TaskQueue(_) => "taskQueueTrigger",
        }
    }

    pub fn event_type(&self) -> Option<&str> {
        match self {
            Trigger::Event(event) => Some(&event.event_type),
            Trigger::Blocking(blocking) => Some(&blocking.event_type),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HttpsTrigger {
    #[serde(skip_serializing_if = "is_omitted")]
    pub invoker: Option<OptionValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CallableTrigger {}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTrigger {
    pub event_type: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub event_filters: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub event_filter_path_patterns: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(skip_serializing_if = "is_omitted")]
    pub retry: Option<OptionValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockingTrigger {
    pub event_type: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, OptionValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleTrigger {
    pub schedule: String,
    #[serde(skip_serializing_if = "is_omitted")]
    pub time_zone: Option<OptionValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_config: Option<ScheduleRetryConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRetryConfig {
    #[serde(skip_serializing_if = "is_omitted")]
    pub retry_count: Option<OptionValue>,
    #[serde(skip_serializing_if = "is_omitted")]
    pub max_retry_seconds: Option<OptionValue>,
    #[serde(skip_serializing_if = "is_omitted")]
    pub min_backoff_seconds: Option<OptionValue>,
    #[serde(skip_serializing_if = "is_omitted")]
    pub max_backoff_seconds: Option<OptionValue>,
    #[serde(skip_serializing_if = "is_omitted")]
    pub max_doublings: Option<OptionValue>,
}

impl ScheduleRetryConfig {
    pub fn is_empty(&self) -> bool {
        is_omitted(&self.retry_count)
            && is_omitted(&self.max_retry_seconds)
            && is_omitted(&self.min_backoff_seconds)
            && is_omitted(&self.max_backoff_seconds)
            && is_omitted(&self.max_doublings)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskQueueTrigger {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_config: Option<TaskRetryConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limits: Option<RateLimits>,
    #[serde(skip_serializing_if = "is_omitted")]
    pub invoker: Option<OptionValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRetryConfig {
    #[serde(skip_serializing_if = "is_omitted")]
    pub max_attempts: Option<OptionValue>,
    #[serde(skip_serializing_if = "is_omitted")]
    pub max_retry_seconds: Option<OptionValue>,
    #[serde(skip_serializing_if = "is_omitted")]
    pub min_backoff_seconds: Option<OptionValue>,
    #[serde(skip_serializing_if = "is_omitted")]
    pub max_backoff_seconds: Option<OptionValue>,
    #[serde(skip_serializing_if = "is_omitted")]
    pub max_doublings: Option<OptionValue>,
}

impl TaskRetryConfig {
    pub fn is_empty(&self) -> bool {
        is_omitted(&self.max_attempts)
            && is_omitted(&self.max_retry_seconds)
            && is_omitted(&self.min_backoff_seconds)
            && is_omitted(&self.max_backoff_seconds)
            && is_omitted(&self.max_doublings)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimits {
    #[serde(skip_serializing_if = "is_omitted")]
    pub max_concurrent_dispatches: Option<OptionValue>,
    #[serde(skip_serializing_if = "is_omitted")]
    pub max_dispatches_per_second: Option<OptionValue>,
}

impl RateLimits {
    pub fn is_empty(&self) -> bool {
        is_omitted(&self.max_concurrent_dispatches) && is_omitted(&self.max_dispatches_per_second)
    }
}

// =============================================================================
// MANIFEST
// =============================================================================

/// Top-level deployment manifest
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub spec_version: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Param>,
    #[serde(rename = "requiredAPIs")]
    pub required_apis: Vec<RequiredApi>,
    pub endpoints: IndexMap<String, Endpoint>,
}

//! trigr manifest model
//!
//! This crate holds everything on the output side of the compiler: the
//! manifest types, endpoint key derivation, address patterns, manifest
//! assembly and serialization, and the runtime dispatcher that consumes the
//! same key contract.

pub mod dispatch;
pub mod errors;
pub mod manifest;
pub mod manifest_writer;
pub mod naming;
pub mod pattern;
pub mod types;

pub use dispatch::{derive_key, InboundEvent, RouteMatch, RouteTable};
pub use errors::ManifestError;
pub use manifest::ManifestBuilder;
pub use manifest_writer::{render, write_to_path, ManifestFormat};
pub use naming::{endpoint_key, sanitize_address, sanitize_schedule, KeyScheme};
pub use pattern::{PathPattern, Segment};
pub use types::{
    BlockingTrigger, CallableTrigger, Endpoint, EventTrigger, HttpsTrigger, Literal, Manifest,
    OptionValue, Param, ParamKind, RateLimits, RequiredApi, ScheduleRetryConfig, ScheduleTrigger,
    SecretEnvVar, SourceLocation, TaskQueueTrigger, TaskRetryConfig, Ternary, Trigger,
    VpcSettings, CORE_API, DEFAULT_REGION, PLATFORM, SPEC_VERSION,
};

use std::collections::BTreeMap;
use trigr_manifest::{
    BlockingTrigger, CallableTrigger, EventTrigger, HttpsTrigger, Literal, OptionValue,
    PathPattern, RateLimits, ScheduleRetryConfig, ScheduleTrigger, TaskQueueTrigger,
    TaskRetryConfig, Trigger,
};

use crate::errors::CompileError;
use crate::families::Family;
use crate::normalizer::OptionSet;
use crate::params::ParamTable;
use crate::resolver::Address;
use crate::scanner::CallSite;

const DEFAULT_FIRESTORE_DATABASE: &str = "(default)";
const DEFAULT_DATABASE_INSTANCE: &str = "*";
const BLOCKING_TOKENS: &[&str] = &["idToken", "accessToken", "refreshToken"];

/// Build the trigger variant for a call site, consuming its trigger options
pub(crate) fn build(
    site: &CallSite,
    address: Option<&Address>,
    options: &mut OptionSet,
    params: &ParamTable,
) -> Result<Trigger, CompileError> {
    let address_value = address.map_or("", |a| a.value.as_str());
    match site.family {
        Family::Https => Ok(Trigger::Https(HttpsTrigger {
            invoker: options.convert(params, "invoker", |f, v| f.string_list(v))?,
        })),
        Family::Callable => Ok(Trigger::Callable(CallableTrigger {})),
        Family::TaskQueue => task_queue(options, params),
        Family::Scheduler => schedule(address_value, options, params),
        Family::Identity => blocking(site, options, params),
        family => {
            let event_type = match family {
                Family::Eventarc => address_value.to_string(),
                _ => family.event_type(&site.method).unwrap_or_default(),
            };
            event(family, event_type, address, options, params)
        }
    }
}

fn event(
    family: Family,
    event_type: String,
    address: Option<&Address>,
    options: &mut OptionSet,
    params: &ParamTable,
) -> Result<Trigger, CompileError> {
    let mut trigger = EventTrigger {
        event_type,
        event_filters: BTreeMap::new(),
        event_filter_path_patterns: BTreeMap::new(),
        channel: None,
        retry: options
            .convert(params, "retry", |f, v| f.boolean(v))?
            .or(Some(OptionValue::bool(false))),
    };

    match (family, address) {
        (Family::PubSub, Some(topic)) => {
            trigger.event_filters.insert("topic".to_string(), topic.value.clone());
        }
        (Family::Storage, Some(bucket)) => {
            trigger.event_filters.insert("bucket".to_string(), bucket.value.clone());
        }
        (Family::Firestore, Some(document)) => {
            let pattern = parse_pattern(document)?;
            let target = if pattern.has_captures() {
                &mut trigger.event_filter_path_patterns
            } else {
                &mut trigger.event_filters
            };
            target.insert("document".to_string(), pattern.to_string());
            for (option, filter) in [("database", "database"), ("namespace", "namespace")] {
                let value = filter_or_default(options, params, option, DEFAULT_FIRESTORE_DATABASE)?;
                if let Some(value) = value {
                    trigger.event_filters.insert(filter.to_string(), value);
                }
            }
        }
        (Family::Database, Some(reference)) => {
            let pattern = parse_pattern(reference)?;
            trigger
                .event_filter_path_patterns
                .insert("ref".to_string(), pattern.to_string());
            let instance = filter_or_default(options, params, "instance", DEFAULT_DATABASE_INSTANCE)?;
            if let Some(instance) = instance {
                trigger
                    .event_filter_path_patterns
                    .insert("instance".to_string(), instance);
            }
        }
        (Family::Eventarc, _) => {
            if let Some(filters) = options.convert_with(params, "filters", |f, v| f.string_entries(v))? {
                trigger.event_filters.extend(filters);
            }
            trigger.channel = options
                .convert_with(params, "channel", |f, v| f.filter_text(v))?
                .flatten();
        }
        _ => {}
    }

    Ok(Trigger::Event(trigger))
}

/// A string filter, its default when absent, or nothing when reset
fn filter_or_default(
    options: &mut OptionSet,
    params: &ParamTable,
    option: &str,
    default: &str,
) -> Result<Option<String>, CompileError> {
    match options.convert_with(params, option, |f, v| f.filter_text(v))? {
        Some(value) => Ok(value),
        None => Ok(Some(default.to_string())),
    }
}

fn parse_pattern(address: &Address) -> Result<PathPattern, CompileError> {
    PathPattern::parse(&address.value).map_err(|e| CompileError::from_manifest(e, &address.location))
}

fn blocking(
    site: &CallSite,
    options: &mut OptionSet,
    params: &ParamTable,
) -> Result<Trigger, CompileError> {
    let mut tokens = BTreeMap::new();
    for token in BLOCKING_TOKENS {
        // Only enabled tokens are listed
        if let Some(
            value @ (OptionValue::Literal(Literal::Bool(true))
            | OptionValue::ParamRef(_)
            | OptionValue::Ternary(_)),
        ) = options.convert(params, token, |f, v| f.boolean(v))?
        {
            tokens.insert((*token).to_string(), value);
        }
    }
    Ok(Trigger::Blocking(BlockingTrigger {
        event_type: site.family.event_type(&site.method).unwrap_or_default(),
        options: tokens,
    }))
}

fn schedule(
    cron: &str,
    options: &mut OptionSet,
    params: &ParamTable,
) -> Result<Trigger, CompileError> {
    let retry = ScheduleRetryConfig {
        retry_count: options.convert(params, "retryCount", |f, v| f.int(v))?,
        max_retry_seconds: options.convert(params, "maxRetrySeconds", |f, v| f.int(v))?,
        min_backoff_seconds: options.convert(params, "minBackoffSeconds", |f, v| f.int(v))?,
        max_backoff_seconds: options.convert(params, "maxBackoffSeconds", |f, v| f.int(v))?,
        max_doublings: options.convert(params, "maxDoublings", |f, v| f.int(v))?,
    };
    Ok(Trigger::Schedule(ScheduleTrigger {
        schedule: cron.to_string(),
        time_zone: options.convert(params, "timeZone", |f, v| f.string(v))?,
        retry_config: Some(retry).filter(|r| !r.is_empty()),
    }))
}

fn task_queue(options: &mut OptionSet, params: &ParamTable) -> Result<Trigger, CompileError> {
    let retry = TaskRetryConfig {
        max_attempts: options.convert(params, "maxAttempts", |f, v| f.int(v))?,
        max_retry_seconds: options.convert(params, "maxRetrySeconds", |f, v| f.int(v))?,
        min_backoff_seconds: options.convert(params, "minBackoffSeconds", |f, v| f.int(v))?,
        max_backoff_seconds: options.convert(params, "maxBackoffSeconds", |f, v| f.int(v))?,
        max_doublings: options.convert(params, "maxDoublings", |f, v| f.int(v))?,
    };
    let limits = RateLimits {
        max_concurrent_dispatches: options
            .convert(params, "maxConcurrentDispatches", |f, v| f.int(v))?,
        max_dispatches_per_second: options
            .convert(params, "maxDispatchesPerSecond", |f, v| f.number(v))?,
    };
    Ok(Trigger::TaskQueue(TaskQueueTrigger {
        retry_config: Some(retry).filter(|r| !r.is_empty()),
        rate_limits: Some(limits).filter(|r| !r.is_empty()),
        invoker: options.convert(params, "invoker", |f, v| f.string_list(v))?,
    }))
}

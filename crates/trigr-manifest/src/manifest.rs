use crate::errors::ManifestError;
use crate::types::{
    Endpoint, Manifest, Param, RequiredApi, CORE_API, CORE_API_REASON, SPEC_VERSION,
};
use ahash::AHashSet;
use indexmap::IndexMap;
use tracing::debug;

/// Aggregates params, APIs and endpoints into a [`Manifest`]
///
/// Insertion order is preserved everywhere so the output depends only on the
/// order in which the caller feeds records in.
#[derive(Debug)]
pub struct ManifestBuilder {
    params: Vec<Param>,
    required_apis: Vec<RequiredApi>,
    seen_apis: AHashSet<String>,
    endpoints: IndexMap<String, Endpoint>,
}

impl Default for ManifestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ManifestBuilder {
    /// New builder with the core functions API already required
    pub fn new() -> Self {
        let mut builder = ManifestBuilder {
            params: Vec::new(),
            required_apis: Vec::new(),
            seen_apis: AHashSet::new(),
            endpoints: IndexMap::new(),
        };
        builder.require_api(CORE_API, CORE_API_REASON);
        builder
    }

    pub fn add_param(&mut self, param: Param) {
        self.params.push(param);
    }

    /// Record an API dependency; repeated APIs keep their first position
    pub fn require_api(&mut self, api: &str, reason: &str) {
        if self.seen_apis.insert(api.to_string()) {
            self.required_apis.push(RequiredApi {
                api: api.to_string(),
                reason: reason.to_string(),
            });
        }
    }

    /// Add an endpoint under its key, rejecting collisions
    pub fn add_endpoint(&mut self, endpoint: Endpoint) -> Result<(), ManifestError> {
        if let Some(existing) = self.endpoints.get(&endpoint.key) {
            return Err(ManifestError::DuplicateEndpointKey {
                key: endpoint.key.clone(),
                first: existing.location.clone(),
                second: endpoint.location.clone(),
            });
        }
        debug!("Endpoint {} ({})", endpoint.key, endpoint.trigger.wire_name());
        self.endpoints.insert(endpoint.key.clone(), endpoint);
        Ok(())
    }

    pub fn build(self) -> Manifest {
        Manifest {
            spec_version: SPEC_VERSION.to_string(),
            params: self.params,
            required_apis: self.required_apis,
            endpoints: self.endpoints,
        }
    }
}

impl Manifest {
    #[inline]
    pub fn endpoint(&self, key: &str) -> Option<&Endpoint> {
        self.endpoints.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.endpoints.keys().map(String::as_str)
    }

    pub fn param(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::ManifestError;
    use crate::manifest::*;
    use crate::types::{HttpsTrigger, SourceLocation, Trigger};

    fn https_endpoint(key: &str, line: usize) -> Endpoint {
        Endpoint::new(
            key,
            "handler",
            SourceLocation::new("main.py", line, 1),
            Trigger::Https(HttpsTrigger::default()),
        )
    }

    #[test]
    fn test_core_api_is_seeded_first() {
        let mut builder = ManifestBuilder::new();
        builder.require_api("cloudscheduler.googleapis.com", "Needed for scheduled functions.");
        builder.require_api(CORE_API, "again");
        builder.require_api("cloudscheduler.googleapis.com", "again");
        let manifest = builder.build();

        let apis: Vec<&str> = manifest.required_apis.iter().map(|a| a.api.as_str()).collect();
        assert_eq!(apis, vec![CORE_API, "cloudscheduler.googleapis.com"]);
        assert_eq!(manifest.required_apis[0].reason, CORE_API_REASON);
    }

    #[test]
    fn test_endpoints_keep_insertion_order() -> Result<(), ManifestError> {
        let mut builder = ManifestBuilder::new();
        builder.add_endpoint(https_endpoint("zeta", 1))?;
        builder.add_endpoint(https_endpoint("alpha", 5))?;
        let manifest = builder.build();
        assert_eq!(manifest.keys().collect::<Vec<_>>(), vec!["zeta", "alpha"]);
        assert!(manifest.endpoint("alpha").is_some());
        Ok(())
    }

    #[test]
    fn test_duplicate_key_names_both_locations() {
        let mut builder = ManifestBuilder::new();
        assert!(builder.add_endpoint(https_endpoint("hello", 3)).is_ok());
        let result = builder.add_endpoint(https_endpoint("hello", 9));
        let Err(ManifestError::DuplicateEndpointKey { key, first, second }) = result else {
            panic!("expected DuplicateEndpointKey");
        };
        assert_eq!(key, "hello");
        assert_eq!(first.to_string(), "main.py:3:1");
        assert_eq!(second.to_string(), "main.py:9:1");
    }
}

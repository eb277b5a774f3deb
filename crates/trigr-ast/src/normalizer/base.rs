use trigr_manifest::{
    Endpoint, Literal, OptionValue, SecretEnvVar, SourceLocation, VpcSettings, DEFAULT_REGION,
};

use crate::errors::CompileError;
use crate::normalizer::OptionSet;
use crate::params::ParamTable;

const INGRESS_SETTINGS: &[&str] = &[
    "ALLOW_ALL",
    "ALLOW_INTERNAL_ONLY",
    "ALLOW_INTERNAL_AND_GCLB",
];
const EGRESS_SETTINGS: &[&str] = &["PRIVATE_RANGES_ONLY", "ALL_TRAFFIC"];

/// Base options after conversion, before defaults are applied
///
/// `None` means the option was not given; `Some(Reset)` means it was reset
/// and must stay out of the manifest even if a fallback exists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaseOptions {
    pub region: Option<OptionValue>,
    pub memory: Option<OptionValue>,
    pub cpu: Option<OptionValue>,
    pub timeout_seconds: Option<OptionValue>,
    pub min_instances: Option<OptionValue>,
    pub max_instances: Option<OptionValue>,
    pub concurrency: Option<OptionValue>,
    pub service_account: Option<OptionValue>,
    pub ingress_settings: Option<OptionValue>,
    pub vpc_connector: Option<OptionValue>,
    pub vpc_egress_settings: Option<OptionValue>,
    pub labels: Option<OptionValue>,
    pub secrets: Option<Vec<String>>,
    pub omit: Option<OptionValue>,
}

impl BaseOptions {
    /// Take and convert every base option out of `options`
    pub(crate) fn take(options: &mut OptionSet, params: &ParamTable) -> Result<Self, CompileError> {
        let mut base = BaseOptions {
            region: options.convert(params, "region", |f, v| f.string_list(v))?,
            memory: options.convert(params, "memory", |f, v| f.memory(v))?,
            cpu: options.convert(params, "cpu", |f, v| f.cpu(v))?,
            timeout_seconds: options.convert(params, "timeoutSeconds", |f, v| f.int(v))?,
            min_instances: options.convert(params, "minInstances", |f, v| f.int(v))?,
            max_instances: options.convert(params, "maxInstances", |f, v| f.int(v))?,
            concurrency: options.convert(params, "concurrency", |f, v| f.int(v))?,
            service_account: options.convert(params, "serviceAccount", |f, v| f.string(v))?,
            ingress_settings: options.convert(params, "ingressSettings", |f, v| {
                f.one_of(v, INGRESS_SETTINGS)
            })?,
            vpc_connector: options.convert(params, "vpcConnector", |f, v| f.string(v))?,
            vpc_egress_settings: options.convert(params, "vpcConnectorEgressSettings", |f, v| {
                f.one_of(v, EGRESS_SETTINGS)
            })?,
            labels: options.convert(params, "labels", |f, v| {
                Ok(f.string_map(v)?.unwrap_or(OptionValue::Reset))
            })?,
            secrets: None,
            omit: options.convert(params, "omit", |f, v| f.boolean(v))?,
        };

        // Secrets are evaluated to a list of names, or a reset
        base.secrets = options
            .convert(params, "secrets", |_, v| Ok(v))?
            .map(|value| match value {
                OptionValue::Literal(Literal::List(items)) => items
                    .into_iter()
                    .filter_map(|item| match item {
                        Literal::Str(name) => Some(name),
                        _ => None,
                    })
                    .collect(),
                _ => Vec::new(),
            });

        Ok(base)
    }

    /// Fill every option not given here from `fallback`
    pub fn or(self, fallback: &BaseOptions) -> BaseOptions {
        BaseOptions {
            region: self.region.or_else(|| fallback.region.clone()),
            memory: self.memory.or_else(|| fallback.memory.clone()),
            cpu: self.cpu.or_else(|| fallback.cpu.clone()),
            timeout_seconds: self.timeout_seconds.or_else(|| fallback.timeout_seconds.clone()),
            min_instances: self.min_instances.or_else(|| fallback.min_instances.clone()),
            max_instances: self.max_instances.or_else(|| fallback.max_instances.clone()),
            concurrency: self.concurrency.or_else(|| fallback.concurrency.clone()),
            service_account: self.service_account.or_else(|| fallback.service_account.clone()),
            ingress_settings: self.ingress_settings.or_else(|| fallback.ingress_settings.clone()),
            vpc_connector: self.vpc_connector.or_else(|| fallback.vpc_connector.clone()),
            vpc_egress_settings: self
                .vpc_egress_settings
                .or_else(|| fallback.vpc_egress_settings.clone()),
            labels: self.labels.or_else(|| fallback.labels.clone()),
            secrets: self.secrets.or_else(|| fallback.secrets.clone()),
            omit: self.omit.or_else(|| fallback.omit.clone()),
        }
    }

    /// Write the options onto `endpoint`, applying the region default
    pub fn apply(self, endpoint: &mut Endpoint) -> Result<(), CompileError> {
        endpoint.vpc = vpc_settings(
            self.vpc_connector,
            self.vpc_egress_settings,
            &endpoint.location,
        )?;
        endpoint.region = Some(self.region.unwrap_or_else(|| {
            OptionValue::Literal(Literal::List(vec![Literal::Str(DEFAULT_REGION.to_string())]))
        }));
        endpoint.available_memory_mb = self.memory;
        endpoint.cpu = self.cpu;
        endpoint.timeout_seconds = self.timeout_seconds;
        endpoint.min_instances = self.min_instances;
        endpoint.max_instances = self.max_instances;
        endpoint.concurrency = self.concurrency;
        endpoint.service_account_email = self.service_account;
        endpoint.ingress_settings = self.ingress_settings;
        endpoint.labels = self.labels;
        endpoint.secret_environment_variables = self
            .secrets
            .unwrap_or_default()
            .into_iter()
            .map(|key| SecretEnvVar { key })
            .collect();
        endpoint.omit = self.omit;
        Ok(())
    }
}

fn vpc_settings(
    connector: Option<OptionValue>,
    egress: Option<OptionValue>,
    location: &SourceLocation,
) -> Result<Option<VpcSettings>, CompileError> {
    let egress = egress.filter(|value| !value.is_reset());
    match connector.filter(|value| !value.is_reset()) {
        Some(connector) => Ok(Some(VpcSettings {
            connector,
            egress_settings: egress,
        })),
        None if egress.is_some() => Err(CompileError::InvalidOption {
            location: location.clone(),
            option: "vpcConnectorEgressSettings".to_string(),
            reason: "requires vpcConnector".to_string(),
        }),
        None => Ok(None),
    }
}

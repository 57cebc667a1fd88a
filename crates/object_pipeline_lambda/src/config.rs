//! Environment configuration for the stage binaries.
//!
//! Every loader takes a lookup function so tests can supply values without
//! touching the process environment; binaries pass [`process_env`].

use object_pipeline_core::contract::{Stage, DEFAULT_MESSAGE_GROUP_ID};
use object_pipeline_core::fault::{FaultInjector, FaultPolicy, NeverFail, RandomFaultInjector};
use object_pipeline_core::storage_keys::KeyStrategy;
use thiserror::Error;

use crate::handlers::create::CreateHandlerConfig;
use crate::handlers::delete::DeleteHandlerConfig;
use crate::handlers::update::UpdateHandlerConfig;

pub const OTEL_SERVICE_NAME: &str = "OTEL_SERVICE_NAME";
pub const INPUT_S3_BUCKET_NAME: &str = "INPUT_S3_BUCKET_NAME";
pub const OUTPUT_S3_BUCKET_NAME: &str = "OUTPUT_S3_BUCKET_NAME";
pub const SQS_QUEUE_URL: &str = "SQS_QUEUE_URL";
pub const SQS_MESSAGE_GROUP_ID: &str = "SQS_MESSAGE_GROUP_ID";
pub const OBJECT_KEY_STRATEGY: &str = "OBJECT_KEY_STRATEGY";
pub const CREATE_FAILURE_STATUS_CODE: &str = "CREATE_FAILURE_STATUS_CODE";
pub const FAULT_INJECTION_ENABLED: &str = "FAULT_INJECTION_ENABLED";
pub const FAULT_INJECTION_UPPER_BOUND: &str = "FAULT_INJECTION_UPPER_BOUND";
pub const FAULT_INJECTION_SEED: &str = "FAULT_INJECTION_SEED";

pub const DEFAULT_CREATE_FAILURE_STATUS_CODE: u16 = 500;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be configured")]
    Missing(&'static str),
    #[error("{name} is invalid: {message}")]
    Invalid { name: &'static str, message: String },
}

pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultConfig {
    pub enabled: bool,
    pub policy: FaultPolicy,
    pub seed: Option<u64>,
}

impl FaultConfig {
    pub fn from_lookup(
        stage: Stage,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let enabled = parse_optional(lookup, FAULT_INJECTION_ENABLED, parse_bool)?.unwrap_or(true);
        let policy = match parse_optional(lookup, FAULT_INJECTION_UPPER_BOUND, |value| {
            value.parse::<u32>().map_err(|error| error.to_string())
        })? {
            Some(upper_bound) => FaultPolicy::with_upper_bound(upper_bound),
            None => FaultPolicy::for_stage(stage),
        };
        let seed = parse_optional(lookup, FAULT_INJECTION_SEED, |value| {
            value.parse::<u64>().map_err(|error| error.to_string())
        })?;

        Ok(Self {
            enabled,
            policy,
            seed,
        })
    }

    /// Fresh injector for one invocation.
    pub fn injector(&self) -> Box<dyn FaultInjector + Send> {
        if !self.enabled {
            return Box::new(NeverFail);
        }
        match self.seed {
            Some(seed) => Box::new(RandomFaultInjector::new(self.policy, seed)),
            None => Box::new(RandomFaultInjector::from_clock(self.policy)),
        }
    }
}

pub fn service_name(stage: Stage, lookup: &dyn Fn(&str) -> Option<String>) -> String {
    non_empty(lookup, OTEL_SERVICE_NAME).unwrap_or_else(|| format!("{stage}-lambda"))
}

pub fn create_config(
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<CreateHandlerConfig, ConfigError> {
    let key_strategy = parse_optional(lookup, OBJECT_KEY_STRATEGY, |value| {
        value.parse::<KeyStrategy>()
    })?
    .unwrap_or_default();
    if key_strategy == KeyStrategy::Timestamp {
        tracing::warn!(
            object.key.strategy = key_strategy.as_str(),
            "timestamp keys can collide across concurrent invocations"
        );
    }

    Ok(CreateHandlerConfig {
        bucket: required(lookup, INPUT_S3_BUCKET_NAME)?,
        key_strategy,
        failure_status_code: parse_optional(lookup, CREATE_FAILURE_STATUS_CODE, |value| {
            value
                .parse::<u16>()
                .map_err(|error| error.to_string())
                .and_then(|code| {
                    if (100..=599).contains(&code) {
                        Ok(code)
                    } else {
                        Err(format!("{code} is not an HTTP status code"))
                    }
                })
        })?
        .unwrap_or(DEFAULT_CREATE_FAILURE_STATUS_CODE),
    })
}

pub fn update_config(
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<UpdateHandlerConfig, ConfigError> {
    let message_group_id = match lookup(SQS_MESSAGE_GROUP_ID) {
        Some(value) if value.trim().is_empty() => None,
        Some(value) => Some(value.trim().to_string()),
        None => Some(DEFAULT_MESSAGE_GROUP_ID.to_string()),
    };

    Ok(UpdateHandlerConfig {
        output_bucket: required(lookup, OUTPUT_S3_BUCKET_NAME)?,
        message_group_id,
    })
}

pub fn queue_url(lookup: &dyn Fn(&str) -> Option<String>) -> Result<String, ConfigError> {
    required(lookup, SQS_QUEUE_URL)
}

pub fn delete_config(
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<DeleteHandlerConfig, ConfigError> {
    let mut buckets = vec![required(lookup, INPUT_S3_BUCKET_NAME)?];
    if let Some(output_bucket) = non_empty(lookup, OUTPUT_S3_BUCKET_NAME) {
        if !buckets.contains(&output_bucket) {
            buckets.push(output_bucket);
        }
    }
    Ok(DeleteHandlerConfig { buckets })
}

fn non_empty(lookup: &dyn Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required(
    lookup: &dyn Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    non_empty(lookup, name).ok_or(ConfigError::Missing(name))
}

fn parse_optional<T>(
    lookup: &dyn Fn(&str) -> Option<String>,
    name: &'static str,
    parse: impl Fn(&str) -> Result<T, String>,
) -> Result<Option<T>, ConfigError> {
    non_empty(lookup, name)
        .map(|value| parse(&value).map_err(|message| ConfigError::Invalid { name, message }))
        .transpose()
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(format!("'{other}' is not a boolean")),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::observability::JsonCapture;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        move |name| values.get(name).cloned()
    }

    #[test]
    fn create_config_requires_input_bucket() {
        let error = create_config(&lookup_from(&[])).expect_err("bucket is required");
        assert_eq!(error, ConfigError::Missing(INPUT_S3_BUCKET_NAME));
        assert_eq!(error.to_string(), "INPUT_S3_BUCKET_NAME must be configured");
    }

    #[test]
    fn create_config_defaults_to_uuid_keys_and_500() {
        let config = create_config(&lookup_from(&[(INPUT_S3_BUCKET_NAME, "input")]))
            .expect("config should load");
        assert_eq!(config.bucket, "input");
        assert_eq!(config.key_strategy, KeyStrategy::Uuid);
        assert_eq!(config.failure_status_code, 500);
    }

    #[test]
    fn timestamp_key_strategy_loads_with_a_warning() {
        let capture = JsonCapture::new();
        let config = capture
            .in_scope(|| {
                create_config(&lookup_from(&[
                    (INPUT_S3_BUCKET_NAME, "input"),
                    (OBJECT_KEY_STRATEGY, "timestamp"),
                ]))
            })
            .expect("config should load");

        assert_eq!(config.key_strategy, KeyStrategy::Timestamp);
        assert!(capture
            .lines()
            .iter()
            .any(|line| line["level"] == "WARN" && line["object.key.strategy"] == "timestamp"));
    }

    #[test]
    fn create_config_rejects_out_of_range_status() {
        let error = create_config(&lookup_from(&[
            (INPUT_S3_BUCKET_NAME, "input"),
            (CREATE_FAILURE_STATUS_CODE, "42"),
        ]))
        .expect_err("status must be an HTTP code");
        assert!(matches!(
            error,
            ConfigError::Invalid {
                name: CREATE_FAILURE_STATUS_CODE,
                ..
            }
        ));
    }

    #[test]
    fn update_config_defaults_message_group() {
        let config = update_config(&lookup_from(&[(OUTPUT_S3_BUCKET_NAME, "output")]))
            .expect("config should load");
        assert_eq!(config.message_group_id.as_deref(), Some("otel"));

        let config = update_config(&lookup_from(&[
            (OUTPUT_S3_BUCKET_NAME, "output"),
            (SQS_MESSAGE_GROUP_ID, ""),
        ]))
        .expect("config should load");
        assert_eq!(config.message_group_id, None);
    }

    #[test]
    fn delete_config_adds_distinct_output_bucket() {
        let config = delete_config(&lookup_from(&[
            (INPUT_S3_BUCKET_NAME, "input"),
            (OUTPUT_S3_BUCKET_NAME, "output"),
        ]))
        .expect("config should load");
        assert_eq!(config.buckets, vec!["input", "output"]);

        let config = delete_config(&lookup_from(&[
            (INPUT_S3_BUCKET_NAME, "same"),
            (OUTPUT_S3_BUCKET_NAME, "same"),
        ]))
        .expect("config should load");
        assert_eq!(config.buckets, vec!["same"]);
    }

    #[test]
    fn fault_config_uses_stage_bounds_by_default() {
        let config = FaultConfig::from_lookup(Stage::Delete, &lookup_from(&[]))
            .expect("config should load");
        assert!(config.enabled);
        assert_eq!(config.policy.upper_bound, 3);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn disabled_fault_injection_never_fires() {
        let config = FaultConfig::from_lookup(
            Stage::Check,
            &lookup_from(&[
                (FAULT_INJECTION_ENABLED, "false"),
                (FAULT_INJECTION_UPPER_BOUND, "1"),
            ]),
        )
        .expect("config should load");

        let mut injector = config.injector();
        assert!((0..200).all(|_| !injector.should_fail()));
    }

    #[test]
    fn seeded_fault_config_is_reproducible() {
        let config = FaultConfig::from_lookup(
            Stage::Update,
            &lookup_from(&[(FAULT_INJECTION_SEED, "99"), (FAULT_INJECTION_UPPER_BOUND, "2")]),
        )
        .expect("config should load");

        let mut first = config.injector();
        let mut second = config.injector();
        let first_draws: Vec<bool> = (0..100).map(|_| first.should_fail()).collect();
        let second_draws: Vec<bool> = (0..100).map(|_| second.should_fail()).collect();
        assert_eq!(first_draws, second_draws);
    }

    #[test]
    fn service_name_falls_back_to_stage() {
        assert_eq!(service_name(Stage::Check, &lookup_from(&[])), "check-lambda");
        assert_eq!(
            service_name(Stage::Check, &lookup_from(&[(OTEL_SERVICE_NAME, "svc")])),
            "svc"
        );
    }
}

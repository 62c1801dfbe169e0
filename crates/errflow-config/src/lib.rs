// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading, validation, and merging for errflow.
//!
//! [`ErrflowConfig`] holds the runtime settings of the error-handling core:
//! log level, lazy error-type registration, failure logging, redelivery
//! budgets, custom error types, and per-flow overrides. Helpers load it from
//! TOML, apply `ERRFLOW_*` environment overrides, merge overlays, and produce
//! advisory [`ConfigWarning`]s.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use errflow_handler::{DEFAULT_MAX_REDELIVERY_COUNT, LogMode, RedeliveryPolicy};
use errflow_types::{
    CORE_NAMESPACE, ComponentIdentifier, ErrorTypeRepository, MatcherError, RepositoryError,
    SharedMatcher, bootstrap, parse_matcher, parse_matcher_lazy,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::warn;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },

    /// A declared error type could not be registered.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// An error-type expression could not be parsed.
    #[error(transparent)]
    Matcher(#[from] MatcherError),
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory-level issues that do not prevent operation but deserve attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A recommended optional field is missing.
    MissingOptionalField {
        /// Name of the missing field.
        field: String,
        /// Why it matters.
        hint: String,
    },
    /// A budget of zero exhausts every message on its first delivery.
    ZeroRedelivery {
        /// `"default"` or the flow name.
        scope: String,
    },
    /// A redelivery budget is unusually large.
    LargeRedelivery {
        /// `"default"` or the flow name.
        scope: String,
        /// The budget.
        count: u32,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::MissingOptionalField { field, hint } => {
                write!(f, "missing optional field '{field}': {hint}")
            }
            ConfigWarning::ZeroRedelivery { scope } => {
                write!(f, "{scope}: max_redelivery_count is 0, every message is exhausted on first delivery")
            }
            ConfigWarning::LargeRedelivery { scope, count } => {
                write!(f, "{scope}: max_redelivery_count {count} is unusually large")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Top-level runtime configuration.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct ErrflowConfig {
    /// Log level override (e.g. `"debug"`, `"info"`, `"warn"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Register unknown error types named by expressions as children of ANY
    /// instead of rejecting them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lazy_error_types: Option<bool>,

    /// Whether handlers log the failures they handle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_exceptions: Option<bool>,

    /// Default redelivery budget.
    #[serde(default)]
    pub redelivery: RedeliverySettings,

    /// Custom error types, registered in order after the built-in catalog.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error_types: Vec<ErrorTypeEntry>,

    /// Per-flow overrides.
    #[serde(default)]
    pub flows: BTreeMap<String, FlowSettings>,
}

impl Default for ErrflowConfig {
    fn default() -> Self {
        Self {
            log_level: Some("info".into()),
            lazy_error_types: None,
            log_exceptions: None,
            redelivery: RedeliverySettings::default(),
            error_types: Vec::new(),
            flows: BTreeMap::new(),
        }
    }
}

/// Redelivery budget settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct RedeliverySettings {
    /// Deliveries allowed per message id before it is exhausted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_redelivery_count: Option<u32>,
}

impl RedeliverySettings {
    /// The configured budget, or the built-in default.
    pub fn max_redelivery_count(&self) -> u32 {
        self.max_redelivery_count
            .unwrap_or(DEFAULT_MAX_REDELIVERY_COUNT)
    }

    /// Build a [`RedeliveryPolicy`] keyed by message id.
    pub fn policy(&self) -> RedeliveryPolicy {
        RedeliveryPolicy::new(self.max_redelivery_count())
    }
}

/// Overrides for one flow.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct FlowSettings {
    /// Overrides [`ErrflowConfig::log_exceptions`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_exceptions: Option<bool>,

    /// Overrides the default redelivery budget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_redelivery_count: Option<u32>,
}

/// A custom error type declaration.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct ErrorTypeEntry {
    /// `NAMESPACE:NAME` of the new type.
    pub id: String,
    /// `NAMESPACE:NAME` of its parent; ANY when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl ErrflowConfig {
    /// Whether unknown error types are registered on first reference.
    pub fn lazy_error_types(&self) -> bool {
        self.lazy_error_types.unwrap_or(false)
    }

    /// Whether handlers of `flow` log failures.
    pub fn log_exceptions_for(&self, flow: &str) -> bool {
        self.flows
            .get(flow)
            .and_then(|f| f.log_exceptions)
            .or(self.log_exceptions)
            .unwrap_or(true)
    }

    /// [`LogMode`] for handlers of `flow`.
    pub fn log_mode_for(&self, flow: &str) -> LogMode {
        LogMode::from(self.log_exceptions_for(flow))
    }

    /// Redelivery policy for `flow`.
    pub fn redelivery_policy_for(&self, flow: &str) -> RedeliveryPolicy {
        let max = self
            .flows
            .get(flow)
            .and_then(|f| f.max_redelivery_count)
            .unwrap_or_else(|| self.redelivery.max_redelivery_count());
        RedeliveryPolicy::new(max)
    }

    /// Bootstrap the built-in catalog and register [`error_types`](Self::error_types).
    ///
    /// # Errors
    ///
    /// [`ConfigError::ValidationError`] for a malformed id,
    /// [`ConfigError::Repository`] for a duplicate or unknown parent.
    pub fn build_repository(&self) -> Result<ErrorTypeRepository, ConfigError> {
        let mut repo = bootstrap();
        for entry in &self.error_types {
            let id = parse_id(&entry.id)?;
            let parent = match &entry.parent {
                Some(p) => repo.lookup_error_type(&parse_id(p)?)?,
                None => repo.any_error_type().clone(),
            };
            repo.add_error_type(id, &parent)?;
        }
        Ok(repo)
    }

    /// Parse an error-type expression, honouring
    /// [`lazy_error_types`](Self::lazy_error_types).
    ///
    /// # Errors
    ///
    /// [`ConfigError::Matcher`] for a malformed expression, or an unknown type
    /// when lazy registration is off.
    pub fn matcher(
        &self,
        repo: &mut ErrorTypeRepository,
        expr: &str,
    ) -> Result<SharedMatcher, ConfigError> {
        let matcher = if self.lazy_error_types() {
            parse_matcher_lazy(repo, expr)?
        } else {
            parse_matcher(repo, expr)?
        };
        Ok(matcher)
    }
}

fn parse_id(raw: &str) -> Result<ComponentIdentifier, ConfigError> {
    ComponentIdentifier::parse(raw).map_err(|e| ConfigError::ValidationError {
        reasons: vec![format!("error type '{raw}': {e}")],
    })
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Threshold above which a redelivery budget generates a warning.
const LARGE_REDELIVERY_THRESHOLD: u32 = 100;

/// Recognised log levels.
const VALID_LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load an [`ErrflowConfig`] from an optional TOML file path.
///
/// * If `path` is `Some`, reads and parses the file.
/// * If `path` is `None`, returns [`ErrflowConfig::default()`].
///
/// Environment variable overrides are applied on top in both cases.
///
/// # Errors
///
/// [`ConfigError::FileNotFound`] or [`ConfigError::ParseError`].
pub fn load_config(path: Option<&Path>) -> Result<ErrflowConfig, ConfigError> {
    let mut config = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|_| ConfigError::FileNotFound {
                path: p.display().to_string(),
            })?;
            parse_toml(&content)?
        }
        None => ErrflowConfig::default(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parse a TOML string into an [`ErrflowConfig`].
///
/// # Errors
///
/// [`ConfigError::ParseError`] on malformed TOML or mistyped fields.
pub fn parse_toml(content: &str) -> Result<ErrflowConfig, ConfigError> {
    toml::from_str::<ErrflowConfig>(content).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Env overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides.
///
/// Recognised variables:
/// - `ERRFLOW_LOG_LEVEL`
/// - `ERRFLOW_MAX_REDELIVERY`
/// - `ERRFLOW_LAZY_ERROR_TYPES` (`true`/`false`/`1`/`0`)
///
/// Unparseable values are logged and ignored.
pub fn apply_env_overrides(config: &mut ErrflowConfig) {
    if let Ok(val) = std::env::var("ERRFLOW_LOG_LEVEL") {
        config.log_level = Some(val);
    }
    if let Ok(val) = std::env::var("ERRFLOW_MAX_REDELIVERY") {
        match val.trim().parse::<u32>() {
            Ok(n) => config.redelivery.max_redelivery_count = Some(n),
            Err(_) => warn!(target: "errflow.config", value = %val, "ignoring invalid ERRFLOW_MAX_REDELIVERY"),
        }
    }
    if let Ok(val) = std::env::var("ERRFLOW_LAZY_ERROR_TYPES") {
        match val.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => config.lazy_error_types = Some(true),
            "0" | "false" | "no" => config.lazy_error_types = Some(false),
            _ => warn!(target: "errflow.config", value = %val, "ignoring invalid ERRFLOW_LAZY_ERROR_TYPES"),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a parsed configuration, returning advisory warnings.
///
/// Hard errors (bad log level, malformed or reserved error-type ids,
/// dangling parents, empty flow names) are returned as a
/// [`ConfigError::ValidationError`]; soft issues come back as warnings.
///
/// # Errors
///
/// [`ConfigError::ValidationError`] listing every hard error found.
pub fn validate_config(config: &ErrflowConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<ConfigWarning> = Vec::new();

    if let Some(ref level) = config.log_level {
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            errors.push(format!("invalid log_level '{level}'"));
        }
    }

    check_budget("default", config.redelivery.max_redelivery_count, &mut warnings);

    for (name, flow) in &config.flows {
        if name.trim().is_empty() {
            errors.push("flow name must not be empty".into());
        }
        check_budget(&format!("flow '{name}'"), flow.max_redelivery_count, &mut warnings);
    }

    // Parents must be built-in or declared earlier.
    let builtin = bootstrap();
    let mut declared: BTreeSet<ComponentIdentifier> = BTreeSet::new();
    for entry in &config.error_types {
        let id = match ComponentIdentifier::parse(&entry.id) {
            Ok(id) => id,
            Err(e) => {
                errors.push(format!("error type '{}': {e}", entry.id));
                continue;
            }
        };
        if id.has_wildcard() {
            errors.push(format!("error type '{id}': wildcards are not allowed in declarations"));
        }
        if id.namespace() == CORE_NAMESPACE {
            errors.push(format!("error type '{id}': the {CORE_NAMESPACE} namespace is reserved"));
        }
        if let Some(ref parent) = entry.parent {
            match ComponentIdentifier::parse(parent) {
                Ok(p) if builtin.get_error_type(&p).is_some() || declared.contains(&p) => {}
                Ok(p) => errors.push(format!("error type '{id}': unknown parent '{p}'")),
                Err(e) => errors.push(format!("error type '{id}': parent '{parent}': {e}")),
            }
        }
        if !declared.insert(id.clone()) {
            errors.push(format!("error type '{id}' is declared twice"));
        }
    }

    if config.log_level.is_none() {
        warnings.push(ConfigWarning::MissingOptionalField {
            field: "log_level".into(),
            hint: "falls back to the subscriber default".into(),
        });
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

fn check_budget(scope: &str, count: Option<u32>, warnings: &mut Vec<ConfigWarning>) {
    match count {
        Some(0) => warnings.push(ConfigWarning::ZeroRedelivery {
            scope: scope.to_string(),
        }),
        Some(n) if n > LARGE_REDELIVERY_THRESHOLD => warnings.push(ConfigWarning::LargeRedelivery {
            scope: scope.to_string(),
            count: n,
        }),
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

/// Merge two configurations.  Values in `overlay` take precedence over `base`.
///
/// Flow maps are combined; on name collisions the overlay entry wins.
/// Error-type declarations are concatenated, base first.
pub fn merge_configs(base: ErrflowConfig, overlay: ErrflowConfig) -> ErrflowConfig {
    let mut flows = base.flows;
    flows.extend(overlay.flows);
    let mut error_types = base.error_types;
    error_types.extend(overlay.error_types);
    ErrflowConfig {
        log_level: overlay.log_level.or(base.log_level),
        lazy_error_types: overlay.lazy_error_types.or(base.lazy_error_types),
        log_exceptions: overlay.log_exceptions.or(base.log_exceptions),
        redelivery: RedeliverySettings {
            max_redelivery_count: overlay
                .redelivery
                .max_redelivery_count
                .or(base.redelivery.max_redelivery_count),
        },
        error_types,
        flows,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared command implementations for the errflow CLI.
//!
//! These functions are library-level so they can be tested without
//! spawning the binary.

use anyhow::{Context, Result};
use errflow_config::{ErrflowConfig, load_config, validate_config};
use errflow_mapping::{classes, default_locator};
use errflow_types::ErrorTypeRepository;
use schemars::schema_for;
use serde::Serialize;
use std::path::Path;

/// One row of the `catalog` listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    /// `NAMESPACE:NAME`.
    pub id: String,
    /// Parent `NAMESPACE:NAME`, absent for the roots.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// `ANY` or `CRITICAL`.
    pub root: String,
}

/// Every registered error type, sorted by identifier.
pub fn catalog(repo: &ErrorTypeRepository) -> Vec<CatalogEntry> {
    let mut entries: Vec<CatalogEntry> = repo
        .iter()
        .map(|t| CatalogEntry {
            id: t.to_string(),
            parent: t.parent().map(ToString::to_string),
            root: t.root().identifier().to_string(),
        })
        .collect();
    entries.sort_by(|a, b| a.id.cmp(&b.id));
    entries
}

/// Render the catalog as aligned text.
pub fn catalog_text(entries: &[CatalogEntry]) -> String {
    let width = entries.iter().map(|e| e.id.len()).max().unwrap_or(0);
    let mut out = String::new();
    for e in entries {
        let parent = e.parent.as_deref().unwrap_or("-");
        out.push_str(&format!("{:<width$}  {}\n", e.id, parent));
    }
    out
}

/// Result of classifying a built-in exception class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    /// The exception class.
    pub class: String,
    /// Resolved error type.
    pub error_type: String,
    /// Ancestors of the error type, nearest first.
    pub ancestors: Vec<String>,
    /// Whether the type is under CRITICAL.
    pub critical: bool,
}

/// Resolve the class named `class` through the default locator.
pub fn classify(repo: &ErrorTypeRepository, class: &str) -> Result<Classification> {
    let Some(exception_class) = classes::by_name(class) else {
        let known: Vec<&str> = classes::ALL.iter().map(|c| c.name()).collect();
        anyhow::bail!("unknown exception class '{class}' (known: {})", known.join(", "));
    };
    let locator = default_locator(repo).context("build default locator")?;
    let error_type = locator.lookup_class(exception_class);
    Ok(Classification {
        class: exception_class.name().to_string(),
        error_type: error_type.to_string(),
        ancestors: error_type.ancestors().map(ToString::to_string).collect(),
        critical: error_type.root().is_critical(),
    })
}

/// Outcome of `check-config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigReport {
    /// Advisory warnings.
    pub warnings: Vec<String>,
    /// Number of custom error types.
    pub error_types: usize,
    /// Number of flow overrides.
    pub flows: usize,
}

/// Load, validate, and register the config at `path`.
pub fn check_config(path: &Path) -> Result<ConfigReport> {
    let config = load_config(Some(path))
        .with_context(|| format!("load config '{}'", path.display()))?;
    let warnings = validate_config(&config)?;
    config
        .build_repository()
        .context("register declared error types")?;
    Ok(ConfigReport {
        warnings: warnings.iter().map(ToString::to_string).collect(),
        error_types: config.error_types.len(),
        flows: config.flows.len(),
    })
}

/// JSON schema of [`ErrflowConfig`].
pub fn schema_json() -> Result<String> {
    let value = serde_json::to_value(schema_for!(ErrflowConfig))?;
    serde_json::to_string_pretty(&value).context("serialize schema")
}

#[cfg(test)]
mod tests {
    use super::*;
    use errflow_types::bootstrap;

    #[test]
    fn catalog_lists_builtins_sorted() {
        let entries = catalog(&bootstrap());
        assert_eq!(entries.len(), 19);
        assert!(entries.windows(2).all(|w| w[0].id < w[1].id));
        let retry = entries
            .iter()
            .find(|e| e.id == "CORE:RETRY_EXHAUSTED")
            .unwrap();
        assert_eq!(retry.parent.as_deref(), Some("CORE:CONNECTIVITY"));
        assert_eq!(retry.root, "ANY");
    }

    #[test]
    fn catalog_text_aligns_columns() {
        let text = catalog_text(&catalog(&bootstrap()));
        assert!(text.lines().any(|l| l.starts_with("CORE:ANY") && l.ends_with('-')));
    }

    #[test]
    fn classify_uses_most_specific_mapping() {
        let c = classify(&bootstrap(), "FileNotFoundException").unwrap();
        assert_eq!(c.error_type, "CORE:CONNECTIVITY");
        assert_eq!(c.ancestors, vec!["CORE:ANY"]);
        assert!(!c.critical);

        let c = classify(&bootstrap(), "ResourceExhaustedError").unwrap();
        assert_eq!(c.error_type, "CORE:OVERLOAD");
        assert!(c.critical);
    }

    #[test]
    fn classify_rejects_unknown_class() {
        let err = classify(&bootstrap(), "NoSuchException").unwrap_err();
        assert!(err.to_string().contains("TimeoutException"));
    }

    #[test]
    fn schema_is_json() {
        let schema: serde_json::Value = serde_json::from_str(&schema_json().unwrap()).unwrap();
        assert!(schema["properties"]["flows"].is_object());
    }
}

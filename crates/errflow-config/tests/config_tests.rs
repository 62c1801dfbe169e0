// SPDX-License-Identifier: MIT OR Apache-2.0
//! File loading and environment overrides for `errflow-config`.

use errflow_config::{ConfigError, ErrflowConfig, load_config, merge_configs, parse_toml, validate_config};
use serial_test::serial;
use std::io::Write;

const SAMPLE: &str = r#"
log_level = "warn"
log_exceptions = true

[redelivery]
max_redelivery_count = 4

[[error_types]]
id = "HTTP:NOT_FOUND"

[[error_types]]
id = "HTTP:GONE"
parent = "HTTP:NOT_FOUND"

[flows.orders]
max_redelivery_count = 2
"#;

fn write_temp(content: &str) -> tempfile::NamedTempFile {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(content.as_bytes()).unwrap();
    f
}

fn clear_env() {
    // SAFETY: tests touching the environment are serialised.
    unsafe {
        std::env::remove_var("ERRFLOW_LOG_LEVEL");
        std::env::remove_var("ERRFLOW_MAX_REDELIVERY");
        std::env::remove_var("ERRFLOW_LAZY_ERROR_TYPES");
    }
}

#[test]
#[serial]
fn load_from_file() {
    clear_env();
    let f = write_temp(SAMPLE);
    let cfg = load_config(Some(f.path())).unwrap();
    assert_eq!(cfg.log_level.as_deref(), Some("warn"));
    assert_eq!(cfg.redelivery.max_redelivery_count(), 4);
    assert_eq!(cfg.redelivery_policy_for("orders").max_redelivery_count(), 2);
    assert!(validate_config(&cfg).unwrap().is_empty());

    let repo = cfg.build_repository().unwrap();
    let names: Vec<_> = repo.namespaces().into_iter().collect();
    assert_eq!(names, vec!["CORE", "HTTP"]);
}

#[test]
#[serial]
fn missing_file_is_reported() {
    clear_env();
    let err = load_config(Some(std::path::Path::new("/definitely/not/here.toml"))).unwrap_err();
    assert!(matches!(err, ConfigError::FileNotFound { .. }));
    assert!(err.to_string().contains("/definitely/not/here.toml"));
}

#[test]
#[serial]
fn none_path_gives_defaults() {
    clear_env();
    assert_eq!(load_config(None).unwrap(), ErrflowConfig::default());
}

#[test]
#[serial]
fn env_overrides_file_values() {
    clear_env();
    let f = write_temp(SAMPLE);
    // SAFETY: serialised with the other environment tests.
    unsafe {
        std::env::set_var("ERRFLOW_LOG_LEVEL", "trace");
        std::env::set_var("ERRFLOW_MAX_REDELIVERY", "9");
        std::env::set_var("ERRFLOW_LAZY_ERROR_TYPES", "TRUE");
    }
    let cfg = load_config(Some(f.path())).unwrap();
    clear_env();
    assert_eq!(cfg.log_level.as_deref(), Some("trace"));
    assert_eq!(cfg.redelivery.max_redelivery_count(), 9);
    assert!(cfg.lazy_error_types());
}

#[test]
#[serial]
fn invalid_env_values_are_ignored() {
    clear_env();
    // SAFETY: serialised with the other environment tests.
    unsafe {
        std::env::set_var("ERRFLOW_MAX_REDELIVERY", "lots");
        std::env::set_var("ERRFLOW_LAZY_ERROR_TYPES", "maybe");
    }
    let cfg = load_config(None).unwrap();
    clear_env();
    assert_eq!(cfg.redelivery.max_redelivery_count, None);
    assert_eq!(cfg.lazy_error_types, None);
}

#[test]
fn serialised_config_round_trips_through_toml() {
    let cfg = parse_toml(SAMPLE).unwrap();
    let text = toml::to_string(&cfg).unwrap();
    assert_eq!(parse_toml(&text).unwrap(), cfg);
}

#[test]
fn overlay_flows_replace_base_flows() {
    let base = parse_toml(SAMPLE).unwrap();
    let overlay = parse_toml(
        r#"
        [flows.orders]
        log_exceptions = false
        "#,
    )
    .unwrap();
    let merged = merge_configs(base, overlay);
    assert!(!merged.log_exceptions_for("orders"));
    // The overlay entry replaced the whole flow, including its budget.
    assert_eq!(merged.redelivery_policy_for("orders").max_redelivery_count(), 4);
    assert_eq!(merged.error_types.len(), 2);
}

#[test]
fn schema_describes_top_level_fields() {
    let schema = serde_json::to_value(schemars::schema_for!(ErrflowConfig)).unwrap();
    let props = schema["properties"].as_object().unwrap();
    for key in ["log_level", "lazy_error_types", "redelivery", "flows", "error_types"] {
        assert!(props.contains_key(key), "missing {key}");
    }
}

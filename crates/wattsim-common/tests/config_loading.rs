//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Integration tests for configuration discovery."
//! ems_version: "v0.1.0"
//! ems_owner: "tbd"
//! ---
use std::fs;
use std::path::PathBuf;

use wattsim_common::config::AppConfig;

const MINIMAL: &str = r#"
[simulation]
interval_ms = 1000

[points.p1]
nombre = "Sala de servidores"
consumo_base_kwh = 3.0
potencia_base_w = 3000.0
"#;

const OVERRIDE: &str = r#"
[simulation]
interval_ms = 1500

[points.override]
nombre = "Override"
consumo_base_kwh = 1.0
potencia_base_w = 1000.0
"#;

// Both scenarios share one test so the environment variable is never raced.
#[test]
fn load_with_source_prefers_env_then_candidates() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.toml");
    let second = dir.path().join("second.toml");
    fs::write(&second, MINIMAL).unwrap();

    std::env::remove_var(AppConfig::ENV_CONFIG_PATH);
    let loaded = AppConfig::load_with_source(&[first.clone(), second.clone()]).unwrap();
    assert_eq!(loaded.source, second);
    assert!(loaded.config.point("p1").is_some());

    let env_path = dir.path().join("env.toml");
    fs::write(&env_path, OVERRIDE).unwrap();
    std::env::set_var(AppConfig::ENV_CONFIG_PATH, &env_path);
    let loaded = AppConfig::load_with_source(&[second.clone()]).unwrap();
    std::env::remove_var(AppConfig::ENV_CONFIG_PATH);
    assert_eq!(loaded.source, env_path);
    assert!(loaded.config.point("override").is_some());

    let missing: Vec<PathBuf> = vec![first];
    let err = AppConfig::load_with_source(&missing).unwrap_err();
    assert!(err.to_string().contains("no configuration files found"));
}

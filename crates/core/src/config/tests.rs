use std::collections::HashMap;
use std::io::Write;

use super::*;

#[test]
fn test_generator_config_default() {
    let config = GeneratorConfig::default();
    assert_eq!(config.schema_name, "public");
    assert!(!config.variable_schema);
    assert_eq!(config.fingerprint_width, 8);
    assert_eq!(config.max_nesting_depth, 32);
    assert!(config.contracts.is_empty());
    assert!(config.validate().is_ok());
}

#[test]
fn test_validation_rejects_bad_values() {
    let mut config = GeneratorConfig::default();
    config.schema_name = String::new();
    assert_eq!(config.validate(), Err(ConfigError::EmptySchemaName));

    config.schema_name = "1events".to_string();
    assert!(matches!(config.validate(), Err(ConfigError::InvalidSchemaName { .. })));

    config.schema_name = "events".to_string();
    config.fingerprint_width = 3;
    assert_eq!(config.validate(), Err(ConfigError::InvalidFingerprintWidth { width: 3 }));

    config.fingerprint_width = 65;
    assert_eq!(config.validate(), Err(ConfigError::InvalidFingerprintWidth { width: 65 }));

    config.fingerprint_width = 8;
    config.max_nesting_depth = 0;
    assert_eq!(config.validate(), Err(ConfigError::InvalidNestingDepth));

    config.max_nesting_depth = 4;
    config.engine_timeout_secs = 0;
    assert_eq!(config.validate(), Err(ConfigError::InvalidTimeout));

    config.engine_timeout_secs = 5;
    config.migration_name = "event schema".to_string();
    assert!(matches!(config.validate(), Err(ConfigError::InvalidMigrationName { .. })));
}

#[test]
fn test_duplicate_contracts_rejected() {
    let mut config = GeneratorConfig::default();
    config.contracts = vec![
        ContractSource { name: "Token".to_string(), abi_path: "a.json".into() },
        ContractSource { name: "Token".to_string(), abi_path: "b.json".into() },
    ];

    assert_eq!(
        config.validate(),
        Err(ConfigError::DuplicateContract { name: "Token".to_string() })
    );
}

#[test]
fn test_overrides_apply_in_place() {
    let vars: HashMap<&str, &str> = [
        ("SCHEMA_NAME", "INDEXER_SCHEMA"),
        ("VARIABLE_SCHEMA", "true"),
        ("FINGERPRINT_WIDTH", "12"),
    ]
    .into_iter()
    .collect();

    let mut config = GeneratorConfig::default();
    config
        .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
        .unwrap();

    assert_eq!(config.schema_name, "INDEXER_SCHEMA");
    assert!(config.variable_schema);
    assert_eq!(config.fingerprint_width, 12);
    assert_eq!(config.output_dir, "./generated");
}

#[test]
fn test_invalid_override_is_an_error() {
    let mut config = GeneratorConfig::default();
    let result = config.apply_overrides(|key| {
        (key == "FINGERPRINT_WIDTH").then(|| "wide".to_string())
    });

    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_load_toml_config() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
schema_name = "events"
fingerprint_width = 10

[[contracts]]
name = "Token"
abi_path = "abis/token.json"
"#
    )
    .unwrap();

    let config = GeneratorConfig::load_from_file(file.path()).unwrap();
    assert_eq!(config.schema_name, "events");
    assert_eq!(config.fingerprint_width, 10);
    assert_eq!(config.max_nesting_depth, 32);
    assert_eq!(config.contracts.len(), 1);
    assert_eq!(config.contracts[0].abi_path, PathBuf::from("abis/token.json"));
}

#[test]
fn test_load_json_and_yaml_config() {
    let mut json = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(json, r#"{{"schema_name": "from_json", "dry_run": true}}"#).unwrap();
    let config = GeneratorConfig::load_from_file(json.path()).unwrap();
    assert_eq!(config.schema_name, "from_json");
    assert!(config.dry_run);

    let mut yaml = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(yaml, "schema_name: from_yaml\nvariable_schema: true").unwrap();
    let config = GeneratorConfig::load_from_file(yaml.path()).unwrap();
    assert_eq!(config.schema_name, "from_yaml");
    assert!(config.variable_schema);
}

#[test]
fn test_unknown_extension_rejected() {
    let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
    assert!(matches!(
        GeneratorConfig::load_from_file(file.path()),
        Err(Error::Config(_))
    ));
}

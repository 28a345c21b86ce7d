//! Integration tests for YAML configuration
//!
//! Loads settings from files and builds working dual graphs from them.

use dualgraph::{
    AttributeType, ConfigError, DualGraphConfig, ElementType, GraphReadMethods, GraphWriteMethods,
};
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_load_config_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "schema: bare").unwrap();
    writeln!(file, "vertex_capacity: 8").unwrap();
    writeln!(file, "slow_write_wait_warn_ms: 250").unwrap();

    let config = DualGraphConfig::from_yaml_file(file.path()).unwrap();
    assert_eq!(config.schema, "bare");
    assert_eq!(config.vertex_capacity, 8);
    assert_eq!(config.slow_write_wait_warn_ms, 250);

    let graph = config.build().unwrap();
    let mut wg = graph.get_writable_graph("Keyed", true).unwrap();
    let key = wg
        .add_attribute(ElementType::Vertex, AttributeType::Integer, "key", "", None, None)
        .unwrap();
    wg.set_primary_key(ElementType::Vertex, &[key]).unwrap();
    for _ in 0..3 {
        let v = wg.add_vertex().unwrap();
        wg.set_int_value(key, v, 42).unwrap();
    }
    // The bare schema supplies a default merger
    wg.validate_key(ElementType::Vertex, true).unwrap();
    wg.commit().unwrap();

    assert_eq!(graph.get_readable_graph().vertex_count().unwrap(), 1);
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = DualGraphConfig::from_yaml_file(dir.path().join("absent.yaml"));
    assert!(matches!(result, Err(ConfigError::Io { .. })));
}

#[test]
fn test_empty_mapping_gives_defaults() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{{}}").unwrap();
    let config = DualGraphConfig::from_yaml_file(file.path()).unwrap();
    assert_eq!(config, DualGraphConfig::default());
}

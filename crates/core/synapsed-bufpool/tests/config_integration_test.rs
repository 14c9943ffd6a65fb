//! Loading pool configuration from TOML files.

mod common;

use common::pool_with;
use std::io::Write;
use synapsed_bufpool::{BufferPoolError, PoolConfig};
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(content.as_bytes()).expect("write config");
    file
}

#[test]
fn test_load_full_config_file() {
    let file = write_config(
        r#"
page_size = 4096
block_size = 64
initial_pages = 2
max_arena_bytes = 65536
"#,
    );

    let config = PoolConfig::from_file(file.path()).unwrap();
    assert_eq!(config.page_size, 4096);
    assert_eq!(config.block_size, 64);
    assert_eq!(config.initial_pages, 2);
    assert_eq!(config.max_arena_bytes, Some(65536));

    let pool = pool_with(config);
    let snapshot = pool.metrics_snapshot();
    assert_eq!(snapshot.arena_bytes, 8192);
    assert_eq!(pool.segment_size(65).unwrap(), 128);
}

#[test]
fn test_partial_file_uses_defaults() {
    let file = write_config("block_size = 16\n");
    let config = PoolConfig::from_file(file.path()).unwrap();
    assert_eq!(config, PoolConfig::new(1024, 16));
}

#[test]
fn test_missing_file_is_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = PoolConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, BufferPoolError::Configuration(_)));
    assert!(err.to_string().contains("absent.toml"));
}

#[test]
fn test_malformed_file_is_configuration_error() {
    let file = write_config("page_size = [1, 2\n");
    let err = PoolConfig::from_file(file.path()).unwrap_err();
    assert!(matches!(err, BufferPoolError::Configuration(_)));
}

#[test]
fn test_loaded_geometry_is_still_validated() {
    let file = write_config("page_size = 1000\nblock_size = 32\n");
    let config = PoolConfig::from_file(file.path()).unwrap();
    let err = synapsed_bufpool::BufferPool::with_config(config).unwrap_err();
    assert_eq!(
        err,
        BufferPoolError::Configuration("pageSize must be divisible by blockSize".to_string())
    );
}

#[test]
fn test_saved_config_reloads() {
    let config = PoolConfig::new(2048, 32).with_initial_pages(3).with_max_arena_bytes(1 << 16);
    let file = write_config(&config.to_toml_string().unwrap());
    assert_eq!(PoolConfig::from_file(file.path()).unwrap(), config);
}

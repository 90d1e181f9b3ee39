//! loghive.toml 통합 설정 테스트
//!
//! - loghive.toml.example 파싱 테스트
//! - 부분 설정 (일부 섹션만) 로딩 테스트
//! - 환경변수 우선순위 테스트
//! - 파일 로딩 에러 테스트

use std::io::Write;

use loghive_core::config::LoghiveConfig;
use loghive_core::error::{ConfigError, LoghiveError};

// =============================================================================
// loghive.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_and_validates() {
    let content = include_str!("../../../loghive.toml.example");
    let config = LoghiveConfig::parse(content).expect("example config should parse");
    config
        .validate()
        .expect("example config should pass validation");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.queue.partitions, 4);
    assert_eq!(config.queue.batch_size, 500);
    assert_eq!(config.cache.key_prefix, "loghive");
    assert_eq!(config.search.url, "http://localhost:9200");
    assert_eq!(config.lock.poll_interval_ms, 20);
    assert_eq!(config.counter.refresh_ceiling, 10_000_000_000);
    assert_eq!(config.collector.bind, "0.0.0.0:514");
}

#[test]
fn only_queue_section_keeps_other_defaults() {
    let config = LoghiveConfig::parse("[queue]\npartitions = 12\n").expect("should parse");
    assert_eq!(config.queue.partitions, 12);
    assert_eq!(config.cache.ttl_secs, 300);
    assert_eq!(config.search.backend, "http");
    config.validate().expect("should validate");
}

#[test]
fn wrong_value_type_is_parse_error() {
    let err = LoghiveConfig::parse("[queue]\npartitions = \"many\"\n").unwrap_err();
    assert!(matches!(
        err,
        LoghiveError::Config(ConfigError::ParseFailed { .. })
    ));
}

// =============================================================================
// 환경변수 우선순위 테스트
// =============================================================================

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_toml() {
    let toml = r#"
[queue]
partitions = 2
"#;

    let original = std::env::var("LOGHIVE_QUEUE_PARTITIONS").ok();
    // SAFETY: serial_test로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("LOGHIVE_QUEUE_PARTITIONS", "16");
    }

    let mut config = LoghiveConfig::parse(toml).expect("should parse");
    config.apply_env_overrides();
    let result = config.queue.partitions;

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("LOGHIVE_QUEUE_PARTITIONS", val),
            None => std::env::remove_var("LOGHIVE_QUEUE_PARTITIONS"),
        }
    }

    assert_eq!(result, 16);
}

#[test]
#[serial_test::serial]
fn unparsable_env_value_is_ignored() {
    let original = std::env::var("LOGHIVE_CACHE_TTL_SECS").ok();
    // SAFETY: serial_test로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("LOGHIVE_CACHE_TTL_SECS", "five minutes");
    }

    let mut config = LoghiveConfig::default();
    config.apply_env_overrides();
    let result = config.cache.ttl_secs;

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("LOGHIVE_CACHE_TTL_SECS", val),
            None => std::env::remove_var("LOGHIVE_CACHE_TTL_SECS"),
        }
    }

    assert_eq!(result, 300);
}

#[tokio::test]
#[serial_test::serial]
async fn load_applies_env_and_validates() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    writeln!(file, "[search]\nindex_prefix = \"audit\"").expect("write");

    let original = std::env::var("LOGHIVE_SEARCH_INDEX_PREFIX").ok();
    // SAFETY: serial_test로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("LOGHIVE_SEARCH_INDEX_PREFIX", "Invalid Prefix");
    }

    let result = LoghiveConfig::load(file.path()).await;

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("LOGHIVE_SEARCH_INDEX_PREFIX", val),
            None => std::env::remove_var("LOGHIVE_SEARCH_INDEX_PREFIX"),
        }
    }

    // 환경변수 값이 검증에 걸려야 함
    let err = result.unwrap_err();
    assert!(err.to_string().contains("search.index_prefix"));
}

// =============================================================================
// 파일 로딩 테스트
// =============================================================================

#[tokio::test]
async fn from_file_nonexistent_returns_file_not_found() {
    let result = LoghiveConfig::from_file("/tmp/loghive_test_nonexistent_12345.toml").await;
    assert!(matches!(
        result.unwrap_err(),
        LoghiveError::Config(ConfigError::FileNotFound { .. })
    ));
}

#[tokio::test]
async fn from_file_reads_tempfile() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    writeln!(file, "[lock]\nexpiry_ms = 2500").expect("write");

    let config = LoghiveConfig::from_file(file.path())
        .await
        .expect("should load");
    assert_eq!(config.lock.expiry_ms, 2500);
}

#[test]
fn example_config_serialize_roundtrip() {
    let content = include_str!("../../../loghive.toml.example");
    let config = LoghiveConfig::parse(content).expect("should parse");
    let serialized = toml::to_string_pretty(&config).expect("should serialize");
    let reparsed = LoghiveConfig::parse(&serialized).expect("should reparse");
    reparsed.validate().expect("should validate");
    assert_eq!(config.queue.batch_size, reparsed.queue.batch_size);
}

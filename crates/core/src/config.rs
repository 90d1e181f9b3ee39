//! 설정 관리 -- loghive.toml 파싱 및 런타임 설정
//!
//! [`LoghiveConfig`]는 모든 구성요소의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`LOGHIVE_QUEUE_PARTITIONS=8` 형식)
//! 3. 설정 파일 (`loghive.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), loghive_core::error::LoghiveError> {
//! use loghive_core::config::LoghiveConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = LoghiveConfig::load("loghive.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = LoghiveConfig::parse("[queue]\npartitions = 8")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LoghiveError};

/// 배치 크기 상한
const MAX_BATCH_SIZE: usize = 100_000;

/// 인덱스 이름에 쓸 수 없는 문자
const FORBIDDEN_INDEX_CHARS: &[char] = &[' ', '*', '?', '"', '<', '>', '|', ',', '#', '\\', '/'];

/// loghive 통합 설정
///
/// `loghive.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 구성요소는 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoghiveConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 메시지 큐 / 컨슈머 설정
    #[serde(default)]
    pub queue: QueueConfig,
    /// 장치-규칙 해석 캐시 설정
    #[serde(default)]
    pub cache: CacheConfig,
    /// 검색 클러스터 설정
    #[serde(default)]
    pub search: SearchConfig,
    /// 분산 락 설정
    #[serde(default)]
    pub lock: LockConfig,
    /// 레코드 ID 카운터 설정
    #[serde(default)]
    pub counter: CounterConfig,
    /// 장치 인벤토리 (관계형 저장소) 설정
    #[serde(default)]
    pub inventory: InventoryConfig,
    /// syslog 수집기 설정
    #[serde(default)]
    pub collector: CollectorConfig,
    /// Prometheus 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl LoghiveConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LoghiveError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LoghiveError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LoghiveError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LoghiveError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LoghiveError> {
        toml::from_str(toml_str).map_err(|e| {
            LoghiveError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOGHIVE_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LOGHIVE_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGHIVE_GENERAL_LOG_FORMAT");

        // Queue
        override_string(&mut self.queue.backend, "LOGHIVE_QUEUE_BACKEND");
        override_string(&mut self.queue.brokers, "LOGHIVE_QUEUE_BROKERS");
        override_string(&mut self.queue.topic, "LOGHIVE_QUEUE_TOPIC");
        override_string(&mut self.queue.group_id, "LOGHIVE_QUEUE_GROUP_ID");
        override_usize(&mut self.queue.partitions, "LOGHIVE_QUEUE_PARTITIONS");
        override_usize(&mut self.queue.batch_size, "LOGHIVE_QUEUE_BATCH_SIZE");
        override_u64(&mut self.queue.poll_timeout_ms, "LOGHIVE_QUEUE_POLL_TIMEOUT_MS");
        override_u64(&mut self.queue.backoff_initial_ms, "LOGHIVE_QUEUE_BACKOFF_INITIAL_MS");
        override_u64(&mut self.queue.backoff_max_ms, "LOGHIVE_QUEUE_BACKOFF_MAX_MS");

        // Cache
        override_string(&mut self.cache.backend, "LOGHIVE_CACHE_BACKEND");
        override_string(&mut self.cache.url, "LOGHIVE_CACHE_URL");
        override_string(&mut self.cache.key_prefix, "LOGHIVE_CACHE_KEY_PREFIX");
        override_u64(&mut self.cache.ttl_secs, "LOGHIVE_CACHE_TTL_SECS");

        // Search
        override_string(&mut self.search.backend, "LOGHIVE_SEARCH_BACKEND");
        override_string(&mut self.search.url, "LOGHIVE_SEARCH_URL");
        override_string(&mut self.search.index_prefix, "LOGHIVE_SEARCH_INDEX_PREFIX");
        override_u64(&mut self.search.request_timeout_secs, "LOGHIVE_SEARCH_REQUEST_TIMEOUT_SECS");

        // Lock
        override_u64(&mut self.lock.expiry_ms, "LOGHIVE_LOCK_EXPIRY_MS");
        override_u64(&mut self.lock.poll_interval_ms, "LOGHIVE_LOCK_POLL_INTERVAL_MS");

        // Counter
        override_u64(&mut self.counter.refresh_ceiling, "LOGHIVE_COUNTER_REFRESH_CEILING");

        // Inventory
        override_string(&mut self.inventory.path, "LOGHIVE_INVENTORY_PATH");

        // Collector
        override_bool(&mut self.collector.enabled, "LOGHIVE_COLLECTOR_ENABLED");
        override_string(&mut self.collector.bind, "LOGHIVE_COLLECTOR_BIND");

        // Metrics
        override_bool(&mut self.metrics.enabled, "LOGHIVE_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "LOGHIVE_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "LOGHIVE_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LoghiveError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        let valid_queue_backends = ["kafka", "memory"];
        if !valid_queue_backends.contains(&self.queue.backend.as_str()) {
            return Err(invalid(
                "queue.backend",
                format!("must be one of: {}", valid_queue_backends.join(", ")),
            ));
        }

        if self.queue.backend == "kafka" {
            for (field, value) in [
                ("queue.brokers", &self.queue.brokers),
                ("queue.topic", &self.queue.topic),
                ("queue.group_id", &self.queue.group_id),
            ] {
                if value.is_empty() {
                    return Err(invalid(field, "must not be empty for the kafka backend"));
                }
            }
        }

        if self.queue.partitions == 0 {
            return Err(invalid("queue.partitions", "must be greater than 0"));
        }

        if self.queue.batch_size == 0 || self.queue.batch_size > MAX_BATCH_SIZE {
            return Err(invalid(
                "queue.batch_size",
                format!("must be 1-{MAX_BATCH_SIZE}"),
            ));
        }

        if self.queue.poll_timeout_ms == 0 {
            return Err(invalid("queue.poll_timeout_ms", "must be greater than 0"));
        }

        if self.queue.backoff_initial_ms == 0
            || self.queue.backoff_max_ms < self.queue.backoff_initial_ms
        {
            return Err(invalid(
                "queue.backoff_max_ms",
                "backoff must be positive and max must not be below initial",
            ));
        }

        let valid_cache_backends = ["redis", "memory"];
        if !valid_cache_backends.contains(&self.cache.backend.as_str()) {
            return Err(invalid(
                "cache.backend",
                format!("must be one of: {}", valid_cache_backends.join(", ")),
            ));
        }

        if self.cache.backend == "redis" && self.cache.url.is_empty() {
            return Err(invalid("cache.url", "must not be empty for the redis backend"));
        }

        if self.cache.key_prefix.is_empty() {
            return Err(invalid("cache.key_prefix", "must not be empty"));
        }

        if self.cache.ttl_secs == 0 {
            return Err(invalid("cache.ttl_secs", "must be greater than 0"));
        }

        let valid_backends = ["http", "memory"];
        if !valid_backends.contains(&self.search.backend.as_str()) {
            return Err(invalid(
                "search.backend",
                format!("must be one of: {}", valid_backends.join(", ")),
            ));
        }

        if self.search.backend == "http" && self.search.url.is_empty() {
            return Err(invalid("search.url", "must not be empty for the http backend"));
        }

        validate_index_prefix(&self.search.index_prefix)?;

        if self.lock.expiry_ms == 0 {
            return Err(invalid("lock.expiry_ms", "must be greater than 0"));
        }

        if self.lock.poll_interval_ms == 0 || self.lock.poll_interval_ms > self.lock.expiry_ms {
            return Err(invalid(
                "lock.poll_interval_ms",
                "must be greater than 0 and not exceed lock.expiry_ms",
            ));
        }

        if self.counter.refresh_ceiling == 0 || self.counter.refresh_ceiling > MAX_REFRESH_CEILING
        {
            return Err(invalid(
                "counter.refresh_ceiling",
                format!("must be between 1 and {MAX_REFRESH_CEILING}"),
            ));
        }

        if self.inventory.path.is_empty() {
            return Err(invalid("inventory.path", "must not be empty"));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> LoghiveError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// 인덱스 접두사 검증: 소문자, 금지 문자 없음, `-`/`_`/`+`로 시작하지 않음
fn validate_index_prefix(prefix: &str) -> Result<(), LoghiveError> {
    if prefix.is_empty() {
        return Err(invalid("search.index_prefix", "must not be empty"));
    }
    if prefix.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(invalid("search.index_prefix", "must be lowercase"));
    }
    if prefix.contains(FORBIDDEN_INDEX_CHARS) {
        return Err(invalid(
            "search.index_prefix",
            format!("must not contain any of {FORBIDDEN_INDEX_CHARS:?}"),
        ));
    }
    if prefix.starts_with(['-', '_', '+']) {
        return Err(invalid(
            "search.index_prefix",
            "must not start with '-', '_' or '+'",
        ));
    }
    Ok(())
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 메시지 큐 / 컨슈머 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// 백엔드 (kafka, memory)
    ///
    /// `memory`는 프로세스가 끝나면 미커밋 메시지가 사라지므로 테스트와 단일 프로세스 실험용입니다.
    pub backend: String,
    /// 브로커 목록 (쉼표 구분)
    pub brokers: String,
    /// 토픽
    pub topic: String,
    /// 컨슈머 그룹
    pub group_id: String,
    /// 파티션 수 (= 워커 수)
    pub partitions: usize,
    /// 한 번에 꺼내는 최대 메시지 수
    pub batch_size: usize,
    /// pull 대기 시간 (밀리초)
    pub poll_timeout_ms: u64,
    /// 인프라 장애 후 첫 백오프 (밀리초)
    pub backoff_initial_ms: u64,
    /// 백오프 상한 (밀리초)
    pub backoff_max_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: "kafka".to_owned(),
            brokers: "localhost:9092".to_owned(),
            topic: "loghive-syslog".to_owned(),
            group_id: "loghive".to_owned(),
            partitions: 4,
            batch_size: 500,
            poll_timeout_ms: 1_000,
            backoff_initial_ms: 1_000,
            backoff_max_ms: 30_000,
        }
    }
}

/// 장치-규칙 해석 캐시 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// 백엔드 (redis, memory)
    ///
    /// 캐시와 분산 락, 장치 통계가 이 저장소를 공유합니다. 여러 프로세스가 락을
    /// 나눠 가지려면 `redis`여야 합니다.
    pub backend: String,
    /// Redis URL
    pub url: String,
    /// 캐시 키 접두사 (통계/락 키도 이 접두사 아래에 둡니다)
    pub key_prefix: String,
    /// 캐시 TTL (초)
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: "redis".to_owned(),
            url: "redis://127.0.0.1:6379".to_owned(),
            key_prefix: "loghive".to_owned(),
            ttl_secs: 300,
        }
    }
}

/// 검색 클러스터 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// 백엔드 (http, memory)
    pub backend: String,
    /// 클러스터 URL
    pub url: String,
    /// 인덱스/템플릿 이름 접두사
    pub index_prefix: String,
    /// 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            backend: "http".to_owned(),
            url: "http://localhost:9200".to_owned(),
            index_prefix: "loghive".to_owned(),
            request_timeout_secs: 30,
        }
    }
}

/// 분산 락 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// 자동 해제 상한 (밀리초)
    pub expiry_ms: u64,
    /// 획득 재시도 간격 (밀리초)
    pub poll_interval_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            expiry_ms: 10_000,
            poll_interval_ms: 20,
        }
    }
}

/// 카운터 순환 상한의 최대값. 레코드 ID의 10자리 순번에 들어가는 가장 큰 상한입니다.
pub const MAX_REFRESH_CEILING: u64 = 10_000_000_000;

/// 레코드 ID 카운터 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterConfig {
    /// 이 값에 도달하면 0으로 되돌아갑니다
    pub refresh_ceiling: u64,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            refresh_ceiling: MAX_REFRESH_CEILING,
        }
    }
}

/// 장치 인벤토리 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// 장치/템플릿/규칙 YAML 파일 경로
    pub path: String,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            path: "/etc/loghive/inventory.yml".to_owned(),
        }
    }
}

/// UDP syslog 수집기 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub bind: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "0.0.0.0:514".to_owned(),
        }
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 리스닝 주소
    pub listen_addr: String,
    /// 리스닝 포트
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let config = LoghiveConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.queue.partitions, 4);
        assert_eq!(config.cache.ttl_secs, 300);
        assert_eq!(config.search.index_prefix, "loghive");
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn default_config_passes_validation() {
        LoghiveConfig::default().validate().unwrap();
    }

    #[test]
    fn parse_partial_toml_merges_with_defaults() {
        let toml = r#"
[queue]
partitions = 8
batch_size = 1000

[search]
backend = "memory"
"#;
        let config = LoghiveConfig::parse(toml).unwrap();
        assert_eq!(config.queue.partitions, 8);
        assert_eq!(config.queue.batch_size, 1000);
        // 나머지는 기본값 유지
        assert_eq!(config.queue.poll_timeout_ms, 1_000);
        assert_eq!(config.search.backend, "memory");
        assert_eq!(config.search.index_prefix, "loghive");
    }

    #[test]
    fn parse_invalid_toml_returns_error() {
        let err = LoghiveConfig::parse("invalid = [[[toml").unwrap_err();
        assert!(matches!(
            err,
            LoghiveError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = LoghiveConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn validate_rejects_zero_partitions() {
        let mut config = LoghiveConfig::default();
        config.queue.partitions = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("queue.partitions"));
    }

    #[test]
    fn validate_rejects_oversized_batch() {
        let mut config = LoghiveConfig::default();
        config.queue.batch_size = MAX_BATCH_SIZE + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_cache_ttl() {
        let mut config = LoghiveConfig::default();
        config.cache.ttl_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cache.ttl_secs"));
    }

    #[test]
    fn validate_rejects_unknown_search_backend() {
        let mut config = LoghiveConfig::default();
        config.search.backend = "solr".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_backends_are_networked() {
        let config = LoghiveConfig::default();
        assert_eq!(config.queue.backend, "kafka");
        assert_eq!(config.cache.backend, "redis");
    }

    #[test]
    fn validate_rejects_unknown_queue_and_cache_backends() {
        let mut config = LoghiveConfig::default();
        config.queue.backend = "rabbitmq".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("queue.backend"));

        let mut config = LoghiveConfig::default();
        config.cache.backend = "memcached".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cache.backend"));
    }

    #[test]
    fn validate_requires_kafka_topic_only_for_kafka() {
        let mut config = LoghiveConfig::default();
        config.queue.topic = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("queue.topic"));

        config.queue.backend = "memory".to_owned();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_requires_redis_url_only_for_redis() {
        let mut config = LoghiveConfig::default();
        config.cache.url = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cache.url"));

        config.cache.backend = "memory".to_owned();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_index_prefix() {
        for prefix in ["", "Loghive", "log hive", "_loghive", "log*"] {
            let mut config = LoghiveConfig::default();
            config.search.index_prefix = prefix.to_owned();
            assert!(config.validate().is_err(), "prefix {prefix:?} should be rejected");
        }
    }

    #[test]
    fn validate_rejects_poll_interval_above_expiry() {
        let mut config = LoghiveConfig::default();
        config.lock.poll_interval_ms = config.lock.expiry_ms + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_counter_ceiling() {
        let mut config = LoghiveConfig::default();
        config.counter.refresh_ceiling = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_bounds_counter_ceiling_to_sequence_width() {
        let mut config = LoghiveConfig::default();
        config.counter.refresh_ceiling = MAX_REFRESH_CEILING;
        assert!(config.validate().is_ok());

        config.counter.refresh_ceiling = MAX_REFRESH_CEILING + 1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("counter.refresh_ceiling"));
    }

    #[test]
    fn env_override_missing_var_keeps_original() {
        let mut val = "original".to_owned();
        override_string(&mut val, "TEST_LOGHIVE_NONEXISTENT_12345");
        assert_eq!(val, "original");
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = LoghiveConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = LoghiveConfig::parse(&toml_str).unwrap();
        assert_eq!(config.queue.batch_size, parsed.queue.batch_size);
        assert_eq!(config.counter.refresh_ceiling, parsed.counter.refresh_ceiling);
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let err = LoghiveConfig::from_file("/nonexistent/path/loghive.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LoghiveError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}

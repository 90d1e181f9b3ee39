//! 로그 파이프라인 설정
//!
//! [`PipelineConfig`]는 core의 [`LoghiveConfig`]에서 파이프라인이 쓰는 값만 골라
//! `Duration` 등 실행 시 타입으로 변환한 설정입니다.
//!
//! # 사용 예시
//! ```ignore
//! use loghive_core::config::LoghiveConfig;
//! use loghive_pipeline::config::PipelineConfig;
//!
//! let core_config = LoghiveConfig::default();
//! let config = PipelineConfig::from_core(&core_config);
//! ```

use std::time::Duration;

use loghive_core::config::{LoghiveConfig, MAX_REFRESH_CEILING};

use crate::error::LogPipelineError;

/// 배치 크기 상한
const MAX_BATCH_SIZE: usize = 100_000;

/// 파티션 수 상한 (레코드 ID의 워커 자리수)
const MAX_PARTITIONS: usize = 1000;

/// 로그 파이프라인 설정
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// 큐 백엔드 ("kafka" | "memory")
    pub queue_backend: String,
    /// Kafka 브로커 목록
    pub queue_brokers: String,
    /// Kafka 토픽
    pub queue_topic: String,
    /// Kafka 컨슈머 그룹
    pub queue_group_id: String,
    /// 파티션 수 (= 워커 수)
    pub partitions: usize,
    /// 한 번에 꺼내는 최대 메시지 수
    pub batch_size: usize,
    /// 큐 pull 대기 시간
    pub poll_timeout: Duration,
    /// 인프라 장애 후 첫 백오프
    pub backoff_initial: Duration,
    /// 백오프 상한
    pub backoff_max: Duration,

    /// KV 백엔드 ("redis" | "memory")
    pub cache_backend: String,
    /// Redis URL
    pub cache_url: String,
    /// 캐시/락/통계 키 접두사
    pub key_prefix: String,
    /// 해석 캐시 TTL
    pub cache_ttl: Duration,

    /// 검색 백엔드 ("http" | "memory")
    pub search_backend: String,
    /// 검색 클러스터 URL
    pub search_url: String,
    /// 인덱스/템플릿 이름 접두사
    pub index_prefix: String,
    /// 검색 요청 타임아웃
    pub search_timeout: Duration,

    /// 락 만료 시간
    pub lock_expiry: Duration,
    /// 락 폴링 간격
    pub lock_poll_interval: Duration,

    /// 레코드 순번 카운터 순환 상한 (1 ..= [`MAX_REFRESH_CEILING`])
    pub refresh_ceiling: u64,

    /// 인벤토리 파일 경로
    pub inventory_path: String,

    /// UDP 수집기 활성화 여부
    pub collector_enabled: bool,
    /// UDP 수집기 바인드 주소
    pub collector_bind: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_core(&LoghiveConfig::default())
    }
}

impl PipelineConfig {
    /// core 설정에서 파이프라인 설정을 생성합니다.
    pub fn from_core(core: &LoghiveConfig) -> Self {
        Self {
            queue_backend: core.queue.backend.clone(),
            queue_brokers: core.queue.brokers.clone(),
            queue_topic: core.queue.topic.clone(),
            queue_group_id: core.queue.group_id.clone(),
            partitions: core.queue.partitions,
            batch_size: core.queue.batch_size,
            poll_timeout: Duration::from_millis(core.queue.poll_timeout_ms),
            backoff_initial: Duration::from_millis(core.queue.backoff_initial_ms),
            backoff_max: Duration::from_millis(core.queue.backoff_max_ms),
            cache_backend: core.cache.backend.clone(),
            cache_url: core.cache.url.clone(),
            key_prefix: core.cache.key_prefix.clone(),
            cache_ttl: Duration::from_secs(core.cache.ttl_secs),
            search_backend: core.search.backend.clone(),
            search_url: core.search.url.clone(),
            index_prefix: core.search.index_prefix.clone(),
            search_timeout: Duration::from_secs(core.search.request_timeout_secs),
            lock_expiry: Duration::from_millis(core.lock.expiry_ms),
            lock_poll_interval: Duration::from_millis(core.lock.poll_interval_ms),
            refresh_ceiling: core.counter.refresh_ceiling,
            inventory_path: core.inventory.path.clone(),
            collector_enabled: core.collector.enabled,
            collector_bind: core.collector.bind.clone(),
        }
    }

    /// 빌더를 생성합니다.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::new()
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        match self.queue_backend.as_str() {
            "memory" => {}
            "kafka" => {
                if self.queue_brokers.is_empty() || self.queue_topic.is_empty() {
                    return Err(config_error(
                        "queue_topic",
                        "brokers and topic are required for the kafka backend",
                    ));
                }
                if self.queue_group_id.is_empty() {
                    return Err(config_error("queue_group_id", "must not be empty"));
                }
            }
            other => {
                return Err(config_error(
                    "queue_backend",
                    format!("unknown backend '{other}'"),
                ));
            }
        }

        match self.cache_backend.as_str() {
            "memory" => {}
            "redis" if self.cache_url.is_empty() => {
                return Err(config_error("cache_url", "must not be empty"));
            }
            "redis" => {}
            other => {
                return Err(config_error(
                    "cache_backend",
                    format!("unknown backend '{other}'"),
                ));
            }
        }

        if self.partitions == 0 || self.partitions > MAX_PARTITIONS {
            return Err(config_error(
                "partitions",
                format!("must be 1-{MAX_PARTITIONS}"),
            ));
        }

        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(config_error(
                "batch_size",
                format!("must be 1-{MAX_BATCH_SIZE}"),
            ));
        }

        if self.poll_timeout.is_zero() {
            return Err(config_error("poll_timeout", "must be greater than 0"));
        }

        if self.backoff_initial.is_zero() || self.backoff_initial > self.backoff_max {
            return Err(config_error(
                "backoff_initial",
                "must be greater than 0 and not exceed backoff_max",
            ));
        }

        if self.key_prefix.is_empty() {
            return Err(config_error("key_prefix", "must not be empty"));
        }

        if self.cache_ttl.is_zero() {
            return Err(config_error("cache_ttl", "must be greater than 0"));
        }

        if self.index_prefix.is_empty() {
            return Err(config_error("index_prefix", "must not be empty"));
        }

        if self.lock_expiry.is_zero() {
            return Err(config_error("lock_expiry", "must be greater than 0"));
        }

        if self.lock_poll_interval.is_zero() || self.lock_poll_interval > self.lock_expiry {
            return Err(config_error(
                "lock_poll_interval",
                "must be greater than 0 and not exceed lock_expiry",
            ));
        }

        if self.refresh_ceiling == 0 || self.refresh_ceiling > MAX_REFRESH_CEILING {
            return Err(config_error(
                "refresh_ceiling",
                format!("must be between 1 and {MAX_REFRESH_CEILING}"),
            ));
        }

        Ok(())
    }
}

fn config_error(field: &str, reason: impl Into<String>) -> LogPipelineError {
    LogPipelineError::Config {
        field: field.to_owned(),
        reason: reason.into(),
    }
}

/// 파이프라인 설정 빌더
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 큐 백엔드를 설정합니다.
    pub fn queue_backend(mut self, backend: impl Into<String>) -> Self {
        self.config.queue_backend = backend.into();
        self
    }

    /// Kafka 연결 정보를 설정합니다.
    pub fn kafka(
        mut self,
        brokers: impl Into<String>,
        topic: impl Into<String>,
        group_id: impl Into<String>,
    ) -> Self {
        self.config.queue_brokers = brokers.into();
        self.config.queue_topic = topic.into();
        self.config.queue_group_id = group_id.into();
        self
    }

    /// KV 백엔드를 설정합니다.
    pub fn cache_backend(mut self, backend: impl Into<String>) -> Self {
        self.config.cache_backend = backend.into();
        self
    }

    /// Redis URL을 설정합니다.
    pub fn cache_url(mut self, url: impl Into<String>) -> Self {
        self.config.cache_url = url.into();
        self
    }

    /// 파티션 수를 설정합니다.
    pub fn partitions(mut self, partitions: usize) -> Self {
        self.config.partitions = partitions;
        self
    }

    /// 배치 크기를 설정합니다.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    /// pull 대기 시간을 설정합니다.
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.config.poll_timeout = timeout;
        self
    }

    /// 백오프 범위를 설정합니다.
    pub fn backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.config.backoff_initial = initial;
        self.config.backoff_max = max;
        self
    }

    /// 키 접두사를 설정합니다.
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.key_prefix = prefix.into();
        self
    }

    /// 해석 캐시 TTL을 설정합니다.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache_ttl = ttl;
        self
    }

    /// 검색 백엔드를 설정합니다.
    pub fn search_backend(mut self, backend: impl Into<String>) -> Self {
        self.config.search_backend = backend.into();
        self
    }

    /// 인덱스 접두사를 설정합니다.
    pub fn index_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.index_prefix = prefix.into();
        self
    }

    /// 락 만료 시간과 폴링 간격을 설정합니다.
    pub fn lock(mut self, expiry: Duration, poll_interval: Duration) -> Self {
        self.config.lock_expiry = expiry;
        self.config.lock_poll_interval = poll_interval;
        self
    }

    /// 카운터 순환 상한을 설정합니다.
    pub fn refresh_ceiling(mut self, ceiling: u64) -> Self {
        self.config.refresh_ceiling = ceiling;
        self
    }

    /// 설정을 검증하고 `PipelineConfig`를 생성합니다.
    pub fn build(self) -> Result<PipelineConfig, LogPipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

//! 외부 협력자 구현
//!
//! - [`memory`]: 인메모리 키-값 저장소, 장치 저장소, 검색 인덱스, 메시지 큐
//! - [`http`]: REST 기반 검색 클러스터 클라이언트
//! - [`kafka`]: Kafka 메시지 큐
//! - [`redis`](self::redis): Redis 키-값 저장소
//!
//! 협력자 trait은 `impl Future`를 반환하므로 trait 객체로 쓸 수 없습니다.
//! 설정으로 구현을 고르는 경우 [`SearchBackend`], [`QueueBackend`], [`KvBackend`]처럼
//! 열거형으로 감쌉니다.

pub mod http;
pub mod kafka;
pub mod memory;
pub mod redis;

pub use self::redis::RedisKvStore;
pub use http::HttpSearchIndex;
pub use kafka::KafkaQueue;
pub use memory::{MemoryDeviceRepository, MemoryKvStore, MemoryQueue, MemorySearchIndex};

use std::time::Duration;

use bytes::Bytes;

use loghive_core::backend::{KvStore, LogQueue, SearchIndex};
use loghive_core::error::StoreError;
use loghive_core::types::{BulkDocument, BulkSummary, IndexTemplate, QueueMessage};

use crate::config::PipelineConfig;
use crate::error::LogPipelineError;

/// 설정으로 선택되는 검색 클러스터 구현
#[derive(Debug)]
pub enum SearchBackend {
    /// REST 클러스터
    Http(HttpSearchIndex),
    /// 프로세스 내부 인덱스
    Memory(MemorySearchIndex),
}

impl SearchBackend {
    /// `search.backend` 설정에 따라 구현을 생성합니다.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, LogPipelineError> {
        match config.search_backend.as_str() {
            "http" => Ok(Self::Http(HttpSearchIndex::new(
                &config.search_url,
                config.search_timeout,
            )?)),
            "memory" => Ok(Self::Memory(MemorySearchIndex::new())),
            other => Err(LogPipelineError::Config {
                field: "search.backend".to_owned(),
                reason: format!("unknown backend '{other}'"),
            }),
        }
    }
}

impl SearchIndex for SearchBackend {
    async fn put_template(&self, template: &IndexTemplate) -> Result<(), StoreError> {
        match self {
            Self::Http(index) => index.put_template(template).await,
            Self::Memory(index) => index.put_template(template).await,
        }
    }

    async fn bulk(&self, documents: Vec<BulkDocument>) -> Result<BulkSummary, StoreError> {
        match self {
            Self::Http(index) => index.bulk(documents).await,
            Self::Memory(index) => index.bulk(documents).await,
        }
    }
}

/// 키를 파티션에 배정합니다 (FNV-1a).
///
/// 프로세스나 빌드가 달라도 같은 키는 같은 파티션으로 갑니다.
pub fn partition_for_key(key: &str, partitions: usize) -> usize {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let hash = key
        .bytes()
        .fold(OFFSET_BASIS, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(PRIME));
    (hash % partitions.max(1) as u64) as usize
}

/// 설정으로 선택되는 메시지 큐 구현
#[derive(Debug)]
pub enum QueueBackend {
    /// Kafka 토픽
    Kafka(KafkaQueue),
    /// 프로세스 내부 큐
    Memory(MemoryQueue),
}

impl QueueBackend {
    /// `queue.backend` 설정에 따라 구현을 생성합니다.
    ///
    /// `kafka`는 tokio 런타임 안에서 호출해야 합니다.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, LogPipelineError> {
        match config.queue_backend.as_str() {
            "kafka" => Ok(Self::Kafka(KafkaQueue::new(config)?)),
            "memory" => Ok(Self::Memory(MemoryQueue::new(config.partitions))),
            other => Err(LogPipelineError::Config {
                field: "queue.backend".to_owned(),
                reason: format!("unknown backend '{other}'"),
            }),
        }
    }
}

impl LogQueue for QueueBackend {
    fn partitions(&self) -> usize {
        match self {
            Self::Kafka(queue) => queue.partitions(),
            Self::Memory(queue) => queue.partitions(),
        }
    }

    async fn produce(&self, key: &str, payload: Bytes) -> Result<(usize, u64), StoreError> {
        match self {
            Self::Kafka(queue) => queue.produce(key, payload).await,
            Self::Memory(queue) => queue.produce(key, payload).await,
        }
    }

    async fn pull(
        &self,
        partition: usize,
        max: usize,
        timeout: Duration,
    ) -> Result<Vec<QueueMessage>, StoreError> {
        match self {
            Self::Kafka(queue) => queue.pull(partition, max, timeout).await,
            Self::Memory(queue) => queue.pull(partition, max, timeout).await,
        }
    }

    async fn commit(&self, partition: usize, next_offset: u64) -> Result<(), StoreError> {
        match self {
            Self::Kafka(queue) => queue.commit(partition, next_offset).await,
            Self::Memory(queue) => queue.commit(partition, next_offset).await,
        }
    }

    async fn seek_to_committed(&self, partition: usize) -> Result<(), StoreError> {
        match self {
            Self::Kafka(queue) => queue.seek_to_committed(partition).await,
            Self::Memory(queue) => queue.seek_to_committed(partition).await,
        }
    }
}

/// 설정으로 선택되는 키-값 저장소 구현
#[derive(Debug)]
pub enum KvBackend {
    /// Redis 서버
    Redis(RedisKvStore),
    /// 프로세스 내부 저장소
    Memory(MemoryKvStore),
}

impl KvBackend {
    /// `cache.backend` 설정에 따라 구현을 생성합니다. `redis`는 연결까지 확인합니다.
    pub async fn from_config(config: &PipelineConfig) -> Result<Self, LogPipelineError> {
        match config.cache_backend.as_str() {
            "redis" => Ok(Self::Redis(RedisKvStore::connect(&config.cache_url).await?)),
            "memory" => Ok(Self::Memory(MemoryKvStore::new())),
            other => Err(LogPipelineError::Config {
                field: "cache.backend".to_owned(),
                reason: format!("unknown backend '{other}'"),
            }),
        }
    }
}

impl KvStore for KvBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self {
            Self::Redis(kv) => kv.get(key).await,
            Self::Memory(kv) => kv.get(key).await,
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        match self {
            Self::Redis(kv) => kv.set_ex(key, value, ttl).await,
            Self::Memory(kv) => kv.set_ex(key, value, ttl).await,
        }
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        match self {
            Self::Redis(kv) => kv.set_nx_ex(key, value, ttl).await,
            Self::Memory(kv) => kv.set_nx_ex(key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self {
            Self::Redis(kv) => kv.delete(key).await,
            Self::Memory(kv) => kv.delete(key).await,
        }
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        match self {
            Self::Redis(kv) => kv.compare_and_delete(key, expected).await,
            Self::Memory(kv) => kv.compare_and_delete(key, expected).await,
        }
    }

    async fn compare_and_expire(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        match self {
            Self::Redis(kv) => kv.compare_and_expire(key, expected, ttl).await,
            Self::Memory(kv) => kv.compare_and_expire(key, expected, ttl).await,
        }
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, StoreError> {
        match self {
            Self::Redis(kv) => kv.delete_prefix(prefix).await,
            Self::Memory(kv) => kv.delete_prefix(prefix).await,
        }
    }

    async fn incr_by(
        &self,
        key: &str,
        delta: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, StoreError> {
        match self {
            Self::Redis(kv) => kv.incr_by(key, delta, ttl).await,
            Self::Memory(kv) => kv.incr_by(key, delta, ttl).await,
        }
    }
}

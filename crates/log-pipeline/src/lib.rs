#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`parser`]: 공유 syslog 헤더 추출
//! - [`resolve`]: `(IP, facility)` → 장치/규칙 해석 캐시와 YAML 인벤토리 저장소
//! - [`rule`]: 규칙 ID로 키가 잡힌 정규식 캐시
//! - [`schema`]: 로그 분류별 필드 스키마, 인덱스 템플릿, 일별 인덱스 이름
//! - [`record`]: 성공/실패 레코드와 벌크 문서 변환
//! - [`processor`]: 라인 단위 처리 상태 머신
//! - [`consumer`]: 파티션 워커 (pull → 처리 → bulk → commit)
//! - [`pipeline`]: 워커 생명주기 (Pipeline trait 구현)
//! - [`counter`]: 순환형 카운터 (레코드 순번, 진단)
//! - [`lock`]: 키-값 저장소 기반 분산 락
//! - [`audit`]: 중복 억제 감사 로그
//! - [`stats`]: 장치별 누적/일별 레코드 수
//! - [`collector`]: UDP syslog 수집기
//! - [`backend`]: 인메모리/HTTP/Kafka/Redis 협력자 구현
//! - [`config`]: 파이프라인 설정 (core 설정에서 변환)
//! - [`error`]: 도메인 에러 타입

pub mod audit;
pub mod backend;
pub mod collector;
pub mod config;
pub mod consumer;
pub mod counter;
pub mod error;
pub mod lock;
pub mod parser;
pub mod pipeline;
pub mod processor;
pub mod record;
pub mod resolve;
pub mod rule;
pub mod schema;
pub mod stats;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{LogPipeline, LogPipelineBuilder, PipelineStats};

// 설정
pub use config::{PipelineConfig, PipelineConfigBuilder};

// 에러
pub use error::LogPipelineError;

// 처리
pub use consumer::{Backoff, BatchReport, PartitionWorker, WorkerHealth, WorkerResources};
pub use processor::{DiscardReason, LineOutcome, LogProcessor, ProcessingContext};
pub use record::{FailedRecord, FailureReason, LogRecord, ParsedRecord, RecordBase};

// 해석/규칙/스키마
pub use parser::{HeaderParser, SyslogHeader};
pub use resolve::{InventoryRepository, Resolution, ResolutionCache, ResolveError};
pub use rule::RuleRegexCache;
pub use schema::{SchemaDescriptor, SchemaRegistry};

// 부가 서비스
pub use audit::{AuditEvent, AuditLogger};
pub use counter::{CounterSet, SharedCounterRegistry};
pub use lock::{DistributedLock, LockOptions};
pub use stats::DeviceStats;

// 백엔드/수집기
pub use backend::{
    HttpSearchIndex, KafkaQueue, KvBackend, MemoryDeviceRepository, MemoryKvStore, MemoryQueue,
    MemorySearchIndex, QueueBackend, RedisKvStore, SearchBackend,
};
pub use collector::{SyslogUdpCollector, SyslogUdpConfig};

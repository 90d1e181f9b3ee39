//! 파이프라인 오케스트레이션 -- 파티션 워커의 생명주기를 관리합니다.
//!
//! [`LogPipeline`]은 core의 [`Pipeline`](loghive_core::pipeline::Pipeline) trait을 구현하여
//! `loghive-daemon`에서 start/stop/health_check로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//!                 ┌─▶ PartitionWorker(0) ─┐
//! LogQueue ───────┼─▶ PartitionWorker(1) ─┼─▶ SearchIndex (bulk)
//!                 └─▶ PartitionWorker(n) ─┘
//!                          │
//!        ProcessingContext (헤더 파서, 해석 캐시, 정규식 캐시, 스키마) 공유
//! ```

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use loghive_core::backend::{DeviceRepository, KvStore, LogQueue, SearchIndex};
use loghive_core::error::{LoghiveError, PipelineError};
use loghive_core::pipeline::{HealthStatus, Pipeline};

use crate::config::PipelineConfig;
use crate::consumer::{
    Backoff, DISCARDED_SCOPE, DROPPED_SCOPE, PROCESSED_SCOPE, PartitionWorker, STORED_SCOPE,
    WorkerHealth, WorkerResources,
};
use crate::counter::SharedCounterRegistry;
use crate::error::LogPipelineError;
use crate::parser::HeaderParser;
use crate::processor::{LogProcessor, ProcessingContext};
use crate::resolve::ResolutionCache;
use crate::rule::RuleRegexCache;
use crate::schema::SchemaRegistry;
use crate::stats::DeviceStats;

/// 파이프라인 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 워커 진단 카운터 합계
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// 처리한 라인 수
    pub processed: u64,
    /// 저장한 레코드 수 (성공 + 실패)
    pub stored: u64,
    /// 폐기한 라인 수
    pub discarded: u64,
    /// 예기치 않은 에러로 버린 라인 수
    pub dropped: u64,
    /// (워커, 스코프, 값) 목록
    pub per_worker: Vec<(usize, String, u64)>,
}

/// 로그 파이프라인
///
/// # 사용 예시
/// ```ignore
/// use loghive_pipeline::LogPipeline;
///
/// let mut pipeline = LogPipeline::builder(config)
///     .repository(repo)
///     .kv(kv)
///     .search(search)
///     .queue(queue)
///     .build()?;
///
/// pipeline.start().await?;
/// ```
pub struct LogPipeline<R, K, S, Q> {
    config: PipelineConfig,
    state: PipelineState,
    context: Arc<ProcessingContext<R, K>>,
    resources: WorkerResources<K, S, Q>,
    health: Vec<Arc<WorkerHealth>>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl<R, K, S, Q> LogPipeline<R, K, S, Q>
where
    R: DeviceRepository,
    K: KvStore,
    S: SearchIndex,
    Q: LogQueue,
{
    /// 파이프라인 빌더를 생성합니다.
    pub fn builder(config: PipelineConfig) -> LogPipelineBuilder<R, K, S, Q> {
        LogPipelineBuilder::new(config)
    }

    /// 현재 상태를 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 스키마 레지스트리를 반환합니다.
    pub fn schemas(&self) -> &Arc<SchemaRegistry> {
        &self.resources.schemas
    }

    /// 장치별 통계를 반환합니다.
    pub fn device_stats(&self) -> &Arc<DeviceStats<K>> {
        &self.resources.stats
    }

    /// 실행 중인 워커 수를 반환합니다.
    pub fn worker_count(&self) -> usize {
        self.tasks.len()
    }

    /// 해석 캐시와 규칙 정규식 캐시를 비우고, 삭제된 해석 캐시 키 수를 반환합니다.
    pub async fn clean_cache(&self) -> Result<usize, LogPipelineError> {
        let removed = self.context.resolver.clean().await?;
        let rules = self.context.rules.clear();
        tracing::debug!(resolutions = removed, rules, "caches cleaned");
        Ok(removed)
    }

    /// 워커 진단 카운터를 모아 반환합니다.
    pub fn stats(&self) -> PipelineStats {
        let diagnostics = &self.resources.diagnostics;
        PipelineStats {
            processed: diagnostics.total(PROCESSED_SCOPE),
            stored: diagnostics.total(STORED_SCOPE),
            discarded: diagnostics.total(DISCARDED_SCOPE),
            dropped: diagnostics.total(DROPPED_SCOPE),
            per_worker: diagnostics.snapshot(),
        }
    }
}

impl<R, K, S, Q> Pipeline for LogPipeline<R, K, S, Q>
where
    R: DeviceRepository,
    K: KvStore,
    S: SearchIndex,
    Q: LogQueue,
{
    async fn start(&mut self) -> Result<(), LoghiveError> {
        if self.state == PipelineState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        let partitions = self.resources.queue.partitions();
        if partitions != self.config.partitions {
            return Err(PipelineError::InitFailed(format!(
                "queue has {partitions} partitions, config expects {}",
                self.config.partitions
            ))
            .into());
        }

        tracing::info!(partitions, "starting log pipeline");

        self.cancel = CancellationToken::new();
        self.health = (0..partitions)
            .map(|_| Arc::new(WorkerHealth::default()))
            .collect();

        for (partition, health) in self.health.iter().enumerate() {
            let processor = LogProcessor::new(
                Arc::clone(&self.context),
                partition,
                self.config.refresh_ceiling,
            );
            let worker = PartitionWorker::new(
                processor,
                self.resources.clone(),
                Arc::clone(health),
                self.config.batch_size,
                self.config.poll_timeout,
                Backoff::new(self.config.backoff_initial, self.config.backoff_max),
            );
            self.tasks.push(tokio::spawn(worker.run(self.cancel.clone())));
        }

        self.state = PipelineState::Running;
        tracing::info!(workers = self.tasks.len(), "log pipeline started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), LoghiveError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        tracing::info!("stopping log pipeline");
        self.cancel.cancel();

        let mut join_error = None;
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "partition worker panicked");
                join_error = Some(e.to_string());
            }
        }

        self.state = PipelineState::Stopped;
        if let Some(reason) = join_error {
            return Err(PipelineError::WorkerJoin(reason).into());
        }
        tracing::info!("log pipeline stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => {
                let backing_off: Vec<String> = self
                    .health
                    .iter()
                    .enumerate()
                    .filter(|(_, health)| health.is_backing_off())
                    .map(|(partition, _)| partition.to_string())
                    .collect();
                if self.tasks.iter().any(JoinHandle::is_finished) {
                    HealthStatus::Unhealthy("partition worker exited".to_owned())
                } else if backing_off.is_empty() {
                    HealthStatus::Healthy
                } else {
                    HealthStatus::Degraded(format!(
                        "workers backing off: {}",
                        backing_off.join(", ")
                    ))
                }
            }
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 로그 파이프라인 빌더
///
/// 네 협력자(장치 저장소, 키-값 저장소, 검색 클러스터, 큐)는 필수입니다.
/// 스키마 레지스트리를 지정하지 않으면 내장 분류로 만든 레지스트리를 사용합니다.
pub struct LogPipelineBuilder<R, K, S, Q> {
    config: PipelineConfig,
    repository: Option<Arc<R>>,
    kv: Option<Arc<K>>,
    search: Option<Arc<S>>,
    queue: Option<Arc<Q>>,
    schemas: Option<Arc<SchemaRegistry>>,
}

impl<R, K, S, Q> LogPipelineBuilder<R, K, S, Q>
where
    R: DeviceRepository,
    K: KvStore,
    S: SearchIndex,
    Q: LogQueue,
{
    /// 새 빌더를 생성합니다.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            repository: None,
            kv: None,
            search: None,
            queue: None,
            schemas: None,
        }
    }

    /// 장치 저장소를 설정합니다.
    pub fn repository(mut self, repository: Arc<R>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// 키-값 저장소를 설정합니다.
    pub fn kv(mut self, kv: Arc<K>) -> Self {
        self.kv = Some(kv);
        self
    }

    /// 검색 클러스터를 설정합니다.
    pub fn search(mut self, search: Arc<S>) -> Self {
        self.search = Some(search);
        self
    }

    /// 메시지 큐를 설정합니다.
    pub fn queue(mut self, queue: Arc<Q>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// 스키마 레지스트리를 설정합니다.
    pub fn schemas(mut self, schemas: Arc<SchemaRegistry>) -> Self {
        self.schemas = Some(schemas);
        self
    }

    /// 파이프라인을 빌드합니다.
    pub fn build(self) -> Result<LogPipeline<R, K, S, Q>, LogPipelineError> {
        self.config.validate()?;

        let repository = self.repository.ok_or_else(|| missing("repository"))?;
        let kv = self.kv.ok_or_else(|| missing("kv"))?;
        let search = self.search.ok_or_else(|| missing("search"))?;
        let queue = self.queue.ok_or_else(|| missing("queue"))?;
        let schemas = match self.schemas {
            Some(schemas) => schemas,
            None => Arc::new(
                SchemaRegistry::builder(self.config.index_prefix.clone())
                    .with_builtin()?
                    .build(),
            ),
        };

        let context = Arc::new(ProcessingContext {
            header: HeaderParser::new()?,
            resolver: ResolutionCache::new(
                repository,
                Arc::clone(&kv),
                self.config.key_prefix.clone(),
                self.config.cache_ttl,
            ),
            rules: RuleRegexCache::new(),
            schemas: Arc::clone(&schemas),
        });

        let resources = WorkerResources {
            queue,
            search,
            schemas,
            stats: Arc::new(DeviceStats::new(kv, self.config.key_prefix.clone())),
            diagnostics: Arc::new(SharedCounterRegistry::new(Some(self.config.refresh_ceiling))),
        };

        Ok(LogPipeline {
            config: self.config,
            state: PipelineState::Initialized,
            context,
            resources,
            health: Vec::new(),
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        })
    }
}

fn missing(collaborator: &str) -> LogPipelineError {
    LogPipelineError::Config {
        field: collaborator.to_owned(),
        reason: "collaborator not provided".to_owned(),
    }
}

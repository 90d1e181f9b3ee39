//! 파티션 컨슈머 워커
//!
//! 큐 파티션 하나를 전담하는 워커입니다. 워커끼리는 순서를 위해 서로 잠그지 않습니다.
//!
//! ```text
//! loop:
//!   pull(batch_size, poll_timeout)
//!     └─▶ 라인 분리 ─▶ LogProcessor ─▶ Stored / Discarded
//!   bulk(documents) ─▶ commit(last offset + 1) ─▶ DeviceStats
//!
//! 인프라 장애: 커밋하지 않음 ─▶ seek_to_committed ─▶ 백오프 ─▶ 다시 pull
//! ```
//!
//! 벌크 쓰기가 성공한 뒤에만 커밋하므로 쓰기 경로는 at-least-once입니다.
//! 재전달된 배치는 새 레코드 ID를 받으므로 중복 문서가 생길 수 있습니다.

use std::borrow::Cow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use tokio_util::sync::CancellationToken;

use loghive_core::backend::{DeviceRepository, KvStore, LogQueue, SearchIndex};
use loghive_core::metrics as m;

use crate::counter::SharedCounterRegistry;
use crate::error::LogPipelineError;
use crate::parser::split_lines;
use crate::processor::{LineOutcome, LogProcessor};
use crate::record::LogRecord;
use crate::schema::SchemaRegistry;
use crate::stats::DeviceStats;

/// 진단 카운터 스코프: 꺼낸 라인 수
pub const PROCESSED_SCOPE: &str = "processed";
/// 진단 카운터 스코프: 저장된 레코드 수
pub const STORED_SCOPE: &str = "stored";
/// 진단 카운터 스코프: 폐기된 라인 수
pub const DISCARDED_SCOPE: &str = "discarded";
/// 진단 카운터 스코프: 예기치 않은 에러로 버린 라인 수
pub const DROPPED_SCOPE: &str = "dropped";

/// 지수 백오프
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    next: Duration,
}

impl Backoff {
    /// `initial`에서 시작해 두 배씩 늘어 `max`에서 멈추는 백오프를 생성합니다.
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            next: initial,
        }
    }

    /// 이번 대기 시간을 반환하고 다음 대기 시간을 늘립니다.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = self.next.saturating_mul(2).min(self.max);
        delay
    }

    /// 첫 대기 시간으로 되돌립니다.
    pub fn reset(&mut self) {
        self.next = self.initial;
    }
}

/// 헬스 체크가 읽는 워커 상태
#[derive(Debug, Default)]
pub struct WorkerHealth {
    backing_off: AtomicBool,
    consecutive_failures: AtomicU64,
}

impl WorkerHealth {
    /// 인프라 장애로 백오프 중인지 확인합니다.
    pub fn is_backing_off(&self) -> bool {
        self.backing_off.load(Ordering::Acquire)
    }

    /// 연속 실패 횟수를 반환합니다.
    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::Acquire)
    }

    fn failed(&self) {
        self.consecutive_failures.fetch_add(1, Ordering::AcqRel);
        self.backing_off.store(true, Ordering::Release);
    }

    fn recovered(&self) {
        self.consecutive_failures.store(0, Ordering::Release);
        self.backing_off.store(false, Ordering::Release);
    }
}

/// 배치 하나의 처리 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// 꺼낸 메시지 수
    pub messages: usize,
    /// 처리한 라인 수
    pub lines: usize,
    /// 성공 레코드 수
    pub stored_success: usize,
    /// 실패 레코드 수
    pub stored_failed: usize,
    /// 폐기한 라인 수
    pub discarded: usize,
    /// 예기치 않은 에러로 버린 라인 수
    pub dropped: usize,
    /// UTF-8이 아닌 바이트를 대체 문자로 바꾼 라인 수
    pub lossy: usize,
    /// 커밋한 다음 오프셋 (빈 배치면 None)
    pub committed: Option<u64>,
}

/// 워커 간에 공유되는 협력자
pub struct WorkerResources<K, S, Q> {
    /// 메시지 큐
    pub queue: Arc<Q>,
    /// 검색 클러스터
    pub search: Arc<S>,
    /// 스키마 레지스트리 (인덱스 이름 계산)
    pub schemas: Arc<SchemaRegistry>,
    /// 장치별 통계
    pub stats: Arc<DeviceStats<K>>,
    /// 진단 카운터
    pub diagnostics: Arc<SharedCounterRegistry>,
}

impl<K, S, Q> Clone for WorkerResources<K, S, Q> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
            search: Arc::clone(&self.search),
            schemas: Arc::clone(&self.schemas),
            stats: Arc::clone(&self.stats),
            diagnostics: Arc::clone(&self.diagnostics),
        }
    }
}

/// 파티션 하나를 처리하는 워커
pub struct PartitionWorker<R, K, S, Q> {
    partition: usize,
    processor: LogProcessor<R, K>,
    resources: WorkerResources<K, S, Q>,
    health: Arc<WorkerHealth>,
    batch_size: usize,
    poll_timeout: Duration,
    backoff: Backoff,
}

impl<R, K, S, Q> PartitionWorker<R, K, S, Q>
where
    R: DeviceRepository,
    K: KvStore,
    S: SearchIndex,
    Q: LogQueue,
{
    /// 새 워커를 생성합니다. 워커 ID는 프로세서의 워커 ID(= 파티션 번호)입니다.
    pub fn new(
        processor: LogProcessor<R, K>,
        resources: WorkerResources<K, S, Q>,
        health: Arc<WorkerHealth>,
        batch_size: usize,
        poll_timeout: Duration,
        backoff: Backoff,
    ) -> Self {
        Self {
            partition: processor.worker(),
            processor,
            resources,
            health,
            batch_size,
            poll_timeout,
            backoff,
        }
    }

    /// 담당 파티션 번호를 반환합니다.
    pub fn partition(&self) -> usize {
        self.partition
    }

    /// 취소될 때까지 배치를 반복 처리합니다.
    ///
    /// 인프라 장애는 워커를 멈추지 않습니다. 커밋 지점으로 되감고 백오프 후 다시 시도합니다.
    pub async fn run(mut self, cancel: CancellationToken) {
        let partition = self.partition;
        tracing::info!(partition, "partition worker started");

        while !cancel.is_cancelled() {
            match self.run_once().await {
                Ok(_) => {
                    if self.health.is_backing_off() {
                        tracing::info!(partition, "partition worker recovered");
                    }
                    self.health.recovered();
                    self.backoff.reset();
                }
                Err(e) => {
                    self.health.failed();
                    let delay = self.backoff.next_delay();
                    tracing::warn!(
                        partition,
                        error = %e,
                        retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "batch not committed, backing off"
                    );
                    if let Err(seek_err) = self.resources.queue.seek_to_committed(partition).await
                    {
                        tracing::warn!(partition, error = %seek_err, "seek to committed offset failed");
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => break,
                    }
                }
            }
        }

        tracing::info!(partition, "partition worker stopped");
    }

    /// 배치 하나를 꺼내 처리하고 커밋합니다.
    ///
    /// `Err`는 인프라 장애이며 이 경우 아무것도 커밋되지 않습니다.
    pub async fn run_once(&mut self) -> Result<BatchReport, LogPipelineError> {
        let partition = self.partition;
        let messages = self
            .resources
            .queue
            .pull(partition, self.batch_size, self.poll_timeout)
            .await?;
        let Some(last) = messages.last() else {
            return Ok(BatchReport::default());
        };
        let next_offset = last.offset + 1;
        let started = Instant::now();

        let mut report = BatchReport {
            messages: messages.len(),
            ..BatchReport::default()
        };
        let mut records = Vec::new();
        let mut discard_reasons = Vec::new();

        for message in &messages {
            for raw in split_lines(&message.payload) {
                report.lines += 1;
                let line = String::from_utf8_lossy(raw);
                if let Cow::Owned(_) = line {
                    report.lossy += 1;
                    tracing::debug!(
                        partition,
                        offset = message.offset,
                        "invalid UTF-8 replaced, raw content is not verbatim"
                    );
                }
                match self.processor.process(&line).await {
                    Ok(LineOutcome::Stored(record)) => {
                        if record.is_success() {
                            report.stored_success += 1;
                        } else {
                            report.stored_failed += 1;
                        }
                        records.push(record);
                    }
                    Ok(LineOutcome::Discarded(reason)) => {
                        report.discarded += 1;
                        discard_reasons.push(reason.as_str());
                    }
                    Err(e) if e.is_infrastructure() => return Err(e),
                    Err(e) => {
                        report.dropped += 1;
                        tracing::warn!(
                            partition,
                            offset = message.offset,
                            error = %e,
                            "unexpected error, line dropped"
                        );
                    }
                }
            }
        }

        counter!(m::PIPELINE_LINES_PULLED_TOTAL).increment(report.lines as u64);

        if !records.is_empty() {
            self.write(&records).await?;
        }
        self.resources.queue.commit(partition, next_offset).await?;
        report.committed = Some(next_offset);

        // 커밋 이후의 통계 실패는 배치를 되돌리지 않음
        if let Err(e) = self.resources.stats.record(&records).await {
            tracing::warn!(partition, error = %e, "device statistics update failed");
        }

        self.update_diagnostics(&report);
        for reason in discard_reasons {
            counter!(m::PIPELINE_LINES_DISCARDED_TOTAL, m::LABEL_REASON => reason).increment(1);
        }
        counter!(m::PIPELINE_LINES_DROPPED_TOTAL).increment(report.dropped as u64);
        counter!(m::PIPELINE_LINES_LOSSY_TOTAL).increment(report.lossy as u64);
        histogram!(m::PIPELINE_BATCH_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        tracing::debug!(
            partition,
            lines = report.lines,
            success = report.stored_success,
            failed = report.stored_failed,
            discarded = report.discarded,
            next_offset,
            "batch committed"
        );
        Ok(report)
    }

    async fn write(&self, records: &[LogRecord]) -> Result<(), LogPipelineError> {
        let documents = records
            .iter()
            .map(|record| record.to_document(&self.resources.schemas))
            .collect();

        match self.resources.search.bulk(documents).await {
            Ok(summary) => {
                let failed = records.iter().filter(|r| !r.is_success()).count() as u64;
                let success = records.len() as u64 - failed;
                counter!(m::PIPELINE_RECORDS_STORED_TOTAL, m::LABEL_RESULT => "success")
                    .increment(success);
                counter!(m::PIPELINE_RECORDS_STORED_TOTAL, m::LABEL_RESULT => "failed")
                    .increment(failed);
                tracing::debug!(partition = self.partition, written = summary.written, "bulk write done");
                Ok(())
            }
            Err(e) => {
                counter!(m::PIPELINE_BULK_FAILURES_TOTAL, m::LABEL_PARTITION => self.partition.to_string())
                    .increment(1);
                Err(e.into())
            }
        }
    }

    fn update_diagnostics(&self, report: &BatchReport) {
        let diagnostics = &self.resources.diagnostics;
        let worker = self.partition;
        diagnostics
            .get(worker, PROCESSED_SCOPE)
            .add(report.lines as u64);
        diagnostics
            .get(worker, STORED_SCOPE)
            .add((report.stored_success + report.stored_failed) as u64);
        diagnostics
            .get(worker, DISCARDED_SCOPE)
            .add(report.discarded as u64);
        diagnostics
            .get(worker, DROPPED_SCOPE)
            .add(report.dropped as u64);
    }
}

//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 구성요소는 이 상수를 사용하여 `metrics::counter!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `loghive_`
//! - 접미어: `_total` (counter), `_seconds` (histogram), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(loghive_core::metrics::PIPELINE_LINES_PULLED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 결과 레이블 키 (success, failed)
pub const LABEL_RESULT: &str = "result";

/// 폐기 사유 레이블 키
pub const LABEL_REASON: &str = "reason";

/// 파티션 레이블 키
pub const LABEL_PARTITION: &str = "partition";

// ─── Pipeline 메트릭 ────────────────────────────────────────────────

/// 큐에서 꺼낸 로그 라인 수 (counter)
pub const PIPELINE_LINES_PULLED_TOTAL: &str = "loghive_pipeline_lines_pulled_total";

/// 저장된 레코드 수 (counter, label: result)
pub const PIPELINE_RECORDS_STORED_TOTAL: &str = "loghive_pipeline_records_stored_total";

/// 폐기된 라인 수 (counter, label: reason)
pub const PIPELINE_LINES_DISCARDED_TOTAL: &str = "loghive_pipeline_lines_discarded_total";

/// 처리 중 예기치 않은 에러로 버려진 라인 수 (counter)
pub const PIPELINE_LINES_DROPPED_TOTAL: &str = "loghive_pipeline_lines_dropped_total";

/// UTF-8이 아닌 바이트가 대체 문자로 바뀐 라인 수 (counter)
pub const PIPELINE_LINES_LOSSY_TOTAL: &str = "loghive_pipeline_lines_lossy_total";

/// 벌크 쓰기 실패 수 (counter, label: partition)
pub const PIPELINE_BULK_FAILURES_TOTAL: &str = "loghive_pipeline_bulk_failures_total";

/// 배치 처리 시간 (histogram, 초)
pub const PIPELINE_BATCH_DURATION_SECONDS: &str = "loghive_pipeline_batch_duration_seconds";

// ─── Cache / Lock 메트릭 ────────────────────────────────────────────

/// 해석 캐시 적중 수 (counter)
pub const CACHE_HITS_TOTAL: &str = "loghive_cache_hits_total";

/// 해석 캐시 미스 수 (counter)
pub const CACHE_MISSES_TOTAL: &str = "loghive_cache_misses_total";

/// 경합으로 건너뛴 락 획득 수 (counter)
pub const LOCK_SKIPPED_TOTAL: &str = "loghive_lock_skipped_total";

// ─── Collector 메트릭 ───────────────────────────────────────────────

/// 수집기가 큐에 넣은 라인 수 (counter)
pub const COLLECTOR_LINES_RECEIVED_TOTAL: &str = "loghive_collector_lines_received_total";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// 데몬 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "loghive_daemon_build_info";

/// 데몬 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "loghive_daemon_uptime_seconds";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 배치 처리 시간 히스토그램 버킷 (초)
///
/// 1ms ~ 30s 범위 (벌크 쓰기 왕복 포함)
pub const BATCH_DURATION_BUCKETS: [f64; 10] =
    [0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(
        PIPELINE_LINES_PULLED_TOTAL,
        "Total number of raw log lines pulled from the queue"
    );
    describe_counter!(
        PIPELINE_RECORDS_STORED_TOTAL,
        "Total number of records written to the search cluster, by result"
    );
    describe_counter!(
        PIPELINE_LINES_DISCARDED_TOTAL,
        "Total number of lines discarded before a device could be attributed"
    );
    describe_counter!(
        PIPELINE_LINES_DROPPED_TOTAL,
        "Total number of lines dropped after an unexpected processing error"
    );
    describe_counter!(
        PIPELINE_LINES_LOSSY_TOTAL,
        "Total number of lines whose invalid UTF-8 bytes were replaced before processing"
    );
    describe_counter!(
        PIPELINE_BULK_FAILURES_TOTAL,
        "Total number of failed bulk writes (batch left uncommitted)"
    );
    describe_histogram!(
        PIPELINE_BATCH_DURATION_SECONDS,
        "Time to process and write a single batch in seconds"
    );
    describe_counter!(CACHE_HITS_TOTAL, "Device-rule resolution cache hits");
    describe_counter!(CACHE_MISSES_TOTAL, "Device-rule resolution cache misses");
    describe_counter!(
        LOCK_SKIPPED_TOTAL,
        "Lock acquisitions skipped because the key was held (force_drop)"
    );
    describe_counter!(
        COLLECTOR_LINES_RECEIVED_TOTAL,
        "Total number of syslog lines received by the UDP collector"
    );
    describe_gauge!(DAEMON_BUILD_INFO, "Daemon build information");
    describe_gauge!(DAEMON_UPTIME_SECONDS, "Daemon uptime in seconds");
}

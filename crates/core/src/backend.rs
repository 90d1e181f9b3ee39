//! 외부 협력자 trait -- 캐시/락 저장소, 관계형 장치 저장소, 검색 클러스터, 메시지 큐
//!
//! 파이프라인은 이 trait들을 통해서만 외부 시스템에 접근합니다.
//! 운영 환경 구현과 테스트용 인메모리 구현을 같은 코드 경로로 교체할 수 있습니다.
//!
//! ```text
//!   ┌────────────────────┐
//!   │   log-pipeline     │
//!   └─┬──────┬──────┬──┬─┘
//!     │      │      │  │
//!     ▼      ▼      ▼  ▼
//!  KvStore  DeviceRepository  SearchIndex  LogQueue   (trait)
//! ```
//!
//! 모든 메서드의 에러는 [`StoreError`]이며, 호출자는 이를 인프라 장애로 취급합니다.

use std::future::Future;
use std::net::IpAddr;
use std::time::Duration;

use bytes::Bytes;

use crate::error::StoreError;
use crate::types::{BulkDocument, BulkSummary, DeviceRuleRow, Facility, IndexTemplate, QueueMessage};

/// TTL과 조건부 쓰기를 지원하는 키-값 저장소
///
/// 장치-규칙 해석 캐시, 분산 락, 장치별 통계 카운터가 공유합니다.
pub trait KvStore: Send + Sync + 'static {
    /// 키의 값을 읽습니다. 없거나 만료되었으면 None.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    /// TTL과 함께 값을 씁니다 (덮어쓰기).
    fn set_ex(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// 키가 없을 때만 TTL과 함께 값을 씁니다. 썼으면 `true`.
    fn set_nx_ex(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// 키를 삭제합니다.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// 현재 값이 `expected`와 같을 때만 삭제합니다. 삭제했으면 `true`.
    fn compare_and_delete(
        &self,
        key: &str,
        expected: &str,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// 현재 값이 `expected`와 같을 때만 TTL을 재설정합니다. 재설정했으면 `true`.
    fn compare_and_expire(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// 접두사로 시작하는 모든 키를 삭제하고 삭제 건수를 반환합니다.
    fn delete_prefix(&self, prefix: &str)
    -> impl Future<Output = Result<usize, StoreError>> + Send;

    /// 정수 값을 `delta`만큼 증가시키고 새 값을 반환합니다.
    ///
    /// 키가 없으면 0에서 시작합니다. `ttl`이 주어지면 키를 새로 만들 때 적용합니다.
    fn incr_by(
        &self,
        key: &str,
        delta: i64,
        ttl: Option<Duration>,
    ) -> impl Future<Output = Result<i64, StoreError>> + Send;
}

/// 관계형 장치 저장소 (읽기 전용)
///
/// 장치 테이블을 IP로 조회하고, 장치에 바인딩된 로그 템플릿에서
/// `facility`에 해당하는 규칙을 조인해 평탄화된 형태로 반환합니다.
pub trait DeviceRepository: Send + Sync + 'static {
    /// IP와 facility로 장치와 규칙을 조회합니다. 장치가 없으면 None.
    fn resolve(
        &self,
        ip: IpAddr,
        facility: Facility,
    ) -> impl Future<Output = Result<Option<DeviceRuleRow>, StoreError>> + Send;
}

/// 검색 클러스터
pub trait SearchIndex: Send + Sync + 'static {
    /// 인덱스 템플릿을 생성하거나 같은 이름의 템플릿을 덮어씁니다.
    fn put_template(
        &self,
        template: &IndexTemplate,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// 여러 문서를 한 번의 호출로 기록합니다.
    ///
    /// 일부 문서만 거부된 경우에도 전체를 실패로 반환합니다.
    fn bulk(
        &self,
        documents: Vec<BulkDocument>,
    ) -> impl Future<Output = Result<BulkSummary, StoreError>> + Send;
}

/// 파티션된 메시지 큐 (하나의 논리 토픽, 하나의 컨슈머 그룹)
pub trait LogQueue: Send + Sync + 'static {
    /// 파티션 수를 반환합니다.
    fn partitions(&self) -> usize;

    /// 키로 파티션을 골라 메시지를 추가하고 `(partition, offset)`을 반환합니다.
    ///
    /// 같은 키는 항상 같은 파티션으로 가므로 키 단위 순서가 유지됩니다.
    fn produce(
        &self,
        key: &str,
        payload: Bytes,
    ) -> impl Future<Output = Result<(usize, u64), StoreError>> + Send;

    /// 파티션에서 최대 `max`개의 메시지를 꺼냅니다.
    ///
    /// `timeout` 동안 메시지가 없으면 빈 배치를 반환합니다.
    fn pull(
        &self,
        partition: usize,
        max: usize,
        timeout: Duration,
    ) -> impl Future<Output = Result<Vec<QueueMessage>, StoreError>> + Send;

    /// `next_offset` 이전의 모든 메시지를 처리 완료로 커밋합니다.
    fn commit(
        &self,
        partition: usize,
        next_offset: u64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// 읽기 위치를 마지막 커밋 지점으로 되돌립니다 (미커밋 메시지 재전달).
    fn seek_to_committed(
        &self,
        partition: usize,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

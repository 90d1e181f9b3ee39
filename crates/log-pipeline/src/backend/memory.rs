//! 인메모리 백엔드
//!
//! 단일 프로세스 배포와 테스트에서 외부 저장소 대신 사용합니다.
//! TTL은 `tokio::time::Instant` 기준이므로 `tokio::time::pause()`로 제어할 수 있습니다.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Notify;
use tokio::time::Instant;

use loghive_core::backend::{DeviceRepository, KvStore, LogQueue, SearchIndex};
use loghive_core::error::StoreError;
use loghive_core::types::{
    BulkDocument, BulkSummary, DeviceIdentity, DeviceRuleRow, Facility, IndexTemplate,
    QueueMessage,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// KvStore
// =============================================================================

/// 이 횟수의 쓰기마다 만료 항목을 한 번에 정리합니다.
const SWEEP_EVERY_WRITES: usize = 1024;

#[derive(Debug, Clone)]
struct KvEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl KvEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// 만료되지 않은 항목만 반환합니다. 만료된 항목은 이 자리에서 제거합니다.
fn live_entry<'a>(
    entries: &'a mut HashMap<String, KvEntry>,
    key: &str,
    now: Instant,
) -> Option<&'a mut KvEntry> {
    if entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
        entries.remove(key);
    }
    entries.get_mut(key)
}

/// TTL을 지원하는 인메모리 키-값 저장소
///
/// 만료는 키를 읽을 때 확인하고, 남은 만료 항목은 주기적인 쓰기 시점에 정리합니다.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, KvEntry>>,
    unavailable: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryKvStore {
    /// 빈 저장소를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 장애 상태를 설정합니다. 장애 중에는 모든 연산이 실패합니다.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Release);
    }

    /// 만료되지 않은 키 수를 반환합니다.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        lock(&self.entries)
            .values()
            .filter(|entry| entry.is_live(now))
            .count()
    }

    /// 저장소가 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 만료 여부와 상관없이 보관 중인 항목 수 (정리 주기 검증용)
    pub fn retained(&self) -> usize {
        lock(&self.entries).len()
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, KvEntry>>, StoreError> {
        if self.unavailable.load(Ordering::Acquire) {
            return Err(StoreError::Kv("key-value store unavailable".to_owned()));
        }
        Ok(lock(&self.entries))
    }

    /// 쓰기용 맵을 반환합니다. 일정 횟수마다 만료 항목을 정리합니다.
    fn entries_for_write(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<String, KvEntry>>, StoreError> {
        let mut entries = self.entries()?;
        let writes = self.writes.fetch_add(1, Ordering::AcqRel) + 1;
        if writes % SWEEP_EVERY_WRITES == 0 {
            let now = Instant::now();
            entries.retain(|_, entry| entry.is_live(now));
        }
        Ok(entries)
    }
}

impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.entries()?;
        Ok(live_entry(&mut entries, key, Instant::now()).map(|entry| entry.value.clone()))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut entries = self.entries_for_write()?;
        entries.insert(
            key.to_owned(),
            KvEntry {
                value: value.to_owned(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut entries = self.entries_for_write()?;
        let now = Instant::now();
        if live_entry(&mut entries, key, now).is_some() {
            return Ok(false);
        }
        entries.insert(
            key.to_owned(),
            KvEntry {
                value: value.to_owned(),
                expires_at: Some(now + ttl),
            },
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries()?.remove(key);
        Ok(())
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries()?;
        let owned = live_entry(&mut entries, key, Instant::now())
            .is_some_and(|entry| entry.value == expected);
        if owned {
            entries.remove(key);
        }
        Ok(owned)
    }

    async fn compare_and_expire(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut entries = self.entries()?;
        let now = Instant::now();
        match live_entry(&mut entries, key, now) {
            Some(entry) if entry.value == expected => {
                entry.expires_at = Some(now + ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, StoreError> {
        let mut entries = self.entries()?;
        let now = Instant::now();
        let mut removed = 0;
        entries.retain(|key, entry| {
            if !entry.is_live(now) {
                return false;
            }
            if key.starts_with(prefix) {
                removed += 1;
                return false;
            }
            true
        });
        Ok(removed)
    }

    async fn incr_by(
        &self,
        key: &str,
        delta: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, StoreError> {
        let mut entries = self.entries_for_write()?;
        let now = Instant::now();
        match live_entry(&mut entries, key, now) {
            Some(entry) => {
                let current: i64 = entry.value.parse().map_err(|_| {
                    StoreError::Kv(format!("value at '{key}' is not an integer"))
                })?;
                let next = current.saturating_add(delta);
                entry.value = next.to_string();
                Ok(next)
            }
            None => {
                entries.insert(
                    key.to_owned(),
                    KvEntry {
                        value: delta.to_string(),
                        expires_at: ttl.map(|ttl| now + ttl),
                    },
                );
                Ok(delta)
            }
        }
    }
}

// =============================================================================
// DeviceRepository
// =============================================================================

/// 고정된 행을 반환하는 인메모리 장치 저장소
///
/// 조회 횟수를 세므로 캐시 적중 여부를 검증할 수 있습니다.
#[derive(Debug, Default)]
pub struct MemoryDeviceRepository {
    rows: Mutex<HashMap<(IpAddr, Facility), DeviceRuleRow>>,
    devices: Mutex<HashMap<IpAddr, DeviceRuleRow>>,
    lookups: AtomicUsize,
}

impl MemoryDeviceRepository {
    /// 빈 저장소를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 규칙이 없는 장치를 등록합니다. facility별 규칙은 [`bind_rule`](Self::bind_rule)로 추가합니다.
    pub fn insert_device(&self, ip: IpAddr, device: DeviceIdentity) {
        lock(&self.devices).insert(ip, DeviceRuleRow { device, rule: None });
    }

    /// 장치의 facility에 행 전체(장치 + 규칙)를 지정합니다.
    pub fn bind_rule(&self, ip: IpAddr, facility: Facility, row: DeviceRuleRow) {
        lock(&self.devices).entry(ip).or_insert_with(|| DeviceRuleRow {
            device: row.device.clone(),
            rule: None,
        });
        lock(&self.rows).insert((ip, facility), row);
    }

    /// 지금까지의 조회 횟수를 반환합니다.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::Acquire)
    }
}

impl DeviceRepository for MemoryDeviceRepository {
    async fn resolve(
        &self,
        ip: IpAddr,
        facility: Facility,
    ) -> Result<Option<DeviceRuleRow>, StoreError> {
        self.lookups.fetch_add(1, Ordering::AcqRel);
        if let Some(row) = lock(&self.rows).get(&(ip, facility)) {
            return Ok(Some(row.clone()));
        }
        Ok(lock(&self.devices).get(&ip).cloned())
    }
}

// =============================================================================
// SearchIndex
// =============================================================================

/// 인메모리 검색 인덱스
///
/// 템플릿은 이름으로, 문서는 인덱스별로 보관합니다. 같은 ID의 문서는 덮어씁니다.
#[derive(Debug, Default)]
pub struct MemorySearchIndex {
    templates: Mutex<BTreeMap<String, IndexTemplate>>,
    documents: Mutex<BTreeMap<String, Vec<BulkDocument>>>,
    failing_bulks: AtomicUsize,
    bulk_calls: AtomicUsize,
}

impl MemorySearchIndex {
    /// 빈 인덱스를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 다음 `n`번의 벌크 호출을 실패시킵니다.
    pub fn fail_next_bulk(&self, n: usize) {
        self.failing_bulks.store(n, Ordering::Release);
    }

    /// 설치된 템플릿 이름을 정렬 순서로 반환합니다.
    pub fn template_names(&self) -> Vec<String> {
        lock(&self.templates).keys().cloned().collect()
    }

    /// 이름으로 템플릿을 조회합니다.
    pub fn template(&self, name: &str) -> Option<IndexTemplate> {
        lock(&self.templates).get(name).cloned()
    }

    /// 문서가 있는 인덱스 이름을 정렬 순서로 반환합니다.
    pub fn indices(&self) -> Vec<String> {
        lock(&self.documents).keys().cloned().collect()
    }

    /// 인덱스의 문서를 기록 순서로 반환합니다.
    pub fn documents(&self, index: &str) -> Vec<BulkDocument> {
        lock(&self.documents)
            .get(index)
            .cloned()
            .unwrap_or_default()
    }

    /// 전체 문서 수를 반환합니다.
    pub fn total_documents(&self) -> usize {
        lock(&self.documents).values().map(Vec::len).sum()
    }

    /// 벌크 호출 횟수 (실패 포함)
    pub fn bulk_calls(&self) -> usize {
        self.bulk_calls.load(Ordering::Acquire)
    }
}

impl SearchIndex for MemorySearchIndex {
    async fn put_template(&self, template: &IndexTemplate) -> Result<(), StoreError> {
        lock(&self.templates).insert(template.name.clone(), template.clone());
        Ok(())
    }

    async fn bulk(&self, documents: Vec<BulkDocument>) -> Result<BulkSummary, StoreError> {
        self.bulk_calls.fetch_add(1, Ordering::AcqRel);
        let failing = self
            .failing_bulks
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(StoreError::Search("injected bulk failure".to_owned()));
        }

        let written = documents.len();
        let mut indices = lock(&self.documents);
        for document in documents {
            let index = indices.entry(document.index.clone()).or_default();
            match index.iter_mut().find(|existing| existing.id == document.id) {
                Some(existing) => *existing = document,
                None => index.push(document),
            }
        }
        Ok(BulkSummary { written })
    }
}

// =============================================================================
// LogQueue
// =============================================================================

#[derive(Debug, Default)]
struct PartitionLog {
    /// 커밋되지 않은 메시지. 첫 메시지의 오프셋은 `base`
    messages: VecDeque<Bytes>,
    base: u64,
    /// 다음에 읽을 오프셋
    position: u64,
    /// 커밋된 오프셋 (이 오프셋 이전은 처리 완료)
    committed: u64,
}

impl PartitionLog {
    /// 다음 메시지가 받을 오프셋
    fn end(&self) -> u64 {
        self.base + self.messages.len() as u64
    }

    /// 커밋된 메시지를 버립니다. 오프셋은 `base`로 계속 절대값을 유지합니다.
    fn release_committed(&mut self) {
        let released = (self.committed - self.base) as usize;
        self.messages.drain(..released);
        self.base = self.committed;
    }
}

#[derive(Debug, Default)]
struct Partition {
    log: Mutex<PartitionLog>,
    notify: Notify,
}

/// 파티션된 인메모리 메시지 큐
///
/// 메시지는 오프셋으로 읽고, 커밋되면 메모리에서 해제합니다.
/// [`seek_to_committed`](LogQueue::seek_to_committed)는 읽기 위치를 커밋 지점으로 되돌립니다.
/// 프로세스가 끝나면 미커밋 메시지도 사라지므로 재시작 후 재전달이 필요하면
/// [`KafkaQueue`](super::kafka::KafkaQueue)를 사용합니다.
#[derive(Debug)]
pub struct MemoryQueue {
    partitions: Vec<Partition>,
}

impl MemoryQueue {
    /// `partitions`개의 파티션을 가진 큐를 생성합니다 (최소 1개).
    pub fn new(partitions: usize) -> Self {
        Self {
            partitions: (0..partitions.max(1)).map(|_| Partition::default()).collect(),
        }
    }

    /// 파티션에 메시지를 추가하고 오프셋을 반환합니다.
    pub fn publish(
        &self,
        partition: usize,
        payload: impl Into<Bytes>,
    ) -> Result<u64, StoreError> {
        let target = self.partition(partition)?;
        let offset = {
            let mut log = lock(&target.log);
            log.messages.push_back(payload.into());
            log.end() - 1
        };
        target.notify.notify_one();
        Ok(offset)
    }

    /// 키의 해시로 파티션을 골라 메시지를 추가합니다.
    ///
    /// 같은 키는 항상 같은 파티션으로 가므로 키 단위 순서가 유지됩니다.
    pub fn publish_keyed(
        &self,
        key: &str,
        payload: impl Into<Bytes>,
    ) -> Result<(usize, u64), StoreError> {
        let partition = self.partition_for(key);
        let offset = self.publish(partition, payload)?;
        Ok((partition, offset))
    }

    /// 키가 배정될 파티션을 반환합니다.
    pub fn partition_for(&self, key: &str) -> usize {
        super::partition_for_key(key, self.partitions.len())
    }

    /// 파티션의 커밋된 오프셋을 반환합니다.
    pub fn committed(&self, partition: usize) -> Result<u64, StoreError> {
        Ok(lock(&self.partition(partition)?.log).committed)
    }

    /// 파티션이 보관 중인 (아직 커밋되지 않은) 메시지 수를 반환합니다.
    pub fn len(&self, partition: usize) -> Result<usize, StoreError> {
        Ok(lock(&self.partition(partition)?.log).messages.len())
    }

    /// 모든 파티션에서 아직 커밋되지 않은 메시지 수를 반환합니다.
    pub fn uncommitted(&self) -> u64 {
        self.partitions
            .iter()
            .map(|p| {
                let log = lock(&p.log);
                log.end() - log.committed
            })
            .sum()
    }

    fn partition(&self, partition: usize) -> Result<&Partition, StoreError> {
        self.partitions.get(partition).ok_or_else(|| {
            StoreError::Queue(format!(
                "partition {partition} out of range (partitions: {})",
                self.partitions.len()
            ))
        })
    }

    fn take(&self, partition: &Partition, index: usize, max: usize) -> Vec<QueueMessage> {
        let mut log = lock(&partition.log);
        let start = log.position;
        let skip = (start - log.base) as usize;
        let batch: Vec<_> = log
            .messages
            .iter()
            .skip(skip)
            .take(max)
            .enumerate()
            .map(|(i, payload)| QueueMessage {
                partition: index,
                offset: start + i as u64,
                payload: payload.clone(),
            })
            .collect();
        log.position = start + batch.len() as u64;
        batch
    }
}

impl LogQueue for MemoryQueue {
    fn partitions(&self) -> usize {
        self.partitions.len()
    }

    async fn produce(&self, key: &str, payload: Bytes) -> Result<(usize, u64), StoreError> {
        self.publish_keyed(key, payload)
    }

    async fn pull(
        &self,
        partition: usize,
        max: usize,
        timeout: Duration,
    ) -> Result<Vec<QueueMessage>, StoreError> {
        let target = self.partition(partition)?;
        let deadline = Instant::now() + timeout;

        loop {
            let batch = self.take(target, partition, max);
            if !batch.is_empty() || max == 0 {
                return Ok(batch);
            }
            if tokio::time::timeout_at(deadline, target.notify.notified())
                .await
                .is_err()
            {
                return Ok(Vec::new());
            }
        }
    }

    async fn commit(&self, partition: usize, next_offset: u64) -> Result<(), StoreError> {
        let target = self.partition(partition)?;
        let mut log = lock(&target.log);
        if next_offset > log.end() {
            return Err(StoreError::Queue(format!(
                "commit offset {next_offset} beyond end of partition {partition}"
            )));
        }
        log.committed = log.committed.max(next_offset);
        log.position = log.position.max(log.committed);
        log.release_committed();
        Ok(())
    }

    async fn seek_to_committed(&self, partition: usize) -> Result<(), StoreError> {
        let target = self.partition(partition)?;
        let mut log = lock(&target.log);
        log.position = log.committed;
        Ok(())
    }
}

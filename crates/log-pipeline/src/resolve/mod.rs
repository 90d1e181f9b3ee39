//! 장치-규칙 해석 캐시
//!
//! `(source IP, facility)`를 장치 스냅샷과 바인딩된 파싱 규칙으로 해석합니다.
//! 키-값 저장소의 TTL 캐시가 관계형 장치 저장소 앞에 놓인 2단 구조입니다.
//!
//! ```text
//! resolve(ip, facility)
//!   ├─ KvStore.get("<prefix>:resolve:<ip>:<facility>") ── hit ──▶ 역직렬화
//!   └─ miss ──▶ DeviceRepository.resolve() ──▶ KvStore.set_ex(TTL) ──▶ 반환
//! ```
//!
//! 장치가 없는 결과는 캐시하지 않습니다. 모니터링이 꺼진 장치는 캐시하고,
//! 조회 후에 모니터링 여부를 검사합니다.
//! 두 워커가 같은 키를 동시에 채우면 같은 값이 두 번 쓰일 수 있으며 마지막 쓰기가 남습니다.

pub mod inventory;

pub use inventory::{Inventory, InventoryRepository};

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;

use loghive_core::backend::{DeviceRepository, KvStore};
use loghive_core::error::StoreError;
use loghive_core::metrics as m;
use loghive_core::types::{DeviceIdentity, DeviceRuleRow, Facility, ParsingRule};

use crate::error::LogPipelineError;

/// 해석 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// 장치 스냅샷
    pub device: DeviceIdentity,
    /// facility에 바인딩된 규칙 (없으면 빈 패턴)
    pub rule: ParsingRule,
}

/// 해석 실패
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// IP로 장치를 찾지 못함
    #[error("device not found for {ip}")]
    DeviceNotFound {
        /// 로그를 보낸 IP
        ip: IpAddr,
    },

    /// 장치의 로그 모니터링이 꺼져 있음
    #[error("device {device_id} ({ip}) is not monitored")]
    DeviceNotMonitored {
        /// 로그를 보낸 IP
        ip: IpAddr,
        /// 장치 ID
        device_id: i64,
    },

    /// 캐시 또는 장치 저장소 장애
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ResolveError> for LogPipelineError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Store(store) => LogPipelineError::Store(store),
            other => LogPipelineError::Internal(other.to_string()),
        }
    }
}

/// 장치-규칙 해석 캐시
pub struct ResolutionCache<R, K> {
    repository: Arc<R>,
    kv: Arc<K>,
    key_prefix: String,
    ttl: Duration,
}

impl<R: DeviceRepository, K: KvStore> ResolutionCache<R, K> {
    /// 새 캐시를 생성합니다.
    pub fn new(repository: Arc<R>, kv: Arc<K>, key_prefix: impl Into<String>, ttl: Duration) -> Self {
        Self {
            repository,
            kv,
            key_prefix: key_prefix.into(),
            ttl,
        }
    }

    /// 캐시 키 접두사 (`<prefix>:resolve:`)
    fn scheme_prefix(&self) -> String {
        format!("{}:resolve:", self.key_prefix)
    }

    /// `(ip, facility)`의 캐시 키를 반환합니다.
    pub fn cache_key(&self, ip: IpAddr, facility: Facility) -> String {
        format!("{}{ip}:{}", self.scheme_prefix(), facility.code())
    }

    /// `(ip, facility)`를 해석합니다.
    pub async fn resolve(&self, ip: IpAddr, facility: Facility) -> Result<Resolution, ResolveError> {
        let key = self.cache_key(ip, facility);

        let row = match self.lookup_cached(&key).await? {
            Some(row) => {
                counter!(m::CACHE_HITS_TOTAL).increment(1);
                row
            }
            None => {
                counter!(m::CACHE_MISSES_TOTAL).increment(1);
                let row = self
                    .repository
                    .resolve(ip, facility)
                    .await?
                    .ok_or(ResolveError::DeviceNotFound { ip })?;
                let encoded = serde_json::to_string(&row).map_err(StoreError::from)?;
                self.kv.set_ex(&key, &encoded, self.ttl).await?;
                row
            }
        };

        if !row.device.log_monitoring_enabled {
            return Err(ResolveError::DeviceNotMonitored {
                ip,
                device_id: row.device.id,
            });
        }

        Ok(Resolution {
            device: row.device,
            rule: row.rule.unwrap_or_else(ParsingRule::unbound),
        })
    }

    /// 캐시된 행을 읽습니다. 손상된 항목은 미스로 취급합니다.
    async fn lookup_cached(&self, key: &str) -> Result<Option<DeviceRuleRow>, StoreError> {
        let Some(raw) = self.kv.get(key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(row) => Ok(Some(row)),
            Err(e) => {
                tracing::warn!(key, error = %e, "corrupt resolution cache entry, refetching");
                Ok(None)
            }
        }
    }

    /// 이 캐시의 모든 항목을 삭제하고 삭제 건수를 반환합니다.
    pub async fn clean(&self) -> Result<usize, StoreError> {
        let removed = self.kv.delete_prefix(&self.scheme_prefix()).await?;
        tracing::info!(removed, "resolution cache cleaned");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryDeviceRepository, MemoryKvStore};

    fn device(monitored: bool) -> DeviceIdentity {
        DeviceIdentity {
            id: 3,
            name: "ubuntu".to_owned(),
            device_type: "Linux".to_owned(),
            category: "server".to_owned(),
            log_monitoring_enabled: monitored,
        }
    }

    fn auth_rule() -> ParsingRule {
        ParsingRule {
            id: 10,
            pattern: r"(?P<hostname>\S+)".to_owned(),
            log_category: "linux-auth".to_owned(),
        }
    }

    fn ip() -> IpAddr {
        "192.168.0.58".parse().unwrap()
    }

    fn setup(
        monitored: bool,
    ) -> (
        ResolutionCache<MemoryDeviceRepository, MemoryKvStore>,
        Arc<MemoryDeviceRepository>,
        Arc<MemoryKvStore>,
    ) {
        let repo = Arc::new(MemoryDeviceRepository::new());
        repo.bind_rule(
            ip(),
            Facility::Auth,
            DeviceRuleRow {
                device: device(monitored),
                rule: Some(auth_rule()),
            },
        );
        let kv = Arc::new(MemoryKvStore::new());
        let cache = ResolutionCache::new(
            Arc::clone(&repo),
            Arc::clone(&kv),
            "test",
            Duration::from_secs(60),
        );
        (cache, repo, kv)
    }

    #[tokio::test]
    async fn second_resolve_is_served_from_cache() {
        let (cache, repo, _) = setup(true);

        let first = cache.resolve(ip(), Facility::Auth).await.unwrap();
        let second = cache.resolve(ip(), Facility::Auth).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.rule, auth_rule());
        assert_eq!(repo.lookups(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn entry_is_refetched_after_ttl() {
        let (cache, repo, _) = setup(true);
        cache.resolve(ip(), Facility::Auth).await.unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;
        cache.resolve(ip(), Facility::Auth).await.unwrap();
        assert_eq!(repo.lookups(), 2);
    }

    #[tokio::test]
    async fn unknown_device_is_not_found_and_not_cached() {
        let (cache, repo, kv) = setup(true);
        let other: IpAddr = "10.1.1.1".parse().unwrap();

        let err = cache.resolve(other, Facility::Auth).await.unwrap_err();
        assert!(matches!(err, ResolveError::DeviceNotFound { .. }));
        cache.resolve(other, Facility::Auth).await.unwrap_err();

        assert_eq!(repo.lookups(), 2);
        assert!(kv.is_empty());
    }

    #[tokio::test]
    async fn unmonitored_device_is_rejected_even_when_cached() {
        let (cache, repo, _) = setup(false);

        for _ in 0..2 {
            let err = cache.resolve(ip(), Facility::Auth).await.unwrap_err();
            assert!(matches!(
                err,
                ResolveError::DeviceNotMonitored { device_id: 3, .. }
            ));
        }
        assert_eq!(repo.lookups(), 1);
    }

    #[tokio::test]
    async fn missing_rule_resolves_to_unbound() {
        let (cache, _, _) = setup(true);
        let resolution = cache.resolve(ip(), Facility::Kern).await.unwrap();
        assert!(resolution.rule.is_unbound());
        assert_eq!(resolution.device.id, 3);
    }

    #[tokio::test]
    async fn corrupt_entry_is_treated_as_miss() {
        let (cache, repo, kv) = setup(true);
        let key = cache.cache_key(ip(), Facility::Auth);
        kv.set_ex(&key, "{not json", Duration::from_secs(60))
            .await
            .unwrap();

        cache.resolve(ip(), Facility::Auth).await.unwrap();
        assert_eq!(repo.lookups(), 1);
    }

    #[tokio::test]
    async fn store_failure_propagates() {
        let (cache, _, kv) = setup(true);
        kv.set_unavailable(true);
        let err = cache.resolve(ip(), Facility::Auth).await.unwrap_err();
        assert!(matches!(err, ResolveError::Store(StoreError::Kv(_))));
    }

    #[tokio::test]
    async fn clean_removes_only_resolution_entries() {
        let (cache, _, kv) = setup(true);
        cache.resolve(ip(), Facility::Auth).await.unwrap();
        cache.resolve(ip(), Facility::Kern).await.unwrap();
        kv.set_ex("test:stats:device:3:total", "1", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(cache.clean().await.unwrap(), 2);
        assert_eq!(kv.len(), 1);
    }

    #[test]
    fn cache_key_uses_facility_code() {
        let (cache, _, _) = setup(true);
        assert_eq!(
            cache.cache_key(ip(), Facility::Auth),
            "test:resolve:192.168.0.58:4"
        );
    }
}

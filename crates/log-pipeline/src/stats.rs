//! 장치별 로그 통계
//!
//! 배치가 검색 클러스터에 기록된 뒤 장치마다 누적/일별 카운터를 올립니다.
//! 성공 레코드와 실패 레코드를 모두 셉니다.
//!
//! - 누적: `<prefix>:stats:device:<id>:total`
//! - 일별: `<prefix>:stats:device:<id>:day:<YYYYMMDD>` (48시간 TTL)
//!
//! 일별 키의 날짜는 인덱스 이름과 같이 수집 시각의 로컬 날짜입니다.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};

use loghive_core::backend::KvStore;
use loghive_core::error::StoreError;

use crate::record::LogRecord;
use crate::schema::template::INDEX_DATE_FORMAT;

/// 일별 카운터 TTL
pub const DAILY_TTL: Duration = Duration::from_secs(48 * 60 * 60);

/// 장치별 로그 통계 카운터
pub struct DeviceStats<K> {
    kv: Arc<K>,
    key_prefix: String,
}

impl<K: KvStore> DeviceStats<K> {
    /// 새 통계 카운터를 생성합니다.
    pub fn new(kv: Arc<K>, key_prefix: impl Into<String>) -> Self {
        Self {
            kv,
            key_prefix: key_prefix.into(),
        }
    }

    fn total_key(&self, device_id: i64) -> String {
        format!("{}:stats:device:{device_id}:total", self.key_prefix)
    }

    fn day_key(&self, device_id: i64, day: &str) -> String {
        format!("{}:stats:device:{device_id}:day:{day}", self.key_prefix)
    }

    /// 기록된 레코드를 장치/날짜별로 묶어 카운터를 올립니다.
    pub async fn record(&self, records: &[LogRecord]) -> Result<(), StoreError> {
        let mut grouped: BTreeMap<(i64, String), i64> = BTreeMap::new();
        for record in records {
            let base = record.base();
            let day = base.ingested_at.format(INDEX_DATE_FORMAT).to_string();
            *grouped.entry((base.device.id, day)).or_default() += 1;
        }

        for ((device_id, day), count) in grouped {
            self.kv
                .incr_by(&self.total_key(device_id), count, None)
                .await?;
            self.kv
                .incr_by(&self.day_key(device_id, &day), count, Some(DAILY_TTL))
                .await?;
        }
        Ok(())
    }

    /// 장치의 누적 레코드 수를 반환합니다.
    pub async fn total(&self, device_id: i64) -> Result<u64, StoreError> {
        self.read(&self.total_key(device_id)).await
    }

    /// 장치의 주어진 날짜 레코드 수를 반환합니다.
    pub async fn on_day(&self, device_id: i64, day: &DateTime<Local>) -> Result<u64, StoreError> {
        let day = day.format(INDEX_DATE_FORMAT).to_string();
        self.read(&self.day_key(device_id, &day)).await
    }

    /// 장치의 오늘 레코드 수를 반환합니다.
    pub async fn today(&self, device_id: i64) -> Result<u64, StoreError> {
        self.on_day(device_id, &Local::now()).await
    }

    async fn read(&self, key: &str) -> Result<u64, StoreError> {
        match self.kv.get(key).await? {
            Some(raw) => raw
                .parse()
                .map_err(|_| StoreError::Codec(format!("counter '{key}' is not a number: {raw}"))),
            None => Ok(0),
        }
    }
}

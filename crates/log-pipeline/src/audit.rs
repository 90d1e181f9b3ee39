//! 감사 로그
//!
//! 관리 이벤트(세션 만료, 데몬 시작/정지 등)를 `<prefix>-audit-YYYYMMDD` 인덱스에 기록합니다.
//! 같은 이벤트가 여러 요청/프로세스에서 동시에 발생해도 한 번만 기록되도록
//! 이벤트 키로 분산 락을 `force_drop` + `delay` 옵션으로 잡습니다.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, SecondsFormat};

use loghive_core::backend::{KvStore, SearchIndex};
use loghive_core::types::BulkDocument;

use crate::error::LogPipelineError;
use crate::lock::{DistributedLock, LockOptions};
use crate::schema::SchemaRegistry;
use crate::schema::catalog::AUDIT_CATEGORY;

/// 감사 이벤트
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// 이벤트 이름 (예: "session_timeout")
    pub event: String,
    /// 행위자 (사용자 또는 프로세스)
    pub actor: String,
    /// 요청 출발지 IP
    pub source_ip: Option<IpAddr>,
    /// 상세 내용
    pub detail: String,
}

impl AuditEvent {
    /// 새 이벤트를 생성합니다.
    pub fn new(event: impl Into<String>, actor: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            actor: actor.into(),
            source_ip: None,
            detail: String::new(),
        }
    }

    /// 출발지 IP를 설정합니다.
    pub fn source_ip(mut self, ip: IpAddr) -> Self {
        self.source_ip = Some(ip);
        self
    }

    /// 상세 내용을 설정합니다.
    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }
}

/// 중복 억제 감사 로거
pub struct AuditLogger<K, S> {
    lock: Arc<DistributedLock<K>>,
    search: Arc<S>,
    registry: Arc<SchemaRegistry>,
    options: LockOptions,
}

impl<K: KvStore, S: SearchIndex> AuditLogger<K, S> {
    /// 새 감사 로거를 생성합니다.
    ///
    /// `dedup_window` 동안 같은 키의 이벤트는 다시 기록되지 않습니다.
    pub fn new(
        lock: Arc<DistributedLock<K>>,
        search: Arc<S>,
        registry: Arc<SchemaRegistry>,
        expiry: Duration,
        dedup_window: Duration,
    ) -> Self {
        Self {
            lock,
            search,
            registry,
            options: LockOptions::new(expiry)
                .force_drop(true)
                .delay(dedup_window),
        }
    }

    /// 이벤트를 기록합니다.
    ///
    /// 같은 `dedup_key`로 이미 기록 중이거나 억제 구간 안이면 `Ok(false)`.
    pub async fn record(
        &self,
        dedup_key: &str,
        event: AuditEvent,
    ) -> Result<bool, LogPipelineError> {
        let key = format!("audit:{dedup_key}");
        let written = self
            .lock
            .run_locked(&key, self.options, async {
                let document = self.document(&event);
                self.search.bulk(vec![document]).await?;
                Ok(())
            })
            .await?;

        match written {
            Some(()) => {
                tracing::info!(event = %event.event, actor = %event.actor, "audit event recorded");
                Ok(true)
            }
            None => {
                tracing::debug!(event = %event.event, dedup_key, "duplicate audit event suppressed");
                Ok(false)
            }
        }
    }

    fn document(&self, event: &AuditEvent) -> BulkDocument {
        let now = Local::now();
        let id = uuid::Uuid::new_v4().to_string();
        let timestamp = now.to_rfc3339_opts(SecondsFormat::Millis, false);
        BulkDocument {
            index: self.registry.index_name(AUDIT_CATEGORY, &now),
            id: id.clone(),
            body: serde_json::json!({
                "id": id,
                "timestamp": timestamp,
                "ingestion_time": timestamp,
                "status": true,
                "log_category": AUDIT_CATEGORY,
                "event": event.event,
                "actor": event.actor,
                "source_ip": event.source_ip,
                "detail": event.detail,
            }),
        }
    }
}

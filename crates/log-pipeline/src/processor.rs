//! 로그 프로세서 -- 라인 단위 처리 상태 머신
//!
//! ```text
//! Unparsed ──헤더 불일치/미지 facility──▶ Discarded
//!    │
//! HeaderParsed ──장치 없음/모니터링 꺼짐──▶ Discarded
//!    │
//! DeviceResolved ──규칙 없음──▶ StoredFailed
//!    │
//! RuleBound ──정규식 불일치/잘못된 패턴──▶ StoredFailed
//!    │
//! BodyParsed ──미등록 분류/필드 변환 실패──▶ StoredFailed
//!    │
//!    └──▶ StoredSuccess
//! ```
//!
//! 한 라인은 정확히 한 번 이 경로를 지나며, 결과는 [`LineOutcome`] 하나입니다.
//! `Err`는 캐시/장치 저장소 장애에만 사용되며 호출자는 배치를 커밋하지 않아야 합니다.

use std::sync::Arc;

use chrono::{DateTime, Local};

use loghive_core::backend::{DeviceRepository, KvStore};
use loghive_core::config::MAX_REFRESH_CEILING;

use crate::counter::CounterSet;
use crate::error::LogPipelineError;
use crate::parser::{HeaderError, HeaderParser};
use crate::record::{
    FailedRecord, FailureReason, LogRecord, ParsedRecord, RecordBase, record_id,
};
use crate::resolve::{Resolution, ResolutionCache, ResolveError};
use crate::rule::RuleRegexCache;
use crate::schema::SchemaRegistry;

/// 레코드 순번 카운터 스코프
pub const RECORD_SEQ_SCOPE: &str = "record_seq";

/// 아무것도 저장하지 않고 버린 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// 헤더 형식 불일치 또는 입력 크기 초과
    MalformedHeader,
    /// facility 테이블에 없는 코드
    UnknownFacility,
    /// IP로 장치를 찾지 못함
    DeviceNotFound,
    /// 장치 모니터링 꺼짐
    DeviceNotMonitored,
}

impl DiscardReason {
    /// 메트릭 레이블 값
    pub fn as_str(self) -> &'static str {
        match self {
            DiscardReason::MalformedHeader => "malformed_header",
            DiscardReason::UnknownFacility => "unknown_facility",
            DiscardReason::DeviceNotFound => "device_not_found",
            DiscardReason::DeviceNotMonitored => "device_not_monitored",
        }
    }
}

/// 라인 처리 결과
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    /// 장치에 귀속할 수 없어 버림 (로그만 남김)
    Discarded(DiscardReason),
    /// 성공 또는 실패 레코드로 저장 대상
    Stored(LogRecord),
}

/// 워커 간에 공유되는 처리 구성요소
pub struct ProcessingContext<R, K> {
    /// 헤더 파서
    pub header: HeaderParser,
    /// 장치-규칙 해석 캐시
    pub resolver: ResolutionCache<R, K>,
    /// 규칙 정규식 캐시
    pub rules: RuleRegexCache,
    /// 스키마 레지스트리
    pub schemas: Arc<SchemaRegistry>,
}

/// 워커 하나가 소유하는 로그 프로세서
pub struct LogProcessor<R, K> {
    context: Arc<ProcessingContext<R, K>>,
    worker: usize,
    counters: CounterSet,
}

impl<R: DeviceRepository, K: KvStore> LogProcessor<R, K> {
    /// 워커용 프로세서를 생성합니다.
    ///
    /// 순번은 `refresh_ceiling`에서 0으로 돌아가며, 레코드 ID의 10자리 순번을 넘지 않도록
    /// [`MAX_REFRESH_CEILING`]으로 제한됩니다.
    pub fn new(
        context: Arc<ProcessingContext<R, K>>,
        worker: usize,
        refresh_ceiling: u64,
    ) -> Self {
        Self {
            context,
            worker,
            counters: CounterSet::new(Some(refresh_ceiling.clamp(1, MAX_REFRESH_CEILING))),
        }
    }

    /// 워커 ID를 반환합니다.
    pub fn worker(&self) -> usize {
        self.worker
    }

    /// 라인을 현재 시각으로 처리합니다.
    pub async fn process(&mut self, line: &str) -> Result<LineOutcome, LogPipelineError> {
        self.process_at(line, Local::now()).await
    }

    /// 라인을 주어진 수집 시각으로 처리합니다.
    pub async fn process_at(
        &mut self,
        line: &str,
        ingested_at: DateTime<Local>,
    ) -> Result<LineOutcome, LogPipelineError> {
        let context = Arc::clone(&self.context);

        // Unparsed -> HeaderParsed
        let header = match context.header.parse(line) {
            Ok(header) => header,
            Err(e) => {
                let reason = match &e {
                    HeaderError::UnknownFacility(_) => DiscardReason::UnknownFacility,
                    HeaderError::TooLarge { .. } | HeaderError::Malformed(_) => {
                        DiscardReason::MalformedHeader
                    }
                };
                tracing::debug!(worker = self.worker, error = %e, "line discarded");
                return Ok(LineOutcome::Discarded(reason));
            }
        };

        // HeaderParsed -> DeviceResolved
        let Resolution { device, rule } = match context
            .resolver
            .resolve(header.source_ip, header.facility)
            .await
        {
            Ok(resolution) => resolution,
            Err(ResolveError::DeviceNotFound { ip }) => {
                tracing::debug!(worker = self.worker, %ip, "unknown device, line discarded");
                return Ok(LineOutcome::Discarded(DiscardReason::DeviceNotFound));
            }
            Err(ResolveError::DeviceNotMonitored { ip, device_id }) => {
                tracing::debug!(
                    worker = self.worker,
                    %ip,
                    device_id,
                    "device not monitored, line discarded"
                );
                return Ok(LineOutcome::Discarded(DiscardReason::DeviceNotMonitored));
            }
            Err(ResolveError::Store(e)) => return Err(e.into()),
        };

        let seq = self.counters.get(RECORD_SEQ_SCOPE).add(1);
        let base = RecordBase {
            id: record_id(&ingested_at, self.worker, seq),
            device,
            occurred_at: header.timestamp,
            ingested_at,
            raw_content: line.to_owned(),
        };

        // DeviceResolved -> RuleBound
        if rule.is_unbound() {
            return failed(base, FailureReason::RuleUnbound);
        }
        let compiled = match context.rules.get_or_compile(&rule) {
            Ok(compiled) => compiled,
            Err(e) => {
                tracing::warn!(rule_id = rule.id, error = %e, "invalid rule pattern");
                return failed(base, FailureReason::InvalidPattern(e.to_string()));
            }
        };

        // RuleBound -> BodyParsed
        let Some(captures) = compiled.regex().captures(line) else {
            return failed(base, FailureReason::NoMatch);
        };

        // BodyParsed -> StoredSuccess
        let Some(schema) = context.schemas.get_schema(&rule.log_category) else {
            return failed(
                base,
                FailureReason::UnregisteredCategory(rule.log_category.clone()),
            );
        };

        let mut fields = Vec::new();
        for spec in schema.fields() {
            let value = match captures.name(spec.name) {
                Some(capture) => match spec.convert(capture.as_str()) {
                    Ok(value) => value,
                    Err(e) => return failed(base, FailureReason::FieldConversion(e)),
                },
                None => None,
            };
            fields.push((spec.name, value));
        }

        Ok(LineOutcome::Stored(LogRecord::Parsed(ParsedRecord {
            base,
            log_category: schema.category,
            fields,
        })))
    }
}

fn failed(base: RecordBase, reason: FailureReason) -> Result<LineOutcome, LogPipelineError> {
    Ok(LineOutcome::Stored(LogRecord::Failed(FailedRecord {
        base,
        reason,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;
    use std::time::Duration;

    use loghive_core::types::{DeviceIdentity, DeviceRuleRow, Facility, ParsingRule};

    use crate::backend::memory::{MemoryDeviceRepository, MemoryKvStore};
    use crate::schema::FieldValue;

    const LINE: &str =
        "2020-10-14 10:05:27 ubuntu 192.168.0.58 4 6 sshd[1]: Accepted password for root";
    const AUTH_PATTERN: &str = r"^(?P<timestamp>\S+ \S+) (?P<hostname>\S+) (?P<ip>\S+) (?P<facility>\d+) (?P<level>\d+)";

    fn device(monitored: bool) -> DeviceIdentity {
        DeviceIdentity {
            id: 1,
            name: "ubuntu".to_owned(),
            device_type: "Linux".to_owned(),
            category: "server".to_owned(),
            log_monitoring_enabled: monitored,
        }
    }

    fn ip() -> IpAddr {
        "192.168.0.58".parse().unwrap()
    }

    fn processor_with(rule: Option<ParsingRule>) -> LogProcessor<MemoryDeviceRepository, MemoryKvStore> {
        let repo = Arc::new(MemoryDeviceRepository::new());
        match rule {
            Some(rule) => repo.bind_rule(
                ip(),
                Facility::Auth,
                DeviceRuleRow {
                    device: device(true),
                    rule: Some(rule),
                },
            ),
            None => repo.insert_device(ip(), device(true)),
        }
        let context = ProcessingContext {
            header: HeaderParser::new().unwrap(),
            resolver: ResolutionCache::new(
                repo,
                Arc::new(MemoryKvStore::new()),
                "test",
                Duration::from_secs(60),
            ),
            rules: RuleRegexCache::new(),
            schemas: Arc::new(
                SchemaRegistry::builder("test").with_builtin().unwrap().build(),
            ),
        };
        LogProcessor::new(Arc::new(context), 0, MAX_REFRESH_CEILING)
    }

    fn rule(pattern: &str, category: &str) -> ParsingRule {
        ParsingRule {
            id: 1,
            pattern: pattern.to_owned(),
            log_category: category.to_owned(),
        }
    }

    fn stored(outcome: LineOutcome) -> LogRecord {
        match outcome {
            LineOutcome::Stored(record) => record,
            other => panic!("expected stored record, got {other:?}"),
        }
    }

    #[test]
    fn sequence_ceiling_is_clamped_to_record_id_width() {
        let base = processor_with(None);
        let mut processor = LogProcessor::new(Arc::clone(&base.context), 0, u64::MAX);
        let seq = processor.counters.get(RECORD_SEQ_SCOPE);
        assert_eq!(seq.add(MAX_REFRESH_CEILING - 1), MAX_REFRESH_CEILING - 1);
        assert_eq!(seq.add(1), 0);
    }

    #[tokio::test]
    async fn matching_rule_yields_parsed_record() {
        let mut processor = processor_with(Some(rule(AUTH_PATTERN, "linux-auth")));
        let record = stored(processor.process(LINE).await.unwrap());

        let LogRecord::Parsed(parsed) = record else {
            panic!("expected parsed record");
        };
        assert_eq!(parsed.log_category, "linux-auth");
        assert_eq!(parsed.field("hostname"), Some(&FieldValue::Str("ubuntu".to_owned())));
        assert_eq!(parsed.field("ip"), Some(&FieldValue::Ip(ip())));
        assert_eq!(parsed.field("facility"), Some(&FieldValue::Integer(4)));
        assert_eq!(parsed.field("level"), Some(&FieldValue::Integer(6)));
        assert_eq!(parsed.field("src_ip"), None);
        assert_eq!(parsed.field("src_port"), None);
        assert_eq!(parsed.base.device, device(true));
        assert_eq!(parsed.base.raw_content, LINE);
    }

    #[tokio::test]
    async fn malformed_header_is_discarded() {
        let mut processor = processor_with(None);
        let outcome = processor.process("garbage").await.unwrap();
        assert_eq!(outcome, LineOutcome::Discarded(DiscardReason::MalformedHeader));
    }

    #[tokio::test]
    async fn unknown_facility_is_discarded() {
        let mut processor = processor_with(None);
        let outcome = processor
            .process("2020-10-14 10:05:27 ubuntu 192.168.0.58 30 6 body")
            .await
            .unwrap();
        assert_eq!(outcome, LineOutcome::Discarded(DiscardReason::UnknownFacility));
    }

    #[tokio::test]
    async fn unknown_device_is_discarded() {
        let mut processor = processor_with(None);
        let outcome = processor
            .process("2020-10-14 10:05:27 ubuntu 10.9.9.9 4 6 body")
            .await
            .unwrap();
        assert_eq!(outcome, LineOutcome::Discarded(DiscardReason::DeviceNotFound));
    }

    #[tokio::test]
    async fn unbound_rule_yields_failed_record() {
        let mut processor = processor_with(None);
        let record = stored(processor.process(LINE).await.unwrap());
        let LogRecord::Failed(failed) = record else {
            panic!("expected failed record");
        };
        assert_eq!(failed.reason, FailureReason::RuleUnbound);
        assert_eq!(failed.base.raw_content, LINE);
    }

    #[tokio::test]
    async fn non_matching_rule_yields_failed_record() {
        let mut processor = processor_with(Some(rule(r"^NEVER", "linux-auth")));
        let record = stored(processor.process(LINE).await.unwrap());
        assert!(matches!(
            record,
            LogRecord::Failed(FailedRecord { reason: FailureReason::NoMatch, .. })
        ));
    }

    #[tokio::test]
    async fn invalid_pattern_yields_failed_record() {
        let mut processor = processor_with(Some(rule(r"(unclosed", "linux-auth")));
        let record = stored(processor.process(LINE).await.unwrap());
        assert!(matches!(
            record,
            LogRecord::Failed(FailedRecord { reason: FailureReason::InvalidPattern(_), .. })
        ));
    }

    #[tokio::test]
    async fn unregistered_category_yields_failed_record() {
        let mut processor = processor_with(Some(rule(AUTH_PATTERN, "mainframe")));
        let record = stored(processor.process(LINE).await.unwrap());
        assert!(matches!(
            record,
            LogRecord::Failed(FailedRecord {
                reason: FailureReason::UnregisteredCategory(_),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn unconvertible_capture_yields_failed_record() {
        // pid는 정수 필드
        let mut processor =
            processor_with(Some(rule(r"sshd\[(?P<src_port>\d+)\]: (?P<pid>\w+)", "linux-auth")));
        let record = stored(processor.process(LINE).await.unwrap());
        let LogRecord::Failed(failed) = record else {
            panic!("expected failed record");
        };
        assert_eq!(failed.reason.code(), "field_conversion");
    }

    #[tokio::test]
    async fn empty_capture_is_null() {
        let mut processor = processor_with(Some(rule(
            r"(?P<hostname>ubuntu) (?P<user>)",
            "linux-auth",
        )));
        let record = stored(processor.process(LINE).await.unwrap());
        let LogRecord::Parsed(parsed) = record else {
            panic!("expected parsed record");
        };
        assert_eq!(parsed.field("user"), None);
    }

    #[tokio::test]
    async fn ids_increase_within_worker() {
        let mut processor = processor_with(Some(rule(AUTH_PATTERN, "linux-auth")));
        let at = Local::now();
        let first = stored(processor.process_at(LINE, at).await.unwrap());
        let second = stored(processor.process_at(LINE, at).await.unwrap());
        assert!(first.id() < second.id());
    }

    #[tokio::test]
    async fn store_failure_is_error() {
        let repo = Arc::new(MemoryDeviceRepository::new());
        let kv = Arc::new(MemoryKvStore::new());
        kv.set_unavailable(true);
        let context = ProcessingContext {
            header: HeaderParser::new().unwrap(),
            resolver: ResolutionCache::new(repo, kv, "test", Duration::from_secs(60)),
            rules: RuleRegexCache::new(),
            schemas: Arc::new(SchemaRegistry::builder("test").build()),
        };
        let mut processor = LogProcessor::new(Arc::new(context), 0, MAX_REFRESH_CEILING);

        let err = processor.process(LINE).await.unwrap_err();
        assert!(err.is_infrastructure());
    }
}

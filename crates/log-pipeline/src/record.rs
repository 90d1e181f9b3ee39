//! 저장 레코드 모델
//!
//! 한 라인의 처리 결과는 [`LogRecord::Parsed`] 또는 [`LogRecord::Failed`] 중
//! 정확히 하나입니다. 두 변형 모두 [`RecordBase`]를 공유하며
//! [`to_document`](LogRecord::to_document)로 벌크 문서가 됩니다.
//!
//! # 레코드 ID
//! `{수집 시각 ms:013}{워커:03}{순번:010}` 형식의 고정 폭 10진 문자열입니다.
//! 사전식 정렬이 수치 정렬과 같으므로 `(timestamp, id)`를 페이지네이션 커서로 쓸 수 있습니다.

use std::fmt;

use chrono::{DateTime, Local, SecondsFormat};
use serde_json::{Map, Value, json};

use loghive_core::types::{BulkDocument, DeviceIdentity};

use crate::schema::catalog::FAILED_CATEGORY;
use crate::schema::{FieldError, FieldValue, SchemaRegistry};

/// 레코드 ID 워커 자리수 상한
const MAX_WORKER_ID: usize = 999;

/// 레코드 ID를 생성합니다.
pub fn record_id(ingested_at: &DateTime<Local>, worker: usize, seq: u64) -> String {
    let millis = ingested_at.timestamp_millis().max(0);
    format!("{millis:013}{:03}{seq:010}", worker.min(MAX_WORKER_ID))
}

/// 모든 레코드가 공유하는 기본 필드
#[derive(Debug, Clone, PartialEq)]
pub struct RecordBase {
    /// 레코드 ID
    pub id: String,
    /// 장치 스냅샷
    pub device: DeviceIdentity,
    /// 이벤트 발생 시각 (헤더 타임스탬프)
    pub occurred_at: DateTime<Local>,
    /// 수집 시각
    pub ingested_at: DateTime<Local>,
    /// 원본 라인
    pub raw_content: String,
}

/// 파싱에 성공한 레코드
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecord {
    /// 기본 필드
    pub base: RecordBase,
    /// 로그 분류
    pub log_category: &'static str,
    /// 스키마 선언 순서의 타입 필드 (값이 없으면 None)
    pub fields: Vec<(&'static str, Option<FieldValue>)>,
}

impl ParsedRecord {
    /// 필드 값을 조회합니다.
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .and_then(|(_, value)| value.as_ref())
    }
}

/// 파싱 실패 사유
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// facility에 바인딩된 규칙 없음
    RuleUnbound,
    /// 규칙 정규식 컴파일 실패
    InvalidPattern(String),
    /// 정규식 불일치
    NoMatch,
    /// 등록되지 않은 로그 분류
    UnregisteredCategory(String),
    /// 캡처 값 타입 변환 실패
    FieldConversion(FieldError),
}

impl FailureReason {
    /// 문서와 메트릭에 기록하는 짧은 코드
    pub fn code(&self) -> &'static str {
        match self {
            FailureReason::RuleUnbound => "rule_unbound",
            FailureReason::InvalidPattern(_) => "invalid_pattern",
            FailureReason::NoMatch => "no_match",
            FailureReason::UnregisteredCategory(_) => "unregistered_category",
            FailureReason::FieldConversion(_) => "field_conversion",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::RuleUnbound => f.write_str("no rule bound for facility"),
            FailureReason::InvalidPattern(e) => write!(f, "invalid rule pattern: {e}"),
            FailureReason::NoMatch => f.write_str("rule pattern did not match"),
            FailureReason::UnregisteredCategory(c) => write!(f, "unregistered log category '{c}'"),
            FailureReason::FieldConversion(e) => write!(f, "{e}"),
        }
    }
}

/// 파싱에 실패했지만 장치에 귀속되는 레코드
#[derive(Debug, Clone, PartialEq)]
pub struct FailedRecord {
    /// 기본 필드
    pub base: RecordBase,
    /// 실패 사유
    pub reason: FailureReason,
}

/// 저장 레코드
#[derive(Debug, Clone, PartialEq)]
pub enum LogRecord {
    /// 파싱 성공
    Parsed(ParsedRecord),
    /// 파싱 실패
    Failed(FailedRecord),
}

impl LogRecord {
    /// 기본 필드를 반환합니다.
    pub fn base(&self) -> &RecordBase {
        match self {
            LogRecord::Parsed(record) => &record.base,
            LogRecord::Failed(record) => &record.base,
        }
    }

    /// 레코드 ID를 반환합니다.
    pub fn id(&self) -> &str {
        &self.base().id
    }

    /// 파싱 성공 여부
    pub fn is_success(&self) -> bool {
        matches!(self, LogRecord::Parsed(_))
    }

    /// 저장 대상 분류 (실패 레코드는 `failed`)
    pub fn index_category(&self) -> &str {
        match self {
            LogRecord::Parsed(record) => record.log_category,
            LogRecord::Failed(_) => FAILED_CATEGORY,
        }
    }

    /// 벌크 문서로 변환합니다. 인덱스는 수집 시각의 로컬 날짜로 정해집니다.
    pub fn to_document(&self, registry: &SchemaRegistry) -> BulkDocument {
        let base = self.base();
        let mut body = base_fields(base);

        match self {
            LogRecord::Parsed(record) => {
                body.insert("status".to_owned(), Value::Bool(true));
                body.insert("log_category".to_owned(), json!(record.log_category));
                for (name, value) in &record.fields {
                    let value = value
                        .as_ref()
                        .and_then(|v| serde_json::to_value(v).ok())
                        .unwrap_or(Value::Null);
                    body.insert((*name).to_owned(), value);
                }
            }
            LogRecord::Failed(record) => {
                body.insert("status".to_owned(), Value::Bool(false));
                body.insert("log_category".to_owned(), Value::Null);
                body.insert("failure_reason".to_owned(), json!(record.reason.code()));
            }
        }

        BulkDocument {
            index: registry.index_name(self.index_category(), &base.ingested_at),
            id: base.id.clone(),
            body: Value::Object(body),
        }
    }
}

fn base_fields(base: &RecordBase) -> Map<String, Value> {
    let mut body = Map::new();
    body.insert("id".to_owned(), json!(base.id));
    body.insert("dev_id".to_owned(), json!(base.device.id));
    body.insert("dev_name".to_owned(), json!(base.device.name));
    body.insert("dev_category".to_owned(), json!(base.device.category));
    body.insert("dev_type".to_owned(), json!(base.device.device_type));
    body.insert("timestamp".to_owned(), json!(format_time(&base.occurred_at)));
    body.insert(
        "ingestion_time".to_owned(),
        json!(format_time(&base.ingested_at)),
    );
    body.insert("log_content".to_owned(), json!(base.raw_content));
    body
}

fn format_time(at: &DateTime<Local>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, false)
}

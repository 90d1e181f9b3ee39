//! 스키마 필드 타입과 값 변환
//!
//! 정규식 캡처 그룹은 항상 문자열입니다. 스키마가 선언한 필드 타입에 따라
//! [`FieldValue`]로 변환하며, 변환 실패는 [`FieldError`]로 보고합니다.

use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone};
use serde::Serialize;
use serde_json::{Value, json};

/// 필드 타입 (검색 클러스터 매핑 타입에 대응)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// IPv4/IPv6 주소
    Ip,
    /// 64비트 정수
    Integer,
    /// 정확 일치 키워드
    Keyword,
    /// 전문 검색 텍스트
    Text,
    /// 날짜/시각
    Date,
    /// 불리언
    Boolean,
}

impl FieldType {
    /// 검색 클러스터 매핑 정의를 반환합니다.
    pub fn mapping(self) -> Value {
        match self {
            FieldType::Ip => json!({ "type": "ip" }),
            FieldType::Integer => json!({ "type": "long" }),
            FieldType::Keyword => json!({ "type": "keyword" }),
            FieldType::Text => json!({ "type": "text" }),
            FieldType::Date => json!({
                "type": "date",
                "format": "strict_date_optional_time||yyyy-MM-dd HH:mm:ss||epoch_millis"
            }),
            FieldType::Boolean => json!({ "type": "boolean" }),
        }
    }
}

/// 필드 선언
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// 필드 이름 (정규식 캡처 그룹 이름과 같음)
    pub name: &'static str,
    /// 필드 타입
    pub field_type: FieldType,
}

impl FieldSpec {
    /// 필드 선언을 생성합니다.
    pub const fn new(name: &'static str, field_type: FieldType) -> Self {
        Self { name, field_type }
    }
}

/// 변환된 필드 값
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// IP 주소
    Ip(IpAddr),
    /// 정수
    Integer(i64),
    /// 키워드 또는 텍스트
    Str(String),
    /// 날짜/시각
    Date(DateTime<FixedOffset>),
    /// 불리언
    Boolean(bool),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Ip(ip) => write!(f, "{ip}"),
            FieldValue::Integer(n) => write!(f, "{n}"),
            FieldValue::Str(s) => f.write_str(s),
            FieldValue::Date(dt) => write!(f, "{}", dt.to_rfc3339()),
            FieldValue::Boolean(b) => write!(f, "{b}"),
        }
    }
}

/// 필드 변환 실패
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("field '{field}' expects {expected}, got '{raw}'")]
pub struct FieldError {
    /// 필드 이름
    pub field: &'static str,
    /// 기대 타입
    pub expected: &'static str,
    /// 원본 값
    pub raw: String,
}

/// 날짜 필드가 허용하는 시간대 없는 형식 (로컬 시간대로 해석)
const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M:%S"];

impl FieldSpec {
    /// 캡처된 문자열을 선언된 타입으로 변환합니다.
    ///
    /// 빈 문자열은 값이 없는 것(`None`)으로 취급합니다.
    pub fn convert(&self, raw: &str) -> Result<Option<FieldValue>, FieldError> {
        if raw.is_empty() {
            return Ok(None);
        }

        let value = match self.field_type {
            FieldType::Ip => raw
                .parse::<IpAddr>()
                .map(FieldValue::Ip)
                .map_err(|_| self.error("an ip address", raw))?,
            FieldType::Integer => raw
                .trim()
                .parse::<i64>()
                .map(FieldValue::Integer)
                .map_err(|_| self.error("an integer", raw))?,
            FieldType::Keyword | FieldType::Text => FieldValue::Str(raw.to_owned()),
            FieldType::Date => parse_date(raw)
                .map(FieldValue::Date)
                .ok_or_else(|| self.error("a date", raw))?,
            FieldType::Boolean => match raw.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => FieldValue::Boolean(true),
                "false" | "no" | "0" => FieldValue::Boolean(false),
                _ => return Err(self.error("a boolean", raw)),
            },
        };

        Ok(Some(value))
    }

    fn error(&self, expected: &'static str, raw: &str) -> FieldError {
        FieldError {
            field: self.name,
            expected,
            raw: raw.to_owned(),
        }
    }
}

fn parse_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }
    NAIVE_DATE_FORMATS.iter().find_map(|format| {
        let naive = NaiveDateTime::parse_from_str(raw, format).ok()?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.fixed_offset())
    })
}

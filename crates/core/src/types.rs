//! 도메인 타입 -- 시스템 전역에서 사용되는 공통 타입
//!
//! 장치/규칙 스냅샷, syslog facility 테이블, 그리고 외부 저장소 trait이
//! 주고받는 데이터 구조(인덱스 템플릿, 벌크 문서, 큐 메시지)를 정의합니다.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// 모니터링 대상 장치의 불변 스냅샷
///
/// 관계형 장치 테이블이 원본이며, 캐시에 있는 사본은 TTL 동안만 유효합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// 장치 ID
    pub id: i64,
    /// 장치 이름
    pub name: String,
    /// 장치 유형 (예: "Linux", "MySQL")
    pub device_type: String,
    /// 장치 분류 (예: "server", "database", "network")
    pub category: String,
    /// 로그 모니터링 활성화 여부
    pub log_monitoring_enabled: bool,
}

/// 파싱 규칙
///
/// (장치 템플릿, facility) 쌍마다 최대 하나가 할당됩니다.
/// 규칙이 바인딩되지 않은 facility는 빈 `pattern`으로 표현됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsingRule {
    /// 규칙 ID (정규식 캐시 키)
    pub id: i64,
    /// 정규식 패턴 (이름 있는 캡처 그룹 사용)
    pub pattern: String,
    /// 로그 분류 이름 (스키마 레지스트리 키)
    pub log_category: String,
}

impl ParsingRule {
    /// 규칙이 바인딩되지 않은 facility를 나타내는 빈 규칙을 생성합니다.
    pub fn unbound() -> Self {
        Self {
            id: 0,
            pattern: String::new(),
            log_category: String::new(),
        }
    }

    /// 바인딩된 패턴이 없는지 확인합니다.
    pub fn is_unbound(&self) -> bool {
        self.pattern.is_empty()
    }
}

/// 장치 저장소 조회 결과 -- IP로 찾은 장치와 facility에 바인딩된 규칙
///
/// 장치 테이블, 로그 템플릿 테이블, 규칙 테이블을 조인한 평탄화된 형태입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRuleRow {
    /// 장치 스냅샷
    pub device: DeviceIdentity,
    /// facility에 바인딩된 규칙 (없으면 None)
    pub rule: Option<ParsingRule>,
}

/// Syslog facility (RFC 5424 Section 6.2.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Facility {
    Kern,
    User,
    Mail,
    Daemon,
    Auth,
    Syslog,
    Lpr,
    News,
    Uucp,
    Cron,
    Authpriv,
    Ftp,
    Ntp,
    Security,
    Console,
    SolarisCron,
    Local0,
    Local1,
    Local2,
    Local3,
    Local4,
    Local5,
    Local6,
    Local7,
}

impl Facility {
    /// 코드 순서대로 나열한 전체 facility 테이블
    pub const ALL: [Facility; 24] = [
        Facility::Kern,
        Facility::User,
        Facility::Mail,
        Facility::Daemon,
        Facility::Auth,
        Facility::Syslog,
        Facility::Lpr,
        Facility::News,
        Facility::Uucp,
        Facility::Cron,
        Facility::Authpriv,
        Facility::Ftp,
        Facility::Ntp,
        Facility::Security,
        Facility::Console,
        Facility::SolarisCron,
        Facility::Local0,
        Facility::Local1,
        Facility::Local2,
        Facility::Local3,
        Facility::Local4,
        Facility::Local5,
        Facility::Local6,
        Facility::Local7,
    ];

    /// 숫자 코드에서 facility를 찾습니다. 테이블에 없으면 None.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }

    /// 숫자 코드를 반환합니다.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// 소문자 이름을 반환합니다.
    pub fn as_str(self) -> &'static str {
        match self {
            Facility::Kern => "kern",
            Facility::User => "user",
            Facility::Mail => "mail",
            Facility::Daemon => "daemon",
            Facility::Auth => "auth",
            Facility::Syslog => "syslog",
            Facility::Lpr => "lpr",
            Facility::News => "news",
            Facility::Uucp => "uucp",
            Facility::Cron => "cron",
            Facility::Authpriv => "authpriv",
            Facility::Ftp => "ftp",
            Facility::Ntp => "ntp",
            Facility::Security => "security",
            Facility::Console => "console",
            Facility::SolarisCron => "solaris-cron",
            Facility::Local0 => "local0",
            Facility::Local1 => "local1",
            Facility::Local2 => "local2",
            Facility::Local3 => "local3",
            Facility::Local4 => "local4",
            Facility::Local5 => "local5",
            Facility::Local6 => "local6",
            Facility::Local7 => "local7",
        }
    }
}

impl fmt::Display for Facility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Facility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown facility: '{s}'"))
    }
}

/// 검색 클러스터에 등록하는 인덱스 템플릿
///
/// 로그 분류마다 하나씩 생성되며 이후로는 읽기 전용입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexTemplate {
    /// 템플릿 이름 (`<prefix>-<category>`)
    pub name: String,
    /// 적용 대상 인덱스 패턴 (`<prefix>-<category>-*`)
    pub index_pattern: String,
    /// 필드 매핑 (`{"properties": {...}}`)
    pub mappings: serde_json::Value,
}

/// 벌크 쓰기 한 건
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkDocument {
    /// 대상 인덱스 이름 (`<prefix>-<category>-YYYYMMDD`)
    pub index: String,
    /// 문서 ID (레코드 ID)
    pub id: String,
    /// 문서 본문
    pub body: serde_json::Value,
}

/// 벌크 쓰기 결과 요약
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkSummary {
    /// 기록된 문서 수
    pub written: usize,
}

/// 큐에서 꺼낸 메시지 한 건
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    /// 파티션 번호
    pub partition: usize,
    /// 파티션 내 오프셋
    pub offset: u64,
    /// 페이로드 (개행으로 구분된 syslog 라인)
    pub payload: Bytes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facility_codes_follow_rfc5424_order() {
        assert_eq!(Facility::from_code(0), Some(Facility::Kern));
        assert_eq!(Facility::from_code(4), Some(Facility::Auth));
        assert_eq!(Facility::from_code(23), Some(Facility::Local7));
        assert_eq!(Facility::from_code(24), None);
        for (code, facility) in Facility::ALL.iter().enumerate() {
            assert_eq!(usize::from(facility.code()), code);
        }
    }

    #[test]
    fn facility_parses_from_name() {
        assert_eq!("auth".parse::<Facility>().unwrap(), Facility::Auth);
        assert_eq!("LOCAL3".parse::<Facility>().unwrap(), Facility::Local3);
        assert!("bogus".parse::<Facility>().is_err());
    }

    #[test]
    fn facility_serde_uses_names() {
        let json = serde_json::to_string(&Facility::SolarisCron).unwrap();
        assert_eq!(json, "\"solaris-cron\"");
    }

    #[test]
    fn unbound_rule_has_empty_pattern() {
        let rule = ParsingRule::unbound();
        assert!(rule.is_unbound());
    }
}

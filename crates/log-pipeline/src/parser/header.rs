//! Syslog 헤더 파서
//!
//! 모든 장치가 공유하는 고정 헤더를 추출합니다. 헤더 이후의 본문은
//! 장치별 파싱 규칙이 해석합니다.
//!
//! # 헤더 형식
//! ```text
//! YYYY-MM-DD HH:MM:SS HOSTNAME SOURCE-IP FACILITY LEVEL BODY
//! ```
//!
//! # 사용 예시
//! ```ignore
//! use loghive_pipeline::parser::HeaderParser;
//!
//! let parser = HeaderParser::new()?;
//! let header = parser.parse("2020-10-14 10:05:27 ubuntu 192.168.0.58 4 6 sshd[1]: ...")?;
//! assert_eq!(header.facility, Facility::Auth);
//! ```

use std::net::IpAddr;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use regex::Regex;

use loghive_core::types::Facility;

use crate::error::LogPipelineError;

/// 헤더 타임스탬프 형식 (로컬 시간대로 해석)
pub const HEADER_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 헤더 정규식
const HEADER_PATTERN: &str = r"^(?P<timestamp>\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2})\s+(?P<hostname>\S+)\s+(?P<ip>[0-9A-Fa-f:.]+)\s+(?P<facility>\d{1,3})\s+(?P<level>\d{1,3})(?:\s+(?P<body>.*))?$";

/// Syslog 심각도 최댓값 (debug)
const MAX_SYSLOG_LEVEL: u8 = 7;

/// 추출된 헤더
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyslogHeader {
    /// 이벤트 발생 시각 (로컬 시간대)
    pub timestamp: DateTime<Local>,
    /// 호스트명
    pub hostname: String,
    /// 로그를 보낸 장치 IP
    pub source_ip: IpAddr,
    /// syslog facility
    pub facility: Facility,
    /// syslog 심각도 (0-7)
    pub level: u8,
    /// 헤더 이후 본문
    pub body: String,
}

/// 헤더 추출 실패 사유
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeaderError {
    /// 입력 크기 초과
    #[error("input too large: {size} bytes (max: {max})")]
    TooLarge {
        /// 입력 크기
        size: usize,
        /// 허용 최대 크기
        max: usize,
    },

    /// 헤더 형식 불일치
    #[error("malformed header: {0}")]
    Malformed(String),

    /// facility 테이블에 없는 코드
    #[error("unknown facility code {0}")]
    UnknownFacility(u8),
}

/// 공유 헤더 파서
///
/// 정규식은 생성 시 한 번만 컴파일합니다. `&self`로 동작하므로
/// 여러 워커가 `Arc`로 공유할 수 있습니다.
pub struct HeaderParser {
    /// 헤더 정규식
    pattern: Regex,
    /// 최대 허용 입력 크기 (바이트)
    max_input_size: usize,
}

impl HeaderParser {
    /// 기본 설정으로 새 파서를 생성합니다.
    pub fn new() -> Result<Self, LogPipelineError> {
        Ok(Self {
            pattern: Regex::new(HEADER_PATTERN)?,
            max_input_size: 64 * 1024, // 64KB
        })
    }

    /// 최대 입력 크기를 설정합니다.
    pub fn with_max_input_size(mut self, size: usize) -> Self {
        self.max_input_size = size;
        self
    }

    /// 라인에서 헤더를 추출합니다.
    pub fn parse(&self, line: &str) -> Result<SyslogHeader, HeaderError> {
        if line.len() > self.max_input_size {
            return Err(HeaderError::TooLarge {
                size: line.len(),
                max: self.max_input_size,
            });
        }

        let line = line.trim_end_matches(['\r', '\n']);
        let caps = self
            .pattern
            .captures(line)
            .ok_or_else(|| HeaderError::Malformed("header pattern did not match".to_owned()))?;

        // 정규식이 매칭되면 필수 그룹은 항상 존재
        let group = |name: &str| caps.name(name).map_or("", |m| m.as_str());

        let timestamp = parse_local_timestamp(group("timestamp"))?;

        let source_ip: IpAddr = group("ip")
            .parse()
            .map_err(|_| HeaderError::Malformed(format!("invalid source ip '{}'", group("ip"))))?;

        let facility_code: u8 = group("facility").parse().map_err(|_| {
            HeaderError::Malformed(format!("invalid facility '{}'", group("facility")))
        })?;
        let facility =
            Facility::from_code(facility_code).ok_or(HeaderError::UnknownFacility(facility_code))?;

        let level: u8 = group("level")
            .parse()
            .ok()
            .filter(|level| *level <= MAX_SYSLOG_LEVEL)
            .ok_or_else(|| HeaderError::Malformed(format!("invalid level '{}'", group("level"))))?;

        Ok(SyslogHeader {
            timestamp,
            hostname: group("hostname").to_owned(),
            source_ip,
            facility,
            level,
            body: group("body").to_owned(),
        })
    }
}

/// `YYYY-MM-DD HH:MM:SS`를 로컬 시간대로 해석합니다.
///
/// DST 전환으로 모호한 시각은 이른 쪽을, 존재하지 않는 시각은 에러로 처리합니다.
fn parse_local_timestamp(raw: &str) -> Result<DateTime<Local>, HeaderError> {
    let naive = NaiveDateTime::parse_from_str(raw, HEADER_TIMESTAMP_FORMAT)
        .map_err(|e| HeaderError::Malformed(format!("invalid timestamp '{raw}': {e}")))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| HeaderError::Malformed(format!("nonexistent local time '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    const SAMPLE: &str = "2020-10-14 10:05:27 ubuntu 192.168.0.58 4 6 sshd[1]: Accepted password for root";

    fn parser() -> HeaderParser {
        HeaderParser::new().unwrap()
    }

    #[test]
    fn parses_sample_header() {
        let header = parser().parse(SAMPLE).unwrap();
        assert_eq!(header.hostname, "ubuntu");
        assert_eq!(header.source_ip, "192.168.0.58".parse::<IpAddr>().unwrap());
        assert_eq!(header.facility, Facility::Auth);
        assert_eq!(header.level, 6);
        assert_eq!(header.body, "sshd[1]: Accepted password for root");
        assert_eq!(header.timestamp.year(), 2020);
        assert_eq!(header.timestamp.hour(), 10);
        assert_eq!(header.timestamp.second(), 27);
    }

    #[test]
    fn parses_ipv6_source() {
        let header = parser()
            .parse("2021-01-01 00:00:00 db01 fe80::1 3 4 mysqld: ready")
            .unwrap();
        assert!(header.source_ip.is_ipv6());
        assert_eq!(header.facility, Facility::Daemon);
    }

    #[test]
    fn body_may_be_empty() {
        let header = parser()
            .parse("2021-01-01 00:00:00 host 10.0.0.1 0 0")
            .unwrap();
        assert_eq!(header.body, "");
    }

    #[test]
    fn trailing_newline_is_ignored() {
        let header = parser().parse(&format!("{SAMPLE}\r\n")).unwrap();
        assert!(header.body.ends_with("root"));
    }

    #[test]
    fn rejects_missing_header() {
        let err = parser().parse("just some text").unwrap_err();
        assert!(matches!(err, HeaderError::Malformed(_)));
    }

    #[test]
    fn rejects_empty_input() {
        assert!(parser().parse("").is_err());
    }

    #[test]
    fn rejects_unknown_facility() {
        let err = parser()
            .parse("2020-10-14 10:05:27 ubuntu 192.168.0.58 24 6 body")
            .unwrap_err();
        assert_eq!(err, HeaderError::UnknownFacility(24));
    }

    #[test]
    fn rejects_facility_overflowing_u8() {
        let err = parser()
            .parse("2020-10-14 10:05:27 ubuntu 192.168.0.58 999 6 body")
            .unwrap_err();
        assert!(matches!(err, HeaderError::Malformed(_)));
    }

    #[test]
    fn rejects_level_out_of_range() {
        let err = parser()
            .parse("2020-10-14 10:05:27 ubuntu 192.168.0.58 4 8 body")
            .unwrap_err();
        assert!(matches!(err, HeaderError::Malformed(_)));
    }

    #[test]
    fn rejects_invalid_ip() {
        let err = parser()
            .parse("2020-10-14 10:05:27 ubuntu 999.1.1.1 4 6 body")
            .unwrap_err();
        assert!(matches!(err, HeaderError::Malformed(_)));
    }

    #[test]
    fn rejects_invalid_calendar_date() {
        let err = parser()
            .parse("2020-13-40 10:05:27 ubuntu 192.168.0.58 4 6 body")
            .unwrap_err();
        assert!(matches!(err, HeaderError::Malformed(_)));
    }

    #[test]
    fn rejects_oversized_input() {
        let parser = parser().with_max_input_size(16);
        let err = parser.parse(SAMPLE).unwrap_err();
        assert!(matches!(err, HeaderError::TooLarge { .. }));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn arbitrary_input_does_not_panic(input in ".{0,300}") {
                let _ = parser().parse(&input);
            }

            #[test]
            fn every_known_facility_code_parses(code in 0u8..=23, level in 0u8..=7) {
                let line = format!("2022-05-01 12:00:00 h 10.1.2.3 {code} {level} msg");
                let header = parser().parse(&line).unwrap();
                prop_assert_eq!(header.facility.code(), code);
                prop_assert_eq!(header.level, level);
            }
        }
    }
}

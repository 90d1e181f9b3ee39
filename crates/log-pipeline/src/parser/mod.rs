//! 로그 파싱 모듈 -- 공유 syslog 헤더 추출
//!
//! 모든 라인은 먼저 [`HeaderParser`]로 고정 헤더(시각, 호스트명, 송신 IP,
//! facility, 심각도)를 추출합니다. 헤더를 얻지 못한 라인은 어느 장치에도
//! 귀속시킬 수 없으므로 저장하지 않고 폐기합니다.
//!
//! 본문 해석은 장치별 규칙([`rule`](crate::rule))이 담당합니다.

pub mod header;

pub use header::{HeaderError, HeaderParser, SyslogHeader};

/// 페이로드를 개행으로 나눠 비어 있지 않은 라인만 반환합니다.
///
/// 각 라인 끝의 `\r`은 제거합니다.
pub fn split_lines(data: &[u8]) -> impl Iterator<Item = &[u8]> {
    data.split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
}

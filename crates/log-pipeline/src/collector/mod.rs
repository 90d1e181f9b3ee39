//! 로그 수집 모듈 -- 네트워크에서 syslog 라인을 받아 큐에 넣습니다.
//!
//! # 수집 소스
//! - [`SyslogUdpCollector`]: UDP syslog 수신
//!
//! # 아키텍처
//! 수집기는 자체 tokio 태스크에서 실행되며, 받은 라인을 송신 주소의 해시로
//! 고른 [`LogQueue`](loghive_core::backend::LogQueue) 파티션에 넣습니다.
//! 같은 장치의 라인은 항상 같은 파티션으로 가므로 순서가 유지됩니다.

pub mod syslog_udp;

pub use syslog_udp::{SyslogUdpCollector, SyslogUdpConfig};

/// 수집기 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectorStatus {
    /// 실행 대기 중
    Idle,
    /// 실행 중
    Running,
    /// 에러로 중단됨
    Error(String),
    /// 정상 종료됨
    Stopped,
}

//! 파이프라인 trait -- 모듈 생명주기 정의

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::LoghiveError;

/// 모듈 헬스 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// 정상
    Healthy,
    /// 동작은 하지만 성능 저하 또는 일시 장애
    Degraded(String),
    /// 동작 불가
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 동작 불가 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}

/// 시작/정지/헬스 체크 생명주기를 가진 모듈
///
/// `loghive-daemon`은 이 trait을 통해 파이프라인을 관리합니다.
pub trait Pipeline: Send {
    /// 백그라운드 태스크를 시작합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), LoghiveError>> + Send;

    /// 백그라운드 태스크를 정지하고 종료를 기다립니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), LoghiveError>> + Send;

    /// 현재 헬스 상태를 반환합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_status_predicates() {
        assert!(HealthStatus::Healthy.is_healthy());
        assert!(!HealthStatus::Degraded("slow".to_owned()).is_healthy());
        assert!(HealthStatus::Unhealthy("down".to_owned()).is_unhealthy());
    }

    #[test]
    fn health_status_display() {
        let status = HealthStatus::Degraded("worker 2 backing off".to_owned());
        assert_eq!(status.to_string(), "degraded: worker 2 backing off");
    }

    #[test]
    fn health_status_serializes_with_reason() {
        let json = serde_json::to_string(&HealthStatus::Unhealthy("down".to_owned())).unwrap();
        assert_eq!(json, r#"{"Unhealthy":"down"}"#);
        assert_eq!(
            serde_json::to_string(&HealthStatus::Healthy).unwrap(),
            r#""Healthy""#
        );
    }
}

//! 로그 파이프라인 에러 타입
//!
//! [`LogPipelineError`]는 로그 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<LogPipelineError> for LoghiveError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.
//!
//! 라인 단위의 파싱 실패는 에러가 아닙니다. 프로세서는 이를
//! [`LineOutcome`](crate::processor::LineOutcome)으로 표현하고,
//! 이 타입은 인프라 장애와 초기화/설정 오류에만 사용됩니다.

use loghive_core::error::{LoghiveError, PipelineError, StoreError};

/// 로그 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LogPipelineError {
    /// 외부 저장소 장애 (캐시, DB, 큐, 검색 클러스터)
    #[error(transparent)]
    Store(#[from] StoreError),

    /// 인벤토리 파일 로딩 실패
    #[error("inventory load error: {path}: {reason}")]
    InventoryLoad {
        /// 인벤토리 파일 경로
        path: String,
        /// 로딩 실패 사유
        reason: String,
    },

    /// 인벤토리 참조 무결성 위반
    #[error("inventory validation error: {0}")]
    InventoryValidation(String),

    /// 같은 분류에 서로 다른 스키마 등록 시도
    #[error("schema conflict for log category '{0}'")]
    SchemaConflict(String),

    /// 분산 락 획득 시간 초과
    #[error("lock timeout: key '{key}' not acquired within {waited_ms}ms")]
    LockTimeout {
        /// 락 키
        key: String,
        /// 대기 시간 (밀리초)
        waited_ms: u64,
    },

    /// 수집기 에러 (소켓 바인드 등)
    #[error("collector error: {source_type}: {reason}")]
    Collector {
        /// 수집 소스 유형
        source_type: String,
        /// 에러 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 내부 불변식 위반 (라인 하나만 버리고 계속 진행)
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl LogPipelineError {
    /// 인프라 장애인지 확인합니다.
    ///
    /// 인프라 장애는 배치 전체를 커밋하지 않고 재전달받아야 하며,
    /// 그 밖의 에러는 해당 라인만 버리고 계속 진행합니다.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Io(_))
    }
}

impl From<LogPipelineError> for LoghiveError {
    fn from(err: LogPipelineError) -> Self {
        match err {
            LogPipelineError::Store(store) => LoghiveError::Storage(store),
            LogPipelineError::Io(io) => LoghiveError::Io(io),
            other => LoghiveError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}

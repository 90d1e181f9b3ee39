//! 에러 타입 -- 도메인별 에러 정의

/// loghive 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LoghiveError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 생명주기 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 외부 저장소(캐시, DB, 큐, 검색 클러스터) 에러
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 생명주기 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 이미 실행 중
    #[error("pipeline already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline not running")]
    NotRunning,

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 워커 태스크 종료 실패
    #[error("worker join failed: {0}")]
    WorkerJoin(String),
}

/// 외부 저장소 에러
///
/// 모두 인프라 장애로 취급됩니다. 컨슈머는 오프셋을 커밋하지 않고
/// 백오프 후 같은 배치를 다시 받아 처리합니다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// 키-값 저장소 (캐시/락) 에러
    #[error("kv store error: {0}")]
    Kv(String),

    /// 관계형 저장소 (장치/템플릿/규칙 테이블) 에러
    #[error("repository error: {0}")]
    Repository(String),

    /// 검색 클러스터 에러
    #[error("search cluster error: {0}")]
    Search(String),

    /// 메시지 큐 에러
    #[error("queue error: {0}")]
    Queue(String),

    /// 저장된 값의 직렬화/역직렬화 실패
    #[error("codec error: {0}")]
    Codec(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Codec(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_converts_to_loghive_error() {
        let err: LoghiveError = StoreError::Search("connection refused".to_owned()).into();
        assert!(matches!(err, LoghiveError::Storage(StoreError::Search(_))));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn invalid_value_display() {
        let err = ConfigError::InvalidValue {
            field: "queue.partitions".to_owned(),
            reason: "must be greater than 0".to_owned(),
        };
        assert!(err.to_string().contains("queue.partitions"));
    }

    #[test]
    fn json_error_becomes_codec_error() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err: StoreError = json_err.into();
        assert!(matches!(err, StoreError::Codec(_)));
    }
}

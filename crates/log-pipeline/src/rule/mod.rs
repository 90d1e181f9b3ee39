//! 파싱 규칙 -- 규칙 ID별 정규식 컴파일 캐시
//!
//! 규칙 자체(패턴, 로그 분류)는 장치 저장소가 소유하며 해석 캐시를 통해 전달됩니다.
//! 이 모듈은 컴파일 결과만 관리합니다.

pub mod cache;

pub use cache::{CompiledRule, RuleRegexCache};

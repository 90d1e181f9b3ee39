//! 규칙 정규식 캐시
//!
//! 정규식은 규칙 ID로 캐싱합니다. 서로 다른 두 규칙 행이 우연히 같은 패턴
//! 텍스트를 가질 수 있으므로 패턴 텍스트를 키로 쓰지 않습니다.
//! 같은 ID의 패턴 텍스트가 바뀌면(규칙 수정 후 해석 캐시 만료) 다시 컴파일해 교체합니다.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use regex::{Regex, RegexBuilder};

use loghive_core::types::ParsingRule;

/// 컴파일된 정규식 크기 상한
const MAX_COMPILED_SIZE: usize = 1 << 20; // 1MB

/// 컴파일된 규칙
#[derive(Debug)]
pub struct CompiledRule {
    /// 컴파일에 사용한 패턴 텍스트
    pattern: String,
    /// 컴파일된 정규식
    regex: Regex,
}

impl CompiledRule {
    /// 컴파일된 정규식을 반환합니다.
    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    /// 컴파일에 사용한 패턴 텍스트를 반환합니다.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

/// 규칙 ID별 정규식 캐시 (워커 간 공유)
#[derive(Debug, Default)]
pub struct RuleRegexCache {
    entries: RwLock<HashMap<i64, Arc<CompiledRule>>>,
}

impl RuleRegexCache {
    /// 빈 캐시를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 규칙의 정규식을 반환합니다. 캐시에 없거나 패턴이 바뀌었으면 컴파일합니다.
    ///
    /// 컴파일 실패는 캐싱하지 않습니다.
    pub fn get_or_compile(&self, rule: &ParsingRule) -> Result<Arc<CompiledRule>, regex::Error> {
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            match entries.get(&rule.id) {
                Some(compiled) if compiled.pattern == rule.pattern => {
                    return Ok(Arc::clone(compiled));
                }
                _ => {}
            }
        }

        let regex = RegexBuilder::new(&rule.pattern)
            .size_limit(MAX_COMPILED_SIZE)
            .build()?;
        let compiled = Arc::new(CompiledRule {
            pattern: rule.pattern.clone(),
            regex,
        });

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = entries.insert(rule.id, Arc::clone(&compiled)) {
            if previous.pattern != rule.pattern {
                tracing::debug!(rule_id = rule.id, "rule pattern changed, recompiled");
            }
        }
        Ok(compiled)
    }

    /// 모든 항목을 제거하고 제거 건수를 반환합니다.
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let removed = entries.len();
        entries.clear();
        removed
    }

    /// 캐시된 규칙 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// 캐시가 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

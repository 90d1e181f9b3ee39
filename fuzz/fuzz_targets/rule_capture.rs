#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use loghive_core::types::ParsingRule;
use loghive_pipeline::{RuleRegexCache, SchemaRegistry};

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// 규칙 정규식 (운영자가 입력하는 값)
    pattern: String,
    /// 매칭 대상 로그 라인
    line: String,
    /// 분류 선택
    category: u8,
}

fuzz_target!(|input: FuzzInput| {
    let registry = match SchemaRegistry::builder("fuzz").with_builtin() {
        Ok(builder) => builder.build(),
        Err(_) => return,
    };
    let categories: Vec<&str> = registry.categories().collect();
    if categories.is_empty() {
        return;
    }
    let category = categories[usize::from(input.category) % categories.len()];

    let cache = RuleRegexCache::new();
    let rule = ParsingRule {
        id: 1,
        pattern: input.pattern,
        log_category: category.to_owned(),
    };

    // 잘못된 패턴은 Err이어야 하고 크래시는 안 됨
    let Ok(compiled) = cache.get_or_compile(&rule) else {
        return;
    };
    let Some(captures) = compiled.regex().captures(&input.line) else {
        return;
    };

    // 캡처 값의 타입 변환도 Ok/Err만 반환해야 함
    if let Some(schema) = registry.get_schema(category) {
        for field in schema.fields() {
            if let Some(raw) = captures.name(field.name) {
                let _ = field.convert(raw.as_str());
            }
        }
    }
});

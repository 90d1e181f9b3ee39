//! 인덱스 이름과 인덱스 템플릿 생성
//!
//! - 템플릿 이름: `<prefix>-<category>`
//! - 일별 인덱스: `<prefix>-<category>-YYYYMMDD` (수집 시각의 로컬 날짜)

use chrono::{DateTime, Local};
use serde_json::{Map, Value, json};

use loghive_core::types::IndexTemplate;

use super::SchemaDescriptor;
use super::catalog::BASE_FIELDS;

/// 인덱스 이름의 날짜 형식
pub const INDEX_DATE_FORMAT: &str = "%Y%m%d";

/// 분류의 템플릿 이름을 반환합니다.
pub fn template_name(prefix: &str, category: &str) -> String {
    format!("{prefix}-{category}")
}

/// 기록 시점의 일별 인덱스 이름을 반환합니다.
///
/// 이벤트 발생 시각이 아닌 수집 시각으로 계산합니다.
pub fn index_name(prefix: &str, category: &str, ingested_at: &DateTime<Local>) -> String {
    format!(
        "{prefix}-{category}-{}",
        ingested_at.format(INDEX_DATE_FORMAT)
    )
}

/// 서술자로부터 인덱스 템플릿을 생성합니다.
pub fn build_template(prefix: &str, descriptor: &SchemaDescriptor) -> IndexTemplate {
    let mut properties = Map::new();
    for field in BASE_FIELDS.iter().chain(descriptor.fields()) {
        properties.insert(field.name.to_owned(), field.field_type.mapping());
    }

    let name = template_name(prefix, descriptor.category);
    IndexTemplate {
        index_pattern: format!("{name}-*"),
        name,
        mappings: json!({
            "dynamic": false,
            "properties": Value::Object(properties),
        }),
    }
}

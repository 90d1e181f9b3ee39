//! 레코드 스키마 / 인덱스 레지스트리
//!
//! 로그 분류마다 필드 스키마와 인덱스 템플릿을 가집니다.
//! 레지스트리는 시작 시 [`SchemaRegistryBuilder`]로 한 번 구성되며,
//! [`build`](SchemaRegistryBuilder::build) 이후에는 변경할 수 없습니다.
//!
//! ```ignore
//! let registry = SchemaRegistry::builder("loghive").with_builtin()?.build();
//! registry.install_templates(&search).await?;
//!
//! let schema = registry.get_schema("linux-auth");
//! ```

pub mod catalog;
pub mod field;
pub mod template;

pub use field::{FieldError, FieldSpec, FieldType, FieldValue};

use std::collections::BTreeMap;

use chrono::{DateTime, Local};

use loghive_core::backend::SearchIndex;
use loghive_core::types::IndexTemplate;

use crate::error::LogPipelineError;
use catalog::{AUDIT, AUDIT_CATEGORY, COMMON_FIELDS, FAILED, FAILED_CATEGORY};

/// 로그 분류 스키마 서술자
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaDescriptor {
    /// 로그 분류 이름 (인덱스 이름에 사용)
    pub category: &'static str,
    /// 분류 고유 필드
    fields: &'static [FieldSpec],
}

impl SchemaDescriptor {
    /// 서술자를 생성합니다.
    pub const fn new(category: &'static str, fields: &'static [FieldSpec]) -> Self {
        Self { category, fields }
    }

    /// 공통 헤더 필드를 제외한 분류 고유 필드를 반환합니다.
    pub fn own_fields(&self) -> &'static [FieldSpec] {
        self.fields
    }

    /// 공통 헤더 필드를 포함한 모든 타입 필드를 선언 순서대로 반환합니다.
    pub fn fields(&self) -> impl Iterator<Item = &'static FieldSpec> + use<> {
        COMMON_FIELDS.iter().chain(self.fields)
    }
}

/// 불변 스키마 레지스트리
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    index_prefix: String,
    schemas: BTreeMap<&'static str, SchemaDescriptor>,
}

impl SchemaRegistry {
    /// 빌더를 생성합니다.
    pub fn builder(index_prefix: impl Into<String>) -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::new(index_prefix)
    }

    /// 분류의 스키마를 조회합니다. 등록되지 않았으면 None.
    pub fn get_schema(&self, category: &str) -> Option<&SchemaDescriptor> {
        self.schemas.get(category)
    }

    /// 등록된 분류 이름을 정렬 순서로 반환합니다.
    pub fn categories(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.schemas.keys().copied()
    }

    /// 등록된 분류 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// 등록된 분류가 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// 인덱스 접두사를 반환합니다.
    pub fn index_prefix(&self) -> &str {
        &self.index_prefix
    }

    /// 분류와 수집 시각으로 일별 인덱스 이름을 계산합니다.
    pub fn index_name(&self, category: &str, ingested_at: &DateTime<Local>) -> String {
        template::index_name(&self.index_prefix, category, ingested_at)
    }

    /// 설치할 모든 인덱스 템플릿을 반환합니다.
    ///
    /// 등록된 분류에 실패 레코드와 감사 로그 템플릿이 더해집니다.
    pub fn templates(&self) -> Vec<IndexTemplate> {
        self.schemas
            .values()
            .chain([&FAILED, &AUDIT])
            .map(|descriptor| template::build_template(&self.index_prefix, descriptor))
            .collect()
    }

    /// 모든 인덱스 템플릿을 검색 클러스터에 설치합니다.
    ///
    /// 같은 이름의 템플릿은 덮어쓰므로 여러 번 호출해도 결과가 같습니다.
    pub async fn install_templates<S: SearchIndex>(
        &self,
        search: &S,
    ) -> Result<usize, LogPipelineError> {
        let templates = self.templates();
        for template in &templates {
            search.put_template(template).await?;
            tracing::debug!(template = %template.name, "index template installed");
        }
        tracing::info!(count = templates.len(), "index templates installed");
        Ok(templates.len())
    }
}

/// 스키마 레지스트리 빌더
#[derive(Debug)]
pub struct SchemaRegistryBuilder {
    index_prefix: String,
    schemas: BTreeMap<&'static str, SchemaDescriptor>,
}

impl SchemaRegistryBuilder {
    /// 빈 빌더를 생성합니다.
    pub fn new(index_prefix: impl Into<String>) -> Self {
        Self {
            index_prefix: index_prefix.into(),
            schemas: BTreeMap::new(),
        }
    }

    /// 분류 스키마를 등록합니다.
    ///
    /// 같은 서술자를 다시 등록하면 아무것도 하지 않습니다.
    /// 같은 분류에 다른 서술자를 등록하거나 예약된 분류 이름을 쓰면
    /// [`LogPipelineError::SchemaConflict`]를 반환합니다.
    pub fn register(&mut self, descriptor: SchemaDescriptor) -> Result<(), LogPipelineError> {
        if descriptor.category == FAILED_CATEGORY || descriptor.category == AUDIT_CATEGORY {
            return Err(LogPipelineError::SchemaConflict(
                descriptor.category.to_owned(),
            ));
        }

        match self.schemas.get(descriptor.category) {
            Some(existing) if *existing == descriptor => Ok(()),
            Some(_) => Err(LogPipelineError::SchemaConflict(
                descriptor.category.to_owned(),
            )),
            None => {
                self.schemas.insert(descriptor.category, descriptor);
                Ok(())
            }
        }
    }

    /// 기본 제공 분류를 모두 등록합니다.
    pub fn with_builtin(mut self) -> Result<Self, LogPipelineError> {
        for descriptor in catalog::BUILTIN {
            self.register(*descriptor)?;
        }
        Ok(self)
    }

    /// 불변 레지스트리를 생성합니다.
    pub fn build(self) -> SchemaRegistry {
        SchemaRegistry {
            index_prefix: self.index_prefix,
            schemas: self.schemas,
        }
    }
}

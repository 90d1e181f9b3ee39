//! HTTP 검색 클러스터 백엔드
//!
//! Elasticsearch/OpenSearch 호환 REST API를 사용합니다.
//!
//! - 템플릿: `PUT /_index_template/<name>`
//! - 벌크 쓰기: `POST /_bulk` (NDJSON, 문서마다 `index` 액션과 `_id`)

use std::time::Duration;

use serde_json::{Value, json};

use loghive_core::backend::SearchIndex;
use loghive_core::error::StoreError;
use loghive_core::types::{BulkDocument, BulkSummary, IndexTemplate};

use crate::error::LogPipelineError;

/// 템플릿 우선순위 (클러스터 기본 템플릿보다 높게)
const TEMPLATE_PRIORITY: u32 = 200;

/// 에러 응답 본문을 로그/에러 메시지에 담을 최대 길이
const MAX_ERROR_BODY: usize = 512;

/// HTTP 검색 클러스터 클라이언트
#[derive(Debug, Clone)]
pub struct HttpSearchIndex {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSearchIndex {
    /// 클러스터 URL과 요청 타임아웃으로 클라이언트를 생성합니다.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, LogPipelineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LogPipelineError::Config {
                field: "search.url".to_owned(),
                reason: format!("failed to build http client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// 클러스터 기본 URL을 반환합니다.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl SearchIndex for HttpSearchIndex {
    async fn put_template(&self, template: &IndexTemplate) -> Result<(), StoreError> {
        let url = format!("{}/_index_template/{}", self.base_url, template.name);
        let response = self
            .client
            .put(&url)
            .json(&template_body(template))
            .send()
            .await
            .map_err(|e| StoreError::Search(format!("template request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Search(format!(
                "template '{}' rejected with {status}: {}",
                template.name,
                truncate(&body)
            )));
        }
        Ok(())
    }

    async fn bulk(&self, documents: Vec<BulkDocument>) -> Result<BulkSummary, StoreError> {
        if documents.is_empty() {
            return Ok(BulkSummary::default());
        }

        let written = documents.len();
        let body = encode_bulk_body(&documents)?;
        let response = self
            .client
            .post(format!("{}/_bulk", self.base_url))
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(|e| StoreError::Search(format!("bulk request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| StoreError::Search(format!("bulk response unreadable: {e}")))?;
        if !status.is_success() {
            return Err(StoreError::Search(format!(
                "bulk rejected with {status}: {}",
                truncate(&text)
            )));
        }

        let parsed: Value = serde_json::from_str(&text)?;
        check_bulk_response(&parsed)?;
        Ok(BulkSummary { written })
    }
}

/// 인덱스 템플릿 요청 본문을 생성합니다.
pub fn template_body(template: &IndexTemplate) -> Value {
    json!({
        "index_patterns": [template.index_pattern],
        "priority": TEMPLATE_PRIORITY,
        "template": {
            "mappings": template.mappings,
        },
    })
}

/// 벌크 요청 NDJSON 본문을 생성합니다 (마지막 줄도 개행으로 끝남).
pub fn encode_bulk_body(documents: &[BulkDocument]) -> Result<String, StoreError> {
    let mut body = String::new();
    for document in documents {
        let action = json!({ "index": { "_index": document.index, "_id": document.id } });
        body.push_str(&serde_json::to_string(&action)?);
        body.push('\n');
        body.push_str(&serde_json::to_string(&document.body)?);
        body.push('\n');
    }
    Ok(body)
}

/// 벌크 응답에서 항목 단위 실패를 찾습니다.
pub fn check_bulk_response(response: &Value) -> Result<(), StoreError> {
    if !response["errors"].as_bool().unwrap_or(false) {
        return Ok(());
    }

    let items = response["items"].as_array();
    let failed = items.map_or(0, |items| {
        items
            .iter()
            .filter(|item| !item["index"]["error"].is_null())
            .count()
    });
    let first_reason = items
        .and_then(|items| {
            items
                .iter()
                .find_map(|item| item["index"]["error"]["reason"].as_str())
        })
        .unwrap_or("unknown");

    Err(StoreError::Search(format!(
        "bulk had {failed} rejected item(s), first: {first_reason}"
    )))
}

fn truncate(text: &str) -> &str {
    match text.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

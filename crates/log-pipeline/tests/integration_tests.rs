//! 통합 테스트 -- 파이프라인 전체 흐름 검증
//!
//! 인메모리 큐/키-값 저장소/검색 인덱스와 YAML 인벤토리로
//! 큐 적재부터 일별 인덱스 기록, 오프셋 커밋, 장치 통계까지 검증합니다.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;

use loghive_core::backend::KvStore;
use loghive_core::pipeline::Pipeline;
use loghive_pipeline::resolve::Inventory;
use loghive_pipeline::{
    DistributedLock, InventoryRepository, LockOptions, LogPipeline, MemoryKvStore, MemoryQueue,
    MemorySearchIndex, PipelineConfig, SchemaRegistry,
};

type TestPipeline = LogPipeline<InventoryRepository, MemoryKvStore, MemorySearchIndex, MemoryQueue>;

const AUTH_LINE: &str =
    "2020-10-14 10:05:27 ubuntu 192.168.0.58 4 6 sshd[1]: Accepted password for root from 10.0.0.1 port 22";

fn inventory_yaml(monitored: bool, bind_auth: bool) -> String {
    let binding = if bind_auth { "      auth: 1" } else { "      kern: 1" };
    format!(
        r#"
rules:
  - id: 1
    pattern: '^(?P<timestamp>\S+ \S+) (?P<hostname>\S+) (?P<ip>\S+) (?P<facility>\d+) (?P<level>\d+)'
    log_category: linux-auth
templates:
  - id: 1
    name: linux-default
    rules:
{binding}
devices:
  - id: 1
    name: ubuntu
    ip: 192.168.0.58
    device_type: Linux
    category: server
    log_monitoring_enabled: {monitored}
    template_id: 1
"#
    )
}

struct Env {
    pipeline: TestPipeline,
    queue: Arc<MemoryQueue>,
    search: Arc<MemorySearchIndex>,
    kv: Arc<MemoryKvStore>,
}

fn env(monitored: bool, bind_auth: bool) -> Env {
    let inventory = Inventory::parse_yaml(&inventory_yaml(monitored, bind_auth), "test").unwrap();
    let repository = Arc::new(InventoryRepository::new(inventory).unwrap());
    let config = PipelineConfig::builder()
        .partitions(2)
        .poll_timeout(Duration::from_millis(20))
        .backoff(Duration::from_millis(10), Duration::from_millis(50))
        .key_prefix("it")
        .index_prefix("logs")
        .build()
        .unwrap();

    let queue = Arc::new(MemoryQueue::new(2));
    let search = Arc::new(MemorySearchIndex::new());
    let kv = Arc::new(MemoryKvStore::new());
    let pipeline = LogPipeline::builder(config)
        .repository(repository)
        .kv(Arc::clone(&kv))
        .search(Arc::clone(&search))
        .queue(Arc::clone(&queue))
        .build()
        .unwrap();

    Env {
        pipeline,
        queue,
        search,
        kv,
    }
}

/// 모든 메시지가 커밋될 때까지 기다립니다.
async fn wait_drained(queue: &MemoryQueue) {
    for _ in 0..500 {
        if queue.uncommitted() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("queue not drained: {} uncommitted", queue.uncommitted());
}

fn today_index(category: &str) -> String {
    format!("logs-{category}-{}", Local::now().format("%Y%m%d"))
}

/// 규칙과 일치하는 라인은 분류 인덱스에 성공 레코드 하나로 기록됩니다.
#[tokio::test]
async fn scenario_matching_rule_stores_success_record() {
    let mut env = env(true, true);
    env.queue.publish_keyed("192.168.0.58", AUTH_LINE).unwrap();

    env.pipeline.start().await.unwrap();
    wait_drained(&env.queue).await;
    env.pipeline.stop().await.unwrap();

    let docs = env.search.documents(&today_index("linux-auth"));
    assert_eq!(docs.len(), 1);
    let body = &docs[0].body;
    assert_eq!(body["status"], true);
    assert_eq!(body["hostname"], "ubuntu");
    assert_eq!(body["ip"], "192.168.0.58");
    assert_eq!(body["facility"], 4);
    assert_eq!(body["level"], 6);
    assert!(body["src_ip"].is_null());
    assert!(body["src_port"].is_null());
    assert_eq!(body["dev_id"], 1);
    assert_eq!(body["log_content"], AUTH_LINE);
    assert_eq!(env.search.total_documents(), 1);
}

/// 모니터링이 꺼진 장치의 라인은 어떤 인덱스에도 기록되지 않습니다.
#[tokio::test]
async fn scenario_unmonitored_device_stores_nothing() {
    let mut env = env(false, true);
    env.queue.publish_keyed("192.168.0.58", AUTH_LINE).unwrap();

    env.pipeline.start().await.unwrap();
    wait_drained(&env.queue).await;
    assert!(env.pipeline.health_check().await.is_healthy());
    env.pipeline.stop().await.unwrap();

    assert_eq!(env.search.total_documents(), 0);
    assert_eq!(env.pipeline.stats().discarded, 1);
}

/// facility에 규칙이 없으면 원본 라인을 담은 실패 레코드 하나가 기록됩니다.
#[tokio::test]
async fn scenario_missing_rule_stores_failed_record() {
    let mut env = env(true, false);
    env.queue.publish_keyed("192.168.0.58", AUTH_LINE).unwrap();

    env.pipeline.start().await.unwrap();
    wait_drained(&env.queue).await;
    env.pipeline.stop().await.unwrap();

    let docs = env.search.documents(&today_index("failed"));
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].body["status"], false);
    assert_eq!(docs[0].body["log_content"], AUTH_LINE);
    assert_eq!(docs[0].body["failure_reason"], "rule_unbound");
    assert_eq!(env.search.total_documents(), 1);
}

/// 같은 장치의 라인 21개는 누적/오늘 카운터를 21만큼 올립니다.
#[tokio::test]
async fn scenario_device_counters_track_stored_lines() {
    let mut env = env(true, true);
    let stats = env.pipeline.device_stats().clone();
    let before = stats.total(1).await.unwrap();

    for _ in 0..21 {
        env.queue.publish_keyed("192.168.0.58", AUTH_LINE).unwrap();
    }

    env.pipeline.start().await.unwrap();
    wait_drained(&env.queue).await;
    env.pipeline.stop().await.unwrap();

    assert_eq!(stats.total(1).await.unwrap() - before, 21);
    assert_eq!(stats.today(1).await.unwrap(), 21);
    assert_eq!(env.search.total_documents(), 21);
}

/// 한 워커의 레코드 ID는 기록 순서대로 증가합니다.
#[tokio::test]
async fn record_ids_increase_within_partition() {
    let mut env = env(true, true);
    let (partition, _) = env.queue.publish_keyed("192.168.0.58", AUTH_LINE).unwrap();
    for _ in 0..9 {
        env.queue.publish(partition, AUTH_LINE).unwrap();
    }

    env.pipeline.start().await.unwrap();
    wait_drained(&env.queue).await;
    env.pipeline.stop().await.unwrap();

    let ids: Vec<String> = env
        .search
        .documents(&today_index("linux-auth"))
        .into_iter()
        .map(|doc| doc.id)
        .collect();
    assert_eq!(ids.len(), 10);
    assert!(ids.windows(2).all(|w| w[0] < w[1]), "{ids:?}");
}

/// 벌크 쓰기가 실패하면 배치가 재전달되어 결국 기록됩니다.
#[tokio::test]
async fn bulk_failure_is_redelivered() {
    let mut env = env(true, true);
    env.search.fail_next_bulk(2);
    env.queue.publish_keyed("192.168.0.58", AUTH_LINE).unwrap();

    env.pipeline.start().await.unwrap();
    wait_drained(&env.queue).await;
    env.pipeline.stop().await.unwrap();

    assert_eq!(env.search.total_documents(), 1);
    assert!(env.search.bulk_calls() >= 3);
}

/// 캐시 장애 중에는 커밋하지 않고, 복구 후 처리합니다.
#[tokio::test]
async fn kv_outage_degrades_then_recovers() {
    let mut env = env(true, true);
    env.kv.set_unavailable(true);
    env.queue.publish_keyed("192.168.0.58", AUTH_LINE).unwrap();

    env.pipeline.start().await.unwrap();

    let mut degraded = false;
    for _ in 0..200 {
        if !env.pipeline.health_check().await.is_healthy() {
            degraded = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(degraded);
    assert_eq!(env.queue.uncommitted(), 1);

    env.kv.set_unavailable(false);
    wait_drained(&env.queue).await;
    env.pipeline.stop().await.unwrap();

    assert_eq!(env.search.total_documents(), 1);
}

/// 해석 결과는 캐시되어 두 번째 라인부터 장치 저장소를 읽지 않습니다.
#[tokio::test]
async fn resolution_is_cached_in_kv_store() {
    let mut env = env(true, true);
    env.queue.publish_keyed("192.168.0.58", AUTH_LINE).unwrap();

    env.pipeline.start().await.unwrap();
    wait_drained(&env.queue).await;
    env.pipeline.stop().await.unwrap();

    assert!(
        env.kv
            .get("it:resolve:192.168.0.58:4")
            .await
            .unwrap()
            .is_some()
    );
    assert_eq!(env.pipeline.clean_cache().await.unwrap(), 1);
}

/// 템플릿 설치는 두 번 호출해도 분류당 템플릿 하나입니다.
#[tokio::test]
async fn template_installation_is_idempotent() {
    let search = MemorySearchIndex::new();
    let registry = SchemaRegistry::builder("logs")
        .with_builtin()
        .unwrap()
        .build();

    let first = registry.install_templates(&search).await.unwrap();
    let second = registry.install_templates(&search).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(search.template_names().len(), first);
    assert!(
        search
            .template_names()
            .contains(&"logs-linux-auth".to_owned())
    );
    assert!(search.template_names().contains(&"logs-failed".to_owned()));
}

/// 두 프로세스가 같은 락 키로 경쟁하면 임계 구역이 겹치지 않습니다.
#[tokio::test]
async fn lock_serialises_competing_holders() {
    let kv = Arc::new(MemoryKvStore::new());
    let first = DistributedLock::new(Arc::clone(&kv), "it", Duration::from_millis(5));
    let second = DistributedLock::new(Arc::clone(&kv), "it", Duration::from_millis(5));
    let options = LockOptions::new(Duration::from_secs(2));

    let guard = first.acquire("templates", options).await.unwrap().unwrap();
    let waiter = tokio::spawn(async move {
        let started = tokio::time::Instant::now();
        let guard = second.acquire("templates", options).await.unwrap().unwrap();
        let waited = started.elapsed();
        second.release(guard).await.unwrap();
        waited
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    first.release(guard).await.unwrap();

    let waited = waiter.await.unwrap();
    assert!(waited >= Duration::from_millis(40), "{waited:?}");
}

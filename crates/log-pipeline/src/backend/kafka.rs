//! Kafka 메시지 큐
//!
//! [`KafkaQueue`]는 토픽의 파티션마다 별도의 수신 큐를 두어 파티션 워커가 서로를
//! 기다리지 않게 합니다. 오프셋은 자동 커밋하지 않고 [`LogQueue::commit`]이 호출될
//! 때만 동기 커밋합니다.
//!
//! 리밸런스 이벤트는 메인 큐로 전달되므로 생성 시 메인 큐를 계속 폴링하는 태스크를
//! 띄웁니다. 이 태스크는 `KafkaQueue`가 드롭될 때 함께 종료됩니다.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::stream_consumer::StreamPartitionQueue;
use rdkafka::consumer::{CommitMode, Consumer, DefaultConsumerContext, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::{Message, Offset, TopicPartitionList};
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use loghive_core::backend::LogQueue;
use loghive_core::error::StoreError;
use loghive_core::types::QueueMessage;

use crate::config::PipelineConfig;
use crate::error::LogPipelineError;

/// 브로커 요청(커밋, seek, 전송) 타임아웃
const BROKER_TIMEOUT: Duration = Duration::from_secs(10);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn queue_error(context: &str, err: KafkaError) -> StoreError {
    StoreError::Queue(format!("{context}: {err}"))
}

#[derive(Debug, Default)]
struct Cursor {
    /// 마지막으로 커밋한 다음 오프셋
    committed: Option<u64>,
    /// 커밋 이전에 처음 꺼낸 오프셋
    first_pulled: Option<u64>,
}

impl Cursor {
    fn rewind_target(&self) -> Option<u64> {
        self.committed.or(self.first_pulled)
    }
}

struct PartitionReader {
    queue: StreamPartitionQueue<DefaultConsumerContext>,
    cursor: Mutex<Cursor>,
}

/// rdkafka 기반 [`LogQueue`] 구현
pub struct KafkaQueue {
    topic: String,
    consumer: Arc<StreamConsumer>,
    producer: FutureProducer,
    readers: Vec<PartitionReader>,
    _poller: DropGuard,
}

impl std::fmt::Debug for KafkaQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaQueue")
            .field("topic", &self.topic)
            .field("partitions", &self.readers.len())
            .finish_non_exhaustive()
    }
}

impl KafkaQueue {
    /// 컨슈머와 프로듀서를 만들고 토픽을 구독합니다.
    ///
    /// 메인 큐 폴링 태스크를 띄우므로 tokio 런타임 안에서 호출해야 합니다.
    /// 토픽의 파티션 수는 `queue.partitions`와 같아야 합니다.
    pub fn new(config: &PipelineConfig) -> Result<Self, LogPipelineError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.queue_brokers)
            .set("group.id", &config.queue_group_id)
            .set("enable.auto.commit", "false")
            .set("enable.auto.offset.store", "false")
            .set("auto.offset.reset", "earliest")
            .create()
            .map_err(|e| kafka_config_error("queue.brokers", e))?;
        let consumer = Arc::new(consumer);

        let mut readers = Vec::with_capacity(config.partitions);
        for partition in 0..config.partitions {
            let index = partition_index(partition)?;
            let queue = consumer
                .split_partition_queue(&config.queue_topic, index)
                .ok_or_else(|| LogPipelineError::Config {
                    field: "queue.partitions".to_owned(),
                    reason: format!("cannot open partition queue {partition}"),
                })?;
            readers.push(PartitionReader {
                queue,
                cursor: Mutex::new(Cursor::default()),
            });
        }

        consumer
            .subscribe(&[config.queue_topic.as_str()])
            .map_err(|e| kafka_config_error("queue.topic", e))?;

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.queue_brokers)
            .set("message.timeout.ms", BROKER_TIMEOUT.as_millis().to_string())
            .create()
            .map_err(|e| kafka_config_error("queue.brokers", e))?;

        let token = CancellationToken::new();
        tokio::spawn(poll_main_queue(Arc::clone(&consumer), token.clone()));

        info!(
            brokers = %config.queue_brokers,
            topic = %config.queue_topic,
            group = %config.queue_group_id,
            partitions = config.partitions,
            "kafka queue subscribed"
        );

        Ok(Self {
            topic: config.queue_topic.clone(),
            consumer,
            producer,
            readers,
            _poller: token.drop_guard(),
        })
    }

    fn reader(&self, partition: usize) -> Result<&PartitionReader, StoreError> {
        self.readers
            .get(partition)
            .ok_or_else(|| StoreError::Queue(format!("unknown partition {partition}")))
    }

    async fn commit_offset(&self, partition: usize, next_offset: u64) -> Result<(), StoreError> {
        let mut list = TopicPartitionList::new();
        list.add_partition_offset(
            &self.topic,
            partition_index(partition).map_err(|e| StoreError::Queue(e.to_string()))?,
            Offset::Offset(to_kafka_offset(next_offset)?),
        )
        .map_err(|e| queue_error("commit", e))?;

        let consumer = Arc::clone(&self.consumer);
        tokio::task::spawn_blocking(move || consumer.commit(&list, CommitMode::Sync))
            .await
            .map_err(|e| StoreError::Queue(format!("commit task failed: {e}")))?
            .map_err(|e| queue_error("commit", e))
    }

    async fn seek(&self, partition: usize, offset: u64) -> Result<(), StoreError> {
        let index = partition_index(partition).map_err(|e| StoreError::Queue(e.to_string()))?;
        let target = Offset::Offset(to_kafka_offset(offset)?);
        let consumer = Arc::clone(&self.consumer);
        let topic = self.topic.clone();
        tokio::task::spawn_blocking(move || consumer.seek(&topic, index, target, BROKER_TIMEOUT))
            .await
            .map_err(|e| StoreError::Queue(format!("seek task failed: {e}")))?
            .map_err(|e| queue_error("seek", e))
    }
}

impl LogQueue for KafkaQueue {
    fn partitions(&self) -> usize {
        self.readers.len()
    }

    async fn produce(&self, key: &str, payload: Bytes) -> Result<(usize, u64), StoreError> {
        let partition = super::partition_for_key(key, self.readers.len());
        let index = partition_index(partition).map_err(|e| StoreError::Queue(e.to_string()))?;
        let record = FutureRecord::to(&self.topic)
            .key(key)
            .payload(&payload[..])
            .partition(index);

        let (_, offset) = self
            .producer
            .send(record, BROKER_TIMEOUT)
            .await
            .map_err(|(e, _)| queue_error("produce", e))?;
        Ok((partition, from_kafka_offset(offset)?))
    }

    async fn pull(
        &self,
        partition: usize,
        max: usize,
        timeout: Duration,
    ) -> Result<Vec<QueueMessage>, StoreError> {
        let reader = self.reader(partition)?;
        let deadline = Instant::now() + timeout;
        let mut batch = Vec::new();

        while batch.len() < max {
            // 첫 메시지만 기다리고 이후에는 이미 도착한 것만 가져갑니다
            let wait_until = if batch.is_empty() {
                deadline
            } else {
                Instant::now()
            };
            let message = match tokio::time::timeout_at(wait_until, reader.queue.recv()).await {
                Ok(Ok(message)) => message,
                Ok(Err(e)) if batch.is_empty() => return Err(queue_error("pull", e)),
                Ok(Err(e)) => {
                    warn!(partition, error = %e, "kafka receive failed mid-batch");
                    break;
                }
                Err(_) => break,
            };
            batch.push(QueueMessage {
                partition,
                offset: from_kafka_offset(message.offset())?,
                payload: message
                    .payload()
                    .map(Bytes::copy_from_slice)
                    .unwrap_or_default(),
            });
        }

        if let Some(first) = batch.first() {
            let mut cursor = lock(&reader.cursor);
            if cursor.committed.is_none() && cursor.first_pulled.is_none() {
                cursor.first_pulled = Some(first.offset);
            }
        }
        Ok(batch)
    }

    async fn commit(&self, partition: usize, next_offset: u64) -> Result<(), StoreError> {
        let reader = self.reader(partition)?;
        self.commit_offset(partition, next_offset).await?;

        let mut cursor = lock(&reader.cursor);
        cursor.committed = Some(cursor.committed.map_or(next_offset, |c| c.max(next_offset)));
        debug!(partition, next_offset, "kafka offset committed");
        Ok(())
    }

    async fn seek_to_committed(&self, partition: usize) -> Result<(), StoreError> {
        let reader = self.reader(partition)?;
        let target = lock(&reader.cursor).rewind_target();
        match target {
            Some(offset) => {
                self.seek(partition, offset).await?;
                debug!(partition, offset, "kafka partition rewound");
            }
            None => debug!(partition, "nothing pulled yet, seek skipped"),
        }
        Ok(())
    }
}

async fn poll_main_queue(consumer: Arc<StreamConsumer>, token: CancellationToken) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            result = consumer.recv() => match result {
                Ok(message) => warn!(
                    partition = message.partition(),
                    offset = message.offset(),
                    "message arrived on the main queue, not on a partition queue"
                ),
                Err(e) => warn!(error = %e, "kafka consumer error"),
            },
        }
    }
    debug!("kafka main queue poller stopped");
}

fn kafka_config_error(field: &str, err: KafkaError) -> LogPipelineError {
    LogPipelineError::Config {
        field: field.to_owned(),
        reason: err.to_string(),
    }
}

fn partition_index(partition: usize) -> Result<i32, LogPipelineError> {
    i32::try_from(partition).map_err(|_| LogPipelineError::Config {
        field: "queue.partitions".to_owned(),
        reason: format!("partition {partition} does not fit a kafka partition id"),
    })
}

fn to_kafka_offset(offset: u64) -> Result<i64, StoreError> {
    i64::try_from(offset).map_err(|_| StoreError::Queue(format!("offset {offset} out of range")))
}

fn from_kafka_offset(offset: i64) -> Result<u64, StoreError> {
    u64::try_from(offset).map_err(|_| StoreError::Queue(format!("invalid kafka offset {offset}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewind_prefers_committed_offset() {
        let mut cursor = Cursor::default();
        assert_eq!(cursor.rewind_target(), None);

        cursor.first_pulled = Some(40);
        assert_eq!(cursor.rewind_target(), Some(40));

        cursor.committed = Some(57);
        assert_eq!(cursor.rewind_target(), Some(57));
    }

    #[test]
    fn offsets_reject_negative_and_oversized_values() {
        assert_eq!(from_kafka_offset(12).unwrap(), 12);
        assert!(from_kafka_offset(-1001).is_err());
        assert_eq!(to_kafka_offset(12).unwrap(), 12);
        assert!(to_kafka_offset(u64::MAX).is_err());
    }

    #[test]
    fn partition_index_fits_i32() {
        assert_eq!(partition_index(3).unwrap(), 3);
        assert!(partition_index(usize::MAX).is_err());
    }

    #[tokio::test]
    async fn unknown_partition_is_rejected_without_broker_traffic() {
        // 클라이언트 생성은 브로커 연결을 기다리지 않습니다
        let config = PipelineConfig::builder()
            .kafka("127.0.0.1:1", "loghive-test", "loghive-test")
            .partitions(2)
            .build()
            .unwrap();
        let queue = KafkaQueue::new(&config).unwrap();

        assert_eq!(queue.partitions(), 2);
        assert!(queue.pull(5, 1, Duration::ZERO).await.is_err());
        assert!(queue.seek_to_committed(5).await.is_err());
        // 아직 꺼낸 메시지가 없으면 seek 없이 성공
        queue.seek_to_committed(0).await.unwrap();
    }
}

//! UDP Syslog 수집기
//!
//! 설정된 주소에 바인드해 syslog 데이터그램을 받습니다.
//! 데이터그램 하나에 여러 라인이 있으면 라인마다 큐 메시지 하나로 넣습니다.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use metrics::counter;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use loghive_core::backend::LogQueue;
use loghive_core::metrics as m;

use super::CollectorStatus;
use crate::error::LogPipelineError;
use crate::parser::split_lines;

/// UDP syslog 수집기 설정
#[derive(Debug, Clone)]
pub struct SyslogUdpConfig {
    /// 바인드 주소 (예: "0.0.0.0:514")
    pub bind_addr: String,
    /// 최대 메시지 크기 (바이트, UDP이므로 일반적으로 65535 이하)
    pub max_message_size: usize,
}

impl Default for SyslogUdpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:514".to_owned(),
            max_message_size: 65535,
        }
    }
}

/// UDP Syslog 수집기
///
/// 송신 IP를 키로 [`LogQueue::produce`]에 넘기므로 같은 장치의 라인은 한 파티션에 모입니다.
pub struct SyslogUdpCollector<Q> {
    config: SyslogUdpConfig,
    socket: UdpSocket,
    queue: Arc<Q>,
    cancel_token: CancellationToken,
    status: CollectorStatus,
}

impl<Q: LogQueue> SyslogUdpCollector<Q> {
    /// 소켓을 바인드하고 수집기를 생성합니다.
    pub async fn bind(
        config: SyslogUdpConfig,
        queue: Arc<Q>,
        cancel_token: CancellationToken,
    ) -> Result<Self, LogPipelineError> {
        let socket = UdpSocket::bind(&config.bind_addr)
            .await
            .map_err(|e| LogPipelineError::Collector {
                source_type: "syslog_udp".to_owned(),
                reason: format!("failed to bind to {}: {e}", config.bind_addr),
            })?;

        Ok(Self {
            config,
            socket,
            queue,
            cancel_token,
            status: CollectorStatus::Idle,
        })
    }

    /// 실제로 바인드된 주소를 반환합니다.
    pub fn local_addr(&self) -> Result<SocketAddr, LogPipelineError> {
        Ok(self.socket.local_addr()?)
    }

    /// 현재 상태를 반환합니다.
    pub fn status(&self) -> &CollectorStatus {
        &self.status
    }

    /// 수신 루프를 실행합니다. 취소될 때까지 실행됩니다.
    ///
    /// 큐에 넣지 못한 데이터그램은 로그만 남기고 버립니다.
    pub async fn run(&mut self) -> Result<(), LogPipelineError> {
        self.status = CollectorStatus::Running;
        info!(bind = %self.config.bind_addr, "UDP syslog collector listening");

        let mut buf = vec![0u8; self.config.max_message_size];
        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buf) => {
                    let (len, peer) = match result {
                        Ok(received) => received,
                        Err(e) => {
                            warn!(error = %e, "UDP receive error");
                            continue;
                        }
                    };
                    self.publish(&buf[..len], peer).await;
                }
                _ = self.cancel_token.cancelled() => {
                    info!("UDP syslog collector received shutdown signal");
                    self.status = CollectorStatus::Stopped;
                    break;
                }
            }
        }

        Ok(())
    }

    async fn publish(&self, datagram: &[u8], peer: SocketAddr) {
        let key = peer.ip().to_string();
        for line in split_lines(datagram) {
            match self
                .queue
                .produce(&key, Bytes::copy_from_slice(line))
                .await
            {
                Ok((partition, offset)) => {
                    counter!(m::COLLECTOR_LINES_RECEIVED_TOTAL).increment(1);
                    debug!(%peer, partition, offset, "syslog line queued");
                }
                Err(e) => warn!(%peer, error = %e, "failed to queue syslog line"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::backend::MemoryQueue;

    fn local_config() -> SyslogUdpConfig {
        SyslogUdpConfig {
            bind_addr: "127.0.0.1:0".to_owned(),
            ..SyslogUdpConfig::default()
        }
    }

    #[test]
    fn default_config() {
        let config = SyslogUdpConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:514");
        assert_eq!(config.max_message_size, 65535);
    }

    #[tokio::test]
    async fn collector_starts_idle() {
        let queue = Arc::new(MemoryQueue::new(1));
        let collector = SyslogUdpCollector::bind(local_config(), queue, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(*collector.status(), CollectorStatus::Idle);
    }

    #[tokio::test]
    async fn bind_failure_is_collector_error() {
        let queue = Arc::new(MemoryQueue::new(1));
        let config = SyslogUdpConfig {
            bind_addr: "not-an-address".to_owned(),
            ..SyslogUdpConfig::default()
        };
        let err = SyslogUdpCollector::bind(config, queue, CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, LogPipelineError::Collector { .. }));
    }

    #[tokio::test]
    async fn datagram_lines_are_queued_on_one_partition() {
        let queue = Arc::new(MemoryQueue::new(4));
        let cancel = CancellationToken::new();
        let mut collector =
            SyslogUdpCollector::bind(local_config(), Arc::clone(&queue), cancel.clone())
                .await
                .unwrap();
        let addr = collector.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            collector.run().await.unwrap();
            collector
        });

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender
            .send_to(b"line one\nline two\n", addr)
            .await
            .unwrap();

        let partition = queue.partition_for(&sender.local_addr().unwrap().ip().to_string());
        let mut received = Vec::new();
        while received.len() < 2 {
            let batch = queue
                .pull(partition, 10, Duration::from_secs(5))
                .await
                .unwrap();
            assert!(!batch.is_empty(), "timed out waiting for datagram");
            received.extend(batch);
        }
        assert_eq!(received[0].payload, Bytes::from_static(b"line one"));
        assert_eq!(received[1].payload, Bytes::from_static(b"line two"));

        cancel.cancel();
        let collector = handle.await.unwrap();
        assert_eq!(*collector.status(), CollectorStatus::Stopped);
    }
}

//! 분산 락
//!
//! 키-값 저장소의 조건부 쓰기(`set_nx_ex`)로 구현한 짧은 상호 배제입니다.
//! 드물게 일어나는 워커 간/프로세스 간 부수 효과(감사 로그, 템플릿 설치)에만 사용하며
//! 파싱 경로에는 사용하지 않습니다.
//!
//! - `expiry`: 해제하지 못한 락이 자동으로 풀리는 시간. 획득 대기의 상한이기도 합니다.
//! - `force_drop`: 이미 잡혀 있으면 기다리지 않고 건너뜁니다.
//! - `delay`: 해제 후에도 키를 이 시간 동안 남겨 직후의 중복 이벤트를 막습니다.
//!
//! ```ignore
//! let lock = DistributedLock::new(kv, "loghive", Duration::from_millis(20));
//! let outcome = lock
//!     .run_locked("session-timeout:42", LockOptions::new(expiry).force_drop(true), async {
//!         audit.write(...).await
//!     })
//!     .await?;
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::time::Instant;

use loghive_core::backend::KvStore;
use loghive_core::metrics as m;

use crate::error::LogPipelineError;

/// 락 획득 옵션
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    /// 자동 해제 시간
    pub expiry: Duration,
    /// 경합 시 대기하지 않고 건너뜀
    pub force_drop: bool,
    /// 해제 후 키 유지 시간
    pub delay: Option<Duration>,
}

impl LockOptions {
    /// 만료 시간만 지정한 옵션을 생성합니다.
    pub fn new(expiry: Duration) -> Self {
        Self {
            expiry,
            force_drop: false,
            delay: None,
        }
    }

    /// 경합 시 건너뛸지 설정합니다.
    pub fn force_drop(mut self, force_drop: bool) -> Self {
        self.force_drop = force_drop;
        self
    }

    /// 해제 후 키 유지 시간을 설정합니다.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// 획득한 락
///
/// [`release`](Self::release)로 해제합니다. 해제하지 않으면 `expiry` 후에 풀립니다.
#[derive(Debug)]
#[must_use = "a lock guard must be released"]
pub struct LockGuard {
    key: String,
    token: String,
    delay: Option<Duration>,
}

impl LockGuard {
    /// 락 키를 반환합니다.
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// 키-값 저장소 기반 분산 락
pub struct DistributedLock<K> {
    kv: Arc<K>,
    key_prefix: String,
    poll_interval: Duration,
}

impl<K: KvStore> DistributedLock<K> {
    /// 새 락 서비스를 생성합니다.
    pub fn new(kv: Arc<K>, key_prefix: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            kv,
            key_prefix: key_prefix.into(),
            poll_interval,
        }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}:lock:{key}", self.key_prefix)
    }

    /// 락을 획득합니다.
    ///
    /// - 획득하면 `Ok(Some(guard))`
    /// - `force_drop`이고 이미 잡혀 있으면 `Ok(None)`
    /// - `expiry` 안에 획득하지 못하면 [`LogPipelineError::LockTimeout`]
    pub async fn acquire(
        &self,
        key: &str,
        options: LockOptions,
    ) -> Result<Option<LockGuard>, LogPipelineError> {
        let full_key = self.full_key(key);
        let token = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();
        let deadline = started + options.expiry;

        loop {
            if self
                .kv
                .set_nx_ex(&full_key, &token, options.expiry)
                .await?
            {
                tracing::debug!(key = %full_key, "lock acquired");
                return Ok(Some(LockGuard {
                    key: full_key,
                    token,
                    delay: options.delay,
                }));
            }

            if options.force_drop {
                counter!(m::LOCK_SKIPPED_TOTAL).increment(1);
                tracing::debug!(key = %full_key, "lock held elsewhere, skipped");
                return Ok(None);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(LogPipelineError::LockTimeout {
                    key: full_key,
                    waited_ms: u64::try_from(now.duration_since(started).as_millis())
                        .unwrap_or(u64::MAX),
                });
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    /// 락을 해제합니다.
    ///
    /// 토큰이 일치할 때만 삭제하므로 만료 후 다른 소유자가 잡은 락은 건드리지 않습니다.
    /// `delay`가 있으면 삭제 대신 남은 수명을 `delay`로 재설정합니다.
    pub async fn release(&self, guard: LockGuard) -> Result<bool, LogPipelineError> {
        let released = match guard.delay {
            Some(delay) if !delay.is_zero() => {
                self.kv
                    .compare_and_expire(&guard.key, &guard.token, delay)
                    .await?
            }
            _ => self.kv.compare_and_delete(&guard.key, &guard.token).await?,
        };
        if !released {
            tracing::warn!(key = %guard.key, "lock expired before release");
        }
        Ok(released)
    }

    /// 락을 잡은 상태로 `task`를 실행합니다.
    ///
    /// `task`의 성공/실패와 관계없이 락을 해제합니다. `delay`는 `task`가 성공했을 때만
    /// 적용되며, 실패하면 키를 바로 삭제해 같은 키로 곧바로 다시 시도할 수 있습니다.
    /// `force_drop`으로 건너뛰었으면 `Ok(None)`을 반환하고 `task`는 실행되지 않습니다.
    pub async fn run_locked<T, F>(
        &self,
        key: &str,
        options: LockOptions,
        task: F,
    ) -> Result<Option<T>, LogPipelineError>
    where
        F: Future<Output = Result<T, LogPipelineError>>,
    {
        let Some(guard) = self.acquire(key, options).await? else {
            return Ok(None);
        };

        let result = task.await;
        let guard = match result {
            Ok(_) => guard,
            Err(_) => LockGuard {
                delay: None,
                ..guard
            },
        };
        let released = self.release(guard).await;

        let value = result?;
        released?;
        Ok(Some(value))
    }
}

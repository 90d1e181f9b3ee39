//! Redis 키-값 저장소
//!
//! 해석 캐시, 분산 락, 장치 통계를 여러 프로세스가 공유할 때 사용합니다.
//! 조건부 연산(비교 후 삭제, 비교 후 만료 재설정, 생성 시 TTL 부여)은 Lua 스크립트로
//! 서버에서 원자적으로 실행합니다.

use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::{RedisError, Script};
use tracing::info;

use loghive_core::backend::KvStore;
use loghive_core::error::StoreError;

use crate::error::LogPipelineError;

/// SCAN 한 번에 요청하는 키 수
const SCAN_COUNT: usize = 500;

const COMPARE_AND_DELETE: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
";

const COMPARE_AND_EXPIRE: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('PEXPIRE', KEYS[1], ARGV[2])
end
return 0
";

const INCR_WITH_TTL: &str = r"
local created = redis.call('EXISTS', KEYS[1]) == 0
local value = redis.call('INCRBY', KEYS[1], ARGV[1])
if created and tonumber(ARGV[2]) > 0 then
    redis.call('PEXPIRE', KEYS[1], ARGV[2])
end
return value
";

fn kv_error(err: RedisError) -> StoreError {
    StoreError::Kv(err.to_string())
}

/// Redis 기반 [`KvStore`] 구현
///
/// [`ConnectionManager`]가 끊어진 연결을 다시 맺으므로 일시적인 장애는
/// 해당 호출의 에러로만 드러납니다.
#[derive(Clone)]
pub struct RedisKvStore {
    connection: ConnectionManager,
    compare_and_delete: Script,
    compare_and_expire: Script,
    incr_with_ttl: Script,
}

impl std::fmt::Debug for RedisKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisKvStore").finish_non_exhaustive()
    }
}

impl RedisKvStore {
    /// URL로 연결합니다. 첫 연결에 실패하면 에러를 반환합니다.
    pub async fn connect(url: &str) -> Result<Self, LogPipelineError> {
        let client = redis::Client::open(url).map_err(|e| LogPipelineError::Config {
            field: "cache.url".to_owned(),
            reason: e.to_string(),
        })?;
        let connection = client
            .get_connection_manager()
            .await
            .map_err(kv_error)?;
        info!(url, "redis kv store connected");

        Ok(Self {
            connection,
            compare_and_delete: Script::new(COMPARE_AND_DELETE),
            compare_and_expire: Script::new(COMPARE_AND_EXPIRE),
            incr_with_ttl: Script::new(INCR_WITH_TTL),
        })
    }
}

impl KvStore for RedisKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection.clone();
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(kv_error)?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(kv_error)?;
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut conn = self.connection.clone();
        // 이미 있으면 nil
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(kv_error)?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: i64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(kv_error)?;
        Ok(())
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection.clone();
        let removed: i64 = self
            .compare_and_delete
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await
            .map_err(kv_error)?;
        Ok(removed == 1)
    }

    async fn compare_and_expire(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut conn = self.connection.clone();
        let updated: i64 = self
            .compare_and_expire
            .key(key)
            .arg(expected)
            .arg(ttl_millis(ttl))
            .invoke_async(&mut conn)
            .await
            .map_err(kv_error)?;
        Ok(updated == 1)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, StoreError> {
        let mut conn = self.connection.clone();
        let pattern = format!("{}*", escape_glob(prefix));
        let mut cursor: u64 = 0;
        let mut removed = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await
                .map_err(kv_error)?;

            if !keys.is_empty() {
                let deleted: usize = redis::cmd("DEL")
                    .arg(&keys)
                    .query_async(&mut conn)
                    .await
                    .map_err(kv_error)?;
                removed += deleted;
            }

            if next == 0 {
                return Ok(removed);
            }
            cursor = next;
        }
    }

    async fn incr_by(
        &self,
        key: &str,
        delta: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, StoreError> {
        let mut conn = self.connection.clone();
        let value: i64 = self
            .incr_with_ttl
            .key(key)
            .arg(delta)
            .arg(ttl.map_or(0, ttl_millis))
            .invoke_async(&mut conn)
            .await
            .map_err(kv_error)?;
        Ok(value)
    }
}

/// TTL을 밀리초로 바꿉니다. 0은 Redis가 거부하므로 최소 1ms.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// SCAN MATCH 패턴에서 접두사를 문자 그대로 매칭하도록 이스케이프합니다.
fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

//! Redis-backed [`KvStore`].

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, Pipeline};

use super::{KeyTtl, KvBatch, KvOp, KvResult, KvStore};

/// Key-value store on a Redis server.
///
/// Holds a [`ConnectionManager`], which reconnects on its own and is cheap to
/// clone per call.
#[derive(Clone)]
pub struct RedisKv {
    conn: ConnectionManager,
}

impl RedisKv {
    /// Connect to the server at `url` (e.g. `redis://127.0.0.1:6379/0`).
    pub async fn connect(url: &str) -> KvResult<Self> {
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

/// Queue one write on a `MULTI`/`EXEC` pipeline.
fn queue(pipe: &mut Pipeline, op: KvOp) {
    match op {
        KvOp::ZAdd { key, member, score } => {
            pipe.cmd("ZADD").arg(key).arg(score).arg(member).ignore();
        }
        KvOp::ZRem { key, members } => {
            pipe.cmd("ZREM").arg(key).arg(members).ignore();
        }
        KvOp::ZRemUpTo { key, max } => {
            pipe.cmd("ZREMRANGEBYSCORE")
                .arg(key)
                .arg("-inf")
                .arg(max)
                .ignore();
        }
        KvOp::HSet { key, fields } => {
            let cmd = pipe.cmd("HSET").arg(key);
            for (field, value) in fields {
                cmd.arg(field).arg(value);
            }
            cmd.ignore();
        }
        KvOp::Expire { key, ttl } => {
            pipe.cmd("PEXPIRE").arg(key).arg(expiry_millis(ttl)).ignore();
        }
        KvOp::Del { keys } => {
            pipe.cmd("DEL").arg(keys).ignore();
        }
    }
}

/// Build the `MULTI`/`EXEC` pipeline for a batch.
fn transaction(batch: KvBatch) -> Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic();
    for op in batch.into_ops() {
        queue(&mut pipe, op);
    }
    pipe
}

/// `PEXPIRE` argument, clamped to what Redis accepts.
fn expiry_millis(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
}

/// Map a `PTTL` reply: -2 for a missing key, -1 for a key without expiry.
fn key_ttl(millis: i64) -> KeyTtl {
    match millis {
        -1 => KeyTtl::Persistent,
        m if m < 0 => KeyTtl::Missing,
        m => KeyTtl::Remaining(Duration::from_millis(m as u64)),
    }
}

/// Exclusive lower bound for `ZCOUNT`.
fn exclusive_min(min: f64) -> String {
    format!("({min}")
}

#[async_trait]
impl KvStore for RedisKv {
    async fn hgetall(&self, key: &str) -> KvResult<HashMap<String, String>> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> =
            redis::cmd("HGETALL").arg(key).query_async(&mut conn).await?;
        Ok(fields)
    }

    async fn ttl(&self, key: &str) -> KvResult<KeyTtl> {
        let mut conn = self.conn.clone();
        let millis: i64 = redis::cmd("PTTL").arg(key).query_async(&mut conn).await?;
        Ok(key_ttl(millis))
    }

    async fn zmembers(&self, key: &str) -> KvResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = redis::cmd("ZRANGE")
            .arg(key)
            .arg(0)
            .arg(-1)
            .query_async(&mut conn)
            .await?;
        Ok(members)
    }

    async fn zcard(&self, key: &str) -> KvResult<u64> {
        let mut conn = self.conn.clone();
        let count: u64 = redis::cmd("ZCARD").arg(key).query_async(&mut conn).await?;
        Ok(count)
    }

    async fn zcount_above(&self, key: &str, min: f64) -> KvResult<u64> {
        let mut conn = self.conn.clone();
        let count: u64 = redis::cmd("ZCOUNT")
            .arg(key)
            .arg(exclusive_min(min))
            .arg("+inf")
            .query_async(&mut conn)
            .await?;
        Ok(count)
    }

    async fn del(&self, keys: &[String]) -> KvResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let removed: u64 = redis::cmd("DEL").arg(keys.to_vec()).query_async(&mut conn).await?;
        Ok(removed)
    }

    async fn atomic(&self, batch: KvBatch) -> KvResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let pipe = transaction(batch);
        let mut conn = self.conn.clone();
        let () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn ping(&self) -> KvResult<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// RESP encoding of one command, as it appears in a packed pipeline.
    fn resp(args: &[&str]) -> String {
        let mut out = format!("*{}\r\n", args.len());
        for arg in args {
            out.push_str(&format!("${}\r\n{arg}\r\n", arg.len()));
        }
        out
    }

    fn packed(batch: KvBatch) -> String {
        String::from_utf8(transaction(batch).get_packed_pipeline()).unwrap()
    }

    #[test]
    fn batch_is_wrapped_in_multi_exec() {
        let wire = packed(KvBatch::new().del(["a"]));
        assert!(wire.starts_with(&resp(&["MULTI"])));
        assert!(wire.contains(&resp(&["DEL", "a"])));
        assert!(wire.ends_with(&resp(&["EXEC"])));
    }

    #[test]
    fn session_writes_use_redis_argument_order() {
        let wire = packed(
            KvBatch::new()
                .zadd("sessions:user:7", "tok", 1.5)
                .hset("session:tok", [("userId", "7")])
                .expire("session:tok", Duration::from_millis(1500)),
        );

        let zadd = resp(&["ZADD", "sessions:user:7", "1.5", "tok"]);
        let hset = resp(&["HSET", "session:tok", "userId", "7"]);
        let pexpire = resp(&["PEXPIRE", "session:tok", "1500"]);
        assert!(wire.contains(&zadd), "{wire}");
        assert!(wire.contains(&hset), "{wire}");
        assert!(wire.contains(&pexpire), "{wire}");
        assert!(wire.find(&zadd) < wire.find(&hset));
        assert!(wire.find(&hset) < wire.find(&pexpire));
    }

    #[test]
    fn removals_expand_member_lists() {
        let wire = packed(
            KvBatch::new()
                .zrem("idx", ["a", "b"])
                .zrem_up_to("idx", 2.5)
                .del(["k1", "k2"]),
        );
        assert!(wire.contains(&resp(&["ZREM", "idx", "a", "b"])));
        assert!(wire.contains(&resp(&["ZREMRANGEBYSCORE", "idx", "-inf", "2.5"])));
        assert!(wire.contains(&resp(&["DEL", "k1", "k2"])));
    }

    #[test]
    fn expiry_is_clamped_to_i64() {
        assert_eq!(expiry_millis(Duration::from_secs(2)), 2000);
        assert_eq!(expiry_millis(Duration::MAX), i64::MAX);
    }

    #[test]
    fn pttl_replies_map_to_key_ttl() {
        assert_eq!(key_ttl(-2), KeyTtl::Missing);
        assert_eq!(key_ttl(-1), KeyTtl::Persistent);
        assert_eq!(key_ttl(0), KeyTtl::Remaining(Duration::ZERO));
        assert_eq!(key_ttl(1500), KeyTtl::Remaining(Duration::from_millis(1500)));
    }

    #[test]
    fn zcount_lower_bound_is_exclusive() {
        assert_eq!(exclusive_min(1700000000.25), "(1700000000.25");
        assert_eq!(exclusive_min(f64::NEG_INFINITY), "(-inf");
    }

    /// Round trip against a live server at `REDIS_URL`.
    #[tokio::test]
    #[ignore = "requires a running Redis at REDIS_URL"]
    async fn live_round_trip() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        let kv = RedisKv::connect(&url).await.unwrap();
        kv.ping().await.unwrap();

        let record = "listkeep-test:session:tok".to_string();
        let index = "listkeep-test:sessions:user:1".to_string();
        kv.del(&[record.clone(), index.clone()]).await.unwrap();

        kv.atomic(
            KvBatch::new()
                .zadd(index.as_str(), "stale", 1.0)
                .zadd(index.as_str(), "tok", 4_000_000_000.0)
                .hset(record.as_str(), [("userId", "1")])
                .expire(record.as_str(), Duration::from_secs(60)),
        )
        .await
        .unwrap();

        assert_eq!(kv.hgetall(&record).await.unwrap().get("userId").unwrap(), "1");
        assert!(matches!(kv.ttl(&record).await.unwrap(), KeyTtl::Remaining(_)));
        assert_eq!(kv.zcard(&index).await.unwrap(), 2);
        assert_eq!(kv.zcount_above(&index, 2.0).await.unwrap(), 1);

        kv.atomic(KvBatch::new().zrem_up_to(index.as_str(), 2.0))
            .await
            .unwrap();
        assert_eq!(kv.zmembers(&index).await.unwrap(), ["tok"]);

        assert_eq!(kv.del(&[record.clone(), index.clone()]).await.unwrap(), 2);
        assert_eq!(kv.ttl(&record).await.unwrap(), KeyTtl::Missing);
    }
}

//! Distributed Locks Example
//!
//! Two workers compete for the same Redis key; the loser retries with
//! exponential backoff until the winner releases.
//!
//! Note: This example requires Redis to be running
//! Start Redis: docker run -p 6379:6379 redis

use armature_redislock::prelude::*;
use armature_redislock::RedisConfig;
use std::time::Duration;

async fn worker(client: LockClient, name: &'static str) -> LockResult<()> {
    let options = Options::new()
        .with_retry(LimitedRetry::new(
            ExponentialBackoff::new(Duration::from_millis(16), Duration::from_millis(500)),
            20,
        ))
        .with_metadata(name);

    let lock = client
        .obtain("demo:report-job", Duration::from_secs(10), options)
        .await?;
    println!("{} acquired the lock (token {})", name, lock.token());

    tokio::time::sleep(Duration::from_millis(500)).await;
    lock.refresh(Duration::from_secs(10)).await?;
    println!("{} refreshed, {:?} left", name, lock.time_to_live().await?);

    lock.release().await?;
    println!("{} released the lock", name);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client = LockClient::connect(&RedisConfig::from_env().build()).await?;

    let a = tokio::spawn(worker(client.clone(), "worker-a"));
    let b = tokio::spawn(worker(client, "worker-b"));

    a.await??;
    b.await??;
    Ok(())
}

use anyhow::Result;
use redis::AsyncCommands;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::infra::cache::RedisCache;

#[derive(Debug, Clone, Copy)]
pub enum RateWindow {
    Hour,
    Day,
}

impl RateWindow {
    pub fn seconds(self) -> u64 {
        match self {
            RateWindow::Hour => 3600,
            RateWindow::Day => 86400,
        }
    }
}

fn current_window(window_seconds: u64) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    now / window_seconds
}

/// Fixed-window counters keyed by client IP, guarding the unauthenticated
/// endpoints.
#[derive(Clone)]
pub struct RateLimiter {
    cache: RedisCache,
}

impl RateLimiter {
    pub fn new(cache: RedisCache) -> Self {
        Self { cache }
    }

    pub async fn check_ip(
        &self,
        ip: &str,
        action: &str,
        limit: u32,
        window: RateWindow,
    ) -> Result<bool> {
        let window_seconds = window.seconds();
        let key = format!(
            "ratelimit:ip:{}:{}:{}",
            ip,
            action,
            current_window(window_seconds)
        );

        let mut conn = self.cache.client().get_multiplexed_async_connection().await?;
        let count: u32 = conn.get(&key).await.unwrap_or(0);

        if count >= limit {
            tracing::debug!(
                ip = ip,
                action = action,
                count = count,
                limit = limit,
                "IP rate limit exceeded"
            );
            return Ok(true);
        }

        Ok(false)
    }

    pub async fn increment_ip(&self, ip: &str, action: &str, window: RateWindow) -> Result<()> {
        let window_seconds = window.seconds();
        let key = format!(
            "ratelimit:ip:{}:{}:{}",
            ip,
            action,
            current_window(window_seconds)
        );

        let mut conn = self.cache.client().get_multiplexed_async_connection().await?;

        let count: u32 = conn.get(&key).await.unwrap_or(0);
        let _: () = conn.incr(&key, 1).await?;

        if count == 0 {
            let _: () = conn.expire(&key, window_seconds as i64).await?;
        }

        Ok(())
    }
}

use crate::{
    api::{
        self,
        handlers::session::{GuardConfig, SessionGuard},
    },
    cli::commands::session::Options,
    session::{MemorySessionStore, RedisSessionStore, SessionStore},
};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub session: Options,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the session store is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let store = session_store(&args.session).await?;

    let config = GuardConfig::new()
        .with_session_ttl_seconds(args.session.session_ttl_seconds)
        .with_history_limit(args.session.history_limit)
        .with_trust_decay(args.session.trust_decay)
        .with_cookie_secure(args.session.cookie_secure);

    let guard = Arc::new(SessionGuard::new(config, store));

    api::new(args.port, guard).await
}

async fn session_store(options: &Options) -> Result<Arc<dyn SessionStore>> {
    let Some(url) = &options.redis_url else {
        warn!("No --redis-url given: sessions are kept in memory and lost on restart");
        return Ok(Arc::new(MemorySessionStore::new()));
    };

    let timeout = Duration::from_millis(options.redis_timeout_ms);
    let store = RedisSessionStore::connect(url, timeout)
        .await
        .with_context(|| format!("Failed to connect to Redis at {}", redact_url(url)))?;

    Ok(Arc::new(store))
}

fn log_startup_args(args: &Args) {
    let store = args
        .session
        .redis_url
        .as_ref()
        .map_or_else(|| "memory".to_string(), redact_url);

    info!(
        port = args.port,
        store = %store,
        redis_timeout_ms = args.session.redis_timeout_ms,
        session_ttl_seconds = args.session.session_ttl_seconds,
        history_limit = args.session.history_limit,
        trust_decay = args.session.trust_decay,
        cookie_secure = args.session.cookie_secure,
        "Startup configuration"
    );
}

fn redact_url(url: &SecretString) -> String {
    match Url::parse(url.expose_secret()) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-url".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_url_hides_password() {
        let url = SecretString::from("redis://:hunter2@cache.internal:6379/0");
        let redacted = redact_url(&url);
        assert!(!redacted.contains("hunter2"));
        assert!(redacted.contains("REDACTED"));
        assert!(redacted.contains("cache.internal:6379"));
    }

    #[test]
    fn redact_url_keeps_plain_urls() {
        let url = SecretString::from("redis://localhost:6379");
        assert_eq!(redact_url(&url), "redis://localhost:6379");
    }

    #[test]
    fn redact_url_invalid() {
        assert_eq!(redact_url(&SecretString::from("not a url")), "invalid-url");
    }

    #[tokio::test]
    async fn memory_store_without_redis_url() -> Result<()> {
        let options = Options {
            redis_url: None,
            redis_timeout_ms: 2000,
            session_ttl_seconds: 60,
            history_limit: 10,
            trust_decay: 0.8,
            cookie_secure: false,
        };
        let store = session_store(&options).await?;
        store.ping().await?;
        Ok(())
    }
}

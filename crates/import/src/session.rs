use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::{ImportError, Result};

/// A live connection-like resource tied to one owner.
pub trait Session: Send + Sync + std::fmt::Debug {
    /// Cheap liveness probe; `false` forces re-acquisition.
    fn is_alive(&self) -> bool;
    /// Credential the import action authenticates with.
    fn credential(&self) -> &str;
}

/// Establishes sessions for owners. Acquisition may involve network I/O.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn acquire(&self, owner: &str) -> Result<Arc<dyn Session>>;
}

/// Caches one long-lived session per owner, re-acquiring when the cached
/// one fails its liveness check. Sessions are handed out as scoped leases:
/// the guard returns the lease on drop, on success and failure alike.
pub struct SessionPool<P> {
    provider: P,
    sessions: Mutex<HashMap<String, Arc<dyn Session>>>,
    leased: AtomicUsize,
}

impl<P: SessionProvider> SessionPool<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            sessions: Mutex::new(HashMap::new()),
            leased: AtomicUsize::new(0),
        }
    }

    pub async fn lease(&self, owner: &str) -> Result<SessionLease<'_, P>> {
        let mut sessions = self.sessions.lock().await;
        if let Some(existing) = sessions.get(owner) {
            if existing.is_alive() {
                return Ok(self.issue(Arc::clone(existing)));
            }
            log::info!("session for {owner} failed its liveness check; re-acquiring");
            sessions.remove(owner);
        }
        let session = self.provider.acquire(owner).await?;
        sessions.insert(owner.to_string(), Arc::clone(&session));
        Ok(self.issue(session))
    }

    fn issue(&self, session: Arc<dyn Session>) -> SessionLease<'_, P> {
        self.leased.fetch_add(1, Ordering::SeqCst);
        SessionLease {
            pool: self,
            session,
        }
    }

    /// Leases currently handed out.
    pub fn leased(&self) -> usize {
        self.leased.load(Ordering::SeqCst)
    }
}

/// Scoped lease on a pooled session.
pub struct SessionLease<'a, P: SessionProvider> {
    pool: &'a SessionPool<P>,
    session: Arc<dyn Session>,
}

impl<P: SessionProvider> SessionLease<'_, P> {
    pub fn credential(&self) -> &str {
        self.session.credential()
    }
}

impl<P: SessionProvider> Drop for SessionLease<'_, P> {
    fn drop(&mut self) {
        self.pool.leased.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Production provider: per-owner pre-shared credentials with a fixed
/// session lifetime. A session past its lifetime reports dead and is
/// re-acquired, mirroring server-side expiry.
pub struct TokenSessionProvider {
    credentials: HashMap<String, String>,
    ttl: Duration,
}

impl TokenSessionProvider {
    pub fn new(credentials: HashMap<String, String>, ttl: Duration) -> Self {
        Self { credentials, ttl }
    }
}

#[derive(Debug)]
struct TokenSession {
    credential: String,
    expires_at: Instant,
}

impl Session for TokenSession {
    fn is_alive(&self) -> bool {
        Instant::now() < self.expires_at
    }

    fn credential(&self) -> &str {
        &self.credential
    }
}

#[async_trait]
impl SessionProvider for TokenSessionProvider {
    async fn acquire(&self, owner: &str) -> Result<Arc<dyn Session>> {
        let credential = self
            .credentials
            .get(owner)
            .ok_or_else(|| ImportError::NoCredential(owner.to_string()))?
            .clone();
        Ok(Arc::new(TokenSession {
            credential,
            expires_at: Instant::now() + self.ttl,
        }))
    }
}

//! Per-session profile storage and the registry of live sessions.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{Profile, ProfileKind};

/// The most recent job and candidate profile. Last write wins; no history.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileStore {
    job: Option<Profile>,
    candidate: Option<Profile>,
}

impl ProfileStore {
    /// Stores `profile` in the slot for its kind, replacing whatever was there.
    pub fn put(&mut self, profile: Profile) {
        match profile.kind {
            ProfileKind::Job => self.job = Some(profile),
            ProfileKind::Candidate => self.candidate = Some(profile),
        }
    }

    pub fn get(&self, kind: ProfileKind) -> Option<&Profile> {
        match kind {
            ProfileKind::Job => self.job.as_ref(),
            ProfileKind::Candidate => self.candidate.as_ref(),
        }
    }

    /// The gate for matching.
    pub fn has_both(&self) -> bool {
        self.job.is_some() && self.candidate.is_some()
    }

    pub fn missing(&self) -> Vec<ProfileKind> {
        ProfileKind::ALL
            .into_iter()
            .filter(|kind| self.get(*kind).is_none())
            .collect()
    }
}

#[derive(Debug, Serialize)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    store: ProfileStore,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            store: ProfileStore::default(),
        }
    }

    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ProfileStore {
        &mut self.store
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

pub type SessionHandle = Arc<Mutex<Session>>;

/// How long an untouched session lives and how many may be live at once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionLimits {
    pub idle_ttl: Duration,
    pub max_sessions: usize,
    pub sweep_interval: Duration,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            idle_ttl: Duration::from_secs(3600),
            max_sessions: 1000,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

struct Entry {
    handle: SessionHandle,
    last_used: Instant,
}

/// Live sessions keyed by id. Each session has its own lock, so work on one session
/// never waits on another, and a task holds its session for its whole run.
///
/// Sessions idle longer than `idle_ttl` are evicted. When `max_sessions` is reached,
/// creating a session evicts the least recently used one. Eviction only unregisters:
/// a task already holding the session runs to completion.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, Entry>>>,
    limits: SessionLimits,
}

impl SessionRegistry {
    pub fn new(limits: SessionLimits) -> Self {
        Self {
            sessions: Arc::default(),
            limits,
        }
    }

    pub async fn create(&self) -> SessionHandle {
        let session = Session::new();
        let id = session.id;
        let handle = Arc::new(Mutex::new(session));
        let now = Instant::now();

        let mut sessions = self.sessions.write().await;
        evict_idle(&mut sessions, now, self.limits.idle_ttl);
        while sessions.len() >= self.limits.max_sessions.max(1) {
            let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(id, _)| *id)
            else {
                break;
            };
            sessions.remove(&oldest);
            debug!("Session cap reached, evicted least recently used session {oldest}");
        }
        sessions.insert(
            id,
            Entry {
                handle: handle.clone(),
                last_used: now,
            },
        );
        handle
    }

    /// Looks up a live session and marks it as used.
    pub async fn get(&self, id: Uuid) -> Option<SessionHandle> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(&id)?;
        entry.last_used = Instant::now();
        Some(entry.handle.clone())
    }

    /// Drops the session from the registry. A task already holding it runs to completion.
    pub async fn remove(&self, id: Uuid) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Removes every session idle longer than the TTL. Returns how many were removed.
    pub async fn evict_idle(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        evict_idle(&mut sessions, Instant::now(), self.limits.idle_ttl)
    }

    /// Runs `evict_idle` every `sweep_interval` until the runtime shuts down.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = interval(registry.limits.sweep_interval);
            loop {
                ticker.tick().await;
                let evicted = registry.evict_idle().await;
                if evicted > 0 {
                    info!("Evicted {evicted} idle sessions");
                }
            }
        })
    }
}

fn evict_idle(sessions: &mut HashMap<Uuid, Entry>, now: Instant, idle_ttl: Duration) -> usize {
    let before = sessions.len();
    sessions.retain(|_, entry| now.duration_since(entry.last_used) <= idle_ttl);
    before - sessions.len()
}

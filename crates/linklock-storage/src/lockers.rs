use async_trait::async_trait;
use chrono::Utc;
use linklock_types::{AccountId, LinklockError, Locker, LockerId, Result};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

const SHORT_ID_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const SHORT_ID_LEN: usize = 5;

/// Generation attempts before creation gives up. At 62^5 ids the retry
/// path is cold; the bound keeps a pathological store from looping forever.
const MAX_ID_ATTEMPTS: usize = 8;

pub fn generate_short_id(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| SHORT_ID_ALPHABET[rng.gen_range(0..SHORT_ID_ALPHABET.len())] as char)
        .collect()
}

#[async_trait]
pub trait LockerStore: Send + Sync {
    /// Creates a locker with a freshly generated short id. Uniqueness is
    /// enforced at creation; generation retries on conflict.
    async fn create(
        &self,
        owner: AccountId,
        title: String,
        destination_url: String,
    ) -> Result<Locker>;

    async fn get(&self, id: &LockerId) -> Result<Option<Locker>>;

    async fn list_for_owner(&self, owner: &AccountId) -> Result<Vec<Locker>>;
}

pub struct MemoryLockerStore {
    lockers: Arc<RwLock<HashMap<LockerId, Locker>>>,
}

impl Default for MemoryLockerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLockerStore {
    pub fn new() -> Self {
        Self {
            lockers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Test hook: pre-seeds a locker under a fixed id.
    pub async fn seed(&self, locker: Locker) {
        let mut lockers = self.lockers.write().await;
        lockers.insert(locker.id.clone(), locker);
    }
}

#[async_trait]
impl LockerStore for MemoryLockerStore {
    async fn create(
        &self,
        owner: AccountId,
        title: String,
        destination_url: String,
    ) -> Result<Locker> {
        for attempt in 0..MAX_ID_ATTEMPTS {
            let id = LockerId::new(generate_short_id(SHORT_ID_LEN));

            // Check and insert under one write lock so two concurrent
            // creations cannot claim the same id.
            let mut lockers = self.lockers.write().await;
            if lockers.contains_key(&id) {
                warn!(locker_id = %id, attempt, "Short id collision, regenerating");
                continue;
            }

            let locker = Locker {
                id: id.clone(),
                owner,
                destination_url,
                title,
                created_at: Utc::now(),
            };
            lockers.insert(id.clone(), locker.clone());

            info!(
                locker_id = %locker.id,
                owner = %locker.owner,
                "🔗 Locker created"
            );
            return Ok(locker);
        }

        Err(LinklockError::Storage(format!(
            "Failed to generate a unique locker id after {} attempts",
            MAX_ID_ATTEMPTS
        )))
    }

    async fn get(&self, id: &LockerId) -> Result<Option<Locker>> {
        let lockers = self.lockers.read().await;
        Ok(lockers.get(id).cloned())
    }

    async fn list_for_owner(&self, owner: &AccountId) -> Result<Vec<Locker>> {
        let lockers = self.lockers.read().await;
        let mut owned: Vec<Locker> = lockers
            .values()
            .filter(|l| &l.owner == owner)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }
}

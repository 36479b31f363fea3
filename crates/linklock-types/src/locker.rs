use crate::id::{AccountId, LockerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A gated link. Visiting it requires completing tasks before redirect to
/// the destination URL. Owned exclusively by one account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Locker {
    pub id: LockerId,
    pub owner: AccountId,
    pub destination_url: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

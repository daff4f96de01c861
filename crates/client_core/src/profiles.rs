use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use shared::{
    domain::{NewProfile, Profile, ProfileUpsert, UserId, UserIdentity},
    error::{RemoteError, RemoteResult},
};
use tracing::{debug, info};

use crate::RemoteClient;

pub const PROFILE_TABLE: &str = "user_profiles";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// Another mount already inserted, or is inserting, this user's row.
    AlreadyRequested,
}

/// Typed access to the profile table. One instance is shared by every
/// profile screen so default-row creation is requested once per user.
pub struct ProfileStore {
    remote: Arc<dyn RemoteClient>,
    table: String,
    requested_creations: Mutex<HashSet<UserId>>,
}

impl ProfileStore {
    pub fn new(remote: Arc<dyn RemoteClient>) -> Self {
        Self::with_table(remote, PROFILE_TABLE)
    }

    pub fn with_table(remote: Arc<dyn RemoteClient>, table: impl Into<String>) -> Self {
        Self {
            remote,
            table: table.into(),
            requested_creations: Mutex::new(HashSet::new()),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub async fn fetch(&self, user_id: &UserId) -> RemoteResult<Profile> {
        let row = self
            .remote
            .fetch_single(&self.table, "id", user_id.as_str())
            .await?;
        serde_json::from_value(row)
            .map_err(|err| RemoteError::decode(format!("malformed profile row: {err}")))
    }

    pub async fn create_default(&self, user: &UserIdentity) -> RemoteResult<CreateOutcome> {
        if !self.claim_creation(&user.id) {
            debug!(user_id = %user.id, "default profile already requested");
            return Ok(CreateOutcome::AlreadyRequested);
        }

        let row = encode(&NewProfile::empty_for(user))?;
        match self.remote.insert_rows(&self.table, vec![row]).await {
            Ok(()) => {
                info!(user_id = %user.id, "created default profile");
                Ok(CreateOutcome::Created)
            }
            Err(err) => {
                self.release_creation(&user.id);
                Err(err)
            }
        }
    }

    pub async fn upsert(&self, upsert: &ProfileUpsert) -> RemoteResult<()> {
        self.remote.upsert_row(&self.table, encode(upsert)?).await
    }

    fn claim_creation(&self, user_id: &UserId) -> bool {
        self.requested_creations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(user_id.clone())
    }

    fn release_creation(&self, user_id: &UserId) {
        self.requested_creations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(user_id);
    }
}

fn encode<T: serde::Serialize>(value: &T) -> RemoteResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|err| RemoteError::decode(err.to_string()))
}

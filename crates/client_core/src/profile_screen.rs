//! View-model of the profile screen: load-or-create on mount, editable
//! fields, save via upsert, sign-out.
//!
//! Every mount and unmount bumps a generation counter. Responses to
//! requests started under an older generation are dropped instead of being
//! applied to the screen or shown to the user.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Local, Utc};
use shared::{
    domain::{Profile, ProfileUpsert, UserId, UserIdentity},
    error::RemoteResult,
};
use tracing::{debug, error, info, warn};

use crate::{
    notify::{Notification, Notifier},
    profiles::ProfileStore,
    RemoteClient,
};

pub type SignOutCallback = Arc<dyn Fn() + Send + Sync>;

pub const PROFILE_SAVED_MESSAGE: &str = "Profile updated successfully!";
const SAVE_LABEL: &str = "Update Profile";
const SAVING_LABEL: &str = "Updating...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfilePhase {
    Idle,
    Loading,
    CreatingDefault,
    Loaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    Failed,
    /// A save was already in flight; nothing was sent.
    AlreadySaving,
    /// No authenticated user (or screen not mounted); nothing was sent.
    Abandoned,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub user_id: UserId,
    pub created: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileView {
    pub phase: ProfilePhase,
    pub email: Option<String>,
    pub full_name: String,
    pub device_info: String,
    pub saving: bool,
    pub account: Option<AccountInfo>,
}

impl ProfileView {
    pub fn save_label(&self) -> &'static str {
        if self.saving {
            SAVING_LABEL
        } else {
            SAVE_LABEL
        }
    }

    pub fn save_enabled(&self) -> bool {
        !self.saving
    }
}

struct ScreenState {
    generation: u64,
    mounted: bool,
    phase: ProfilePhase,
    profile: Option<Profile>,
    full_name: String,
    device_info: String,
    saving: bool,
}

impl ScreenState {
    fn reset_for_mount(&mut self) {
        self.generation += 1;
        self.mounted = true;
        self.phase = ProfilePhase::Loading;
        self.profile = None;
        self.full_name.clear();
        self.device_info.clear();
        self.saving = false;
    }
}

pub struct ProfileScreen {
    remote: Arc<dyn RemoteClient>,
    store: Arc<ProfileStore>,
    notifier: Arc<dyn Notifier>,
    on_sign_out: SignOutCallback,
    state: Mutex<ScreenState>,
}

impl ProfileScreen {
    pub fn new(
        remote: Arc<dyn RemoteClient>,
        store: Arc<ProfileStore>,
        notifier: Arc<dyn Notifier>,
        on_sign_out: SignOutCallback,
    ) -> Self {
        Self {
            remote,
            store,
            notifier,
            on_sign_out,
            state: Mutex::new(ScreenState {
                generation: 0,
                mounted: false,
                phase: ProfilePhase::Idle,
                profile: None,
                full_name: String::new(),
                device_info: String::new(),
                saving: false,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ScreenState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Starts a fresh mount and runs load-or-create for it.
    pub async fn mount(&self) {
        let generation = self.begin_mount();
        self.load(generation).await;
    }

    /// Synchronous half of [`mount`](Self::mount), for callers that hand the
    /// load off to another task. Returns the generation to pass to
    /// [`load`](Self::load).
    pub fn begin_mount(&self) -> u64 {
        let mut state = self.state();
        state.reset_for_mount();
        debug!(generation = state.generation, "profile screen mounted");
        state.generation
    }

    /// Runs load-or-create for a mount, unless the screen was unmounted or
    /// remounted since `generation` was issued.
    pub async fn load(&self, generation: u64) {
        if !self.is_current(generation) {
            debug!(generation, "skipping load for a stale mount");
            return;
        }
        self.load_or_create(generation).await;
    }

    pub fn unmount(&self) {
        let mut state = self.state();
        state.mounted = false;
        state.generation += 1;
        debug!(generation = state.generation, "profile screen unmounted");
    }

    pub fn is_mounted(&self) -> bool {
        self.state().mounted
    }

    pub fn view(&self) -> ProfileView {
        let state = self.state();
        ProfileView {
            phase: state.phase,
            email: state.profile.as_ref().and_then(|profile| profile.email.clone()),
            full_name: state.full_name.clone(),
            device_info: state.device_info.clone(),
            saving: state.saving,
            account: state.profile.as_ref().map(|profile| AccountInfo {
                user_id: profile.id.clone(),
                created: profile.created_at.map(format_created_at),
            }),
        }
    }

    pub fn set_full_name(&self, full_name: impl Into<String>) {
        self.state().full_name = full_name.into();
    }

    pub fn set_device_info(&self, device_info: impl Into<String>) {
        self.state().device_info = device_info.into();
    }

    /// Re-runs the fetch for the current mount.
    pub async fn reload(&self) {
        let generation = {
            let state = self.state();
            if !state.mounted {
                return;
            }
            state.generation
        };
        self.load_or_create(generation).await;
    }

    async fn load_or_create(&self, generation: u64) {
        let user = match self.remote.get_user().await {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!("no authenticated user while loading profile");
                return;
            }
            Err(err) => {
                error!(code = ?err.code, "failed to resolve user while loading profile: {err}");
                return;
            }
        };

        match self.store.fetch(&user.id).await {
            Ok(profile) => {
                let applied = self.apply(generation, move |state| {
                    state.full_name = profile.full_name.clone().unwrap_or_default();
                    state.device_info = profile.device_info.clone().unwrap_or_default();
                    state.profile = Some(profile);
                    state.phase = ProfilePhase::Loaded;
                });
                if applied {
                    debug!(user_id = %user.id, "profile loaded");
                }
            }
            Err(err) if err.is_no_rows() => self.create_default(generation, &user).await,
            Err(err) => {
                error!(user_id = %user.id, code = ?err.code, "error fetching profile: {err}");
            }
        }
    }

    async fn create_default(&self, generation: u64, user: &UserIdentity) {
        if !self.apply(generation, |state| state.phase = ProfilePhase::CreatingDefault) {
            return;
        }
        match self.store.create_default(user).await {
            Ok(outcome) => debug!(user_id = %user.id, ?outcome, "default profile requested"),
            Err(err) => {
                error!(user_id = %user.id, code = ?err.code, "error creating profile: {err}");
            }
        }
        // Fields stay at their empty defaults; the insert result is not read back.
        self.apply(generation, |state| state.phase = ProfilePhase::Loaded);
    }

    pub async fn save(&self) -> SaveOutcome {
        let (generation, full_name, device_info) = {
            let mut state = self.state();
            if !state.mounted {
                return SaveOutcome::Abandoned;
            }
            if state.saving {
                debug!("save already in flight");
                return SaveOutcome::AlreadySaving;
            }
            state.saving = true;
            (
                state.generation,
                state.full_name.clone(),
                state.device_info.clone(),
            )
        };

        let outcome = self.upsert_as_current_user(generation, full_name, device_info).await;
        self.apply(generation, |state| state.saving = false);

        if outcome == SaveOutcome::Saved && self.is_current(generation) {
            self.load_or_create(generation).await;
        }
        outcome
    }

    async fn upsert_as_current_user(
        &self,
        generation: u64,
        full_name: String,
        device_info: String,
    ) -> SaveOutcome {
        let user = match self.remote.get_user().await {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!("no authenticated user at save time; save abandoned");
                return SaveOutcome::Abandoned;
            }
            Err(err) => {
                warn!(code = ?err.code, "could not resolve user at save time; save abandoned: {err}");
                return SaveOutcome::Abandoned;
            }
        };

        let upsert = ProfileUpsert {
            id: user.id.clone(),
            email: user.email.clone(),
            full_name,
            device_info,
            updated_at: Utc::now(),
        };
        match self.store.upsert(&upsert).await {
            Ok(()) => {
                info!(user_id = %user.id, "profile saved");
                self.notify_if_current(generation, Notification::success(PROFILE_SAVED_MESSAGE));
                SaveOutcome::Saved
            }
            Err(err) => {
                warn!(user_id = %user.id, code = ?err.code, "profile save failed: {err}");
                self.notify_if_current(generation, Notification::error(err.message));
                SaveOutcome::Failed
            }
        }
    }

    /// Signs out remotely; on success the parent's callback clears the
    /// mirrored session, on failure the error is shown and nothing changes.
    pub async fn sign_out(&self) -> RemoteResult<()> {
        let generation = self.state().generation;
        match self.remote.sign_out().await {
            Ok(()) => {
                (self.on_sign_out)();
                Ok(())
            }
            Err(err) => {
                warn!(code = ?err.code, "sign out failed: {err}");
                self.notify_if_current(generation, Notification::error(err.message.clone()));
                Err(err)
            }
        }
    }

    fn apply(&self, generation: u64, update: impl FnOnce(&mut ScreenState)) -> bool {
        let mut state = self.state();
        if !state.mounted || state.generation != generation {
            debug!(
                generation,
                current = state.generation,
                "discarding response for a previous mount"
            );
            return false;
        }
        update(&mut state);
        true
    }

    fn is_current(&self, generation: u64) -> bool {
        let state = self.state();
        state.mounted && state.generation == generation
    }

    fn notify_if_current(&self, generation: u64, notification: Notification) {
        if self.is_current(generation) {
            self.notifier.notify(notification);
        } else {
            debug!(title = %notification.title, "dropping notification for a previous mount");
        }
    }
}

/// Locale-default date in local time.
pub fn format_created_at(created_at: DateTime<Utc>) -> String {
    created_at.with_timezone(&Local).format("%x").to_string()
}

#[cfg(test)]
#[path = "tests/profile_screen_tests.rs"]
mod tests;

use async_trait::async_trait;
use serde_json::Value;
use shared::{
    domain::{Session, UserIdentity},
    error::RemoteResult,
};

pub mod auth_events;
pub mod config;
pub mod notify;
pub mod profile_screen;
pub mod profiles;
pub mod session_controller;
pub mod session_store;
pub mod supabase;

pub use auth_events::{AuthEventHub, AuthEvents, AuthSubscription, SubscriptionHandle};
pub use config::{load_settings, load_settings_from, ClientSettings};
pub use notify::{Notification, NotificationKind, Notifier};
pub use profile_screen::{ProfilePhase, ProfileScreen, ProfileView, SaveOutcome, SignOutCallback};
pub use profiles::{CreateOutcome, ProfileStore, PROFILE_TABLE};
pub use session_controller::{RootView, SessionController, SessionState};
pub use session_store::{FileSessionStore, MemorySessionStore, SessionStore};
pub use supabase::SupabaseClient;

/// Everything the app needs from the hosted backend: auth session access
/// and generic row access against its REST tables.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Current session, refreshed first if it is about to expire.
    async fn get_session(&self) -> RemoteResult<Option<Session>>;

    /// Standing subscription to every future session transition.
    fn on_auth_state_change(&self) -> AuthSubscription;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> RemoteResult<Session>;

    /// `Ok(None)` when the account still has to confirm its email.
    async fn sign_up(&self, email: &str, password: &str) -> RemoteResult<Option<Session>>;

    async fn sign_out(&self) -> RemoteResult<()>;

    /// Identity as validated by the auth service right now.
    async fn get_user(&self) -> RemoteResult<Option<UserIdentity>>;

    /// Exactly one row where `column` equals `value`; zero rows is reported
    /// as `ErrorCode::NoRows`.
    async fn fetch_single(&self, table: &str, column: &str, value: &str) -> RemoteResult<Value>;

    async fn insert_rows(&self, table: &str, rows: Vec<Value>) -> RemoteResult<()>;

    async fn upsert_row(&self, table: &str, row: Value) -> RemoteResult<()>;
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

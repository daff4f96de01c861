//! UI layer for the desktop GUI: app shell and the two screens.

pub mod app;
pub mod auth_screen;
pub mod profile_panel;

pub use app::{ProfileSyncApp, LAST_EMAIL_STORAGE_KEY};

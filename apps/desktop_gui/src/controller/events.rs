//! Backend-to-UI events and error modeling for the desktop GUI.

use client_core::Notification;
use shared::error::{ErrorCode, RemoteError};

pub enum UiEvent {
    /// Blocking alert raised by the profile screen.
    Notification(Notification),
    AuthSucceeded,
    /// Account created; the confirmation email has to be followed first.
    SignUpPending {
        email: String,
    },
    Error(UiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorCategory {
    Auth,
    Transport,
    Validation,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorContext {
    SignIn,
    SignUp,
}

#[derive(Debug, Clone)]
pub struct UiError {
    category: UiErrorCategory,
    context: UiErrorContext,
    message: String,
}

impl UiError {
    /// Classifies by the remote error's code; the message is kept verbatim.
    pub fn from_remote(context: UiErrorContext, err: &RemoteError) -> Self {
        let category = match err.code {
            ErrorCode::Unauthorized => UiErrorCategory::Auth,
            ErrorCode::Transport => UiErrorCategory::Transport,
            ErrorCode::NoRows | ErrorCode::Conflict | ErrorCode::Decode | ErrorCode::Other(_) => {
                UiErrorCategory::Unknown
            }
        };
        Self {
            category,
            context,
            message: err.message.clone(),
        }
    }

    /// Input rejected locally, before any request was sent.
    pub fn validation(context: UiErrorContext, message: impl Into<String>) -> Self {
        Self {
            category: UiErrorCategory::Validation,
            context,
            message: message.into(),
        }
    }

    pub fn category(&self) -> UiErrorCategory {
        self.category
    }

    pub fn context(&self) -> UiErrorContext {
        self.context
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Text for the auth screen's status line.
    pub fn user_facing(&self) -> String {
        match self.category {
            UiErrorCategory::Transport => format!(
                "Backend unreachable; check the Supabase URL and your network. ({})",
                self.message
            ),
            UiErrorCategory::Auth | UiErrorCategory::Validation | UiErrorCategory::Unknown => {
                self.message.clone()
            }
        }
    }
}

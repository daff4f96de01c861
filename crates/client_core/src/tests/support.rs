use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use serde_json::{json, Value};
use shared::{
    domain::{Session, UserId, UserIdentity},
    error::{RemoteError, RemoteResult},
    protocol::AuthChange,
};
use tokio::sync::Notify;

use crate::{
    auth_events::{AuthEventHub, AuthSubscription},
    notify::{Notification, Notifier},
    RemoteClient,
};

pub const SERVER_CREATED_AT: &str = "2024-01-01T00:00:00+00:00";

#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    GetSession,
    GetUser,
    SignOut,
    FetchSingle { table: String, value: String },
    Insert { table: String, rows: Vec<Value> },
    Upsert { table: String, row: Value },
}

/// Holds a call open until the test releases it.
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

#[derive(Default)]
pub struct FakeRemote {
    pub hub: AuthEventHub,
    pub session: Mutex<Option<Session>>,
    pub user: Mutex<Option<UserIdentity>>,
    pub rows: Mutex<HashMap<String, Value>>,
    pub calls: Mutex<Vec<RemoteCall>>,
    pub get_session_error: Mutex<Option<RemoteError>>,
    pub fetch_error: Mutex<Option<RemoteError>>,
    pub upsert_error: Mutex<Option<RemoteError>>,
    pub sign_out_error: Mutex<Option<RemoteError>>,
    pub get_session_gate: Option<Arc<Gate>>,
    pub insert_gate: Option<Arc<Gate>>,
    pub upsert_gate: Option<Arc<Gate>>,
}

pub fn identity(id: &str, email: &str) -> UserIdentity {
    UserIdentity {
        id: UserId::new(id),
        email: Some(email.to_string()),
    }
}

pub fn session_for(user: &UserIdentity, access_token: &str) -> Session {
    Session {
        access_token: access_token.to_string(),
        refresh_token: format!("{access_token}-refresh"),
        token_type: "bearer".to_string(),
        expires_in: 3600,
        expires_at: Some(4_102_444_800),
        user: user.clone(),
    }
}

impl FakeRemote {
    pub fn signed_in(id: &str, email: &str) -> Self {
        let user = identity(id, email);
        let remote = Self::default();
        *remote.session.lock().unwrap() = Some(session_for(&user, "access-1"));
        *remote.user.lock().unwrap() = Some(user);
        remote
    }

    pub fn with_row(self, row: Value) -> Self {
        let id = row["id"].as_str().expect("row id").to_string();
        self.rows.lock().unwrap().insert(id, row);
        self
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn inserts(&self) -> Vec<Vec<Value>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RemoteCall::Insert { rows, .. } => Some(rows),
                _ => None,
            })
            .collect()
    }

    pub fn upserts(&self) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RemoteCall::Upsert { row, .. } => Some(row),
                _ => None,
            })
            .collect()
    }

    pub fn row(&self, id: &str) -> Option<Value> {
        self.rows.lock().unwrap().get(id).cloned()
    }

    fn record(&self, call: RemoteCall) {
        self.calls.lock().unwrap().push(call);
    }
}

async fn pass(gate: &Option<Arc<Gate>>) {
    if let Some(gate) = gate {
        gate.entered.notify_one();
        gate.release.notified().await;
    }
}

#[async_trait]
impl RemoteClient for FakeRemote {
    async fn get_session(&self) -> RemoteResult<Option<Session>> {
        self.record(RemoteCall::GetSession);
        pass(&self.get_session_gate).await;
        if let Some(err) = self.get_session_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.session.lock().unwrap().clone())
    }

    fn on_auth_state_change(&self) -> AuthSubscription {
        self.hub.subscribe()
    }

    async fn sign_in_with_password(&self, email: &str, _password: &str) -> RemoteResult<Session> {
        let user = identity("u1", email);
        let session = session_for(&user, "access-signed-in");
        *self.session.lock().unwrap() = Some(session.clone());
        *self.user.lock().unwrap() = Some(user);
        self.hub.emit(AuthChange::signed_in(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> RemoteResult<Option<Session>> {
        self.sign_in_with_password(email, password).await.map(Some)
    }

    async fn sign_out(&self) -> RemoteResult<()> {
        self.record(RemoteCall::SignOut);
        if let Some(err) = self.sign_out_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.session.lock().unwrap().take();
        self.user.lock().unwrap().take();
        self.hub.emit(AuthChange::signed_out());
        Ok(())
    }

    async fn get_user(&self) -> RemoteResult<Option<UserIdentity>> {
        self.record(RemoteCall::GetUser);
        Ok(self.user.lock().unwrap().clone())
    }

    async fn fetch_single(&self, table: &str, _column: &str, value: &str) -> RemoteResult<Value> {
        self.record(RemoteCall::FetchSingle {
            table: table.to_string(),
            value: value.to_string(),
        });
        if let Some(err) = self.fetch_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.rows
            .lock()
            .unwrap()
            .get(value)
            .cloned()
            .ok_or_else(RemoteError::no_rows)
    }

    async fn insert_rows(&self, table: &str, rows: Vec<Value>) -> RemoteResult<()> {
        self.record(RemoteCall::Insert {
            table: table.to_string(),
            rows: rows.clone(),
        });
        pass(&self.insert_gate).await;
        let mut stored = self.rows.lock().unwrap();
        for mut row in rows {
            let id = row["id"].as_str().unwrap_or_default().to_string();
            row["created_at"] = json!(SERVER_CREATED_AT);
            stored.insert(id, row);
        }
        Ok(())
    }

    async fn upsert_row(&self, table: &str, row: Value) -> RemoteResult<()> {
        self.record(RemoteCall::Upsert {
            table: table.to_string(),
            row: row.clone(),
        });
        pass(&self.upsert_gate).await;
        if let Some(err) = self.upsert_error.lock().unwrap().clone() {
            return Err(err);
        }
        let id = row["id"].as_str().unwrap_or_default().to_string();
        let mut stored = self.rows.lock().unwrap();
        let entry = stored
            .entry(id)
            .or_insert_with(|| json!({ "created_at": SERVER_CREATED_AT }));
        if let (Some(target), Some(fields)) = (entry.as_object_mut(), row.as_object()) {
            for (key, value) in fields {
                target.insert(key.clone(), value.clone());
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn all(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}

//! Authenticated access to the remote store
//!
//! A [`Session`] owns the credentials and the connection opened with them.
//! The connection is opened on first use and thrown away when the
//! credentials change, so the next call re-authenticates. Worksheets borrow
//! the session for every remote call they make.

use std::fmt;

use once_cell::unsync::OnceCell;

use crate::error::Result;
use crate::id::{DocumentKey, WorksheetId};
use crate::retry::RetryPolicy;
use crate::store::{CellEntry, ListEntry, RemoteStore, WorksheetEntry, WorksheetsFeed};

/// Login for the remote service
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Credentials {
    pub email: String,
    pub password: String,
    /// Client identifier sent with the login
    pub source: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            email: String::new(),
            password: String::new(),
            source: crate::DEFAULT_SOURCE.to_string(),
        }
    }
}

impl Credentials {
    pub fn new<E: Into<String>, P: Into<String>>(email: E, password: P) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            ..Default::default()
        }
    }
}

/// Opens an authenticated store for a set of credentials
pub trait Connector {
    fn connect(&self, credentials: &Credentials) -> Result<Box<dyn RemoteStore>>;
}

impl<F> Connector for F
where
    F: Fn(&Credentials) -> Result<Box<dyn RemoteStore>>,
{
    fn connect(&self, credentials: &Credentials) -> Result<Box<dyn RemoteStore>> {
        self(credentials)
    }
}

/// A logged-in connection to the remote service
pub struct Session {
    connector: Box<dyn Connector>,
    credentials: Credentials,
    store: OnceCell<Box<dyn RemoteStore>>,
    retry: RetryPolicy,
}

impl Session {
    /// Create a session; nothing is opened until the first remote call.
    pub fn new<C: Connector + 'static>(connector: C, credentials: Credentials) -> Self {
        Self {
            connector: Box::new(connector),
            credentials,
            store: OnceCell::new(),
            retry: RetryPolicy::default(),
        }
    }

    /// A session over an already-connected store handle
    pub fn with_store<S: RemoteStore + Clone + 'static>(store: S) -> Self {
        Self::new(
            move |_: &Credentials| -> Result<Box<dyn RemoteStore>> { Ok(Box::new(store.clone())) },
            Credentials::default(),
        )
    }

    /// Replace the retry policy used for cell updates
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Switch credentials. A change drops the open connection.
    pub fn set_credentials(&mut self, credentials: Credentials) {
        if credentials != self.credentials {
            tracing::info!(email = %credentials.email, "Credentials changed, session will reconnect");
            self.credentials = credentials;
            self.store = OnceCell::new();
        }
    }

    /// Whether a connection is currently open
    pub fn is_connected(&self) -> bool {
        self.store.get().is_some()
    }

    /// The open store, connecting first if needed
    pub fn store(&self) -> Result<&dyn RemoteStore> {
        let store = self.store.get_or_try_init(|| {
            tracing::info!(
                email = %self.credentials.email,
                source = %self.credentials.source,
                "Opening remote store session"
            );
            self.connector.connect(&self.credentials)
        })?;
        Ok(store.as_ref())
    }

    // === Remote calls ===

    pub fn list_worksheets(&self, key: &DocumentKey) -> Result<WorksheetsFeed> {
        tracing::info!(%key, "list_worksheets");
        self.store()?.list_worksheets(key.as_str())
    }

    pub fn fetch_cells(&self, key: &DocumentKey, id: &WorksheetId) -> Result<Vec<CellEntry>> {
        tracing::info!(%key, worksheet = %id, "fetch_cells");
        self.store()?.fetch_cells(key.as_str(), id.short_id())
    }

    pub fn fetch_list(&self, key: &DocumentKey, id: &WorksheetId) -> Result<Vec<ListEntry>> {
        tracing::info!(%key, worksheet = %id, "fetch_list");
        self.store()?.fetch_list(key.as_str(), id.short_id())
    }

    pub fn insert_row(
        &self,
        key: &DocumentKey,
        id: &WorksheetId,
        values: &[(String, String)],
    ) -> Result<ListEntry> {
        tracing::info!(%key, worksheet = %id, ?values, "insert_row");
        self.store()?.insert_row(key.as_str(), id.short_id(), values)
    }

    /// Write one cell, retried per the session's [`RetryPolicy`]
    pub fn update_cell(
        &self,
        key: &DocumentKey,
        id: &WorksheetId,
        row: u32,
        col: u32,
        value: &str,
    ) -> Result<CellEntry> {
        tracing::info!(%key, worksheet = %id, row, col, value, "update_cell");
        self.retry.run("update_cell", || {
            self.store()?
                .update_cell(key.as_str(), id.short_id(), row, col, value)
        })
    }

    pub fn delete_row(&self, entry: &ListEntry) -> Result<()> {
        tracing::info!(entry = %entry.id, "delete_row");
        self.store()?.delete_row(entry)
    }

    pub fn add_worksheet(
        &self,
        key: &DocumentKey,
        title: &str,
        rows: u32,
        cols: u32,
    ) -> Result<WorksheetEntry> {
        tracing::info!(%key, title, rows, cols, "add_worksheet");
        self.store()?.add_worksheet(key.as_str(), title, rows, cols)
    }

    pub fn list_feed_stops_at_blank_row(&self) -> Result<bool> {
        Ok(self.store()?.list_feed_stops_at_blank_row())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("email", &self.credentials.email)
            .field("source", &self.credentials.source)
            .field("connected", &self.is_connected())
            .field("retry", &self.retry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::store::MemoryStore;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::time::Duration;

    fn counting_session(store: MemoryStore) -> (Session, Rc<Cell<u32>>) {
        let connects = Rc::new(Cell::new(0));
        let counter = Rc::clone(&connects);
        let session = Session::new(
            move |creds: &Credentials| -> Result<Box<dyn RemoteStore>> {
                if creds.password == "wrong" {
                    return Err(Error::remote("login failed"));
                }
                counter.set(counter.get() + 1);
                Ok(Box::new(store.clone()))
            },
            Credentials::new("a@example.com", "secret"),
        );
        (session, connects)
    }

    #[test]
    fn test_connects_lazily_once() {
        let store = MemoryStore::new();
        store.add_document("doc", "Doc");
        let (session, connects) = counting_session(store);
        assert!(!session.is_connected());

        let key = DocumentKey::parse("doc").unwrap();
        session.list_worksheets(&key).unwrap();
        session.list_worksheets(&key).unwrap();
        assert_eq!(connects.get(), 1);
        assert!(session.is_connected());
    }

    #[test]
    fn test_credential_change_reconnects() {
        let store = MemoryStore::new();
        store.add_document("doc", "Doc");
        let (mut session, connects) = counting_session(store);
        let key = DocumentKey::parse("doc").unwrap();
        session.list_worksheets(&key).unwrap();

        session.set_credentials(Credentials::new("a@example.com", "secret"));
        assert!(session.is_connected());

        session.set_credentials(Credentials::new("b@example.com", "secret"));
        assert!(!session.is_connected());
        session.list_worksheets(&key).unwrap();
        assert_eq!(connects.get(), 2);
    }

    #[test]
    fn test_failed_login_surfaces() {
        let (mut session, _) = counting_session(MemoryStore::new());
        session.set_credentials(Credentials::new("a@example.com", "wrong"));
        let key = DocumentKey::parse("doc").unwrap();
        assert!(session.list_worksheets(&key).is_err());
        assert!(!session.is_connected());
    }

    #[test]
    fn test_update_cell_is_retried() {
        let store = MemoryStore::new();
        let sheet = store.add_sheet("doc", "S", &[&["A"]]);
        let session = Session::with_store(store.clone())
            .with_retry_policy(RetryPolicy::new(3, Duration::ZERO));
        let key = DocumentKey::parse("doc").unwrap();
        let id = WorksheetId::from_short(&sheet).unwrap();

        store.fail_next_updates(2);
        session.update_cell(&key, &id, 1, 1, "B").unwrap();
        assert_eq!(store.writes().len(), 3);

        store.clear_calls();
        store.fail_next_updates(3);
        assert!(session.update_cell(&key, &id, 1, 1, "C").is_err());
        assert_eq!(store.writes().len(), 3);
    }

    #[test]
    fn test_insert_is_not_retried() {
        let store = MemoryStore::new();
        let sheet = store.add_sheet("doc", "S", &[&["A"]]);
        let session = Session::with_store(store.clone())
            .with_retry_policy(RetryPolicy::new(3, Duration::ZERO));
        let key = DocumentKey::parse("doc").unwrap();
        let id = WorksheetId::from_short(&sheet).unwrap();

        assert!(session.insert_row(&key, &id, &[]).is_err());
        assert_eq!(store.writes().len(), 1);
    }
}

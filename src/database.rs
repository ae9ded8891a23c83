//! Database initialization, table definitions and the document store
//!
//! This module handles the setup of the embedded redb database and owns
//! every read and write the service performs. Records are stored as JSON
//! documents; secondary tables act as unique and ordered indexes.
//!
//! redb serializes write transactions, so "check the code index, then
//! insert" and "read the record, append a click, write it back" each run
//! as one atomic unit.

use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::de::DeserializeOwned;

use crate::model::{normalize_email, ClickEvent, GoneReason, UrlRecord, User};

/// Main table for URL documents
///
/// Key: record id (UUID). Value: JSON-serialized [`UrlRecord`].
pub const TABLE_URLS: TableDefinition<&str, &str> = TableDefinition::new("urls_v1");

/// Unique index of short codes
///
/// Key: short code (case-sensitive). Value: record id.
pub const TABLE_CODES: TableDefinition<&str, &str> = TableDefinition::new("codes_v1");

/// Ordered index of URLs per owner
///
/// Key: composite `"{owner_id}:{created_micros:020}:{record_id}"`. Value: record id.
///
/// The zero-padded timestamp keeps a user's links in creation order and the
/// record id keeps keys unique when two links share a microsecond.
pub const TABLE_OWNER_INDEX: TableDefinition<&str, &str> = TableDefinition::new("owner_index_v1");

/// Account documents. Key: user id. Value: JSON-serialized [`User`].
pub const TABLE_USERS: TableDefinition<&str, &str> = TableDefinition::new("users_v1");

/// Unique index of normalized e-mails. Key: e-mail. Value: user id.
pub const TABLE_EMAILS: TableDefinition<&str, &str> = TableDefinition::new("emails_v1");

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] redb::DatabaseError),
    #[error(transparent)]
    Transaction(#[from] redb::TransactionError),
    #[error(transparent)]
    Table(#[from] redb::TableError),
    #[error(transparent)]
    Storage(#[from] redb::StorageError),
    #[error(transparent)]
    Commit(#[from] redb::CommitError),
    #[error("corrupt document: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Initializes the embedded database and creates required tables
///
/// # Arguments
///
/// * `db_path` - File path where the database should be stored (e.g., "data.db")
///
/// # Example
///
/// ```no_run
/// # use linkpulse::database::init_db;
/// let db = init_db("data.db").expect("Failed to initialize database");
/// ```
pub fn init_db(db_path: &str) -> Result<Database, redb::Error> {
    let db = Database::create(db_path)?;

    let write_txn = db.begin_write()?;
    {
        write_txn.open_table(TABLE_URLS)?;
        write_txn.open_table(TABLE_CODES)?;
        write_txn.open_table(TABLE_OWNER_INDEX)?;
        write_txn.open_table(TABLE_USERS)?;
        write_txn.open_table(TABLE_EMAILS)?;
    }
    write_txn.commit()?;

    Ok(db)
}

/// Result of resolving a short code for a redirect
#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    NotFound,
    Gone(GoneReason),
    /// Click recorded; carries the destination
    Redirect(String),
}

/// Result of a read-modify-write on a stored user
#[derive(Debug, Clone)]
pub enum UserUpdate {
    Updated(User),
    NotFound,
    /// The new e-mail belongs to another account; nothing was written
    EmailTaken,
}

fn owner_key(owner_id: &str, record: &UrlRecord) -> String {
    format!(
        "{}:{:020}:{}",
        owner_id,
        record.created_at.timestamp_micros(),
        record.id
    )
}

/// `[start, end)` covering every index key of `owner_id`
///
/// `'{'` sorts right after `':'`, so `"{owner}:{"` bounds the prefix.
fn owner_range(owner_id: &str) -> (String, String) {
    (format!("{}:", owner_id), format!("{}:{{", owner_id))
}

fn decode<T: DeserializeOwned>(raw: Option<String>) -> Result<Option<T>, StoreError> {
    raw.map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(StoreError::from)
}

/// Handle to the document store, cheap to clone
#[derive(Clone)]
pub struct Store {
    db: Arc<Database>,
}

impl Store {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Opens (or creates) the database file and wraps it
    pub fn open(db_path: &str) -> Result<Self, redb::Error> {
        Ok(Self::new(Arc::new(init_db(db_path)?)))
    }

    /// Cheap liveness probe: a read transaction over the URL table
    pub fn ping(&self) -> Result<(), StoreError> {
        let read_txn = self.db.begin_read()?;
        read_txn.open_table(TABLE_URLS)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // URLs
    // -----------------------------------------------------------------------

    /// Inserts `record` unless its short code is already taken
    ///
    /// Returns `false` (and writes nothing) on a code collision.
    pub fn insert_url(&self, record: &UrlRecord) -> Result<bool, StoreError> {
        let record_json = serde_json::to_string(record)?;

        let write_txn = self.db.begin_write()?;
        let inserted = {
            let mut codes = write_txn.open_table(TABLE_CODES)?;
            let taken = codes.get(record.short_code.as_str())?.is_some();

            if !taken {
                codes.insert(record.short_code.as_str(), record.id.as_str())?;

                let mut urls = write_txn.open_table(TABLE_URLS)?;
                urls.insert(record.id.as_str(), record_json.as_str())?;

                if let Some(owner_id) = &record.owner_id {
                    let mut index = write_txn.open_table(TABLE_OWNER_INDEX)?;
                    index.insert(owner_key(owner_id, record).as_str(), record.id.as_str())?;
                }
            }
            !taken
        };

        if inserted {
            write_txn.commit()?;
        } else {
            write_txn.abort()?;
        }
        Ok(inserted)
    }

    pub fn code_exists(&self, code: &str) -> Result<bool, StoreError> {
        let read_txn = self.db.begin_read()?;
        let codes = read_txn.open_table(TABLE_CODES)?;
        let exists = codes.get(code)?.is_some();
        Ok(exists)
    }

    pub fn get_url(&self, id: &str) -> Result<Option<UrlRecord>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let urls = read_txn.open_table(TABLE_URLS)?;
        let raw = urls.get(id)?.map(|v| v.value().to_string());
        decode(raw)
    }

    pub fn get_url_by_code(&self, code: &str) -> Result<Option<UrlRecord>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let codes = read_txn.open_table(TABLE_CODES)?;
        let Some(id) = codes.get(code)?.map(|v| v.value().to_string()) else {
            return Ok(None);
        };
        let urls = read_txn.open_table(TABLE_URLS)?;
        let raw = urls.get(id.as_str())?.map(|v| v.value().to_string());
        decode(raw)
    }

    /// All URLs owned by `owner_id`, oldest first
    pub fn list_by_owner(&self, owner_id: &str) -> Result<Vec<UrlRecord>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(TABLE_OWNER_INDEX)?;
        let urls = read_txn.open_table(TABLE_URLS)?;

        let (start, end) = owner_range(owner_id);
        let mut records = Vec::new();
        for entry in index.range(start.as_str()..end.as_str())? {
            let (_, id) = entry?;
            let raw = urls.get(id.value())?.map(|v| v.value().to_string());
            match decode::<UrlRecord>(raw)? {
                Some(record) => records.push(record),
                None => tracing::warn!(id = id.value(), "Owner index points at a missing URL"),
            }
        }
        Ok(records)
    }

    /// Applies `apply` to the stored record inside one write transaction
    ///
    /// Returns the updated record, or `None` if `id` does not exist.
    pub fn update_url<F>(&self, id: &str, apply: F) -> Result<Option<UrlRecord>, StoreError>
    where
        F: FnOnce(&mut UrlRecord),
    {
        let write_txn = self.db.begin_write()?;
        let updated = {
            let mut urls = write_txn.open_table(TABLE_URLS)?;
            let raw = urls.get(id)?.map(|v| v.value().to_string());
            match decode::<UrlRecord>(raw)? {
                Some(mut record) => {
                    apply(&mut record);
                    let record_json = serde_json::to_string(&record)?;
                    urls.insert(id, record_json.as_str())?;
                    Some(record)
                }
                None => None,
            }
        };

        if updated.is_some() {
            write_txn.commit()?;
        } else {
            write_txn.abort()?;
        }
        Ok(updated)
    }

    /// Removes a URL together with its index entries
    pub fn delete_url(&self, id: &str) -> Result<Option<UrlRecord>, StoreError> {
        let write_txn = self.db.begin_write()?;
        let removed = Self::remove_url_in(&write_txn, id)?;
        write_txn.commit()?;
        Ok(removed)
    }

    /// Deletes those of `ids` that belong to `owner_id`; returns how many went
    pub fn delete_owned(&self, owner_id: &str, ids: &[String]) -> Result<usize, StoreError> {
        let write_txn = self.db.begin_write()?;
        let mut deleted = 0;
        for id in ids {
            let owned = {
                let urls = write_txn.open_table(TABLE_URLS)?;
                let raw = urls.get(id.as_str())?.map(|v| v.value().to_string());
                decode::<UrlRecord>(raw)?
                    .is_some_and(|r| r.owner_id.as_deref() == Some(owner_id))
            };
            if owned && Self::remove_url_in(&write_txn, id)?.is_some() {
                deleted += 1;
            }
        }
        write_txn.commit()?;
        Ok(deleted)
    }

    fn remove_url_in(
        write_txn: &redb::WriteTransaction,
        id: &str,
    ) -> Result<Option<UrlRecord>, StoreError> {
        let mut urls = write_txn.open_table(TABLE_URLS)?;
        let raw = urls.remove(id)?.map(|v| v.value().to_string());
        let Some(record) = decode::<UrlRecord>(raw)? else {
            return Ok(None);
        };

        let mut codes = write_txn.open_table(TABLE_CODES)?;
        codes.remove(record.short_code.as_str())?;

        if let Some(owner_id) = &record.owner_id {
            let mut index = write_txn.open_table(TABLE_OWNER_INDEX)?;
            index.remove(owner_key(owner_id, &record).as_str())?;
        }
        Ok(Some(record))
    }

    /// Resolves `code` and, if the link is accessible, records `event`
    ///
    /// Lookup, accessibility check, history append and counter increment
    /// happen in a single write transaction, so concurrent redirects never
    /// lose clicks or overshoot `maxClicks`.
    pub fn record_click(&self, code: &str, event: ClickEvent) -> Result<ClickOutcome, StoreError> {
        let write_txn = self.db.begin_write()?;
        let outcome = {
            let codes = write_txn.open_table(TABLE_CODES)?;
            let id = codes.get(code)?.map(|v| v.value().to_string());

            match id {
                None => ClickOutcome::NotFound,
                Some(id) => {
                    let mut urls = write_txn.open_table(TABLE_URLS)?;
                    let raw = urls.get(id.as_str())?.map(|v| v.value().to_string());
                    match decode::<UrlRecord>(raw)? {
                        None => ClickOutcome::NotFound,
                        Some(mut record) => match record.inaccessible_reason(event.timestamp) {
                            Some(reason) => ClickOutcome::Gone(reason),
                            None => {
                                record.record_click(event);
                                let record_json = serde_json::to_string(&record)?;
                                urls.insert(id.as_str(), record_json.as_str())?;
                                ClickOutcome::Redirect(record.original_url)
                            }
                        },
                    }
                }
            }
        };

        if matches!(outcome, ClickOutcome::Redirect(_)) {
            write_txn.commit()?;
        } else {
            write_txn.abort()?;
        }
        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // Users
    // -----------------------------------------------------------------------

    /// Inserts `user` unless the e-mail is registered; returns `false` if it is
    pub fn insert_user(&self, user: &User) -> Result<bool, StoreError> {
        let user_json = serde_json::to_string(user)?;
        let email = normalize_email(&user.email);

        let write_txn = self.db.begin_write()?;
        let inserted = {
            let mut emails = write_txn.open_table(TABLE_EMAILS)?;
            let taken = emails.get(email.as_str())?.is_some();
            if !taken {
                emails.insert(email.as_str(), user.id.as_str())?;
                let mut users = write_txn.open_table(TABLE_USERS)?;
                users.insert(user.id.as_str(), user_json.as_str())?;
            }
            !taken
        };

        if inserted {
            write_txn.commit()?;
        } else {
            write_txn.abort()?;
        }
        Ok(inserted)
    }

    pub fn get_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let users = read_txn.open_table(TABLE_USERS)?;
        let raw = users.get(id)?.map(|v| v.value().to_string());
        decode(raw)
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let email = normalize_email(email);
        let read_txn = self.db.begin_read()?;
        let emails = read_txn.open_table(TABLE_EMAILS)?;
        let Some(id) = emails.get(email.as_str())?.map(|v| v.value().to_string()) else {
            return Ok(None);
        };
        let users = read_txn.open_table(TABLE_USERS)?;
        let raw = users.get(id.as_str())?.map(|v| v.value().to_string());
        decode(raw)
    }

    /// Applies `apply` to the stored user inside one write transaction
    ///
    /// The e-mail index entry moves with the address. Concurrent updates
    /// each see the other's committed fields, so a password change cannot
    /// undo a profile edit or vice versa.
    pub fn update_user<F>(&self, id: &str, apply: F) -> Result<UserUpdate, StoreError>
    where
        F: FnOnce(&mut User),
    {
        let write_txn = self.db.begin_write()?;
        let outcome = {
            let mut users = write_txn.open_table(TABLE_USERS)?;
            let mut emails = write_txn.open_table(TABLE_EMAILS)?;

            let raw = users.get(id)?.map(|v| v.value().to_string());
            match decode::<User>(raw)? {
                None => UserUpdate::NotFound,
                Some(mut user) => {
                    let previous_email = normalize_email(&user.email);
                    apply(&mut user);
                    let new_email = normalize_email(&user.email);

                    let owner_of_new = emails.get(new_email.as_str())?.map(|v| v.value().to_string());
                    if owner_of_new.is_some_and(|owner| owner != id) {
                        UserUpdate::EmailTaken
                    } else {
                        if previous_email != new_email {
                            emails.remove(previous_email.as_str())?;
                        }
                        emails.insert(new_email.as_str(), id)?;
                        let user_json = serde_json::to_string(&user)?;
                        users.insert(id, user_json.as_str())?;
                        UserUpdate::Updated(user)
                    }
                }
            }
        };

        if matches!(outcome, UserUpdate::Updated(_)) {
            write_txn.commit()?;
        } else {
            write_txn.abort()?;
        }
        Ok(outcome)
    }

    /// Replaces a stored user wholesale
    ///
    /// Returns `false` (and writes nothing) if the user does not exist or the
    /// new e-mail belongs to another account.
    pub fn save_user(&self, user: &User) -> Result<bool, StoreError> {
        let outcome = self.update_user(&user.id, |stored| *stored = user.clone())?;
        Ok(matches!(outcome, UserUpdate::Updated(_)))
    }

    /// Deletes an account and every URL it owns; returns the URL count removed
    pub fn delete_user(&self, id: &str) -> Result<Option<usize>, StoreError> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut users = write_txn.open_table(TABLE_USERS)?;
            let raw = users.remove(id)?.map(|v| v.value().to_string());
            decode::<User>(raw)?
        };

        let Some(user) = removed else {
            write_txn.abort()?;
            return Ok(None);
        };

        {
            let mut emails = write_txn.open_table(TABLE_EMAILS)?;
            emails.remove(normalize_email(&user.email).as_str())?;
        }

        let url_ids: Vec<String> = {
            let index = write_txn.open_table(TABLE_OWNER_INDEX)?;
            let (start, end) = owner_range(id);
            let mut ids = Vec::new();
            for entry in index.range(start.as_str()..end.as_str())? {
                let (_, url_id) = entry?;
                ids.push(url_id.value().to_string());
            }
            ids
        };

        let mut deleted = 0;
        for url_id in &url_ids {
            if Self::remove_url_in(&write_txn, url_id)?.is_some() {
                deleted += 1;
            }
        }

        write_txn.commit()?;
        Ok(Some(deleted))
    }
}

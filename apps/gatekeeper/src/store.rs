//! SQLite persistence of enrolled users and their fingerprint blobs.
//!
//! ```text
//! users(id, user_id UNIQUE, name, secondary_id)
//! fingerprints(id, user_id -> users.user_id, kind, fingerprint BLOB)
//! ```
//!
//! `kind` is `wsq` for a compressed scan and `fmd` for an enrollment template. An
//! enrollment writes its user row and every blob inside one transaction.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, ToSql, Transaction};
use serde::{Deserialize, Serialize};
use tracing::debug;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    secondary_id TEXT
);
CREATE TABLE IF NOT EXISTS fingerprints (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    kind TEXT NOT NULL,
    fingerprint BLOB NOT NULL
);
CREATE INDEX IF NOT EXISTS fingerprints_user ON fingerprints(user_id);
";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub name: String,
    pub secondary_id: Option<String>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BlobKind {
    Wsq,
    Fmd,
}

impl BlobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BlobKind::Wsq => "wsq",
            BlobKind::Fmd => "fmd",
        }
    }
}

impl fmt::Display for BlobKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wsq" => Ok(BlobKind::Wsq),
            "fmd" => Ok(BlobKind::Fmd),
            other => Err(format!("unknown fingerprint kind {:?}", other)),
        }
    }
}

impl ToSql for BlobKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for BlobKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|message: String| FromSqlError::Other(message.into()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFingerprint {
    pub id: i64,
    pub user_id: String,
    pub kind: BlobKind,
    pub blob: Vec<u8>,
}

pub struct Store {
    conn: Connection,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store").field("path", &self.conn.path()).finish()
    }
}

impl Store {
    pub fn open<P: AsRef<Path>>(path: P) -> rusqlite::Result<Store> {
        Store::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> rusqlite::Result<Store> {
        Store::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> rusqlite::Result<Store> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;

        Ok(Store { conn })
    }

    pub fn user_exists(&self, user_id: &str) -> rusqlite::Result<bool> {
        self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE user_id = ?1)",
            params![user_id],
            |row| row.get(0),
        )
    }

    pub fn user(&self, user_id: &str) -> rusqlite::Result<Option<User>> {
        self.conn
            .query_row(
                "SELECT user_id, name, secondary_id FROM users WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(User {
                        user_id: row.get(0)?,
                        name: row.get(1)?,
                        secondary_id: row.get(2)?,
                    })
                },
            )
            .optional()
    }

    pub fn users(&self) -> rusqlite::Result<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare("SELECT user_id, name, secondary_id FROM users ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(User {
                user_id: row.get(0)?,
                name: row.get(1)?,
                secondary_id: row.get(2)?,
            })
        })?;

        rows.collect()
    }

    /// Every blob stored for `user_id`, in insertion order.
    pub fn fingerprints(&self, user_id: &str) -> rusqlite::Result<Vec<StoredFingerprint>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, kind, fingerprint FROM fingerprints \
             WHERE user_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(StoredFingerprint {
                id: row.get(0)?,
                user_id: row.get(1)?,
                kind: row.get(2)?,
                blob: row.get(3)?,
            })
        })?;

        rows.collect()
    }

    /// Enrollment templates of every user, in insertion order.
    pub fn templates(&self) -> rusqlite::Result<Vec<StoredFingerprint>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, kind, fingerprint FROM fingerprints WHERE kind = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![BlobKind::Fmd], |row| {
            Ok(StoredFingerprint {
                id: row.get(0)?,
                user_id: row.get(1)?,
                kind: row.get(2)?,
                blob: row.get(3)?,
            })
        })?;

        rows.collect()
    }

    /// Inserts `user` and opens the transaction its blobs are written in.
    ///
    /// Dropping the returned value without `commit` rolls everything back.
    pub fn begin_enrollment(&mut self, user: &User) -> rusqlite::Result<EnrollmentTx<'_>> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO users (user_id, name, secondary_id) VALUES (?1, ?2, ?3)",
            params![user.user_id, user.name, user.secondary_id],
        )?;
        debug!(user_id = %user.user_id, "enrollment transaction opened");

        Ok(EnrollmentTx {
            tx,
            user_id: user.user_id.clone(),
            stored: 0,
        })
    }
}

/// Open enrollment transaction of one user.
pub struct EnrollmentTx<'s> {
    tx: Transaction<'s>,
    user_id: String,
    stored: usize,
}

impl<'s> EnrollmentTx<'s> {
    pub fn store(&mut self, kind: BlobKind, blob: &[u8]) -> rusqlite::Result<()> {
        self.tx.execute(
            "INSERT INTO fingerprints (user_id, kind, fingerprint) VALUES (?1, ?2, ?3)",
            params![self.user_id, kind, blob],
        )?;
        self.stored += 1;

        Ok(())
    }

    /// Blobs written so far.
    pub fn stored(&self) -> usize {
        self.stored
    }

    pub fn commit(self) -> rusqlite::Result<()> {
        debug!(user_id = %self.user_id, blobs = self.stored, "enrollment committed");
        self.tx.commit()
    }

    pub fn rollback(self) -> rusqlite::Result<()> {
        debug!(user_id = %self.user_id, "enrollment rolled back");
        self.tx.rollback()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> User {
        User {
            user_id: "001".to_string(),
            name: "Alice".to_string(),
            secondary_id: Some("alice@example.com".to_string()),
        }
    }

    #[test]
    fn committed_enrollment_is_visible() {
        let mut store = Store::open_in_memory().unwrap();
        let mut tx = store.begin_enrollment(&alice()).unwrap();
        tx.store(BlobKind::Wsq, b"scan").unwrap();
        tx.store(BlobKind::Fmd, b"FMR\0template").unwrap();
        assert_eq!(tx.stored(), 2);
        tx.commit().unwrap();

        assert!(store.user_exists("001").unwrap());
        assert_eq!(store.user("001").unwrap(), Some(alice()));
        let blobs = store.fingerprints("001").unwrap();
        assert_eq!(blobs.len(), 2);
        assert_eq!(blobs[0].kind, BlobKind::Wsq);
        assert_eq!(blobs[1].blob, b"FMR\0template".to_vec());

        let templates = store.templates().unwrap();
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].user_id, "001");
    }

    #[test]
    fn dropped_enrollment_rolls_back() {
        let mut store = Store::open_in_memory().unwrap();
        {
            let mut tx = store.begin_enrollment(&alice()).unwrap();
            tx.store(BlobKind::Wsq, b"scan").unwrap();
        }

        assert!(!store.user_exists("001").unwrap());
        assert!(store.fingerprints("001").unwrap().is_empty());
        assert!(store.users().unwrap().is_empty());
    }

    #[test]
    fn user_id_is_unique() {
        let mut store = Store::open_in_memory().unwrap();
        store.begin_enrollment(&alice()).unwrap().commit().unwrap();

        assert!(store.begin_enrollment(&alice()).is_err());
        assert_eq!(store.users().unwrap().len(), 1);
    }

    #[test]
    fn database_file_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gatekeeper.db");
        {
            let mut store = Store::open(&path).unwrap();
            let mut tx = store.begin_enrollment(&alice()).unwrap();
            tx.store(BlobKind::Fmd, b"FMR\0").unwrap();
            tx.commit().unwrap();
        }

        let store = Store::open(&path).unwrap();
        assert_eq!(store.templates().unwrap().len(), 1);
    }

    #[test]
    fn blob_kind_parses() {
        assert_eq!("wsq".parse::<BlobKind>(), Ok(BlobKind::Wsq));
        assert_eq!("fmd".parse::<BlobKind>(), Ok(BlobKind::Fmd));
        assert!("png".parse::<BlobKind>().is_err());
    }
}

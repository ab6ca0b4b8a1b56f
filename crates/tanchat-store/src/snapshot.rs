//! Snapshot codec: database file image <-> in-memory engine <-> slot text.
//!
//! Snapshots are always complete SQLite database images, never deltas, so a
//! slot holds either the previous full state or the next one.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rusqlite::backup::Progress;
use rusqlite::{Connection, DatabaseName};

use crate::error::{Result, StoreError};

/// Export the full database file image of `conn`, built in memory.
pub fn export(conn: &Connection) -> Result<Vec<u8>> {
    let image = conn
        .serialize(DatabaseName::Main)
        .map_err(|e| StoreError::Storage(format!("serialize: {}", e)))?;
    Ok(image.to_vec())
}

/// Restore a database file image into a fresh in-memory connection.
///
/// Only runs at load time, so the image is staged through a temporary file
/// and pulled in with the backup API.
pub fn import(image: &[u8]) -> Result<Connection> {
    let mut staged = tempfile::NamedTempFile::new()
        .map_err(|e| StoreError::Initialization(format!("stage snapshot: {}", e)))?;
    std::io::Write::write_all(&mut staged, image)
        .map_err(|e| StoreError::Initialization(format!("stage snapshot: {}", e)))?;

    let mut conn = Connection::open_in_memory()
        .map_err(|e| StoreError::Initialization(format!("open_in_memory: {}", e)))?;
    conn.restore(DatabaseName::Main, staged.path(), None::<fn(Progress)>)
        .map_err(|e| StoreError::Initialization(format!("corrupt snapshot: {}", e)))?;

    // A non-database image only fails once a page is actually read.
    conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))
        .map_err(|e| StoreError::Initialization(format!("corrupt snapshot: {}", e)))?;
    Ok(conn)
}

/// Text-safe encoding for the durable slot.
pub fn encode(image: &[u8]) -> String {
    STANDARD.encode(image)
}

pub fn decode(text: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(text.trim())
        .map_err(|e| StoreError::Initialization(format!("snapshot is not valid base64: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_import_preserves_rows() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE notes (id TEXT PRIMARY KEY, body TEXT NOT NULL);
             INSERT INTO notes VALUES ('a', 'first'), ('b', 'second');",
        )
        .unwrap();

        let image = export(&conn).unwrap();
        assert!(image.starts_with(b"SQLite format 3\0"));

        let restored = import(&decode(&encode(&image)).unwrap()).unwrap();
        let bodies: Vec<String> = restored
            .prepare("SELECT body FROM notes ORDER BY id")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert_eq!(bodies, vec!["first", "second"]);
    }

    #[test]
    fn garbage_image_is_an_initialization_error() {
        let err = import(&[0x5a; 4096]).unwrap_err();
        assert!(matches!(err, StoreError::Initialization(_)), "{err}");
    }

    #[test]
    fn invalid_base64_is_an_initialization_error() {
        let err = decode("%%%not base64%%%").unwrap_err();
        assert!(matches!(err, StoreError::Initialization(_)));
    }
}

use rusqlite::Connection;
use tanchat_store::schema::{ensure_schema, table_names};

#[test]
fn ensure_schema_twice_adds_nothing() {
    let conn = Connection::open_in_memory().unwrap();
    ensure_schema(&conn).unwrap();
    let objects = |conn: &Connection| -> i64 {
        conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| row.get(0))
            .unwrap()
    };
    let before = objects(&conn);
    ensure_schema(&conn).unwrap();
    assert_eq!(objects(&conn), before);
    assert_eq!(table_names().count(), 5);
}

use rusqlite::{ffi, params, Connection, Row};
use softdelete_core::db::migrations::Migration;
use softdelete_core::db::{open_db_in_memory, DbError};
use softdelete_core::{
    ForeignKey, ModelDescriptor, ModelRegistry, OnDelete, RecordId, SoftDeletable,
    SoftDeleteConfig, SoftDeleteState, SoftDeleteStore, StoreError, StoreResult,
};

const NODE_SCHEMA: &str = "
CREATE TABLE nodes (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    parent_id INTEGER REFERENCES nodes(id),
    is_deleted INTEGER NOT NULL DEFAULT 0,
    deleted_at INTEGER,
    restored_at INTEGER,
    deletion_batch TEXT
);
CREATE INDEX idx_nodes_parent_id ON nodes(parent_id);

CREATE TABLE pins (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    node_id INTEGER REFERENCES nodes(id),
    is_deleted INTEGER NOT NULL DEFAULT 0,
    deleted_at INTEGER,
    restored_at INTEGER,
    deletion_batch TEXT
);

CREATE TABLE tags (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    node_id INTEGER NOT NULL DEFAULT 1 REFERENCES nodes(id),
    is_deleted INTEGER NOT NULL DEFAULT 0,
    deleted_at INTEGER,
    restored_at INTEGER,
    deletion_batch TEXT
);
";

const NODE_MIGRATIONS: [Migration; 1] = [Migration::new(1, NODE_SCHEMA)];

const CHAIN_DEPTH: i64 = 10_000;

macro_rules! node_model {
    ($name:ident, $table:literal, [$($fk:expr),*]) => {
        #[derive(Debug, Clone, PartialEq, Eq)]
        struct $name {
            id: RecordId,
            state: SoftDeleteState,
        }

        impl SoftDeletable for $name {
            const MODEL: ModelDescriptor = ModelDescriptor::soft_deletable($table, &[$($fk),*]);

            fn from_row(row: &Row<'_>) -> StoreResult<Self> {
                Ok(Self {
                    id: row.get("id")?,
                    state: SoftDeleteState::from_row(row)?,
                })
            }

            fn id(&self) -> RecordId {
                self.id
            }

            fn state(&self) -> &SoftDeleteState {
                &self.state
            }

            fn state_mut(&mut self) -> &mut SoftDeleteState {
                &mut self.state
            }
        }
    };
}

node_model!(
    Node,
    "nodes",
    [ForeignKey::new("parent_id", "nodes", OnDelete::Cascade)]
);
node_model!(
    Pin,
    "pins",
    [ForeignKey::new("node_id", "nodes", OnDelete::DoNothing)]
);
node_model!(
    Tag,
    "tags",
    [ForeignKey::new("node_id", "nodes", OnDelete::SetDefault)]
);

fn node_store(conn: &Connection) -> SoftDeleteStore<'_> {
    let mut registry = ModelRegistry::new();
    registry.register::<Node>().unwrap();
    registry.register::<Pin>().unwrap();
    registry.register::<Tag>().unwrap();
    SoftDeleteStore::try_new(conn, registry, SoftDeleteConfig::default()).unwrap()
}

/// Inserts nodes `1..=depth`, each one the child of the previous.
fn insert_chain(conn: &Connection, depth: i64) {
    conn.execute(
        "WITH RECURSIVE seq(n) AS (
             SELECT 1
             UNION ALL
             SELECT n + 1 FROM seq WHERE n < ?1
         )
         INSERT INTO nodes (id, name, parent_id)
         SELECT n, 'node-' || n, CASE WHEN n = 1 THEN NULL ELSE n - 1 END
         FROM seq;",
        [depth],
    )
    .unwrap();
}

fn insert_pin(conn: &Connection, node_id: RecordId) -> RecordId {
    conn.execute(
        "INSERT INTO pins (name, node_id) VALUES ('pin', ?1);",
        [node_id],
    )
    .unwrap();
    conn.last_insert_rowid()
}

fn insert_tag(conn: &Connection, node_id: RecordId) -> RecordId {
    conn.execute(
        "INSERT INTO tags (name, node_id) VALUES ('tag', ?1);",
        params![node_id],
    )
    .unwrap();
    conn.last_insert_rowid()
}

fn node_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM nodes;", [], |row| row.get(0))
        .unwrap()
}

fn defer_foreign_keys(conn: &Connection) -> bool {
    conn.query_row("PRAGMA defer_foreign_keys;", [], |row| row.get(0))
        .unwrap()
}

fn is_foreign_key_failure(err: &StoreError) -> bool {
    matches!(
        err,
        StoreError::Db(DbError::Sqlite(rusqlite::Error::SqliteFailure(code, _)))
            if code.extended_code == ffi::SQLITE_CONSTRAINT_FOREIGNKEY
    )
}

#[test]
fn deep_chain_soft_delete_reaches_every_level() {
    let conn = open_db_in_memory(&NODE_MIGRATIONS).unwrap();
    let store = node_store(&conn);
    insert_chain(&conn, CHAIN_DEPTH);

    let affected = store.soft_delete_by_id::<Node>(1).unwrap();

    assert_eq!(affected as i64, CHAIN_DEPTH);
    assert_eq!(store.alive::<Node>().count().unwrap(), 0);
    let leaf = store.deleted::<Node>().get(CHAIN_DEPTH).unwrap().unwrap();
    let batch = leaf.state.deletion_batch.unwrap();
    assert_eq!(
        store.deleted::<Node>().in_batch(batch).count().unwrap() as i64,
        CHAIN_DEPTH
    );
}

#[test]
fn deep_chain_hard_delete_removes_every_level() {
    let conn = open_db_in_memory(&NODE_MIGRATIONS).unwrap();
    let store = node_store(&conn);
    insert_chain(&conn, CHAIN_DEPTH);
    // Half the chain already tombstoned.
    store.soft_delete_by_id::<Node>(CHAIN_DEPTH / 2).unwrap();

    let removed = store.hard_delete_by_id::<Node>(1).unwrap();

    assert_eq!(removed as i64, CHAIN_DEPTH);
    assert_eq!(node_count(&conn), 0);
    assert!(conn.is_autocommit());
}

#[test]
fn dangling_do_nothing_dependent_fails_the_call() {
    let conn = open_db_in_memory(&NODE_MIGRATIONS).unwrap();
    let store = node_store(&conn);
    insert_chain(&conn, 2);
    insert_pin(&conn, 2);

    let err = store.hard_delete_by_id::<Node>(2).unwrap_err();
    assert!(is_foreign_key_failure(&err), "unexpected error: {err:?}");
    assert_eq!(node_count(&conn), 2);
    assert!(!defer_foreign_keys(&conn));
}

#[test]
fn dangling_do_nothing_dependent_fails_inside_caller_transaction() {
    let conn = open_db_in_memory(&NODE_MIGRATIONS).unwrap();
    let store = node_store(&conn);
    insert_chain(&conn, 2);
    let pin_id = insert_pin(&conn, 2);

    conn.execute_batch("BEGIN;").unwrap();
    let err = store.hard_delete_by_id::<Node>(2).unwrap_err();
    assert!(is_foreign_key_failure(&err), "unexpected error: {err:?}");
    assert!(!conn.is_autocommit());
    assert!(!defer_foreign_keys(&conn));
    assert_eq!(node_count(&conn), 2);

    // The caller's transaction is still usable and commits cleanly.
    conn.execute("DELETE FROM pins WHERE id = ?1;", [pin_id])
        .unwrap();
    assert_eq!(store.hard_delete_by_id::<Node>(2).unwrap(), 1);
    conn.execute_batch("COMMIT;").unwrap();
    assert_eq!(node_count(&conn), 1);
}

#[test]
fn hard_delete_keeps_caller_defer_setting() {
    let conn = open_db_in_memory(&NODE_MIGRATIONS).unwrap();
    let store = node_store(&conn);
    insert_chain(&conn, 3);

    conn.execute_batch("BEGIN;").unwrap();
    assert_eq!(store.hard_delete_by_id::<Node>(3).unwrap(), 1);
    assert!(!defer_foreign_keys(&conn));

    conn.execute_batch("PRAGMA defer_foreign_keys = ON;").unwrap();
    assert_eq!(store.hard_delete_by_id::<Node>(2).unwrap(), 1);
    assert!(defer_foreign_keys(&conn));

    conn.execute_batch("ROLLBACK;").unwrap();
    assert_eq!(node_count(&conn), 3);
}

#[test]
fn set_default_moves_dependents_to_column_default() {
    let conn = open_db_in_memory(&NODE_MIGRATIONS).unwrap();
    let store = node_store(&conn);
    insert_chain(&conn, 3);
    let tag_id = insert_tag(&conn, 2);

    // Node 2 takes its child 3 along; the tag falls back to node 1.
    assert_eq!(store.hard_delete_by_id::<Node>(2).unwrap(), 2);

    let node_ref: i64 = conn
        .query_row("SELECT node_id FROM tags WHERE id = ?1;", [tag_id], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(node_ref, 1);
    assert!(store.alive::<Tag>().get(tag_id).unwrap().is_some());
}

//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `softdelete_core` linkage with a deterministic in-memory run.
//! - Print view counts after each lifecycle step of a three-record scenario.

use rusqlite::Row;
use softdelete_core::db::migrations::Migration;
use softdelete_core::db::open_db_in_memory;
use softdelete_core::{
    ForeignKey, ModelDescriptor, ModelRegistry, OnDelete, RecordId, SoftDeletable,
    SoftDeleteConfig, SoftDeleteState, SoftDeleteStore, StoreResult, Visibility,
};
use std::error::Error;

const DEMO_MIGRATIONS: [Migration; 1] = [Migration::new(1, include_str!("demo_schema.sql"))];

macro_rules! demo_model {
    ($name:ident, $table:literal, [$($fk:expr),*]) => {
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

demo_model!(DemoRecord, "records", []);
demo_model!(
    Attachment,
    "attachments",
    [ForeignKey::new("record_id", "records", OnDelete::Cascade)]
);

fn main() -> Result<(), Box<dyn Error>> {
    println!("softdelete_core version={}", softdelete_core::core_version());

    let conn = open_db_in_memory(&DEMO_MIGRATIONS)?;
    let mut registry = ModelRegistry::new();
    registry.register::<DemoRecord>()?;
    registry.register::<Attachment>()?;
    let store = SoftDeleteStore::try_new(&conn, registry, SoftDeleteConfig::default())?;
    println!("registered tables={}", store.registry().tables().join(","));

    print_counts(&store, "initial")?;

    let mut a = store
        .alive::<DemoRecord>()
        .get(1)?
        .ok_or("record A missing")?;
    let cascaded = a.soft_delete(&store)?;
    println!("soft_delete A affected={cascaded}");
    print_counts(&store, "after soft_delete A")?;

    a.restore(&store)?;
    print_counts(&store, "after restore A")?;

    let c = store
        .alive::<DemoRecord>()
        .get(3)?
        .ok_or("record C missing")?;
    let removed = c.hard_delete(&store)?;
    println!("hard_delete C removed={removed}");
    print_counts(&store, "after hard_delete C")?;

    Ok(())
}

fn print_counts(store: &SoftDeleteStore<'_>, step: &str) -> StoreResult<()> {
    let mut counts = Vec::new();
    for visibility in [Visibility::Alive, Visibility::Deleted, Visibility::All] {
        let count = store.view::<DemoRecord>(visibility).count()?;
        counts.push(format!("{}={count}", visibility.as_str()));
    }
    println!(
        "{step}: records {} attachments_deleted={}",
        counts.join(" "),
        store.deleted::<Attachment>().count()?,
    );
    Ok(())
}

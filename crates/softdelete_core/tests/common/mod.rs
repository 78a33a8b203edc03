#![allow(dead_code)]

use rusqlite::{params, Connection, Row};
use softdelete_core::db::migrations::Migration;
use softdelete_core::db::open_db_in_memory;
use softdelete_core::{
    ForeignKey, ModelDescriptor, ModelRegistry, OnDelete, RecordId, SoftDeletable,
    SoftDeleteConfig, SoftDeleteState, SoftDeleteStore, StoreResult,
};

pub const SHOP_MIGRATIONS: [Migration; 1] =
    [Migration::new(1, include_str!("../fixtures/shop_schema.sql"))];

macro_rules! shop_model {
    ($name:ident, $table:literal, [$($fk:expr),* $(,)?]) => {
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            pub id: RecordId,
            pub name: String,
            pub state: SoftDeleteState,
        }

        impl SoftDeletable for $name {
            const MODEL: ModelDescriptor = ModelDescriptor::soft_deletable($table, &[$($fk),*]);

            fn from_row(row: &Row<'_>) -> StoreResult<Self> {
                Ok(Self {
                    id: row.get("id")?,
                    name: row.get("name")?,
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

shop_model!(Shop, "shops", []);
shop_model!(
    Category,
    "categories",
    [ForeignKey::new("shop_id", "shops", OnDelete::Cascade)]
);
shop_model!(
    Product,
    "products",
    [
        ForeignKey::new("shop_id", "shops", OnDelete::Cascade),
        ForeignKey::new("category_id", "categories", OnDelete::Cascade),
    ]
);
shop_model!(
    RestrictedProduct,
    "restricted_products",
    [
        ForeignKey::new("shop_id", "shops", OnDelete::Cascade),
        ForeignKey::new("category_id", "categories", OnDelete::Restrict),
    ]
);
shop_model!(
    ProductOption,
    "options",
    [ForeignKey::new("product_id", "products", OnDelete::Cascade)]
);
shop_model!(
    Color,
    "colors",
    [ForeignKey::new("product_id", "products", OnDelete::Cascade)]
);
shop_model!(
    Order,
    "orders",
    [ForeignKey::new("product_id", "products", OnDelete::Protect)]
);
shop_model!(
    Lead,
    "leads",
    [ForeignKey::new("product_id", "products", OnDelete::SetNull)]
);
shop_model!(Employee, "employees", []);
shop_model!(
    ShopEmployee,
    "shop_employees",
    [
        ForeignKey::new("shop_id", "shops", OnDelete::Cascade),
        ForeignKey::new("employee_id", "employees", OnDelete::Cascade),
    ]
);

pub const PRODUCT_NOTES: ModelDescriptor = ModelDescriptor::plain(
    "product_notes",
    &[ForeignKey::new("product_id", "products", OnDelete::Cascade)],
);

pub fn open_shop_db() -> Connection {
    open_db_in_memory(&SHOP_MIGRATIONS).unwrap()
}

pub fn shop_registry() -> ModelRegistry {
    let mut registry = ModelRegistry::new();
    registry.register::<Shop>().unwrap();
    registry.register::<Category>().unwrap();
    registry.register::<Product>().unwrap();
    registry.register::<RestrictedProduct>().unwrap();
    registry.register::<ProductOption>().unwrap();
    registry.register::<Color>().unwrap();
    registry.register::<Order>().unwrap();
    registry.register::<Lead>().unwrap();
    registry.register::<Employee>().unwrap();
    registry.register::<ShopEmployee>().unwrap();
    registry.register_descriptor(PRODUCT_NOTES).unwrap();
    registry
}

pub fn shop_store(conn: &Connection) -> SoftDeleteStore<'_> {
    shop_store_with(conn, SoftDeleteConfig::default())
}

pub fn shop_store_with(conn: &Connection, config: SoftDeleteConfig) -> SoftDeleteStore<'_> {
    SoftDeleteStore::try_new(conn, shop_registry(), config).unwrap()
}

pub fn insert_shop(conn: &Connection, name: &str) -> RecordId {
    conn.execute("INSERT INTO shops (name) VALUES (?1);", [name])
        .unwrap();
    conn.last_insert_rowid()
}

pub fn insert_category(conn: &Connection, name: &str, shop_id: Option<RecordId>) -> RecordId {
    conn.execute(
        "INSERT INTO categories (name, shop_id) VALUES (?1, ?2);",
        params![name, shop_id],
    )
    .unwrap();
    conn.last_insert_rowid()
}

pub fn insert_product(
    conn: &Connection,
    name: &str,
    shop_id: RecordId,
    category_id: Option<RecordId>,
) -> RecordId {
    conn.execute(
        "INSERT INTO products (name, shop_id, category_id) VALUES (?1, ?2, ?3);",
        params![name, shop_id, category_id],
    )
    .unwrap();
    conn.last_insert_rowid()
}

pub fn insert_restricted_product(
    conn: &Connection,
    name: &str,
    shop_id: RecordId,
    category_id: RecordId,
) -> RecordId {
    conn.execute(
        "INSERT INTO restricted_products (name, shop_id, category_id) VALUES (?1, ?2, ?3);",
        params![name, shop_id, category_id],
    )
    .unwrap();
    conn.last_insert_rowid()
}

/// Inserts into a table whose only foreign key is `product_id`.
pub fn insert_product_child(
    conn: &Connection,
    table: &str,
    name: &str,
    product_id: RecordId,
) -> RecordId {
    conn.execute(
        &format!("INSERT INTO {table} (name, product_id) VALUES (?1, ?2);"),
        params![name, product_id],
    )
    .unwrap();
    conn.last_insert_rowid()
}

pub fn insert_note(conn: &Connection, body: &str, product_id: RecordId) -> RecordId {
    conn.execute(
        "INSERT INTO product_notes (body, product_id) VALUES (?1, ?2);",
        params![body, product_id],
    )
    .unwrap();
    conn.last_insert_rowid()
}

pub fn insert_employee(conn: &Connection, name: &str) -> RecordId {
    conn.execute("INSERT INTO employees (name) VALUES (?1);", [name])
        .unwrap();
    conn.last_insert_rowid()
}

pub fn insert_shop_employee(
    conn: &Connection,
    shop_id: RecordId,
    employee_id: RecordId,
) -> RecordId {
    conn.execute(
        "INSERT INTO shop_employees (name, shop_id, employee_id) VALUES ('staff', ?1, ?2);",
        params![shop_id, employee_id],
    )
    .unwrap();
    conn.last_insert_rowid()
}

pub fn row_count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

/// Asserts `is_deleted` iff `deleted_at` for every row of `table`.
pub fn assert_flag_invariant(conn: &Connection, table: &str) {
    let violations: i64 = conn
        .query_row(
            &format!(
                "SELECT COUNT(*) FROM {table}
                 WHERE (is_deleted = 1 AND deleted_at IS NULL)
                    OR (is_deleted = 0 AND deleted_at IS NOT NULL);"
            ),
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(violations, 0, "flag invariant broken in `{table}`");
}

pub const SOFT_TABLES: [&str; 10] = [
    "shops",
    "categories",
    "products",
    "restricted_products",
    "options",
    "colors",
    "orders",
    "leads",
    "employees",
    "shop_employees",
];

pub fn assert_all_invariants(conn: &Connection) {
    for table in SOFT_TABLES {
        assert_flag_invariant(conn, table);
    }
}

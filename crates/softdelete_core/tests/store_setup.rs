mod common;

use common::*;
use rusqlite::Connection;
use softdelete_core::{
    ConfigError, ModelRegistry, RelationshipError, SoftDeleteConfig, SoftDeleteStore, StoreError,
};

fn registry_of_shops() -> ModelRegistry {
    let mut registry = ModelRegistry::new();
    registry.register::<Shop>().unwrap();
    registry
}

#[test]
fn registry_lists_tables_in_sorted_order() {
    let mut registry = registry_of_shops();
    registry.register::<Employee>().unwrap();
    registry.register::<Category>().unwrap();
    assert_eq!(registry.tables(), vec!["categories", "employees", "shops"]);
}

#[test]
fn missing_table_is_rejected() {
    let conn = Connection::open_in_memory().unwrap();
    let err =
        SoftDeleteStore::try_new(&conn, registry_of_shops(), SoftDeleteConfig::default())
            .unwrap_err();
    assert!(matches!(
        err,
        StoreError::RelationshipIntrospection(RelationshipError::MissingTable("shops"))
    ));
}

#[test]
fn missing_soft_delete_column_is_rejected() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE shops (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            deleted_at INTEGER
        );",
    )
    .unwrap();

    let err =
        SoftDeleteStore::try_new(&conn, registry_of_shops(), SoftDeleteConfig::default())
            .unwrap_err();
    assert!(matches!(
        err,
        StoreError::RelationshipIntrospection(RelationshipError::MissingColumn {
            table: "shops",
            column: "restored_at",
        })
    ));
}

#[test]
fn unresolved_foreign_key_is_rejected() {
    let conn = open_shop_db();
    let mut registry = ModelRegistry::new();
    registry.register::<Product>().unwrap();

    let err = SoftDeleteStore::try_new(&conn, registry, SoftDeleteConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        StoreError::RelationshipIntrospection(RelationshipError::UnknownReference {
            table: "products",
            ..
        })
    ));
}

#[test]
fn excluded_relations_are_checked() {
    let conn = open_shop_db();

    let malformed = SoftDeleteConfig {
        excluded_relations: vec!["options".to_string()],
        ..SoftDeleteConfig::default()
    };
    let err = SoftDeleteStore::try_new(&conn, shop_registry(), malformed).unwrap_err();
    assert!(matches!(
        err,
        StoreError::Config(ConfigError::InvalidRelation(_))
    ));

    let undeclared = SoftDeleteConfig {
        excluded_relations: vec!["options.shop_id".to_string()],
        ..SoftDeleteConfig::default()
    };
    let err = SoftDeleteStore::try_new(&conn, shop_registry(), undeclared).unwrap_err();
    assert!(matches!(
        err,
        StoreError::RelationshipIntrospection(RelationshipError::UnknownRelation(_))
    ));
}

#[test]
fn unregistered_model_is_rejected_at_call_time() {
    let conn = open_shop_db();
    let store =
        SoftDeleteStore::try_new(&conn, registry_of_shops(), SoftDeleteConfig::default())
            .unwrap();
    let product_id = {
        let shop_id = insert_shop(&conn, "alpha");
        insert_product(&conn, "hammer", shop_id, None)
    };

    let err = store.soft_delete_by_id::<Product>(product_id).unwrap_err();
    assert!(matches!(
        err,
        StoreError::RelationshipIntrospection(RelationshipError::UnknownModel(ref table))
            if table == "products"
    ));
    assert!(matches!(
        store.alive::<Product>().count(),
        Err(StoreError::RelationshipIntrospection(_))
    ));
}

#[test]
fn store_reads_config_from_json() {
    let conn = open_shop_db();
    let config = SoftDeleteConfig::from_json_str(
        r#"{"strict": true, "excluded_relations": ["product_notes.product_id"]}"#,
    )
    .unwrap();
    let store = SoftDeleteStore::try_new(&conn, shop_registry(), config).unwrap();
    assert!(store.config().strict);
    assert_eq!(store.registry().tables().len(), SOFT_TABLES.len() + 1);
    assert!(store.registry().tables().contains(&"product_notes"));

    // The excluded plain relation no longer trips strict mode.
    let shop_id = insert_shop(&conn, "alpha");
    let product_id = insert_product(&conn, "hammer", shop_id, None);
    insert_note(&conn, "fragile", product_id);
    assert_eq!(store.soft_delete_by_id::<Shop>(shop_id).unwrap(), 2);
}

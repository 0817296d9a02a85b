use super::*;
use fx_core::{cause_chain, ColumnType, CoreError};
use fx_db::SqliteCatalog;
use fx_testing::{table_name, MockCatalog, TableBuilder};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_csv(root: &Path, dataset: &str, table: &str, contents: &str) {
    let dir = root.join(dataset).join("main").join("main");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(format!("{table}.csv")), contents).unwrap();
}

fn mock_schema() -> Vec<fx_core::Table> {
    let customers = TableBuilder::new(table_name("customers"))
        .column("customer_id", ColumnType::Integer)
        .column("name", ColumnType::Varchar)
        .primary_key(&["customer_id"])
        .build();
    let invoices = TableBuilder::new(table_name("invoices"))
        .column("invoice_id", ColumnType::Integer)
        .column("customer_id", ColumnType::Integer)
        .primary_key(&["invoice_id"])
        .index("idx_inv_cust", false, &["customer_id"])
        .references(
            "fk_inv_cust",
            &table_name("customers"),
            &["customer_id"],
            &["customer_id"],
        )
        .build();
    vec![customers, invoices]
}

fn base_fixtures(root: &Path) {
    write_csv(
        root,
        "base",
        "customers",
        "customer_id,name\n101,Alice\n102,Bob\n",
    );
    write_csv(
        root,
        "base",
        "invoices",
        "invoice_id,customer_id\n1001,101\n1002,102\n",
    );
}

fn call_position(calls: &[String], needle: &str) -> usize {
    calls
        .iter()
        .position(|c| c.contains(needle))
        .unwrap_or_else(|| panic!("call '{needle}' not found in {calls:?}"))
}

#[tokio::test]
async fn test_disable_strategy_call_order() {
    let dir = TempDir::new().unwrap();
    base_fixtures(dir.path());
    let catalog = MockCatalog::new(mock_schema()).with_constraint_toggle(true);
    let datasets = Datasets::scan(dir.path()).unwrap();

    let rows = Populator::new(&catalog, datasets)
        .load(&["base"])
        .await
        .unwrap();
    assert_eq!(rows, 4);
    assert_eq!(catalog.inserted_rows(&table_name("customers")), 2);
    assert_eq!(catalog.inserted_rows(&table_name("invoices")), 2);

    let calls = catalog.calls();
    let disable = call_position(&calls, "disable fk fk_inv_cust");
    let delete = call_position(&calls, "delete customers");
    let begin = call_position(&calls, "begin");
    let insert = call_position(&calls, "insert customers");
    let commit = call_position(&calls, "commit");
    let enable = call_position(&calls, "enable fk fk_inv_cust");
    assert!(disable < delete && delete < begin && begin < insert);
    assert!(insert < commit && commit < enable);
    assert!(!calls.iter().any(|c| c.contains("validate fk")));
}

#[tokio::test]
async fn test_disable_strategy_with_revalidation() {
    let dir = TempDir::new().unwrap();
    base_fixtures(dir.path());
    let catalog = MockCatalog::new(mock_schema()).with_constraint_toggle(true);
    let datasets = Datasets::scan(dir.path()).unwrap();

    Populator::new(&catalog, datasets)
        .with_revalidation(true)
        .load(&["base"])
        .await
        .unwrap();

    let calls = catalog.calls();
    let enable = call_position(&calls, "enable fk fk_inv_cust");
    let validate = call_position(&calls, "validate fk fk_inv_cust");
    assert!(enable < validate);
}

#[tokio::test]
async fn test_drop_recreate_strategy_call_order() {
    let dir = TempDir::new().unwrap();
    base_fixtures(dir.path());
    let catalog = MockCatalog::new(mock_schema()).with_constraint_toggle(false);
    let datasets = Datasets::scan(dir.path()).unwrap();

    Populator::new(&catalog, datasets)
        .load(&["base"])
        .await
        .unwrap();

    let calls = catalog.calls();
    let drop_fk = call_position(&calls, "drop fk fk_inv_cust");
    let drop_index = call_position(&calls, "drop index idx_inv_cust");
    let delete = call_position(&calls, "delete invoices");
    let insert = call_position(&calls, "insert invoices");
    let create_index = call_position(&calls, "create index idx_inv_cust");
    let create_fk = call_position(&calls, "create fk fk_inv_cust");
    assert!(drop_fk < drop_index && drop_index < delete && delete < insert);
    // Indexes come back before FKs: a FK may target a unique index.
    assert!(insert < create_index && create_index < create_fk);
}

#[tokio::test]
async fn test_failed_insert_still_restores_constraints() {
    let dir = TempDir::new().unwrap();
    base_fixtures(dir.path());
    let catalog = MockCatalog::new(mock_schema())
        .with_constraint_toggle(true)
        .with_failing_insert("invoices");
    let datasets = Datasets::scan(dir.path()).unwrap();

    let err = Populator::new(&catalog, datasets)
        .load(&["base"])
        .await
        .unwrap_err();
    match &err {
        PopulateError::DatasetLoad { dataset, file, .. } => {
            assert_eq!(dataset, "base");
            assert!(file.ends_with("invoices.csv"));
        }
        other => panic!("expected DatasetLoad, got {other:?}"),
    }

    let calls = catalog.calls();
    let failed = call_position(&calls, "insert invoices FAILED");
    let rollback = call_position(&calls, "rollback");
    let enable = call_position(&calls, "enable fk fk_inv_cust");
    assert!(failed < rollback && rollback < enable);
    assert!(!calls.iter().any(|c| c == "commit"));
}

#[tokio::test]
async fn test_static_loaded_once_per_populator() {
    let dir = TempDir::new().unwrap();
    base_fixtures(dir.path());
    write_csv(dir.path(), "static", "customers", "customer_id,name\n900,Seed\n");
    let catalog = MockCatalog::new(mock_schema());
    let datasets = Datasets::scan(dir.path()).unwrap();

    let mut populator = Populator::new(&catalog, datasets);
    assert_eq!(populator.load(&["base"]).await.unwrap(), 5);
    assert_eq!(populator.load(&["base"]).await.unwrap(), 4);
    // Even an explicit request does not reload static.
    assert_eq!(populator.load(&["static", "base"]).await.unwrap(), 4);
}

#[tokio::test]
async fn test_missing_table_fails_before_any_mutation() {
    let dir = TempDir::new().unwrap();
    write_csv(dir.path(), "base", "ghosts", "id\n1\n");
    let catalog = MockCatalog::new(mock_schema());
    let datasets = Datasets::scan(dir.path()).unwrap();

    let err = Populator::new(&catalog, datasets)
        .load(&["base"])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PopulateError::Core(CoreError::MissingTable { .. })
    ));
    let calls = catalog.calls();
    assert!(!calls.iter().any(|c| c.contains("begin")
        || c.contains("delete")
        || c.contains("insert")));
}

#[tokio::test]
async fn test_unknown_dataset_rejected() {
    let dir = TempDir::new().unwrap();
    base_fixtures(dir.path());
    let catalog = MockCatalog::new(mock_schema());
    let datasets = Datasets::scan(dir.path()).unwrap();

    let err = Populator::new(&catalog, datasets)
        .load(&["phantom"])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PopulateError::Core(CoreError::DatasetNotFound { .. })
    ));
}

#[tokio::test]
async fn test_identity_insert_toggled_around_auto_increment_table() {
    let dir = TempDir::new().unwrap();
    write_csv(dir.path(), "base", "counters", "counter_id,label\n1,a\n");
    let counters = TableBuilder::new(table_name("counters"))
        .auto_increment_column("counter_id", ColumnType::Integer)
        .column("label", ColumnType::Varchar)
        .primary_key(&["counter_id"])
        .build();
    let catalog = MockCatalog::new(vec![counters]).with_identity_insert(true);
    let datasets = Datasets::scan(dir.path()).unwrap();

    Populator::new(&catalog, datasets)
        .load(&["base"])
        .await
        .unwrap();

    let calls = catalog.calls();
    let on = call_position(&calls, "identity on counters");
    let insert = call_position(&calls, "insert counters");
    let off = call_position(&calls, "identity off counters");
    assert!(on < insert && insert < off);
}

#[tokio::test]
async fn test_commit_between_insert_groups() {
    let dir = TempDir::new().unwrap();
    write_csv(
        dir.path(),
        "base",
        "customers",
        "customer_id,name\n1,a\n2,b\n3,c\n4,d\n5,e\n",
    );
    let catalog = MockCatalog::new(mock_schema());
    let datasets = Datasets::scan(dir.path()).unwrap();

    let rows = Populator::new(&catalog, datasets)
        .with_insert_batch_size(2)
        .load(&["base"])
        .await
        .unwrap();
    assert_eq!(rows, 5);

    let calls = catalog.calls();
    let commits = calls.iter().filter(|c| *c == "commit").count();
    // Two group commits plus the final one.
    assert_eq!(commits, 3);
}

#[tokio::test]
async fn test_unknown_column_named_in_error_chain() {
    let dir = TempDir::new().unwrap();
    write_csv(
        dir.path(),
        "base",
        "customers",
        "customer_id,nickname\n1,shadow\n",
    );
    let catalog = MockCatalog::new(mock_schema());
    let datasets = Datasets::scan(dir.path()).unwrap();

    let err = Populator::new(&catalog, datasets)
        .load(&["base"])
        .await
        .unwrap_err();
    let chain = cause_chain(&err);
    assert!(chain[0].contains("Failed to load dataset 'base'"));
    assert!(chain[1].contains("nickname"));
}

/// The invoices scenario from end to end on SQLite: 3 customers,
/// 4 invoices, 7 details in `base`, 3 products in `static`.
async fn scenario_db() -> SqliteCatalog {
    let db = SqliteCatalog::in_memory().unwrap();
    db.execute("CREATE TABLE products (product_id INTEGER PRIMARY KEY, label TEXT NOT NULL)")
        .await
        .unwrap();
    db.execute("CREATE TABLE customers (customer_id INTEGER PRIMARY KEY, name TEXT NOT NULL)")
        .await
        .unwrap();
    db.execute(
        "CREATE TABLE invoices (
            invoice_id INTEGER PRIMARY KEY,
            customer_id INTEGER NOT NULL REFERENCES customers(customer_id)
        )",
    )
    .await
    .unwrap();
    db.execute(
        "CREATE TABLE invoice_details (
            invoice_detail_id INTEGER PRIMARY KEY,
            invoice_id INTEGER NOT NULL REFERENCES invoices(invoice_id),
            product_id INTEGER NOT NULL REFERENCES products(product_id)
        )",
    )
    .await
    .unwrap();
    db
}

fn scenario_fixtures(root: &Path) {
    write_csv(
        root,
        "static",
        "products",
        "product_id,label\n201,anvil\n202,rocket\n203,magnet\n",
    );
    write_csv(
        root,
        "base",
        "customers",
        "customer_id,name\n101,Alice\n102,Bob\n103,Carol\n",
    );
    write_csv(
        root,
        "base",
        "invoices",
        "invoice_id,customer_id\n1001,101\n1002,101\n1003,102\n1004,103\n",
    );
    write_csv(
        root,
        "base",
        "invoice_details",
        "invoice_detail_id,invoice_id,product_id\n\
         9001,1001,201\n9002,1001,202\n9003,1002,201\n9004,1002,203\n\
         9005,1003,202\n9006,1004,203\n9007,1004,201\n",
    );
}

#[tokio::test]
async fn test_scenario_static_counts_on_sqlite() {
    let db = scenario_db().await;
    let dir = TempDir::new().unwrap();
    scenario_fixtures(dir.path());
    let datasets = Datasets::scan(dir.path()).unwrap();

    let mut populator = Populator::new(&db, datasets);
    assert_eq!(populator.load(&["base"]).await.unwrap(), 17);
    assert_eq!(populator.load(&["base"]).await.unwrap(), 14);

    let products = db.query("SELECT * FROM products", &[]).await.unwrap();
    assert_eq!(products.rows.len(), 3);
    let details = db.query("SELECT * FROM invoice_details", &[]).await.unwrap();
    assert_eq!(details.rows.len(), 7);
}

#[tokio::test]
async fn test_constraints_enforced_after_load_on_sqlite() {
    let db = scenario_db().await;
    let dir = TempDir::new().unwrap();
    scenario_fixtures(dir.path());
    let datasets = Datasets::scan(dir.path()).unwrap();

    Populator::new(&db, datasets).load(&["base"]).await.unwrap();

    let orphan = db
        .insert_rows(
            &table_name("invoices"),
            &["invoice_id".into(), "customer_id".into()],
            &[vec![fx_core::Value::Integer(7777), fx_core::Value::Integer(9999)]],
        )
        .await;
    assert!(orphan.is_err(), "FK validation must be restored after load");
}

#[tokio::test]
async fn test_failed_load_rolls_back_and_restores_constraints_on_sqlite() {
    let db = scenario_db().await;
    let dir = TempDir::new().unwrap();
    // The decode failure arrives on the second file, after customers
    // inserted cleanly inside the open transaction.
    write_csv(
        dir.path(),
        "base",
        "customers",
        "customer_id,name\n101,Alice\n",
    );
    write_csv(
        dir.path(),
        "base",
        "invoices",
        "invoice_id,customer_id\nnot-a-number,101\n",
    );
    let datasets = Datasets::scan(dir.path()).unwrap();

    let err = Populator::new(&db, datasets)
        .load(&["base"])
        .await
        .unwrap_err();
    assert!(matches!(err, PopulateError::DatasetLoad { .. }));

    let customers = db.query("SELECT * FROM customers", &[]).await.unwrap();
    assert!(customers.rows.is_empty(), "transaction must roll back");

    let orphan = db
        .insert_rows(
            &table_name("invoices"),
            &["invoice_id".into(), "customer_id".into()],
            &[vec![fx_core::Value::Integer(7777), fx_core::Value::Integer(9999)]],
        )
        .await;
    assert!(orphan.is_err(), "FK validation must be restored after failure");
}

use super::*;
use fx_db::SqliteCatalog;
use std::fs;
use tempfile::TempDir;

fn name(t: &str) -> TableName {
    TableName::new("main", "main", t)
}

fn file_lines(root: &Path, table: &str) -> Vec<String> {
    fs::read_to_string(root.join(format!("base/main/main/{table}.csv")))
        .unwrap()
        .lines()
        .map(String::from)
        .collect()
}

/// customers/products/invoices/invoice_details with a small row set.
async fn seeded_db() -> SqliteCatalog {
    let db = SqliteCatalog::in_memory().unwrap();
    db.execute("CREATE TABLE customers (customer_id INTEGER PRIMARY KEY, name TEXT NOT NULL)")
        .await
        .unwrap();
    db.execute("CREATE TABLE products (product_id INTEGER PRIMARY KEY, label TEXT NOT NULL)")
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

    let customers: Vec<Vec<Value>> = [(101, "Alice"), (102, "Bob"), (103, "Carol")]
        .iter()
        .map(|(id, n)| vec![Value::Integer(*id), Value::Text(n.to_string())])
        .collect();
    db.insert_rows(&name("customers"), &["customer_id".into(), "name".into()], &customers)
        .await
        .unwrap();

    let products: Vec<Vec<Value>> = [(201, "anvil"), (202, "rocket"), (203, "magnet")]
        .iter()
        .map(|(id, l)| vec![Value::Integer(*id), Value::Text(l.to_string())])
        .collect();
    db.insert_rows(&name("products"), &["product_id".into(), "label".into()], &products)
        .await
        .unwrap();

    let invoices: Vec<Vec<Value>> = [(1001, 101), (1002, 101), (1003, 102), (1004, 103)]
        .iter()
        .map(|(id, c)| vec![Value::Integer(*id), Value::Integer(*c)])
        .collect();
    db.insert_rows(&name("invoices"), &["invoice_id".into(), "customer_id".into()], &invoices)
        .await
        .unwrap();

    let details: Vec<Vec<Value>> = [
        (9001, 1001, 201),
        (9002, 1001, 202),
        (9003, 1002, 201),
        (9004, 1002, 203),
        (9005, 1003, 202),
        (9006, 1004, 203),
        (9007, 1004, 201),
    ]
    .iter()
    .map(|(id, inv, prod)| {
        vec![
            Value::Integer(*id),
            Value::Integer(*inv),
            Value::Integer(*prod),
        ]
    })
    .collect();
    db.insert_rows(
        &name("invoice_details"),
        &[
            "invoice_detail_id".into(),
            "invoice_id".into(),
            "product_id".into(),
        ],
        &details,
    )
    .await
    .unwrap();

    db
}

#[tokio::test]
async fn test_bulk_download_writes_all_rows() {
    let db = seeded_db().await;
    let dir = TempDir::new().unwrap();
    let mut ctx = ExecutionContext::new(DownloadMode::Save, None);

    download_bulk(
        &db,
        dir.path(),
        "base",
        &[name("customers"), name("invoices")],
        &mut ctx,
    )
    .await
    .unwrap();

    assert_eq!(ctx.row_count(&name("customers")), 3);
    assert_eq!(ctx.row_count(&name("invoices")), 4);
    assert_eq!(file_lines(dir.path(), "customers").len(), 4);
    assert_eq!(file_lines(dir.path(), "invoices").len(), 5);
    assert!(!ctx.summary().max_rows_reached);
}

#[tokio::test]
async fn test_bulk_download_rerun_appends_nothing() {
    let db = seeded_db().await;
    let dir = TempDir::new().unwrap();

    let mut first = ExecutionContext::new(DownloadMode::Save, None);
    download_bulk(&db, dir.path(), "base", &[name("customers")], &mut first)
        .await
        .unwrap();

    let mut second = ExecutionContext::new(DownloadMode::Save, None);
    download_bulk(&db, dir.path(), "base", &[name("customers")], &mut second)
        .await
        .unwrap();

    assert_eq!(second.row_count(&name("customers")), 0);
    assert_eq!(file_lines(dir.path(), "customers").len(), 4);
}

#[tokio::test]
async fn test_bulk_download_duplicate_table_runs_once() {
    let db = seeded_db().await;
    let dir = TempDir::new().unwrap();
    let mut ctx = ExecutionContext::new(DownloadMode::Save, None);

    download_bulk(
        &db,
        dir.path(),
        "base",
        &[name("customers"), name("customers")],
        &mut ctx,
    )
    .await
    .unwrap();

    assert_eq!(ctx.row_count(&name("customers")), 3);
    assert_eq!(file_lines(dir.path(), "customers").len(), 4);
}

#[tokio::test]
async fn test_structured_download_follows_foreign_keys() {
    let db = seeded_db().await;
    let dir = TempDir::new().unwrap();
    let mut ctx = ExecutionContext::new(DownloadMode::Save, None);

    let root = Dependency::root(name("invoices"))
        .with_filters(vec![QueryFilter::new("invoice_id", "1001")]);
    download_structured(&db, dir.path(), "base", root, &mut ctx)
        .await
        .unwrap();

    // invoice 1001 -> customer 101, details 9001/9002 -> products 201/202
    assert_eq!(ctx.row_count(&name("invoices")), 1);
    assert_eq!(ctx.row_count(&name("customers")), 1);
    assert_eq!(ctx.row_count(&name("invoice_details")), 2);
    assert_eq!(ctx.row_count(&name("products")), 2);

    let customers = file_lines(dir.path(), "customers");
    assert_eq!(customers.len(), 2);
    assert!(customers[1].starts_with("101,"));
}

#[tokio::test]
async fn test_structured_download_incremental_dedup() {
    let db = seeded_db().await;
    let dir = TempDir::new().unwrap();

    let mut first = ExecutionContext::new(DownloadMode::Save, None);
    let root = Dependency::root(name("invoices"))
        .with_filters(vec![QueryFilter::new("invoice_id", "1001")]);
    download_structured(&db, dir.path(), "base", root, &mut first)
        .await
        .unwrap();
    let lines_before = file_lines(dir.path(), "invoices").len();

    // New source row, then a re-run targeting it: exactly one new line,
    // the prior line untouched.
    db.insert_rows(
        &name("invoices"),
        &["invoice_id".into(), "customer_id".into()],
        &[vec![Value::Integer(1005), Value::Integer(102)]],
    )
    .await
    .unwrap();

    let mut second = ExecutionContext::new(DownloadMode::Save, None);
    let rerun = Dependency::root(name("invoices"))
        .with_filters(vec![QueryFilter::new("invoice_id", "1005")]);
    download_structured(&db, dir.path(), "base", rerun, &mut second)
        .await
        .unwrap();

    let lines = file_lines(dir.path(), "invoices");
    assert_eq!(lines.len(), lines_before + 1);
    assert!(lines[1].starts_with("1001,"));
    assert!(lines.last().unwrap().starts_with("1005,"));

    // Re-running the same filter adds nothing.
    let mut third = ExecutionContext::new(DownloadMode::Save, None);
    let again = Dependency::root(name("invoices"))
        .with_filters(vec![QueryFilter::new("invoice_id", "1005")]);
    download_structured(&db, dir.path(), "base", again, &mut third)
        .await
        .unwrap();
    assert_eq!(third.row_count(&name("invoices")), 0);
    assert_eq!(file_lines(dir.path(), "invoices").len(), lines_before + 1);
}

#[tokio::test]
async fn test_row_budget_stops_the_request() {
    let db = seeded_db().await;
    let dir = TempDir::new().unwrap();
    let mut ctx = ExecutionContext::new(DownloadMode::Save, Some(5));

    download_bulk(
        &db,
        dir.path(),
        "base",
        &[name("invoice_details"), name("customers")],
        &mut ctx,
    )
    .await
    .unwrap();

    let summary = ctx.summary();
    assert!(summary.max_rows_reached);
    assert_eq!(summary.row_counts[&name("invoice_details")], 5);
    assert_eq!(summary.rows_skipped[&name("invoice_details")], 2);
    // The second table was never downloaded.
    assert!(!summary.row_counts.contains_key(&name("customers")));
}

#[tokio::test]
async fn test_count_mode_reports_without_writing() {
    let db = seeded_db().await;
    let dir = TempDir::new().unwrap();
    let mut ctx = ExecutionContext::new(DownloadMode::Count, None);

    let root = Dependency::root(name("invoices"))
        .with_filters(vec![QueryFilter::new("invoice_id", "1001")]);
    download_structured(&db, dir.path(), "base", root, &mut ctx)
        .await
        .unwrap();

    assert_eq!(ctx.row_count(&name("invoices")), 1);
    assert_eq!(ctx.row_count(&name("invoice_details")), 2);
    assert!(!dir.path().join("base").exists());
}

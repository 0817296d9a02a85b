use super::*;

fn name(db: &DuckDbCatalog, table: &str) -> TableName {
    TableName::new(db.catalog_name(), "main", table)
}

#[tokio::test]
async fn test_in_memory() {
    let db = DuckDbCatalog::in_memory().unwrap();
    assert_eq!(db.engine(), "duckdb");
    assert!(!db.supports_constraint_toggle());
    assert!(!db.catalog_name().is_empty());
}

#[tokio::test]
async fn test_insert_and_query() {
    let db = DuckDbCatalog::in_memory().unwrap();
    db.execute("CREATE TABLE products (product_id INTEGER, label VARCHAR)")
        .await
        .unwrap();
    db.insert_rows(
        &name(&db, "products"),
        &["product_id".into(), "label".into()],
        &[
            vec![Value::Integer(1), Value::Text("anvil".into())],
            vec![Value::Integer(2), Value::Text("rocket".into())],
        ],
    )
    .await
    .unwrap();

    let result = db
        .query(
            "SELECT product_id, label FROM products WHERE product_id = ?",
            &[Value::Integer(2)],
        )
        .await
        .unwrap();
    assert_eq!(result.columns[0].name, "product_id");
    assert_eq!(result.columns[0].column_type, ColumnType::Integer);
    assert_eq!(
        result.rows,
        vec![vec![Value::Integer(2), Value::Text("rocket".into())]]
    );
}

#[tokio::test]
async fn test_table_introspection() {
    let db = DuckDbCatalog::in_memory().unwrap();
    db.execute(
        "CREATE TABLE customers (
            customer_id INTEGER PRIMARY KEY,
            name VARCHAR NOT NULL,
            balance DECIMAL(10,2),
            joined TIMESTAMP
        )",
    )
    .await
    .unwrap();

    let table = db.table(&name(&db, "customers")).await.unwrap();
    let types: Vec<ColumnType> = table.columns().iter().map(|c| c.column_type()).collect();
    assert_eq!(
        types,
        vec![
            ColumnType::Integer,
            ColumnType::Varchar,
            ColumnType::BigDecimal,
            ColumnType::Timestamp
        ]
    );
    assert!(!table.column("name").unwrap().nullable());
    assert_eq!(table.primary_key_columns(), vec!["customer_id".to_string()]);
}

#[tokio::test]
async fn test_foreign_key_introspection() {
    let db = DuckDbCatalog::in_memory().unwrap();
    db.execute("CREATE TABLE parents (id INTEGER PRIMARY KEY)")
        .await
        .unwrap();
    db.execute(
        "CREATE TABLE children (id INTEGER PRIMARY KEY, parent_id INTEGER REFERENCES parents(id))",
    )
    .await
    .unwrap();

    let table = db.table(&name(&db, "children")).await.unwrap();
    assert_eq!(table.foreign_keys().len(), 1);
    let fk = &table.foreign_keys()[0];
    assert_eq!(fk.pk_table().table(), "parents");
    assert_eq!(fk.fk_columns(), ["parent_id".to_string()]);
    assert_eq!(fk.pk_columns(), ["id".to_string()]);
    assert!(fk.definition().is_some());

    let referencing = db
        .referencing_foreign_keys(&name(&db, "parents"))
        .await
        .unwrap();
    assert_eq!(referencing.len(), 1);
}

#[tokio::test]
async fn test_missing_table() {
    let db = DuckDbCatalog::in_memory().unwrap();
    let err = db.table(&name(&db, "phantom")).await.unwrap_err();
    assert!(matches!(err, DbError::TableNotFound(_)));
}

#[tokio::test]
async fn test_transaction_rollback() {
    let db = DuckDbCatalog::in_memory().unwrap();
    db.execute("CREATE TABLE t (id INTEGER)").await.unwrap();
    db.begin().await.unwrap();
    db.execute("INSERT INTO t VALUES (1)").await.unwrap();
    db.rollback().await.unwrap();
    let result = db.query("SELECT * FROM t", &[]).await.unwrap();
    assert!(result.rows.is_empty());
}

#[test]
fn test_parse_primary_key_text() {
    assert_eq!(
        parse_primary_key_text("PRIMARY KEY(customer_id)"),
        Some(vec!["customer_id".to_string()])
    );
    assert_eq!(
        parse_primary_key_text("PRIMARY KEY(a, b)"),
        Some(vec!["a".to_string(), "b".to_string()])
    );
}

#[test]
fn test_parse_foreign_key_text() {
    let (fk_columns, parent, pk_columns) =
        parse_foreign_key_text("FOREIGN KEY (parent_id) REFERENCES parents(id)").unwrap();
    assert_eq!(fk_columns, vec!["parent_id".to_string()]);
    assert_eq!(parent, "parents");
    assert_eq!(pk_columns, vec!["id".to_string()]);

    let (fk_columns, parent, pk_columns) =
        parse_foreign_key_text("FOREIGN KEY (a, b) REFERENCES \"odd table\"(c, d)").unwrap();
    assert_eq!(fk_columns.len(), 2);
    assert_eq!(parent, "odd table");
    assert_eq!(pk_columns, vec!["c".to_string(), "d".to_string()]);

    assert!(parse_foreign_key_text("CHECK (x > 0)").is_none());
}

#[test]
fn test_parse_index_columns() {
    assert_eq!(
        parse_index_columns("CREATE INDEX idx_a ON t (a, b)"),
        vec!["a".to_string(), "b".to_string()]
    );
    assert_eq!(
        parse_index_columns("CREATE UNIQUE INDEX u ON s.t (\"col\")"),
        vec!["col".to_string()]
    );
    assert!(parse_index_columns("no index here").is_empty());
}

#[test]
fn test_map_data_type() {
    assert_eq!(map_data_type("INTEGER"), ColumnType::Integer);
    assert_eq!(map_data_type("BIGINT"), ColumnType::Integer);
    assert_eq!(map_data_type("BOOLEAN"), ColumnType::Integer);
    assert_eq!(map_data_type("VARCHAR"), ColumnType::Varchar);
    assert_eq!(map_data_type("DECIMAL(10,2)"), ColumnType::BigDecimal);
    assert_eq!(map_data_type("DOUBLE"), ColumnType::BigDecimal);
    assert_eq!(map_data_type("TIMESTAMP WITH TIME ZONE"), ColumnType::Timestamp);
    assert_eq!(map_data_type("DATE"), ColumnType::Timestamp);
    assert_eq!(map_data_type("BLOB"), ColumnType::Binary);
    assert_eq!(map_data_type("INTERVAL"), ColumnType::Varchar);
}

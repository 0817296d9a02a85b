use super::*;
use tempfile::TempDir;

fn write_fixture(root: &Path, dataset: &str, table: &str, contents: &str) {
    let dir = root.join(dataset).join("main").join("main");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(format!("{table}.csv")), contents).unwrap();
}

#[test]
fn test_scan_builds_table_names_from_path() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path(), "base", "customers", "customer_id,name\n1,Alice\n");

    let datasets = Datasets::scan(dir.path()).unwrap();
    let base = datasets.get("base").unwrap();
    assert_eq!(base.files().len(), 1);
    assert_eq!(
        base.files()[0].table(),
        &TableName::new("main", "main", "customers")
    );
    assert!(base.files()[0].path().ends_with("base/main/main/customers.csv"));
}

#[test]
fn test_scan_synthesizes_reserved_datasets() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path(), "extra", "t", "id\n1\n");

    let datasets = Datasets::scan(dir.path()).unwrap();
    let names: Vec<&str> = datasets.all().iter().map(|d| d.name()).collect();
    assert_eq!(names, vec!["static", "base", "extra"]);
    assert!(datasets.get("static").unwrap().is_empty());
    assert!(datasets.get("base").unwrap().is_empty());
}

#[test]
fn test_scan_skips_non_csv_files() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path(), "base", "customers", "customer_id\n1\n");
    let schema_dir = dir.path().join("base").join("main").join("main");
    fs::write(schema_dir.join("README.txt"), "not a fixture").unwrap();
    fs::write(dir.path().join("base").join("notes.md"), "stray").unwrap();

    let datasets = Datasets::scan(dir.path()).unwrap();
    assert_eq!(datasets.get("base").unwrap().files().len(), 1);
}

#[test]
fn test_scan_missing_root() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope");
    let err = Datasets::scan(&missing).unwrap_err();
    assert!(matches!(err, CoreError::FixtureRootNotFound { .. }));
}

#[test]
fn test_dataset_ordering() {
    assert_eq!(compare_dataset_names("static", "base"), Ordering::Less);
    assert_eq!(compare_dataset_names("base", "aardvark"), Ordering::Less);
    assert_eq!(compare_dataset_names("alpha", "beta"), Ordering::Less);
    assert_eq!(compare_dataset_names("base", "base"), Ordering::Equal);
    assert_eq!(compare_dataset_names("zeta", "static"), Ordering::Greater);
}

#[test]
fn test_data_file_path_convention() {
    let path = Datasets::data_file_path(
        Path::new("/fixtures"),
        "base",
        &TableName::new("db", "public", "invoices"),
    );
    assert_eq!(
        path,
        Path::new("/fixtures/base/db/public/invoices.csv")
    );
}

#[test]
fn test_validate_all_tables_exist_names_offending_file() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path(), "base", "customers", "customer_id\n1\n");
    write_fixture(dir.path(), "base", "ghosts", "id\n1\n");

    let datasets = Datasets::scan(dir.path()).unwrap();
    let known: BTreeSet<TableName> =
        [TableName::new("main", "main", "customers")].into_iter().collect();

    let err = datasets
        .validate_all_tables_exist(&["base"], &known)
        .unwrap_err();
    match err {
        CoreError::MissingTable { table, file } => {
            assert_eq!(table, "main.main.ghosts");
            assert!(file.ends_with("ghosts.csv"));
        }
        other => panic!("expected MissingTable, got {other:?}"),
    }
}

#[test]
fn test_validate_unknown_dataset() {
    let dir = TempDir::new().unwrap();
    write_fixture(dir.path(), "base", "customers", "customer_id\n1\n");
    let datasets = Datasets::scan(dir.path()).unwrap();
    let err = datasets
        .validate_all_tables_exist(&["phantom"], &BTreeSet::new())
        .unwrap_err();
    assert!(matches!(err, CoreError::DatasetNotFound { .. }));
}

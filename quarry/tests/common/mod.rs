#![allow(dead_code)]

use quarry::Database;
use std::sync::Arc;
use strata::heap_file::HeapFile;
use strata::transaction::TransactionId;
use strata::tuple::{Field, FieldType, Tuple, TupleDesc};
use tempfile::TempDir;

/// A scratch database rooted in its own temp directory. Dropping it removes
/// every file the test created.
pub struct TestDb {
    pub dir: TempDir,
    pub db: Arc<Database>,
}

pub fn setup() -> TestDb {
    setup_with_pool(50)
}

pub fn setup_with_pool(pool_pages: usize) -> TestDb {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(Database::open(dir.path().join("quarry.log"), pool_pages).unwrap());
    TestDb { dir, db }
}

pub fn int_desc(names: &[&str]) -> TupleDesc {
    TupleDesc::new(
        vec![FieldType::Int; names.len()],
        names.iter().map(|n| Some(n.to_string())).collect(),
    )
}

pub fn int_tuple(td: &TupleDesc, values: &[i32]) -> Tuple {
    Tuple::new(td.clone(), values.iter().map(|v| Field::Int(*v)).collect())
}

/// Creates an all-int table, loads `rows` into it under one committed
/// transaction, and returns the table id.
pub fn create_int_table(tdb: &TestDb, name: &str, cols: &[&str], rows: &[Vec<i32>]) -> u32 {
    let td = int_desc(cols);
    let file = Arc::new(
        HeapFile::open(tdb.dir.path().join(format!("{name}.dat")), td.clone()).unwrap(),
    );
    let table_id = tdb.db.add_table(file, name, cols[0]);

    let tid = TransactionId::new();
    for row in rows {
        tdb.db
            .buffer_pool()
            .insert_tuple(tid, table_id, int_tuple(&td, row))
            .unwrap();
    }
    tdb.db.buffer_pool().transaction_complete(tid, true).unwrap();
    table_id
}

/// The int cells of a tuple, in field order.
pub fn row_values(tuple: &Tuple) -> Vec<i32> {
    tuple
        .fields()
        .iter()
        .map(|f| match f {
            Field::Int(v) => *v,
            other => panic!("expected int field, got {other:?}"),
        })
        .collect()
}

/// Scans a table under a fresh committed transaction and returns the rows
/// sorted, so callers can compare without caring about page order.
pub fn table_contents(tdb: &TestDb, table_id: u32) -> Vec<Vec<i32>> {
    use quarry::executor::{drain, OpIterator, SeqScan};

    let tid = TransactionId::new();
    let mut scan = SeqScan::new(&tdb.db, tid, table_id, "t").unwrap();
    scan.open().unwrap();
    let mut rows: Vec<Vec<i32>> = drain(&mut scan)
        .unwrap()
        .iter()
        .map(row_values)
        .collect();
    scan.close();
    tdb.db.buffer_pool().transaction_complete(tid, true).unwrap();
    rows.sort();
    rows
}

mod common;

use common::{create_int_table, int_desc, int_tuple, row_values, setup, table_contents};
use quarry::aggregate_executor::{Aggregate, AggregateOp};
use quarry::errors::ExecutionError;
use quarry::executor::{drain, Delete, Filter, Insert, Join, OpIterator, OrderBy, SeqScan, TupleIterator};
use quarry::predicate::{JoinPredicate, Op, Predicate};
use strata::transaction::TransactionId;
use strata::tuple::{Field, FieldType, TupleDesc};

#[test]
fn seq_scan_reads_every_row_with_aliased_schema() {
    let tdb = setup();
    let rows = vec![vec![1, 10], vec![2, 20], vec![3, 30]];
    let table_id = create_int_table(&tdb, "points", &["id", "v"], &rows);

    let tid = TransactionId::new();
    let mut scan = SeqScan::new(&tdb.db, tid, table_id, "p").unwrap();
    assert_eq!(scan.tuple_desc().field_name(0), Some("p.id"));
    assert_eq!(scan.tuple_desc().field_name(1), Some("p.v"));
    assert_eq!(scan.table_name(), "points");
    assert_eq!(scan.alias(), "p");

    scan.open().unwrap();
    let mut seen: Vec<Vec<i32>> = drain(&mut scan).unwrap().iter().map(row_values).collect();
    seen.sort();
    assert_eq!(seen, rows);
    scan.close();
    tdb.db.buffer_pool().transaction_complete(tid, true).unwrap();
}

#[test]
fn filter_over_scan_keeps_matching_rows() {
    let tdb = setup();
    let rows: Vec<Vec<i32>> = (0..20).map(|i| vec![i, i * 10]).collect();
    let table_id = create_int_table(&tdb, "nums", &["id", "v"], &rows);

    let tid = TransactionId::new();
    let scan = SeqScan::new(&tdb.db, tid, table_id, "n").unwrap();
    let mut filter = Filter::new(
        Predicate::new(1, Op::GreaterThanOrEq, Field::Int(150)),
        Box::new(scan),
    );
    filter.open().unwrap();
    let mut seen: Vec<Vec<i32>> = drain(&mut filter).unwrap().iter().map(row_values).collect();
    seen.sort();
    assert_eq!(seen, vec![vec![15, 150], vec![16, 160], vec![17, 170], vec![18, 180], vec![19, 190]]);
    filter.close();
    tdb.db.buffer_pool().transaction_complete(tid, true).unwrap();
}

#[test]
fn join_matches_rows_across_tables() {
    let tdb = setup();
    let left_id = create_int_table(&tdb, "orders", &["user", "amount"], &[
        vec![1, 100],
        vec![2, 200],
        vec![2, 250],
        vec![9, 900],
    ]);
    let right_id = create_int_table(&tdb, "users", &["id", "age"], &[
        vec![1, 30],
        vec![2, 40],
        vec![3, 50],
    ]);

    let tid = TransactionId::new();
    let left = SeqScan::new(&tdb.db, tid, left_id, "o").unwrap();
    let right = SeqScan::new(&tdb.db, tid, right_id, "u").unwrap();
    let mut join = Join::new(
        JoinPredicate::new(0, Op::Equals, 0),
        Box::new(left),
        Box::new(right),
    );

    assert_eq!(join.tuple_desc().num_fields(), 4);
    assert_eq!(join.tuple_desc().field_name(0), Some("o.user"));
    assert_eq!(join.tuple_desc().field_name(2), Some("u.id"));

    join.open().unwrap();
    let mut seen: Vec<Vec<i32>> = drain(&mut join).unwrap().iter().map(row_values).collect();
    seen.sort();
    assert_eq!(seen, vec![
        vec![1, 100, 1, 30],
        vec![2, 200, 2, 40],
        vec![2, 250, 2, 40],
    ]);
    join.close();
    tdb.db.buffer_pool().transaction_complete(tid, true).unwrap();
}

#[test]
fn grouped_count_over_a_table() {
    let tdb = setup();
    let table_id = create_int_table(&tdb, "ga", &["g", "a"], &[
        vec![1, 10],
        vec![1, 20],
        vec![2, 30],
    ]);

    let tid = TransactionId::new();
    let scan = SeqScan::new(&tdb.db, tid, table_id, "ga").unwrap();
    let mut agg = Aggregate::new(Box::new(scan), 1, Some(0), AggregateOp::Count).unwrap();
    agg.open().unwrap();
    assert_eq!(agg.tuple_desc().field_name(1), Some("COUNT (ga.a)"));

    let mut seen: Vec<Vec<i32>> = drain(&mut agg).unwrap().iter().map(row_values).collect();
    seen.sort();
    assert_eq!(seen, vec![vec![1, 2], vec![2, 1]]);
    agg.close();
    tdb.db.buffer_pool().transaction_complete(tid, true).unwrap();
}

#[test]
fn ungrouped_average_over_a_table() {
    let tdb = setup();
    let table_id = create_int_table(&tdb, "ga", &["g", "a"], &[
        vec![1, 10],
        vec![1, 20],
        vec![2, 30],
    ]);

    let tid = TransactionId::new();
    let scan = SeqScan::new(&tdb.db, tid, table_id, "ga").unwrap();
    let mut agg = Aggregate::new(Box::new(scan), 1, None, AggregateOp::Avg).unwrap();
    agg.open().unwrap();
    let rows = drain(&mut agg).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].field(0), Some(&Field::Int(20)));
    agg.close();
    tdb.db.buffer_pool().transaction_complete(tid, true).unwrap();
}

#[test]
fn order_by_sorts_scan_output() {
    let tdb = setup();
    let table_id = create_int_table(&tdb, "nums", &["id", "v"], &[
        vec![1, 30],
        vec![2, 10],
        vec![3, 20],
    ]);

    let tid = TransactionId::new();
    let scan = SeqScan::new(&tdb.db, tid, table_id, "n").unwrap();
    let mut sort = OrderBy::new(1, false, Box::new(scan));
    sort.open().unwrap();
    let seen: Vec<Vec<i32>> = drain(&mut sort).unwrap().iter().map(row_values).collect();
    assert_eq!(seen, vec![vec![1, 30], vec![3, 20], vec![2, 10]]);
    sort.close();
    tdb.db.buffer_pool().transaction_complete(tid, true).unwrap();
}

#[test]
fn rewound_pipeline_replays_identical_output() {
    let tdb = setup();
    let rows: Vec<Vec<i32>> = (0..50).map(|i| vec![i, i % 7]).collect();
    let table_id = create_int_table(&tdb, "nums", &["id", "m"], &rows);

    let tid = TransactionId::new();
    let scan = SeqScan::new(&tdb.db, tid, table_id, "n").unwrap();
    let mut filter = Filter::new(Predicate::new(1, Op::Equals, Field::Int(3)), Box::new(scan));
    filter.open().unwrap();
    let first: Vec<Vec<i32>> = drain(&mut filter).unwrap().iter().map(row_values).collect();
    filter.rewind().unwrap();
    let second: Vec<Vec<i32>> = drain(&mut filter).unwrap().iter().map(row_values).collect();
    assert_eq!(first, second);
    assert!(!first.is_empty());
    filter.close();
    tdb.db.buffer_pool().transaction_complete(tid, true).unwrap();
}

#[test]
fn insert_operator_reports_count_once() {
    let tdb = setup();
    let table_id = create_int_table(&tdb, "sink", &["id", "v"], &[]);

    let td = int_desc(&["id", "v"]);
    let fresh = TupleIterator::new(
        td.clone(),
        (0..5).map(|i| int_tuple(&td, &[i, i * 2])).collect(),
    );

    let tid = TransactionId::new();
    let mut insert = Insert::new(&tdb.db, tid, Box::new(fresh), table_id);
    insert.open().unwrap();
    let first = insert.next().unwrap().unwrap();
    assert_eq!(first.field(0), Some(&Field::Int(5)));
    assert!(insert.next().unwrap().is_none());
    insert.close();
    tdb.db.buffer_pool().transaction_complete(tid, true).unwrap();

    assert_eq!(table_contents(&tdb, table_id).len(), 5);
}

#[test]
fn insert_rejects_mismatched_child_schema() {
    let tdb = setup();
    let table_id = create_int_table(&tdb, "sink", &["id", "v"], &[]);

    let wrong = TupleDesc::from_types(vec![FieldType::Str]);
    let child = TupleIterator::new(wrong, Vec::new());
    let tid = TransactionId::new();
    let mut insert = Insert::new(&tdb.db, tid, Box::new(child), table_id);
    assert!(matches!(
        insert.open(),
        Err(ExecutionError::SchemaMismatch(_))
    ));
    tdb.db.buffer_pool().transaction_complete(tid, true).unwrap();
}

#[test]
fn delete_operator_removes_filtered_rows() {
    let tdb = setup();
    let rows: Vec<Vec<i32>> = (0..10).map(|i| vec![i, i % 2]).collect();
    let table_id = create_int_table(&tdb, "nums", &["id", "odd"], &rows);

    let tid = TransactionId::new();
    let scan = SeqScan::new(&tdb.db, tid, table_id, "n").unwrap();
    let filter = Filter::new(Predicate::new(1, Op::Equals, Field::Int(1)), Box::new(scan));
    let mut delete = Delete::new(&tdb.db, tid, Box::new(filter));
    delete.open().unwrap();
    let deleted = delete.next().unwrap().unwrap();
    assert_eq!(deleted.field(0), Some(&Field::Int(5)));
    delete.close();
    tdb.db.buffer_pool().transaction_complete(tid, true).unwrap();

    let remaining = table_contents(&tdb, table_id);
    assert_eq!(remaining.len(), 5);
    assert!(remaining.iter().all(|row| row[1] == 0));
}

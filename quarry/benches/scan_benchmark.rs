use criterion::{criterion_group, criterion_main, Criterion};
use quarry::executor::{drain, Filter, OpIterator, SeqScan};
use quarry::optimizer::IntHistogram;
use quarry::predicate::{Op, Predicate};
use quarry::Database;
use std::hint::black_box;
use std::sync::Arc;
use strata::heap_file::HeapFile;
use strata::transaction::TransactionId;
use strata::tuple::{Field, FieldType, Tuple, TupleDesc};

fn setup_table(rows: i32) -> (tempfile::TempDir, Database, u32) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("bench.log"), 50).unwrap();

    let td = TupleDesc::new(
        vec![FieldType::Int, FieldType::Int],
        vec![Some("id".to_string()), Some("v".to_string())],
    );
    let file = Arc::new(HeapFile::open(dir.path().join("bench.dat"), td.clone()).unwrap());
    let table_id = db.add_table(file, "bench", "id");

    let tid = TransactionId::new();
    for i in 0..rows {
        let tuple = Tuple::new(td.clone(), vec![Field::Int(i), Field::Int(i % 100)]);
        db.buffer_pool().insert_tuple(tid, table_id, tuple).unwrap();
    }
    db.buffer_pool().transaction_complete(tid, true).unwrap();
    (dir, db, table_id)
}

fn bench_filtered_scan(c: &mut Criterion) {
    let (_dir, db, table_id) = setup_table(5_000);

    c.bench_function("filtered_seq_scan_5k", |b| {
        b.iter(|| {
            let tid = TransactionId::new();
            let scan = SeqScan::new(&db, tid, table_id, "b").unwrap();
            let mut filter = Filter::new(
                Predicate::new(1, Op::Equals, Field::Int(7)),
                Box::new(scan),
            );
            filter.open().unwrap();
            let rows = drain(&mut filter).unwrap();
            filter.close();
            db.buffer_pool().transaction_complete(tid, true).unwrap();
            black_box(rows.len())
        })
    });
}

fn bench_histogram_probe(c: &mut Criterion) {
    let mut hist = IntHistogram::new(100, 0, 9_999);
    for v in 0..10_000 {
        hist.add_value(v);
    }

    c.bench_function("histogram_estimate_sweep", |b| {
        b.iter(|| {
            let mut acc = 0.0;
            for v in (0..10_000).step_by(97) {
                acc += hist.estimate_selectivity(Op::GreaterThan, black_box(v));
            }
            black_box(acc)
        })
    });
}

criterion_group!(benches, bench_filtered_scan, bench_histogram_probe);
criterion_main!(benches);

mod common;

use common::{create_int_table, setup};
use quarry::optimizer::stats::DEFAULT_IO_COST_PER_PAGE;
use quarry::optimizer::TableStats;
use quarry::predicate::Op;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strata::tuple::Field;

#[test]
fn scan_cost_tracks_page_count() {
    let tdb = setup();
    // 600 two-int rows need two 4 KiB pages (504 slots each).
    let rows: Vec<Vec<i32>> = (0..600).map(|i| vec![i, 0]).collect();
    let table_id = create_int_table(&tdb, "t", &["id", "v"], &rows);

    let stats = TableStats::new(&tdb.db, table_id, DEFAULT_IO_COST_PER_PAGE).unwrap();
    assert_eq!(stats.total_tuples(), 600);
    assert_eq!(stats.estimate_scan_cost(), 2.0 * DEFAULT_IO_COST_PER_PAGE as f64);
}

#[test]
fn cardinality_scales_with_selectivity() {
    let tdb = setup();
    let rows: Vec<Vec<i32>> = (0..200).map(|i| vec![i, 0]).collect();
    let table_id = create_int_table(&tdb, "t", &["id", "v"], &rows);

    let stats = TableStats::new(&tdb.db, table_id, 1).unwrap();
    assert_eq!(stats.estimate_table_cardinality(1.0), 200);
    assert_eq!(stats.estimate_table_cardinality(0.25), 50);
    assert_eq!(stats.estimate_table_cardinality(0.0), 0);
}

#[test]
fn histogram_selectivities_match_uniform_data() {
    let tdb = setup();
    // Column 1 holds each value of 0..100 exactly five times.
    let rows: Vec<Vec<i32>> = (0..500).map(|i| vec![i, i % 100]).collect();
    let table_id = create_int_table(&tdb, "t", &["id", "v"], &rows);

    let stats = TableStats::new(&tdb.db, table_id, 1).unwrap();

    let eq = stats.estimate_selectivity(1, Op::Equals, &Field::Int(50));
    assert!((eq - 0.01).abs() < 0.005, "eq gave {eq}");

    let gt = stats.estimate_selectivity(1, Op::GreaterThan, &Field::Int(49));
    assert!((gt - 0.5).abs() < 0.05, "gt gave {gt}");

    assert_eq!(stats.estimate_selectivity(1, Op::LessThan, &Field::Int(-1)), 0.0);
    assert_eq!(stats.estimate_selectivity(1, Op::NotEquals, &Field::Int(1000)), 1.0);
}

#[test]
fn skewed_data_shifts_the_estimates() {
    let tdb = setup();
    let mut rng = StdRng::seed_from_u64(0xdb);
    let rows: Vec<Vec<i32>> = (0..400)
        .map(|i| {
            // Nine of every ten values land in [0, 10).
            let v = if rng.gen_ratio(9, 10) {
                rng.gen_range(0..10)
            } else {
                rng.gen_range(10..1000)
            };
            vec![i, v]
        })
        .collect();
    let table_id = create_int_table(&tdb, "t", &["id", "v"], &rows);

    let stats = TableStats::new(&tdb.db, table_id, 1).unwrap();
    let low = stats.estimate_selectivity(1, Op::LessThan, &Field::Int(10));
    let high = stats.estimate_selectivity(1, Op::GreaterThanOrEq, &Field::Int(500));
    assert!(low > 0.5, "low range should dominate, got {low}");
    assert!(high < 0.3, "high range should be sparse, got {high}");
}

#[test]
fn unknown_columns_estimate_everything() {
    let tdb = setup();
    let table_id = create_int_table(&tdb, "t", &["id"], &[vec![1]]);
    let stats = TableStats::new(&tdb.db, table_id, 1).unwrap();
    assert_eq!(stats.estimate_selectivity(9, Op::Equals, &Field::Int(1)), 1.0);
    assert_eq!(
        stats.estimate_selectivity(0, Op::Like, &Field::Str("x".to_string())),
        1.0
    );
    assert_eq!(stats.avg_selectivity(9, Op::Equals), 1.0);
}

#[test]
fn compute_all_covers_every_table() {
    let tdb = setup();
    create_int_table(&tdb, "alpha", &["a"], &[vec![1], vec![2]]);
    create_int_table(&tdb, "beta", &["b"], &[vec![3]]);

    let all = TableStats::compute_all(&tdb.db, 1).unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all["alpha"].total_tuples(), 2);
    assert_eq!(all["beta"].total_tuples(), 1);
}

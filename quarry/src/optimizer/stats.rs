//! Per-table statistics.

use crate::errors::ExecutionError;
use crate::executor::{OpIterator, SeqScan};
use crate::optimizer::histogram::{IntHistogram, StringHistogram};
use crate::predicate::Op;
use crate::Database;
use std::collections::HashMap;
use strata::transaction::TransactionId;
use strata::tuple::{Field, FieldType};

/// Bucket count for every per-column histogram.
pub const NUM_HIST_BINS: usize = 100;

/// The default cost charged per page of sequential IO.
pub const DEFAULT_IO_COST_PER_PAGE: usize = 1000;

/// Statistics over one table: tuple count, page count, and one histogram per
/// column. Built by scanning the table twice, first for per-column ranges and
/// then to populate the histograms.
pub struct TableStats {
    io_cost_per_page: usize,
    num_pages: u32,
    total_tuples: u64,
    int_histograms: HashMap<usize, IntHistogram>,
    string_histograms: HashMap<usize, StringHistogram>,
}

struct GatheredStats {
    total_tuples: u64,
    int_histograms: HashMap<usize, IntHistogram>,
    string_histograms: HashMap<usize, StringHistogram>,
}

impl TableStats {
    pub fn new(
        db: &Database,
        table_id: u32,
        io_cost_per_page: usize,
    ) -> Result<Self, ExecutionError> {
        let file = db
            .catalog()
            .file(table_id)
            .ok_or_else(|| ExecutionError::TableNotFound(format!("table id {table_id}")))?;
        let td = file.tuple_desc().clone();

        let tid = TransactionId::new();
        let outcome = Self::scan_table(db, tid, table_id, &td);
        // The statistics transaction only ever reads; completing it releases
        // its shared locks whether or not the scans succeeded.
        db.buffer_pool().transaction_complete(tid, true)?;
        let gathered = outcome?;

        Ok(Self {
            io_cost_per_page,
            num_pages: file.num_pages()?,
            total_tuples: gathered.total_tuples,
            int_histograms: gathered.int_histograms,
            string_histograms: gathered.string_histograms,
        })
    }

    fn scan_table(
        db: &Database,
        tid: TransactionId,
        table_id: u32,
        td: &strata::tuple::TupleDesc,
    ) -> Result<GatheredStats, ExecutionError> {
        // Pass one: per-column min/max and the tuple count.
        let mut mins: HashMap<usize, i32> = HashMap::new();
        let mut maxs: HashMap<usize, i32> = HashMap::new();
        let mut total_tuples = 0u64;

        let mut scan = SeqScan::new(db, tid, table_id, "stats")?;
        scan.open()?;
        while let Some(tuple) = scan.next()? {
            total_tuples += 1;
            for i in 0..td.num_fields() {
                if let Some(Field::Int(v)) = tuple.field(i) {
                    mins.entry(i).and_modify(|m| *m = (*m).min(*v)).or_insert(*v);
                    maxs.entry(i).and_modify(|m| *m = (*m).max(*v)).or_insert(*v);
                }
            }
        }

        let mut int_histograms: HashMap<usize, IntHistogram> = mins
            .iter()
            .map(|(&i, &min)| (i, IntHistogram::new(NUM_HIST_BINS, min, maxs[&i])))
            .collect();
        let mut string_histograms: HashMap<usize, StringHistogram> = (0..td.num_fields())
            .filter(|&i| td.field_type(i) == Some(FieldType::Str))
            .map(|i| (i, StringHistogram::new(NUM_HIST_BINS)))
            .collect();

        // Pass two: populate the histograms.
        scan.rewind()?;
        while let Some(tuple) = scan.next()? {
            for i in 0..td.num_fields() {
                match tuple.field(i) {
                    Some(Field::Int(v)) => {
                        if let Some(hist) = int_histograms.get_mut(&i) {
                            hist.add_value(*v);
                        }
                    }
                    Some(Field::Str(s)) => {
                        if let Some(hist) = string_histograms.get_mut(&i) {
                            hist.add_value(s);
                        }
                    }
                    None => {}
                }
            }
        }
        scan.close();

        Ok(GatheredStats {
            total_tuples,
            int_histograms,
            string_histograms,
        })
    }

    /// The cost of scanning the whole table: every page is read in full, so
    /// the estimate is page count times per-page IO cost.
    pub fn estimate_scan_cost(&self) -> f64 {
        self.num_pages as f64 * self.io_cost_per_page as f64
    }

    /// The expected row count of a scan filtered down to `selectivity`.
    pub fn estimate_table_cardinality(&self, selectivity: f64) -> u64 {
        (self.total_tuples as f64 * selectivity).round() as u64
    }

    /// Estimates the selectivity of `field op constant` from the column's
    /// histogram. Columns without a histogram estimate 1.0.
    pub fn estimate_selectivity(&self, field: usize, op: Op, constant: &Field) -> f64 {
        match constant {
            Field::Int(v) => self
                .int_histograms
                .get(&field)
                .map_or(1.0, |hist| hist.estimate_selectivity(op, *v)),
            Field::Str(s) => self
                .string_histograms
                .get(&field)
                .map_or(1.0, |hist| hist.estimate_selectivity(op, s)),
        }
    }

    /// The expected selectivity of `field op ?` with an unknown operand.
    pub fn avg_selectivity(&self, field: usize, _op: Op) -> f64 {
        if let Some(hist) = self.int_histograms.get(&field) {
            return hist.avg_selectivity();
        }
        if let Some(hist) = self.string_histograms.get(&field) {
            return hist.avg_selectivity();
        }
        1.0
    }

    pub fn total_tuples(&self) -> u64 {
        self.total_tuples
    }

    /// Builds statistics for every table in the catalog, keyed by table name.
    pub fn compute_all(
        db: &Database,
        io_cost_per_page: usize,
    ) -> Result<HashMap<String, TableStats>, ExecutionError> {
        let mut all = HashMap::new();
        for table_id in db.catalog().table_ids() {
            let name = db
                .catalog()
                .table_name(table_id)
                .unwrap_or_else(|| table_id.to_string());
            all.insert(name, TableStats::new(db, table_id, io_cost_per_page)?);
        }
        Ok(all)
    }
}

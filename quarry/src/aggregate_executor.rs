//! Grouped aggregation: the Aggregate operator and the per-kind aggregator
//! state machines it drives.

use crate::errors::ExecutionError;
use crate::executor::{not_open, OpIterator, TupleIterator};
use std::collections::HashMap;
use std::fmt;
use strata::tuple::{Field, FieldType, Tuple, TupleDesc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Min,
    Max,
    Sum,
    Avg,
    Count,
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregateOp::Min => "MIN",
            AggregateOp::Max => "MAX",
            AggregateOp::Sum => "SUM",
            AggregateOp::Avg => "AVG",
            AggregateOp::Count => "COUNT",
        };
        write!(f, "{name}")
    }
}

/// Folds a stream of tuples into one value per group.
pub trait Aggregator {
    /// Accounts for one input tuple in its group's running state.
    fn merge(&mut self, tuple: &Tuple) -> Result<(), ExecutionError>;

    /// The finished per-group results, shaped to `td`: `(group, value)` under
    /// grouping, `(value)` otherwise.
    fn results(&self, td: &TupleDesc) -> Vec<Tuple>;
}

/// Running state for one integer group. AVG keeps sum and count and divides
/// at emit time with truncation toward zero.
#[derive(Debug, Clone, Copy, Default)]
struct IntState {
    count: i64,
    sum: i64,
    min: Option<i32>,
    max: Option<i32>,
}

impl IntState {
    fn merge(&mut self, v: i32) {
        self.count += 1;
        self.sum += v as i64;
        self.min = Some(self.min.map_or(v, |m| m.min(v)));
        self.max = Some(self.max.map_or(v, |m| m.max(v)));
    }

    fn value(&self, op: AggregateOp) -> i32 {
        match op {
            AggregateOp::Count => self.count as i32,
            AggregateOp::Sum => self.sum as i32,
            AggregateOp::Min => self.min.unwrap_or(0),
            AggregateOp::Max => self.max.unwrap_or(0),
            AggregateOp::Avg => {
                if self.count == 0 {
                    0
                } else {
                    (self.sum / self.count) as i32
                }
            }
        }
    }
}

/// Computes MIN/MAX/SUM/AVG/COUNT over an integer field.
pub struct IntegerAggregator {
    group_by: Option<usize>,
    field: usize,
    op: AggregateOp,
    groups: HashMap<Option<Field>, IntState>,
}

impl IntegerAggregator {
    pub fn new(group_by: Option<usize>, field: usize, op: AggregateOp) -> Self {
        Self {
            group_by,
            field,
            op,
            groups: HashMap::new(),
        }
    }
}

impl Aggregator for IntegerAggregator {
    fn merge(&mut self, tuple: &Tuple) -> Result<(), ExecutionError> {
        let key = group_key(self.group_by, tuple)?;
        let value = match tuple.field(self.field) {
            Some(Field::Int(v)) => *v,
            other => {
                return Err(ExecutionError::SchemaMismatch(format!(
                    "integer aggregate over non-int field: {other:?}"
                )))
            }
        };
        self.groups.entry(key).or_default().merge(value);
        Ok(())
    }

    fn results(&self, td: &TupleDesc) -> Vec<Tuple> {
        if self.group_by.is_none() && self.groups.is_empty() {
            // An empty ungrouped input still yields one tuple: 0 for
            // COUNT/SUM, and 0 as the unspecified value of the empty
            // MIN/MAX/AVG.
            return vec![Tuple::new(td.clone(), vec![Field::Int(0)])];
        }
        emit_groups(td, self.groups.iter().map(|(k, s)| (k, s.value(self.op))))
    }
}

/// Counts tuples per group. COUNT is the only aggregate defined over
/// strings; constructing any other op fails immediately.
pub struct StringAggregator {
    group_by: Option<usize>,
    field: usize,
    counts: HashMap<Option<Field>, i64>,
}

impl StringAggregator {
    pub fn new(
        group_by: Option<usize>,
        field: usize,
        op: AggregateOp,
    ) -> Result<Self, ExecutionError> {
        if op != AggregateOp::Count {
            return Err(ExecutionError::Unsupported(format!(
                "string aggregator only supports COUNT, got {op}"
            )));
        }
        Ok(Self {
            group_by,
            field,
            counts: HashMap::new(),
        })
    }
}

impl Aggregator for StringAggregator {
    fn merge(&mut self, tuple: &Tuple) -> Result<(), ExecutionError> {
        let key = group_key(self.group_by, tuple)?;
        match tuple.field(self.field) {
            Some(Field::Str(_)) => {}
            other => {
                return Err(ExecutionError::SchemaMismatch(format!(
                    "string aggregate over non-string field: {other:?}"
                )))
            }
        }
        *self.counts.entry(key).or_insert(0) += 1;
        Ok(())
    }

    fn results(&self, td: &TupleDesc) -> Vec<Tuple> {
        if self.group_by.is_none() && self.counts.is_empty() {
            return vec![Tuple::new(td.clone(), vec![Field::Int(0)])];
        }
        emit_groups(td, self.counts.iter().map(|(k, c)| (k, *c as i32)))
    }
}

fn group_key(group_by: Option<usize>, tuple: &Tuple) -> Result<Option<Field>, ExecutionError> {
    match group_by {
        None => Ok(None),
        Some(g) => tuple
            .field(g)
            .cloned()
            .map(Some)
            .ok_or_else(|| ExecutionError::FieldNotFound(format!("group field {g} out of range"))),
    }
}

fn emit_groups<'a>(
    td: &TupleDesc,
    groups: impl Iterator<Item = (&'a Option<Field>, i32)>,
) -> Vec<Tuple> {
    groups
        .map(|(key, value)| {
            let fields = match key {
                Some(group) => vec![group.clone(), Field::Int(value)],
                None => vec![Field::Int(value)],
            };
            Tuple::new(td.clone(), fields)
        })
        .collect()
}

/// The aggregation operator: drains its child on open, feeds every tuple to
/// an aggregator picked by the aggregate field's kind, and then serves the
/// materialized per-group results.
pub struct Aggregate {
    child: Box<dyn OpIterator>,
    afield: usize,
    gfield: Option<usize>,
    op: AggregateOp,
    td: TupleDesc,
    results: Option<TupleIterator>,
}

impl Aggregate {
    /// Builds the operator and its output schema. The aggregate column is
    /// named after the aggregate field (`"COUNT (a)"`), whether grouped or
    /// not.
    pub fn new(
        child: Box<dyn OpIterator>,
        afield: usize,
        gfield: Option<usize>,
        op: AggregateOp,
    ) -> Result<Self, ExecutionError> {
        let child_td = child.tuple_desc();
        let a_type = child_td
            .field_type(afield)
            .ok_or_else(|| ExecutionError::FieldNotFound(format!("aggregate field {afield}")))?;
        if a_type == FieldType::Str && op != AggregateOp::Count {
            return Err(ExecutionError::Unsupported(format!(
                "cannot compute {op} over a string field"
            )));
        }

        let a_name = match child_td.field_name(afield) {
            Some(name) => format!("{op} ({name})"),
            None => op.to_string(),
        };

        let td = match gfield {
            None => TupleDesc::new(vec![FieldType::Int], vec![Some(a_name)]),
            Some(g) => {
                let g_type = child_td
                    .field_type(g)
                    .ok_or_else(|| ExecutionError::FieldNotFound(format!("group field {g}")))?;
                let g_name = child_td.field_name(g).map(|n| n.to_string());
                TupleDesc::new(vec![g_type, FieldType::Int], vec![g_name, Some(a_name)])
            }
        };

        Ok(Self {
            child,
            afield,
            gfield,
            op,
            td,
            results: None,
        })
    }

    pub fn group_field(&self) -> Option<usize> {
        self.gfield
    }

    pub fn aggregate_field(&self) -> usize {
        self.afield
    }

    pub fn aggregate_op(&self) -> AggregateOp {
        self.op
    }
}

impl OpIterator for Aggregate {
    fn open(&mut self) -> Result<(), ExecutionError> {
        self.child.open()?;

        let a_type = self
            .child
            .tuple_desc()
            .field_type(self.afield)
            .ok_or_else(|| ExecutionError::FieldNotFound(format!("aggregate field {}", self.afield)))?;
        let mut aggregator: Box<dyn Aggregator> = match a_type {
            FieldType::Int => Box::new(IntegerAggregator::new(self.gfield, self.afield, self.op)),
            FieldType::Str => Box::new(StringAggregator::new(self.gfield, self.afield, self.op)?),
        };

        loop {
            let tuple = match self.child.next() {
                Ok(Some(tuple)) => tuple,
                Ok(None) => break,
                Err(e) => {
                    self.child.close();
                    return Err(e);
                }
            };
            if let Err(e) = aggregator.merge(&tuple) {
                self.child.close();
                return Err(e);
            }
        }

        let mut results = TupleIterator::new(self.td.clone(), aggregator.results(&self.td));
        results.open()?;
        self.results = Some(results);
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool, ExecutionError> {
        match &mut self.results {
            Some(results) => results.has_next(),
            None => Err(not_open()),
        }
    }

    fn next(&mut self) -> Result<Option<Tuple>, ExecutionError> {
        match &mut self.results {
            Some(results) => results.next(),
            None => Err(not_open()),
        }
    }

    fn rewind(&mut self) -> Result<(), ExecutionError> {
        match &mut self.results {
            Some(results) => results.rewind(),
            None => Err(not_open()),
        }
    }

    fn close(&mut self) {
        self.child.close();
        self.results = None;
    }

    fn tuple_desc(&self) -> &TupleDesc {
        &self.td
    }

    fn children(&self) -> Vec<&dyn OpIterator> {
        vec![self.child.as_ref()]
    }
}

//! Comparison operators and the predicates built from them.

use std::fmt;
use strata::tuple::{Field, Tuple};

/// A comparison between two fields of the same kind. Comparing fields of
/// different kinds never matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEq,
    GreaterThan,
    GreaterThanOrEq,
    Like,
}

impl Op {
    /// Evaluates `lhs op rhs`. `Like` is substring containment on strings
    /// and plain equality on ints.
    pub fn apply(&self, lhs: &Field, rhs: &Field) -> bool {
        match (lhs, rhs) {
            (Field::Int(a), Field::Int(b)) => match self {
                Op::Equals | Op::Like => a == b,
                Op::NotEquals => a != b,
                Op::LessThan => a < b,
                Op::LessThanOrEq => a <= b,
                Op::GreaterThan => a > b,
                Op::GreaterThanOrEq => a >= b,
            },
            (Field::Str(a), Field::Str(b)) => match self {
                Op::Equals => a == b,
                Op::NotEquals => a != b,
                Op::LessThan => a < b,
                Op::LessThanOrEq => a <= b,
                Op::GreaterThan => a > b,
                Op::GreaterThanOrEq => a >= b,
                Op::Like => a.contains(b.as_str()),
            },
            _ => false,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Op::Equals => "=",
            Op::NotEquals => "<>",
            Op::LessThan => "<",
            Op::LessThanOrEq => "<=",
            Op::GreaterThan => ">",
            Op::GreaterThanOrEq => ">=",
            Op::Like => "LIKE",
        };
        write!(f, "{symbol}")
    }
}

/// Compares one field of a tuple against a constant.
#[derive(Debug, Clone)]
pub struct Predicate {
    field: usize,
    op: Op,
    operand: Field,
}

impl Predicate {
    pub fn new(field: usize, op: Op, operand: Field) -> Self {
        Self { field, op, operand }
    }

    pub fn field(&self) -> usize {
        self.field
    }

    pub fn op(&self) -> Op {
        self.op
    }

    pub fn operand(&self) -> &Field {
        &self.operand
    }

    /// True when the tuple's field satisfies the comparison. A tuple without
    /// the field does not match.
    pub fn matches(&self, tuple: &Tuple) -> bool {
        tuple
            .field(self.field)
            .is_some_and(|value| self.op.apply(value, &self.operand))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{} {} {}", self.field, self.op, self.operand)
    }
}

/// Compares a field of a left tuple against a field of a right tuple.
#[derive(Debug, Clone, Copy)]
pub struct JoinPredicate {
    left_field: usize,
    op: Op,
    right_field: usize,
}

impl JoinPredicate {
    pub fn new(left_field: usize, op: Op, right_field: usize) -> Self {
        Self {
            left_field,
            op,
            right_field,
        }
    }

    pub fn left_field(&self) -> usize {
        self.left_field
    }

    pub fn op(&self) -> Op {
        self.op
    }

    pub fn right_field(&self) -> usize {
        self.right_field
    }

    pub fn matches(&self, left: &Tuple, right: &Tuple) -> bool {
        match (left.field(self.left_field), right.field(self.right_field)) {
            (Some(l), Some(r)) => self.op.apply(l, r),
            _ => false,
        }
    }
}

//! Equi-width histograms over single fields.

use crate::predicate::Op;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// A fixed-width histogram over a closed integer range `[min, max]`.
///
/// Space and update time are constant in the number of values seen: only the
/// per-bucket counts are kept, never the values.
#[derive(Debug, Clone)]
pub struct IntHistogram {
    min: i32,
    max: i32,
    width: i64,
    counts: Vec<u64>,
    total: u64,
}

impl IntHistogram {
    /// Creates a histogram with up to `buckets` buckets over `[min, max]`.
    /// The bucket count never exceeds the number of distinct values in the
    /// range, and every bucket spans the same `ceil(range / buckets)` width,
    /// with the last bucket clipped to `max`.
    pub fn new(buckets: usize, min: i32, max: i32) -> Self {
        assert!(min <= max, "histogram range is empty");
        assert!(buckets > 0, "histogram needs at least one bucket");
        let span = max as i64 - min as i64 + 1;
        let buckets = (buckets as i64).min(span) as usize;
        let width = (span + buckets as i64 - 1) / buckets as i64;
        Self {
            min,
            max,
            width,
            counts: vec![0; buckets],
            total: 0,
        }
    }

    /// Records one value. Values outside `[min, max]` are ignored.
    pub fn add_value(&mut self, v: i32) {
        if v < self.min || v > self.max {
            return;
        }
        let bucket = self.bucket_of(v);
        self.counts[bucket] += 1;
        self.total += 1;
    }

    fn bucket_of(&self, v: i32) -> usize {
        let raw = (v as i64 - self.min as i64) / self.width;
        (raw.max(0) as usize).min(self.counts.len() - 1)
    }

    /// The left edge of a bucket.
    fn bucket_left(&self, bucket: usize) -> i64 {
        self.min as i64 + bucket as i64 * self.width
    }

    /// The right edge of a bucket, clipped to `max` for the last one.
    fn bucket_right(&self, bucket: usize) -> i64 {
        ((self.min as i64 + (bucket as i64 + 1) * self.width) - 1).min(self.max as i64)
    }

    /// Estimates the fraction of recorded values `x` with `x op v`.
    /// Always in `[0, 1]`; an empty histogram estimates 0.
    pub fn estimate_selectivity(&self, op: Op, v: i32) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        if v < self.min {
            return match op {
                Op::GreaterThan | Op::GreaterThanOrEq | Op::NotEquals => 1.0,
                Op::LessThan | Op::LessThanOrEq | Op::Equals | Op::Like => 0.0,
            };
        }
        if v > self.max {
            return match op {
                Op::LessThan | Op::LessThanOrEq | Op::NotEquals => 1.0,
                Op::GreaterThan | Op::GreaterThanOrEq | Op::Equals | Op::Like => 0.0,
            };
        }

        let bucket = self.bucket_of(v);
        let total = self.total as f64;
        let width = self.width as f64;
        let selectivity = match op {
            Op::Equals | Op::Like => self.counts[bucket] as f64 / width / total,
            Op::NotEquals => 1.0 - self.estimate_selectivity(Op::Equals, v),
            Op::GreaterThan => {
                let right = self.bucket_right(bucket);
                let fraction = (right - v as i64) as f64 / width;
                let mut hits = fraction * self.counts[bucket] as f64;
                for count in &self.counts[bucket + 1..] {
                    hits += *count as f64;
                }
                hits / total
            }
            Op::LessThan => {
                let left = self.bucket_left(bucket);
                let fraction = (v as i64 - left) as f64 / width;
                let mut hits = fraction * self.counts[bucket] as f64;
                for count in &self.counts[..bucket] {
                    hits += *count as f64;
                }
                hits / total
            }
            Op::GreaterThanOrEq => self.estimate_selectivity(Op::GreaterThan, v.saturating_sub(1)),
            Op::LessThanOrEq => self.estimate_selectivity(Op::LessThan, v.saturating_add(1)),
        };
        selectivity.clamp(0.0, 1.0)
    }

    /// The mean per-bucket selectivity of an equality probe.
    pub fn avg_selectivity(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let total = self.total as f64;
        let width = self.width as f64;
        let sum: f64 = self
            .counts
            .iter()
            .map(|count| (*count as f64 / width) / total)
            .sum();
        sum / self.counts.len() as f64
    }

    pub fn total_values(&self) -> u64 {
        self.total
    }
}

/// A histogram over strings: every string hashes to a stable non-negative
/// 32-bit integer and lands in an [`IntHistogram`] over that range. Equality
/// estimates stay meaningful; range estimates are as good as the hash order,
/// which is to say barely.
#[derive(Debug, Clone)]
pub struct StringHistogram {
    hist: IntHistogram,
}

impl StringHistogram {
    pub fn new(buckets: usize) -> Self {
        Self {
            hist: IntHistogram::new(buckets, 0, i32::MAX),
        }
    }

    fn hash_to_int(s: &str) -> i32 {
        let mut hasher = DefaultHasher::new();
        s.hash(&mut hasher);
        (hasher.finish() % (i32::MAX as u64 + 1)) as i32
    }

    pub fn add_value(&mut self, s: &str) {
        self.hist.add_value(Self::hash_to_int(s));
    }

    pub fn estimate_selectivity(&self, op: Op, s: &str) -> f64 {
        self.hist.estimate_selectivity(op, Self::hash_to_int(s))
    }

    pub fn avg_selectivity(&self) -> f64 {
        self.hist.avg_selectivity()
    }
}

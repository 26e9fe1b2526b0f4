// Group-by engine for normalized sales rows.
//
// Rows are typed structs, so keys and measures are plain accessor functions rather
// than column labels. Gross is never aggregated: it is derived from the summed net.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Gross/net conversion ratio. External business constant.
pub const GROSS_MULTIPLIER: f64 = 1.4285;

/// Gross figure for an already-aggregated net amount.
pub fn gross_of(net: f64) -> f64 {
    net * GROSS_MULTIPLIER
}

/// Top-level scalar pair shown above the tables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub gross: f64,
    pub net: f64,
}

impl Totals {
    pub fn from_net(net: f64) -> Self {
        Totals {
            gross: gross_of(net),
            net,
        }
    }

    pub fn of<R>(rows: &[R], net: fn(&R) -> f64) -> Self {
        Totals::from_net(rows.iter().map(net).sum())
    }
}

/// How one measure folds the rows of a group.
pub enum Reduction<R> {
    /// Add up a numeric field.
    Sum(fn(&R) -> f64),
    /// Count the rows.
    Count,
}

impl<R> Reduction<R> {
    fn step(&self, row: &R) -> f64 {
        match self {
            Reduction::Sum(value) => value(row),
            Reduction::Count => 1.0,
        }
    }
}

/// Group-by specification: key columns plus reductions.
pub struct Aggregation<R> {
    keys: Vec<fn(&R) -> String>,
    measures: Vec<Reduction<R>>,
}

impl<R> Default for Aggregation<R> {
    fn default() -> Self {
        Aggregation {
            keys: Vec::new(),
            measures: Vec::new(),
        }
    }
}

impl<R> Aggregation<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern: add a grouping key
    pub fn key(mut self, value: fn(&R) -> String) -> Self {
        self.keys.push(value);
        self
    }

    /// Builder pattern: add a summed column
    pub fn sum(mut self, value: fn(&R) -> f64) -> Self {
        self.measures.push(Reduction::Sum(value));
        self
    }

    /// Builder pattern: add a row count
    pub fn count(mut self) -> Self {
        self.measures.push(Reduction::Count);
        self
    }

    /// Run the aggregation. Groups keep the order in which their key first appeared;
    /// values follow the order the measures were added in.
    pub fn apply(&self, rows: &[R]) -> Grouped {
        let mut index: HashMap<Vec<String>, usize> = HashMap::new();
        let mut groups: Vec<Group> = Vec::new();

        for row in rows {
            let key: Vec<String> = self.keys.iter().map(|k| k(row)).collect();
            let slot = match index.get(&key) {
                Some(&slot) => slot,
                None => {
                    groups.push(Group {
                        keys: key.clone(),
                        values: vec![0.0; self.measures.len()],
                    });
                    index.insert(key, groups.len() - 1);
                    groups.len() - 1
                }
            };

            let group = &mut groups[slot];
            for (acc, measure) in group.values.iter_mut().zip(&self.measures) {
                *acc += measure.step(row);
            }
        }

        Grouped { groups }
    }
}

/// One distinct key combination and its reduced values.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub keys: Vec<String>,
    pub values: Vec<f64>,
}

/// Result of [`Aggregation::apply`].
#[derive(Debug, Clone)]
pub struct Grouped {
    pub groups: Vec<Group>,
}

impl Grouped {
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl Group {
    pub fn key(&self, idx: usize) -> &str {
        self.keys.get(idx).map(String::as_str).unwrap_or_default()
    }

    pub fn sum(&self, measure: usize) -> f64 {
        self.values.get(measure).copied().unwrap_or_default()
    }

    /// Count reductions accumulate as floats; expose them as whole numbers.
    pub fn count(&self, measure: usize) -> u64 {
        self.sum(measure).round().max(0.0) as u64
    }

    /// Integral total of a summed quantity column.
    pub fn quantity(&self, measure: usize) -> i64 {
        self.sum(measure).round() as i64
    }
}

/// Sort descending by a float field; NaN never appears because inputs are coerced.
pub fn sort_desc_by<T>(rows: &mut [T], field: impl Fn(&T) -> f64) {
    rows.sort_by(|a, b| field(b).total_cmp(&field(a)));
}

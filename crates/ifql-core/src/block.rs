//! The block: a bounded, columnar chunk of tagged rows.
//!
//! Invariants: exactly one time column, time values monotonically
//! non-decreasing, and common tag columns uniform across every row.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::time::{Bounds, Time};
use crate::values::{DataType, Value};

pub const TIME_COL_LABEL: &str = "_time";
pub const VALUE_COL_LABEL: &str = "_value";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColKind {
    Time,
    Tag,
    Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColMeta {
    pub label: String,
    pub data_type: DataType,
    pub kind: ColKind,
    #[serde(default)]
    pub common: bool,
}

impl ColMeta {
    pub fn time() -> ColMeta {
        ColMeta {
            label: TIME_COL_LABEL.into(),
            data_type: DataType::Time,
            kind: ColKind::Time,
            common: false,
        }
    }

    pub fn value(label: impl Into<String>, data_type: DataType) -> ColMeta {
        ColMeta {
            label: label.into(),
            data_type,
            kind: ColKind::Value,
            common: false,
        }
    }

    pub fn tag(label: impl Into<String>, common: bool) -> ColMeta {
        ColMeta {
            label: label.into(),
            data_type: DataType::String,
            kind: ColKind::Tag,
            common,
        }
    }
}

/// Column-major table of rows sharing a time bound and common tag values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub bounds: Bounds,
    pub cols: Vec<ColMeta>,
    /// One vector per column, all the same length.
    pub data: Vec<Vec<Value>>,
}

impl Block {
    pub fn new(bounds: Bounds, cols: Vec<ColMeta>) -> Block {
        let data = cols.iter().map(|_| Vec::new()).collect();
        Block { bounds, cols, data }
    }

    pub fn num_rows(&self) -> usize {
        self.data.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn num_cols(&self) -> usize {
        self.cols.len()
    }

    pub fn col_index(&self, label: &str) -> Option<usize> {
        self.cols.iter().position(|c| c.label == label)
    }

    pub fn time_col_index(&self) -> Option<usize> {
        self.cols.iter().position(|c| c.kind == ColKind::Time)
    }

    /// The first value column, or the one with the given label.
    pub fn value_col_index(&self, label: Option<&str>) -> Option<usize> {
        match label {
            Some(l) => self
                .cols
                .iter()
                .position(|c| c.kind == ColKind::Value && c.label == l),
            None => self.cols.iter().position(|c| c.kind == ColKind::Value),
        }
    }

    pub fn row_time(&self, row: usize) -> Option<Time> {
        let idx = self.time_col_index()?;
        self.data[idx].get(row).and_then(|v| v.as_time())
    }

    pub fn row_values(&self, row: usize) -> Vec<Value> {
        self.data.iter().map(|col| col[row].clone()).collect()
    }

    pub fn push_row(&mut self, row: Vec<Value>) {
        debug_assert_eq!(row.len(), self.cols.len());
        for (col, v) in self.data.iter_mut().zip(row) {
            col.push(v);
        }
    }

    /// `(label, value)` pairs of the common tag columns, taken from the
    /// first row. Empty blocks have no tags.
    pub fn common_tags(&self) -> Vec<(String, String)> {
        if self.num_rows() == 0 {
            return Vec::new();
        }
        self.cols
            .iter()
            .enumerate()
            .filter(|(_, c)| c.kind == ColKind::Tag && c.common)
            .filter_map(|(i, c)| {
                self.data[i][0]
                    .as_str()
                    .map(|v| (c.label.clone(), v.to_string()))
            })
            .collect()
    }

    /// Checks the block invariants.
    pub fn validate(&self) -> Result<()> {
        let time_cols = self
            .cols
            .iter()
            .filter(|c| c.kind == ColKind::Time)
            .count();
        if time_cols != 1 {
            return Err(Error::Type(format!(
                "block must have exactly one time column, found {time_cols}"
            )));
        }
        let n = self.num_rows();
        for col in &self.data {
            if col.len() != n {
                return Err(Error::Type("ragged block columns".into()));
            }
        }
        if let Some(idx) = self.time_col_index() {
            let mut prev = Time::MIN;
            for v in &self.data[idx] {
                let t = v
                    .as_time()
                    .ok_or_else(|| Error::Type("non-time value in time column".into()))?;
                if t < prev {
                    return Err(Error::Type(
                        "time column must be monotonically non-decreasing".into(),
                    ));
                }
                prev = t;
            }
        }
        for (i, c) in self.cols.iter().enumerate() {
            if c.kind == ColKind::Tag && c.common && n > 1 {
                let first = &self.data[i][0];
                if self.data[i].iter().any(|v| v != first) {
                    return Err(Error::Type(format!(
                        "common tag column {:?} is not uniform",
                        c.label
                    )));
                }
            }
        }
        Ok(())
    }

    /// Deterministic ordering key for result presentation.
    pub fn sort_key(&self) -> (Time, Time, Vec<(String, String)>) {
        (self.bounds.start, self.bounds.stop, self.common_tags())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Block {
        let mut b = Block::new(
            Bounds::new(Time(0), Time(10)),
            vec![
                ColMeta::time(),
                ColMeta::value(VALUE_COL_LABEL, DataType::Float),
                ColMeta::tag("host", true),
            ],
        );
        b.push_row(vec![
            Value::Time(Time(1)),
            Value::Float(1.0),
            Value::Str("a".into()),
        ]);
        b.push_row(vec![
            Value::Time(Time(2)),
            Value::Float(2.0),
            Value::Str("a".into()),
        ]);
        b
    }

    #[test]
    fn valid_block_passes() {
        sample().validate().unwrap();
    }

    #[test]
    fn non_monotonic_time_fails() {
        let mut b = sample();
        b.data[0] = vec![Value::Time(Time(5)), Value::Time(Time(1))];
        assert!(b.validate().is_err());
    }

    #[test]
    fn non_uniform_common_tag_fails() {
        let mut b = sample();
        b.data[2] = vec![Value::Str("a".into()), Value::Str("b".into())];
        assert!(b.validate().is_err());
    }

    #[test]
    fn common_tags_read_from_first_row() {
        assert_eq!(sample().common_tags(), vec![("host".into(), "a".into())]);
    }
}

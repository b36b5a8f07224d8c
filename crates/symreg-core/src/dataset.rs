//! The tabular dataset the interpreter evaluates trees against (§3, §6).
//!
//! Ingestion (CSV parsing, column typing) is an external collaborator; this
//! module only models the immutable in-memory matrix the core consumes:
//! named, hashed columns and half-open row ranges.

use symreg_error::{SymregError, SymregResult};

/// A half-open `[start, end)` row interval into a [`Dataset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRange {
    pub start: usize,
    pub end: usize,
}

impl DataRange {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        DataRange { start, end }
    }

    pub fn full(rows: usize) -> Self {
        DataRange { start: 0, end: rows }
    }

    pub fn size(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn iter(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

impl From<std::ops::Range<usize>> for DataRange {
    fn from(r: std::ops::Range<usize>) -> Self {
        DataRange::new(r.start, r.end)
    }
}

/// A stable FNV-1a hash of a variable's name; used to bind `Node::variable`
/// leaves to dataset columns independently of column order.
pub fn variable_hash(name: &str) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    name.bytes().fold(OFFSET, |h, b| (h ^ b as u64).wrapping_mul(PRIME))
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub hash: u64,
    pub column: usize,
}

/// An immutable `rows x cols` matrix of `f64` values stored column-major, plus
/// the named variables bound to a subset (or all) of its columns.
#[derive(Debug, Clone)]
pub struct Dataset {
    columns: Vec<Vec<f64>>,
    rows: usize,
    variables: Vec<Variable>,
}

impl Dataset {
    /// Builds a dataset from named columns, each of length `rows`.
    pub fn new(named_columns: Vec<(String, Vec<f64>)>) -> SymregResult<Self> {
        if named_columns.is_empty() {
            return Err(SymregError::invalid_argument("dataset needs at least one column"));
        }

        let rows = named_columns[0].1.len();
        let mut columns = Vec::with_capacity(named_columns.len());
        let mut variables = Vec::with_capacity(named_columns.len());

        for (index, (name, values)) in named_columns.into_iter().enumerate() {
            if values.len() != rows {
                return Err(SymregError::invalid_argument(format!(
                    "column '{name}' has {} rows, expected {rows}",
                    values.len()
                )));
            }
            variables.push(Variable {
                hash: variable_hash(&name),
                name,
                column: index,
            });
            columns.push(values);
        }

        Ok(Dataset {
            columns,
            rows,
            variables,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn values(&self, column: usize) -> &[f64] {
        &self.columns[column]
    }

    pub fn get_variable(&self, name_or_hash: u64) -> Option<&Variable> {
        self.variables.iter().find(|v| v.hash == name_or_hash)
    }

    pub fn get_variable_by_name(&self, name: &str) -> Option<&Variable> {
        self.get_variable(variable_hash(name))
    }

    /// A half-open slice of `len` rows starting at `start`.
    pub fn subspan(&self, start: usize, len: usize) -> SymregResult<DataRange> {
        if start + len > self.rows {
            return Err(SymregError::invalid_argument(format!(
                "subspan [{start}, {}) exceeds {} rows",
                start + len,
                self.rows
            )));
        }
        Ok(DataRange::new(start, start + len))
    }

    pub fn full_range(&self) -> DataRange {
        DataRange::full(self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::new(vec![
            ("x".to_string(), vec![1.0, 2.0, 3.0]),
            ("y".to_string(), vec![2.0, 4.0, 6.0]),
        ])
        .unwrap()
    }

    #[test]
    fn looks_up_variable_by_hash_or_name() {
        let ds = sample();
        let by_name = ds.get_variable_by_name("x").unwrap();
        let by_hash = ds.get_variable(variable_hash("x")).unwrap();
        assert_eq!(by_name.column, by_hash.column);
        assert_eq!(by_name.column, 0);
    }

    #[test]
    fn rejects_mismatched_column_lengths() {
        let err = Dataset::new(vec![
            ("x".to_string(), vec![1.0, 2.0]),
            ("y".to_string(), vec![1.0, 2.0, 3.0]),
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn subspan_is_half_open_and_bounds_checked() {
        let ds = sample();
        let span = ds.subspan(1, 2).unwrap();
        assert_eq!(span.iter().collect::<Vec<_>>(), vec![1, 2]);
        assert!(ds.subspan(2, 5).is_err());
    }
}

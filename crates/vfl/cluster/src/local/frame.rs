//! Vertically partitioned tables
//!
//! A [`Frame`] is a set of row-aligned partitions, one per party. Column
//! names are unique across the whole frame.

use std::cmp::Ordering;
use std::fmt;
use vfl_types::{PartyName, UnitError, UnitResult};

/// One cell
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Missing,
}

impl Value {
    /// Parse a raw CSV cell: numbers when possible, empty as missing
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Value::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => Value::Number(n),
            _ => Value::Text(trimmed.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Total order used for categories and ties: numbers ascending, then
    /// text lexicographically, then missing
    pub fn canonical_cmp(&self, other: &Value) -> Ordering {
        fn rank(v: &Value) -> u8 {
            match v {
                Value::Number(_) => 0,
                Value::Text(_) => 1,
                Value::Missing => 2,
            }
        }
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => f.write_str(s),
            Value::Missing => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// All cells as numbers; missing or text cells are errors
    pub fn numbers(&self) -> UnitResult<Vec<f64>> {
        self.values
            .iter()
            .enumerate()
            .map(|(row, v)| match v {
                Value::Number(n) => Ok(*n),
                Value::Missing => Err(UnitError::MissingValue {
                    column: self.name.clone(),
                    row,
                }),
                Value::Text(s) => Err(UnitError::NonNumeric {
                    column: self.name.clone(),
                    value: s.clone(),
                }),
            })
            .collect()
    }
}

/// The columns one party holds
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub party: PartyName,
    pub columns: Vec<Column>,
}

impl Partition {
    pub fn new(party: PartyName) -> Self {
        Self {
            party,
            columns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    rows: usize,
    partitions: Vec<Partition>,
}

impl Frame {
    pub fn new(rows: usize, partitions: Vec<Partition>) -> UnitResult<Self> {
        let mut seen = std::collections::HashSet::new();
        for partition in &partitions {
            for column in &partition.columns {
                if column.values.len() != rows {
                    return Err(UnitError::Invalid(format!(
                        "column '{}' has {} rows, expected {}",
                        column.name,
                        column.values.len(),
                        rows
                    )));
                }
                if !seen.insert(column.name.as_str()) {
                    return Err(UnitError::Invalid(format!(
                        "duplicate column '{}'",
                        column.name
                    )));
                }
            }
        }
        Ok(Self { rows, partitions })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.partitions
            .iter()
            .flat_map(|p| p.columns.iter().map(|c| c.name.as_str()))
    }

    pub fn column_count(&self) -> usize {
        self.partitions.iter().map(|p| p.columns.len()).sum()
    }

    fn locate(&self, name: &str) -> UnitResult<(usize, usize)> {
        for (pi, partition) in self.partitions.iter().enumerate() {
            if let Some(ci) = partition.columns.iter().position(|c| c.name == name) {
                return Ok((pi, ci));
            }
        }
        Err(UnitError::ColumnNotFound(name.to_string()))
    }

    pub fn column(&self, name: &str) -> UnitResult<&Column> {
        let (pi, ci) = self.locate(name)?;
        Ok(&self.partitions[pi].columns[ci])
    }

    pub fn column_mut(&mut self, name: &str) -> UnitResult<&mut Column> {
        let (pi, ci) = self.locate(name)?;
        Ok(&mut self.partitions[pi].columns[ci])
    }

    /// Replace one column with several, appended to the owning partition
    pub fn expand_column(&mut self, name: &str, replacement: Vec<Column>) -> UnitResult<()> {
        let (pi, ci) = self.locate(name)?;
        for column in &replacement {
            if column.values.len() != self.rows {
                return Err(UnitError::Invalid(format!(
                    "column '{}' has {} rows, expected {}",
                    column.name,
                    column.values.len(),
                    self.rows
                )));
            }
            if column.name != name && self.locate(&column.name).is_ok() {
                return Err(UnitError::Invalid(format!(
                    "duplicate column '{}'",
                    column.name
                )));
            }
        }
        let partition = &mut self.partitions[pi];
        partition.columns.remove(ci);
        partition.columns.extend(replacement);
        Ok(())
    }

    /// Keep only the named columns; partitions left empty are dropped
    pub fn select(&self, names: &[String]) -> UnitResult<Frame> {
        for name in names {
            self.locate(name)?;
        }
        let partitions = self
            .partitions
            .iter()
            .map(|p| Partition {
                party: p.party.clone(),
                columns: p
                    .columns
                    .iter()
                    .filter(|c| names.contains(&c.name))
                    .cloned()
                    .collect(),
            })
            .filter(|p| !p.columns.is_empty())
            .collect();
        Ok(Frame {
            rows: self.rows,
            partitions,
        })
    }

    /// Remove the named columns; every name must exist
    pub fn drop_columns(&self, names: &[String]) -> UnitResult<Frame> {
        for name in names {
            self.locate(name)?;
        }
        let partitions = self
            .partitions
            .iter()
            .map(|p| Partition {
                party: p.party.clone(),
                columns: p
                    .columns
                    .iter()
                    .filter(|c| !names.contains(&c.name))
                    .cloned()
                    .collect(),
            })
            .filter(|p| !p.columns.is_empty())
            .collect();
        Ok(Frame {
            rows: self.rows,
            partitions,
        })
    }

    /// New frame with rows taken in the given order
    pub fn take_rows(&self, indices: &[usize]) -> Frame {
        let partitions = self
            .partitions
            .iter()
            .map(|p| Partition {
                party: p.party.clone(),
                columns: p
                    .columns
                    .iter()
                    .map(|c| Column {
                        name: c.name.clone(),
                        values: indices.iter().map(|&i| c.values[i].clone()).collect(),
                    })
                    .collect(),
            })
            .collect();
        Frame {
            rows: indices.len(),
            partitions,
        }
    }
}

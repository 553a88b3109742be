//! Column transforms applied inside the local secure unit
//!
//! Every transform returns a new frame and leaves its input untouched.

use super::frame::{Column, Frame, Value};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::cmp::Ordering;
use vfl_types::{BinaryMapping, UnitError, UnitResult};

/// Sorted distinct values of a column; missing cells are an error
fn categories(column: &Column) -> UnitResult<Vec<Value>> {
    let mut cats: Vec<Value> = Vec::new();
    for (row, v) in column.values.iter().enumerate() {
        if v.is_missing() {
            return Err(UnitError::MissingValue {
                column: column.name.clone(),
                row,
            });
        }
        cats.push(v.clone());
    }
    cats.sort_by(|a, b| a.canonical_cmp(b));
    cats.dedup_by(|a, b| a.canonical_cmp(b) == Ordering::Equal);
    Ok(cats)
}

fn category_index(cats: &[Value], v: &Value) -> Option<usize> {
    cats.binary_search_by(|c| c.canonical_cmp(v)).ok()
}

/// Replace sentinel and missing cells with the most frequent other value.
///
/// Ties go to the smallest value in canonical order.
pub fn fill_with_mode(frame: &Frame, column: &str, sentinel: &str) -> UnitResult<Frame> {
    let is_gap = |v: &Value| match v {
        Value::Missing => true,
        Value::Text(s) => s == sentinel,
        Value::Number(_) => false,
    };

    let col = frame.column(column)?;
    let mut observed: Vec<&Value> = col.values.iter().filter(|v| !is_gap(*v)).collect();
    if observed.is_empty() {
        return Err(UnitError::AllSentinel {
            column: column.to_string(),
            sentinel: sentinel.to_string(),
        });
    }
    observed.sort_by(|a, b| a.canonical_cmp(b));

    // Runs over the sorted values; strict `>` keeps the first (smallest) on ties
    let mut mode = observed[0];
    let mut best = 0usize;
    let mut start = 0usize;
    for i in 1..=observed.len() {
        let run_ends =
            i == observed.len() || observed[i].canonical_cmp(observed[start]) != Ordering::Equal;
        if run_ends {
            if i - start > best {
                best = i - start;
                mode = observed[start];
            }
            start = i;
        }
    }
    let mode = mode.clone();

    let mut out = frame.clone();
    for v in out.column_mut(column)?.values.iter_mut() {
        if is_gap(&*v) {
            *v = mode.clone();
        }
    }
    Ok(out)
}

/// Map the two configured labels to 0 and 1
pub fn map_binary(frame: &Frame, column: &str, mapping: &BinaryMapping) -> UnitResult<Frame> {
    let mut out = frame.clone();
    let col = out.column_mut(column)?;
    let name = col.name.clone();
    for (row, v) in col.values.iter_mut().enumerate() {
        let mapped = match v {
            Value::Text(s) if *s == mapping.negative => 0.0,
            Value::Text(s) if *s == mapping.positive => 1.0,
            Value::Number(n) if *n == 0.0 || *n == 1.0 => *n,
            Value::Missing => {
                return Err(UnitError::MissingValue { column: name, row });
            }
            other => {
                return Err(UnitError::UnmappedValue {
                    column: name,
                    value: other.to_string(),
                });
            }
        };
        *v = Value::Number(mapped);
    }
    Ok(out)
}

/// Fit sorted categories on the column and replace each cell by its index
pub fn ordinal_encode(frame: &Frame, column: &str) -> UnitResult<Frame> {
    let cats = categories(frame.column(column)?)?;
    let mut out = frame.clone();
    for v in out.column_mut(column)?.values.iter_mut() {
        let idx = category_index(&cats, v)
            .ok_or_else(|| UnitError::Invalid(format!("unfitted category '{}'", v)))?;
        *v = Value::Number(idx as f64);
    }
    Ok(out)
}

/// Replace a column by one indicator column per observed category
pub fn one_hot_encode(frame: &Frame, column: &str) -> UnitResult<Frame> {
    let col = frame.column(column)?;
    let cats = categories(col)?;

    let indicators = cats
        .iter()
        .map(|cat| {
            let values = col
                .values
                .iter()
                .map(|v| {
                    let hit = v.canonical_cmp(cat) == Ordering::Equal;
                    Value::Number(if hit { 1.0 } else { 0.0 })
                })
                .collect();
            Column::new(format!("{}_{}", column, cat), values)
        })
        .collect();

    let mut out = frame.clone();
    out.expand_column(column, indicators)?;
    Ok(out)
}

/// Population-std standardization of every column not in `exclude`
pub fn standardize(frame: &Frame, exclude: &[String]) -> UnitResult<Frame> {
    let mut out = frame.clone();
    let targets: Vec<String> = frame
        .column_names()
        .filter(|name| !exclude.iter().any(|e| e == name))
        .map(str::to_string)
        .collect();

    for name in targets {
        let col = out.column_mut(&name)?;
        let xs = col.numbers()?;
        if xs.is_empty() {
            continue;
        }
        let n = xs.len() as f64;
        let mean = xs.iter().sum::<f64>() / n;
        let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();
        let scale = if std > 0.0 { std } else { 1.0 };
        col.values = xs
            .into_iter()
            .map(|x| Value::Number((x - mean) / scale))
            .collect();
    }
    Ok(out)
}

/// Seeded shuffle split; both sides must be non-empty
pub fn split(frame: &Frame, train_size: f64, random_state: u64) -> UnitResult<(Frame, Frame)> {
    if !(train_size > 0.0 && train_size < 1.0) {
        return Err(UnitError::Invalid(format!(
            "train_size {} outside (0, 1)",
            train_size
        )));
    }
    let n = frame.rows();
    let n_train = (n as f64 * train_size).floor() as usize;
    if n_train == 0 || n_train == n {
        return Err(UnitError::Invalid(format!(
            "split of {} rows at {} leaves an empty side",
            n, train_size
        )));
    }

    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(random_state);
    order.shuffle(&mut rng);

    let (train, test) = order.split_at(n_train);
    Ok((frame.take_rows(train), frame.take_rows(test)))
}


#[cfg(test)]
mod properties {
    use super::*;
    use crate::local::frame::Partition;
    use proptest::prelude::*;
    use vfl_types::PartyName;

    fn arb_category() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Text("admin".into())),
            Just(Value::Text("tech".into())),
            Just(Value::Text("unknown".into())),
            Just(Value::Number(3.0)),
            Just(Value::Missing),
        ]
    }

    fn frame_of(values: Vec<Value>) -> Frame {
        let rows = values.len();
        let mut p = Partition::new(PartyName::new("alice"));
        p.columns.push(Column::new("c", values));
        Frame::new(rows, vec![p]).unwrap()
    }

    proptest! {
        #[test]
        fn fill_then_encode_is_deterministic(values in prop::collection::vec(arb_category(), 1..40)) {
            let f = frame_of(values);
            let first = fill_with_mode(&f, "c", "unknown").and_then(|g| one_hot_encode(&g, "c"));
            let second = fill_with_mode(&f, "c", "unknown").and_then(|g| one_hot_encode(&g, "c"));
            match (first, second) {
                (Ok(a), Ok(b)) => prop_assert_eq!(a, b),
                (Err(_), Err(_)) => {}
                _ => prop_assert!(false, "runs disagree"),
            }
        }

        #[test]
        fn standardized_columns_are_centred(xs in prop::collection::vec(-1e3f64..1e3, 2..50)) {
            let f = frame_of(xs.into_iter().map(Value::Number).collect());
            let out = standardize(&f, &[]).unwrap();
            let ys = out.column("c").unwrap().numbers().unwrap();
            let mean = ys.iter().sum::<f64>() / ys.len() as f64;
            prop_assert!(mean.abs() < 1e-6);
        }
    }
}

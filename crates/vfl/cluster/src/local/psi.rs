//! In-process key intersection over per-party CSV files

use super::csv::RawTable;
use super::frame::Value;
use crate::unit::PsiRequest;
use std::collections::{BTreeSet, HashMap, HashSet};
use vfl_types::{MatchReport, PartyMatchStats, PartyName, UnitError, UnitResult};

struct PartyInput {
    party: PartyName,
    table: RawTable,
    key_index: usize,
}

/// Intersect every party's key column and write the matched rows.
///
/// Each output keeps its input header. With `sort` set, rows are ordered
/// by key; otherwise they keep their input order.
pub fn intersect(request: &PsiRequest) -> UnitResult<MatchReport> {
    if request.inputs.len() < 2 {
        return Err(UnitError::Invalid(
            "intersection needs inputs from at least two parties".into(),
        ));
    }
    if !request.inputs.contains_key(&request.receiver) {
        return Err(UnitError::UnknownParty(request.receiver.clone()));
    }

    let mut inputs = Vec::with_capacity(request.inputs.len());
    for (party, path) in &request.inputs {
        let table = RawTable::read(path)?;
        let key_index = table.column_index(&request.key)?;

        let mut seen = HashSet::with_capacity(table.rows.len());
        for (row, record) in table.rows.iter().enumerate() {
            let key = record[key_index].trim();
            if key.is_empty() {
                return Err(UnitError::MissingValue {
                    column: request.key.clone(),
                    row,
                });
            }
            if !seen.insert(key) {
                return Err(UnitError::DuplicateKey {
                    party: party.clone(),
                    key: key.to_string(),
                });
            }
        }

        inputs.push(PartyInput {
            party: party.clone(),
            table,
            key_index,
        });
    }

    let mut common: Option<BTreeSet<String>> = None;
    for input in &inputs {
        let keys: BTreeSet<String> = input
            .table
            .rows
            .iter()
            .map(|r| r[input.key_index].trim().to_string())
            .collect();
        common = Some(match common {
            None => keys,
            Some(acc) => acc.intersection(&keys).cloned().collect(),
        });
    }
    let common = common.unwrap_or_default();

    let mut stats = Vec::with_capacity(inputs.len());
    for input in inputs {
        let output = request
            .outputs
            .get(&input.party)
            .ok_or_else(|| UnitError::UnknownParty(input.party.clone()))?;

        let original_count = input.table.rows.len();
        let key_index = input.key_index;
        let mut rows: Vec<Vec<String>> = input
            .table
            .rows
            .into_iter()
            .filter(|r| common.contains(r[key_index].trim()))
            .collect();

        if request.sort {
            let parsed: HashMap<String, Value> = rows
                .iter()
                .map(|r| {
                    let key = r[key_index].trim().to_string();
                    let value = Value::parse(&key);
                    (key, value)
                })
                .collect();
            rows.sort_by(|a, b| {
                let (ka, kb) = (a[key_index].trim(), b[key_index].trim());
                parsed[ka].canonical_cmp(&parsed[kb]).then_with(|| ka.cmp(kb))
            });
        }

        let intersection_count = rows.len();
        RawTable {
            header: input.table.header,
            rows,
        }
        .write(output)?;

        tracing::debug!(
            party = %input.party,
            original = original_count,
            matched = intersection_count,
            output = %output.display(),
            "Wrote intersection"
        );

        stats.push(PartyMatchStats {
            party: input.party,
            original_count,
            intersection_count,
        });
    }

    Ok(MatchReport { parties: stats })
}

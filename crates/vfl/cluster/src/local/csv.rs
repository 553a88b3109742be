//! Minimal CSV reader and writer
//!
//! Comma separated, first line is the header, double quotes for fields
//! containing commas or quotes. Records do not span lines.

use std::fs;
use std::path::Path;
use vfl_types::{UnitError, UnitResult};

/// A CSV file as raw strings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn read(path: &Path) -> UnitResult<Self> {
        let text = fs::read_to_string(path).map_err(|source| UnitError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &text)
    }

    pub fn parse(path: &Path, text: &str) -> UnitResult<Self> {
        let csv_err = |line: usize, reason: String| UnitError::Csv {
            path: path.to_path_buf(),
            line,
            reason,
        };

        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l.trim_end_matches('\r')))
            .filter(|(_, l)| !l.trim().is_empty());

        let (header_line, header_text) = lines
            .next()
            .ok_or_else(|| csv_err(1, "missing header".to_string()))?;
        let header: Vec<String> = split_record(header_text)
            .map_err(|reason| csv_err(header_line, reason))?
            .into_iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut seen = std::collections::HashSet::new();
        for name in &header {
            if name.is_empty() {
                return Err(csv_err(header_line, "empty column name".into()));
            }
            if !seen.insert(name.as_str()) {
                return Err(csv_err(header_line, format!("duplicate column '{}'", name)));
            }
        }

        let mut rows = Vec::new();
        for (line, record) in lines {
            let fields = split_record(record).map_err(|reason| csv_err(line, reason))?;
            if fields.len() != header.len() {
                return Err(csv_err(
                    line,
                    format!("expected {} fields, found {}", header.len(), fields.len()),
                ));
            }
            rows.push(fields);
        }

        Ok(Self { header, rows })
    }

    pub fn column_index(&self, name: &str) -> UnitResult<usize> {
        self.header
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| UnitError::ColumnNotFound(name.to_string()))
    }

    pub fn write(&self, path: &Path) -> UnitResult<()> {
        let mut out = String::new();
        push_record(&mut out, &self.header);
        for row in &self.rows {
            push_record(&mut out, row);
        }
        fs::write(path, out).map_err(|source| UnitError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn split_record(line: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.chars().peekable();
    let mut in_quotes = false;

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            ('"', false) if field.is_empty() => in_quotes = true,
            (',', false) => fields.push(std::mem::take(&mut field)),
            (c, _) => field.push(c),
        }
    }
    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    fields.push(field);
    Ok(fields)
}

fn push_record(out: &mut String, fields: &[String]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        if field.contains([',', '"', '\n']) {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out.push('\n');
}

//! Minimal CSV table: a header row plus string cells.
//!
//! Handles quoted fields (with `""` escapes and embedded commas), a leading
//! UTF-8 BOM, CRLF line endings and blank lines. Rows must match the header
//! width.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CsvTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        let table = Self { headers, rows };
        table.check_widths("<memory>")?;
        Ok(table)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::parse(&text, &path.display().to_string())
    }

    /// `origin` only labels error messages.
    pub fn parse(text: &str, origin: &str) -> Result<Self> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut records = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let fields = split_record(line)
                .map_err(|msg| Error::Csv(format!("{origin}:{}: {msg}", lineno + 1)))?;
            records.push(fields);
        }
        let mut records = records.into_iter();
        let Some(headers) = records.next() else {
            return Err(Error::Csv(format!("{origin}: empty file")));
        };
        let table = Self {
            headers,
            rows: records.collect(),
        };
        table.check_widths(origin)?;
        Ok(table)
    }

    fn check_widths(&self, origin: &str) -> Result<()> {
        let width = self.headers.len();
        for (i, row) in self.rows.iter().enumerate() {
            if row.len() != width {
                return Err(Error::Csv(format!(
                    "{origin}: row {} has {} fields, header has {width}",
                    i + 1,
                    row.len()
                )));
            }
        }
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn column(&self, name: &str) -> Result<Vec<&str>> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| Error::Csv(format!("missing column `{name}`")))?;
        Ok(self.rows.iter().map(|row| row[idx].as_str()).collect())
    }

    pub fn numeric_column(&self, name: &str) -> Result<Vec<f64>> {
        self.column(name)?
            .into_iter()
            .enumerate()
            .map(|(i, cell)| parse_number(cell, name, i + 1))
            .collect()
    }

    /// Replace the column if present, append it otherwise.
    pub fn set_column(&mut self, name: &str, values: Vec<String>) -> Result<()> {
        if values.len() != self.rows.len() {
            return Err(Error::Csv(format!(
                "column `{name}` has {} values for {} rows",
                values.len(),
                self.rows.len()
            )));
        }
        match self.column_index(name) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.headers.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(())
    }

    pub fn to_csv_string(&self) -> String {
        let mut out = String::new();
        push_record(&mut out, &self.headers);
        for row in &self.rows {
            push_record(&mut out, row);
        }
        out
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        fs::write(path, self.to_csv_string()).map_err(|e| Error::io(path, e))
    }
}

pub(crate) fn parse_number(cell: &str, column: &str, row: usize) -> Result<f64> {
    cell.trim().parse::<f64>().map_err(|_| {
        Error::Csv(format!(
            "column `{column}` row {row}: `{cell}` is not a number"
        ))
    })
}

fn split_record(line: &str) -> std::result::Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.chars().peekable();
    let mut quoted = false;
    let mut was_quoted = false;

    while let Some(c) = chars.next() {
        if quoted {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => quoted = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.trim().is_empty() && !was_quoted => {
                field.clear();
                quoted = true;
                was_quoted = true;
            }
            ',' => {
                fields.push(finish(&field, was_quoted));
                field.clear();
                was_quoted = false;
            }
            _ => field.push(c),
        }
    }
    if quoted {
        return Err("unterminated quoted field".to_string());
    }
    fields.push(finish(&field, was_quoted));
    Ok(fields)
}

fn finish(field: &str, was_quoted: bool) -> String {
    if was_quoted {
        field.to_string()
    } else {
        field.trim().to_string()
    }
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

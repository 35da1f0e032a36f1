use std::io::{self, Write};

use crate::config::OutputFormat;

mod pretty;

/// Simplified cell value of an access matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    None,
    Up,
    Down,
    Err,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Row {
    pub labels: Vec<String>,
    pub entries: Vec<Outcome>,
}

/// Rendering-ready access matrix. Rows are kept in insertion order, producers
/// add them already sorted.
#[derive(Clone, Debug)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    /// Creates a table with the given label columns followed by one
    /// uppercased column per verb.
    pub fn with_headers(labels: &[&str], verbs: &[String]) -> Self {
        let headers = labels
            .iter()
            .map(|l| l.to_string())
            .chain(verbs.iter().map(|v| v.to_uppercase()))
            .collect();
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn add_row(&mut self, labels: Vec<String>, entries: Vec<Outcome>) {
        self.rows.push(Row { labels, entries });
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Writes the table. `colored` switches on ANSI colors and only has an
    /// effect for the icon table.
    pub fn render<W: Write>(&self, out: &mut W, format: OutputFormat, colored: bool) -> io::Result<()> {
        let table = pretty::Pretty::new(self, format, colored).to_string();
        for line in table.lines().filter(|l| !l.trim().is_empty()) {
            writeln!(out, "{}", line.trim_end())?;
        }
        Ok(())
    }
}

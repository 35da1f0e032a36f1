use super::{Outcome, Table};
use crate::config::OutputFormat;

use comfy_table::{presets::NOTHING, Attribute, Cell, Color};
use std::fmt::Display;

pub struct Pretty<'a> {
    table: &'a Table,
    format: OutputFormat,
    colored: bool,
}

impl<'a> Pretty<'a> {
    pub fn new(table: &'a Table, format: OutputFormat, colored: bool) -> Self {
        Self {
            table,
            format,
            colored: colored && format == OutputFormat::IconTable,
        }
    }

    fn cell(&self, outcome: Outcome) -> Cell {
        let text = match (self.format, outcome) {
            (_, Outcome::Err) => "ERR",
            (OutputFormat::AsciiTable, Outcome::Up) => "yes",
            (OutputFormat::AsciiTable, Outcome::Down) => "no",
            (OutputFormat::AsciiTable, Outcome::None) => "n/a",
            (OutputFormat::IconTable, Outcome::Up) => "✔",
            (OutputFormat::IconTable, Outcome::Down) => "✖",
            (OutputFormat::LeftRight, Outcome::Up) => "▶",
            (OutputFormat::LeftRight, Outcome::Down) => "◀",
            (_, Outcome::None) => "",
        };
        let cell = Cell::new(text);
        match outcome {
            Outcome::Up => cell.fg(Color::Green),
            Outcome::Down => cell.fg(Color::Red),
            Outcome::Err => cell.fg(Color::Magenta),
            Outcome::None => cell,
        }
    }
}

impl Display for Pretty<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut table = comfy_table::Table::new();
        table.load_preset(NOTHING);
        if self.colored {
            table.enforce_styling();
        } else {
            table.force_no_tty();
        }

        table.set_header(
            self.table
                .headers()
                .iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
                .collect::<Vec<Cell>>(),
        );

        self.table.rows().iter().for_each(|row| {
            let mut cells: Vec<Cell> = Vec::with_capacity(row.labels.len() + row.entries.len());
            cells.extend(row.labels.iter().map(Cell::new));
            cells.extend(row.entries.iter().map(|o| self.cell(*o)));
            table.add_row(cells);
        });

        for column in table.column_iter_mut() {
            column.set_padding((0, 2));
        }

        table.fmt(f)
    }
}

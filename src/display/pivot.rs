use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};

use super::{Cell, Table};

#[derive(Debug, Clone, PartialEq)]
pub struct PivotRow {
    pub display_name: String,
    /// One value per entry of [`PivotTable::days`].
    pub amounts: Vec<f64>,
    pub total: f64,
}

/// Billed totals per display name and day of month.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PivotTable {
    pub days: Vec<u32>,
    pub rows: Vec<PivotRow>,
}

impl PivotTable {
    /// `entries` are (display name, parsed visit date, billed total). Rows
    /// without a date still get a pivot row but add nothing to it.
    pub fn build<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, Option<NaiveDate>, f64)>,
    {
        let mut grid: BTreeMap<String, BTreeMap<u32, f64>> = BTreeMap::new();
        let mut days = BTreeSet::new();
        for (name, date, billed) in entries {
            let by_day = grid.entry(name).or_default();
            if let Some(d) = date {
                let day = d.day();
                days.insert(day);
                *by_day.entry(day).or_insert(0.0) += billed;
            }
        }
        let days: Vec<u32> = days.into_iter().collect();
        let rows = grid
            .into_iter()
            .map(|(display_name, by_day)| {
                let amounts: Vec<f64> = days
                    .iter()
                    .map(|d| by_day.get(d).copied().unwrap_or(0.0))
                    .collect();
                let total = amounts.iter().sum();
                PivotRow {
                    display_name,
                    amounts,
                    total,
                }
            })
            .collect();
        Self { days, rows }
    }

    pub fn day_label(day: u32) -> String {
        format!("{}일", day)
    }

    pub fn into_table(self, name_header: &str, total_header: &str) -> Table {
        let mut headers = Vec::with_capacity(self.days.len() + 2);
        headers.push(name_header.to_string());
        headers.extend(self.days.iter().map(|d| Self::day_label(*d)));
        headers.push(total_header.to_string());
        let rows = self
            .rows
            .into_iter()
            .map(|r| {
                let mut cells = Vec::with_capacity(r.amounts.len() + 2);
                cells.push(Cell::Text(r.display_name));
                cells.extend(r.amounts.into_iter().map(Cell::Number));
                cells.push(Cell::Number(r.total));
                cells
            })
            .collect();
        Table { headers, rows }
    }
}

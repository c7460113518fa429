//! In-memory slices of long-form simulation draws.
//!
//! A `SimulationTable` holds one file's rows, or the concatenation of
//! several files' rows in file order. Tables are built per chunk or per
//! state and dropped once summarized.

use crate::types::{Category, CountyIndex, DrawIndex};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Grouping key of long-form rows: (demographic category, county).
pub type CellKey = (Option<Category>, CountyIndex);

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationDrawRow {
    pub county:   CountyIndex,
    pub category: Option<Category>,
    pub draw:     DrawIndex,
    pub value:    f64,
}

/// The counties one load is restricted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionSet {
    /// Inclusive contiguous range of county indices.
    Range { start: CountyIndex, end: CountyIndex },
    /// The member counties of one state.
    Members(BTreeSet<CountyIndex>),
}

impl RegionSet {
    pub fn contains(&self, county: CountyIndex) -> bool {
        match self {
            Self::Range { start, end } => (*start..=*end).contains(&county),
            Self::Members(set)         => set.contains(&county),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Range { start, end } if end < start => 0,
            Self::Range { start, end } => (end - start) as usize + 1,
            Self::Members(set)         => set.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Range { start, end } => format!("counties {start}..={end}"),
            Self::Members(set)         => format!("{} member counties", set.len()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationTable {
    rows: Vec<SimulationDrawRow>,
}

impl SimulationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<SimulationDrawRow>) -> Self {
        Self { rows }
    }

    /// Concatenate tables, keeping the given order.
    pub fn concat(tables: Vec<SimulationTable>) -> Self {
        let total = tables.iter().map(|t| t.rows.len()).sum();
        let mut rows = Vec::with_capacity(total);
        for table in tables {
            rows.extend(table.rows);
        }
        Self { rows }
    }

    pub fn rows(&self) -> &[SimulationDrawRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Replace negative values with zero. Returns how many were clamped.
    pub fn clamp_negative(&mut self) -> usize {
        let mut clamped = 0;
        for row in self.rows.iter_mut().filter(|r| r.value < 0.0) {
            row.value = 0.0;
            clamped += 1;
        }
        clamped
    }

    /// Renumber draws densely: within each (category, county) cell the
    /// k-th row in table order becomes draw k. File-local draw numbers
    /// restart in every block file, so they are discarded here.
    pub fn reassign_draw_indices(&mut self) {
        let mut next: HashMap<CellKey, DrawIndex> = HashMap::new();
        for row in &mut self.rows {
            let counter = next.entry((row.category.clone(), row.county)).or_insert(0);
            *counter += 1;
            row.draw = *counter;
        }
    }

    /// Number of draws per cell, in sorted key order.
    pub fn draw_counts(&self) -> BTreeMap<CellKey, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.rows {
            *counts.entry((row.category.clone(), row.county)).or_insert(0) += 1;
        }
        counts
    }

    /// Cells whose draw count breaks the dense 1..D layout. With no
    /// `expected` D, the most common count in the table is taken as D.
    pub fn irregular_cells(&self, expected: Option<usize>) -> usize {
        let counts = self.draw_counts();
        let expected = match expected {
            Some(d) => d,
            None => {
                let mut freq: BTreeMap<usize, usize> = BTreeMap::new();
                for n in counts.values() {
                    *freq.entry(*n).or_insert(0) += 1;
                }
                match freq.into_iter().max_by_key(|(_, f)| *f) {
                    Some((d, _)) => d,
                    None => return 0,
                }
            }
        };
        counts.values().filter(|n| **n != expected).count()
    }

    pub fn categories(&self) -> BTreeSet<Option<Category>> {
        self.rows.iter().map(|r| r.category.clone()).collect()
    }

    /// Draw values per (category, county), in table order within a cell.
    pub fn values_by_cell(&self) -> BTreeMap<CellKey, Vec<f64>> {
        let mut groups: BTreeMap<CellKey, Vec<f64>> = BTreeMap::new();
        for row in &self.rows {
            groups
                .entry((row.category.clone(), row.county))
                .or_default()
                .push(row.value);
        }
        groups
    }

    /// Index of values by (category, county, draw) for joining.
    pub fn index_by_draw(&self) -> HashMap<(Option<Category>, CountyIndex, DrawIndex), f64> {
        self.rows
            .iter()
            .map(|r| ((r.category.clone(), r.county, r.draw), r.value))
            .collect()
    }

    /// Sum values across counties per (category, draw). Position `d - 1`
    /// of each vector holds draw `d`. NaN values are skipped.
    pub fn sum_by_category_draw(&self) -> BTreeMap<Option<Category>, Vec<f64>> {
        let mut sums: BTreeMap<Option<Category>, Vec<f64>> = BTreeMap::new();
        for row in &self.rows {
            let slot = (row.draw as usize).saturating_sub(1);
            let per_draw = sums.entry(row.category.clone()).or_default();
            if per_draw.len() <= slot {
                per_draw.resize(slot + 1, 0.0);
            }
            if !row.value.is_nan() {
                per_draw[slot] += row.value;
            }
        }
        sums
    }
}

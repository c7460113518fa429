//! Demographic stratification and per-dataset column naming.
//!
//! RULE: Column names are resolved here, at the file boundary.
//! The aggregators only ever see a `Demographic` and a `DatasetKind`,
//! never a free-form column string.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Demographic {
    Age,
    Income,
    Educ,
}

impl Demographic {
    pub const ALL: [Demographic; 3] = [Self::Age, Self::Income, Self::Educ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Age    => "age",
            Self::Income => "income",
            Self::Educ   => "educ",
        }
    }
}

impl fmt::Display for Demographic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Demographic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "age"    => Ok(Self::Age),
            "income" => Ok(Self::Income),
            "educ"   => Ok(Self::Educ),
            other    => Err(format!("unknown demographic '{other}' (expected age|income|educ)")),
        }
    }
}

/// Which side of a rate a dataset sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    /// MSM counts.
    Numerator,
    /// Male population.
    Denominator,
}

pub const COUNTY_COLUMN: &str = "county_index";
pub const DRAW_COLUMN: &str = "sim_index";

impl DatasetKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Numerator   => "msm",
            Self::Denominator => "male",
        }
    }

    pub fn value_column(&self) -> &'static str {
        match self {
            Self::Numerator   => "msm_count",
            Self::Denominator => "male_pop",
        }
    }

    /// Demographic column candidates, preferred name first.
    /// Population files name the column `<demo>_group`; older exports
    /// use the bare name, which is accepted as a fallback.
    pub fn demographic_columns(&self, demo: Demographic) -> Vec<String> {
        match self {
            Self::Numerator   => vec![demo.name().to_string()],
            Self::Denominator => vec![format!("{}_group", demo.name()), demo.name().to_string()],
        }
    }

    /// File-name prefix of the wide (no demographic) draw files.
    pub fn aggregate_prefix(&self) -> String {
        format!("{}_blk_", self.label())
    }

    /// File-name prefix of the long per-demographic draw files.
    pub fn demographic_prefix(&self, demo: Demographic) -> String {
        match self {
            Self::Numerator   => format!("adj_msm_{}_blk_", demo.name()),
            // Population blocks are not always separated by an underscore.
            Self::Denominator => format!("adj_male_{}_blk", demo.name()),
        }
    }
}

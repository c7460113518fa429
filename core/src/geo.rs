//! County ↔ state membership built from the geographic reference table.
//!
//! RULE: The county key is the 1-based row position in the reference
//! table. FIPS codes are carried for output only and never used to join.

use crate::{
    error::{SummaryError, SummaryResult},
    types::{CountyIndex, StateAbbrev},
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

pub const FIPS_COLUMN: &str = "FIPS";
pub const STATE_COLUMN: &str = "ST_ABBREV";

#[derive(Debug, Clone)]
pub struct GeoMapper {
    /// Indexed by county_index - 1.
    counties: Vec<(String, StateAbbrev)>,
    members:  BTreeMap<StateAbbrev, BTreeSet<CountyIndex>>,
}

impl GeoMapper {
    /// Build from (FIPS, state) pairs in reference-table order.
    pub fn from_rows<I, F, S>(rows: I) -> Self
    where
        I: IntoIterator<Item = (F, S)>,
        F: Into<String>,
        S: Into<StateAbbrev>,
    {
        let mut counties = Vec::new();
        let mut members: BTreeMap<StateAbbrev, BTreeSet<CountyIndex>> = BTreeMap::new();
        for (i, (fips, state)) in rows.into_iter().enumerate() {
            let state = state.into();
            let county_index = (i + 1) as CountyIndex;
            members.entry(state.clone()).or_default().insert(county_index);
            counties.push((fips.into(), state));
        }
        Self { counties, members }
    }

    /// Read the reference CSV. Only `FIPS` and `ST_ABBREV` are required;
    /// FIPS stays a string so leading zeros survive.
    pub fn load(path: impl AsRef<Path>) -> SummaryResult<Self> {
        let path = path.as_ref();
        let mut rdr = csv::Reader::from_path(path)?;
        let headers = rdr.headers()?.clone();
        let column = |name: &str| {
            headers.iter().position(|h| h.trim() == name).ok_or_else(|| {
                SummaryError::Configuration(format!(
                    "{} is missing required column {name}",
                    path.display()
                ))
            })
        };
        let fips_at = column(FIPS_COLUMN)?;
        let state_at = column(STATE_COLUMN)?;

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let fips = record.get(fips_at).unwrap_or_default().trim().to_string();
            let state = record.get(state_at).unwrap_or_default().trim().to_string();
            rows.push((fips, state));
        }
        let mapper = Self::from_rows(rows);
        log::info!(
            "Loaded {} counties in {} states from {}",
            mapper.county_count(),
            mapper.members.len(),
            path.display()
        );
        Ok(mapper)
    }

    pub fn county_count(&self) -> usize {
        self.counties.len()
    }

    pub fn state_of(&self, county: CountyIndex) -> SummaryResult<&str> {
        self.entry(county).map(|(_, state)| state.as_str())
    }

    pub fn fips_of(&self, county: CountyIndex) -> SummaryResult<&str> {
        self.entry(county).map(|(fips, _)| fips.as_str())
    }

    pub fn counties_of(&self, state: &str) -> SummaryResult<&BTreeSet<CountyIndex>> {
        self.members.get(state).ok_or_else(|| SummaryError::MappingNotFound {
            kind: "state",
            key:  state.to_string(),
        })
    }

    /// States in lexicographic order.
    pub fn states(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    fn entry(&self, county: CountyIndex) -> SummaryResult<&(String, StateAbbrev)> {
        (county as usize)
            .checked_sub(1)
            .and_then(|i| self.counties.get(i))
            .ok_or_else(|| SummaryError::MappingNotFound {
                kind: "county",
                key:  county.to_string(),
            })
    }
}

//! Shared primitive types used across the whole pipeline.

/// 1-based positional county key: the row number of the county in the
/// geographic reference table. Never an external FIPS code.
pub type CountyIndex = u32;

/// 1-based simulation draw number.
pub type DrawIndex = u32;

/// Two-letter state abbreviation as it appears in the reference table.
pub type StateAbbrev = String;

/// Demographic category label as found in the draw files (e.g. "18-24").
pub type Category = String;

/// The canonical run identifier.
pub type RunId = String;

//! drawsum: quantile summaries of Monte-Carlo population draws at
//! county and state level, optionally stratified by demographic group.

pub mod config;
pub mod county;
pub mod demographic;
pub mod error;
pub mod geo;
pub mod loader;
pub mod matrix;
pub mod output;
pub mod pipeline;
pub mod quality;
pub mod rate;
pub mod state;
pub mod summary;
pub mod table;
pub mod types;

pub mod types;
pub mod config;
pub mod error;
pub mod data;
pub mod repair;
pub mod processing;
pub mod render;
pub mod choropleth;
pub mod pipeline;

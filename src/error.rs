use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Column '{column}' not found in {source_name}")]
    MissingColumn { column: String, source_name: String },

    #[error("Unsupported geometry format: {0}")]
    UnsupportedFormat(String),

    #[error("GeoJSON must be a FeatureCollection")]
    NotAFeatureCollection,
}

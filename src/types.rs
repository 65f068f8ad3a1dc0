use geo::{MultiPolygon, Point};

#[derive(Debug, Clone)]
pub struct StoreLocation {
    pub point: Point<f64>, // x = longitude, y = latitude
    pub label: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Region {
    pub id: String,
    pub name: String,
    pub geometry: MultiPolygon<f64>,
}

/// A census row after numeric coercion. `None` marks a value that failed to parse.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DemographicRow {
    pub id: String,
    pub name: String,
    pub affluent_households: Option<f64>,
    pub households: Option<f64>,
    pub age_18_to_34: Option<f64>,
    pub population: Option<f64>,
}

/// A census row whose denominators are known to be positive.
#[derive(Debug, Clone, PartialEq)]
pub struct DemographicRecord {
    pub id: String,
    pub name: String,
    pub affluent_households: Option<f64>,
    pub households: f64,
    pub age_18_to_34: Option<f64>,
    pub population: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRegion {
    pub id: String,
    pub name: String,
    pub affluent_ratio: f64,
    pub young_adult_ratio: f64,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct RankedRegion {
    pub rank: usize,
    pub scored: ScoredRegion,
    pub region: Region,
    pub color: String,
}

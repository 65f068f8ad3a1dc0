use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::fs;
use anyhow::{Context, Result};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub input: InputConfig,
    pub ranking: RankingConfig,
    pub static_map: StaticMapConfig,
    pub choropleth: ChoroplethConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct InputConfig {
    pub stores_csv: PathBuf,
    pub boundaries: PathBuf, // .shp or GeoJSON
    pub census_csv: PathBuf,
    pub icon: Option<PathBuf>,
    pub label_column: Option<String>,
    pub columns: ColumnConfig,
}

/// Column names shared by the boundary file and the census CSV.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ColumnConfig {
    pub id: String,
    pub name: String,
    pub affluent_households: String,
    pub households: String,
    pub age_18_to_34: String,
    pub population: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RankingConfig {
    pub top_k: usize,
    pub palette: Vec<String>,
    pub fallback_color: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StaticMapConfig {
    pub output: PathBuf,
    pub width_in: f64,
    pub height_in: f64,
    pub dpi: u32,
    pub icon_zoom: f64,
    pub display: bool,
    pub viewer: Option<String>,
    pub stores_html: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChoroplethConfig {
    pub output: PathBuf,
    pub center: [f64; 2], // [lat, lon]
    pub zoom_start: u8,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            stores_csv: PathBuf::from("./data/denver.csv"),
            boundaries: PathBuf::from("./data/neighborhoods.shp"),
            census_csv: PathBuf::from("./data/census.csv"),
            icon: Some(PathBuf::from("./data/starbucks-icon.png")),
            label_column: None,
            columns: ColumnConfig::default(),
        }
    }
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            id: "NBHD_ID".to_string(),
            name: "NBHD_NAME".to_string(),
            affluent_households: "NUM_HHLD_100K+".to_string(),
            households: "NUM_HOUSEHOLDS".to_string(),
            age_18_to_34: "AGE_18_TO_34".to_string(),
            population: "POPULATION_2010".to_string(),
        }
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            palette: vec!["red".to_string(), "blue".to_string(), "green".to_string()],
            fallback_color: "gray".to_string(),
        }
    }
}

impl Default for StaticMapConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("denver_starbucks_static_map.png"),
            width_in: 10.0,
            height_in: 10.0,
            dpi: 300,
            icon_zoom: 0.003,
            display: true,
            viewer: None,
            stores_html: None,
        }
    }
}

impl Default for ChoroplethConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("top_3_neighborhoods_map.html"),
            center: [39.7392, -104.9903],
            zoom_start: 11,
        }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }

    /// Loads `path` when given, otherwise the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_file(p),
            None => Ok(Self::default()),
        }
    }
}

use crate::config::ColumnConfig;
use crate::error::LoadError;
use crate::repair;
use crate::types::{DemographicRecord, DemographicRow, Region, StoreLocation};
use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, StringRecord};
use geo::{MultiPolygon, Point};
use shapefile::dbase::FieldValue;
use shapefile::Reader;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info, warn};

const LONGITUDE: &str = "Longitude";
const LATITUDE: &str = "Latitude";

#[derive(Debug)]
pub struct LoadedStores {
    pub locations: Vec<StoreLocation>,
    pub rejected: usize,
}

/// Parses a cell as a finite number. Anything else is treated as missing.
pub fn coerce_numeric(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Identifiers arrive as text from CSV and as text or numbers from dbase;
/// integral renderings like "12.0" collapse to "12" so both sides join.
pub fn normalize_id(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 && trimmed.contains('.') => {
            format!("{}", v as i64)
        }
        _ => trimmed.to_string(),
    }
}

fn column_index(headers: &StringRecord, column: &str, source: &Path) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == column)
        .ok_or_else(|| {
            LoadError::MissingColumn {
                column: column.to_string(),
                source_name: format!("{:?}", source),
            }
            .into()
        })
}

pub fn load_store_locations(path: &Path, label_column: Option<&str>) -> Result<LoadedStores> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open store CSV: {:?}", path))?;
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(file);
    let headers = rdr.headers()?.clone();

    let lon_idx = column_index(&headers, LONGITUDE, path)?;
    let lat_idx = column_index(&headers, LATITUDE, path)?;
    let label_idx = label_column.and_then(|c| headers.iter().position(|h| h.trim() == c));

    let mut locations = Vec::new();
    let mut rejected = 0;

    for (line, result) in rdr.records().enumerate() {
        let record = result?;
        let lon = record.get(lon_idx).and_then(coerce_numeric);
        let lat = record.get(lat_idx).and_then(coerce_numeric);

        match (lon, lat) {
            (Some(lon), Some(lat)) => locations.push(StoreLocation {
                point: Point::new(lon, lat),
                label: label_idx
                    .and_then(|i| record.get(i))
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty()),
            }),
            _ => {
                debug!("Dropping store row {}: unusable coordinates", line + 1);
                rejected += 1;
            }
        }
    }

    info!(
        "Loaded {} store locations ({} rows without usable coordinates)",
        locations.len(),
        rejected
    );

    Ok(LoadedStores { locations, rejected })
}

/// Keeps a row only if its ratio denominators are positive. Missing
/// numerators stay missing and are resolved when scoring.
pub fn admit_demographic(row: DemographicRow) -> Option<DemographicRecord> {
    let households = row.households.filter(|v| *v > 0.0)?;
    let population = row.population.filter(|v| *v > 0.0)?;

    Some(DemographicRecord {
        id: row.id,
        name: row.name,
        affluent_households: row.affluent_households,
        households,
        age_18_to_34: row.age_18_to_34,
        population,
    })
}

pub fn load_demographics(path: &Path, columns: &ColumnConfig) -> Result<Vec<DemographicRecord>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open census CSV: {:?}", path))?;
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(file);
    let headers = rdr.headers()?.clone();
    info!("Census columns: {:?}", headers.iter().collect::<Vec<_>>());

    let id_idx = column_index(&headers, &columns.id, path)?;
    let name_idx = column_index(&headers, &columns.name, path)?;
    let affluent_idx = column_index(&headers, &columns.affluent_households, path)?;
    let households_idx = column_index(&headers, &columns.households, path)?;
    let age_idx = column_index(&headers, &columns.age_18_to_34, path)?;
    let population_idx = column_index(&headers, &columns.population, path)?;

    let mut records = Vec::new();
    let mut total = 0;

    for result in rdr.records() {
        let record = result?;
        total += 1;

        let row = DemographicRow {
            id: normalize_id(record.get(id_idx).unwrap_or("")),
            name: record.get(name_idx).unwrap_or("").trim().to_string(),
            affluent_households: record.get(affluent_idx).and_then(coerce_numeric),
            households: record.get(households_idx).and_then(coerce_numeric),
            age_18_to_34: record.get(age_idx).and_then(coerce_numeric),
            population: record.get(population_idx).and_then(coerce_numeric),
        };

        match admit_demographic(row) {
            Some(admitted) => records.push(admitted),
            None => debug!("Dropping census row {}: zero or missing denominators", total),
        }
    }

    info!("Admitted {} of {} census rows", records.len(), total);
    Ok(records)
}

/// Loads region boundaries from a shapefile or a GeoJSON FeatureCollection.
/// Failing to open or parse the file is an error; individual records with
/// missing ids or unrepairable geometry are skipped.
pub fn load_regions(path: &Path, columns: &ColumnConfig) -> Result<Vec<Region>> {
    let extension = path.extension()
        .and_then(|e| e.to_str())
        .map(|s: &str| s.to_lowercase())
        .ok_or_else(|| anyhow!("Input geometry file has no extension"))?;

    let regions = match extension.as_str() {
        "shp" => load_shapefile_regions(path, columns)?,
        "json" | "geojson" => load_geojson_regions(path, columns)?,
        _ => return Err(LoadError::UnsupportedFormat(extension).into()),
    };

    info!("Loaded {} regions from {:?}", regions.len(), path);
    Ok(regions)
}

fn field_to_string(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Character(Some(s)) | FieldValue::Memo(s) => {
            let s = s.trim();
            if s.is_empty() { None } else { Some(normalize_id(s)) }
        }
        FieldValue::Numeric(Some(n)) => Some(normalize_id(&n.to_string())),
        FieldValue::Float(Some(f)) => Some(normalize_id(&f.to_string())),
        FieldValue::Double(d) => Some(normalize_id(&d.to_string())),
        FieldValue::Integer(i) => Some(i.to_string()),
        _ => None,
    }
}

fn finish_region(id: String, name: String, geometry: Option<MultiPolygon<f64>>) -> Option<Region> {
    match geometry.and_then(repair::ensure_valid) {
        Some(geometry) => Some(Region { id, name, geometry }),
        None => {
            warn!("Dropping region {} ({}): geometry is null or could not be repaired", id, name);
            None
        }
    }
}

/// Polygonal shapes convert (or fail to, giving `None`); a null shape is a
/// polygon record with no geometry. Points and lines are not regions.
#[derive(Debug)]
enum ShapeGeometry {
    Polygonal(Option<MultiPolygon<f64>>),
    Other,
}

fn shape_geometry(shape: shapefile::Shape) -> ShapeGeometry {
    match shape {
        shapefile::Shape::Polygon(polygon) => ShapeGeometry::Polygonal(polygon.try_into().ok()),
        shapefile::Shape::PolygonM(polygon) => ShapeGeometry::Polygonal(polygon.try_into().ok()),
        shapefile::Shape::PolygonZ(polygon) => ShapeGeometry::Polygonal(polygon.try_into().ok()),
        shapefile::Shape::NullShape => ShapeGeometry::Polygonal(None),
        _ => ShapeGeometry::Other,
    }
}

fn load_shapefile_regions(path: &Path, columns: &ColumnConfig) -> Result<Vec<Region>> {
    let mut reader = Reader::from_path(path)
        .with_context(|| format!("Failed to open Shapefile: {:?}", path))?;

    let mut regions = Vec::new();

    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result
            .with_context(|| format!("Failed to read Shapefile record: {:?}", path))?;

        let id = match record.get(&columns.id).and_then(field_to_string) {
            Some(id) => id,
            None => continue,
        };
        let name = record.get(&columns.name)
            .and_then(field_to_string)
            .unwrap_or_default();

        let geometry = match shape_geometry(shape) {
            ShapeGeometry::Polygonal(geometry) => geometry,
            ShapeGeometry::Other => continue, // Skip non-polygon shapes
        };

        if let Some(region) = finish_region(id, name, geometry) {
            regions.push(region);
        }
    }

    Ok(regions)
}

fn load_geojson_regions(path: &Path, columns: &ColumnConfig) -> Result<Vec<Region>> {
    use geojson::GeoJson;

    let file = File::open(path)
        .with_context(|| format!("Failed to open GeoJSON file: {:?}", path))?;
    let reader = BufReader::new(file);
    let geojson = GeoJson::from_reader(reader).context("Failed to parse GeoJSON")?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(LoadError::NotAFeatureCollection.into()),
    };

    let mut regions = Vec::new();

    for feature in collection.features {
        let property = |key: &str| -> Option<String> {
            match feature.properties.as_ref()?.get(key)? {
                serde_json::Value::String(s) if !s.trim().is_empty() => Some(normalize_id(s)),
                serde_json::Value::Number(n) => Some(normalize_id(&n.to_string())),
                _ => None,
            }
        };

        let id = match property(&columns.id) {
            Some(id) => id,
            None => continue,
        };
        let name = property(&columns.name).unwrap_or_default();

        let geometry = match &feature.geometry {
            Some(geom) => match geo::Geometry::<f64>::try_from(geom.value.clone()) {
                Ok(geo::Geometry::MultiPolygon(mp)) => Some(mp),
                Ok(geo::Geometry::Polygon(p)) => Some(MultiPolygon::new(vec![p])),
                Ok(_) => continue, // Skip points/lines
                Err(e) => {
                    debug!("Region {} has unconvertible geometry: {:?}", id, e);
                    None
                }
            },
            None => None,
        };

        if let Some(region) = finish_region(id, name, geometry) {
            regions.push(region);
        }
    }

    Ok(regions)
}

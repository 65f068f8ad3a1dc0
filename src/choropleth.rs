//! Interactive Leaflet maps written as standalone HTML documents.

use crate::config::ChoroplethConfig;
use crate::types::{RankedRegion, StoreLocation};
use anyhow::{Context, Result};
use askama::Template;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde_json::json;
use std::fs;
use std::path::Path;
use tracing::info;

const EDGE_COLOR: &str = "black";
const EDGE_WEIGHT: u32 = 2;
const FILL_OPACITY: f64 = 0.6;

pub fn ranked_feature_collection(ranked: &[RankedRegion]) -> FeatureCollection {
    let features = ranked
        .iter()
        .map(|r| {
            let mut properties = JsonObject::new();
            properties.insert("id".into(), json!(r.scored.id));
            properties.insert("name".into(), json!(r.region.name));
            properties.insert("rank".into(), json!(r.rank + 1));
            properties.insert("score".into(), json!(r.scored.score));
            properties.insert("affluent_ratio".into(), json!(r.scored.affluent_ratio));
            properties.insert("young_adult_ratio".into(), json!(r.scored.young_adult_ratio));
            properties.insert(
                "style".into(),
                json!({
                    "fillColor": r.color,
                    "color": EDGE_COLOR,
                    "weight": EDGE_WEIGHT,
                    "fillOpacity": FILL_OPACITY,
                }),
            );
            Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::from(&r.region.geometry))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

pub fn store_feature_collection(stores: &[StoreLocation]) -> FeatureCollection {
    let features = stores
        .iter()
        .map(|s| {
            let mut properties = JsonObject::new();
            if let Some(label) = &s.label {
                properties.insert("name".into(), json!(label));
            }
            Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::from(&s.point))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Writes the ranked regions as styled polygons with name tooltips.
pub fn render_choropleth(ranked: &[RankedRegion], settings: &ChoroplethConfig, output: &Path) -> Result<()> {
    let collection = ranked_feature_collection(ranked);
    let layer = r#"L.geoJSON(features, {
      style: function (feature) { return feature.properties.style; },
      onEachFeature: function (feature, layer) { layer.bindTooltip(feature.properties.name); }
    }).addTo(map);"#;

    let html = leaflet_document("Top neighborhoods", settings, &collection, layer)?;
    fs::write(output, html)
        .with_context(|| format!("Failed to write map: {:?}", output))?;
    info!("Interactive map with {} regions saved as {:?}", ranked.len(), output);
    Ok(())
}

/// Writes one circle marker per store.
pub fn render_store_markers(stores: &[StoreLocation], settings: &ChoroplethConfig, output: &Path) -> Result<()> {
    let collection = store_feature_collection(stores);
    let layer = r#"L.geoJSON(features, {
      pointToLayer: function (feature, latlng) {
        return L.circleMarker(latlng, {radius: 4, color: "red", fillOpacity: 0.8});
      },
      onEachFeature: function (feature, layer) {
        if (feature.properties && feature.properties.name) { layer.bindTooltip(feature.properties.name); }
      }
    }).addTo(map);"#;

    let html = leaflet_document("Store locations", settings, &collection, layer)?;
    fs::write(output, html)
        .with_context(|| format!("Failed to write map: {:?}", output))?;
    info!("Interactive store map with {} markers saved as {:?}", stores.len(), output);
    Ok(())
}

#[derive(Template)]
#[template(path = "map.html")]
struct MapTemplate<'a> {
    title: &'a str,
    lat: f64,
    lon: f64,
    zoom: u8,
    features_json: String,
    layer: &'a str,
}

fn leaflet_document(
    title: &str,
    settings: &ChoroplethConfig,
    collection: &FeatureCollection,
    layer: &str,
) -> Result<String> {
    // "</" inside an inline script would end the script element early.
    let features_json = serde_json::to_string(collection)
        .context("Failed to serialize map features")?
        .replace("</", "<\\/");
    let [lat, lon] = settings.center;

    let page = MapTemplate {
        title,
        lat,
        lon,
        zoom: settings.zoom_start,
        features_json,
        layer,
    };
    page.render().context("Failed to render map template")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Region, ScoredRegion};
    use geo::{polygon, MultiPolygon, Point};
    use tempfile::tempdir;

    fn ranked(rank: usize, id: &str, name: &str, color: &str) -> RankedRegion {
        RankedRegion {
            rank,
            scored: ScoredRegion {
                id: id.into(),
                name: name.into(),
                affluent_ratio: 0.2,
                young_adult_ratio: 0.4,
                score: 0.3,
            },
            region: Region {
                id: id.into(),
                name: name.into(),
                geometry: MultiPolygon::new(vec![polygon![
                    (x: -105.0, y: 39.7),
                    (x: -104.9, y: 39.7),
                    (x: -104.9, y: 39.8),
                    (x: -105.0, y: 39.7),
                ]]),
            },
            color: color.into(),
        }
    }

    #[test]
    fn features_carry_style_and_tooltip_name() {
        let collection = ranked_feature_collection(&[ranked(0, "1", "Union Station", "red")]);
        assert_eq!(collection.features.len(), 1);
        let props = collection.features[0].properties.as_ref().unwrap();
        assert_eq!(props["name"], "Union Station");
        assert_eq!(props["rank"], 1);
        assert_eq!(props["style"]["fillColor"], "red");
        assert_eq!(props["style"]["color"], "black");
        assert_eq!(props["style"]["weight"], 2);
        assert_eq!(props["style"]["fillOpacity"], 0.6);
    }

    #[test]
    fn choropleth_html_contains_regions_and_view() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("top.html");
        let regions = vec![ranked(0, "1", "Highland", "red"), ranked(1, "2", "Baker", "blue")];

        render_choropleth(&regions, &ChoroplethConfig::default(), &output).unwrap();
        let html = fs::read_to_string(&output).unwrap();
        assert!(html.contains("setView([39.7392, -104.9903], 11)"));
        assert!(html.contains("\"Highland\""));
        assert!(html.contains("\"Baker\""));
        assert!(html.contains("\"fillColor\":\"blue\""));
        assert!(html.contains("bindTooltip"));
    }

    #[test]
    fn script_terminators_in_names_are_escaped() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("top.html");
        let regions = vec![ranked(0, "1", "</script><b>", "red")];
        render_choropleth(&regions, &ChoroplethConfig::default(), &output).unwrap();
        let html = fs::read_to_string(&output).unwrap();
        assert_eq!(html.matches("</script>").count(), 2);
    }

    #[test]
    fn store_markers_keep_labels() {
        let stores = vec![
            StoreLocation { point: Point::new(-104.98, 39.74), label: Some("16th St".into()) },
            StoreLocation { point: Point::new(-104.90, 39.70), label: None },
        ];
        let collection = store_feature_collection(&stores);
        assert_eq!(collection.features.len(), 2);
        assert_eq!(collection.features[0].properties.as_ref().unwrap()["name"], "16th St");
        assert!(collection.features[1].properties.as_ref().unwrap().get("name").is_none());
    }
}

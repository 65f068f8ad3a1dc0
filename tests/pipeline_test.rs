use anyhow::Result;
use site_mapper::config::AppConfig;
use site_mapper::pipeline::{run_ranking, run_store_map};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const CENSUS: &str = "\
NBHD_ID,NBHD_NAME,NUM_HHLD_100K+,NUM_HOUSEHOLDS,AGE_18_TO_34,POPULATION_2010
1,Highland,40,100,50,200
2,Baker,,100,80,200
3,Capitol Hill,10,100,120,200
4,Sloan Lake,5,0,40,200
5,Union Station,90,100,150,200
6,Elyria,1,100,2,200
";

fn square(x: f64, y: f64) -> String {
    format!(
        "[[[{x0},{y0}],[{x1},{y0}],[{x1},{y1}],[{x0},{y1}],[{x0},{y0}]]]",
        x0 = x,
        y0 = y,
        x1 = x + 0.01,
        y1 = y + 0.01
    )
}

// Union Station (5) has no boundary; Sloan Lake (4) is rejected by the census loader.
fn boundaries() -> String {
    let features: Vec<String> = [(1, "Highland"), (2, "Baker"), (3, "Capitol Hill"), (4, "Sloan Lake"), (6, "Elyria")]
        .iter()
        .enumerate()
        .map(|(i, (id, name))| {
            format!(
                r#"{{"type":"Feature","properties":{{"NBHD_ID":{id},"NBHD_NAME":"{name}"}},"geometry":{{"type":"Polygon","coordinates":{coords}}}}}"#,
                id = id,
                name = name,
                coords = square(-105.0 + i as f64 * 0.02, 39.7)
            )
        })
        .collect();
    format!(r#"{{"type":"FeatureCollection","features":[{}]}}"#, features.join(","))
}

fn config_in(dir: &Path) -> Result<AppConfig> {
    fs::write(dir.join("census.csv"), CENSUS)?;
    fs::write(dir.join("neighborhoods.geojson"), boundaries())?;
    fs::write(
        dir.join("stores.csv"),
        "Name,Longitude,Latitude\nA,-104.995,39.705\nB,not-a-number,39.70\nC,-104.955,39.705\n",
    )?;

    let mut config = AppConfig::default();
    config.input.census_csv = dir.join("census.csv");
    config.input.boundaries = dir.join("neighborhoods.geojson");
    config.input.stores_csv = dir.join("stores.csv");
    config.input.icon = None;
    config.input.label_column = Some("Name".to_string());
    config.static_map.output = dir.join("static.png");
    config.static_map.width_in = 2.0;
    config.static_map.height_in = 2.0;
    config.static_map.dpi = 60;
    config.static_map.display = false;
    config.static_map.stores_html = Some(dir.join("stores.html"));
    config.choropleth.output = dir.join("top.html");
    Ok(config)
}

#[test]
fn ranking_skips_the_unjoined_leader() -> Result<()> {
    let dir = tempdir()?;
    let config = config_in(dir.path())?;

    // Scores: 1 -> 0.325, 2 -> 0.2, 3 -> 0.35, 5 -> 0.825, 6 -> 0.01
    let ranked = run_ranking(&config)?;
    let ids: Vec<&str> = ranked.iter().map(|r| r.scored.id.as_str()).collect();
    assert_eq!(ids, vec!["3", "1"]);
    assert_eq!(ranked[0].rank, 1);
    assert_eq!(ranked[0].color, "blue");
    assert_eq!(ranked[1].color, "green");

    let html = fs::read_to_string(&config.choropleth.output)?;
    assert!(html.contains("Capitol Hill"));
    assert!(html.contains("Highland"));
    assert!(!html.contains("Union Station"));
    assert!(!html.contains("Sloan Lake"));
    Ok(())
}

#[test]
fn ranking_is_idempotent() -> Result<()> {
    let dir = tempdir()?;
    let config = config_in(dir.path())?;

    let first: Vec<String> = run_ranking(&config)?.into_iter().map(|r| r.scored.id).collect();
    let second: Vec<String> = run_ranking(&config)?.into_iter().map(|r| r.scored.id).collect();
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn missing_boundary_file_aborts_ranking() -> Result<()> {
    let dir = tempdir()?;
    let mut config = config_in(dir.path())?;
    config.input.boundaries = dir.path().join("missing.shp");

    assert!(run_ranking(&config).is_err());
    assert!(!config.choropleth.output.exists());
    Ok(())
}

#[test]
fn store_map_drops_malformed_points() -> Result<()> {
    let dir = tempdir()?;
    let config = config_in(dir.path())?;

    let summary = run_store_map(&config)?;
    assert_eq!(summary.regions_drawn, 5);
    assert_eq!(summary.markers_drawn, 2);

    let img = image::open(&config.static_map.output)?.to_rgba8();
    assert_eq!((img.width(), img.height()), (120, 120));

    let html = fs::read_to_string(config.static_map.stores_html.as_ref().unwrap())?;
    assert_eq!(html.matches("\"Point\"").count(), 2);
    Ok(())
}

#[test]
fn store_map_survives_a_missing_viewer() -> Result<()> {
    let dir = tempdir()?;
    let mut config = config_in(dir.path())?;
    config.static_map.display = true;
    config.static_map.viewer = Some("/nonexistent/viewer".to_string());

    let summary = run_store_map(&config)?;
    assert_eq!(summary.markers_drawn, 2);
    assert!(config.static_map.output.exists());
    Ok(())
}

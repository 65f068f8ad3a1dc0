use crate::choropleth;
use crate::config::AppConfig;
use crate::data;
use crate::processing::{self, Palette};
use crate::render::{self, RenderSummary};
use crate::types::RankedRegion;
use anyhow::Result;
use tracing::info;

/// Stores over neighborhood boundaries: PNG, optional viewer, optional HTML.
pub fn run_store_map(config: &AppConfig) -> Result<RenderSummary> {
    let stores = data::load_store_locations(
        &config.input.stores_csv,
        config.input.label_column.as_deref(),
    )?;
    let regions = data::load_regions(&config.input.boundaries, &config.input.columns)?;

    let summary = render::render_static_map(
        &regions,
        &stores.locations,
        config.input.icon.as_deref(),
        &config.static_map,
        &config.static_map.output,
    )?;

    if let Some(html) = &config.static_map.stores_html {
        choropleth::render_store_markers(&stores.locations, &config.choropleth, html)?;
    }

    if config.static_map.display {
        render::display_image(&config.static_map.output, config.static_map.viewer.as_deref());
    }

    Ok(summary)
}

/// Scores neighborhoods, keeps the top K and writes the choropleth.
pub fn run_ranking(config: &AppConfig) -> Result<Vec<RankedRegion>> {
    let census = data::load_demographics(&config.input.census_csv, &config.input.columns)?;

    let scored = processing::score_all(&census);
    let top = processing::rank_top_k(scored, config.ranking.top_k);
    processing::log_ranking(&top);

    let regions = data::load_regions(&config.input.boundaries, &config.input.columns)?;
    let palette = Palette::from(&config.ranking);
    let ranked = processing::join_ranked(&top, &regions, &palette);
    info!("{} of {} ranked regions matched a boundary", ranked.len(), top.len());

    choropleth::render_choropleth(&ranked, &config.choropleth, &config.choropleth.output)?;
    Ok(ranked)
}

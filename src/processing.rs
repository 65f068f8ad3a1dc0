use crate::config::RankingConfig;
use crate::types::{DemographicRecord, RankedRegion, Region, ScoredRegion};
use std::collections::HashMap;
use tracing::{info, warn};

/// Rank-indexed colors with a fallback for ranks past the end.
#[derive(Debug, Clone)]
pub struct Palette {
    colors: Vec<String>,
    fallback: String,
}

impl Palette {
    pub fn new(colors: Vec<String>, fallback: impl Into<String>) -> Self {
        Self { colors, fallback: fallback.into() }
    }

    pub fn color_for_rank(&self, rank: usize) -> &str {
        self.colors.get(rank).map(String::as_str).unwrap_or(self.fallback.as_str())
    }
}

impl From<&RankingConfig> for Palette {
    fn from(config: &RankingConfig) -> Self {
        Palette::new(config.palette.clone(), config.fallback_color.clone())
    }
}

/// A missing affluent count scores as zero. A missing young-adult count has
/// no ratio, so the score is NaN and the row ranks below every scored row.
pub fn score_record(record: &DemographicRecord) -> ScoredRegion {
    let affluent = record.affluent_households.unwrap_or(0.0);
    let affluent_ratio = affluent / record.households;
    let young_adult_ratio = record.age_18_to_34.map_or(f64::NAN, |n| n / record.population);

    ScoredRegion {
        id: record.id.clone(),
        name: record.name.clone(),
        affluent_ratio,
        young_adult_ratio,
        score: (affluent_ratio + young_adult_ratio) / 2.0,
    }
}

pub fn score_all(records: &[DemographicRecord]) -> Vec<ScoredRegion> {
    records.iter().map(score_record).collect()
}

fn rank_key(score: f64) -> f64 {
    if score.is_nan() { f64::NEG_INFINITY } else { score }
}

/// Highest scores first; equal scores keep their input order and unscored
/// (NaN) rows come last.
pub fn rank_top_k(mut scored: Vec<ScoredRegion>, k: usize) -> Vec<ScoredRegion> {
    scored.sort_by(|a, b| rank_key(b.score).total_cmp(&rank_key(a.score)));
    scored.truncate(k);
    scored
}

/// Inner join of the ranked list against the boundaries, in rank order.
/// Ranked ids without a boundary are left out and reported.
pub fn join_ranked(top: &[ScoredRegion], regions: &[Region], palette: &Palette) -> Vec<RankedRegion> {
    let mut by_id: HashMap<&str, Vec<&Region>> = HashMap::new();
    for region in regions {
        by_id.entry(region.id.as_str()).or_default().push(region);
    }

    let mut merged = Vec::new();
    for (rank, scored) in top.iter().enumerate() {
        match by_id.get(scored.id.as_str()) {
            Some(matches) => {
                for region in matches {
                    merged.push(RankedRegion {
                        rank,
                        scored: scored.clone(),
                        region: (*region).clone(),
                        color: palette.color_for_rank(rank).to_string(),
                    });
                }
            }
            None => warn!(
                "Ranked region {} ({}) at rank {} has no boundary; it will not be drawn",
                scored.id,
                scored.name,
                rank + 1
            ),
        }
    }
    merged
}

pub fn log_ranking(top: &[ScoredRegion]) {
    info!("Top {} neighborhoods:", top.len());
    for (rank, region) in top.iter().enumerate() {
        info!(
            "  #{} {} ({}): affluent {:.4}, young adult {:.4}, score {:.4}",
            rank + 1,
            region.name,
            region.id,
            region.affluent_ratio,
            region.young_adult_ratio,
            region.score
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};

    fn scored(id: &str, score: f64) -> ScoredRegion {
        ScoredRegion {
            id: id.to_string(),
            name: format!("Region {}", id),
            affluent_ratio: score,
            young_adult_ratio: score,
            score,
        }
    }

    fn region(id: &str) -> Region {
        Region {
            id: id.to_string(),
            name: format!("Region {}", id),
            geometry: MultiPolygon::new(vec![polygon![
                (x: 0.0, y: 0.0),
                (x: 1.0, y: 0.0),
                (x: 1.0, y: 1.0),
                (x: 0.0, y: 0.0),
            ]]),
        }
    }

    fn default_palette() -> Palette {
        Palette::from(&RankingConfig::default())
    }

    #[test]
    fn missing_affluent_count_counts_as_zero() {
        let record = DemographicRecord {
            id: "1".into(),
            name: "Alpha".into(),
            affluent_households: None,
            households: 100.0,
            age_18_to_34: Some(20.0),
            population: 200.0,
        };
        let s = score_record(&record);
        assert_eq!(s.affluent_ratio, 0.0);
        assert!((s.young_adult_ratio - 0.1).abs() < 1e-12);
        assert!((s.score - 0.05).abs() < 1e-12);
    }

    #[test]
    fn score_is_mean_of_ratios() {
        let record = DemographicRecord {
            id: "2".into(),
            name: "Beta".into(),
            affluent_households: Some(50.0),
            households: 100.0,
            age_18_to_34: Some(30.0),
            population: 100.0,
        };
        let s = score_record(&record);
        assert!((s.affluent_ratio - 0.5).abs() < 1e-12);
        assert!((s.young_adult_ratio - 0.3).abs() < 1e-12);
        assert!((s.score - 0.4).abs() < 1e-12);
    }

    #[test]
    fn missing_young_adult_count_ranks_last() {
        let record = DemographicRecord {
            id: "9".into(),
            name: "Gamma".into(),
            affluent_households: Some(90.0),
            households: 100.0,
            age_18_to_34: None,
            population: 100.0,
        };
        let unscored = score_record(&record);
        assert!(unscored.score.is_nan());

        let input = vec![unscored.clone(), scored("a", 0.1), scored("b", 0.0), scored("c", 0.4)];
        let top = rank_top_k(input.clone(), 3);
        let ids: Vec<&str> = top.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);

        let all = rank_top_k(input, 10);
        assert_eq!(all.last().map(|s| s.id.as_str()), Some("9"));
    }

    #[test]
    fn top_three_in_descending_order() {
        let input = vec![scored("a", 0.9), scored("b", 0.5), scored("c", 0.7), scored("d", 0.3)];
        let top = rank_top_k(input, 3);
        let scores: Vec<f64> = top.iter().map(|s| s.score).collect();
        assert_eq!(scores, vec![0.9, 0.7, 0.5]);
    }

    #[test]
    fn ties_keep_input_order() {
        let input = vec![scored("a", 0.5), scored("b", 0.8), scored("c", 0.5), scored("d", 0.5)];
        let top = rank_top_k(input, 3);
        let ids: Vec<&str> = top.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn ranking_is_repeatable() {
        let input = vec![scored("a", 0.2), scored("b", 0.2), scored("c", 0.9), scored("d", 0.4)];
        let first = rank_top_k(input.clone(), 3);
        let second = rank_top_k(input, 3);
        assert_eq!(first, second);
    }

    #[test]
    fn fewer_rows_than_k() {
        let top = rank_top_k(vec![scored("a", 0.1)], 3);
        assert_eq!(top.len(), 1);
    }

    #[test]
    fn join_miss_excludes_only_the_missing_region() {
        let top = vec![scored("x", 0.9), scored("b", 0.7), scored("c", 0.5)];
        let regions = vec![region("c"), region("a"), region("b")];

        let merged = join_ranked(&top, &regions, &default_palette());
        let ids: Vec<&str> = merged.iter().map(|r| r.scored.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert_eq!(merged[0].rank, 1);
        assert_eq!(merged[0].color, "blue");
        assert_eq!(merged[1].color, "green");
    }

    #[test]
    fn join_with_no_boundaries_is_empty_not_an_error() {
        let top = vec![scored("a", 0.9)];
        assert!(join_ranked(&top, &[], &default_palette()).is_empty());
    }

    #[test]
    fn palette_colors_by_rank_with_gray_fallback() {
        let palette = default_palette();
        assert_eq!(palette.color_for_rank(0), "red");
        assert_eq!(palette.color_for_rank(1), "blue");
        assert_eq!(palette.color_for_rank(2), "green");
        assert_eq!(palette.color_for_rank(3), "gray");
        assert_eq!(palette.color_for_rank(42), "gray");
    }
}

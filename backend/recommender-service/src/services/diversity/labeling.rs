use super::point;
use crate::models::{DiverseItem, PreferenceItem, SelectionTag};
use crate::utils::{median, min_max, scale_value};

/// Rescale both score axes jointly onto `[lo, hi]` and mark each point as
/// above (1) or below (0) the mean of the two medians.
pub fn scale_and_label(items: &[DiverseItem], lo: f64, hi: f64) -> Vec<PreferenceItem> {
    if items.is_empty() {
        return Vec::new();
    }

    let points: Vec<[f64; 2]> = items.iter().map(|d| point(&d.candidate)).collect();
    let all_values: Vec<f64> = points.iter().flat_map(|p| p.iter().copied()).collect();
    let (cur_min, cur_max) = min_max(&all_values).unwrap_or((lo, hi));

    let scaled: Vec<[f64; 2]> = points
        .iter()
        .map(|p| {
            [
                scale_value(p[0], lo, hi, cur_min, cur_max),
                scale_value(p[1], lo, hi, cur_min, cur_max),
            ]
        })
        .collect();

    let user_scores: Vec<f64> = scaled.iter().map(|p| p[0]).collect();
    let community_scores: Vec<f64> = scaled.iter().map(|p| p[1]).collect();
    let threshold = match (median(&user_scores), median(&community_scores)) {
        (Some(u), Some(c)) => (u + c) / 2.0,
        _ => lo + (hi - lo) / 2.0,
    };

    items
        .iter()
        .zip(scaled)
        .map(|(item, [user_score, community_score])| PreferenceItem {
            item_id: item.candidate.item_id,
            community_score,
            user_score,
            community_label: label(community_score, threshold),
            user_label: label(user_score, threshold),
            cluster: match item.tag {
                SelectionTag::Cluster(id) => id as i32,
                _ => 0,
            },
        })
        .collect()
}

fn label(score: f64, threshold: f64) -> i32 {
    if score >= threshold {
        1
    } else {
        0
    }
}

use super::{point, Point};
use crate::models::{CandidateItem, DiverseItem, SelectionTag};

fn cross(o: Point, a: Point, b: Point) -> f64 {
    (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
}

/// Candidates on the convex hull of the score plane, counter-clockwise from
/// the lowest user score. With fewer than three points or a collinear cloud
/// every candidate is returned.
pub fn convex_hull(candidates: &[CandidateItem]) -> Vec<DiverseItem> {
    let all = || {
        candidates
            .iter()
            .map(|c| DiverseItem {
                candidate: c.clone(),
                tag: SelectionTag::Hull,
            })
            .collect::<Vec<_>>()
    };
    if candidates.len() < 3 {
        return all();
    }

    let points: Vec<Point> = candidates.iter().map(point).collect();
    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by(|&a, &b| {
        points[a][0]
            .total_cmp(&points[b][0])
            .then_with(|| points[a][1].total_cmp(&points[b][1]))
            .then_with(|| a.cmp(&b))
    });
    order.dedup_by(|a, b| points[*a] == points[*b]);

    // Andrew's monotone chain
    let mut hull: Vec<usize> = Vec::with_capacity(2 * order.len());
    for &idx in &order {
        while hull.len() >= 2
            && cross(points[hull[hull.len() - 2]], points[hull[hull.len() - 1]], points[idx]) <= 0.0
        {
            hull.pop();
        }
        hull.push(idx);
    }
    let lower_len = hull.len() + 1;
    for &idx in order.iter().rev().skip(1) {
        while hull.len() >= lower_len
            && cross(points[hull[hull.len() - 2]], points[hull[hull.len() - 1]], points[idx]) <= 0.0
        {
            hull.pop();
        }
        hull.push(idx);
    }
    hull.pop();

    if hull.len() < 3 {
        return all();
    }

    hull.into_iter()
        .map(|idx| DiverseItem {
            candidate: candidates[idx].clone(),
            tag: SelectionTag::Hull,
        })
        .collect()
}

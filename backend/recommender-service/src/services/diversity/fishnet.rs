use super::{point, Point};
use crate::models::{CandidateItem, DiverseItem, DistanceNorm, SelectionTag};

/// Evenly spaced ticks across `[lo, hi]`, both ends included; a single tick
/// sits at the midpoint.
pub(crate) fn grid_ticks(side: usize, lo: f64, hi: f64) -> Vec<f64> {
    match side {
        0 => Vec::new(),
        1 => vec![lo + (hi - lo) / 2.0],
        _ => (0..side)
            .map(|i| lo + i as f64 * (hi - lo) / (side - 1) as f64)
            .collect(),
    }
}

/// Lay a ⌈√n⌉×⌈√n⌉ net over the score plane and pull the nearest free
/// candidate (L1) toward each knot in row-major order.
pub fn fishnet(candidates: &[CandidateItem], n: usize, lo: f64, hi: f64) -> Vec<DiverseItem> {
    if candidates.is_empty() || n == 0 {
        return Vec::new();
    }

    let side = (n as f64).sqrt().ceil() as usize;
    let ticks = grid_ticks(side, lo, hi);
    let points: Vec<Point> = candidates.iter().map(point).collect();
    let mut taken = vec![false; candidates.len()];
    let mut selected = Vec::with_capacity(n.min(candidates.len()));

    'grid: for (row, &x) in ticks.iter().enumerate() {
        for (col, &y) in ticks.iter().enumerate() {
            if selected.len() >= n {
                break 'grid;
            }
            let knot = [x, y];
            let nearest = points
                .iter()
                .enumerate()
                .filter(|(idx, _)| !taken[*idx])
                .map(|(idx, p)| (idx, DistanceNorm::L1.distance(p, &knot)))
                .fold(None, |best: Option<(usize, f64)>, (idx, dist)| match best {
                    Some((_, best_dist)) if best_dist <= dist => best,
                    _ => Some((idx, dist)),
                });

            let Some((idx, _)) = nearest else {
                break 'grid;
            };
            taken[idx] = true;
            selected.push(DiverseItem {
                candidate: candidates[idx].clone(),
                tag: SelectionTag::GridCell { row, col },
            });
        }
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::diversity::tests::candidate;
    use std::collections::HashSet;

    #[test]
    fn test_grid_ticks() {
        assert_eq!(grid_ticks(1, 1.0, 5.0), vec![3.0]);
        assert_eq!(grid_ticks(2, 1.0, 5.0), vec![1.0, 5.0]);
        assert_eq!(grid_ticks(3, 1.0, 5.0), vec![1.0, 3.0, 5.0]);
    }

    #[test]
    fn test_four_points_four_slots() {
        let candidates = vec![
            candidate(1, 1.2, 1.1),
            candidate(2, 1.0, 4.8),
            candidate(3, 4.9, 1.3),
            candidate(4, 4.7, 4.6),
        ];

        let selected = fishnet(&candidates, 4, 1.0, 5.0);
        let ids: Vec<i64> = selected.iter().map(|d| d.candidate.item_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(selected[3].tag, SelectionTag::GridCell { row: 1, col: 1 });
    }

    #[test]
    fn test_bounded_and_unique() {
        let candidates: Vec<CandidateItem> = (0..30)
            .map(|i| candidate(i, 1.0 + (i % 5) as f64 * 0.9, 1.0 + (i % 7) as f64 * 0.6))
            .collect();

        for n in [1, 5, 9, 30, 50] {
            let selected = fishnet(&candidates, n, 1.0, 5.0);
            assert_eq!(selected.len(), n.min(candidates.len()));
            let unique: HashSet<i64> = selected.iter().map(|d| d.candidate.item_id).collect();
            assert_eq!(unique.len(), selected.len());
        }
    }

    #[test]
    fn test_ties_go_to_earlier_candidate() {
        let candidates = vec![candidate(7, 3.0, 3.0), candidate(8, 3.0, 3.0)];
        let selected = fishnet(&candidates, 1, 1.0, 5.0);
        assert_eq!(selected[0].candidate.item_id, 7);
    }

    #[test]
    fn test_empty_pool() {
        assert!(fishnet(&[], 4, 1.0, 5.0).is_empty());
    }
}

pub mod fishnet;
pub mod hull;
pub mod labeling;
pub mod linkage;

pub use fishnet::fishnet;
pub use hull::convex_hull;
pub use labeling::scale_and_label;
pub use linkage::single_linkage;

use crate::models::{CandidateItem, DiverseItem, DistanceNorm, DiversityAlgorithm, ItemId, SelectionTag};
use crate::services::scoring::by_score_desc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashSet;
use tracing::debug;

pub(crate) type Point = [f64; 2];

/// `(user score, community score)` of a candidate.
pub(crate) fn point(candidate: &CandidateItem) -> Point {
    [
        candidate.raw_score,
        candidate.community_baseline.unwrap_or(f64::NAN),
    ]
}

/// Picks spread-out subsets of the user-vs-community score plane.
#[derive(Debug, Clone, Copy)]
pub struct DiversitySampler {
    scale_min: f64,
    scale_max: f64,
    norm: DistanceNorm,
    intermediate_size: usize,
}

impl DiversitySampler {
    pub fn new(intermediate_size: usize) -> Self {
        Self {
            scale_min: 1.0,
            scale_max: 5.0,
            norm: DistanceNorm::L1,
            intermediate_size,
        }
    }

    /// Run `algorithm` over the candidates that carry a community baseline.
    pub fn sample(
        &self,
        algorithm: DiversityAlgorithm,
        candidates: Vec<CandidateItem>,
        n: usize,
        seed: u64,
    ) -> Vec<DiverseItem> {
        let candidates: Vec<CandidateItem> = candidates
            .into_iter()
            .filter(|c| c.community_baseline.map_or(false, f64::is_finite) && c.raw_score.is_finite())
            .collect();
        debug!(?algorithm, pool = candidates.len(), n, "Diversifying candidates");

        match algorithm {
            DiversityAlgorithm::Fishnet => self.grid_greedy(&candidates, n),
            DiversityAlgorithm::SingleLinkage => self.single_linkage(&candidates, n),
            DiversityAlgorithm::StratifiedSingleLinkage => {
                let pool = stratified_sample(&candidates, self.intermediate_size);
                self.single_linkage(&pool, n)
            }
            DiversityAlgorithm::FishnetSingleLinkage => {
                self.grid_then_linkage(&candidates, self.intermediate_size, n)
            }
            DiversityAlgorithm::ConvexHull => convex_hull(&candidates),
            DiversityAlgorithm::Random => random_sample(&candidates, n, seed),
            DiversityAlgorithm::Top => top(&candidates, n),
        }
    }

    pub fn grid_greedy(&self, candidates: &[CandidateItem], n: usize) -> Vec<DiverseItem> {
        fishnet(candidates, n, self.scale_min, self.scale_max)
    }

    pub fn single_linkage(&self, candidates: &[CandidateItem], k: usize) -> Vec<DiverseItem> {
        single_linkage(candidates, k, self.norm)
    }

    /// Fishnet down to `intermediate`, then cluster to `n`.
    pub fn grid_then_linkage(&self, candidates: &[CandidateItem], intermediate: usize, n: usize) -> Vec<DiverseItem> {
        let netted: Vec<CandidateItem> = self
            .grid_greedy(candidates, intermediate.max(n))
            .into_iter()
            .map(|d| d.candidate)
            .collect();
        self.single_linkage(&netted, n)
    }

    pub fn scale_min(&self) -> f64 {
        self.scale_min
    }

    pub fn scale_max(&self) -> f64 {
        self.scale_max
    }
}

impl Default for DiversitySampler {
    fn default() -> Self {
        Self::new(500)
    }
}

/// Top, middle and bottom slices by user score, each `min(init, len / 3)` long.
pub fn stratified_sample(candidates: &[CandidateItem], init: usize) -> Vec<CandidateItem> {
    let mut ranked = candidates.to_vec();
    ranked.sort_by(|a, b| by_score_desc(a.raw_score, b.raw_score, a.item_id, b.item_id));

    let len = ranked.len();
    let size = init.min(len / 3);
    if size == 0 {
        return ranked;
    }

    let mid_start = len / 2 - size / 2;
    let slices = [
        &ranked[..size],
        &ranked[mid_start..mid_start + size],
        &ranked[len - size..],
    ];

    let mut seen: HashSet<ItemId> = HashSet::new();
    slices
        .iter()
        .flat_map(|slice| slice.iter())
        .filter(|c| seen.insert(c.item_id))
        .cloned()
        .collect()
}

/// Seeded uniform sample without replacement.
pub fn random_sample(candidates: &[CandidateItem], n: usize, seed: u64) -> Vec<DiverseItem> {
    let mut rng = StdRng::seed_from_u64(seed);
    candidates
        .choose_multiple(&mut rng, n.min(candidates.len()))
        .map(|c| DiverseItem {
            candidate: c.clone(),
            tag: SelectionTag::Unassigned,
        })
        .collect()
}

pub fn top(candidates: &[CandidateItem], n: usize) -> Vec<DiverseItem> {
    let mut ranked = candidates.to_vec();
    ranked.sort_by(|a, b| by_score_desc(a.raw_score, b.raw_score, a.item_id, b.item_id));
    ranked
        .into_iter()
        .take(n)
        .map(|candidate| DiverseItem {
            candidate,
            tag: SelectionTag::Unassigned,
        })
        .collect()
}

use super::{EmotionCandidate, EmotionTuner};
use crate::models::{DistanceNorm, EmotionTag};

impl EmotionTuner {
    /// Farthest-first selection over the given tags: start from the item
    /// nearest the centroid, then keep adding the item with the largest summed
    /// distance to everything already picked.
    pub fn diversify(
        &self,
        candidates: Vec<EmotionCandidate>,
        tags: &[EmotionTag],
        sampling_size: usize,
    ) -> Vec<EmotionCandidate> {
        if candidates.is_empty() || sampling_size == 0 {
            return Vec::new();
        }

        let vectors: Vec<Vec<f64>> = candidates.iter().map(|c| c.restricted(tags)).collect();
        let count = vectors.len() as f64;
        let centroid: Vec<f64> = (0..tags.len())
            .map(|col| vectors.iter().map(|v| v[col]).sum::<f64>() / count)
            .collect();

        let seed = argmin(vectors.iter().map(|v| DistanceNorm::L1.distance(v, &centroid)));
        let mut selected = vec![seed];
        let mut picked = vec![false; vectors.len()];
        picked[seed] = true;

        let mut summed: Vec<f64> = vectors
            .iter()
            .map(|v| self.norm.distance(v, &vectors[seed]))
            .collect();

        while selected.len() < sampling_size.min(vectors.len()) {
            let next = summed
                .iter()
                .enumerate()
                .filter(|(idx, _)| !picked[*idx])
                .fold(None, |best: Option<(usize, f64)>, (idx, &dist)| match best {
                    Some((_, best_dist)) if best_dist >= dist => best,
                    _ => Some((idx, dist)),
                });
            let Some((next, _)) = next else {
                break;
            };

            picked[next] = true;
            selected.push(next);
            for (idx, total) in summed.iter_mut().enumerate() {
                if !picked[idx] {
                    *total += self.norm.distance(&vectors[idx], &vectors[next]);
                }
            }
        }

        let mut slots: Vec<Option<EmotionCandidate>> = candidates.into_iter().map(Some).collect();
        selected
            .into_iter()
            .filter_map(|idx| slots[idx].take())
            .collect()
    }
}

fn argmin(values: impl Iterator<Item = f64>) -> usize {
    values
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (idx, value)| match best {
            Some((_, best_value)) if best_value <= value => best,
            _ => Some((idx, value)),
        })
        .map_or(0, |(idx, _)| idx)
}

use crate::error::{EngineError, Result};
use ndarray::ArrayView2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};

const MAX_LEVEL: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HnswParams {
    pub m: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
    pub seed: u64,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 64,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Node {
    /// neighbor ids per layer, layer 0 first
    links: Vec<Vec<usize>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Scored {
    dist: f64,
    idx: usize,
}

impl Eq for Scored {}

impl Ord for Scored {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist
            .total_cmp(&other.dist)
            .then_with(|| self.idx.cmp(&other.idx))
    }
}

impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Angular (cosine) HNSW graph over the rows of a user-factor matrix.
///
/// Vectors are stored unit-normalized so the distance `1 - cos` reduces to
/// `1 - a·b`. Built with a seeded RNG, so the same input always produces the
/// same graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AngularIndex {
    params: HnswParams,
    dim: usize,
    vectors: Vec<Vec<f64>>,
    nodes: Vec<Node>,
    entry_point: Option<usize>,
    max_layer: usize,
}

impl AngularIndex {
    pub fn build(rows: ArrayView2<'_, f64>, params: HnswParams) -> Self {
        let mut index = Self {
            params,
            dim: rows.ncols(),
            vectors: rows.outer_iter().map(|row| unit(row.to_vec())).collect(),
            nodes: Vec::with_capacity(rows.nrows()),
            entry_point: None,
            max_layer: 0,
        };

        let mut rng = StdRng::seed_from_u64(params.seed);
        let ml = 1.0 / (params.m.max(2) as f64).ln();
        for idx in 0..index.vectors.len() {
            let uniform: f64 = 1.0 - rng.gen::<f64>();
            let level = ((-uniform.ln() * ml).floor() as usize).min(MAX_LEVEL);
            index.insert(idx, level);
        }
        index
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Structural check for a decoded index: every link, the entry point
    /// and every stored vector must fit the population, so that a search
    /// never indexes out of range.
    pub fn validate(&self) -> Result<()> {
        let len = self.vectors.len();
        let corrupt = |detail: String| Err(EngineError::ModelLoad(format!("corrupt user index: {detail}")));

        if self.nodes.len() != len {
            return corrupt(format!("{} graph nodes for {} vectors", self.nodes.len(), len));
        }
        if let Some(row) = self.vectors.iter().position(|v| v.len() != self.dim) {
            return corrupt(format!("vector {row} has length {}, expected {}", self.vectors[row].len(), self.dim));
        }
        match self.entry_point {
            Some(entry) if entry >= len => return corrupt(format!("entry point {entry} out of range")),
            Some(entry) if self.nodes[entry].links.len() != self.max_layer + 1 => {
                return corrupt(format!("entry point {entry} does not reach layer {}", self.max_layer));
            }
            None if len > 0 => return corrupt("missing entry point".to_string()),
            _ => {}
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            if node.links.len() > self.max_layer + 1 {
                return corrupt(format!("node {idx} has {} layers, max is {}", node.links.len(), self.max_layer + 1));
            }
            if let Some(link) = node.links.iter().flatten().find(|&&link| link >= len) {
                return corrupt(format!("node {idx} links to missing node {link}"));
            }
        }
        Ok(())
    }

    /// The `k` nearest rows to `query` as `(row, distance)`, ascending.
    /// Falls back to an exact scan when the graph walk comes up short.
    pub fn search(&self, query: &[f64], k: usize) -> Vec<(usize, f64)> {
        let wanted = k.min(self.len());
        if wanted == 0 {
            return Vec::new();
        }
        let query = unit(query.to_vec());

        let found = match self.entry_point {
            Some(entry) => {
                let mut ep = vec![entry];
                for layer in (1..=self.max_layer).rev() {
                    ep = self
                        .search_layer(&query, &ep, 1, layer)
                        .into_iter()
                        .map(|s| s.idx)
                        .collect();
                }
                self.search_layer(&query, &ep, self.params.ef_search.max(wanted), 0)
            }
            None => Vec::new(),
        };

        if found.len() < wanted {
            return self.exact_search(&query, wanted);
        }

        found
            .into_iter()
            .take(wanted)
            .map(|s| (s.idx, s.dist))
            .collect()
    }

    /// Brute-force scan, exact but linear in the population.
    pub fn exact_search(&self, query: &[f64], k: usize) -> Vec<(usize, f64)> {
        let query = unit(query.to_vec());
        let mut scored: Vec<Scored> = (0..self.len())
            .map(|idx| Scored {
                dist: self.distance(&query, idx),
                idx,
            })
            .collect();
        scored.sort();
        scored
            .into_iter()
            .take(k)
            .map(|s| (s.idx, s.dist))
            .collect()
    }

    fn insert(&mut self, idx: usize, level: usize) {
        self.nodes.push(Node {
            links: vec![Vec::new(); level + 1],
        });

        let Some(entry) = self.entry_point else {
            self.entry_point = Some(idx);
            self.max_layer = level;
            return;
        };

        let query = self.vectors[idx].clone();
        let mut ep = vec![entry];
        for layer in (level + 1..=self.max_layer).rev() {
            ep = self
                .search_layer(&query, &ep, 1, layer)
                .into_iter()
                .map(|s| s.idx)
                .collect();
        }

        for layer in (0..=level.min(self.max_layer)).rev() {
            let found = self.search_layer(&query, &ep, self.params.ef_construction, layer);
            let max_links = self.max_links(layer);
            let neighbors: Vec<usize> = found.iter().take(max_links).map(|s| s.idx).collect();

            self.nodes[idx].links[layer] = neighbors.clone();
            for &neighbor in &neighbors {
                self.nodes[neighbor].links[layer].push(idx);
                if self.nodes[neighbor].links[layer].len() > max_links {
                    self.prune(neighbor, layer, max_links);
                }
            }

            ep = found.into_iter().map(|s| s.idx).collect();
        }

        if level > self.max_layer {
            self.entry_point = Some(idx);
            self.max_layer = level;
        }
    }

    fn prune(&mut self, node: usize, layer: usize, max_links: usize) {
        let base = &self.vectors[node];
        let mut scored: Vec<Scored> = self.nodes[node].links[layer]
            .iter()
            .map(|&idx| Scored {
                dist: self.distance(base, idx),
                idx,
            })
            .collect();
        scored.sort();
        scored.truncate(max_links);
        self.nodes[node].links[layer] = scored.into_iter().map(|s| s.idx).collect();
    }

    /// Greedy best-first walk of one layer; returns up to `ef` hits ascending.
    fn search_layer(&self, query: &[f64], entry_points: &[usize], ef: usize, layer: usize) -> Vec<Scored> {
        let ef = ef.max(1);
        let mut visited: HashSet<usize> = HashSet::new();
        let mut candidates: BinaryHeap<Reverse<Scored>> = BinaryHeap::new();
        let mut results: BinaryHeap<Scored> = BinaryHeap::new();

        for &ep in entry_points {
            if visited.insert(ep) {
                let scored = Scored {
                    dist: self.distance(query, ep),
                    idx: ep,
                };
                candidates.push(Reverse(scored));
                results.push(scored);
                if results.len() > ef {
                    results.pop();
                }
            }
        }

        while let Some(Reverse(current)) = candidates.pop() {
            if let Some(worst) = results.peek() {
                if results.len() >= ef && current.dist > worst.dist {
                    break;
                }
            }

            let Some(links) = self.nodes[current.idx].links.get(layer) else {
                continue;
            };
            for &neighbor in links {
                if !visited.insert(neighbor) {
                    continue;
                }
                let scored = Scored {
                    dist: self.distance(query, neighbor),
                    idx: neighbor,
                };
                let admit = results.len() < ef
                    || results.peek().map_or(true, |worst| scored.dist < worst.dist);
                if admit {
                    candidates.push(Reverse(scored));
                    results.push(scored);
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        results.into_sorted_vec()
    }

    fn max_links(&self, layer: usize) -> usize {
        if layer == 0 {
            self.params.m * 2
        } else {
            self.params.m
        }
    }

    fn distance(&self, query: &[f64], idx: usize) -> f64 {
        let dot: f64 = query.iter().zip(&self.vectors[idx]).map(|(a, b)| a * b).sum();
        1.0 - dot
    }
}

fn unit(mut v: Vec<f64>) -> Vec<f64> {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > f64::EPSILON {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}

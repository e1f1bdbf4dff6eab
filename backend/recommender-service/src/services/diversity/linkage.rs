use super::{point, Point};
use crate::models::{CandidateItem, DiverseItem, DistanceNorm, SelectionTag};
use petgraph::algo::min_spanning_tree;
use petgraph::data::Element;
use petgraph::graph::UnGraph;
use petgraph::unionfind::UnionFind;

/// Single-linkage clustering by cutting the heaviest edges of the minimum
/// spanning tree; one representative per cluster, nearest to its centroid.
pub fn single_linkage(candidates: &[CandidateItem], k: usize, norm: DistanceNorm) -> Vec<DiverseItem> {
    if candidates.is_empty() || k == 0 {
        return Vec::new();
    }
    let points: Vec<Point> = candidates.iter().map(point).collect();

    let mut edges = spanning_edges(&points, norm);
    edges.sort_by(|x, y| y.2.total_cmp(&x.2).then_with(|| (x.0, x.1).cmp(&(y.0, y.1))));
    let cut = (k - 1).min(edges.len());

    let mut components = UnionFind::<usize>::new(points.len());
    for &(a, b, _) in &edges[cut..] {
        components.union(a, b);
    }

    // clusters numbered by their first member
    let mut cluster_of_root: Vec<Option<usize>> = vec![None; points.len()];
    let mut clusters: Vec<Vec<usize>> = Vec::new();
    for idx in 0..points.len() {
        let root = components.find_mut(idx);
        let cluster = *cluster_of_root[root].get_or_insert_with(|| {
            clusters.push(Vec::new());
            clusters.len() - 1
        });
        clusters[cluster].push(idx);
    }

    clusters
        .iter()
        .enumerate()
        .map(|(cluster, members)| {
            let representative = nearest_to_centroid(&points, members);
            DiverseItem {
                candidate: candidates[representative].clone(),
                tag: SelectionTag::Cluster(cluster + 1),
            }
        })
        .collect()
}

/// Minimum spanning tree of the complete distance graph as `(a, b, weight)`.
fn spanning_edges(points: &[Point], norm: DistanceNorm) -> Vec<(usize, usize, f64)> {
    let mut graph = UnGraph::<usize, f64>::with_capacity(points.len(), points.len() * points.len() / 2);
    let nodes: Vec<_> = (0..points.len()).map(|idx| graph.add_node(idx)).collect();
    for a in 0..points.len() {
        for b in (a + 1)..points.len() {
            graph.add_edge(nodes[a], nodes[b], norm.distance(&points[a], &points[b]));
        }
    }

    min_spanning_tree(&graph)
        .filter_map(|element| match element {
            Element::Edge { source, target, weight, .. } => Some((source.min(target), source.max(target), weight)),
            Element::Node { .. } => None,
        })
        .collect()
}

fn nearest_to_centroid(points: &[Point], members: &[usize]) -> usize {
    let count = members.len() as f64;
    let centroid = [
        members.iter().map(|&m| points[m][0]).sum::<f64>() / count,
        members.iter().map(|&m| points[m][1]).sum::<f64>() / count,
    ];
    members
        .iter()
        .copied()
        .min_by(|&x, &y| {
            DistanceNorm::L1
                .distance(&points[x], &centroid)
                .total_cmp(&DistanceNorm::L1.distance(&points[y], &centroid))
                .then_with(|| x.cmp(&y))
        })
        .unwrap_or(members[0])
}

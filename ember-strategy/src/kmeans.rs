//! MinMax normalization + Lloyd's k-means (§4.7, §5 "must run in a worker
//! thread; never on the main task"). Grounded in
//! `portfolio/_strategy.py`'s `sklearn.cluster.KMeans` +
//! `MinMaxScaler` pipeline, reimplemented directly since the workspace
//! carries no ML crate and the algorithm itself is a few dozen lines.
//!
//! `sklearn.cluster.KMeans` assigns cluster labels in an order that has no
//! defined relationship to cluster quality; so does this module's
//! deterministic first-`k`-rows seeding — label `i` just means "whatever
//! fell near the `i`-th seed row". `StrategyStorage::get_top` sorts
//! descending by `(cluster_id, vector[0])`, so a label order that tracked
//! insertion order rather than performance would rank the *last-inserted*
//! distinct strategy highest regardless of how it performed. `kmeans`
//! therefore re-labels clusters after Lloyd's algorithm converges, by
//! ascending mean first-coordinate (`vector[0]`, i.e. total return) across
//! each cluster's members, so label `k-1` is always the best-performing
//! cluster and label `0` the worst — see DESIGN.md's Open Question entry.

/// Scales each column independently into `[0, 1]`. A column with zero
/// spread (every value identical) maps to `0.0` rather than dividing by
/// zero — it carries no separating signal for clustering either way.
pub fn minmax_normalize(data: &[Vec<f64>]) -> Vec<Vec<f64>> {
    if data.is_empty() {
        return Vec::new();
    }
    let dims = data[0].len();
    let mut min = vec![f64::INFINITY; dims];
    let mut max = vec![f64::NEG_INFINITY; dims];
    for row in data {
        for (d, &v) in row.iter().enumerate() {
            if v < min[d] {
                min[d] = v;
            }
            if v > max[d] {
                max[d] = v;
            }
        }
    }

    data.iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .map(|(d, &v)| {
                    let spread = max[d] - min[d];
                    if spread == 0.0 {
                        0.0
                    } else {
                        (v - min[d]) / spread
                    }
                })
                .collect()
        })
        .collect()
}

fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

fn nearest_centroid(point: &[f64], centroids: &[Vec<f64>]) -> usize {
    centroids
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            euclidean_distance(point, a)
                .partial_cmp(&euclidean_distance(point, b))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

fn centroid_of(points: &[&Vec<f64>], dims: usize) -> Vec<f64> {
    let mut sum = vec![0.0; dims];
    for p in points {
        for (d, &v) in p.iter().enumerate() {
            sum[d] += v;
        }
    }
    let n = points.len() as f64;
    sum.iter().map(|s| s / n).collect()
}

/// Lloyd's algorithm with deterministic seeding (the first `k` rows are
/// the initial centroids) so clustering is reproducible for a given
/// insertion order, matching `StrategyStorage`'s "ties broken by
/// insertion order" contract downstream in `get_top`. `k` is clamped to
/// `data.len()` (`KMeans(n_clusters=k)` would otherwise error on sklearn's
/// side too). The raw Lloyd's-algorithm labels are then re-ranked by
/// ascending cluster-mean first coordinate via [`rerank_by_first_coordinate`]
/// before returning, so the returned label order reflects performance
/// rather than seed-row position.
pub fn kmeans(data: &[Vec<f64>], k: usize, max_iterations: usize) -> Vec<usize> {
    if data.is_empty() || k == 0 {
        return Vec::new();
    }
    let k = k.min(data.len());
    let dims = data[0].len();
    let mut centroids: Vec<Vec<f64>> = data[..k].to_vec();
    let mut assignments = vec![0usize; data.len()];

    for _ in 0..max_iterations {
        let new_assignments: Vec<usize> = data.iter().map(|p| nearest_centroid(p, &centroids)).collect();
        let converged = new_assignments == assignments;
        assignments = new_assignments;
        if converged {
            break;
        }

        for (cluster_id, centroid) in centroids.iter_mut().enumerate() {
            let members: Vec<&Vec<f64>> = data
                .iter()
                .zip(assignments.iter())
                .filter(|(_, &c)| c == cluster_id)
                .map(|(p, _)| p)
                .collect();
            if !members.is_empty() {
                *centroid = centroid_of(&members, dims);
            }
        }
    }

    rerank_by_first_coordinate(data, &assignments, k)
}

/// Re-labels raw cluster assignments so label ordering tracks performance:
/// clusters are ranked ascending by the mean of their members' first
/// coordinate (`vector[0]`), and each point's label is replaced by its
/// cluster's rank (`0` = lowest-mean cluster, `k-1` = highest-mean
/// cluster). A cluster with no members (possible when `k > ` the number of
/// distinct positions Lloyd's algorithm actually separates) sorts lowest,
/// since an empty cluster carries no performance signal. Ties broken by
/// the raw cluster index, keeping re-labeling itself deterministic.
fn rerank_by_first_coordinate(data: &[Vec<f64>], assignments: &[usize], k: usize) -> Vec<usize> {
    let mut sums = vec![0.0f64; k];
    let mut counts = vec![0usize; k];
    for (point, &cluster) in data.iter().zip(assignments.iter()) {
        sums[cluster] += point[0];
        counts[cluster] += 1;
    }
    let means: Vec<f64> = (0..k)
        .map(|c| if counts[c] > 0 { sums[c] / counts[c] as f64 } else { f64::NEG_INFINITY })
        .collect();

    let mut by_mean_ascending: Vec<usize> = (0..k).collect();
    by_mean_ascending.sort_by(|&a, &b| {
        means[a]
            .partial_cmp(&means[b])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });

    let mut rank_of_cluster = vec![0usize; k];
    for (rank, &cluster) in by_mean_ascending.iter().enumerate() {
        rank_of_cluster[cluster] = rank;
    }

    assignments.iter().map(|&c| rank_of_cluster[c]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minmax_normalize_scales_into_unit_range() {
        let data = vec![vec![0.0, 10.0], vec![5.0, 20.0], vec![10.0, 30.0]];
        let normalized = minmax_normalize(&data);
        assert_eq!(normalized[0], vec![0.0, 0.0]);
        assert_eq!(normalized[2], vec![1.0, 1.0]);
        assert_eq!(normalized[1], vec![0.5, 0.5]);
    }

    #[test]
    fn minmax_normalize_handles_zero_spread_column() {
        let data = vec![vec![3.0, 1.0], vec![3.0, 2.0]];
        let normalized = minmax_normalize(&data);
        assert_eq!(normalized[0][0], 0.0);
        assert_eq!(normalized[1][0], 0.0);
    }

    #[test]
    fn kmeans_separates_well_spread_points_into_distinct_clusters() {
        let data = vec![vec![0.0, 0.0], vec![0.5, 0.5], vec![10.0, 10.0]];
        let assignments = kmeans(&data, 3, 50);
        assert_eq!(assignments.len(), 3);
        let distinct: std::collections::HashSet<_> = assignments.iter().collect();
        assert_eq!(distinct.len(), 3);
    }

    #[test]
    fn kmeans_clamps_k_to_available_points() {
        let data = vec![vec![0.0], vec![1.0]];
        let assignments = kmeans(&data, 5, 10);
        assert_eq!(assignments.len(), 2);
    }

    /// The S6-shaped input (ember-strategy/src/storage.rs): three distinct
    /// points each become their own cluster under first-`k`-rows seeding,
    /// inserted in an order (0.333, 1.0, 0.0) that does *not* match
    /// ascending performance. The highest-mean point must still come out
    /// with the highest label regardless of its insertion position.
    #[test]
    fn labels_track_performance_not_insertion_order() {
        let data = vec![vec![0.333, 0.0], vec![1.0, 0.0], vec![0.0, 0.0]];
        let assignments = kmeans(&data, 3, 50);
        assert_eq!(assignments[1], 2, "highest vector[0] must get the highest label");
        assert_eq!(assignments[0], 1, "middle vector[0] must get the middle label");
        assert_eq!(assignments[2], 0, "lowest vector[0] must get the lowest label");
    }
}

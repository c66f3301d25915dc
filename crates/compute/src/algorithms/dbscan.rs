use std::collections::VecDeque;

use super::squared_euclidean;

/// Result of DBSCAN clustering, indexed like the input points.
#[derive(Debug, Clone)]
pub struct DbscanResult {
    /// Cluster of each point, `None` for noise.
    pub labels: Vec<Option<usize>>,
    /// Indices of points not reachable from any core point.
    pub noise: Vec<usize>,
    /// Total number of clusters found.
    pub num_clusters: usize,
}

/// Run DBSCAN density-based clustering on a set of points with dense feature vectors.
///
/// # Arguments
/// * `points`: feature vectors, one per observation
/// * `eps`: neighborhood radius (Euclidean distance)
/// * `min_pts`: minimum number of neighbors (including the point itself) to form a core point
///
/// # Returns
/// A [`DbscanResult`] containing cluster assignments and noise points.
pub fn dbscan(points: &[Vec<f64>], eps: f64, min_pts: usize) -> DbscanResult {
    let n = points.len();
    if n == 0 {
        return DbscanResult {
            labels: Vec::new(),
            noise: Vec::new(),
            num_clusters: 0,
        };
    }

    let eps_sq = eps * eps;

    // Pre-compute pairwise neighbor lists to avoid redundant distance calculations.
    let neighbors: Vec<Vec<usize>> = (0..n)
        .map(|i| {
            (0..n)
                .filter(|&j| squared_euclidean(&points[i], &points[j]) <= eps_sq)
                .collect()
        })
        .collect();

    let mut labels: Vec<Option<usize>> = vec![None; n];
    let mut visited = vec![false; n];
    let mut current_cluster = 0usize;

    for i in 0..n {
        if visited[i] {
            continue;
        }
        visited[i] = true;

        if neighbors[i].len() < min_pts {
            // Not a core point; tentatively noise (may be claimed by a cluster later).
            continue;
        }

        labels[i] = Some(current_cluster);

        let mut queue: VecDeque<usize> = neighbors[i]
            .iter()
            .copied()
            .filter(|&j| j != i)
            .collect();

        while let Some(j) = queue.pop_front() {
            if labels[j].is_none() {
                labels[j] = Some(current_cluster);
            }

            if visited[j] {
                continue;
            }
            visited[j] = true;

            if neighbors[j].len() >= min_pts {
                for &nb in &neighbors[j] {
                    if labels[nb].is_none() {
                        queue.push_back(nb);
                    }
                }
            }
        }

        current_cluster += 1;
    }

    let noise = labels
        .iter()
        .enumerate()
        .filter(|(_, label)| label.is_none())
        .map(|(idx, _)| idx)
        .collect();

    DbscanResult {
        labels,
        noise,
        num_clusters: current_cluster,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(values: &[f64]) -> Vec<Vec<f64>> {
        values.iter().map(|&v| vec![v]).collect()
    }

    #[test]
    fn empty_input() {
        let result = dbscan(&[], 1.0, 2);
        assert_eq!(result.num_clusters, 0);
        assert!(result.labels.is_empty());
        assert!(result.noise.is_empty());
    }

    #[test]
    fn single_point_is_noise() {
        let result = dbscan(&[vec![0.0, 0.0]], 1.0, 2);
        assert_eq!(result.num_clusters, 0);
        assert_eq!(result.noise, vec![0]);
    }

    #[test]
    fn two_clusters_well_separated() {
        let points = vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![100.0, 100.0],
            vec![101.0, 100.0],
            vec![100.0, 101.0],
        ];

        let result = dbscan(&points, 2.0, 2);

        assert_eq!(result.num_clusters, 2);
        assert!(result.noise.is_empty());
        assert_eq!(result.labels[0], result.labels[1]);
        assert_eq!(result.labels[0], result.labels[2]);
        assert_eq!(result.labels[3], result.labels[5]);
        assert_ne!(result.labels[0], result.labels[3]);
    }

    #[test]
    fn noise_points_detected() {
        let points = scalar(&[0.0, 0.1, 0.2, 9.0, 5.0, 5.1, 5.2]);
        let result = dbscan(&points, 0.5, 2);

        assert_eq!(result.num_clusters, 2);
        assert_eq!(result.noise, vec![3]);
    }

    #[test]
    fn chain_connectivity() {
        // Each point is within eps of its neighbour; endpoints are far apart.
        let points: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let result = dbscan(&points, 1.5, 2);

        assert_eq!(result.num_clusters, 1);
        assert!(result.noise.is_empty());
    }

    #[test]
    fn high_min_pts_makes_everything_noise() {
        let points = vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]];
        let result = dbscan(&points, 1.0, 10);

        assert_eq!(result.num_clusters, 0);
        assert_eq!(result.noise.len(), 3);
    }

    #[test]
    fn border_point_assigned_to_cluster() {
        // (2.0) is within eps of (1.0) but lacks enough neighbours to be core.
        let points = scalar(&[0.0, 0.5, 1.0, 2.0]);
        let result = dbscan(&points, 1.2, 2);

        assert!(result.labels[3].is_some(), "border point should be assigned to a cluster");
    }
}

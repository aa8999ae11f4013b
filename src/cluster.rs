//! Average linkage agglomerative clustering on a similarity matrix, and centroid choice.
//!
//! Distances are 1 - similarity. Each item starts in its own cluster and the 2 clusters with the
//! smallest mean inter cluster distance are merged until the requested number of clusters remains.
//! Cluster distances are updated with the Lance-Williams formula for average linkage:
//! d(c, a ∪ b) = (|a| d(c,a) + |b| d(c,b)) / (|a| + |b|).

use crate::errors::KmerIdError;
use crate::simmatrix::SimilarityMatrix;


/// A cluster of matrix indexes with its representative
#[derive(Clone, Debug, PartialEq)]
pub struct Cluster {
    /// sorted matrix indexes
    members : Vec<usize>,
    centroid : usize,
}

impl Cluster {
    pub fn get_members(&self) -> &[usize] {
        &self.members
    }

    pub fn get_centroid(&self) -> usize {
        self.centroid
    }
}


/// partition of matrix items in clusters, each with a centroid
#[derive(Clone, Debug)]
pub struct ClusterSet {
    clusters : Vec<Cluster>,
}

impl ClusterSet {
    pub fn get_clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// names of centroids, in cluster order
    pub fn centroid_names(&self, matrix : &SimilarityMatrix) -> Vec<String> {
        self.clusters.iter().map(|c| matrix.get_names()[c.centroid].clone()).collect()
    }
} // end of impl ClusterSet



// nearest active cluster of slot a among slots after a, first one on ties
fn row_nearest(a : usize, clusters : &[Option<Vec<usize>>], dist : &[f64]) -> Option<(usize, f64)> {
    let n = clusters.len();
    let mut best : Option<(usize, f64)> = None;
    for b in (a + 1)..n {
        if clusters[b].is_none() {
            continue;
        }
        let d = dist[a * n + b];
        if best.map_or(true, |(_, bd)| d < bd) {
            best = Some((b, d));
        }
    }
    best
}


/// Returns exactly k clusters of matrix indexes. Clusters are ordered by their smallest member,
/// members are sorted. Among equal merge distances the first pair in index order is merged.
pub fn average_linkage(matrix : &SimilarityMatrix, k : usize) -> Result<Vec<Vec<usize>>, KmerIdError> {
    let n = matrix.len();
    if k == 0 || k > n {
        return Err(KmerIdError::InvalidClusterCount{requested : k, items : n});
    }
    // slot i holds the cluster whose smallest member is i
    let mut clusters : Vec<Option<Vec<usize>>> = (0..n).map(|i| Some(vec![i])).collect();
    let mut dist = vec![0f64; n * n];
    for i in 0..n {
        for j in 0..n {
            dist[i * n + j] = matrix.distance(i, j);
        }
    }
    // nearest[a] : nearest active slot after a, so a merge only rescans the rows it touched
    let mut nearest : Vec<Option<(usize, f64)>> = (0..n).map(|a| row_nearest(a, &clusters, &dist)).collect();
    //
    let mut nb_active = n;
    while nb_active > k {
        let mut best : Option<(usize, usize, f64)> = None;
        for a in 0..n {
            if clusters[a].is_none() {
                continue;
            }
            if let Some((b, d)) = nearest[a] {
                if best.map_or(true, |(_, _, bd)| d < bd) {
                    best = Some((a, b, d));
                }
            }
        }
        // nb_active > k >= 1 so there are at least 2 active clusters
        let Some((a, b, d)) = best else { break };
        let merged = clusters[b].take().unwrap_or_default();
        nearest[b] = None;
        let size_a = clusters[a].as_ref().map_or(0, |c| c.len()) as f64;
        let size_b = merged.len() as f64;
        for c in 0..n {
            if c == a || clusters[c].is_none() {
                continue;
            }
            let new_d = (size_a * dist[c * n + a] + size_b * dist[c * n + b]) / (size_a + size_b);
            dist[c * n + a] = new_d;
            dist[a * n + c] = new_d;
        }
        if let Some(members) = clusters[a].as_mut() {
            members.extend(merged);
            members.sort_unstable();
        }
        nb_active -= 1;
        log::trace!("merged clusters {} and {} at distance {:.4}, nb clusters {}", a, b, d, nb_active);
        // refresh cached neighbours
        for c in 0..n {
            if clusters[c].is_none() {
                continue;
            }
            let cached = nearest[c];
            match cached {
                _ if c == a => { nearest[c] = row_nearest(c, &clusters, &dist); }
                Some((nc, _)) if nc == a || nc == b => { nearest[c] = row_nearest(c, &clusters, &dist); }
                Some((nc, nd)) if c < a => {
                    let d_ca = dist[c * n + a];
                    if d_ca < nd || (d_ca == nd && a < nc) {
                        nearest[c] = Some((a, d_ca));
                    }
                }
                _ => {}
            }
        }
    }
    //
    Ok(clusters.into_iter().flatten().collect())
} // end of average_linkage



/// The member with the largest mean similarity to the whole cluster (itself included).
/// Clusters of 1 or 2 members take their first member, ties keep the first member found.
pub fn select_centroid(matrix : &SimilarityMatrix, members : &[usize]) -> usize {
    assert!(!members.is_empty(), "empty cluster has no centroid");
    if members.len() <= 2 {
        return members[0];
    }
    let mut best = members[0];
    let mut best_avg = f64::NEG_INFINITY;
    for &x in members {
        let avg = members.iter().map(|&y| matrix.get(x, y)).sum::<f64>() / members.len() as f64;
        if avg > best_avg {
            best_avg = avg;
            best = x;
        }
    }
    log::trace!("centroid {} of cluster of size {}, mean similarity {:.4}", best, members.len(), best_avg);
    best
} // end of select_centroid



/// clusters the matrix items in k clusters and chooses their centroids
pub fn cluster_group(matrix : &SimilarityMatrix, k : usize) -> Result<ClusterSet, KmerIdError> {
    let partition = average_linkage(matrix, k)?;
    let clusters = partition.into_iter().map(|members| {
        let centroid = select_centroid(matrix, &members);
        Cluster{members, centroid}
    }).collect::<Vec<Cluster>>();
    log::debug!("clustered {} genomes in {} clusters, sizes {:?}", matrix.len(), clusters.len(),
            clusters.iter().map(|c| c.members.len()).collect::<Vec<usize>>());
    Ok(ClusterSet{clusters})
} // end of cluster_group



#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(names : &[&str], pairs : &[(usize, usize, f64)], default : f64) -> SimilarityMatrix {
        let n = names.len();
        let mut values = vec![default; n * n];
        for i in 0..n {
            values[i * n + i] = 1.;
        }
        for &(i, j, s) in pairs {
            values[i * n + j] = s;
            values[j * n + i] = s;
        }
        SimilarityMatrix::from_values(names.iter().map(|s| s.to_string()).collect(), values).unwrap()
    }

    #[test]
    fn two_obvious_pairs() {
        let mat = matrix(&["A", "B", "C", "D"], &[(0, 1, 0.9), (2, 3, 0.9)], 0.1);
        let set = cluster_group(&mat, 2).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get_clusters()[0].get_members(), &[0, 1]);
        assert_eq!(set.get_clusters()[1].get_members(), &[2, 3]);
        assert_eq!(set.centroid_names(&mat), vec!["A".to_string(), "C".to_string()]);
    }

    #[test]
    fn medoid_of_larger_cluster() {
        // A is the most similar to the others though not first
        let mat = matrix(&["B", "A", "C"], &[(0, 1, 0.9), (1, 2, 0.8), (0, 2, 0.5)], 0.);
        assert_eq!(select_centroid(&mat, &[0, 1, 2]), 1);
        let set = cluster_group(&mat, 1).unwrap();
        assert_eq!(set.get_clusters()[0].get_centroid(), 1);
    }

    #[test]
    fn tie_keeps_first() {
        let mat = matrix(&["A", "B", "C"], &[], 0.5);
        assert_eq!(select_centroid(&mat, &[0, 1, 2]), 0);
    }

    #[test]
    fn average_not_single_linkage() {
        // C is very close to B only, D is moderately close to both A and B.
        // single linkage would join C to {A,B} first, average linkage prefers D.
        let mat = matrix(&["A", "B", "C", "D"], &[(0, 1, 0.95), (1, 2, 0.9), (0, 2, 0.0), (0, 3, 0.6), (1, 3, 0.6)], 0.0);
        let partition = average_linkage(&mat, 2).unwrap();
        assert_eq!(partition, vec![vec![0, 1, 3], vec![2]]);
    }

    #[test]
    fn invalid_counts() {
        let mat = matrix(&["A", "B"], &[], 0.5);
        assert!(matches!(average_linkage(&mat, 3), Err(KmerIdError::InvalidClusterCount{requested : 3, items : 2})));
        assert!(average_linkage(&mat, 0).is_err());
    }

    // merges the closest pair found by scanning every pair at each step
    fn full_scan_linkage(mat : &SimilarityMatrix, k : usize) -> Vec<Vec<usize>> {
        let n = mat.len();
        let mut clusters : Vec<Option<Vec<usize>>> = (0..n).map(|i| Some(vec![i])).collect();
        let mut dist : Vec<f64> = (0..n * n).map(|x| mat.distance(x / n, x % n)).collect();
        for _ in k..n {
            let mut best : Option<(usize, usize, f64)> = None;
            for a in 0..n {
                for b in (a + 1)..n {
                    if clusters[a].is_some() && clusters[b].is_some() && best.map_or(true, |(_, _, bd)| dist[a * n + b] < bd) {
                        best = Some((a, b, dist[a * n + b]));
                    }
                }
            }
            let (a, b, _) = best.unwrap();
            let merged = clusters[b].take().unwrap();
            let (sa, sb) = (clusters[a].as_ref().unwrap().len() as f64, merged.len() as f64);
            for c in 0..n {
                if c != a && clusters[c].is_some() {
                    let d = (sa * dist[c * n + a] + sb * dist[c * n + b]) / (sa + sb);
                    dist[c * n + a] = d;
                    dist[a * n + c] = d;
                }
            }
            let members = clusters[a].as_mut().unwrap();
            members.extend(merged);
            members.sort_unstable();
        }
        clusters.into_iter().flatten().collect()
    }

    #[test]
    fn cached_neighbours_merge_like_full_scan() {
        let mut state : u64 = 0x9E3779B97F4A7C15;
        for (n, levels) in [(9, 4u64), (15, 1000), (20, 3)] {
            let mut pairs = Vec::new();
            for i in 0..n {
                for j in (i + 1)..n {
                    state ^= state << 13;
                    state ^= state >> 7;
                    state ^= state << 17;
                    // few levels give many equal distances
                    pairs.push((i, j, (state % levels) as f64 / levels as f64));
                }
            }
            let names : Vec<String> = (0..n).map(|i| format!("g{}", i)).collect();
            let name_refs : Vec<&str> = names.iter().map(|s| s.as_str()).collect();
            let mat = matrix(&name_refs, &pairs, 0.);
            for k in 1..=n {
                assert_eq!(average_linkage(&mat, k).unwrap(), full_scan_linkage(&mat, k), "n {} k {}", n, k);
            }
        }
    }

    #[test]
    fn partition_is_complete_for_every_k() {
        // deterministic pseudo random similarities
        let n = 12;
        let mut state : u64 = 0x2545F4914F6CDD1D;
        let mut pairs = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                pairs.push((i, j, (state % 1000) as f64 / 1000.));
            }
        }
        let names : Vec<String> = (0..n).map(|i| format!("g{}", i)).collect();
        let name_refs : Vec<&str> = names.iter().map(|s| s.as_str()).collect();
        let mat = matrix(&name_refs, &pairs, 0.);
        for k in 1..=n {
            let set = cluster_group(&mat, k).unwrap();
            assert_eq!(set.len(), k);
            let mut seen = vec![0usize; n];
            for c in set.get_clusters() {
                assert!(!c.get_members().is_empty());
                assert!(c.get_members().contains(&c.get_centroid()));
                for &m in c.get_members() {
                    seen[m] += 1;
                }
            }
            assert!(seen.iter().all(|&s| s == 1));
        }
    }
}

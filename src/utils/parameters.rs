//! structures related to processing parameters


use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};


/// kmer size used by the whole tool, reference lists and read lists must agree on it.
pub const KMER_SIZE : usize = 18;


/// parameters of kmer extraction
#[derive(Copy, Clone, Debug)]
pub struct KmerParams {
    kmer_size : usize,
    /// a read kmer is kept only if seen at least this number of times, sequencing errors rarely repeat
    min_read_count : u32,
}

impl Default for KmerParams {
    fn default() -> Self {
        KmerParams{kmer_size : KMER_SIZE, min_read_count : 2}
    }
}

impl KmerParams {
    pub fn new(kmer_size : usize, min_read_count : u32) -> Self {
        assert!(kmer_size > 0 && kmer_size <= 32, "kmer size must be in 1..=32 to fit in a u64");
        KmerParams{kmer_size, min_read_count}
    }

    /// returns kmer size
    pub fn get_kmer_size(&self) -> usize {
        self.kmer_size
    }

    pub fn get_min_read_count(&self) -> u32 {
        self.min_read_count
    }
}  // end of impl KmerParams


//===========================================================

/// clustering parameters of reference set construction, recorded per group in the catalog
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefsetParams {
    /// number of genus level centroids
    coarse_clusters : usize,
    /// number of representatives when a group is larger than this value
    fine_clusters : usize,
}

impl Default for RefsetParams {
    fn default() -> Self {
        RefsetParams{coarse_clusters : 3, fine_clusters : 40}
    }
}

impl RefsetParams {
    pub fn new(coarse_clusters : usize, fine_clusters : usize) -> Self {
        RefsetParams{coarse_clusters, fine_clusters}
    }

    pub fn get_coarse_clusters(&self) -> usize {
        self.coarse_clusters
    }

    pub fn get_fine_clusters(&self) -> usize {
        self.fine_clusters
    }
} // end of impl RefsetParams


//===========================================================


#[derive(Copy, Clone, Debug)]
pub struct IdentifyParams {
    /// number of best coarse centroids whose groups go to fine stage
    top_centroids : usize,
    /// run mixture analysis after identification
    mixing : bool,
}

impl Default for IdentifyParams {
    fn default() -> Self {
        IdentifyParams{top_centroids : 5, mixing : true}
    }
}

impl IdentifyParams {
    pub fn new(top_centroids : usize, mixing : bool) -> Self {
        IdentifyParams{top_centroids, mixing}
    }

    pub fn get_top_centroids(&self) -> usize {
        self.top_centroids
    }

    pub fn get_mixing(&self) -> bool {
        self.mixing
    }
} // end of impl IdentifyParams


//=========================================================================================

/// Where collaborators come from. With no tool directory the in-process implementation is used.
#[derive(Clone, Debug, Default)]
pub struct ToolParams {
    tools_dir : Option<PathBuf>,
    timeout_secs : Option<u64>,
}

impl ToolParams {
    pub fn new(tools_dir : Option<PathBuf>, timeout_secs : Option<u64>) -> Self {
        ToolParams{tools_dir, timeout_secs}
    }

    pub fn get_tools_dir(&self) -> Option<&PathBuf> {
        self.tools_dir.as_ref()
    }

    pub fn get_timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
} // end of ToolParams

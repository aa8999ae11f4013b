//! Kmer collaborators : kmer list extraction and similarity between kmer lists.
//!
//! The identification logic only sees the two traits [KmerExtractor] and [SimilarityBackend].
//! [NativeKmers] implements both in process, [ExternalTools] runs the historical C binaries.

use std::path::Path;

use crate::errors::KmerIdError;
use crate::utils::parameters::{KmerParams, ToolParams};

pub mod external;
pub mod native;
pub mod profile;

pub use external::ExternalTools;
pub use native::NativeKmers;
pub use profile::KmerProfile;


/// similarity of a query against one reference kmer list
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredProfile {
    pub similarity : f64,
    pub profile : KmerProfile,
}

impl ScoredProfile {
    pub fn new(similarity : f64, profile : KmerProfile) -> Self {
        ScoredProfile{similarity, profile}
    }
}


/// produces kmer lists
pub trait KmerExtractor {
    /// kmer list of one reference genome fasta file (possibly gzipped), written to out
    fn genome_profile(&self, genome : &Path, out : &Path) -> Result<KmerProfile, KmerIdError>;

    /// kmer list of a read file (fastq possibly gzipped), written to out
    fn reads_profile(&self, reads : &Path, out : &Path) -> Result<KmerProfile, KmerIdError>;
}


/// compares kmer lists
pub trait SimilarityBackend : Sync {
    /// One score in [0,1] per reference. The order of the answer is not guaranteed,
    /// a reference can be missing if the collaborator dropped it.
    fn batch_similarity(&self, query : &KmerProfile, references : &[KmerProfile]) -> Result<Vec<ScoredProfile>, KmerIdError>;

    /// jaccard index between 2 kmer lists
    fn jaccard(&self, a : &KmerProfile, b : &KmerProfile) -> Result<f64, KmerIdError>;
}


/// both capabilities, what the command line needs
pub trait Collaborator : KmerExtractor + SimilarityBackend {}

impl <T : KmerExtractor + SimilarityBackend> Collaborator for T {}


/// in process collaborator unless a tool directory is given
pub fn get_collaborator(kmer_params : &KmerParams, tool_params : &ToolParams) -> Box<dyn Collaborator> {
    match tool_params.get_tools_dir() {
        Some(dir) => {
            log::info!("using external kmer tools in {:?}", dir);
            Box::new(ExternalTools::new(dir.clone(), kmer_params.get_kmer_size(), tool_params.get_timeout()))
        }
        None => {
            log::info!("using in process kmer computations, kmer size {}", kmer_params.get_kmer_size());
            Box::new(NativeKmers::new(*kmer_params))
        }
    }
} // end of get_collaborator

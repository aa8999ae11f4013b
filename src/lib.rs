//! Identification of a sequencing sample against clustered reference genome sets, with
//! detection of possible mixtures.
//!
//! - [refset] builds, for a folder of genomes, kmer lists, a similarity matrix, genus level
//!   centroids and a representative set, recorded in a [catalog::ReferenceCatalog].
//! - [identify] matches the kmer list of a sample against centroids then representatives.
//! - [mixture] checks whether the best match explains the sample alone.
//!
//! Kmer list extraction and comparisons go through the traits of [kmer], implemented in process
//! or by external binaries.

pub mod answer;
pub mod catalog;
pub mod cluster;
pub mod errors;
pub mod identify;
pub mod kmer;
pub mod mixture;
pub mod refset;
pub mod simmatrix;
pub mod utils;

pub use errors::KmerIdError;

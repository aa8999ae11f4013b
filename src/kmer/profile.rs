//! The kmer list handle and its on disk format.
//!
//! A kmer list file contains one canonical kmer per line, as a decimal integer, sorted ascending
//! without duplicates. The core of the tool never reads it, it only passes handles to collaborators.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::KmerIdError;
use crate::utils::files::genome_name_from_kmer_list;


/// opaque identifier of the kmer set of a genome or of a read sample
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KmerProfile(PathBuf);

impl KmerProfile {
    pub fn new(path : impl Into<PathBuf>) -> Self {
        KmerProfile(path.into())
    }

    pub fn get_path(&self) -> &Path {
        &self.0
    }

    pub fn exists(&self) -> bool {
        self.0.is_file()
    }

    /// name of the genome the list was made from
    pub fn genome_name(&self) -> String {
        genome_name_from_kmer_list(&self.0)
    }
} // end of impl KmerProfile



/// reload a kmer list, sorting it if the producer did not.
pub fn load_kmer_list(path : &Path) -> Result<Vec<u64>, KmerIdError> {
    let file = File::open(path).map_err(|e| KmerIdError::io(path, e))?;
    let reader = BufReader::new(file);
    let mut kmers = Vec::<u64>::with_capacity(1_000_000);
    for line in reader.lines() {
        let line = line.map_err(|e| KmerIdError::io(path, e))?;
        let field = line.trim();
        if field.is_empty() {
            continue;
        }
        let kmer = field.parse::<u64>().map_err(|_| KmerIdError::Parse{what : format!("kmer in {:?}", path), line : line.clone()})?;
        kmers.push(kmer);
    }
    if kmers.windows(2).any(|w| w[0] >= w[1]) {
        log::debug!("kmer list {:?} not sorted, sorting {} kmers", path, kmers.len());
        kmers.sort_unstable();
        kmers.dedup();
    }
    log::trace!("loaded {} kmers from {:?}", kmers.len(), path);
    Ok(kmers)
} // end of load_kmer_list



/// dump a sorted kmer list
pub fn dump_kmer_list(path : &Path, kmers : &[u64]) -> Result<KmerProfile, KmerIdError> {
    let file = OpenOptions::new().write(true).create(true).truncate(true).open(path).map_err(|e| KmerIdError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    for kmer in kmers {
        writeln!(writer, "{}", kmer).map_err(|e| KmerIdError::io(path, e))?;
    }
    writer.flush().map_err(|e| KmerIdError::io(path, e))?;
    log::debug!("dumped {} kmers in {:?}", kmers.len(), path);
    //
    Ok(KmerProfile::new(path))
} // end of dump_kmer_list



#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_reload_and_resort() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("x_kmers.txt");
        let profile = dump_kmer_list(&path, &[1, 5, 9]).unwrap();
        assert!(profile.exists());
        assert_eq!(profile.genome_name(), "x");
        assert_eq!(load_kmer_list(&path).unwrap(), vec![1, 5, 9]);
        // foreign producers may leave lists unsorted
        std::fs::write(&path, "9\n1\n\n5\n1\n").unwrap();
        assert_eq!(load_kmer_list(&path).unwrap(), vec![1, 5, 9]);
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad_kmers.txt");
        std::fs::write(&path, "12\nACGT\n").unwrap();
        assert!(matches!(load_kmer_list(&path), Err(KmerIdError::Parse{..})));
    }
}

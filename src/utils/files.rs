//! This file contains directory exploration and fasta file selection

use std::fs;
use std::path::{Path, PathBuf};

use fxhash::FxHashSet;

use crate::errors::KmerIdError;


/// suffix appended to a genome name to get its kmer list file
pub const KMER_LIST_SUFFIX : &str = "_kmers.txt";

const FASTA_ENDINGS : [&str; 4] = ["fa", "fna", "fas", "fasta"];


// returns the genome name if filename is a fasta file (possibly gzipped)
// a filename of type GCF_000091165.1_genomic.fna.gz gives GCF_000091165.1_genomic
pub fn fasta_genome_name(filename : &str) -> Option<&str> {
    let stripped = filename.strip_suffix(".gz").unwrap_or(filename);
    let (name, ending) = stripped.rsplit_once('.')?;
    if !name.is_empty() && FASTA_ENDINGS.contains(&ending) {
        Some(name)
    }
    else {
        None
    }
}  // end of fasta_genome_name


/// A genome file found in a reference folder
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenomeFile {
    /// name without path and fasta extension
    pub name : String,
    pub path : PathBuf,
}

impl GenomeFile {
    /// the kmer list is stored beside the genome file
    pub fn kmer_list_path(&self) -> PathBuf {
        kmer_list_path(self.path.parent().unwrap_or(Path::new(".")), &self.name)
    }
}


/// path of the kmer list of genome name in folder
pub fn kmer_list_path(folder : &Path, name : &str) -> PathBuf {
    folder.join(format!("{}{}", name, KMER_LIST_SUFFIX))
}


/// recovers genome name from a kmer list path
pub fn genome_name_from_kmer_list(path : &Path) -> String {
    let filename = path.file_name().map(|f| f.to_string_lossy().to_string()).unwrap_or_default();
    match filename.strip_suffix(KMER_LIST_SUFFIX) {
        Some(name) => name.to_string(),
        None       => filename,
    }
}


/// scan (non recursively) a folder and return its fasta files sorted by path.
pub fn list_genome_files(dir : &Path) -> Result<Vec<GenomeFile>, KmerIdError> {
    let mut genomes = Vec::<GenomeFile>::new();
    let entries = fs::read_dir(dir).map_err(|e| KmerIdError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| KmerIdError::io(dir, e))?;
        let path = entry.path();
        if path.is_dir() {
            continue;
        }
        let filename = entry.file_name().to_string_lossy().to_string();
        if let Some(name) = fasta_genome_name(&filename) {
            genomes.push(GenomeFile{name : name.to_string(), path});
        }
        else {
            log::trace!("skipping non fasta file {:?}", path);
        }
    }
    genomes.sort_by(|a, b| a.path.cmp(&b.path));
    // a genome present both plain and gzipped would give the same kmer list twice
    let mut seen = FxHashSet::<String>::default();
    genomes.retain(|g| {
        let first = seen.insert(g.name.clone());
        if !first {
            log::warn!("genome {} found twice, keeping first file only, skipping {:?}", g.name, g.path);
        }
        first
    });
    log::info!("{} sequence files found in {:?}", genomes.len(), dir);
    //
    Ok(genomes)
}  // end of list_genome_files

//! In process kmer extraction and kmer list comparisons.
//!
//! Kmers are 2 bits encoded A=0, C=1, G=2, T=3, first base in most significant position,
//! and the canonical kmer is the minimum of the forward and the reverse complement encodings.

use std::path::Path;

use rayon::prelude::*;

use crate::errors::KmerIdError;
use crate::utils::parameters::KmerParams;

use super::profile::{dump_kmer_list, load_kmer_list, KmerProfile};
use super::{KmerExtractor, ScoredProfile, SimilarityBackend};


#[inline]
fn encode_base(c : u8) -> Option<u64> {
    match c {
        b'A' | b'a' => Some(0),
        b'C' | b'c' => Some(1),
        b'G' | b'g' => Some(2),
        b'T' | b't' => Some(3),
        _           => None,
    }
} // end of encode_base


/// Rolls canonical kmers over a stream of bases. A non ACGT base restarts the window.
pub struct CanonicalRoller {
    kmer_size : usize,
    mask : u64,
    shift : usize,
    forward : u64,
    reverse : u64,
    /// number of valid bases in current window, saturates at kmer_size
    filled : usize,
}

impl CanonicalRoller {
    pub fn new(kmer_size : usize) -> Self {
        assert!(kmer_size > 0 && kmer_size <= 32);
        let mask = if kmer_size == 32 { u64::MAX } else { (1u64 << (2 * kmer_size)) - 1 };
        CanonicalRoller{kmer_size, mask, shift : 2 * (kmer_size - 1), forward : 0, reverse : 0, filled : 0}
    }

    pub fn reset(&mut self) {
        self.forward = 0;
        self.reverse = 0;
        self.filled = 0;
    }

    /// push a base, returns the canonical kmer ending at this base if the window is complete
    #[inline]
    pub fn push(&mut self, c : u8) -> Option<u64> {
        let Some(b) = encode_base(c) else {
            self.reset();
            return None;
        };
        self.forward = ((self.forward << 2) | b) & self.mask;
        self.reverse = (self.reverse >> 2) | ((3 - b) << self.shift);
        if self.filled < self.kmer_size {
            self.filled += 1;
        }
        if self.filled == self.kmer_size {
            Some(self.forward.min(self.reverse))
        }
        else {
            None
        }
    } // end of push

    pub fn extend(&mut self, seq : &[u8], kmers : &mut Vec<u64>) {
        for &c in seq {
            if let Some(kmer) = self.push(c) {
                kmers.push(kmer);
            }
        }
    }
} // end of impl CanonicalRoller



/// number of common values of 2 sorted lists
pub fn intersection_size(a : &[u64], b : &[u64]) -> usize {
    let (mut i, mut j, mut common) = (0, 0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Equal   => { i += 1; j += 1; common += 1; }
            std::cmp::Ordering::Less    => { i += 1; }
            std::cmp::Ordering::Greater => { j += 1; }
        }
    }
    common
} // end of intersection_size


/// fraction of reference kmers found in query
pub fn containment(query : &[u64], reference : &[u64]) -> f64 {
    if reference.is_empty() {
        return 0.;
    }
    intersection_size(query, reference) as f64 / reference.len() as f64
}


pub fn jaccard_index(a : &[u64], b : &[u64]) -> f64 {
    let common = intersection_size(a, b);
    let union = a.len() + b.len() - common;
    if union == 0 {
        return 0.;
    }
    common as f64 / union as f64
}


// keeps kmers appearing at least min_count times in a sorted list, once each
fn keep_repeated(sorted : &[u64], min_count : usize) -> Vec<u64> {
    let mut kept = Vec::<u64>::with_capacity(sorted.len() / 2);
    let mut start = 0;
    while start < sorted.len() {
        let mut end = start + 1;
        while end < sorted.len() && sorted[end] == sorted[start] {
            end += 1;
        }
        if end - start >= min_count {
            kept.push(sorted[start]);
        }
        start = end;
    }
    kept
} // end of keep_repeated


fn parse_error(path : &Path, e : needletail::errors::ParseError) -> KmerIdError {
    KmerIdError::Collaborator{tool : String::from("fastx parser"), msg : format!("{:?} : {}", path, e)}
}


/// In process implementation of kmer extraction and similarities.
pub struct NativeKmers {
    params : KmerParams,
}

impl NativeKmers {
    pub fn new(params : KmerParams) -> Self {
        NativeKmers{params}
    }

    /// all records of a genome file are one contiguous sequence
    pub fn genome_kmers(&self, genome : &Path) -> Result<Vec<u64>, KmerIdError> {
        let mut reader = needletail::parse_fastx_file(genome).map_err(|e| parse_error(genome, e))?;
        let mut roller = CanonicalRoller::new(self.params.get_kmer_size());
        let mut kmers = Vec::<u64>::with_capacity(1_000_000);
        let mut nb_record = 0;
        while let Some(record) = reader.next() {
            let record = record.map_err(|e| parse_error(genome, e))?;
            roller.extend(&record.seq(), &mut kmers);
            nb_record += 1;
        }
        kmers.sort_unstable();
        kmers.dedup();
        log::debug!("genome {:?} nb records {}, nb distinct kmers {}", genome, nb_record, kmers.len());
        Ok(kmers)
    } // end of genome_kmers

    /// kmers of a read file seen at least min_read_count times
    pub fn reads_kmers(&self, reads : &Path) -> Result<Vec<u64>, KmerIdError> {
        let mut reader = needletail::parse_fastx_file(reads).map_err(|e| parse_error(reads, e))?;
        let mut roller = CanonicalRoller::new(self.params.get_kmer_size());
        let mut kmers = Vec::<u64>::with_capacity(1_000_000);
        let mut nb_reads : usize = 0;
        while let Some(record) = reader.next() {
            let record = record.map_err(|e| parse_error(reads, e))?;
            roller.reset();
            roller.extend(&record.seq(), &mut kmers);
            nb_reads += 1;
            if nb_reads % 1_000_000 == 0 {
                log::info!("nb reads processed : {}, nb kmers : {}", nb_reads, kmers.len());
            }
        }
        kmers.sort_unstable();
        let kept = keep_repeated(&kmers, self.params.get_min_read_count().max(1) as usize);
        log::info!("reads {:?} : nb reads {}, nb kmers {}, kept {} kmers seen at least {} times",
                reads, nb_reads, kmers.len(), kept.len(), self.params.get_min_read_count());
        Ok(kept)
    } // end of reads_kmers
} // end of impl NativeKmers



impl KmerExtractor for NativeKmers {
    fn genome_profile(&self, genome : &Path, out : &Path) -> Result<KmerProfile, KmerIdError> {
        let kmers = self.genome_kmers(genome)?;
        dump_kmer_list(out, &kmers)
    }

    fn reads_profile(&self, reads : &Path, out : &Path) -> Result<KmerProfile, KmerIdError> {
        let kmers = self.reads_kmers(reads)?;
        dump_kmer_list(out, &kmers)
    }
} // end of impl KmerExtractor for NativeKmers



impl SimilarityBackend for NativeKmers {
    fn batch_similarity(&self, query : &KmerProfile, references : &[KmerProfile]) -> Result<Vec<ScoredProfile>, KmerIdError> {
        let query_kmers = load_kmer_list(query.get_path())?;
        // collect keeps reference order
        references.par_iter().map(|reference| {
            let ref_kmers = load_kmer_list(reference.get_path())?;
            Ok(ScoredProfile::new(containment(&query_kmers, &ref_kmers), reference.clone()))
        }).collect()
    } // end of batch_similarity

    fn jaccard(&self, a : &KmerProfile, b : &KmerProfile) -> Result<f64, KmerIdError> {
        let (kmers_a, kmers_b) = rayon::join(|| load_kmer_list(a.get_path()), || load_kmer_list(b.get_path()));
        Ok(jaccard_index(&kmers_a?, &kmers_b?))
    }
} // end of impl SimilarityBackend for NativeKmers

//! Mixture detection.
//!
//! If the sample is a pure culture of the top hit H, a reference R should be as similar to the
//! sample as it is to H. For each other matched reference we compute
//! delta = sim(sample, R) - sim(H, R). A large positive delta means the sample contains kmers of R
//! that H does not explain, i.e. a possible second organism.

use fxhash::FxHashMap;

use crate::errors::KmerIdError;
use crate::identify::MatchResult;
use crate::kmer::{KmerProfile, ScoredProfile, SimilarityBackend};


#[derive(Clone, Debug, PartialEq)]
pub struct MixtureEntry {
    pub abs_delta : f64,
    /// sim(sample, R) - sim(top hit, R)
    pub delta : f64,
    pub group : String,
    pub genome : String,
}


/// top hit and other references sorted by decreasing |delta|
#[derive(Clone, Debug)]
pub struct MixtureReport {
    pub top : MatchResult,
    pub entries : Vec<MixtureEntry>,
}



// other references, each profile once, best occurrence kept
fn other_references(results : &[MatchResult]) -> Vec<&MatchResult> {
    let top = &results[0].profile;
    let mut seen = Vec::<&KmerProfile>::new();
    let mut others = Vec::new();
    for r in &results[1..] {
        if &r.profile == top || seen.contains(&&r.profile) {
            continue;
        }
        seen.push(&r.profile);
        others.push(r);
    }
    others
}


/// Builds the entries from fine stage results (best first) and the similarities of the top hit
/// to the other references. References without a top hit similarity are skipped.
pub fn mixture_entries(results : &[MatchResult], top_vs_others : &[ScoredProfile]) -> Vec<MixtureEntry> {
    if results.len() < 2 {
        return Vec::new();
    }
    let recomputed : FxHashMap<&KmerProfile, f64> = top_vs_others.iter().map(|s| (&s.profile, s.similarity)).collect();
    let mut entries = Vec::<MixtureEntry>::new();
    for r in other_references(results) {
        match recomputed.get(&r.profile) {
            Some(top_sim) => {
                let delta = r.similarity - top_sim;
                entries.push(MixtureEntry{abs_delta : delta.abs(), delta, group : r.group.clone(), genome : r.genome.clone()});
            }
            None => {
                log::warn!("no similarity between top hit and {:?}, skipped in mixing analysis", r.profile);
            }
        }
    }
    entries.sort_by(|a, b| b.abs_delta.total_cmp(&a.abs_delta));
    entries
} // end of mixture_entries



/// Compares the top hit to the other matched references in one batch.
/// Returns None if there are less than 2 results.
pub fn check_mixing<B>(results : &[MatchResult], backend : &B) -> Result<Option<MixtureReport>, KmerIdError>
    where B : SimilarityBackend + ?Sized {
    if results.len() < 2 {
        log::info!("less than 2 matches, no mixing analysis");
        return Ok(None);
    }
    let top = &results[0];
    let others : Vec<KmerProfile> = other_references(results).into_iter().map(|r| r.profile.clone()).collect();
    log::info!("mixing analysis, comparing top hit {} to {} references", top.genome, others.len());
    let top_vs_others = if others.is_empty() {
        Vec::new()
    } else {
        backend.batch_similarity(&top.profile, &others)?
    };
    let entries = mixture_entries(results, &top_vs_others);
    if let Some(first) = entries.first() {
        log::info!("largest similarity difference {:.4} with {} of {}", first.delta, first.genome, first.group);
    }
    Ok(Some(MixtureReport{top : top.clone(), entries}))
} // end of check_mixing

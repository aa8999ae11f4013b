//! Identification of a sample in 2 stages.
//!
//! 1. coarse : the sample kmer list is compared to the centroids of all groups in one batch,
//!    the groups owning the best centroids are the candidate genera.
//! 2. fine : for each candidate genus the sample is compared to the representative set of the genus,
//!    all scores are merged and sorted.
//!
//! Sorting is stable : equal similarities keep the order of the kmer lists submitted to the collaborator.
//! A genus whose fine comparison fails only loses its own results.

use std::path::Path;
use std::time::SystemTime;

use cpu_time::ProcessTime;
use fxhash::FxHashMap;
use rayon::prelude::*;

use crate::catalog::ReferenceCatalog;
use crate::errors::KmerIdError;
use crate::kmer::{Collaborator, KmerProfile, ScoredProfile, SimilarityBackend};
use crate::utils::parameters::IdentifyParams;


/// A reference genome matched by the sample
#[derive(Clone, Debug, PartialEq)]
pub struct MatchResult {
    pub similarity : f64,
    pub profile : KmerProfile,
    /// group owning the reference
    pub group : String,
    pub genome : String,
}


/// result of the 2 stages
#[derive(Clone, Debug)]
pub struct Identification {
    /// candidate genera, best first
    pub genera : Vec<String>,
    /// fine stage matches, best first
    pub results : Vec<MatchResult>,
}

impl Identification {
    /// the reported identification
    pub fn best(&self) -> Option<&MatchResult> {
        self.results.first()
    }
}


/// descending similarity, stable
pub fn sort_matches(matches : &mut [MatchResult]) {
    matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
}



// Reference kmer lists submitted in one batch, with their owning group.
// Collaborators answer with profiles, possibly out of order, the lookup maps them back.
struct ReferenceIndex {
    profiles : Vec<KmerProfile>,
    groups : Vec<String>,
    lookup : FxHashMap<KmerProfile, usize>,
}

impl ReferenceIndex {
    fn new() -> Self {
        ReferenceIndex{profiles : Vec::new(), groups : Vec::new(), lookup : FxHashMap::default()}
    }

    fn push(&mut self, profile : KmerProfile, group : &str) {
        if self.lookup.contains_key(&profile) {
            log::debug!("{:?} already submitted, skipping duplicate", profile);
            return;
        }
        self.lookup.insert(profile.clone(), self.profiles.len());
        self.profiles.push(profile);
        self.groups.push(group.to_string());
    }

    // scores with their group, in submission order. Unknown answers are dropped.
    fn resolve(&self, scores : Vec<ScoredProfile>) -> Vec<MatchResult> {
        let mut indexed : Vec<(usize, MatchResult)> = scores.into_iter().filter_map(|s| {
            match self.lookup.get(&s.profile) {
                Some(&idx) => Some((idx, MatchResult{similarity : s.similarity, genome : s.profile.genome_name(),
                                            group : self.groups[idx].clone(), profile : s.profile})),
                None => {
                    log::warn!("collaborator answered for unknown kmer list {:?}", s.profile);
                    None
                }
            }
        }).collect();
        // answers may come in any order, ties must follow the submitted list
        indexed.sort_by_key(|(idx, _)| *idx);
        indexed.into_iter().map(|(_, m)| m).collect()
    }
} // end of ReferenceIndex



/// Groups of the best `top` scores, in score order, each once.
pub fn select_genera(mut centroid_matches : Vec<MatchResult>, top : usize) -> Vec<String> {
    sort_matches(&mut centroid_matches);
    let mut genera = Vec::<String>::with_capacity(top);
    for m in centroid_matches.into_iter().take(top) {
        if !genera.contains(&m.group) {
            genera.push(m.group);
        }
    }
    genera
} // end of select_genera


/// Compares query to all centroids of the catalog and returns the candidate genera.
/// A failing comparison fails the stage.
pub fn coarse_stage<B>(query : &KmerProfile, catalog : &ReferenceCatalog, backend : &B, top : usize) -> Result<Vec<String>, KmerIdError>
    where B : SimilarityBackend + ?Sized {
    let mut index = ReferenceIndex::new();
    for group in catalog.group_names() {
        for profile in catalog.centroid_profiles(&group) {
            index.push(profile, &group);
        }
    }
    if index.profiles.is_empty() {
        log::warn!("no centroid in catalog, no candidate genus");
        return Ok(Vec::new());
    }
    log::info!("coarse stage, comparing sample to {} centroids", index.profiles.len());
    let scores = backend.batch_similarity(query, &index.profiles)?;
    let centroid_matches = index.resolve(scores);
    if log::log_enabled!(log::Level::Debug) {
        for m in &centroid_matches {
            log::debug!("centroid {} of {} : {:.4}", m.genome, m.group, m.similarity);
        }
    }
    let genera = select_genera(centroid_matches, top);
    log::info!("candidate genera : {:?}", genera);
    Ok(genera)
} // end of coarse_stage



fn match_genus<B>(query : &KmerProfile, genus : &str, catalog : &ReferenceCatalog, backend : &B) -> Result<Vec<MatchResult>, KmerIdError>
    where B : SimilarityBackend + ?Sized {
    let mut index = ReferenceIndex::new();
    for profile in catalog.refset_profiles(genus) {
        index.push(profile, genus);
    }
    if index.profiles.is_empty() {
        log::warn!("genus {} has no representative genome", genus);
        return Ok(Vec::new());
    }
    log::debug!("fine stage, genus {} : {} representatives", genus, index.profiles.len());
    let scores = backend.batch_similarity(query, &index.profiles)?;
    Ok(index.resolve(scores))
} // end of match_genus


/// Compares query to representatives of each genus (genera run in parallel).
/// Failing genera are logged and contribute nothing.
pub fn fine_stage<B>(query : &KmerProfile, genera : &[String], catalog : &ReferenceCatalog, backend : &B) -> Vec<MatchResult>
    where B : SimilarityBackend + ?Sized {
    let per_genus : Vec<Result<Vec<MatchResult>, KmerIdError>> = genera.par_iter()
            .map(|genus| match_genus(query, genus, catalog, backend))
            .collect();
    let mut results = Vec::<MatchResult>::new();
    for (genus, res) in genera.iter().zip(per_genus) {
        match res {
            Ok(mut matches) => { results.append(&mut matches); }
            Err(e) if e.is_collaborator_failure() => {
                log::warn!("fine stage failed for genus {}, skipping it : {}", genus, e);
            }
            Err(e) => {
                log::error!("unexpected error for genus {}, skipping it : {}", genus, e);
            }
        }
    }
    sort_matches(&mut results);
    results
} // end of fine_stage



/// coarse then fine stage for a sample kmer list
pub fn identify<B>(query : &KmerProfile, catalog : &ReferenceCatalog, backend : &B, params : &IdentifyParams) -> Result<Identification, KmerIdError>
    where B : SimilarityBackend + ?Sized {
    let start_t = SystemTime::now();
    let cpu_start = ProcessTime::now();
    //
    let genera = coarse_stage(query, catalog, backend, params.get_top_centroids())?;
    let results = fine_stage(query, &genera, catalog, backend);
    //
    let cpu_time = cpu_start.elapsed();
    let elapsed_t = start_t.elapsed().map(|d| d.as_secs_f64()).unwrap_or(0.);
    log::info!("identification done, nb results {}, sys time(s) {:.2e} cpu time(s) {:.2e}", results.len(), elapsed_t, cpu_time.as_secs_f64());
    if let Some(best) = results.first() {
        log::info!("best match {} in group {}, similarity {:.4}", best.genome, best.group, best.similarity);
    }
    Ok(Identification{genera, results})
} // end of identify



/// Makes the kmer list of a read file in a temporary file and identifies it.
pub fn identify_reads<C>(reads : &Path, catalog : &ReferenceCatalog, collaborator : &C, params : &IdentifyParams) -> Result<Identification, KmerIdError>
    where C : Collaborator + ?Sized {
    let tmp = tempfile::Builder::new().prefix("kmerid_reads").suffix("_kmers.txt").tempfile()
            .map_err(|e| KmerIdError::io(std::env::temp_dir(), e))?;
    log::info!("making kmer list of {:?} in {:?}", reads, tmp.path());
    let query = collaborator.reads_profile(reads, tmp.path())?;
    identify(&query, catalog, collaborator, params)
    // tmp removed on drop
} // end of identify_reads



#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::GroupEntry;
    use crate::utils::parameters::RefsetParams;
    use std::path::PathBuf;

    // scores looked up by genome name, genomes in `fail` make the batch fail
    struct TableBackend {
        scores : FxHashMap<String, f64>,
        fail : Vec<String>,
        reverse : bool,
    }

    impl TableBackend {
        fn new(scores : &[(&str, f64)]) -> Self {
            TableBackend{scores : scores.iter().map(|(n, s)| (n.to_string(), *s)).collect(), fail : Vec::new(), reverse : false}
        }
    }

    impl SimilarityBackend for TableBackend {
        fn batch_similarity(&self, _query : &KmerProfile, references : &[KmerProfile]) -> Result<Vec<ScoredProfile>, KmerIdError> {
            let mut answer = Vec::new();
            for r in references {
                let name = r.genome_name();
                if self.fail.contains(&name) {
                    return Err(KmerIdError::Collaborator{tool : "intersect".into(), msg : "exit status 1".into()});
                }
                if let Some(s) = self.scores.get(&name) {
                    answer.push(ScoredProfile::new(*s, r.clone()));
                }
            }
            if self.reverse {
                answer.reverse();
            }
            Ok(answer)
        }

        fn jaccard(&self, _a : &KmerProfile, _b : &KmerProfile) -> Result<f64, KmerIdError> {
            unimplemented!()
        }
    }

    fn m(similarity : f64, group : &str, genome : &str) -> MatchResult {
        MatchResult{similarity, profile : KmerProfile::new(format!("/refs/{}/{}_kmers.txt", group, genome)),
                group : group.into(), genome : genome.into()}
    }

    fn catalog(groups : &[(&str, &[&str], &[&str])]) -> ReferenceCatalog {
        let mut catalog = ReferenceCatalog::default();
        for (name, centroids, refset) in groups {
            catalog = catalog.with_group(GroupEntry{name : name.to_string(), folder : PathBuf::from(format!("/refs/{}", name)),
                    matrix : PathBuf::from("/m.tsv"), centroids : centroids.iter().map(|s| s.to_string()).collect(),
                    refset : refset.iter().map(|s| s.to_string()).collect(), params : RefsetParams::default()}, 18);
        }
        catalog
    }

    #[test]
    fn fewer_candidates_than_top() {
        let coarse = vec![m(0.8, "generaA", "a"), m(0.6, "generaB", "b"), m(0.95, "generaC", "c")];
        assert_eq!(select_genera(coarse, 5), vec!["generaC".to_string(), "generaA".to_string(), "generaB".to_string()]);
    }

    #[test]
    fn genera_deduplicated_within_top() {
        let coarse = vec![m(0.9, "x", "x1"), m(0.85, "x", "x2"), m(0.8, "y", "y1"), m(0.7, "z", "z1"), m(0.6, "x", "x3"),
                        m(0.5, "y", "y2"), m(0.4, "w", "w1")];
        // w is only 7th
        assert_eq!(select_genera(coarse, 5), vec!["x".to_string(), "y".to_string(), "z".to_string()]);
    }

    #[test]
    fn stable_sort_on_ties() {
        let mut matches = vec![m(0.5, "g", "first"), m(0.9, "g", "top"), m(0.5, "g", "second")];
        sort_matches(&mut matches);
        let names : Vec<&str> = matches.iter().map(|m| m.genome.as_str()).collect();
        assert_eq!(names, vec!["top", "first", "second"]);
        let before = matches.clone();
        sort_matches(&mut matches);
        assert_eq!(before, matches);
    }

    #[test]
    fn coarse_then_fine() {
        let cat = catalog(&[("alpha", &["a1"], &["a1", "a2"]), ("beta", &["b1"], &["b1", "b2", "b3"]), ("gamma", &["c1"], &["c1"])]);
        let backend = TableBackend::new(&[("a1", 0.3), ("a2", 0.35), ("b1", 0.9), ("b2", 0.97), ("b3", 0.2), ("c1", 0.1)]);
        let query = KmerProfile::new("/tmp/q_kmers.txt");
        let ident = identify(&query, &cat, &backend, &IdentifyParams::new(2, true)).unwrap();
        // gamma centroid is third, out of the top 2
        assert_eq!(ident.genera, vec!["beta".to_string(), "alpha".to_string()]);
        let names : Vec<&str> = ident.results.iter().map(|m| m.genome.as_str()).collect();
        assert_eq!(names, vec!["b2", "b1", "a2", "a1", "b3"]);
        let best = ident.best().unwrap();
        assert_eq!(best.group, "beta");
        assert_eq!(best.profile, KmerProfile::new("/refs/beta/b2_kmers.txt"));
    }

    #[test]
    fn unordered_answers_are_mapped_back() {
        let cat = catalog(&[("alpha", &["a1"], &["a1", "a2"])]);
        let mut backend = TableBackend::new(&[("a1", 0.5), ("a2", 0.5)]);
        backend.reverse = true;
        let query = KmerProfile::new("/tmp/q_kmers.txt");
        let results = fine_stage(&query, &["alpha".to_string()], &cat, &backend);
        // equal scores keep the submitted order, not the answer order
        assert_eq!(results[0].genome, "a1");
        assert_eq!(results[1].genome, "a2");
        assert!(results.iter().all(|r| r.group == "alpha"));
    }

    #[test]
    fn coarse_ties_follow_submitted_order() {
        let cat = catalog(&[("alpha", &["a1"], &["a1"]), ("beta", &["b1"], &["b1"])]);
        let mut backend = TableBackend::new(&[("a1", 0.7), ("b1", 0.7)]);
        backend.reverse = true;
        let query = KmerProfile::new("/tmp/q_kmers.txt");
        let genera = coarse_stage(&query, &cat, &backend, 1).unwrap();
        assert_eq!(genera, vec!["alpha".to_string()]);
    }

    #[test]
    fn failing_genus_is_dropped() {
        let cat = catalog(&[("alpha", &["a1"], &["a1", "a2"]), ("beta", &["b1"], &["b1", "bad"]), ("empty", &["e1"], &[])]);
        let mut backend = TableBackend::new(&[("a1", 0.3), ("a2", 0.35), ("b1", 0.9), ("e1", 0.5)]);
        backend.fail.push("bad".into());
        let query = KmerProfile::new("/tmp/q_kmers.txt");
        let ident = identify(&query, &cat, &backend, &IdentifyParams::default()).unwrap();
        assert_eq!(ident.genera.len(), 3);
        assert!(ident.genera.iter().all(|g| cat.group_names().contains(g)));
        let names : Vec<&str> = ident.results.iter().map(|m| m.genome.as_str()).collect();
        assert_eq!(names, vec!["a2", "a1"]);
    }

    #[test]
    fn failing_coarse_stage_is_fatal() {
        let cat = catalog(&[("alpha", &["a1"], &["a1"])]);
        let mut backend = TableBackend::new(&[("a1", 0.3)]);
        backend.fail.push("a1".into());
        let query = KmerProfile::new("/tmp/q_kmers.txt");
        assert!(identify(&query, &cat, &backend, &IdentifyParams::default()).is_err());
    }

    #[test]
    fn empty_catalog_gives_no_result() {
        let backend = TableBackend::new(&[]);
        let query = KmerProfile::new("/tmp/q_kmers.txt");
        let ident = identify(&query, &ReferenceCatalog::default(), &backend, &IdentifyParams::default()).unwrap();
        assert!(ident.genera.is_empty());
        assert!(ident.best().is_none());
    }
}

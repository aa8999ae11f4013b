//! Reference set construction for a group of genomes (typically a genus).
//!
//! For a folder of genomes we make (or reuse) the kmer list of each genome, the similarity matrix of
//! the group, a small set of genus level centroids and the representative set used in fine matching.
//! Groups larger than the fine cluster count are reduced to that many cluster centroids,
//! smaller groups keep all their genomes.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use cpu_time::ProcessTime;

use crate::catalog::{GroupEntry, ReferenceCatalog};
use crate::cluster::cluster_group;
use crate::errors::KmerIdError;
use crate::kmer::{KmerExtractor, KmerProfile, SimilarityBackend};
use crate::simmatrix::SimilarityMatrix;
use crate::utils::files::{list_genome_files, GenomeFile};
use crate::utils::parameters::RefsetParams;


/// path of the similarity matrix file of a group
pub fn matrix_path(matrix_dir : &Path, group : &str) -> PathBuf {
    matrix_dir.join(format!("{}_simmat.tsv", group))
}


// makes the kmer list of a genome unless it is already there.
// The list is written under a temporary name so an interrupted run leaves no truncated list.
fn get_or_make_profile<E>(genome : &GenomeFile, extractor : &E) -> Result<KmerProfile, KmerIdError>
    where E : KmerExtractor + ?Sized {
    let list_path = genome.kmer_list_path();
    if list_path.is_file() {
        log::info!("{:?} - kmer list found. skipping creation.", list_path);
        return Ok(KmerProfile::new(list_path));
    }
    log::info!("calculating kmer list for {:?} ...", genome.path);
    let mut tmp_name = list_path.file_name().map(|f| f.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = list_path.with_file_name(tmp_name);
    extractor.genome_profile(&genome.path, &tmp_path)?;
    fs::rename(&tmp_path, &list_path).map_err(|e| KmerIdError::io(&list_path, e))?;
    Ok(KmerProfile::new(list_path))
} // end of get_or_make_profile


// a dumped matrix is reused only if it covers exactly the current genomes
fn get_or_make_matrix<B>(path : &Path, names : &[String], profiles : &[KmerProfile], backend : &B) -> Result<SimilarityMatrix, KmerIdError>
    where B : SimilarityBackend + ?Sized {
    if path.is_file() {
        match SimilarityMatrix::reload(path) {
            Ok(matrix) if matrix.get_names() == names => {
                log::info!("found similarity matrix {:?}, skipping creation ...", path);
                return Ok(matrix);
            }
            Ok(matrix) => {
                log::info!("similarity matrix {:?} has {} genomes, group has {}, recomputing", path, matrix.len(), names.len());
            }
            Err(e) => {
                log::warn!("cannot reuse similarity matrix : {}, recomputing", e);
            }
        }
    }
    let matrix = SimilarityMatrix::build(names.to_vec(), profiles, backend)?;
    matrix.dump(path)?;
    Ok(matrix)
} // end of get_or_make_matrix



/// Builds a group from a folder of genome files. Matrix is stored in matrix_dir.
pub fn build_group<E, B>(folder : &Path, name : &str, matrix_dir : &Path, extractor : &E, backend : &B,
                params : &RefsetParams) -> Result<GroupEntry, KmerIdError>
    where E : KmerExtractor + ?Sized, B : SimilarityBackend + ?Sized {
    //
    let start_t = SystemTime::now();
    let cpu_start = ProcessTime::now();
    let folder = fs::canonicalize(folder).map_err(|e| KmerIdError::io(folder, e))?;
    let name = name.to_lowercase();
    log::info!("building reference group {} from {:?}", name, folder);
    //
    let genomes = list_genome_files(&folder)?;
    if genomes.is_empty() {
        return Err(KmerIdError::EmptyGroup(name));
    }
    let mut profiles = Vec::<KmerProfile>::with_capacity(genomes.len());
    for genome in &genomes {
        profiles.push(get_or_make_profile(genome, extractor)?);
    }
    log::info!("{} kmer lists made or found", profiles.len());
    let names : Vec<String> = genomes.iter().map(|g| g.name.clone()).collect();
    //
    let matrix_file = matrix_path(matrix_dir, &name);
    let matrix = get_or_make_matrix(&matrix_file, &names, &profiles, backend)?;
    //
    let nb_genomes = matrix.len();
    let coarse_k = params.get_coarse_clusters().min(nb_genomes);
    if coarse_k < params.get_coarse_clusters() {
        log::warn!("group {} has only {} genomes, using {} centroids instead of {}", name, nb_genomes, coarse_k, params.get_coarse_clusters());
    }
    let centroids = cluster_group(&matrix, coarse_k)?.centroid_names(&matrix);
    log::info!("group {} centroids : {:?}", name, centroids);
    //
    let refset = if nb_genomes > params.get_fine_clusters() {
        cluster_group(&matrix, params.get_fine_clusters())?.centroid_names(&matrix)
    }
    else {
        matrix.get_names().to_vec()
    };
    log::info!("group {} reference set has {} genomes", name, refset.len());
    //
    let cpu_time = cpu_start.elapsed();
    let elapsed_t = start_t.elapsed().map(|d| d.as_secs_f64()).unwrap_or(0.);
    log::info!("group {} done, sys time(s) {:.2e} cpu time(s) {:.2e}", name, elapsed_t, cpu_time.as_secs_f64());
    //
    Ok(GroupEntry{name, folder, matrix : matrix_file, centroids, refset, params : *params})
} // end of build_group



/// Builds a group and records it in the catalog at catalog_path. Matrices go beside the catalog.
/// Returns the updated catalog.
pub fn setup_group<E, B>(catalog_path : &Path, folder : &Path, name : &str, extractor : &E, backend : &B,
                params : &RefsetParams, kmer_size : usize) -> Result<ReferenceCatalog, KmerIdError>
    where E : KmerExtractor + ?Sized, B : SimilarityBackend + ?Sized {
    let catalog = ReferenceCatalog::load_or_default(catalog_path)?;
    catalog.check_kmer_size(kmer_size)?;
    let matrix_dir = match catalog_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let entry = build_group(folder, name, &matrix_dir, extractor, backend, params)?;
    let updated = catalog.with_group(entry, kmer_size);
    updated.save(catalog_path)?;
    Ok(updated)
} // end of setup_group

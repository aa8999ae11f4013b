//! The reference catalog : what reference set construction leaves for identification.
//!
//! It is a json document with the sections
//! - group_folders : group -> folder containing genomes and their kmer lists
//! - matrices : group -> similarity matrix file
//! - centroids : group -> names of genus level centroids
//! - refsets : group -> names of representative genomes
//! - refset_params : group -> clustering parameters used to build it
//!
//! plus the kmer size lists were made with and a version bumped at each update.
//! Absent sections read as empty. Updating is a pure function returning a new catalog,
//! the file is replaced atomically.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::KmerIdError;
use crate::kmer::KmerProfile;
use crate::utils::files::kmer_list_path;
use crate::utils::parameters::RefsetParams;


/// what reference set construction produced for one group
#[derive(Clone, Debug, PartialEq)]
pub struct GroupEntry {
    pub name : String,
    pub folder : PathBuf,
    pub matrix : PathBuf,
    pub centroids : Vec<String>,
    pub refset : Vec<String>,
    /// clustering parameters the group was built with
    pub params : RefsetParams,
}


#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceCatalog {
    #[serde(default)]
    version : u64,
    #[serde(default)]
    kmer_size : Option<usize>,
    #[serde(default)]
    group_folders : BTreeMap<String, PathBuf>,
    #[serde(default)]
    matrices : BTreeMap<String, PathBuf>,
    #[serde(default)]
    centroids : BTreeMap<String, Vec<String>>,
    #[serde(default)]
    refsets : BTreeMap<String, Vec<String>>,
    #[serde(default)]
    refset_params : BTreeMap<String, RefsetParams>,
}


impl ReferenceCatalog {

    /// reload a catalog, a missing file gives an empty catalog
    pub fn load_or_default(path : &Path) -> Result<Self, KmerIdError> {
        if !path.exists() {
            log::info!("no catalog at {:?}, starting a new one", path);
            return Ok(ReferenceCatalog::default());
        }
        ReferenceCatalog::load(path)
    }

    pub fn load(path : &Path) -> Result<Self, KmerIdError> {
        let file = OpenOptions::new().read(true).open(path).map_err(|e| KmerIdError::io(path, e))?;
        let catalog : ReferenceCatalog = serde_json::from_reader(BufReader::new(file))?;
        log::info!("reloaded catalog {:?}, version {}, nb groups {}", path, catalog.version, catalog.group_folders.len());
        Ok(catalog)
    }


    /// Returns the catalog with group replaced (or added). Nothing of other groups changes.
    pub fn with_group(&self, entry : GroupEntry, kmer_size : usize) -> Self {
        let mut updated = self.clone();
        updated.version += 1;
        updated.kmer_size = Some(kmer_size);
        updated.group_folders.insert(entry.name.clone(), entry.folder);
        updated.matrices.insert(entry.name.clone(), entry.matrix);
        updated.centroids.insert(entry.name.clone(), entry.centroids);
        updated.refsets.insert(entry.name.clone(), entry.refset);
        updated.refset_params.insert(entry.name, entry.params);
        updated
    } // end of with_group


    /// write in a temporary file beside path then rename it.
    pub fn save(&self, path : &Path) -> Result<(), KmerIdError> {
        let mut tmp_name = path.file_name().map(|f| f.to_os_string()).unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);
        log::info!("dumping catalog version {} in {:?}", self.version, path);
        {
            let file = OpenOptions::new().write(true).create(true).truncate(true).open(&tmp_path).map_err(|e| KmerIdError::io(&tmp_path, e))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, self)?;
            writer.flush().map_err(|e| KmerIdError::io(&tmp_path, e))?;
            writer.get_ref().sync_all().map_err(|e| KmerIdError::io(&tmp_path, e))?;
        }
        fs::rename(&tmp_path, path).map_err(|e| KmerIdError::io(path, e))?;
        Ok(())
    } // end of save


    pub fn get_version(&self) -> u64 {
        self.version
    }

    /// lists must have been made with the kmer size we use
    pub fn check_kmer_size(&self, kmer_size : usize) -> Result<(), KmerIdError> {
        match self.kmer_size {
            Some(k) if k != kmer_size => Err(KmerIdError::Catalog(format!("catalog built with kmer size {}, asked for {}", k, kmer_size))),
            _ => Ok(()),
        }
    }

    /// groups in name order
    pub fn group_names(&self) -> Vec<String> {
        self.group_folders.keys().cloned().collect()
    }

    pub fn group_folder(&self, group : &str) -> Option<&Path> {
        self.group_folders.get(group).map(|p| p.as_path())
    }

    pub fn matrix_path(&self, group : &str) -> Option<&Path> {
        self.matrices.get(group).map(|p| p.as_path())
    }

    pub fn centroid_names(&self, group : &str) -> &[String] {
        self.centroids.get(group).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn refset_names(&self, group : &str) -> &[String] {
        self.refsets.get(group).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// None for groups recorded before parameters were stored
    pub fn refset_params(&self, group : &str) -> Option<&RefsetParams> {
        self.refset_params.get(group)
    }

    // kmer lists of names in group folder. A group without folder has none.
    fn profiles(&self, group : &str, names : &[String]) -> Vec<KmerProfile> {
        match self.group_folder(group) {
            Some(folder) => names.iter().map(|n| KmerProfile::new(kmer_list_path(folder, n))).collect(),
            None => {
                log::warn!("group {} has no folder in catalog", group);
                Vec::new()
            }
        }
    }

    pub fn centroid_profiles(&self, group : &str) -> Vec<KmerProfile> {
        self.profiles(group, self.centroid_names(group))
    }

    pub fn refset_profiles(&self, group : &str) -> Vec<KmerProfile> {
        self.profiles(group, self.refset_names(group))
    }

} // end of impl ReferenceCatalog



#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name : &str, folder : &str, refset : &[&str]) -> GroupEntry {
        GroupEntry{name : name.into(), folder : PathBuf::from(folder), matrix : PathBuf::from(format!("/cat/{}_simmat.tsv", name)),
                centroids : vec![refset[0].to_string()], refset : refset.iter().map(|s| s.to_string()).collect(),
                params : RefsetParams::new(2, refset.len())}
    }

    #[test]
    fn update_is_pure_and_versioned() {
        let empty = ReferenceCatalog::default();
        let one = empty.with_group(entry("salmonella", "/refs/salm", &["s1", "s2"]), 18);
        assert_eq!(empty.get_version(), 0);
        assert!(empty.group_names().is_empty());
        assert_eq!(one.get_version(), 1);
        let two = one.with_group(entry("ecoli", "/refs/ecoli", &["e1"]), 18);
        assert_eq!(two.group_names(), vec!["ecoli".to_string(), "salmonella".to_string()]);
        // rebuilding a group replaces its lists wholly
        let three = two.with_group(entry("salmonella", "/refs/salm", &["s3"]), 18);
        assert_eq!(three.refset_names("salmonella"), &["s3".to_string()]);
        assert_eq!(three.refset_names("ecoli"), &["e1".to_string()]);
        assert_eq!(three.refset_profiles("salmonella"), vec![KmerProfile::new("/refs/salm/s3_kmers.txt")]);
    }

    #[test]
    fn absent_sections_are_empty() {
        let catalog : ReferenceCatalog = serde_json::from_str(r#"{"group_folders" : {"x" : "/refs/x"}}"#).unwrap();
        assert_eq!(catalog.group_names(), vec!["x".to_string()]);
        assert!(catalog.centroid_profiles("x").is_empty());
        assert!(catalog.refset_profiles("unknown").is_empty());
        assert!(catalog.matrix_path("x").is_none());
        assert!(catalog.refset_params("x").is_none());
        assert!(catalog.check_kmer_size(21).is_ok());
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("catalog.json");
        assert_eq!(ReferenceCatalog::load_or_default(&path).unwrap(), ReferenceCatalog::default());
        let catalog = ReferenceCatalog::default().with_group(entry("listeria", "/refs/lis", &["l1", "l2"]), 18);
        catalog.save(&path).unwrap();
        assert!(!dir.path().join("catalog.json.tmp").exists());
        let reloaded = ReferenceCatalog::load(&path).unwrap();
        assert_eq!(reloaded, catalog);
        assert_eq!(reloaded.refset_params("listeria"), Some(&RefsetParams::new(2, 2)));
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"refset_params\""));
        assert!(reloaded.check_kmer_size(18).is_ok());
        assert!(matches!(reloaded.check_kmer_size(21), Err(KmerIdError::Catalog(_))));
    }
}

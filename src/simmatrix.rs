//! All pairs similarity matrix of the kmer lists of a reference group.
//!
//! The matrix is dumped as a tab separated file: a header line with an empty first cell followed
//! by genome names, then one line per genome, its name followed by its similarities in header order.

use std::path::Path;
use std::time::SystemTime;

use cpu_time::ProcessTime;

use crate::errors::KmerIdError;
use crate::kmer::{KmerProfile, SimilarityBackend};


/// symmetric matrix of similarities in [0,1], diagonal is 1.
#[derive(Clone, Debug, PartialEq)]
pub struct SimilarityMatrix {
    names : Vec<String>,
    /// row major, size names.len()^2
    values : Vec<f64>,
}


impl SimilarityMatrix {
    /// builds from a full square of values. Checks shape, range, diagonal and symmetry.
    pub fn from_values(names : Vec<String>, values : Vec<f64>) -> Result<Self, String> {
        let n = names.len();
        if values.len() != n * n {
            return Err(format!("expecting {} values for {} names, got {}", n * n, n, values.len()));
        }
        if let Some(pos) = values.iter().position(|v| !v.is_finite() || *v < 0. || *v > 1.) {
            return Err(format!("value {} between {} and {} is not a similarity in [0,1]", values[pos], names[pos / n], names[pos % n]));
        }
        for i in 0..n {
            if (values[i * n + i] - 1.).abs() > 1.0e-6 {
                return Err(format!("diagonal value of {} is {}", names[i], values[i * n + i]));
            }
            for j in 0..i {
                if (values[i * n + j] - values[j * n + i]).abs() > 1.0e-6 {
                    return Err(format!("not symmetric between {} and {}", names[i], names[j]));
                }
            }
        }
        Ok(SimilarityMatrix{names, values})
    } // end of from_values


    /// Computes the matrix calling jaccard once for each unordered pair of profiles.
    /// Any failing pair makes the whole build fail.
    pub fn build<B>(names : Vec<String>, profiles : &[KmerProfile], backend : &B) -> Result<Self, KmerIdError>
        where B : SimilarityBackend + ?Sized {
        //
        assert_eq!(names.len(), profiles.len(), "one name per profile");
        let n = profiles.len();
        let start_t = SystemTime::now();
        let cpu_start = ProcessTime::now();
        let nb_pairs = n * n.saturating_sub(1) / 2;
        log::info!("computing similarity matrix, nb genomes {}, nb pairs {}", n, nb_pairs);
        //
        let mut values = vec![0f64; n * n];
        let mut nb_done = 0;
        for i in 0..n {
            values[i * n + i] = 1.;
            for j in (i + 1)..n {
                let sim = backend.jaccard(&profiles[i], &profiles[j])?;
                values[i * n + j] = sim;
                values[j * n + i] = sim;
                nb_done += 1;
                if nb_done % 1000 == 0 {
                    log::info!("nb pairs done : {} / {}", nb_done, nb_pairs);
                }
            }
        }
        //
        let cpu_time = cpu_start.elapsed();
        let elapsed_t = start_t.elapsed().map(|d| d.as_secs_f64()).unwrap_or(0.);
        log::info!("similarity matrix done, sys time(s) {:.2e} cpu time(s) {:.2e}", elapsed_t, cpu_time.as_secs_f64());
        //
        Ok(SimilarityMatrix{names, values})
    } // end of build


    /// number of genomes
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get_names(&self) -> &[String] {
        &self.names
    }

    #[inline]
    pub fn get(&self, i : usize, j : usize) -> f64 {
        self.values[i * self.names.len() + j]
    }

    /// distance is 1 - similarity
    #[inline]
    pub fn distance(&self, i : usize, j : usize) -> f64 {
        1. - self.get(i, j)
    }


    /// dump in tab separated file
    pub fn dump(&self, path : &Path) -> Result<(), KmerIdError> {
        log::info!("dumping similarity matrix in {:?}", path);
        let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?;
        let mut header = Vec::<String>::with_capacity(self.len() + 1);
        header.push(String::new());
        header.extend(self.names.iter().cloned());
        writer.write_record(&header)?;
        for (i, name) in self.names.iter().enumerate() {
            let mut row = Vec::<String>::with_capacity(self.len() + 1);
            row.push(name.clone());
            for j in 0..self.len() {
                if i == j {
                    row.push(String::from("1.0"));
                }
                else {
                    row.push(format!("{:.6}", self.get(i, j)));
                }
            }
            writer.write_record(&row)?;
        }
        writer.flush().map_err(|e| KmerIdError::io(path, e))?;
        Ok(())
    } // end of dump


    /// reload a dumped matrix, any shape or content problem gives MalformedMatrix
    pub fn reload(path : &Path) -> Result<Self, KmerIdError> {
        let malformed = |msg : String| KmerIdError::MalformedMatrix{path : path.to_path_buf(), msg};
        let mut reader = csv::ReaderBuilder::new().delimiter(b'\t').has_headers(false).flexible(true).from_path(path)?;
        let mut records = reader.records();
        let header = match records.next() {
            Some(header) => header?,
            None         => { return Err(malformed(String::from("empty file"))); }
        };
        let names : Vec<String> = header.iter().skip(1).map(|s| s.trim().to_string()).collect();
        let n = names.len();
        let mut values = Vec::<f64>::with_capacity(n * n);
        let mut nb_rows = 0;
        for record in records {
            let record = record?;
            if record.len() != n + 1 {
                return Err(malformed(format!("row {} has {} fields, expecting {}", nb_rows + 1, record.len(), n + 1)));
            }
            if nb_rows >= n || record.get(0).map(|s| s.trim()) != Some(names[nb_rows].as_str()) {
                return Err(malformed(format!("row {} does not match header names", nb_rows + 1)));
            }
            for field in record.iter().skip(1) {
                let v = field.trim().parse::<f64>().map_err(|_| malformed(format!("bad value {:?}", field)))?;
                values.push(v);
            }
            nb_rows += 1;
        }
        if nb_rows != n {
            return Err(malformed(format!("{} rows for {} names", nb_rows, n)));
        }
        log::debug!("reloaded similarity matrix {:?}, nb genomes {}", path, n);
        SimilarityMatrix::from_values(names, values).map_err(malformed)
    } // end of reload

} // end of impl SimilarityMatrix

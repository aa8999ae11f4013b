//! Collaborators run as external binaries found in a tool directory.
//!
//! - kmer_refset_process k genome.fa > list
//! - cat reads | kmer_reads_process_stdin k > list  (sequence lines only on stdin)
//! - intersect_kmer_lists_filelist query ref1 ... refn : one line per ref "percent\tdistance\tpath"
//! - kmer_jaccard_index a b : one line "jaccard\ta\tb"

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use crate::errors::KmerIdError;

use super::profile::KmerProfile;
use super::{KmerExtractor, ScoredProfile, SimilarityBackend};


const REFSET_TOOL : &str = "kmer_refset_process";
const READS_TOOL : &str = "kmer_reads_process_stdin";
const INTERSECT_TOOL : &str = "intersect_kmer_lists_filelist";
const JACCARD_TOOL : &str = "kmer_jaccard_index";



// a similarity field, divided by scale, must be a number in [0,1]
fn parse_score(field : &str, scale : f64, what : &str, line : &str) -> Result<f64, KmerIdError> {
    let bad = || KmerIdError::Parse{what : what.to_string(), line : line.to_string()};
    let value = field.trim().parse::<f64>().map_err(|_| bad())? / scale;
    if !value.is_finite() || !(0. ..=1.).contains(&value) {
        return Err(bad());
    }
    Ok(value)
}


/// Parse the output of intersect tool. Its similarity is a percentage, we return fractions.
/// No output gives no score.
pub fn parse_intersect_output(output : &str) -> Result<Vec<ScoredProfile>, KmerIdError> {
    let mut scores = Vec::<ScoredProfile>::new();
    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let cols : Vec<&str> = line.split('\t').map(|c| c.trim()).collect();
        if cols.len() < 3 {
            return Err(KmerIdError::Parse{what : String::from("similarity line"), line : line.to_string()});
        }
        let similarity = parse_score(cols[0], 100., "similarity", line)?;
        scores.push(ScoredProfile::new(similarity, KmerProfile::new(cols[2])));
    }
    if scores.is_empty() {
        log::warn!("{} gave no output", INTERSECT_TOOL);
    }
    Ok(scores)
} // end of parse_intersect_output


/// first field of first line is the jaccard index
pub fn parse_jaccard_output(output : &str) -> Result<f64, KmerIdError> {
    let line = output.lines().find(|l| !l.trim().is_empty())
            .ok_or_else(|| KmerIdError::Collaborator{tool : JACCARD_TOOL.to_string(), msg : String::from("no output")})?;
    let field = line.split('\t').next().unwrap_or("");
    parse_score(field, 1., "jaccard index", line)
}



/// send sequence lines of a read file to a tool stdin
fn feed_sequences(reads : &Path, stdin : ChildStdin) -> Result<usize, KmerIdError> {
    let mut reader = needletail::parse_fastx_file(reads)
            .map_err(|e| KmerIdError::Collaborator{tool : String::from("fastx parser"), msg : format!("{:?} : {}", reads, e)})?;
    let mut writer = BufWriter::new(stdin);
    let mut nb_reads = 0;
    while let Some(record) = reader.next() {
        let record = record.map_err(|e| KmerIdError::Collaborator{tool : String::from("fastx parser"), msg : format!("{:?} : {}", reads, e)})?;
        writer.write_all(&record.seq()).map_err(|e| KmerIdError::io(reads, e))?;
        writer.write_all(b"\n").map_err(|e| KmerIdError::io(reads, e))?;
        nb_reads += 1;
    }
    writer.flush().map_err(|e| KmerIdError::io(reads, e))?;
    Ok(nb_reads)
} // end of feed_sequences


// write a gzipped genome as plain fasta, the refset tool cannot read compressed files
fn decompress_genome(genome : &Path, plain : &Path) -> Result<(), KmerIdError> {
    let mut reader = needletail::parse_fastx_file(genome)
            .map_err(|e| KmerIdError::Collaborator{tool : String::from("fastx parser"), msg : format!("{:?} : {}", genome, e)})?;
    let file = File::create(plain).map_err(|e| KmerIdError::io(plain, e))?;
    let mut writer = BufWriter::new(file);
    while let Some(record) = reader.next() {
        let record = record.map_err(|e| KmerIdError::Collaborator{tool : String::from("fastx parser"), msg : format!("{:?} : {}", genome, e)})?;
        record.write(&mut writer, None)
            .map_err(|e| KmerIdError::Collaborator{tool : String::from("fasta writer"), msg : format!("{:?} : {}", plain, e)})?;
    }
    writer.flush().map_err(|e| KmerIdError::io(plain, e))
} // end of decompress_genome



/// Runs the C kmer tools. Without timeout a call blocks until the tool exits.
pub struct ExternalTools {
    tools_dir : PathBuf,
    kmer_size : usize,
    timeout : Option<Duration>,
}

impl ExternalTools {
    pub fn new(tools_dir : PathBuf, kmer_size : usize, timeout : Option<Duration>) -> Self {
        ExternalTools{tools_dir, kmer_size, timeout}
    }

    fn wait_child(&self, tool : &str, child : &mut Child) -> Result<ExitStatus, KmerIdError> {
        let Some(limit) = self.timeout else {
            return child.wait().map_err(|e| KmerIdError::io(self.tools_dir.join(tool), e));
        };
        let start = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => { return Ok(status); }
                Ok(None)         => {}
                Err(e)           => {
                    let _ = child.kill();
                    return Err(KmerIdError::io(self.tools_dir.join(tool), e));
                }
            }
            if start.elapsed() > limit {
                log::warn!("{} still running after {:?}, killing it", tool, limit);
                let _ = child.kill();
                let _ = child.wait();
                return Err(KmerIdError::Timeout{tool : tool.to_string(), secs : limit.as_secs()});
            }
            std::thread::sleep(Duration::from_millis(20));
        }
    } // end of wait_child


    /// Runs tool, returns its stdout (empty if redirected to out_file).
    /// If reads is given its sequences are streamed to the tool stdin.
    fn run(&self, tool : &str, args : &[OsString], out_file : Option<&Path>, reads : Option<&Path>) -> Result<String, KmerIdError> {
        let tool_path = self.tools_dir.join(tool);
        log::debug!("running {:?} with {} args", tool_path, args.len());
        let stdout = match out_file {
            Some(path) => Stdio::from(File::create(path).map_err(|e| KmerIdError::io(path, e))?),
            None       => Stdio::piped(),
        };
        let mut child = Command::new(&tool_path)
            .args(args)
            .stdin(if reads.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(stdout)
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| KmerIdError::io(&tool_path, e))?;
        //
        let stdin = child.stdin.take();
        let child_out = child.stdout.take();
        let child_err = child.stderr.take();
        let (status, output, errors, fed) = std::thread::scope(|scope| {
            let feeder = match (reads, stdin) {
                (Some(reads), Some(stdin)) => Some(scope.spawn(move || feed_sequences(reads, stdin))),
                _                          => None,
            };
            let out_reader = child_out.map(|mut out| scope.spawn(move || {
                let mut buffer = String::new();
                out.read_to_string(&mut buffer).map(|_| buffer)
            }));
            let err_reader = child_err.map(|mut err| scope.spawn(move || {
                let mut buffer = String::new();
                let _ = err.read_to_string(&mut buffer);
                buffer
            }));
            let status = self.wait_child(tool, &mut child);
            let fed = feeder.map(|h| h.join().unwrap_or(Ok(0)));
            let output = out_reader.map(|h| h.join().unwrap_or_else(|_| Ok(String::new())));
            let errors = err_reader.map(|h| h.join().unwrap_or_default()).unwrap_or_default();
            (status, output, errors, fed)
        });
        let status = status?;
        if !status.success() {
            return Err(KmerIdError::Collaborator{tool : tool.to_string(), msg : format!("exit status {}, stderr : {}", status, errors.trim())});
        }
        if let Some(fed) = fed {
            let nb_reads = fed?;
            log::info!("{} : streamed {} reads", tool, nb_reads);
        }
        match output {
            Some(output) => output.map_err(|e| KmerIdError::io(&tool_path, e)),
            None         => Ok(String::new()),
        }
    } // end of run
} // end of impl ExternalTools



impl KmerExtractor for ExternalTools {
    fn genome_profile(&self, genome : &Path, out : &Path) -> Result<KmerProfile, KmerIdError> {
        let kmer_arg = OsString::from(self.kmer_size.to_string());
        let gzipped = genome.extension().map(|e| e == "gz").unwrap_or(false);
        if gzipped {
            let plain = out.with_extension("plain.fa");
            log::info!("decompressing {:?} ...", genome);
            decompress_genome(genome, &plain)?;
            let res = self.run(REFSET_TOOL, &[kmer_arg, plain.clone().into_os_string()], Some(out), None);
            let _ = fs::remove_file(&plain);
            res?;
        }
        else {
            self.run(REFSET_TOOL, &[kmer_arg, genome.as_os_str().to_os_string()], Some(out), None)?;
        }
        Ok(KmerProfile::new(out))
    } // end of genome_profile

    fn reads_profile(&self, reads : &Path, out : &Path) -> Result<KmerProfile, KmerIdError> {
        let kmer_arg = OsString::from(self.kmer_size.to_string());
        self.run(READS_TOOL, &[kmer_arg], Some(out), Some(reads))?;
        Ok(KmerProfile::new(out))
    }
} // end of impl KmerExtractor for ExternalTools



impl SimilarityBackend for ExternalTools {
    fn batch_similarity(&self, query : &KmerProfile, references : &[KmerProfile]) -> Result<Vec<ScoredProfile>, KmerIdError> {
        // the tool wants at least one reference
        if references.is_empty() {
            return Ok(Vec::new());
        }
        let mut args = Vec::<OsString>::with_capacity(references.len() + 1);
        args.push(query.get_path().as_os_str().to_os_string());
        args.extend(references.iter().map(|r| r.get_path().as_os_str().to_os_string()));
        let output = self.run(INTERSECT_TOOL, &args, None, None)?;
        parse_intersect_output(&output)
    }

    fn jaccard(&self, a : &KmerProfile, b : &KmerProfile) -> Result<f64, KmerIdError> {
        let args = [a.get_path().as_os_str().to_os_string(), b.get_path().as_os_str().to_os_string()];
        let output = self.run(JACCARD_TOOL, &args, None, None)?;
        parse_jaccard_output(&output)
    }
} // end of impl SimilarityBackend for ExternalTools

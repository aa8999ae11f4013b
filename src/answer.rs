//! Dump of identification and mixing analysis results.
//!
//! Identification block : one line per match, `similarity\tgroup\tgenome`.
//! Mixing block : the top hit then one line per other reference, `|delta|\tdelta\tgroup\tgenome`.

use std::io::Write;

use crate::identify::MatchResult;
use crate::mixture::MixtureReport;


/// dump identification results, best first. Returns the number of lines dumped.
pub fn dump_identification<W : Write>(results : &[MatchResult], out : &mut W) -> std::io::Result<usize> {
    writeln!(out, "#Kmer based similarities")?;
    writeln!(out, "#similarity\tgroups\tfile")?;
    for r in results {
        writeln!(out, "{:.6}\t{}\t{}", r.similarity, r.group, r.genome)?;
    }
    Ok(results.len())
} // end of dump_identification


/// dump the mixing analysis block
pub fn dump_mixture<W : Write>(report : &MixtureReport, out : &mut W) -> std::io::Result<usize> {
    writeln!(out)?;
    writeln!(out, "#Mixing analysis:")?;
    writeln!(out, "#Top hit - Group: {}\tFile: {}\tSimilarity: {:.6}", report.top.group, report.top.genome, report.top.similarity)?;
    writeln!(out)?;
    writeln!(out, "#Comparison of results:")?;
    writeln!(out, "#sim diff absolute\tsim(reads,thisfile)-sim(tophit,thisfile)\tgroup\tfile")?;
    for e in &report.entries {
        writeln!(out, "{:.6}\t{:.6}\t{}\t{}", e.abs_delta, e.delta, e.group, e.genome)?;
    }
    Ok(report.entries.len())
} // end of dump_mixture

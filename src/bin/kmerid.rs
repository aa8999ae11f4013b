//! kmerid : sample identification against clustered reference genome sets.
//!
//! kmerid \[--tools DIR\] \[--timeout SECS\] setup --folder [-f] dir --name [-n] group --catalog [-c] catalog.json
//!
//! - folder : directory of genome fasta files (.fa .fna .fas .fasta, possibly gzipped) of one group, typically a genus.
//!   Kmer lists are written beside the genomes and reused on later runs.
//! - name : name of the group, stored lowercase.
//! - catalog : json file recording all groups, created if absent. Similarity matrices are written in its directory.
//!
//! kmerid \[--tools DIR\] \[--timeout SECS\] identify --fastq [-f] reads.fastq --catalog [-c] catalog.json \[--nomix\]
//!
//! - fastq : read file, possibly gzipped.
//! - nomix : skip the mixing analysis.
//!
//! --tools : directory containing the external kmer binaries, computations are done in process otherwise.
//! --timeout : timeout in seconds for each external binary call.
//!
//! Results are written on stdout, logs go to stderr (set RUST_LOG=info to see them).

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command};

// for logging (debug mostly, switched at compile time in cargo.toml)
use env_logger::Builder;

use kmerid::answer::{dump_identification, dump_mixture};
use kmerid::catalog::ReferenceCatalog;
use kmerid::identify::identify_reads;
use kmerid::kmer::get_collaborator;
use kmerid::mixture::check_mixing;
use kmerid::refset::setup_group;
use kmerid::utils::parameters::*;


// install a logger facility
pub fn init_log() -> u64 {
    Builder::from_default_env().init();
    // stdout is kept for results
    eprintln!("\n ************** initializing logger *****************\n");
    return 1;
}


fn parse_tools(matches : &ArgMatches) -> ToolParams {
    let tools_dir = matches.get_one::<String>("tools").map(PathBuf::from);
    let timeout = matches.get_one::<u64>("timeout").copied();
    ToolParams::new(tools_dir, timeout)
}


fn do_setup(matches : &ArgMatches, tool_params : &ToolParams) -> anyhow::Result<()> {
    let folder = PathBuf::from(matches.get_one::<String>("folder").context("missing --folder")?);
    let name = matches.get_one::<String>("name").context("missing --name")?;
    let catalog_path = PathBuf::from(matches.get_one::<String>("catalog").context("missing --catalog")?);
    //
    let kmer_params = KmerParams::default();
    let refset_params = RefsetParams::default();
    let collaborator = get_collaborator(&kmer_params, tool_params);
    let catalog = setup_group(&catalog_path, &folder, name, collaborator.as_ref(), collaborator.as_ref(), &refset_params,
                    kmer_params.get_kmer_size())
            .with_context(|| format!("setting up group {} from {:?}", name, folder))?;
    //
    let group = name.to_lowercase();
    println!("group {} : {} centroids, {} representative genomes", group, catalog.centroid_names(&group).len(), catalog.refset_names(&group).len());
    if let Some(params) = catalog.refset_params(&group) {
        log::info!("group {} clustering parameters : {:?}", group, params);
    }
    println!("catalog {:?} now at version {} with {} groups", catalog_path, catalog.get_version(), catalog.group_names().len());
    Ok(())
} // end of do_setup


fn do_identify(matches : &ArgMatches, tool_params : &ToolParams) -> anyhow::Result<()> {
    let reads = PathBuf::from(matches.get_one::<String>("fastq").context("missing --fastq")?);
    let catalog_path = PathBuf::from(matches.get_one::<String>("catalog").context("missing --catalog")?);
    let mixing = !matches.get_flag("nomix");
    let params = IdentifyParams::new(IdentifyParams::default().get_top_centroids(), mixing);
    //
    let kmer_params = KmerParams::default();
    let catalog = ReferenceCatalog::load(&catalog_path).with_context(|| format!("reloading catalog {:?}", catalog_path))?;
    catalog.check_kmer_size(kmer_params.get_kmer_size())?;
    let collaborator = get_collaborator(&kmer_params, tool_params);
    //
    let identification = identify_reads(&reads, &catalog, collaborator.as_ref(), &params)
            .with_context(|| format!("identifying {:?}", reads))?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    dump_identification(&identification.results, &mut out)?;
    out.flush()?;
    if identification.results.is_empty() {
        log::warn!("no reference matched {:?}", reads);
    }
    //
    if params.get_mixing() {
        let report = check_mixing(&identification.results, collaborator.as_ref()).context("mixing analysis")?;
        if let Some(report) = report {
            dump_mixture(&report, &mut out)?;
            out.flush()?;
        }
    }
    Ok(())
} // end of do_identify



fn main() -> anyhow::Result<()> {
    let _ = init_log();
    log::info!("kmerid started at {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
    //
    let setup_cmd = Command::new("setup")
        .about("Build the reference set of a group of genomes and record it in the catalog")
        .arg(Arg::new("folder")
            .short('f')
            .long("folder")
            .value_name("DIR")
            .help("directory of genome fasta files of the group")
            .required(true)
            .value_parser(clap::value_parser!(String))
        )
        .arg(Arg::new("name")
            .short('n')
            .long("name")
            .value_name("GROUP")
            .help("name of the group")
            .required(true)
            .value_parser(clap::value_parser!(String))
        )
        .arg(Arg::new("catalog")
            .short('c')
            .long("catalog")
            .value_name("CATALOG")
            .help("json catalog file, created if absent")
            .required(true)
            .value_parser(clap::value_parser!(String))
        );
    //
    let identify_cmd = Command::new("identify")
        .about("Identify a read sample and check for mixture")
        .arg(Arg::new("fastq")
            .short('f')
            .long("fastq")
            .value_name("READS")
            .help("fastq file of the sample, possibly gzipped")
            .required(true)
            .value_parser(clap::value_parser!(String))
        )
        .arg(Arg::new("catalog")
            .short('c')
            .long("catalog")
            .value_name("CATALOG")
            .help("json catalog made by setup")
            .required(true)
            .value_parser(clap::value_parser!(String))
        )
        .arg(Arg::new("nomix")
            .short('n')
            .long("nomix")
            .help("do not run the mixing analysis")
            .action(ArgAction::SetTrue)
        );
    //
    let matches = Command::new("kmerid")
        .version("0.1.0")
        .about("Kmer based identification of sequencing samples and mixture detection")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(Arg::new("tools")
            .long("tools")
            .value_name("DIR")
            .help("directory of external kmer binaries, in process computations if absent")
            .global(true)
            .value_parser(clap::value_parser!(String))
        )
        .arg(Arg::new("timeout")
            .long("timeout")
            .value_name("SECS")
            .help("timeout in seconds of each external binary call")
            .global(true)
            .value_parser(clap::value_parser!(u64))
        )
        .subcommand(setup_cmd)
        .subcommand(identify_cmd)
        .get_matches();
    //
    // global options are propagated to subcommand matches
    match matches.subcommand() {
        Some(("setup", sub_m)) => do_setup(sub_m, &parse_tools(sub_m)),
        Some(("identify", sub_m)) => do_identify(sub_m, &parse_tools(sub_m)),
        _ => {
            log::error!("unknown subcommand");
            std::process::exit(1);
        }
    }
} // end of main

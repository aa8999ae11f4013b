//! setup of 2 groups then identification of read samples, with in process kmer computations

use std::fs;
use std::io::Write;
use std::path::Path;

use kmerid::answer::{dump_identification, dump_mixture};
use kmerid::catalog::ReferenceCatalog;
use kmerid::identify::identify_reads;
use kmerid::kmer::NativeKmers;
use kmerid::mixture::check_mixing;
use kmerid::refset::setup_group;
use kmerid::utils::parameters::*;


fn log_init_test() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn random_dna(len : usize, seed : u64) -> Vec<u8> {
    let mut state = seed | 1;
    (0..len).map(|_| {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        b"ACGT"[(state % 4) as usize]
    }).collect()
}

fn mutate(base : &[u8], every : usize) -> Vec<u8> {
    base.iter().enumerate().map(|(i, &c)| if i % every == every / 2 { if c == b'T' { b'G' } else { b'T' } } else { c }).collect()
}

fn write_fasta(path : &Path, seq : &[u8]) {
    let mut f = fs::File::create(path).unwrap();
    writeln!(f, ">{}", path.file_stem().unwrap().to_string_lossy()).unwrap();
    for chunk in seq.chunks(80) {
        f.write_all(chunk).unwrap();
        writeln!(f).unwrap();
    }
}

// reads of 100 bases every 25 bases, each kmer is seen several times
fn append_reads(f : &mut fs::File, genome : &[u8], tag : &str) {
    let mut start = 0;
    while start + 100 <= genome.len() {
        writeln!(f, "@{}_{}", tag, start).unwrap();
        f.write_all(&genome[start..start + 100]).unwrap();
        writeln!(f, "\n+").unwrap();
        writeln!(f, "{}", "I".repeat(100)).unwrap();
        start += 25;
    }
}

struct Setup {
    _dir : tempfile::TempDir,
    catalog_path : std::path::PathBuf,
    reads_dir : std::path::PathBuf,
    a2 : Vec<u8>,
    b1 : Vec<u8>,
}

fn make_references(native : &NativeKmers) -> Setup {
    let dir = tempfile::TempDir::new().unwrap();
    let alpha = dir.path().join("alpha");
    let beta = dir.path().join("beta");
    let reads_dir = dir.path().join("reads");
    for d in [&alpha, &beta, &reads_dir] {
        fs::create_dir(d).unwrap();
    }
    let base_a = random_dna(5000, 0x9E3779B97F4A7C15);
    let base_b = random_dna(5000, 0xD1B54A32D192ED03);
    let a2 = mutate(&base_a, 333);
    let b1 = mutate(&base_b, 300);
    write_fasta(&alpha.join("a1.fna"), &mutate(&base_a, 250));
    write_fasta(&alpha.join("a2.fna"), &a2);
    write_fasta(&alpha.join("a3.fasta"), &mutate(&base_a, 400));
    write_fasta(&beta.join("b1.fa"), &b1);
    write_fasta(&beta.join("b2.fa"), &mutate(&base_b, 200));
    //
    let catalog_path = dir.path().join("catalog.json");
    let params = RefsetParams::new(2, 3);
    setup_group(&catalog_path, &alpha, "Alpha", native, native, &params, KMER_SIZE).unwrap();
    setup_group(&catalog_path, &beta, "beta", native, native, &params, KMER_SIZE).unwrap();
    Setup{_dir : dir, catalog_path, reads_dir, a2, b1}
}


#[test]
fn pure_sample_identified_without_mixture() {
    log_init_test();
    let native = NativeKmers::new(KmerParams::default());
    let setup = make_references(&native);
    let catalog = ReferenceCatalog::load(&setup.catalog_path).unwrap();
    assert_eq!(catalog.get_version(), 2);
    assert_eq!(catalog.group_names(), vec!["alpha".to_string(), "beta".to_string()]);
    assert_eq!(catalog.centroid_names("alpha").len(), 2);
    assert_eq!(catalog.refset_names("alpha").len(), 3);
    assert!(catalog.check_kmer_size(KMER_SIZE).is_ok());
    //
    let reads = setup.reads_dir.join("pure.fastq");
    let mut f = fs::File::create(&reads).unwrap();
    append_reads(&mut f, &setup.a2, "a2");
    drop(f);
    //
    let ident = identify_reads(&reads, &catalog, &native, &IdentifyParams::default()).unwrap();
    assert!(ident.genera.contains(&"alpha".to_string()));
    let best = ident.best().unwrap();
    assert_eq!(best.group, "alpha");
    assert_eq!(best.genome, "a2");
    assert!(best.similarity > 0.95);
    assert!(ident.results.windows(2).all(|w| w[0].similarity >= w[1].similarity));
    //
    let report = check_mixing(&ident.results, &native).unwrap().unwrap();
    assert_eq!(report.top.genome, "a2");
    assert!(!report.entries.is_empty());
    assert!(report.entries.iter().all(|e| e.abs_delta < 0.1), "{:?}", report.entries);
    //
    let mut out = Vec::<u8>::new();
    dump_identification(&ident.results, &mut out).unwrap();
    dump_mixture(&report, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.lines().nth(2).unwrap().ends_with("\talpha\ta2"));
    assert!(text.contains("#Top hit - Group: alpha\tFile: a2\t"));
}


#[test]
fn mixed_sample_shows_second_group() {
    log_init_test();
    let native = NativeKmers::new(KmerParams::default());
    let setup = make_references(&native);
    let catalog = ReferenceCatalog::load(&setup.catalog_path).unwrap();
    //
    let reads = setup.reads_dir.join("mixed.fastq");
    let mut f = fs::File::create(&reads).unwrap();
    append_reads(&mut f, &setup.a2, "a2");
    append_reads(&mut f, &setup.b1, "b1");
    drop(f);
    //
    let ident = identify_reads(&reads, &catalog, &native, &IdentifyParams::default()).unwrap();
    assert_eq!(ident.genera.len(), 2);
    let best = ident.best().unwrap();
    assert!(best.genome == "a2" || best.genome == "b1");
    //
    let report = check_mixing(&ident.results, &native).unwrap().unwrap();
    let first = &report.entries[0];
    assert_ne!(first.group, report.top.group);
    assert!(first.delta > 0.5);
}

mod common;

use common::{fields, random_sequence, rng, tabular_lines, TestEnvironment, AMINO_ACIDS, NUCLEOTIDES};
use flate2::read::MultiGzDecoder;
use lambda::core::memory::FixedProbe;
use lambda::core::options::{ScoringKind, ScoringOptions, SearchOptions};
use lambda::core::pipeline::pipeline_with_probe;
use lambda::core::resolver::Program;
use lambda::index::IndexKind;
use lambda::search::SearchStats;
use lambda::{resolve, LambdaError};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use std::io::Read;
use std::path::PathBuf;

/// Protein database of random subjects and queries cut from them with a few substitutions.
struct ProteinFixture {
    env: TestEnvironment,
    index_dir: PathBuf,
    query: PathBuf,
}

fn protein_fixture(kind: IndexKind) -> ProteinFixture {
    let env = TestEnvironment::new();
    let mut r = rng(42);
    let subjects: Vec<(String, Vec<u8>)> = (0..30)
        .map(|i| (format!("subject{}", i), random_sequence(&mut r, AMINO_ACIDS, 200)))
        .collect();

    let mut queries = Vec::new();
    for (i, (_, seq)) in subjects.iter().enumerate() {
        let start = (i * 7) % 120;
        let mut q = seq[start..start + 60].to_vec();
        for pos in (4..q.len()).step_by(13) {
            q[pos] = if q[pos] == b'W' { b'A' } else { b'W' };
        }
        queries.push((format!("query{}", i), q));
    }
    for i in 0..10 {
        queries.push((format!("random{}", i), random_sequence(&mut r, AMINO_ACIDS, 80)));
    }

    let db = env.write_fasta("db.fa", &subjects);
    let query = env.write_fasta("queries.fa", &queries);
    let options = env.index_options(Program::BlastP, &db, kind);
    env.build_index(&options).unwrap();
    ProteinFixture {
        index_dir: options.index_dir,
        query,
        env,
    }
}

fn run(env: &TestEnvironment, options: &SearchOptions, kind: IndexKind) -> (SearchStats, BTreeSet<String>) {
    let stats = env.search(options, kind).unwrap();
    let lines = tabular_lines(&std::fs::read_to_string(&options.output).unwrap());
    (stats, lines)
}

#[test]
fn test_exact_substring_scores_its_length() {
    let env = TestEnvironment::new();
    let mut r = rng(1);
    let subject = random_sequence(&mut r, AMINO_ACIDS, 120);
    let db = env.write_fasta(
        "db.fa",
        &[
            ("decoy".to_string(), random_sequence(&mut r, AMINO_ACIDS, 90)),
            ("target".to_string(), subject.clone()),
        ],
    );
    let query = env.write_fasta("q.fa", &[("q".to_string(), subject[20..50].to_vec())]);
    let index = env.index_options(Program::BlastP, &db, IndexKind::Sa);
    env.build_index(&index).unwrap();

    let mut options = env.search_options(Program::BlastP, &query, &index.index_dir, "out.m8");
    options.scoring = ScoringOptions {
        kind: ScoringKind::MatchMismatch,
        match_score: 1,
        mismatch_score: 0,
        gap_open: 11,
        gap_extend: 1,
    };
    options.output_columns = "qseqid sseqid pident length qstart qend sstart send score".to_string();
    let (stats, lines) = run(&env, &options, IndexKind::Sa);

    assert!(
        lines.contains("q\ttarget\t100.00\t30\t1\t30\t21\t50\t30"),
        "unexpected output: {:?}",
        lines
    );
    assert_eq!(stats.queries, 1);
    assert_eq!(stats.queries_with_matches, 1);
    assert_eq!(stats.blocks_failed, 0);
}

#[test]
fn test_compressed_output_matches_plain() {
    let fixture = protein_fixture(IndexKind::Fm);
    let env = &fixture.env;

    let plain = env.search_options(Program::BlastP, &fixture.query, &fixture.index_dir, "results.m8");
    let (_, expected) = run(env, &plain, IndexKind::Fm);
    assert!(!expected.is_empty());

    let gz = env.search_options(Program::BlastP, &fixture.query, &fixture.index_dir, "results.m8.gz");
    env.search(&gz, IndexKind::Fm).unwrap();
    let mut decoded = String::new();
    MultiGzDecoder::new(std::fs::File::open(&gz.output).unwrap())
        .read_to_string(&mut decoded)
        .unwrap();

    // .m8 carries no comment lines
    assert!(decoded.lines().all(|l| !l.starts_with('#')));
    assert_eq!(tabular_lines(&decoded), expected);
}

#[test]
fn test_results_independent_of_thread_count() {
    let fixture = protein_fixture(IndexKind::BiFm);
    let env = &fixture.env;

    let mut reference = None;
    for (threads, double_indexing) in [(1, true), (2, true), (8, true), (1, false), (4, false)] {
        let output = format!("out-{}-{}.m8", threads, double_indexing);
        let mut options = env.search_options(Program::BlastP, &fixture.query, &fixture.index_dir, &output);
        options.threads = threads;
        options.double_indexing = double_indexing;
        let (stats, lines) = run(env, &options, IndexKind::BiFm);
        assert_eq!(stats.queries, 40);
        assert_eq!(stats.blocks_failed, 0);
        match &reference {
            None => reference = Some(lines),
            Some(expected) => assert_eq!(&lines, expected, "{} threads", threads),
        }
    }

    // every derived query finds its source subject
    let lines = reference.unwrap();
    for i in 0..30 {
        let prefix = format!("query{}\tsubject{}\t", i, i);
        assert!(lines.iter().any(|l| l.starts_with(&prefix)), "query{} missing", i);
    }
}

#[test]
fn test_matches_sorted_and_capped_per_query() {
    let fixture = protein_fixture(IndexKind::Fm);
    let env = &fixture.env;
    let mut options = env.search_options(Program::BlastP, &fixture.query, &fixture.index_dir, "out.m9");
    options.num_matches = 1;
    env.search(&options, IndexKind::Fm).unwrap();

    let contents = std::fs::read_to_string(&options.output).unwrap();
    assert!(contents.contains("# Query: query0"));
    assert!(contents.contains("# LAMBDA processed 40 queries"));
    let mut seen = BTreeSet::new();
    for line in tabular_lines(&contents) {
        assert!(seen.insert(fields(&line)[0].to_string()), "more than one match: {}", line);
    }
}

#[test]
fn test_blastn_reverse_strand_coordinates() {
    let env = TestEnvironment::new();
    let mut r = rng(3);
    let subject = random_sequence(&mut r, NUCLEOTIDES, 400);
    let forward = subject[100..180].to_vec();
    let reverse: Vec<u8> = forward
        .iter()
        .rev()
        .map(|&c| match c {
            b'A' => b'T',
            b'C' => b'G',
            b'G' => b'C',
            _ => b'A',
        })
        .collect();
    let db = env.write_fasta("nt.fa", &[("chr".to_string(), subject)]);
    let query = env.write_fasta(
        "q.fa",
        &[("fwd".to_string(), forward), ("rev".to_string(), reverse)],
    );
    let index = env.index_options(Program::BlastN, &db, IndexKind::Fm);
    env.build_index(&index).unwrap();

    let mut options = env.search_options(Program::BlastN, &query, &index.index_dir, "out.m8");
    options.output_columns = "qseqid qstart qend sstart send".to_string();
    let (_, lines) = run(&env, &options, IndexKind::Fm);

    assert!(lines.contains("fwd\t1\t80\t101\t180"), "{:?}", lines);
    assert!(lines.contains("rev\t1\t80\t180\t101"), "{:?}", lines);
}

#[test]
fn test_sam_output_lists_subjects() {
    let fixture = protein_fixture(IndexKind::Fm);
    let env = &fixture.env;
    let options = env.search_options(Program::BlastP, &fixture.query, &fixture.index_dir, "out.sam");
    env.search(&options, IndexKind::Fm).unwrap();

    let contents = std::fs::read_to_string(&options.output).unwrap();
    assert!(contents.starts_with("@HD\tVN:1.6"));
    assert_eq!(contents.lines().filter(|l| l.starts_with("@SQ")).count(), 30);
    assert!(contents
        .lines()
        .any(|l| l.starts_with("query0\t0\tsubject0\t")));
}

#[test]
fn test_insufficient_memory_fails_before_output() {
    let fixture = protein_fixture(IndexKind::Fm);
    let env = &fixture.env;
    let options = env.search_options(Program::BlastP, &fixture.query, &fixture.index_dir, "out.m8");
    let spec = resolve(&options.resolver_input(IndexKind::Fm)).unwrap();

    let err = pipeline_with_probe(spec, Box::new(FixedProbe(1)))
        .search(&options)
        .unwrap_err();
    assert!(matches!(err, LambdaError::InsufficientMemory(_)));
    assert!(!options.output.exists());

    // a probe that cannot tell skips the check
    pipeline_with_probe(spec, Box::new(FixedProbe(0)))
        .search(&options)
        .unwrap();
    assert!(options.output.exists());
}

#[test]
fn test_reduction_must_match_index() {
    let fixture = protein_fixture(IndexKind::Fm);
    let env = &fixture.env;
    let mut options = env.search_options(Program::BlastP, &fixture.query, &fixture.index_dir, "out.m8");
    options.reduction = 2;
    let err = env.search(&options, IndexKind::Fm).unwrap_err();
    assert!(matches!(err, LambdaError::IncompatibleIndex(_)));
}

#[test]
fn test_stats_json_written() {
    let fixture = protein_fixture(IndexKind::Sa);
    let env = &fixture.env;
    let mut options = env.search_options(Program::BlastP, &fixture.query, &fixture.index_dir, "out.m8");
    options.stats_json = Some(env.path("stats.json"));
    let stats = env.search(&options, IndexKind::Sa).unwrap();

    let written: SearchStats =
        serde_json::from_str(&std::fs::read_to_string(env.path("stats.json")).unwrap()).unwrap();
    assert_eq!(written, stats);
    assert!(written.matches >= 30);
}

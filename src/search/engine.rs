//! The parallel search pipeline.
//!
//! Sequential setup loads and validates everything into a [`GlobalContext`]. A fixed pool of
//! workers then claims query blocks from a shared counter until none are left; each block
//! runs through seeding, optional trie construction, index search, optional sorting and
//! extension inside the worker's [`LocalContext`]. A failing block is logged, counted and
//! skipped. Statistics are merged once per worker when it runs out of blocks.

use super::context::{
    partition_queries, validate_manifest, BlockStage, GlobalContext, LocalContext, Match,
    QuerySet, SubjectSet, TaxonomyData,
};
use super::seeds::{generate_seeds, oriented, search_pattern, SeedShape};
use super::stats::SearchStats;
use super::trie::SeedTrie;
use crate::bio::alignment::{aligned_rows, extend_seed, GapCosts, LocalAlignment};
use crate::bio::alphabet::Alphabet;
use crate::bio::translation::{frame_label, frame_to_nucleotide, GeneticCode, FRAMES};
use crate::core::memory::{check_memory, estimate_search_memory, MemoryProbe};
use crate::core::options::SearchOptions;
use crate::core::resolver::{Compression, OutputFormat, Program, Specialization};
use crate::index::{load_index, Manifest};
use crate::report::{open_writer, Lca, OutputRecord, QueryResult, RunInfo};
use crate::{LambdaError, Result};
use ::bio::alphabets::dna;
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// Run a complete search with gap costs `G`.
pub fn run_search<G: GapCosts>(
    spec: &Specialization,
    options: &SearchOptions,
    probe: &dyn MemoryProbe,
) -> Result<SearchStats> {
    options.validate()?;
    let (format, compression) = spec.output.ok_or_else(|| {
        LambdaError::Config("a search needs an output file".to_string())
    })?;

    let global = prepare(spec, options, probe, format, compression)?;
    search_blocks::<G>(global)
}

/// Parallel region and everything after it.
fn search_blocks<G: GapCosts>(global: GlobalContext<'_>) -> Result<SearchStats> {
    let options = global.options;
    let start = Instant::now();
    run_workers::<G>(&global)?;
    tracing::info!(
        "Searched {} blocks in {:.2?}",
        global.blocks.len(),
        start.elapsed()
    );

    let GlobalContext { stats, writer, .. } = global;
    let stats = stats.into_inner();
    let mut writer = writer.into_inner();
    writer.write_footer(&stats)?;
    writer.finish()?;

    if stats.is_degraded() {
        tracing::warn!(
            "{} of {} query blocks failed; their queries are missing from {}",
            stats.blocks_failed,
            stats.blocks,
            options.output.display()
        );
    }
    if let Some(path) = &options.stats_json {
        stats.write_json(path)?;
    }
    Ok(stats)
}

/// Everything before the parallel region.
fn prepare<'a>(
    spec: &Specialization,
    options: &'a SearchOptions,
    probe: &dyn MemoryProbe,
    format: OutputFormat,
    compression: Compression,
) -> Result<GlobalContext<'a>> {
    let dir = &options.index_dir;
    let manifest = Manifest::read(dir)?;
    validate_manifest(&manifest, spec, options)?;

    let required = estimate_search_memory(
        dir,
        manifest.db_index_type,
        &options.query,
        spec.program.query_frames(),
    )?;
    if probe.available_memory() == 0 {
        tracing::warn!("Could not determine available memory; skipping the memory check");
    } else {
        check_memory(probe, required)?;
    }

    let scheme = options.scoring.build(spec.translated_alphabet())?;

    let start = Instant::now();
    let index = load_index(dir, manifest.db_index_type)?;
    let subjects = SubjectSet::load(
        dir,
        manifest.db_index_type,
        spec.reduction,
        spec.program.translates_subjects(),
    )?;
    let taxonomy = TaxonomyData::load(dir)?;
    tracing::info!(
        "Loaded {} index with {} sequences in {:.2?}",
        manifest.db_index_type,
        index.num_sequences(),
        start.elapsed()
    );
    if index.num_sequences() != subjects.sequences.len() {
        return Err(LambdaError::Index(format!(
            "the index holds {} sequences but {} were stored next to it",
            index.num_sequences(),
            subjects.sequences.len()
        )));
    }

    let code = GeneticCode::new(options.genetic_code.unwrap_or(manifest.genetic_code))?;
    let queries = QuerySet::load(
        &options.query,
        spec.program,
        spec.reduction,
        &code,
        options.truncate_ids,
    )?;
    tracing::info!(
        "Loaded {} queries ({} searched sequences)",
        queries.len(),
        queries.slots.len()
    );

    let blocks = if options.double_indexing {
        partition_queries(queries.len(), options.partitions())
    } else {
        (0..queries.len()).map(|q| q..q + 1).collect()
    };

    let mut writer = open_writer(&options.output, format, compression, &options.output_columns)?;
    let subject_lengths = subjects.original_lengths();
    writer.write_header(&RunInfo {
        program: spec.program,
        query_file: &options.query,
        index_dir: dir,
        subject_ids: &subjects.ids,
        subject_lengths: &subject_lengths,
        db_length: subjects.db_length(),
    })?;

    let reduced = spec.reduced_alphabet();
    let wildcard = wildcard(reduced);
    let search_symbols = reduced
        .symbols()
        .iter()
        .copied()
        .filter(|&c| Some(c) != wildcard)
        .collect();

    Ok(GlobalContext {
        options,
        spec: *spec,
        scheme,
        index,
        subjects,
        queries,
        taxonomy,
        blocks,
        search_symbols,
        wildcard,
        stats: Mutex::new(SearchStats::default()),
        writer: Mutex::new(writer),
    })
}

/// Symbol that never starts or continues a seed.
fn wildcard(alphabet: Alphabet) -> Option<u8> {
    match alphabet {
        Alphabet::Dna5 => Some(b'N'),
        Alphabet::AminoAcid => Some(b'X'),
        Alphabet::Murphy10 => None,
    }
}

fn run_workers<G: GapCosts>(global: &GlobalContext<'_>) -> Result<()> {
    let threads = global.options.thread_count();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| LambdaError::Other(format!("cannot start {} workers: {}", threads, e)))?;
    tracing::debug!("Running {} workers over {} blocks", threads, global.blocks.len());

    let next_block = AtomicUsize::new(0);
    let done_blocks = AtomicUsize::new(0);
    let progress = progress_bar(global);

    pool.broadcast(|ctx| {
        let mut local = LocalContext::new(ctx.index());
        loop {
            let block = next_block.fetch_add(1, Ordering::Relaxed);
            if block >= global.blocks.len() {
                break;
            }
            local.reset(block);
            local.stats.blocks += 1;
            if let Err(e) = process_block::<G>(global, &mut local) {
                local.stats.blocks_failed += 1;
                tracing::warn!(
                    "Skipping query block {} after failure while {}: {}",
                    block,
                    local.stage,
                    e
                );
            }
            let done = done_blocks.fetch_add(1, Ordering::Relaxed) + 1;
            if local.worker == 0 {
                if let Some(bar) = &progress {
                    bar.set_position(((done * 50 / global.blocks.len()) * 2) as u64);
                }
            }
        }
        global.stats.lock().merge(&local.stats);
    });

    if let Some(bar) = progress {
        bar.finish_and_clear();
    }
    Ok(())
}

/// Progress is shown for single-indexing runs only.
fn progress_bar(global: &GlobalContext<'_>) -> Option<ProgressBar> {
    if global.is_double_indexing() || global.options.verbosity < 1 || global.blocks.is_empty() {
        return None;
    }
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:50.cyan/blue}] {pos:>3}%")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░"),
    );
    Some(bar)
}

fn process_block<G: GapCosts>(global: &GlobalContext<'_>, local: &mut LocalContext) -> Result<()> {
    let LocalContext {
        block,
        stage,
        seeds,
        trie,
        matches,
        results,
        stats,
        ..
    } = local;
    let queries = global.blocks[*block].clone();
    let slots = global.queries.slot_range(&queries);
    let index = global.index.as_ref();
    let direction = index.direction();
    let seed_source = global.queries.seed_source();
    let shape = SeedShape {
        length: global.options.seed.length,
        offset: global.options.seed.offset,
        wildcard: global.wildcard,
    };
    let delta = global.options.seed.delta;

    *stage = BlockStage::Seeding;
    let start = Instant::now();
    generate_seeds(seed_source, slots, &shape, seeds)?;
    stats.seeds += seeds.len() as u64;
    stats.timings.seeding += start.elapsed();

    if global.is_double_indexing() {
        *stage = BlockStage::TrieBuilding;
        let start = Instant::now();
        let mut built = SeedTrie::new(shape.length);
        for (i, seed) in seeds.iter().enumerate() {
            let window = &seed_source.get(seed.slot as usize)[seed.pos as usize..][..shape.length];
            built.insert(&oriented(window, direction), i as u32)?;
        }
        stats.timings.trie += start.elapsed();

        *stage = BlockStage::Searching;
        let start = Instant::now();
        built.search(index, &global.search_symbols, delta, &mut |cursor, ids| {
            let hits = index.locate(cursor);
            for &id in ids {
                let seed = seeds[id as usize];
                matches.extend(hits.iter().map(|hit| Match {
                    slot: seed.slot,
                    subject: hit.subject as u32,
                    qpos: seed.pos,
                    spos: hit.offset as u32,
                    len: shape.length as u32,
                }));
            }
        });
        *trie = Some(built);
        stats.timings.searching += start.elapsed();
    } else {
        *stage = BlockStage::Searching;
        let start = Instant::now();
        for seed in seeds.iter() {
            let window = &seed_source.get(seed.slot as usize)[seed.pos as usize..][..shape.length];
            let pattern = oriented(window, direction);
            search_pattern(index, &pattern, &global.search_symbols, delta, &mut |cursor| {
                matches.extend(index.locate(cursor).into_iter().map(|hit| Match {
                    slot: seed.slot,
                    subject: hit.subject as u32,
                    qpos: seed.pos,
                    spos: hit.offset as u32,
                    len: shape.length as u32,
                }));
            });
        }
        stats.timings.searching += start.elapsed();
    }
    stats.hits += matches.len() as u64;

    if global.options.any_filter() {
        *stage = BlockStage::Sorting;
        let start = Instant::now();
        matches.sort_unstable_by_key(|m| (m.slot, m.subject, m.diagonal(), m.qpos));
        if global.options.merge_putative_siblings {
            stats.merged_siblings += merge_siblings(matches);
        }
        stats.timings.sorting += start.elapsed();
    }

    *stage = BlockStage::Extending;
    let start = Instant::now();
    *results = extend_block::<G>(global, queries.clone(), &matches[..], stats)?;
    stats.timings.extending += start.elapsed();

    stats.queries += queries.len() as u64;
    for result in results.iter() {
        stats.matches += result.records.len() as u64;
        if !result.records.is_empty() {
            stats.queries_with_matches += 1;
        }
        if result.lca.is_some() {
            stats.queries_with_lca += 1;
        }
    }

    *stage = BlockStage::Writing;
    global.writer.lock().write_block(results)?;
    *stage = BlockStage::Done;
    Ok(())
}

/// Fold matches on the same diagonal that overlap or touch into the first of them.
///
/// Expects `matches` sorted by slot, subject, diagonal and query position.
fn merge_siblings(matches: &mut Vec<Match>) -> u64 {
    let before = matches.len();
    matches.dedup_by(|next, kept| {
        let same_diagonal = next.slot == kept.slot
            && next.subject == kept.subject
            && next.diagonal() == kept.diagonal();
        if same_diagonal && next.qpos <= kept.qpos + kept.len {
            let end = (next.qpos + next.len).max(kept.qpos + kept.len);
            kept.len = end - kept.qpos;
            true
        } else {
            false
        }
    });
    (before - matches.len()) as u64
}

/// A gapped alignment that passed the thresholds.
struct Found {
    slot: usize,
    subject: usize,
    alignment: LocalAlignment,
    bit_score: f64,
    evalue: f64,
}

impl Found {
    fn key(&self) -> (usize, usize, usize, usize, usize, usize) {
        let a = &self.alignment;
        (
            self.slot,
            self.subject,
            a.query_begin,
            a.query_end,
            a.subject_begin,
            a.subject_end,
        )
    }

    fn covers(&self, m: &Match) -> bool {
        let a = &self.alignment;
        let (q, s, len) = (m.qpos as usize, m.spos as usize, m.len as usize);
        q >= a.query_begin && q + len <= a.query_end && s >= a.subject_begin && s + len <= a.subject_end
    }
}

fn extend_block<G: GapCosts>(
    global: &GlobalContext<'_>,
    queries: std::ops::Range<usize>,
    matches: &[Match],
    stats: &mut SearchStats,
) -> Result<Vec<QueryResult>> {
    let options = global.options;
    let frames = global.queries.frames;
    let params = options.extension_params();
    let db_length = global.subjects.db_length();

    let mut found: Vec<Vec<Found>> = Vec::new();
    found.try_reserve(queries.len())?;
    found.resize_with(queries.len(), Vec::new);
    // alignments per (slot, subject) for the duplicate filter
    let mut by_pair: HashMap<(u32, u32), Vec<usize>> = HashMap::new();

    for m in matches {
        let query = m.slot as usize / frames;
        let bucket = &mut found[query - queries.start];
        if options.filter_putative_abundant && options.max_matches > 0 && bucket.len() >= options.max_matches {
            stats.abundant += 1;
            continue;
        }
        if options.filter_putative_duplicates {
            let seen = by_pair.get(&(m.slot, m.subject));
            if seen.is_some_and(|ids| ids.iter().any(|&i| bucket[i].covers(m))) {
                stats.duplicates += 1;
                continue;
            }
        }

        let query_seq = global.queries.slots.get(m.slot as usize);
        let subject_seq = global.subjects.sequences.get(m.subject as usize);
        let Some(alignment) = extend_seed::<G>(
            query_seq,
            subject_seq,
            m.qpos as usize,
            m.spos as usize,
            m.len as usize,
            &global.scheme,
            &params,
        ) else {
            stats.failed_extensions += 1;
            continue;
        };

        let bit_score = global.scheme.bit_score(alignment.score);
        let evalue = global
            .scheme
            .evalue(alignment.score, query_seq.len() as u64, db_length);
        if evalue > options.e_value || bit_score < options.min_bit_score {
            stats.below_threshold += 1;
            continue;
        }
        if options.filter_putative_duplicates {
            by_pair.entry((m.slot, m.subject)).or_default().push(bucket.len());
        }
        bucket.push(Found {
            slot: m.slot as usize,
            subject: m.subject as usize,
            alignment,
            bit_score,
            evalue,
        });
    }

    let mut results = Vec::with_capacity(queries.len());
    for (query, mut hits) in queries.zip(found) {
        hits.sort_by(|a, b| {
            a.evalue
                .total_cmp(&b.evalue)
                .then(b.alignment.score.cmp(&a.alignment.score))
                .then(a.key().cmp(&b.key()))
        });
        // identical coordinates reached from different seeds; the best sorts first
        let mut seen = HashSet::new();
        hits.retain(|h| seen.insert(h.key()));
        hits.truncate(options.num_matches);
        results.push(finalize(global, query, &hits));
    }
    Ok(results)
}

fn finalize(global: &GlobalContext<'_>, query: usize, hits: &[Found]) -> QueryResult {
    let records: Vec<OutputRecord> = hits.iter().map(|h| output_record(global, query, h)).collect();
    let lca = global.taxonomy.as_ref().and_then(|tax| {
        let tree = tax.tree.as_ref()?;
        let ids = records.iter().flat_map(|r| r.staxids.iter().copied());
        let taxid = tree.lca_of(ids)?;
        let node = tree.node(taxid)?;
        Some(Lca {
            taxid,
            name: node.name.clone(),
            rank: node.rank.clone(),
        })
    });
    QueryResult {
        query_id: global.queries.ids[query].clone(),
        query_len: global.queries.lengths[query],
        records,
        lca,
    }
}

/// Map an alignment in searched coordinates back onto the sequences as given.
fn output_record(global: &GlobalContext<'_>, query: usize, hit: &Found) -> OutputRecord {
    let program = global.spec.program;
    let a = &hit.alignment;
    let query_seq = global.queries.slots.get(hit.slot);
    let subject_seq = global.subjects.sequences.get(hit.subject);
    let (mut query_row, mut subject_row) = aligned_rows(a, query_seq, subject_seq);

    let original = global.subjects.original(hit.subject);
    let subject_len = global.subjects.original_len(original);
    let query_len = global.queries.lengths[query];

    let (query_frame, query_range) = match program {
        Program::BlastN => {
            if hit.slot % 2 == 1 {
                // reverse complement query; report as plus query against minus subject
                query_row = dna::revcomp(&query_row);
                subject_row = dna::revcomp(&subject_row);
                let l = query_len as usize;
                (1, (l - a.query_end + 1, l - a.query_begin))
            } else {
                (1, (a.query_begin + 1, a.query_end))
            }
        }
        Program::BlastX | Program::TBlastX => {
            let frame = frame_label(hit.slot % FRAMES);
            let range = frame_to_nucleotide(a.query_begin, a.query_end, frame, query_len as usize);
            (frame, range)
        }
        Program::BlastP | Program::TBlastN => (0, (a.query_begin + 1, a.query_end)),
    };

    let (subject_frame, subject_range) = match program {
        Program::BlastN if hit.slot % 2 == 1 => (-1, (a.subject_end, a.subject_begin + 1)),
        Program::BlastN => (1, (a.subject_begin + 1, a.subject_end)),
        Program::TBlastN | Program::TBlastX => {
            let frame = frame_label(hit.subject % FRAMES);
            let range =
                frame_to_nucleotide(a.subject_begin, a.subject_end, frame, subject_len as usize);
            (frame, range)
        }
        Program::BlastP | Program::BlastX => (0, (a.subject_begin + 1, a.subject_end)),
    };

    let staxids = global
        .taxonomy
        .as_ref()
        .and_then(|tax| tax.staxids.get(original).cloned())
        .unwrap_or_default();

    OutputRecord {
        subject_id: global.subjects.ids[original].clone(),
        subject_len,
        query_frame,
        subject_frame,
        query_start: query_range.0 as u64,
        query_end: query_range.1 as u64,
        subject_start: subject_range.0 as u64,
        subject_end: subject_range.1 as u64,
        score: a.score,
        bit_score: hit.bit_score,
        evalue: hit.evalue,
        stats: a.stats,
        ops: a.ops.clone(),
        query_row,
        subject_row,
        staxids,
    }
}

//! Run-wide shared state and the per-worker workspace.
//!
//! [`GlobalContext`] is built once before the parallel region and only read afterwards,
//! apart from the statistics aggregate and the output writer, each behind its own mutex.
//! Every worker owns one [`LocalContext`] that is reset for each block it claims.

use super::seeds::Seed;
use super::stats::SearchStats;
use super::trie::SeedTrie;
use crate::bio::alignment::ScoringScheme;
use crate::bio::alphabet::Alphabet;
use crate::bio::fasta::load_sequences;
use crate::bio::sequence::SequenceCollection;
use crate::bio::taxonomy::{SubjectTaxIds, TaxonomyTree};
use crate::bio::translation::{both_strands, translate_six_frames, GeneticCode};
use crate::core::options::SearchOptions;
use crate::core::resolver::{Program, Reduction, Specialization};
use crate::index::builder::read_ids;
use crate::index::{
    load_bincode, DbIndex, IndexKind, Manifest, SaIndex, SA_FILE, SEQS_FILE, STAXIDS_FILE,
    TAX_TREE_FILE, UNTRANSLATED_LENGTHS_FILE,
};
use crate::report::{OutputWriter, QueryResult};
use crate::{LambdaError, Result};
use parking_lot::Mutex;
use std::fmt;
use std::ops::Range;
use std::path::Path;

/// Queries in the form they are searched with.
#[derive(Debug)]
pub struct QuerySet {
    pub ids: Vec<String>,
    /// Lengths of the queries as read (nucleotides for translated queries)
    pub lengths: Vec<u64>,
    /// `frames` consecutive slots per query
    pub slots: SequenceCollection,
    /// Slots in the reduced alphabet; seeds are taken from here when present
    pub reduced: Option<SequenceCollection>,
    pub frames: usize,
}

impl QuerySet {
    pub fn load(
        path: &Path,
        program: Program,
        reduction: Reduction,
        code: &GeneticCode,
        truncate_ids: bool,
    ) -> Result<Self> {
        let loaded = load_sequences(path, program.query_alphabet(), truncate_ids)?;
        if loaded.sequences.is_empty() {
            return Err(LambdaError::Parse(format!(
                "{} contains no sequences",
                path.display()
            )));
        }
        let lengths = loaded.sequences.lengths();
        let slots = match program {
            Program::BlastN => both_strands(&loaded.sequences)?,
            Program::BlastX | Program::TBlastX => translate_six_frames(&loaded.sequences, code)?,
            Program::BlastP | Program::TBlastN => loaded.sequences,
        };
        let reduced = match reduction {
            Reduction::None => None,
            Reduction::Murphy10 => Some(slots.map_symbols(|c| Alphabet::Murphy10.convert(c))?),
        };
        Ok(Self {
            ids: loaded.ids,
            lengths,
            slots,
            reduced,
            frames: program.query_frames(),
        })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Slot range of queries `queries`.
    pub fn slot_range(&self, queries: &Range<usize>) -> Range<usize> {
        queries.start * self.frames..queries.end * self.frames
    }

    pub fn seed_source(&self) -> &SequenceCollection {
        self.reduced.as_ref().unwrap_or(&self.slots)
    }
}

/// Subjects in the (translated, unreduced) form alignments are extended against.
#[derive(Debug)]
pub struct SubjectSet {
    /// One id per original subject
    pub ids: Vec<String>,
    pub sequences: SequenceCollection,
    /// Nucleotide lengths of translated subjects; six sequences per entry
    pub untranslated_lengths: Option<Vec<u64>>,
}

impl SubjectSet {
    pub fn load(dir: &Path, kind: IndexKind, reduction: Reduction, translated: bool) -> Result<Self> {
        let seqs = dir.join(SEQS_FILE);
        let sequences = if seqs.exists() {
            load_bincode::<SequenceCollection>(&seqs)?
        } else if kind == IndexKind::Sa && reduction == Reduction::None {
            load_bincode::<SaIndex>(&dir.join(SA_FILE))?.sequences()?
        } else {
            return Err(LambdaError::Index(format!(
                "{} is missing from {}",
                SEQS_FILE,
                dir.display()
            )));
        };
        let untranslated_lengths = if translated {
            Some(load_bincode(&dir.join(UNTRANSLATED_LENGTHS_FILE))?)
        } else {
            None
        };
        let subjects = Self {
            ids: read_ids(dir)?,
            sequences,
            untranslated_lengths,
        };
        if subjects.original_count() != subjects.ids.len() {
            return Err(LambdaError::Index(format!(
                "{} holds {} ids for {} subjects",
                dir.display(),
                subjects.ids.len(),
                subjects.original_count()
            )));
        }
        Ok(subjects)
    }

    pub fn original_count(&self) -> usize {
        match &self.untranslated_lengths {
            Some(lengths) => lengths.len(),
            None => self.sequences.len(),
        }
    }

    /// Original subject of an indexed sequence.
    pub fn original(&self, subject: usize) -> usize {
        match self.untranslated_lengths {
            Some(_) => subject / crate::bio::translation::FRAMES,
            None => subject,
        }
    }

    pub fn original_len(&self, original: usize) -> u64 {
        match &self.untranslated_lengths {
            Some(lengths) => lengths[original],
            None => self.sequences.seq_len(original) as u64,
        }
    }

    pub fn original_lengths(&self) -> Vec<u64> {
        match &self.untranslated_lengths {
            Some(lengths) => lengths.clone(),
            None => self.sequences.lengths(),
        }
    }

    /// Residues searched, the database size used for E-values.
    pub fn db_length(&self) -> u64 {
        self.sequences.total_len() as u64
    }
}

#[derive(Debug)]
pub struct TaxonomyData {
    /// Indexed by original subject
    pub staxids: Vec<SubjectTaxIds>,
    pub tree: Option<TaxonomyTree>,
}

impl TaxonomyData {
    /// Taxonomy of an index directory, if it was built with one.
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let staxids_path = dir.join(STAXIDS_FILE);
        if !staxids_path.exists() {
            return Ok(None);
        }
        let staxids = load_bincode(&staxids_path)?;
        let tree_path = dir.join(TAX_TREE_FILE);
        let tree = if tree_path.exists() {
            Some(load_bincode(&tree_path)?)
        } else {
            None
        };
        Ok(Some(Self { staxids, tree }))
    }
}

/// Refuse an index that was built for a different configuration.
pub fn validate_manifest(
    manifest: &Manifest,
    spec: &Specialization,
    options: &SearchOptions,
) -> Result<()> {
    let mismatch = |what: &str, index: &dyn fmt::Display, run: &dyn fmt::Display| {
        Err(LambdaError::IncompatibleIndex(format!(
            "the index was built with {} {}, this search needs {}",
            what, index, run
        )))
    };
    if manifest.db_index_type != spec.index_kind {
        return mismatch("index type", &manifest.db_index_type, &spec.index_kind);
    }
    if let Some(kind) = options.index_kind {
        if kind != manifest.db_index_type {
            return mismatch("index type", &manifest.db_index_type, &kind);
        }
    }
    if manifest.alph_original != spec.original_subject_alphabet() {
        return mismatch(
            "subject alphabet",
            &manifest.alph_original,
            &spec.original_subject_alphabet(),
        );
    }
    if manifest.alph_translated != spec.translated_alphabet() {
        return mismatch(
            "translated alphabet",
            &manifest.alph_translated,
            &spec.translated_alphabet(),
        );
    }
    if manifest.alph_reduced != spec.reduced_alphabet() {
        return mismatch(
            "reduced alphabet",
            &manifest.alph_reduced,
            &spec.reduced_alphabet(),
        );
    }
    if manifest.subj_seq_len_bits != spec.position_width() {
        return mismatch(
            "position width",
            &manifest.subj_seq_len_bits,
            &spec.position_width(),
        );
    }
    if spec.program.translates_subjects() {
        if let Some(code) = options.genetic_code {
            if code != manifest.genetic_code {
                return mismatch("genetic code", &manifest.genetic_code, &code);
            }
        }
    }
    Ok(())
}

/// Everything the workers read, plus the two shared sinks.
pub struct GlobalContext<'a> {
    pub options: &'a SearchOptions,
    pub spec: Specialization,
    pub scheme: ScoringScheme,
    pub index: Box<dyn DbIndex>,
    pub subjects: SubjectSet,
    pub queries: QuerySet,
    pub taxonomy: Option<TaxonomyData>,
    /// Query ranges, claimed by workers in order
    pub blocks: Vec<Range<usize>>,
    /// Substitution symbols for seed search
    pub search_symbols: Vec<u8>,
    pub wildcard: Option<u8>,
    pub stats: Mutex<SearchStats>,
    pub writer: Mutex<Box<dyn OutputWriter>>,
}

impl GlobalContext<'_> {
    pub fn is_double_indexing(&self) -> bool {
        self.options.double_indexing
    }
}

/// Split `count` queries into `parts` contiguous blocks of near equal size.
pub fn partition_queries(count: usize, parts: usize) -> Vec<Range<usize>> {
    let parts = parts.clamp(1, count.max(1));
    let base = count / parts;
    let extra = count % parts;
    let mut blocks = Vec::with_capacity(parts);
    let mut start = 0;
    for i in 0..parts {
        let len = base + usize::from(i < extra);
        if len == 0 {
            continue;
        }
        blocks.push(start..start + len);
        start += len;
    }
    blocks
}

/// Stages a block passes through; a failure in any of them skips the rest of the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStage {
    Pending,
    Seeding,
    TrieBuilding,
    Searching,
    Sorting,
    Extending,
    Writing,
    Done,
}

impl fmt::Display for BlockStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BlockStage::Pending => "pending",
            BlockStage::Seeding => "seeding",
            BlockStage::TrieBuilding => "trie building",
            BlockStage::Searching => "searching",
            BlockStage::Sorting => "sorting",
            BlockStage::Extending => "extending",
            BlockStage::Writing => "writing",
            BlockStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// A seed occurrence, widened to a candidate region by sibling merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Match {
    pub slot: u32,
    pub subject: u32,
    pub qpos: u32,
    pub spos: u32,
    pub len: u32,
}

impl Match {
    pub fn diagonal(&self) -> i64 {
        self.spos as i64 - self.qpos as i64
    }
}

/// Workspace of one worker. Never shared.
#[derive(Debug)]
pub struct LocalContext {
    pub worker: usize,
    pub block: usize,
    pub stage: BlockStage,
    pub seeds: Vec<Seed>,
    pub trie: Option<SeedTrie>,
    pub matches: Vec<Match>,
    pub results: Vec<QueryResult>,
    pub stats: SearchStats,
}

impl LocalContext {
    pub fn new(worker: usize) -> Self {
        Self {
            worker,
            block: 0,
            stage: BlockStage::Pending,
            seeds: Vec::new(),
            trie: None,
            matches: Vec::new(),
            results: Vec::new(),
            stats: SearchStats::default(),
        }
    }

    /// Prepare for a new block, keeping buffer capacity and statistics.
    pub fn reset(&mut self, block: usize) {
        self.block = block;
        self.stage = BlockStage::Pending;
        self.seeds.clear();
        self.trie = None;
        self.matches.clear();
        self.results.clear();
    }
}

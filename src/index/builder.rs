//! Index construction pipeline.
//!
//! Every file is written into a staging directory next to the target; the staging
//! directory is renamed into place only after all steps succeeded.

use super::manifest::{is_index_dir, Manifest};
use super::text::{check_index_size, text_length};
use super::{
    save_bincode, FmIndex, IndexKind, SaIndex, FM_FILE, FWD_FM_FILE, REV_FM_FILE,
    SA_FILE, SEQS_FILE, SEQ_IDS_FILE, STAXIDS_FILE, TAX_TREE_FILE, UNTRANSLATED_LENGTHS_FILE,
};
use crate::bio::fasta::load_sequences;
use crate::bio::sequence::SequenceCollection;
use crate::bio::taxonomy::{accession_index, load_mapping, TaxonomyTree};
use crate::bio::translation::{translate_six_frames, GeneticCode};
use crate::core::options::IndexOptions;
use crate::core::resolver::{Reduction, Specialization};
use crate::{LambdaError, Result, INDEX_GENERATION};
use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// What was built, for the command's closing report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSummary {
    pub index_dir: PathBuf,
    pub index_kind: IndexKind,
    pub sequences: usize,
    /// Length of the indexed text including sentinels
    pub text_length: u64,
    pub taxonomy_nodes: Option<usize>,
}

pub fn build_index(options: &IndexOptions, spec: &Specialization) -> Result<IndexSummary> {
    options.validate()?;
    let target = options.index_dir.as_path();
    check_target(target)?;

    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;
    let staging = tempfile::Builder::new()
        .prefix(".lambda-index-")
        .tempdir_in(&parent)?;
    tracing::debug!("Staging index in {}", staging.path().display());

    let summary = build_into(staging.path(), options, spec)?;

    if target.exists() {
        tracing::info!("Replacing existing index {}", target.display());
        fs::remove_dir_all(target)?;
    }
    fs::rename(staging.path(), target)?;

    Ok(IndexSummary {
        index_dir: target.to_path_buf(),
        ..summary
    })
}

/// An existing target may only be replaced when it is an index or an empty directory.
fn check_target(target: &Path) -> Result<()> {
    if !target.exists() || is_index_dir(target) {
        return Ok(());
    }
    let empty = target.is_dir() && fs::read_dir(target)?.next().is_none();
    if empty {
        return Ok(());
    }
    Err(LambdaError::Config(format!(
        "{} exists and is not a LAMBDA index; refusing to overwrite it",
        target.display()
    )))
}

fn build_into(dir: &Path, options: &IndexOptions, spec: &Specialization) -> Result<IndexSummary> {
    let program = spec.program;
    let code = GeneticCode::new(options.genetic_code)?;

    // 1. subjects and their ids; only the accession lookup outlives this step
    let start = Instant::now();
    tracing::info!("Loading subjects from {}", options.database.display());
    let loaded = load_sequences(
        &options.database,
        spec.original_subject_alphabet(),
        options.truncate_ids,
    )?;
    if loaded.sequences.is_empty() {
        return Err(LambdaError::Parse(format!(
            "{} contains no sequences",
            options.database.display()
        )));
    }
    let original = loaded.sequences;
    write_ids(&dir.join(SEQ_IDS_FILE), &loaded.ids)?;
    let acc_to_rank: Option<HashMap<String, usize>> = options
        .wants_taxonomy()
        .then(|| accession_index(loaded.ids.iter().map(String::as_str)));
    drop(loaded.ids);
    let num_subjects = original.len();
    tracing::info!(
        "Loaded {} subjects ({} residues) in {:.2?}",
        num_subjects,
        original.total_len(),
        start.elapsed()
    );

    // 2. original lengths for mapping frame coordinates back
    if program.translates_subjects() {
        save_bincode(&dir.join(UNTRANSLATED_LENGTHS_FILE), &original.lengths())?;
    }

    // 3. taxonomy
    let mut taxonomy_nodes = None;
    if let (Some(map_path), Some(acc_to_rank)) = (&options.acc_tax_map, acc_to_rank) {
        let start = Instant::now();
        tracing::info!("Mapping subjects to taxids using {}", map_path.display());
        let mapping = load_mapping(map_path, &acc_to_rank, num_subjects)?;
        drop(acc_to_rank);
        save_bincode(&dir.join(STAXIDS_FILE), &mapping.staxids)?;

        match &options.tax_dump_dir {
            Some(dump_dir) => {
                let tree = TaxonomyTree::from_dump_dir(dump_dir, &mapping.present)?;
                taxonomy_nodes = Some(tree.len());
                save_bincode(&dir.join(TAX_TREE_FILE), &tree)?;
            }
            None => tracing::warn!(
                "No --tax-dump-dir given; taxids are stored without a taxonomic tree"
            ),
        }
        tracing::info!(
            "Mapped {} of {} subjects in {:.2?}",
            mapping.mapped_subjects(),
            num_subjects,
            start.elapsed()
        );
    }

    // 4. translation; the untranslated collection ends here
    let translated = if program.translates_subjects() {
        let start = Instant::now();
        let frames = translate_six_frames(&original, &code)?;
        drop(original);
        tracing::info!(
            "Translated subjects into {} frames in {:.2?}",
            frames.len(),
            start.elapsed()
        );
        frames
    } else {
        original
    };

    // 5. plain copy for extension unless the index keeps an equivalent one
    let stores_equivalent = spec.index_kind.stores_text() && spec.reduction == Reduction::None;
    if !stores_equivalent {
        save_bincode(&dir.join(SEQS_FILE), &translated)?;
    }

    let indexed = reduce(translated, spec)?;

    // 6. addressing width
    let width = spec.position_width();
    let length = text_length(&indexed);
    check_index_size(length, width)?;

    // 7. index structure
    let start = Instant::now();
    let residues = spec.reduced_alphabet().symbols();
    match spec.index_kind {
        IndexKind::Sa => {
            tracing::info!("Building suffix array ({:?} strategy)", options.algorithm);
            let index = SaIndex::build(&indexed, residues, width, options.algorithm)?;
            save_bincode(&dir.join(SA_FILE), &index)?;
        }
        IndexKind::Fm => {
            tracing::info!("Building FM index");
            let index = FmIndex::build(&indexed, residues, width, options.fm_sampling, false)?;
            save_bincode(&dir.join(FM_FILE), &index)?;
        }
        IndexKind::BiFm => {
            tracing::info!("Building reverse FM index");
            let rev = FmIndex::build(&indexed, residues, width, options.fm_sampling, true)?;
            save_bincode(&dir.join(REV_FM_FILE), &rev)?;
            drop(rev);
            tracing::info!("Building forward FM index");
            let fwd = FmIndex::build(&indexed, residues, width, options.fm_sampling, false)?;
            save_bincode(&dir.join(FWD_FM_FILE), &fwd)?;
        }
    }
    tracing::info!("Built {} index in {:.2?}", spec.index_kind, start.elapsed());

    // 8. manifest
    Manifest {
        db_index_type: spec.index_kind,
        alph_original: spec.original_subject_alphabet(),
        alph_translated: spec.translated_alphabet(),
        alph_reduced: spec.reduced_alphabet(),
        genetic_code: code.id(),
        subj_seq_len_bits: width,
        generation: INDEX_GENERATION,
    }
    .write(dir)?;

    Ok(IndexSummary {
        index_dir: dir.to_path_buf(),
        index_kind: spec.index_kind,
        sequences: indexed.len(),
        text_length: length,
        taxonomy_nodes,
    })
}

fn reduce(sequences: SequenceCollection, spec: &Specialization) -> Result<SequenceCollection> {
    match spec.reduction {
        Reduction::None => Ok(sequences),
        Reduction::Murphy10 => {
            let alphabet = spec.reduced_alphabet();
            sequences.map_symbols(|c| alphabet.convert(c))
        }
    }
}

fn write_ids(path: &Path, ids: &[String]) -> Result<()> {
    let mut writer = BufWriter::new(fs::File::create(path)?);
    for id in ids {
        writeln!(writer, "{}", id)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read the persisted subject ids.
pub fn read_ids(dir: &Path) -> Result<Vec<String>> {
    let contents = fs::read_to_string(dir.join(SEQ_IDS_FILE))?;
    Ok(contents.lines().map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resolver::{resolve, Program};
    use crate::index::{load_bincode, load_index, FmSampling, SaAlgorithm};
    use tempfile::TempDir;

    fn options(dir: &Path, program: Program, kind: IndexKind, db: &str) -> IndexOptions {
        let database = dir.join("db.fa");
        fs::write(&database, db).unwrap();
        IndexOptions {
            program,
            database,
            index_dir: dir.join("db.lambda"),
            reduction: 0,
            index_kind: kind,
            algorithm: SaAlgorithm::Default,
            genetic_code: 1,
            fm_sampling: FmSampling::default(),
            acc_tax_map: None,
            tax_dump_dir: None,
            truncate_ids: true,
        }
    }

    fn run(options: &IndexOptions) -> Result<IndexSummary> {
        let spec = resolve(&options.resolver_input())?;
        build_index(options, &spec)
    }

    #[test]
    fn test_fm_index_layout() {
        let tmp = TempDir::new().unwrap();
        let o = options(tmp.path(), Program::BlastP, IndexKind::Fm, ">a desc\nMKVLA\n>b\nGHWQ\n");
        let summary = run(&o).unwrap();
        assert_eq!(summary.sequences, 2);
        assert_eq!(summary.text_length, 11);
        assert_eq!(read_ids(&o.index_dir).unwrap(), vec!["a", "b"]);
        assert!(o.index_dir.join(SEQS_FILE).exists());
        assert!(o.index_dir.join(FM_FILE).exists());
        assert!(!o.index_dir.join(UNTRANSLATED_LENGTHS_FILE).exists());
        let manifest = Manifest::read(&o.index_dir).unwrap();
        assert_eq!(manifest.db_index_type, IndexKind::Fm);
        assert_eq!(manifest.subj_seq_len_bits, 32);
    }

    #[test]
    fn test_plain_suffix_array_skips_seqs() {
        let tmp = TempDir::new().unwrap();
        let o = options(tmp.path(), Program::BlastP, IndexKind::Sa, ">a\nMKVLA\n");
        run(&o).unwrap();
        assert!(!o.index_dir.join(SEQS_FILE).exists());
        let index = load_index(&o.index_dir, IndexKind::Sa).unwrap();
        assert_eq!(index.num_sequences(), 1);
    }

    #[test]
    fn test_reduced_suffix_array_keeps_seqs() {
        let tmp = TempDir::new().unwrap();
        let mut o = options(tmp.path(), Program::BlastP, IndexKind::Sa, ">a\nMKVLA\n");
        o.reduction = 2;
        run(&o).unwrap();
        let seqs: SequenceCollection = load_bincode(&o.index_dir.join(SEQS_FILE)).unwrap();
        assert_eq!(seqs.get(0), b"MKVLA");
    }

    #[test]
    fn test_translated_subjects_record_lengths() {
        let tmp = TempDir::new().unwrap();
        let o = options(tmp.path(), Program::TBlastN, IndexKind::BiFm, ">n\nATGGCCAAATTTG\n");
        let summary = run(&o).unwrap();
        assert_eq!(summary.sequences, 6);
        let lengths: Vec<u64> = load_bincode(&o.index_dir.join(UNTRANSLATED_LENGTHS_FILE)).unwrap();
        assert_eq!(lengths, vec![13]);
        assert!(o.index_dir.join(REV_FM_FILE).exists());
        assert!(o.index_dir.join(FWD_FM_FILE).exists());
    }

    #[test]
    fn test_empty_database_rejected_without_target() {
        let tmp = TempDir::new().unwrap();
        let o = options(tmp.path(), Program::BlastP, IndexKind::Fm, "");
        assert!(run(&o).is_err());
        assert!(!o.index_dir.exists());
    }

    #[test]
    fn test_foreign_directory_not_overwritten() {
        let tmp = TempDir::new().unwrap();
        let o = options(tmp.path(), Program::BlastP, IndexKind::Fm, ">a\nMKV\n");
        fs::create_dir_all(&o.index_dir).unwrap();
        fs::write(o.index_dir.join("notes.txt"), "keep").unwrap();
        assert!(run(&o).is_err());
        assert!(o.index_dir.join("notes.txt").exists());
    }

    #[test]
    fn test_rebuild_replaces_index() {
        let tmp = TempDir::new().unwrap();
        let o = options(tmp.path(), Program::BlastP, IndexKind::Fm, ">a\nMKV\n");
        run(&o).unwrap();
        let mut sa = o.clone();
        sa.index_kind = IndexKind::Sa;
        run(&sa).unwrap();
        assert!(!o.index_dir.join(FM_FILE).exists());
        assert_eq!(Manifest::read(&o.index_dir).unwrap().db_index_type, IndexKind::Sa);
    }
}

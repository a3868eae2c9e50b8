//! Plain-text build facts of an index directory, one `option:*` file per key.

use super::IndexKind;
use crate::bio::alphabet::Alphabet;
use crate::{LambdaError, Result, INDEX_GENERATION};
use std::fs;
use std::path::Path;

pub const DB_INDEX_TYPE: &str = "option:db_index_type";
pub const ALPH_ORIGINAL: &str = "option:alph_original";
pub const ALPH_TRANSLATED: &str = "option:alph_translated";
pub const ALPH_REDUCED: &str = "option:alph_reduced";
pub const GENETIC_CODE: &str = "option:genetic_code";
pub const SUBJ_SEQ_LEN_BITS: &str = "option:subj_seq_len_bits";
pub const GENERATION: &str = "option:generation";

pub const KEYS: [&str; 7] = [
    DB_INDEX_TYPE,
    ALPH_ORIGINAL,
    ALPH_TRANSLATED,
    ALPH_REDUCED,
    GENETIC_CODE,
    SUBJ_SEQ_LEN_BITS,
    GENERATION,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub db_index_type: IndexKind,
    pub alph_original: Alphabet,
    pub alph_translated: Alphabet,
    pub alph_reduced: Alphabet,
    pub genetic_code: u8,
    pub subj_seq_len_bits: u32,
    pub generation: u64,
}

pub fn write_option(dir: &Path, key: &str, value: &str) -> Result<()> {
    fs::write(dir.join(key), format!("{}\n", value))?;
    Ok(())
}

pub fn read_option(dir: &Path, key: &str) -> Result<String> {
    let path = dir.join(key);
    if !path.exists() {
        return Err(LambdaError::IncompatibleIndex(format!(
            "{} is missing from {}; is this a LAMBDA index built by this version?",
            key,
            dir.display()
        )));
    }
    Ok(fs::read_to_string(path)?.trim().to_string())
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| LambdaError::IncompatibleIndex(format!("invalid value '{}' for {}", value, key)))
}

fn alphabet(key: &str, value: &str) -> Result<Alphabet> {
    Alphabet::from_name(value)
        .ok_or_else(|| LambdaError::IncompatibleIndex(format!("unknown alphabet '{}' in {}", value, key)))
}

/// Whether `dir` looks like an index directory written by this program.
pub fn is_index_dir(dir: &Path) -> bool {
    dir.join(GENERATION).is_file()
}

impl Manifest {
    pub fn write(&self, dir: &Path) -> Result<()> {
        write_option(dir, DB_INDEX_TYPE, &self.db_index_type.code().to_string())?;
        write_option(dir, ALPH_ORIGINAL, self.alph_original.name())?;
        write_option(dir, ALPH_TRANSLATED, self.alph_translated.name())?;
        write_option(dir, ALPH_REDUCED, self.alph_reduced.name())?;
        write_option(dir, GENETIC_CODE, &self.genetic_code.to_string())?;
        write_option(dir, SUBJ_SEQ_LEN_BITS, &self.subj_seq_len_bits.to_string())?;
        write_option(dir, GENERATION, &self.generation.to_string())?;
        Ok(())
    }

    /// Read every key; any missing or malformed entry, or a foreign generation, is an error.
    pub fn read(dir: &Path) -> Result<Self> {
        let mut values = Vec::with_capacity(KEYS.len());
        for key in KEYS {
            values.push(read_option(dir, key)?);
        }

        let generation: u64 = parse(GENERATION, &values[6])?;
        if generation != INDEX_GENERATION {
            return Err(LambdaError::IncompatibleIndex(format!(
                "index generation {} does not match generation {} of this build; rebuild the index",
                generation, INDEX_GENERATION
            )));
        }
        let code: u8 = parse(DB_INDEX_TYPE, &values[0])?;
        let db_index_type = IndexKind::from_code(code).ok_or_else(|| {
            LambdaError::IncompatibleIndex(format!("unknown index type code {}", code))
        })?;

        Ok(Self {
            db_index_type,
            alph_original: alphabet(ALPH_ORIGINAL, &values[1])?,
            alph_translated: alphabet(ALPH_TRANSLATED, &values[2])?,
            alph_reduced: alphabet(ALPH_REDUCED, &values[3])?,
            genetic_code: parse(GENETIC_CODE, &values[4])?,
            subj_seq_len_bits: parse(SUBJ_SEQ_LEN_BITS, &values[5])?,
            generation,
        })
    }
}

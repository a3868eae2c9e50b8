//! Residue alphabets used at the different pipeline stages.
//!
//! Sequences are kept as upper-case ASCII throughout. Sanitising maps anything outside an
//! alphabet onto its wildcard (`N` for nucleotides, `X` for amino acids); reduction maps an
//! amino acid onto the representative letter of its cluster.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Amino acid letters accepted without substitution.
pub const AMINO_ACID_SYMBOLS: &[u8] = b"ACDEFGHIKLMNPQRSTVWYBJZXUO*";

/// Representative letters of the Murphy 10-letter clustering.
pub const MURPHY10_SYMBOLS: &[u8] = b"ABCFGHIKPS";

pub const DNA5_SYMBOLS: &[u8] = b"ACGTN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Alphabet {
    Dna5,
    AminoAcid,
    Murphy10,
}

static DNA5_TABLE: [u8; 256] = {
    let mut table = [b'N'; 256];
    table[b'A' as usize] = b'A';
    table[b'C' as usize] = b'C';
    table[b'G' as usize] = b'G';
    table[b'T' as usize] = b'T';
    table[b'U' as usize] = b'T';
    table[b'a' as usize] = b'A';
    table[b'c' as usize] = b'C';
    table[b'g' as usize] = b'G';
    table[b't' as usize] = b'T';
    table[b'u' as usize] = b'T';
    table
};

static AMINO_ACID_TABLE: [u8; 256] = {
    let mut table = [b'X'; 256];
    let mut i = 0;
    while i < AMINO_ACID_SYMBOLS.len() {
        let c = AMINO_ACID_SYMBOLS[i];
        table[c as usize] = c;
        if c.is_ascii_uppercase() {
            table[c.to_ascii_lowercase() as usize] = c;
        }
        i += 1;
    }
    table
};

static MURPHY10_TABLE: [u8; 256] = {
    let mut table = [b'A'; 256];
    let clusters: [(&[u8], u8); 10] = [
        (b"LVIMJ", b'I'),
        (b"C", b'C'),
        (b"A", b'A'),
        (b"G", b'G'),
        (b"ST", b'S'),
        (b"P", b'P'),
        (b"FYW", b'F'),
        (b"EDNQBZ", b'B'),
        (b"KRO", b'K'),
        (b"H", b'H'),
    ];
    let mut k = 0;
    while k < clusters.len() {
        let (members, rep) = clusters[k];
        let mut i = 0;
        while i < members.len() {
            table[members[i] as usize] = rep;
            table[members[i].to_ascii_lowercase() as usize] = rep;
            i += 1;
        }
        k += 1;
    }
    table
};

impl Alphabet {
    /// Name persisted in the index manifest.
    pub fn name(&self) -> &'static str {
        match self {
            Alphabet::Dna5 => "Dna5",
            Alphabet::AminoAcid => "AminoAcid",
            Alphabet::Murphy10 => "Murphy10",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "Dna5" => Some(Alphabet::Dna5),
            "AminoAcid" => Some(Alphabet::AminoAcid),
            "Murphy10" => Some(Alphabet::Murphy10),
            _ => None,
        }
    }

    pub fn symbols(&self) -> &'static [u8] {
        match self {
            Alphabet::Dna5 => DNA5_SYMBOLS,
            Alphabet::AminoAcid => AMINO_ACID_SYMBOLS,
            Alphabet::Murphy10 => MURPHY10_SYMBOLS,
        }
    }

    pub fn is_nucleotide(&self) -> bool {
        matches!(self, Alphabet::Dna5)
    }

    /// Map an arbitrary input byte into this alphabet.
    #[inline]
    pub fn convert(&self, c: u8) -> u8 {
        match self {
            Alphabet::Dna5 => DNA5_TABLE[c as usize],
            Alphabet::AminoAcid => AMINO_ACID_TABLE[c as usize],
            Alphabet::Murphy10 => MURPHY10_TABLE[AMINO_ACID_TABLE[c as usize] as usize],
        }
    }

    /// Bits needed to address positions in an index over this alphabet.
    ///
    /// Nucleotide collections routinely exceed 4 Gbp, protein collections do not.
    pub fn position_width(&self) -> u32 {
        match self {
            Alphabet::Dna5 => 64,
            Alphabet::AminoAcid | Alphabet::Murphy10 => 32,
        }
    }
}

impl fmt::Display for Alphabet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dna5_sanitizes_to_n() {
        let out: Vec<u8> = b"acgtRYn-".iter().map(|&c| Alphabet::Dna5.convert(c)).collect();
        assert_eq!(out, b"ACGTNNNN");
        assert_eq!(Alphabet::Dna5.convert(b'U'), b'T');
    }

    #[test]
    fn test_amino_acid_keeps_known_letters() {
        let out: Vec<u8> = b"mkv*#".iter().map(|&c| Alphabet::AminoAcid.convert(c)).collect();
        assert_eq!(out, b"MKV*X");
    }

    #[test]
    fn test_murphy10_clusters() {
        let reduce = |s: &[u8]| -> Vec<u8> { s.iter().map(|&c| Alphabet::Murphy10.convert(c)).collect() };
        assert_eq!(reduce(b"LVIM"), b"IIII");
        assert_eq!(reduce(b"EDNQ"), b"BBBB");
        assert_eq!(reduce(b"FYW"), b"FFF");
        assert_eq!(reduce(b"KR"), b"KK");
        assert_eq!(reduce(b"ST"), b"SS");
        for &c in AMINO_ACID_SYMBOLS {
            assert!(MURPHY10_SYMBOLS.contains(&Alphabet::Murphy10.convert(c)));
        }
    }

    #[test]
    fn test_names_round_trip() {
        for a in [Alphabet::Dna5, Alphabet::AminoAcid, Alphabet::Murphy10] {
            assert_eq!(Alphabet::from_name(a.name()), Some(a));
        }
        assert_eq!(Alphabet::from_name("Murphy12"), None);
    }
}

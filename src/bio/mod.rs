pub mod alignment;
pub mod alphabet;
pub mod fasta;
pub mod sequence;
pub mod taxonomy;
pub mod translation;

pub use alphabet::Alphabet;
pub use sequence::SequenceCollection;

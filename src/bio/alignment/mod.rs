pub mod extension;
pub mod scoring;

pub use extension::{
    aligned_rows, extend_seed, AffineGaps, AlignOp, AlignmentStats, ExtensionParams, GapCosts,
    LinearGaps, LocalAlignment,
};
pub use scoring::{KarlinParams, ScoringMatrix, ScoringScheme};

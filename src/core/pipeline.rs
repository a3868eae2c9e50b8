//! Registry turning a resolved [`Specialization`] into a runnable pipeline.
//!
//! Only the gap model is a type parameter, since it sits in the innermost extension loop.
//! Every other axis is a value the pipeline reads once per run.

use super::memory::{MemoryProbe, SysinfoProbe};
use super::options::{IndexOptions, SearchOptions};
use super::resolver::{GapModel, Specialization};
use crate::bio::alignment::{AffineGaps, GapCosts, LinearGaps};
use crate::index::{build_index, IndexSummary};
use crate::search::{run_search, SearchStats};
use crate::Result;
use std::marker::PhantomData;

pub trait Pipeline: Send + Sync {
    fn specialization(&self) -> &Specialization;
    fn build_index(&self, options: &IndexOptions) -> Result<IndexSummary>;
    fn search(&self, options: &SearchOptions) -> Result<SearchStats>;
}

pub struct AlignerPipeline<G: GapCosts> {
    spec: Specialization,
    probe: Box<dyn MemoryProbe>,
    _gaps: PhantomData<G>,
}

impl<G: GapCosts> AlignerPipeline<G> {
    pub fn new(spec: Specialization) -> Self {
        Self {
            spec,
            probe: Box::new(SysinfoProbe),
            _gaps: PhantomData,
        }
    }

    /// Replace the memory probe used before searching.
    pub fn with_probe(mut self, probe: Box<dyn MemoryProbe>) -> Self {
        self.probe = probe;
        self
    }
}

impl<G: GapCosts> Pipeline for AlignerPipeline<G> {
    fn specialization(&self) -> &Specialization {
        &self.spec
    }

    fn build_index(&self, options: &IndexOptions) -> Result<IndexSummary> {
        build_index(options, &self.spec)
    }

    fn search(&self, options: &SearchOptions) -> Result<SearchStats> {
        run_search::<G>(&self.spec, options, self.probe.as_ref())
    }
}

pub fn pipeline_for(spec: Specialization) -> Box<dyn Pipeline> {
    match spec.gap_model {
        GapModel::Linear => Box::new(AlignerPipeline::<LinearGaps>::new(spec)),
        GapModel::Affine => Box::new(AlignerPipeline::<AffineGaps>::new(spec)),
    }
}

/// Like [`pipeline_for`], with a caller supplied memory probe.
pub fn pipeline_with_probe(
    spec: Specialization,
    probe: Box<dyn MemoryProbe>,
) -> Box<dyn Pipeline> {
    match spec.gap_model {
        GapModel::Linear => Box::new(AlignerPipeline::<LinearGaps>::new(spec).with_probe(probe)),
        GapModel::Affine => Box::new(AlignerPipeline::<AffineGaps>::new(spec).with_probe(probe)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resolver::{resolve, Program, ResolverInput};
    use crate::index::IndexKind;
    use std::path::Path;

    #[test]
    fn test_pipeline_keeps_specialization() {
        for gap_open in [0, 11] {
            let spec = resolve(&ResolverInput {
                program: Program::BlastP,
                reduction: 0,
                gap_open,
                index_kind: IndexKind::Fm,
                output: Some(Path::new("out.m8")),
            })
            .unwrap();
            let pipeline = pipeline_for(spec);
            assert_eq!(pipeline.specialization(), &spec);
        }
    }
}

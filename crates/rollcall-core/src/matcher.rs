//! The exposed matching operation: score, resolve, aggregate.

use crate::error::MatchError;
use crate::report::{aggregate, Report};
use crate::resolver::{AssignmentStrategy, GreedyAssignment};
use crate::scorer::{batch_space, score};
use crate::types::{Candidate, DetectedFace, Threshold};

/// Matches the faces of one photo against a candidate pool.
///
/// Holds no state between requests; one instance may serve any number of
/// concurrent callers.
#[derive(Debug, Clone, Default)]
pub struct FaceMatcher<S = GreedyAssignment> {
    strategy: S,
    threshold: Threshold,
}

impl FaceMatcher<GreedyAssignment> {
    /// Greedy matcher with the given threshold.
    pub fn new(threshold: f32) -> Result<Self, MatchError> {
        Ok(Self {
            strategy: GreedyAssignment,
            threshold: Threshold::new(threshold)?,
        })
    }
}

impl<S: AssignmentStrategy> FaceMatcher<S> {
    pub fn with_strategy(strategy: S, threshold: Threshold) -> Self {
        Self { strategy, threshold }
    }

    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    /// Run one recognition request.
    ///
    /// Checks, in order: an empty pool fails with `NoCandidates`; any space
    /// or dimension disagreement fails before scoring; an empty photo yields
    /// a zero-count report with [`Outcome::NoFacesDetected`](crate::report::Outcome).
    pub fn recognize(
        &self,
        faces: &[DetectedFace],
        candidates: &[Candidate],
    ) -> Result<Report, MatchError> {
        if candidates.is_empty() {
            return Err(MatchError::NoCandidates);
        }
        let matrix = score(faces, candidates)?;
        let match_set = self.strategy.resolve(&matrix, self.threshold);
        let report = aggregate(faces, candidates, &match_set);

        tracing::info!(
            space = %batch_space(faces, candidates).map(ToString::to_string).unwrap_or_default(),
            faces = report.total_faces_detected,
            candidates = report.total_candidates,
            recognized = report.total_recognized,
            outcome = ?report.outcome,
            "recognition complete"
        );

        Ok(report)
    }
}

/// Match `faces` against `candidates` with the greedy strategy.
///
/// `threshold` must lie in `[-1, 1]`; it is checked before anything else.
pub fn recognize(
    faces: &[DetectedFace],
    candidates: &[Candidate],
    threshold: f32,
) -> Result<Report, MatchError> {
    FaceMatcher::new(threshold)?.recognize(faces, candidates)
}

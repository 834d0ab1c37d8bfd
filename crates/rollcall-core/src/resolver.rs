//! Duplicate-free assignment of detected faces to students.
//!
//! Each face takes at most one student and each student at most one face.
//! A pair is only assignable when its similarity clears the threshold.

use crate::scorer::ScoreMatrix;
use crate::types::{Match, ScoredPair, StudentId, Threshold};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Outcome of resolving one score matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSet {
    /// Accepted assignments, in acceptance order (highest similarity first).
    pub matches: Vec<Match>,
    /// Faces left without a student, ascending.
    pub unmatched_faces: Vec<usize>,
    /// Candidates left without a face, ascending.
    pub unmatched_students: Vec<StudentId>,
}

impl MatchSet {
    pub fn recognized(&self) -> usize {
        self.matches.len()
    }

    pub fn match_for_face(&self, face_index: usize) -> Option<&Match> {
        self.matches.iter().find(|m| m.face_index == face_index)
    }

    pub fn match_for_student(&self, student_id: StudentId) -> Option<&Match> {
        self.matches.iter().find(|m| m.student_id == student_id)
    }
}

/// Strategy for turning a score matrix into a [`MatchSet`].
pub trait AssignmentStrategy {
    fn resolve(&self, matrix: &ScoreMatrix, threshold: Threshold) -> MatchSet;
}

/// Greedy highest-score-first assignment.
///
/// Eligible pairs are visited by descending similarity, then ascending face
/// index, then ascending student id. A pair is accepted when neither side has
/// been claimed by an earlier pair. Runs in O(n·m·log(n·m)) and yields the
/// same output for the same input.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyAssignment;

impl AssignmentStrategy for GreedyAssignment {
    fn resolve(&self, matrix: &ScoreMatrix, threshold: Threshold) -> MatchSet {
        let (rows, cols) = matrix.scores().dim();

        let mut eligible: Vec<(usize, usize, ScoredPair)> = matrix
            .scores()
            .indexed_iter()
            .filter(|&(_, &similarity)| threshold.admits(similarity))
            .map(|((row, col), &similarity)| {
                let pair = ScoredPair {
                    face_index: matrix.face_indices()[row],
                    student_id: matrix.student_ids()[col],
                    similarity,
                };
                (row, col, pair)
            })
            .collect();
        eligible.sort_by(|(_, _, a), (_, _, b)| rank(a, b));

        let mut face_taken = vec![false; rows];
        let mut student_taken = vec![false; cols];
        let mut matches = Vec::with_capacity(rows.min(cols));

        for (row, col, pair) in &eligible {
            if face_taken[*row] || student_taken[*col] {
                continue;
            }
            face_taken[*row] = true;
            student_taken[*col] = true;
            matches.push(Match::from(*pair));
        }

        let mut unmatched_faces: Vec<usize> = matrix
            .face_indices()
            .iter()
            .zip(&face_taken)
            .filter(|&(_, &taken)| !taken)
            .map(|(&face, _)| face)
            .collect();
        unmatched_faces.sort_unstable();

        let mut unmatched_students: Vec<StudentId> = matrix
            .student_ids()
            .iter()
            .zip(&student_taken)
            .filter(|&(_, &taken)| !taken)
            .map(|(&id, _)| id)
            .collect();
        unmatched_students.sort_unstable();

        tracing::debug!(
            eligible = eligible.len(),
            accepted = matches.len(),
            threshold = threshold.value(),
            "resolved greedy assignment"
        );

        MatchSet {
            matches,
            unmatched_faces,
            unmatched_students,
        }
    }
}

/// Resolve with the default greedy strategy.
pub fn resolve(matrix: &ScoreMatrix, threshold: Threshold) -> MatchSet {
    GreedyAssignment.resolve(matrix, threshold)
}

/// Visiting order: similarity descending, then face index, then student id.
///
/// Only admitted (non-NaN) scores reach here; `-0.0` and `0.0` rank equal.
fn rank(a: &ScoredPair, b: &ScoredPair) -> Ordering {
    b.similarity
        .partial_cmp(&a.similarity)
        .unwrap_or(Ordering::Equal)
        .then(a.face_index.cmp(&b.face_index))
        .then(a.student_id.cmp(&b.student_id))
}

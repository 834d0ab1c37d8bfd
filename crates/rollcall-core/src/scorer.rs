//! Pairwise cosine scoring of detected faces against the candidate pool.

use crate::error::MatchError;
use crate::types::{unit_dot, Candidate, DetectedFace, ScoredPair, SpaceId, StudentId};
use ndarray::Array2;
use std::collections::HashSet;

/// Dense `faces × candidates` similarity matrix.
///
/// Row `r` belongs to `face_indices[r]`, column `c` to `student_ids[c]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreMatrix {
    face_indices: Vec<usize>,
    student_ids: Vec<StudentId>,
    scores: Array2<f32>,
}

impl ScoreMatrix {
    /// Build a matrix from precomputed scores, e.g. an archived request.
    ///
    /// Rows follow `face_indices`, columns follow `student_ids`.
    pub fn from_scores(
        face_indices: Vec<usize>,
        student_ids: Vec<StudentId>,
        scores: Array2<f32>,
    ) -> Result<Self, MatchError> {
        let (rows, cols) = scores.dim();
        if rows != face_indices.len() {
            return Err(MatchError::DimensionMismatch { expected: face_indices.len(), found: rows });
        }
        if cols != student_ids.len() {
            return Err(MatchError::DimensionMismatch { expected: student_ids.len(), found: cols });
        }
        ensure_unique_faces(face_indices.iter().copied())?;
        ensure_unique_students(student_ids.iter().copied())?;
        Ok(Self { face_indices, student_ids, scores })
    }

    pub fn face_indices(&self) -> &[usize] {
        &self.face_indices
    }

    pub fn student_ids(&self) -> &[StudentId] {
        &self.student_ids
    }

    pub fn scores(&self) -> &Array2<f32> {
        &self.scores
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Similarity for a face/student pair, if both are present.
    pub fn get(&self, face_index: usize, student_id: StudentId) -> Option<f32> {
        let row = self.face_indices.iter().position(|&f| f == face_index)?;
        let col = self.student_ids.iter().position(|&s| s == student_id)?;
        Some(self.scores[[row, col]])
    }

    /// Every cell as a [`ScoredPair`], row-major.
    pub fn pairs(&self) -> impl Iterator<Item = ScoredPair> + '_ {
        self.scores.indexed_iter().map(|((row, col), &similarity)| ScoredPair {
            face_index: self.face_indices[row],
            student_id: self.student_ids[col],
            similarity,
        })
    }
}

/// Score every detected face against every candidate.
///
/// All embeddings must share one space and length; the first candidate (or
/// first face, when the pool is empty) fixes the reference. Nothing is scored
/// unless the whole batch validates.
pub fn score(faces: &[DetectedFace], candidates: &[Candidate]) -> Result<ScoreMatrix, MatchError> {
    validate_batch(faces, candidates)?;

    let face_units: Vec<Vec<f64>> = faces.iter().map(|f| f.embedding.unit()).collect();
    let candidate_units: Vec<Vec<f64>> = candidates.iter().map(|c| c.embedding.unit()).collect();

    let scores = Array2::from_shape_fn((faces.len(), candidates.len()), |(row, col)| {
        unit_dot(&face_units[row], &candidate_units[col])
    });

    tracing::debug!(
        faces = faces.len(),
        candidates = candidates.len(),
        "scored similarity matrix"
    );

    Ok(ScoreMatrix {
        face_indices: faces.iter().map(|f| f.face_index).collect(),
        student_ids: candidates.iter().map(|c| c.student_id).collect(),
        scores,
    })
}

/// Check that every embedding in the request is individually valid and
/// comparable with the rest, and that no face or student repeats.
pub fn validate_batch(faces: &[DetectedFace], candidates: &[Candidate]) -> Result<(), MatchError> {
    let mut embeddings = candidates
        .iter()
        .map(|c| &c.embedding)
        .chain(faces.iter().map(|f| &f.embedding));

    let Some(reference) = embeddings.next() else {
        return Ok(());
    };
    reference.validate()?;
    for embedding in embeddings {
        reference.ensure_comparable(embedding)?;
        embedding.validate()?;
    }

    ensure_unique_faces(faces.iter().map(|f| f.face_index))?;
    ensure_unique_students(candidates.iter().map(|c| c.student_id))?;
    Ok(())
}

/// Space shared by a validated batch, if it holds any embedding.
pub fn batch_space<'a>(faces: &'a [DetectedFace], candidates: &'a [Candidate]) -> Option<&'a SpaceId> {
    candidates
        .first()
        .map(|c| &c.embedding.space)
        .or_else(|| faces.first().map(|f| &f.embedding.space))
}

fn ensure_unique_faces(indices: impl Iterator<Item = usize>) -> Result<(), MatchError> {
    let mut seen = HashSet::new();
    for index in indices {
        if !seen.insert(index) {
            return Err(MatchError::DuplicateFace(index));
        }
    }
    Ok(())
}

fn ensure_unique_students(ids: impl Iterator<Item = StudentId>) -> Result<(), MatchError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(MatchError::DuplicateStudent(id));
        }
    }
    Ok(())
}

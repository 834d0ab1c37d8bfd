use crate::types::{SpaceId, StudentId};
use thiserror::Error;

/// Failures of a recognition request.
///
/// All of these are local and synchronous: retrying with identical inputs
/// produces the identical failure. An empty photo is not an error; see
/// [`Outcome::NoFacesDetected`](crate::report::Outcome::NoFacesDetected).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatchError {
    #[error("no enrolled students with a registered embedding in this class")]
    NoCandidates,
    #[error("embedding dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("embedding space mismatch: expected {expected}, found {found}")]
    SpaceMismatch { expected: SpaceId, found: SpaceId },
    #[error("similarity threshold {0} outside [-1, 1]")]
    InvalidThreshold(f32),
    #[error("embedding contains a non-finite value")]
    NonFiniteEmbedding,
    #[error("embedding has no values")]
    EmptyEmbedding,
    #[error("student {0} appears more than once in the candidate pool")]
    DuplicateStudent(StudentId),
    #[error("face index {0} appears more than once in the detected faces")]
    DuplicateFace(usize),
}

/// Failures raised by a [`FaceEncoder`](crate::encoder::FaceEncoder) collaborator.
#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("no face region with index {0}")]
    RegionNotFound(usize),
    #[error("encoding failed: {0}")]
    EncodingFailed(String),
    #[error(transparent)]
    Space(#[from] MatchError),
}

use crate::error::MatchError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default minimum cosine similarity for a face/student pair to be assignable.
pub const DEFAULT_THRESHOLD: f32 = 0.6;

/// Identifies the encoder model that produced an embedding, together with
/// the dimensionality of its output. Embeddings from different spaces are
/// never compared.
///
/// Serialized as `name:dim`, e.g. `arcface_buffalo_l:512`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SpaceId {
    pub name: String,
    pub dim: usize,
}

impl SpaceId {
    pub fn new(name: impl Into<String>, dim: usize) -> Self {
        Self { name: name.into(), dim }
    }

    /// 128-d space of the legacy dlib ResNet encoder.
    pub fn legacy() -> Self {
        Self::new("dlib_resnet_v1", 128)
    }

    /// 512-d space of the current ArcFace (buffalo_l) encoder.
    pub fn arcface() -> Self {
        Self::new("arcface_buffalo_l", 512)
    }
}

impl Default for SpaceId {
    fn default() -> Self {
        Self::arcface()
    }
}

impl fmt::Display for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.dim)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid embedding space {0:?}, expected `name:dim`")]
pub struct ParseSpaceError(String);

impl FromStr for SpaceId {
    type Err = ParseSpaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, dim) = s
            .rsplit_once(':')
            .ok_or_else(|| ParseSpaceError(s.to_string()))?;
        let dim: usize = dim.trim().parse().map_err(|_| ParseSpaceError(s.to_string()))?;
        let name = name.trim();
        if name.is_empty() || dim == 0 {
            return Err(ParseSpaceError(s.to_string()));
        }
        Ok(Self::new(name, dim))
    }
}

impl TryFrom<String> for SpaceId {
    type Error = ParseSpaceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SpaceId> for String {
    fn from(space: SpaceId) -> Self {
        space.to_string()
    }
}

/// Enrolled student identifier. Ordered numerically; tie-breaks rely on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(pub u64);

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Minimum similarity for an assignment, validated to lie in the cosine
/// range `[-1, 1]`. Out-of-range values are rejected, never clamped.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct Threshold(f32);

impl Threshold {
    pub fn new(value: f32) -> Result<Self, MatchError> {
        if value.is_finite() && (-1.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(MatchError::InvalidThreshold(value))
        }
    }

    pub fn value(self) -> f32 {
        self.0
    }

    /// Inclusive: a score exactly equal to the threshold is eligible.
    pub fn admits(self, similarity: f32) -> bool {
        similarity >= self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self(DEFAULT_THRESHOLD)
    }
}

impl TryFrom<f32> for Threshold {
    type Error = MatchError;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Threshold> for f32 {
    fn from(t: Threshold) -> Self {
        t.0
    }
}

/// Bounding box of a detected face in the original photo. Reporting only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Detector confidence, when the detector reports one.
    #[serde(default)]
    pub confidence: Option<f32>,
}

/// Face embedding tagged with the space that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub space: SpaceId,
    pub values: Vec<f32>,
}

impl Embedding {
    /// Build an embedding, checking its length against the space tag.
    pub fn new(space: SpaceId, values: Vec<f32>) -> Result<Self, MatchError> {
        let embedding = Self { space, values };
        embedding.validate()?;
        Ok(embedding)
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Check the invariants a deserialized embedding may have skipped.
    pub fn validate(&self) -> Result<(), MatchError> {
        if self.values.is_empty() {
            return Err(MatchError::EmptyEmbedding);
        }
        if self.values.len() != self.space.dim {
            return Err(MatchError::DimensionMismatch {
                expected: self.space.dim,
                found: self.values.len(),
            });
        }
        if self.values.iter().any(|v| !v.is_finite()) {
            return Err(MatchError::NonFiniteEmbedding);
        }
        Ok(())
    }

    /// Fail unless `other` lives in the same space with the same length.
    pub fn ensure_comparable(&self, other: &Embedding) -> Result<(), MatchError> {
        if self.space != other.space {
            return Err(MatchError::SpaceMismatch {
                expected: self.space.clone(),
                found: other.space.clone(),
            });
        }
        if self.values.len() != other.values.len() {
            return Err(MatchError::DimensionMismatch {
                expected: self.values.len(),
                found: other.values.len(),
            });
        }
        Ok(())
    }

    /// Unit-length copy in f64. A zero vector stays zero.
    pub fn unit(&self) -> Vec<f64> {
        let norm = self
            .values
            .iter()
            .map(|&v| f64::from(v) * f64::from(v))
            .sum::<f64>()
            .sqrt();
        if norm > 0.0 {
            self.values.iter().map(|&v| f64::from(v) / norm).collect()
        } else {
            vec![0.0; self.values.len()]
        }
    }

    /// Cosine similarity in [-1, 1], normalizing both sides first.
    ///
    /// Returns 0.0 when either side is the zero vector.
    pub fn similarity(&self, other: &Embedding) -> Result<f32, MatchError> {
        self.ensure_comparable(other)?;
        Ok(unit_dot(&self.unit(), &other.unit()))
    }
}

/// Dot product of two unit vectors, clamped to the cosine range.
///
/// A zero result is always `+0.0`.
pub(crate) fn unit_dot(a: &[f64], b: &[f64]) -> f32 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    ((dot as f32) + 0.0).clamp(-1.0, 1.0)
}

/// Presentation fields for an enrolled student.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// One enrolled student eligible for matching in a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub student_id: StudentId,
    pub embedding: Embedding,
    #[serde(default)]
    pub display: DisplayMetadata,
}

/// A face found in the photo. `face_index` is its position in the photo and
/// is used for reporting and tie-breaking only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedFace {
    pub face_index: usize,
    pub embedding: Embedding,
    #[serde(default)]
    pub bounding_box: Option<BoundingBox>,
}

/// One cell of the score matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredPair {
    pub face_index: usize,
    pub student_id: StudentId,
    pub similarity: f32,
}

/// A scored pair accepted as a final assignment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub face_index: usize,
    pub student_id: StudentId,
    pub similarity: f32,
}

impl From<ScoredPair> for Match {
    fn from(pair: ScoredPair) -> Self {
        Self {
            face_index: pair.face_index,
            student_id: pair.student_id,
            similarity: pair.similarity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emb(values: Vec<f32>) -> Embedding {
        let dim = values.len();
        Embedding::new(SpaceId::new("test", dim), values).unwrap()
    }

    #[test]
    fn test_similarity_identical() {
        let a = emb(vec![1.0, 0.0, 0.0]);
        let b = emb(vec![1.0, 0.0, 0.0]);
        assert!((a.similarity(&b).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_orthogonal() {
        let a = emb(vec![1.0, 0.0]);
        let b = emb(vec![0.0, 1.0]);
        assert!(a.similarity(&b).unwrap().abs() < 1e-6);
    }

    #[test]
    fn test_similarity_orthogonal_is_positive_zero() {
        let a = emb(vec![-1.0, 0.0]);
        let b = emb(vec![0.0, -1.0]);
        let sim = a.similarity(&b).unwrap();
        assert_eq!(sim, 0.0);
        assert!(sim.is_sign_positive());
    }

    #[test]
    fn test_similarity_opposite() {
        let a = emb(vec![1.0, 0.0]);
        let b = emb(vec![-1.0, 0.0]);
        assert!((a.similarity(&b).unwrap() + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_zero_vector() {
        let a = emb(vec![0.0, 0.0]);
        let b = emb(vec![1.0, 0.0]);
        assert_eq!(a.similarity(&b).unwrap(), 0.0);
    }

    #[test]
    fn test_similarity_ignores_magnitude() {
        let a = emb(vec![0.3, -0.2, 0.9]);
        let b = emb(vec![0.5, 0.1, 0.4]);
        let a_scaled = emb(vec![30.0, -20.0, 90.0]);
        let b_scaled = emb(vec![0.05, 0.01, 0.04]);
        let plain = a.similarity(&b).unwrap();
        let scaled = a_scaled.similarity(&b_scaled).unwrap();
        assert!((plain - scaled).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_rejects_other_space() {
        let a = Embedding::new(SpaceId::new("a", 2), vec![1.0, 0.0]).unwrap();
        let b = Embedding::new(SpaceId::new("b", 2), vec![1.0, 0.0]).unwrap();
        assert!(matches!(a.similarity(&b), Err(MatchError::SpaceMismatch { .. })));
    }

    #[test]
    fn test_new_checks_dimension() {
        let err = Embedding::new(SpaceId::legacy(), vec![0.1; 512]).unwrap_err();
        assert_eq!(err, MatchError::DimensionMismatch { expected: 128, found: 512 });
    }

    #[test]
    fn test_new_rejects_nan() {
        let err = Embedding::new(SpaceId::new("t", 2), vec![f32::NAN, 1.0]).unwrap_err();
        assert_eq!(err, MatchError::NonFiniteEmbedding);
    }

    #[test]
    fn test_threshold_range() {
        assert!(Threshold::new(0.6).is_ok());
        assert!(Threshold::new(-1.0).is_ok());
        assert!(Threshold::new(1.0).is_ok());
        assert_eq!(Threshold::new(1.5), Err(MatchError::InvalidThreshold(1.5)));
        assert!(Threshold::new(f32::NAN).is_err());
        assert_eq!(Threshold::default().value(), DEFAULT_THRESHOLD);
    }

    #[test]
    fn test_threshold_inclusive() {
        let t = Threshold::new(0.6).unwrap();
        assert!(t.admits(0.6));
        assert!(!t.admits(0.599_999));
    }

    #[test]
    fn test_space_id_parse_and_display() {
        let space: SpaceId = "arcface_buffalo_l:512".parse().unwrap();
        assert_eq!(space, SpaceId::arcface());
        assert_eq!(space.to_string(), "arcface_buffalo_l:512");
        assert!("arcface".parse::<SpaceId>().is_err());
        assert!("arcface:0".parse::<SpaceId>().is_err());
        assert!(":128".parse::<SpaceId>().is_err());
    }
}

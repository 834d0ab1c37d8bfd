//! Contract with the external face encoder.
//!
//! Detection and embedding extraction happen outside this crate. The
//! matching core only consumes the encoder's output and refuses anything
//! produced in a space other than the one the encoder advertises.

use crate::error::{EncoderError, MatchError};
use crate::types::{BoundingBox, DetectedFace, Embedding, SpaceId};

/// A detected face region handed to the encoder.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceRegion {
    /// Position of the source photo within the session's batch.
    pub photo: usize,
    /// Position of the face in the photo, 0-based.
    pub face_index: usize,
    pub bounding_box: BoundingBox,
    /// Raw crop pixels. May be empty for encoders that replay recorded output.
    pub crop: Vec<u8>,
}

/// Turns face regions into embeddings of one fixed space.
///
/// Implementations are expected to be idempotent for a fixed input.
pub trait FaceEncoder: Send {
    fn space(&self) -> &SpaceId;
    fn encode(&mut self, region: &FaceRegion) -> Result<Embedding, EncoderError>;
}

/// Encode every region synchronously, in order.
pub fn encode_regions(
    encoder: &mut dyn FaceEncoder,
    regions: &[FaceRegion],
) -> Result<Vec<DetectedFace>, EncoderError> {
    let mut faces = Vec::with_capacity(regions.len());
    for region in regions {
        let embedding = encoder.encode(region)?;
        if &embedding.space != encoder.space() {
            return Err(MatchError::SpaceMismatch {
                expected: encoder.space().clone(),
                found: embedding.space,
            }
            .into());
        }
        embedding.validate()?;
        faces.push(DetectedFace {
            face_index: region.face_index,
            embedding,
            bounding_box: Some(region.bounding_box),
        });
    }
    tracing::debug!(faces = faces.len(), space = %encoder.space(), "encoded face regions");
    Ok(faces)
}

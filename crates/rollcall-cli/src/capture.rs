//! Recorded captures: face regions and the embeddings an external
//! detector+encoder produced for them.

use anyhow::{Context, Result};
use rollcall_core::{BoundingBox, Embedding, EncoderError, FaceEncoder, FaceRegion, SpaceId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// One face as recorded by the external encoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedFace {
    pub bounding_box: BoundingBox,
    pub embedding: Vec<f32>,
}

/// One photo's worth of recorded faces. Face indices follow list order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capture {
    pub space: SpaceId,
    #[serde(default)]
    pub faces: Vec<RecordedFace>,
}

impl Capture {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading capture {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing capture {}", path.display()))
    }

    /// Regions to feed back through the encoder, tagged with `photo`.
    pub fn regions(&self, photo: usize) -> Vec<FaceRegion> {
        self.faces
            .iter()
            .enumerate()
            .map(|(face_index, face)| FaceRegion {
                photo,
                face_index,
                bounding_box: face.bounding_box,
                crop: Vec::new(),
            })
            .collect()
    }
}

/// Encoder that replays recorded embeddings, keyed by photo and face index.
///
/// Recorded embeddings keep the space of their capture, so a capture from a
/// different encoder is rejected when it is replayed.
pub struct RecordedEncoder {
    space: SpaceId,
    recorded: HashMap<(usize, usize), Embedding>,
}

impl RecordedEncoder {
    pub fn new(space: SpaceId) -> Self {
        Self { space, recorded: HashMap::new() }
    }

    /// Record every face of `capture` under `photo`.
    pub fn record(&mut self, photo: usize, capture: &Capture) {
        for (face_index, face) in capture.faces.iter().enumerate() {
            let embedding = Embedding {
                space: capture.space.clone(),
                values: face.embedding.clone(),
            };
            self.recorded.insert((photo, face_index), embedding);
        }
    }
}

impl FaceEncoder for RecordedEncoder {
    fn space(&self) -> &SpaceId {
        &self.space
    }

    fn encode(&mut self, region: &FaceRegion) -> Result<Embedding, EncoderError> {
        self.recorded
            .get(&(region.photo, region.face_index))
            .cloned()
            .ok_or(EncoderError::RegionNotFound(region.face_index))
    }
}

//! Projection of a [`MatchSet`] into the caller-facing report.

use crate::resolver::MatchSet;
use crate::types::{BoundingBox, Candidate, DetectedFace, StudentId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How a recognition request concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Faces were present and matching ran, whether or not anyone was recognized.
    Completed,
    /// The photo yielded no faces; all counts are zero. Retake the photo.
    NoFacesDetected,
}

/// One recognized face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub face_index: usize,
    pub student_id: StudentId,
    pub name: String,
    pub similarity: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
}

/// Result of one recognition request, suitable for direct serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub outcome: Outcome,
    pub total_faces_detected: usize,
    pub total_candidates: usize,
    pub total_recognized: usize,
    /// Recognized faces over detected faces; 0 when no faces.
    pub recognition_rate: f64,
    /// Recognized faces over candidates; 0 when no candidates.
    pub coverage_rate: f64,
    /// Sorted by `face_index`.
    pub matches: Vec<MatchRecord>,
    pub unmatched_faces: Vec<usize>,
    pub unmatched_students: Vec<StudentId>,
}

/// Build the report for a resolved request. No decisions are made here.
pub fn aggregate(faces: &[DetectedFace], candidates: &[Candidate], match_set: &MatchSet) -> Report {
    let boxes: HashMap<usize, Option<BoundingBox>> =
        faces.iter().map(|f| (f.face_index, f.bounding_box)).collect();
    let names: HashMap<StudentId, &str> = candidates
        .iter()
        .map(|c| (c.student_id, c.display.name.as_str()))
        .collect();

    let mut matches: Vec<MatchRecord> = match_set
        .matches
        .iter()
        .map(|m| MatchRecord {
            face_index: m.face_index,
            student_id: m.student_id,
            name: names.get(&m.student_id).copied().unwrap_or_default().to_string(),
            similarity: m.similarity,
            bounding_box: boxes.get(&m.face_index).copied().flatten(),
        })
        .collect();
    matches.sort_by_key(|m| m.face_index);

    let total_faces_detected = faces.len();
    let total_recognized = matches.len();

    Report {
        outcome: if faces.is_empty() {
            Outcome::NoFacesDetected
        } else {
            Outcome::Completed
        },
        total_faces_detected,
        total_candidates: candidates.len(),
        total_recognized,
        recognition_rate: ratio(total_recognized, total_faces_detected),
        coverage_rate: ratio(total_recognized, candidates.len()),
        matches,
        unmatched_faces: match_set.unmatched_faces.clone(),
        unmatched_students: match_set.unmatched_students.clone(),
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DisplayMetadata, Embedding, Match, SpaceId};

    fn embedding() -> Embedding {
        Embedding::new(SpaceId::new("t", 1), vec![1.0]).unwrap()
    }

    fn face(face_index: usize) -> DetectedFace {
        DetectedFace {
            face_index,
            embedding: embedding(),
            bounding_box: Some(BoundingBox {
                x: face_index as f32,
                y: 0.0,
                width: 10.0,
                height: 10.0,
                confidence: None,
            }),
        }
    }

    fn candidate(id: u64, name: &str) -> Candidate {
        Candidate {
            student_id: StudentId(id),
            embedding: embedding(),
            display: DisplayMetadata { name: name.into(), email: None },
        }
    }

    #[test]
    fn test_counts_and_rates() {
        let faces = [face(0), face(1), face(2), face(3)];
        let candidates = [candidate(1, "Ada"), candidate(2, "Grace")];
        let set = MatchSet {
            matches: vec![
                Match { face_index: 2, student_id: StudentId(2), similarity: 0.9 },
                Match { face_index: 0, student_id: StudentId(1), similarity: 0.7 },
            ],
            unmatched_faces: vec![1, 3],
            unmatched_students: vec![],
        };
        let report = aggregate(&faces, &candidates, &set);
        assert_eq!(report.outcome, Outcome::Completed);
        assert_eq!(report.total_faces_detected, 4);
        assert_eq!(report.total_recognized, 2);
        assert!((report.recognition_rate - 0.5).abs() < 1e-12);
        assert!((report.coverage_rate - 1.0).abs() < 1e-12);
        // Sorted by face index, names and boxes attached.
        assert_eq!(report.matches[0].face_index, 0);
        assert_eq!(report.matches[0].name, "Ada");
        assert_eq!(report.matches[1].name, "Grace");
        assert_eq!(report.matches[1].bounding_box.unwrap().x, 2.0);
        assert_eq!(report.unmatched_faces, vec![1, 3]);
    }

    #[test]
    fn test_no_faces_yields_zero_report() {
        let candidates = [candidate(1, "Ada")];
        let set = MatchSet {
            matches: vec![],
            unmatched_faces: vec![],
            unmatched_students: vec![StudentId(1)],
        };
        let report = aggregate(&[], &candidates, &set);
        assert_eq!(report.outcome, Outcome::NoFacesDetected);
        assert_eq!(report.total_faces_detected, 0);
        assert_eq!(report.total_recognized, 0);
        assert_eq!(report.recognition_rate, 0.0);
        assert_eq!(report.coverage_rate, 0.0);
    }

    #[test]
    fn test_zero_candidates_rate_is_zero() {
        let set = MatchSet { matches: vec![], unmatched_faces: vec![0], unmatched_students: vec![] };
        let report = aggregate(&[face(0)], &[], &set);
        assert_eq!(report.coverage_rate, 0.0);
        assert_eq!(report.recognition_rate, 0.0);
    }

    #[test]
    fn test_report_serializes_outcome_snake_case() {
        let set = MatchSet { matches: vec![], unmatched_faces: vec![], unmatched_students: vec![] };
        let json = serde_json::to_value(aggregate(&[], &[], &set)).unwrap();
        assert_eq!(json["outcome"], "no_faces_detected");
    }
}

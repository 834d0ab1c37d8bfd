//! Multi-photo sessions and the attendance roll derived from them.

use crate::report::Report;
use crate::types::{Candidate, StudentId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A student recognized somewhere in the session, with their best score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMatch {
    pub student_id: StudentId,
    pub name: String,
    pub similarity: f32,
    /// Position of the photo in the submitted batch.
    pub photo: usize,
    pub face_index: usize,
}

/// Several per-photo reports folded into one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub photos_processed: usize,
    pub total_faces_detected: usize,
    /// Descending similarity, ties by ascending student id.
    pub recognized: Vec<SessionMatch>,
}

impl SessionSummary {
    /// Merge per-photo reports. A student seen in several photos keeps the
    /// highest similarity; on equal scores the earlier photo is kept.
    pub fn merge(reports: &[Report]) -> Self {
        let mut best: BTreeMap<StudentId, SessionMatch> = BTreeMap::new();

        for (photo, report) in reports.iter().enumerate() {
            for record in &report.matches {
                let improves = best
                    .get(&record.student_id)
                    .map_or(true, |prev| record.similarity > prev.similarity);
                if improves {
                    best.insert(
                        record.student_id,
                        SessionMatch {
                            student_id: record.student_id,
                            name: record.name.clone(),
                            similarity: record.similarity,
                            photo,
                            face_index: record.face_index,
                        },
                    );
                }
            }
        }

        let mut recognized: Vec<SessionMatch> = best.into_values().collect();
        recognized.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then(a.student_id.cmp(&b.student_id))
        });

        Self {
            photos_processed: reports.len(),
            total_faces_detected: reports.iter().map(|r| r.total_faces_detected).sum(),
            recognized,
        }
    }

    pub fn similarity_for(&self, student_id: StudentId) -> Option<f32> {
        self.recognized
            .iter()
            .find(|m| m.student_id == student_id)
            .map(|m| m.similarity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
}

/// One line of the attendance roll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollEntry {
    pub student_id: StudentId,
    pub name: String,
    pub status: AttendanceStatus,
    /// Recognition confidence for present students.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

/// One entry per candidate, present when recognized in any photo.
/// Ordered by student id.
pub fn roll_call(candidates: &[Candidate], summary: &SessionSummary) -> Vec<RollEntry> {
    let mut roll: Vec<RollEntry> = candidates
        .iter()
        .map(|c| {
            let confidence = summary.similarity_for(c.student_id);
            RollEntry {
                student_id: c.student_id,
                name: c.display.name.clone(),
                status: if confidence.is_some() {
                    AttendanceStatus::Present
                } else {
                    AttendanceStatus::Absent
                },
                confidence,
            }
        })
        .collect();
    roll.sort_by_key(|e| e.student_id);
    roll
}

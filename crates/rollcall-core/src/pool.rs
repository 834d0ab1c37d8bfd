//! Candidate pool construction.
//!
//! Restricts the enrollment store to the students of one class who hold a
//! reference embedding in the space of the encoder currently in use.

use crate::error::MatchError;
use crate::types::{Candidate, DisplayMetadata, Embedding, SpaceId, StudentId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Class identifier, resolved by the enrollment store.
pub type ClassId = u64;

/// The class/session a recognition request belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub class_id: ClassId,
    /// Space of the encoder that produced the photo's embeddings.
    pub space: SpaceId,
}

/// One enrolled student as the enrollment store knows them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub student_id: StudentId,
    #[serde(default)]
    pub display: DisplayMetadata,
    #[serde(default = "active_by_default")]
    pub active: bool,
    /// Reference embeddings, possibly from several encoder spaces.
    #[serde(default)]
    pub references: Vec<Embedding>,
}

fn active_by_default() -> bool {
    true
}

/// External enrollment store.
pub trait EnrollmentSource {
    /// Students actively enrolled in `class_id`.
    fn cohort(&self, class_id: ClassId) -> Vec<Enrollment>;
}

/// Builds per-request candidate pools from an [`EnrollmentSource`].
pub struct CandidatePoolBuilder<'a, S: EnrollmentSource + ?Sized> {
    source: &'a S,
}

impl<'a, S: EnrollmentSource + ?Sized> CandidatePoolBuilder<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Build the pool for one session, ordered by ascending student id.
    ///
    /// Students whose references are all in other spaces, or who are
    /// inactive, are left out. Several references in the session's space
    /// are averaged into one unit-length embedding. A student the source
    /// lists twice fails with `DuplicateStudent`.
    pub fn build(&self, session: &SessionContext) -> Result<Vec<Candidate>, MatchError> {
        let mut by_student: BTreeMap<StudentId, Candidate> = BTreeMap::new();

        for enrollment in self.source.cohort(session.class_id) {
            if !enrollment.active {
                continue;
            }

            let in_space: Vec<&Embedding> = enrollment
                .references
                .iter()
                .filter(|r| r.space == session.space)
                .collect();

            if in_space.is_empty() {
                if !enrollment.references.is_empty() {
                    tracing::warn!(
                        student = %enrollment.student_id,
                        space = %session.space,
                        "student has no reference embedding in the active space; skipping"
                    );
                }
                continue;
            }

            let embedding = average_embedding(&in_space)?;
            let student_id = enrollment.student_id;
            let previous = by_student.insert(
                student_id,
                Candidate {
                    student_id,
                    embedding,
                    display: enrollment.display,
                },
            );
            if previous.is_some() {
                return Err(MatchError::DuplicateStudent(student_id));
            }
        }

        if by_student.is_empty() {
            return Err(MatchError::NoCandidates);
        }

        tracing::debug!(
            class_id = session.class_id,
            space = %session.space,
            candidates = by_student.len(),
            "built candidate pool"
        );

        Ok(by_student.into_values().collect())
    }
}

/// Mean of several references from one space, rescaled to unit length.
///
/// A single reference is returned unchanged, at its original magnitude;
/// the scorer normalizes every embedding before comparing.
pub fn average_embedding(references: &[&Embedding]) -> Result<Embedding, MatchError> {
    let (first, rest) = references.split_first().ok_or(MatchError::EmptyEmbedding)?;
    first.validate()?;
    if rest.is_empty() {
        return Ok((*first).clone());
    }

    let mut sum = vec![0.0f64; first.dim()];
    for reference in references {
        first.ensure_comparable(reference)?;
        reference.validate()?;
        for (acc, &v) in sum.iter_mut().zip(&reference.values) {
            *acc += f64::from(v);
        }
    }

    let norm = sum.iter().map(|v| v * v).sum::<f64>().sqrt();
    let values = if norm > 0.0 {
        sum.iter().map(|v| (v / norm) as f32).collect()
    } else {
        vec![0.0; sum.len()]
    };

    Embedding::new(first.space.clone(), values)
}

/// Class membership entry in a [`Roster`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassRoster {
    pub class_id: ClassId,
    pub students: Vec<StudentId>,
    #[serde(default = "active_by_default")]
    pub active: bool,
}

/// In-memory enrollment store, typically loaded from an exported JSON file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Roster {
    pub classes: Vec<ClassRoster>,
    pub students: Vec<Enrollment>,
}

impl EnrollmentSource for Roster {
    fn cohort(&self, class_id: ClassId) -> Vec<Enrollment> {
        let members: BTreeSet<StudentId> = self
            .classes
            .iter()
            .filter(|c| c.class_id == class_id && c.active)
            .flat_map(|c| c.students.iter().copied())
            .collect();

        self.students
            .iter()
            .filter(|s| members.contains(&s.student_id))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space() -> SpaceId {
        SpaceId::new("test", 2)
    }

    fn reference(space: SpaceId, values: [f32; 2]) -> Embedding {
        Embedding::new(space, values.to_vec()).unwrap()
    }

    fn enrollment(id: u64, references: Vec<Embedding>) -> Enrollment {
        Enrollment {
            student_id: StudentId(id),
            display: DisplayMetadata { name: format!("student {id}"), email: None },
            active: true,
            references,
        }
    }

    fn roster() -> Roster {
        Roster {
            classes: vec![
                ClassRoster { class_id: 1, students: vec![StudentId(3), StudentId(1), StudentId(2)], active: true },
                ClassRoster { class_id: 2, students: vec![StudentId(4)], active: true },
                ClassRoster { class_id: 3, students: vec![StudentId(1)], active: false },
            ],
            students: vec![
                enrollment(1, vec![reference(space(), [1.0, 0.0])]),
                enrollment(2, vec![reference(SpaceId::new("legacy", 2), [0.0, 1.0])]),
                enrollment(3, vec![reference(space(), [0.0, 1.0]), reference(space(), [1.0, 0.0])]),
                enrollment(4, vec![reference(space(), [1.0, 1.0])]),
            ],
        }
    }

    fn session(class_id: ClassId) -> SessionContext {
        SessionContext { class_id, space: space() }
    }

    #[test]
    fn test_pool_restricted_to_class_and_space() {
        let roster = roster();
        let pool = CandidatePoolBuilder::new(&roster).build(&session(1)).unwrap();
        let ids: Vec<StudentId> = pool.iter().map(|c| c.student_id).collect();
        // Student 2 only has a legacy reference; student 4 is in another class.
        assert_eq!(ids, vec![StudentId(1), StudentId(3)]);
        assert_eq!(pool[0].display.name, "student 1");
    }

    #[test]
    fn test_multiple_references_averaged_to_unit() {
        let roster = roster();
        let pool = CandidatePoolBuilder::new(&roster).build(&session(1)).unwrap();
        let averaged = &pool[1].embedding;
        let expected = std::f32::consts::FRAC_1_SQRT_2;
        assert!((averaged.values[0] - expected).abs() < 1e-6);
        assert!((averaged.values[1] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_inactive_students_excluded() {
        let mut roster = roster();
        roster.students[0].active = false;
        let pool = CandidatePoolBuilder::new(&roster).build(&session(1)).unwrap();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].student_id, StudentId(3));
    }

    #[test]
    fn test_empty_pool_is_no_candidates() {
        let roster = roster();
        let builder = CandidatePoolBuilder::new(&roster);
        assert_eq!(builder.build(&session(3)), Err(MatchError::NoCandidates));
        assert_eq!(builder.build(&session(99)), Err(MatchError::NoCandidates));
        let legacy = SessionContext { class_id: 2, space: SpaceId::new("legacy", 2) };
        assert_eq!(builder.build(&legacy), Err(MatchError::NoCandidates));
    }

    #[test]
    fn test_student_listed_twice_is_rejected() {
        let mut roster = roster();
        let mut twin = enrollment(1, vec![reference(space(), [0.0, 1.0])]);
        twin.display.name = "someone else".into();
        roster.students.push(twin);
        let pool = CandidatePoolBuilder::new(&roster).build(&session(1));
        assert_eq!(pool, Err(MatchError::DuplicateStudent(StudentId(1))));
    }

    #[test]
    fn test_duplicate_inactive_entry_is_skipped() {
        let mut roster = roster();
        let mut stale = enrollment(1, vec![reference(space(), [0.0, 1.0])]);
        stale.active = false;
        roster.students.push(stale);
        let pool = CandidatePoolBuilder::new(&roster).build(&session(1)).unwrap();
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_average_single_reference_unchanged() {
        let r = reference(space(), [3.0, 4.0]);
        assert_eq!(average_embedding(&[&r]).unwrap(), r);
    }

    #[test]
    fn test_roster_from_json() {
        let json = r#"{
            "classes": [{ "class_id": 10, "students": [5] }],
            "students": [{
                "student_id": 5,
                "display": { "name": "Ada" },
                "references": [{ "space": "test:2", "values": [0.6, 0.8] }]
            }]
        }"#;
        let roster: Roster = serde_json::from_str(json).unwrap();
        let pool = CandidatePoolBuilder::new(&roster).build(&session(10)).unwrap();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].display.name, "Ada");
        assert_eq!(pool[0].embedding.space, space());
    }
}

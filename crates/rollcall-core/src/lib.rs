//! rollcall-core — Face-identity matching engine for classroom attendance.
//!
//! Scores the faces found in one photo against the enrolled students of a
//! class by cosine similarity, then assigns faces to students greedily,
//! highest score first, without ever assigning a face or a student twice.

pub mod encoder;
pub mod error;
pub mod matcher;
pub mod pool;
pub mod report;
pub mod resolver;
pub mod scorer;
pub mod session;
pub mod types;

pub use encoder::{encode_regions, FaceEncoder, FaceRegion};
pub use error::{EncoderError, MatchError};
pub use matcher::{recognize, FaceMatcher};
pub use pool::{CandidatePoolBuilder, ClassId, EnrollmentSource, Roster, SessionContext};
pub use report::{aggregate, MatchRecord, Outcome, Report};
pub use resolver::{resolve, AssignmentStrategy, GreedyAssignment, MatchSet};
pub use scorer::{score, ScoreMatrix};
pub use session::{roll_call, AttendanceStatus, RollEntry, SessionSummary};
pub use types::{
    BoundingBox, Candidate, DetectedFace, DisplayMetadata, Embedding, Match, ScoredPair, SpaceId,
    StudentId, Threshold, DEFAULT_THRESHOLD,
};

use std::time::Duration;

use thiserror::Error;

use crate::data::{Cell, ClassId, SubjectId, TeacherId, UnmetSubject};
use crate::orchestrator::GenerationPhase;

/// A day or slot value outside the fixed MON..FRI x 1..8 week.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidSlotError {
    #[error("unknown day of week: {0:?} (expected MON, TUE, WED, THU or FRI)")]
    UnknownDay(String),

    #[error("slot index {0} out of range (expected 1..=8)")]
    SlotOutOfRange(i64),
}

/// Rejections raised at the curriculum boundary, before any solving.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CurriculumError {
    #[error("subject name must not be empty")]
    EmptySubjectName,

    #[error("subject {0:?} must require at least one hour per week")]
    ZeroHours(String),

    #[error("subject {name:?} requires {hours} hours but a week only has {max} cells")]
    HoursExceedWeek { name: String, hours: u32, max: usize },

    #[error("subject {subject_id} belongs to class {found}, not {expected}")]
    ForeignClass {
        subject_id: SubjectId,
        expected: ClassId,
        found: ClassId,
    },

    #[error("subject id {0} appears more than once")]
    DuplicateSubject(SubjectId),
}

/// A collaborator (curriculum, availability or persistence) failed to answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SourceError {
    pub message: String,
}

impl SourceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The store refused a replacement because it would break a schedule invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommitError {
    #[error("row {row_class} cannot be committed as part of class {class_id}")]
    ForeignRow { class_id: ClassId, row_class: ClassId },

    #[error("class {class_id} already has a subject at {cell}")]
    ClassCellTaken { class_id: ClassId, cell: Cell },

    #[error("teacher {teacher_id} is already teaching class {other_class} at {cell}")]
    TeacherDoubleBooked {
        teacher_id: TeacherId,
        cell: Cell,
        other_class: ClassId,
    },
}

/// The solver could not allocate every required hour.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not schedule {}", describe_unmet(.unmet_subjects))]
pub struct SchedulingError {
    pub unmet_subjects: Vec<UnmetSubject>,
}

fn describe_unmet(unmet: &[UnmetSubject]) -> String {
    unmet
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Everything `generate_schedule` can fail with.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("invalid curriculum: {0}")]
    InvalidCurriculum(#[from] CurriculumError),

    #[error("no subjects defined for class {0}")]
    EmptyCurriculum(ClassId),

    #[error("timed out after {waited:?} waiting for class {class_id} to be free")]
    ClassBusy { class_id: ClassId, waited: Duration },

    #[error("curriculum unavailable: {0}")]
    CurriculumUnavailable(SourceError),

    #[error("availability unavailable: {0}")]
    AvailabilityUnavailable(SourceError),

    #[error("timed out after {waited:?} waiting for the lock on teacher {teacher_id}")]
    LockTimeout { teacher_id: TeacherId, waited: Duration },

    #[error("schedule store unavailable: {0}")]
    StoreUnavailable(SourceError),

    #[error("solver task aborted: {0}")]
    SolverAborted(String),

    #[error(transparent)]
    Unsatisfiable(#[from] SchedulingError),

    #[error("commit rejected: {0}")]
    Commit(#[from] CommitError),
}

impl GenerationError {
    /// The state the request was in when it failed.
    pub fn phase(&self) -> GenerationPhase {
        match self {
            Self::InvalidCurriculum(_)
            | Self::EmptyCurriculum(_)
            | Self::ClassBusy { .. }
            | Self::CurriculumUnavailable(_)
            | Self::AvailabilityUnavailable(_) => GenerationPhase::Idle,
            Self::LockTimeout { .. } => GenerationPhase::Locking,
            Self::StoreUnavailable(_) | Self::SolverAborted(_) | Self::Unsatisfiable(_) => {
                GenerationPhase::Solving
            }
            Self::Commit(_) => GenerationPhase::Committing,
        }
    }

    /// Whether re-invoking generation unchanged may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ClassBusy { .. }
                | Self::CurriculumUnavailable(_)
                | Self::AvailabilityUnavailable(_)
                | Self::LockTimeout { .. }
                | Self::StoreUnavailable(_)
                | Self::Commit(_)
        )
    }
}

/// Why `set_curriculum` refused or failed.
#[derive(Debug, Error)]
pub enum CurriculumUpdateError {
    #[error(transparent)]
    Invalid(#[from] CurriculumError),

    #[error("curriculum unavailable: {0}")]
    Unavailable(SourceError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {name} has invalid value {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

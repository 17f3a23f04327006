//! Weekly timetable generation for school classes.
//!
//! Given a class's curriculum (subjects, weekly hours, assigned teachers) and
//! the school-wide availability of every teacher, [`Orchestrator::generate_schedule`]
//! assigns each required hour to a (day, slot) cell such that no class has two
//! subjects at once, no teacher teaches two classes at once, and every teacher
//! is only scheduled where they are available. The result replaces the class's
//! previous timetable atomically, or nothing changes.

pub mod availability;
pub mod config;
pub mod conflict;
pub mod curriculum;
pub mod data;
pub mod error;
pub mod locks;
pub mod orchestrator;
pub mod server;
pub mod service;
pub mod solver;
pub mod store;

pub use availability::{AvailabilityIndex, AvailabilitySource, InMemoryAvailability};
pub use config::Config;
pub use conflict::{TeacherOccupancy, would_conflict};
pub use curriculum::{Curriculum, CurriculumSource, InMemoryCurriculum};
pub use data::{
    Cell, CellSet, ClassId, ClassSubject, Day, NewClassSubject, ScheduleSlot, Slot, SubjectId,
    TeacherAvailability, TeacherId, UnmetSubject,
};
pub use error::{
    CommitError, CurriculumError, CurriculumUpdateError, GenerationError, InvalidSlotError,
    SchedulingError, SourceError,
};
pub use orchestrator::{GenerationPhase, Orchestrator};
pub use service::TimetableService;
pub use solver::{SolveOutcome, SolveRequest, SolverConfig, solve};
pub use store::{InMemoryScheduleStore, ScheduleStore};

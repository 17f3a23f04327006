//! End-to-end generation of one class's timetable.
//!
//! A request moves through `Idle -> Locking -> Solving -> Committing -> Done`,
//! or stops in `Failed`. The only externally visible write is the store's
//! atomic commit, so a request that fails or is dropped at any earlier point
//! leaves every schedule untouched. The class lock is held from the curriculum
//! read to the commit, and teacher locks from before the occupancy read to the
//! commit. Both are guards and are released whenever the request returns.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;

use crate::availability::AvailabilitySource;
use crate::curriculum::{Curriculum, CurriculumSource};
use crate::data::ScheduleSlot;
use crate::error::GenerationError;
use crate::locks::{LockSet, LockTable};
use crate::solver::{SolveRequest, SolverConfig, solve};
use crate::store::ScheduleStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationPhase {
    Idle,
    Locking,
    Solving,
    Committing,
    Done,
    Failed,
}

impl GenerationPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    pub fn can_advance_to(self, next: GenerationPhase) -> bool {
        use GenerationPhase::*;
        matches!(
            (self, next),
            (Idle, Locking)
                | (Idle, Failed)
                | (Locking, Solving)
                | (Locking, Failed)
                | (Solving, Committing)
                | (Solving, Failed)
                | (Committing, Done)
                | (Committing, Failed)
        )
    }
}

impl fmt::Display for GenerationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Locking => "locking",
            Self::Solving => "solving",
            Self::Committing => "committing",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

// Per-request phase tracker.
struct Generation<'a> {
    class_id: &'a str,
    phase: GenerationPhase,
}

impl<'a> Generation<'a> {
    fn new(class_id: &'a str) -> Self {
        Self {
            class_id,
            phase: GenerationPhase::Idle,
        }
    }

    fn advance(&mut self, next: GenerationPhase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "illegal transition {} -> {}",
            self.phase,
            next
        );
        debug!(
            "Generation for class {}: {} -> {}",
            self.class_id, self.phase, next
        );
        self.phase = next;
    }

    fn fail(&mut self, err: GenerationError) -> GenerationError {
        warn!(
            "Generation for class {} failed while {}: {}",
            self.class_id, self.phase, err
        );
        self.advance(GenerationPhase::Failed);
        err
    }
}

/// Coordinates collaborators for `generate_schedule`.
pub struct Orchestrator {
    curriculum: Arc<dyn CurriculumSource>,
    availability: Arc<dyn AvailabilitySource>,
    store: Arc<dyn ScheduleStore>,
    class_locks: LockTable,
    teacher_locks: LockTable,
    lock_timeout: Duration,
    solver: SolverConfig,
}

impl Orchestrator {
    pub fn new(
        curriculum: Arc<dyn CurriculumSource>,
        availability: Arc<dyn AvailabilitySource>,
        store: Arc<dyn ScheduleStore>,
    ) -> Self {
        Self {
            curriculum,
            availability,
            store,
            class_locks: LockTable::new(),
            teacher_locks: LockTable::new(),
            lock_timeout: Duration::from_secs(5),
            solver: SolverConfig::default(),
        }
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn with_solver_config(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    /// Waits until no generation of `class_id` is in flight and keeps it that
    /// way until the returned guard is dropped. Curriculum changes hold it so a
    /// generation can never commit rows for subjects that were just replaced.
    pub async fn hold_class(&self, class_id: &str) -> LockSet {
        self.class_locks.lock(class_id).await
    }

    /// Generates and commits the timetable of `class_id`, replacing any
    /// previous one. Nothing is written unless every required hour is placed.
    pub async fn generate_schedule(
        &self,
        class_id: &str,
    ) -> Result<Vec<ScheduleSlot>, GenerationError> {
        let mut generation = Generation::new(class_id);

        let _class = match self
            .class_locks
            .acquire(&[class_id.to_string()], self.lock_timeout)
            .await
        {
            Ok(guard) => guard,
            Err(_) => {
                return Err(generation.fail(GenerationError::ClassBusy {
                    class_id: class_id.to_string(),
                    waited: self.lock_timeout,
                }));
            }
        };

        // Collaborator reads happen before any teacher lock is taken.
        let subjects = match self.curriculum.curriculum(class_id).await {
            Ok(subjects) => subjects,
            Err(e) => return Err(generation.fail(GenerationError::CurriculumUnavailable(e))),
        };
        let curriculum = match Curriculum::new(class_id, subjects) {
            Ok(curriculum) if curriculum.is_empty() => {
                return Err(generation.fail(GenerationError::EmptyCurriculum(class_id.to_string())));
            }
            Ok(curriculum) => curriculum,
            Err(e) => return Err(generation.fail(e.into())),
        };
        let teachers = curriculum.teachers();
        let availability = match self.availability.snapshot(&teachers).await {
            Ok(index) => index,
            Err(e) => return Err(generation.fail(GenerationError::AvailabilityUnavailable(e))),
        };

        generation.advance(GenerationPhase::Locking);
        let locks = match self.teacher_locks.acquire(&teachers, self.lock_timeout).await {
            Ok(locks) => locks,
            Err(teacher_id) => {
                return Err(generation.fail(GenerationError::LockTimeout {
                    teacher_id,
                    waited: self.lock_timeout,
                }));
            }
        };

        generation.advance(GenerationPhase::Solving);
        let committed = match self.store.occupancy_excluding(class_id).await {
            Ok(occupancy) => occupancy,
            Err(e) => return Err(generation.fail(GenerationError::StoreUnavailable(e))),
        };
        // The search is CPU-bound; keep it off the async workers.
        let subjects = curriculum.subjects().to_vec();
        let solving_class = class_id.to_string();
        let config = self.solver;
        let solved = tokio::task::spawn_blocking(move || {
            solve(
                &SolveRequest {
                    class_id: &solving_class,
                    subjects: &subjects,
                    availability: &availability,
                    committed: &committed,
                },
                &config,
            )
        })
        .await;
        let outcome = match solved {
            Ok(outcome) => outcome,
            Err(e) => return Err(generation.fail(GenerationError::SolverAborted(e.to_string()))),
        };
        let rows = match outcome.into_result() {
            Ok(rows) => rows,
            Err(e) => return Err(generation.fail(e.into())),
        };

        generation.advance(GenerationPhase::Committing);
        if let Err(e) = self.store.commit(class_id, rows.clone()).await {
            return Err(generation.fail(e.into()));
        }

        generation.advance(GenerationPhase::Done);
        info!(
            "Generated {} rows for {} required hours of class {} ({} teachers locked)",
            rows.len(),
            curriculum.total_hours(),
            class_id,
            locks.keys().len()
        );
        Ok(rows)
    }
}

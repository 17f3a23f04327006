//! The operations the rest of the application calls.

use std::sync::Arc;

use log::info;

use crate::availability::{AvailabilitySource, InMemoryAvailability};
use crate::config::Config;
use crate::curriculum::{CurriculumSource, InMemoryCurriculum, build_subjects};
use crate::data::{Cell, ClassSubject, NewClassSubject, ScheduleSlot, TeacherAvailability};
use crate::error::{CurriculumUpdateError, GenerationError, SourceError};
use crate::orchestrator::Orchestrator;
use crate::store::{InMemoryScheduleStore, ScheduleStore};

pub struct TimetableService {
    curriculum: Arc<dyn CurriculumSource>,
    availability: Arc<dyn AvailabilitySource>,
    store: Arc<dyn ScheduleStore>,
    orchestrator: Orchestrator,
}

impl TimetableService {
    pub fn new(
        curriculum: Arc<dyn CurriculumSource>,
        availability: Arc<dyn AvailabilitySource>,
        store: Arc<dyn ScheduleStore>,
        config: &Config,
    ) -> Self {
        let orchestrator = Orchestrator::new(curriculum.clone(), availability.clone(), store.clone())
            .with_lock_timeout(config.lock_timeout)
            .with_solver_config(config.solver);
        Self {
            curriculum,
            availability,
            store,
            orchestrator,
        }
    }

    /// A service backed entirely by process memory.
    pub fn in_memory(config: &Config) -> Self {
        Self::new(
            Arc::new(InMemoryCurriculum::new()),
            Arc::new(InMemoryAvailability::new()),
            Arc::new(InMemoryScheduleStore::new()),
            config,
        )
    }

    pub async fn generate_schedule(&self, class_id: &str) -> Result<Vec<ScheduleSlot>, GenerationError> {
        self.orchestrator.generate_schedule(class_id).await
    }

    pub async fn get_schedule(&self, class_id: &str) -> Result<Vec<ScheduleSlot>, SourceError> {
        self.store.rows(class_id).await
    }

    pub async fn set_availability(
        &self,
        teacher_id: &str,
        cell: Cell,
    ) -> Result<TeacherAvailability, SourceError> {
        self.availability.set(teacher_id, cell.day, cell.slot).await?;
        Ok(TeacherAvailability {
            teacher_id: teacher_id.to_string(),
            day: cell.day,
            slot: cell.slot,
        })
    }

    pub async fn remove_availability(&self, teacher_id: &str, cell: Cell) -> Result<(), SourceError> {
        self.availability.remove(teacher_id, cell.day, cell.slot).await
    }

    pub async fn get_availability(&self, teacher_id: &str) -> Result<Vec<TeacherAvailability>, SourceError> {
        self.availability.list(teacher_id).await
    }

    pub async fn get_curriculum(&self, class_id: &str) -> Result<Vec<ClassSubject>, SourceError> {
        self.curriculum.curriculum(class_id).await
    }

    /// Replaces the curriculum of a class. The class's committed schedule
    /// refers to the old subjects, so it is cleared.
    pub async fn set_curriculum(
        &self,
        class_id: &str,
        lines: Vec<NewClassSubject>,
    ) -> Result<Vec<ClassSubject>, CurriculumUpdateError> {
        let subjects = build_subjects(class_id, lines)?;
        // Waits out any generation of this class that already read the old curriculum.
        let _class = self.orchestrator.hold_class(class_id).await;
        let saved = self
            .curriculum
            .replace(class_id, subjects)
            .await
            .map_err(CurriculumUpdateError::Unavailable)?;
        let cleared = self
            .store
            .clear(class_id)
            .await
            .map_err(CurriculumUpdateError::Unavailable)?;
        if cleared > 0 {
            info!(
                "Curriculum of class {} changed; dropped {} scheduled rows",
                class_id, cleared
            );
        }
        Ok(saved)
    }
}

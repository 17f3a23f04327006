#![allow(dead_code)]

use std::sync::Arc;

use class_timetable::{
    AvailabilitySource, Cell, ClassSubject, CurriculumSource, Day, InMemoryAvailability,
    InMemoryCurriculum, InMemoryScheduleStore, Orchestrator, ScheduleSlot, ScheduleStore, Slot,
};

pub fn cell(day: Day, slot: i64) -> Cell {
    Cell::new(day, Slot::new(slot).unwrap())
}

pub fn subject(class_id: &str, id: &str, teacher: Option<&str>, hours: u32) -> ClassSubject {
    ClassSubject {
        id: id.into(),
        class_id: class_id.into(),
        name: id.into(),
        teacher_id: teacher.map(Into::into),
        hours_weekly: hours,
    }
}

pub fn cells_of(rows: &[ScheduleSlot]) -> Vec<Cell> {
    rows.iter().map(|r| r.cell()).collect()
}

/// In-memory collaborators wired to one orchestrator.
pub struct School {
    pub curriculum: Arc<InMemoryCurriculum>,
    pub availability: Arc<InMemoryAvailability>,
    pub store: Arc<InMemoryScheduleStore>,
}

impl School {
    pub fn new() -> Self {
        Self {
            curriculum: Arc::new(InMemoryCurriculum::new()),
            availability: Arc::new(InMemoryAvailability::new()),
            store: Arc::new(InMemoryScheduleStore::new()),
        }
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            self.curriculum.clone() as Arc<dyn CurriculumSource>,
            self.availability.clone() as Arc<dyn AvailabilitySource>,
            self.store.clone() as Arc<dyn ScheduleStore>,
        )
    }

    pub async fn teach(&self, class_id: &str, subjects: Vec<ClassSubject>) {
        self.curriculum.replace(class_id, subjects).await.unwrap();
    }

    pub async fn available(&self, teacher: &str, cells: &[Cell]) {
        for c in cells {
            self.availability.set(teacher, c.day, c.slot).await.unwrap();
        }
    }
}

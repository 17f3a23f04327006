//! Per-teacher availability: the ground truth of when a teacher may be scheduled.
//!
//! Each teacher maps to a [`CellSet`] bitmask, so membership checks and single
//! cell updates are constant time. A teacher with no entry is unavailable
//! everywhere.

use std::collections::HashMap;

use async_trait::async_trait;
use log::trace;
use tokio::sync::RwLock;

use crate::data::{Cell, CellSet, Day, Slot, TeacherAvailability, TeacherId};
use crate::error::SourceError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvailabilityIndex {
    cells: HashMap<TeacherId, CellSet>,
}

impl AvailabilityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_available(&self, teacher: &str, day: Day, slot: Slot) -> bool {
        self.is_available_at(teacher, Cell::new(day, slot))
    }

    pub fn is_available_at(&self, teacher: &str, cell: Cell) -> bool {
        self.cells
            .get(teacher)
            .is_some_and(|set| set.contains(cell))
    }

    /// Idempotent. Returns whether the cell was newly added.
    pub fn set_available(&mut self, teacher: &str, day: Day, slot: Slot) -> bool {
        self.cells
            .entry(teacher.to_string())
            .or_default()
            .insert(Cell::new(day, slot))
    }

    /// Idempotent. Returns whether the cell was present.
    pub fn clear_available(&mut self, teacher: &str, day: Day, slot: Slot) -> bool {
        let Some(set) = self.cells.get_mut(teacher) else {
            return false;
        };
        let removed = set.remove(Cell::new(day, slot));
        if set.is_empty() {
            self.cells.remove(teacher);
        }
        removed
    }

    /// Every cell the teacher may be scheduled in.
    pub fn cells_for(&self, teacher: &str) -> CellSet {
        self.cells.get(teacher).copied().unwrap_or_default()
    }

    pub fn tuples_for(&self, teacher: &str) -> Vec<TeacherAvailability> {
        self.cells_for(teacher)
            .iter()
            .map(|cell| TeacherAvailability {
                teacher_id: teacher.to_string(),
                day: cell.day,
                slot: cell.slot,
            })
            .collect()
    }

    /// A copy restricted to the given teachers.
    pub fn restricted_to<'a>(&self, teachers: impl IntoIterator<Item = &'a TeacherId>) -> Self {
        let cells = teachers
            .into_iter()
            .filter_map(|t| self.cells.get(t).map(|set| (t.clone(), *set)))
            .collect();
        Self { cells }
    }
}

impl FromIterator<TeacherAvailability> for AvailabilityIndex {
    fn from_iter<I: IntoIterator<Item = TeacherAvailability>>(iter: I) -> Self {
        let mut index = AvailabilityIndex::new();
        for tuple in iter {
            index.set_available(&tuple.teacher_id, tuple.day, tuple.slot);
        }
        index
    }
}

/// Where availability lives. Reads and writes may fail if the backing
/// service is down.
#[async_trait]
pub trait AvailabilitySource: Send + Sync {
    /// Snapshot of availability for the given teachers.
    async fn snapshot(&self, teachers: &[TeacherId]) -> Result<AvailabilityIndex, SourceError>;

    async fn list(&self, teacher: &str) -> Result<Vec<TeacherAvailability>, SourceError>;

    async fn set(&self, teacher: &str, day: Day, slot: Slot) -> Result<(), SourceError>;

    async fn remove(&self, teacher: &str, day: Day, slot: Slot) -> Result<(), SourceError>;
}

/// Process-local availability source.
#[derive(Debug, Default)]
pub struct InMemoryAvailability {
    index: RwLock<AvailabilityIndex>,
}

impl InMemoryAvailability {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AvailabilitySource for InMemoryAvailability {
    async fn snapshot(&self, teachers: &[TeacherId]) -> Result<AvailabilityIndex, SourceError> {
        Ok(self.index.read().await.restricted_to(teachers))
    }

    async fn list(&self, teacher: &str) -> Result<Vec<TeacherAvailability>, SourceError> {
        Ok(self.index.read().await.tuples_for(teacher))
    }

    async fn set(&self, teacher: &str, day: Day, slot: Slot) -> Result<(), SourceError> {
        if self.index.write().await.set_available(teacher, day, slot) {
            trace!("Teacher {} is now available at {}-{}", teacher, day, slot);
        }
        Ok(())
    }

    async fn remove(&self, teacher: &str, day: Day, slot: Slot) -> Result<(), SourceError> {
        if self.index.write().await.clear_available(teacher, day, slot) {
            trace!("Teacher {} is no longer available at {}-{}", teacher, day, slot);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(n: i64) -> Slot {
        Slot::new(n).unwrap()
    }

    #[test]
    fn absent_teacher_is_unavailable() {
        let index = AvailabilityIndex::new();
        assert!(!index.is_available("t1", Day::Mon, slot(1)));
        assert!(index.cells_for("t1").is_empty());
    }

    #[test]
    fn set_and_clear_are_idempotent() {
        let mut index = AvailabilityIndex::new();
        assert!(index.set_available("t1", Day::Wed, slot(3)));
        assert!(!index.set_available("t1", Day::Wed, slot(3)));
        assert!(index.is_available("t1", Day::Wed, slot(3)));
        assert!(!index.is_available("t1", Day::Wed, slot(4)));

        assert!(index.clear_available("t1", Day::Wed, slot(3)));
        assert!(!index.clear_available("t1", Day::Wed, slot(3)));
        assert!(!index.clear_available("nobody", Day::Wed, slot(3)));
        assert!(!index.is_available("t1", Day::Wed, slot(3)));
        assert_eq!(index, AvailabilityIndex::new());
    }

    #[test]
    fn restriction_keeps_only_requested_teachers() {
        let index: AvailabilityIndex = [("t1", Day::Mon), ("t2", Day::Tue)]
            .into_iter()
            .map(|(t, day)| TeacherAvailability {
                teacher_id: t.into(),
                day,
                slot: slot(1),
            })
            .collect();
        let only_t1 = index.restricted_to(&["t1".to_string()]);
        assert!(only_t1.is_available("t1", Day::Mon, slot(1)));
        assert!(!only_t1.is_available("t2", Day::Tue, slot(1)));
    }

    #[tokio::test]
    async fn in_memory_source_lists_in_week_order() {
        let source = InMemoryAvailability::new();
        source.set("t1", Day::Fri, slot(2)).await.unwrap();
        source.set("t1", Day::Mon, slot(5)).await.unwrap();
        source.set("t1", Day::Mon, slot(5)).await.unwrap();

        let listed = source.list("t1").await.unwrap();
        let cells: Vec<String> = listed.iter().map(|a| a.cell().to_string()).collect();
        assert_eq!(cells, vec!["MON-5", "FRI-2"]);

        source.remove("t1", Day::Mon, slot(5)).await.unwrap();
        assert_eq!(source.list("t1").await.unwrap().len(), 1);
    }
}

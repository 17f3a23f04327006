//! Committed schedule rows, replaced atomically one class at a time.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use log::{debug, info};
use tokio::sync::RwLock;

use crate::conflict::TeacherOccupancy;
use crate::data::{Cell, ClassId, ScheduleSlot, TeacherId};
use crate::error::{CommitError, SourceError};

#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Committed rows of one class, sorted by (day, slot).
    async fn rows(&self, class_id: &str) -> Result<Vec<ScheduleSlot>, SourceError>;

    /// Teacher occupancy of every class except `class_id`.
    async fn occupancy_excluding(&self, class_id: &str) -> Result<TeacherOccupancy, SourceError>;

    /// Replaces every row of `class_id` with `rows`, or changes nothing.
    async fn commit(&self, class_id: &str, rows: Vec<ScheduleSlot>) -> Result<(), CommitError>;

    /// Drops every row of `class_id`. Returns how many were removed.
    async fn clear(&self, class_id: &str) -> Result<usize, SourceError>;
}

/// Checks a replacement for `class_id` against the rows of every other class.
pub fn validate_replacement(
    class_id: &str,
    rows: &[ScheduleSlot],
    others: &BTreeMap<ClassId, Vec<ScheduleSlot>>,
) -> Result<(), CommitError> {
    let mut class_cells: HashMap<Cell, &ScheduleSlot> = HashMap::new();
    for row in rows {
        if row.class_id != class_id {
            return Err(CommitError::ForeignRow {
                class_id: class_id.to_string(),
                row_class: row.class_id.clone(),
            });
        }
        if class_cells.insert(row.cell(), row).is_some() {
            return Err(CommitError::ClassCellTaken {
                class_id: class_id.to_string(),
                cell: row.cell(),
            });
        }
    }

    let mut holders: HashMap<(&TeacherId, Cell), &ClassId> = HashMap::new();
    for (other_class, other_rows) in others.iter().filter(|(c, _)| c.as_str() != class_id) {
        for row in other_rows {
            if let Some(teacher) = &row.teacher_id {
                holders.insert((teacher, row.cell()), other_class);
            }
        }
    }
    for row in rows {
        let Some(teacher) = &row.teacher_id else {
            continue;
        };
        if let Some(other_class) = holders.insert((teacher, row.cell()), &row.class_id) {
            return Err(CommitError::TeacherDoubleBooked {
                teacher_id: teacher.clone(),
                cell: row.cell(),
                other_class: other_class.clone(),
            });
        }
    }
    Ok(())
}

/// Process-local store. A single write lock makes each commit all-or-nothing
/// for readers.
#[derive(Debug, Default)]
pub struct InMemoryScheduleStore {
    classes: RwLock<BTreeMap<ClassId, Vec<ScheduleSlot>>>,
}

impl InMemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every committed row, grouped by class.
    pub async fn all_rows(&self) -> Vec<ScheduleSlot> {
        self.classes
            .read()
            .await
            .values()
            .flatten()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ScheduleStore for InMemoryScheduleStore {
    async fn rows(&self, class_id: &str) -> Result<Vec<ScheduleSlot>, SourceError> {
        Ok(self
            .classes
            .read()
            .await
            .get(class_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn occupancy_excluding(&self, class_id: &str) -> Result<TeacherOccupancy, SourceError> {
        let classes = self.classes.read().await;
        Ok(TeacherOccupancy::from_rows(
            classes
                .iter()
                .filter(|(c, _)| c.as_str() != class_id)
                .flat_map(|(_, rows)| rows),
        ))
    }

    async fn commit(&self, class_id: &str, mut rows: Vec<ScheduleSlot>) -> Result<(), CommitError> {
        let mut classes = self.classes.write().await;
        validate_replacement(class_id, &rows, &classes)?;

        rows.sort_by(|a, b| {
            a.cell()
                .cmp(&b.cell())
                .then_with(|| a.subject_id.cmp(&b.subject_id))
        });
        let replaced = classes
            .insert(class_id.to_string(), rows)
            .map_or(0, |old| old.len());
        info!(
            "Committed schedule for class {} ({} rows replaced)",
            class_id, replaced
        );
        Ok(())
    }

    async fn clear(&self, class_id: &str) -> Result<usize, SourceError> {
        let removed = self
            .classes
            .write()
            .await
            .remove(class_id)
            .map_or(0, |rows| rows.len());
        debug!("Cleared {} rows of class {}", removed, class_id);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ClassSubject, Day, Slot};
    use pretty_assertions::assert_eq;

    fn cell(day: Day, slot: i64) -> Cell {
        Cell::new(day, Slot::new(slot).unwrap())
    }

    fn row(class_id: &str, subject_id: &str, teacher: Option<&str>, at: Cell) -> ScheduleSlot {
        let subject = ClassSubject {
            id: subject_id.into(),
            class_id: class_id.into(),
            name: subject_id.into(),
            teacher_id: teacher.map(Into::into),
            hours_weekly: 1,
        };
        ScheduleSlot::new(class_id, &subject, at)
    }

    #[tokio::test]
    async fn commit_replaces_all_rows_of_the_class() {
        let store = InMemoryScheduleStore::new();
        store
            .commit("c1", vec![row("c1", "math", Some("t1"), cell(Day::Mon, 1))])
            .await
            .unwrap();
        store
            .commit("c1", vec![row("c1", "art", None, cell(Day::Tue, 2))])
            .await
            .unwrap();

        let rows = store.rows("c1").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].subject_id, "art");
    }

    #[tokio::test]
    async fn double_booking_across_classes_is_rejected_without_writing() {
        let store = InMemoryScheduleStore::new();
        store
            .commit("c1", vec![row("c1", "math", Some("t1"), cell(Day::Mon, 1))])
            .await
            .unwrap();

        let err = store
            .commit(
                "c2",
                vec![
                    row("c2", "art", None, cell(Day::Mon, 2)),
                    row("c2", "math", Some("t1"), cell(Day::Mon, 1)),
                ],
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CommitError::TeacherDoubleBooked {
                teacher_id: "t1".into(),
                cell: cell(Day::Mon, 1),
                other_class: "c1".into(),
            }
        );
        assert!(store.rows("c2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn regenerating_a_class_may_reuse_its_own_teacher_cells() {
        let store = InMemoryScheduleStore::new();
        let first = vec![row("c1", "math", Some("t1"), cell(Day::Mon, 1))];
        store.commit("c1", first.clone()).await.unwrap();
        store.commit("c1", first).await.unwrap();
        assert_eq!(store.all_rows().await.len(), 1);
    }

    #[test]
    fn two_subjects_in_one_cell_are_rejected() {
        let rows = vec![
            row("c1", "math", None, cell(Day::Mon, 1)),
            row("c1", "art", None, cell(Day::Mon, 1)),
        ];
        let err = validate_replacement("c1", &rows, &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, CommitError::ClassCellTaken { .. }));
    }

    #[test]
    fn rows_of_another_class_are_rejected() {
        let rows = vec![row("c2", "math", None, cell(Day::Mon, 1))];
        let err = validate_replacement("c1", &rows, &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, CommitError::ForeignRow { .. }));
    }

    #[tokio::test]
    async fn occupancy_ignores_the_class_being_regenerated() {
        let store = InMemoryScheduleStore::new();
        store
            .commit("c1", vec![row("c1", "math", Some("t1"), cell(Day::Mon, 1))])
            .await
            .unwrap();
        store
            .commit("c2", vec![row("c2", "bio", Some("t2"), cell(Day::Mon, 1))])
            .await
            .unwrap();

        let occupancy = store.occupancy_excluding("c1").await.unwrap();
        assert!(!occupancy.is_busy("t1", cell(Day::Mon, 1)));
        assert!(occupancy.is_busy("t2", cell(Day::Mon, 1)));

        assert_eq!(store.clear("c2").await.unwrap(), 1);
        assert_eq!(store.clear("c2").await.unwrap(), 0);
    }
}

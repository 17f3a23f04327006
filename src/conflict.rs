//! Teacher exclusivity: a teacher cannot be in two places in the same cell.

use std::collections::HashMap;

use crate::data::{Cell, CellSet, ScheduleSlot, TeacherId};

/// Which cells each teacher is already teaching in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeacherOccupancy {
    busy: HashMap<TeacherId, CellSet>,
}

impl TeacherOccupancy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Occupancy implied by committed rows. Class-taught rows occupy nobody.
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a ScheduleSlot>) -> Self {
        let mut occupancy = Self::new();
        for row in rows {
            if let Some(teacher) = &row.teacher_id {
                occupancy.occupy(teacher, row.cell());
            }
        }
        occupancy
    }

    pub fn is_busy(&self, teacher: &str, cell: Cell) -> bool {
        self.busy.get(teacher).is_some_and(|set| set.contains(cell))
    }

    pub fn occupy(&mut self, teacher: &str, cell: Cell) {
        self.busy.entry(teacher.to_string()).or_default().insert(cell);
    }

    pub fn release(&mut self, teacher: &str, cell: Cell) {
        if let Some(set) = self.busy.get_mut(teacher) {
            set.remove(cell);
            if set.is_empty() {
                self.busy.remove(teacher);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.busy.is_empty()
    }
}

/// Whether placing `teacher` at `cell` would double-book them, given what other
/// classes have committed and what the current search has tentatively placed.
///
/// Class-taught subjects (`teacher == None`) never conflict here.
pub fn would_conflict(
    teacher: Option<&str>,
    cell: Cell,
    committed: &TeacherOccupancy,
    tentative: &TeacherOccupancy,
) -> bool {
    match teacher {
        Some(teacher) => committed.is_busy(teacher, cell) || tentative.is_busy(teacher, cell),
        None => false,
    }
}

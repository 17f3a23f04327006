use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::InvalidSlotError;

// Type aliases for clarity
pub type TeacherId = String;
pub type ClassId = String;
pub type SubjectId = String;

pub const SLOTS_PER_DAY: u8 = 8;
pub const DAYS_PER_WEEK: usize = 5;
pub const CELLS_PER_WEEK: usize = DAYS_PER_WEEK * SLOTS_PER_DAY as usize;

/// A teaching day. Ordered MON < TUE < ... < FRI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Day {
    #[serde(rename = "MON")]
    Mon,
    #[serde(rename = "TUE")]
    Tue,
    #[serde(rename = "WED")]
    Wed,
    #[serde(rename = "THU")]
    Thu,
    #[serde(rename = "FRI")]
    Fri,
}

impl Day {
    pub const ALL: [Day; DAYS_PER_WEEK] = [Day::Mon, Day::Tue, Day::Wed, Day::Thu, Day::Fri];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Day::Mon => "MON",
            Day::Tue => "TUE",
            Day::Wed => "WED",
            Day::Thu => "THU",
            Day::Fri => "FRI",
        }
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Day {
    type Err = InvalidSlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MON" => Ok(Day::Mon),
            "TUE" => Ok(Day::Tue),
            "WED" => Ok(Day::Wed),
            "THU" => Ok(Day::Thu),
            "FRI" => Ok(Day::Fri),
            _ => Err(InvalidSlotError::UnknownDay(s.to_string())),
        }
    }
}

impl TryFrom<String> for Day {
    type Error = InvalidSlotError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A period index within a day, always in 1..=8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Slot(u8);

impl Slot {
    pub fn new(index: i64) -> Result<Self, InvalidSlotError> {
        if (1..=i64::from(SLOTS_PER_DAY)).contains(&index) {
            Ok(Slot(index as u8))
        } else {
            Err(InvalidSlotError::SlotOutOfRange(index))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = Slot> {
        (1..=SLOTS_PER_DAY).map(Slot)
    }
}

impl TryFrom<i64> for Slot {
    type Error = InvalidSlotError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Slot::new(value)
    }
}

impl From<Slot> for u8 {
    fn from(slot: Slot) -> u8 {
        slot.0
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One (day, slot) position in the weekly grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
    pub day: Day,
    pub slot: Slot,
}

impl Cell {
    pub fn new(day: Day, slot: Slot) -> Self {
        Self { day, slot }
    }

    /// Validates raw edge values, e.g. path segments.
    pub fn parse(day: &str, slot: i64) -> Result<Self, InvalidSlotError> {
        Ok(Self::new(day.parse()?, Slot::new(slot)?))
    }

    /// Row-major position: MON-1 is 0, FRI-8 is 39.
    pub fn index(self) -> usize {
        self.day.index() * SLOTS_PER_DAY as usize + (self.slot.get() as usize - 1)
    }

    pub fn all() -> impl Iterator<Item = Cell> {
        Day::ALL
            .into_iter()
            .flat_map(|day| Slot::all().map(move |slot| Cell { day, slot }))
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.day, self.slot)
    }
}

/// A set of weekly cells packed into one word; iteration is in row-major order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CellSet(u64);

impl CellSet {
    pub fn empty() -> Self {
        CellSet(0)
    }

    pub fn contains(self, cell: Cell) -> bool {
        self.0 & (1 << cell.index()) != 0
    }

    /// Returns whether the cell was newly added.
    pub fn insert(&mut self, cell: Cell) -> bool {
        let added = !self.contains(cell);
        self.0 |= 1 << cell.index();
        added
    }

    /// Returns whether the cell was present.
    pub fn remove(&mut self, cell: Cell) -> bool {
        let present = self.contains(cell);
        self.0 &= !(1 << cell.index());
        present
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn difference(self, other: CellSet) -> CellSet {
        CellSet(self.0 & !other.0)
    }

    pub fn iter(self) -> impl Iterator<Item = Cell> {
        Cell::all().filter(move |cell| self.contains(*cell))
    }
}

impl FromIterator<Cell> for CellSet {
    fn from_iter<I: IntoIterator<Item = Cell>>(iter: I) -> Self {
        let mut set = CellSet::empty();
        for cell in iter {
            set.insert(cell);
        }
        set
    }
}

/// "This teacher can be scheduled in this cell."
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct TeacherAvailability {
    #[serde(alias = "teacherId")]
    pub teacher_id: TeacherId,
    #[serde(rename = "day_of_week", alias = "dayOfWeek")]
    pub day: Day,
    #[serde(rename = "slot_index", alias = "slotIndex")]
    pub slot: Slot,
}

impl TeacherAvailability {
    pub fn cell(&self) -> Cell {
        Cell::new(self.day, self.slot)
    }
}

/// One curriculum line: a subject a class must be taught for `hours_weekly` cells.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClassSubject {
    pub id: SubjectId,
    #[serde(alias = "classId")]
    pub class_id: ClassId,
    pub name: String,
    /// `None` for class-taught subjects.
    #[serde(default, alias = "teacherId")]
    pub teacher_id: Option<TeacherId>,
    #[serde(alias = "hoursWeekly")]
    pub hours_weekly: u32,
}

/// Curriculum line as submitted, before an id and class are attached.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NewClassSubject {
    pub name: String,
    #[serde(default, alias = "teacherId")]
    pub teacher_id: Option<TeacherId>,
    #[serde(alias = "hoursWeekly")]
    pub hours_weekly: u32,
}

/// A single committed assignment of a subject to a cell for one class.
///
/// Carries the subject name and the teacher it was generated with, so the
/// schedule can be displayed and conflict-checked without the curriculum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct ScheduleSlot {
    pub id: Uuid,
    #[serde(alias = "classId")]
    pub class_id: ClassId,
    #[serde(alias = "subjectId")]
    pub subject_id: SubjectId,
    #[serde(default, alias = "subjectName")]
    pub subject_name: String,
    #[serde(default, alias = "teacherId")]
    pub teacher_id: Option<TeacherId>,
    #[serde(rename = "day_of_week", alias = "dayOfWeek")]
    pub day: Day,
    #[serde(rename = "slot_index", alias = "slotIndex")]
    pub slot: Slot,
}

impl ScheduleSlot {
    /// Builds a row whose id depends only on (class, subject, cell).
    pub fn new(class_id: &str, subject: &ClassSubject, cell: Cell) -> Self {
        // Length prefixes keep ids containing separators from colliding.
        let key = format!(
            "{}:{}{}:{}{}",
            class_id.len(),
            class_id,
            subject.id.len(),
            subject.id,
            cell
        );
        Self {
            id: Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()),
            class_id: class_id.to_string(),
            subject_id: subject.id.clone(),
            subject_name: subject.name.clone(),
            teacher_id: subject.teacher_id.clone(),
            day: cell.day,
            slot: cell.slot,
        }
    }

    pub fn cell(&self) -> Cell {
        Cell::new(self.day, self.slot)
    }
}

/// A subject the solver could not fully place.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnmetSubject {
    #[serde(alias = "subjectId")]
    pub subject_id: SubjectId,
    #[serde(alias = "subjectName")]
    pub subject_name: String,
    #[serde(alias = "missingHours")]
    pub missing_hours: u32,
}

impl fmt::Display for UnmetSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): {} hour(s) missing",
            self.subject_name, self.subject_id, self.missing_hours
        )
    }
}

//! The required subjects of a class and where they come from.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use itertools::Itertools;
use log::debug;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::data::{CELLS_PER_WEEK, ClassId, ClassSubject, NewClassSubject, TeacherId};
use crate::error::{CurriculumError, SourceError};

/// A validated curriculum for one class. Every subject belongs to the class,
/// has a non-empty name, and requires between 1 and 40 hours a week.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Curriculum {
    class_id: ClassId,
    subjects: Vec<ClassSubject>,
}

impl Curriculum {
    pub fn new(class_id: &str, subjects: Vec<ClassSubject>) -> Result<Self, CurriculumError> {
        let mut seen = HashSet::new();
        for subject in &subjects {
            if subject.class_id != class_id {
                return Err(CurriculumError::ForeignClass {
                    subject_id: subject.id.clone(),
                    expected: class_id.to_string(),
                    found: subject.class_id.clone(),
                });
            }
            if !seen.insert(subject.id.as_str()) {
                return Err(CurriculumError::DuplicateSubject(subject.id.clone()));
            }
            validate_line(&subject.name, subject.hours_weekly)?;
        }
        Ok(Self {
            class_id: class_id.to_string(),
            subjects,
        })
    }

    pub fn subjects(&self) -> &[ClassSubject] {
        &self.subjects
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    /// Distinct assigned teachers, sorted by id.
    pub fn teachers(&self) -> Vec<TeacherId> {
        self.subjects
            .iter()
            .filter_map(|s| s.teacher_id.clone())
            .sorted()
            .dedup()
            .collect()
    }

    pub fn total_hours(&self) -> u32 {
        self.subjects.iter().map(|s| s.hours_weekly).sum()
    }
}

fn validate_line(name: &str, hours_weekly: u32) -> Result<(), CurriculumError> {
    if name.trim().is_empty() {
        return Err(CurriculumError::EmptySubjectName);
    }
    if hours_weekly == 0 {
        return Err(CurriculumError::ZeroHours(name.to_string()));
    }
    if hours_weekly as usize > CELLS_PER_WEEK {
        return Err(CurriculumError::HoursExceedWeek {
            name: name.to_string(),
            hours: hours_weekly,
            max: CELLS_PER_WEEK,
        });
    }
    Ok(())
}

/// Validates submitted lines and attaches fresh subject ids.
pub fn build_subjects(
    class_id: &str,
    lines: Vec<NewClassSubject>,
) -> Result<Vec<ClassSubject>, CurriculumError> {
    lines
        .into_iter()
        .map(|line| {
            validate_line(&line.name, line.hours_weekly)?;
            Ok(ClassSubject {
                id: Uuid::new_v4().to_string(),
                class_id: class_id.to_string(),
                name: line.name.trim().to_string(),
                teacher_id: line.teacher_id.filter(|t| !t.trim().is_empty()),
                hours_weekly: line.hours_weekly,
            })
        })
        .collect()
}

#[async_trait]
pub trait CurriculumSource: Send + Sync {
    async fn curriculum(&self, class_id: &str) -> Result<Vec<ClassSubject>, SourceError>;

    /// Replaces the whole curriculum of a class.
    async fn replace(
        &self,
        class_id: &str,
        subjects: Vec<ClassSubject>,
    ) -> Result<Vec<ClassSubject>, SourceError>;
}

#[derive(Debug, Default)]
pub struct InMemoryCurriculum {
    classes: RwLock<HashMap<ClassId, Vec<ClassSubject>>>,
}

impl InMemoryCurriculum {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CurriculumSource for InMemoryCurriculum {
    async fn curriculum(&self, class_id: &str) -> Result<Vec<ClassSubject>, SourceError> {
        Ok(self
            .classes
            .read()
            .await
            .get(class_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn replace(
        &self,
        class_id: &str,
        subjects: Vec<ClassSubject>,
    ) -> Result<Vec<ClassSubject>, SourceError> {
        debug!(
            "Replacing curriculum of class {} with {} subjects",
            class_id,
            subjects.len()
        );
        self.classes
            .write()
            .await
            .insert(class_id.to_string(), subjects.clone());
        Ok(subjects)
    }
}

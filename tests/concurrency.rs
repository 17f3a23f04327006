//! Concurrent generation for classes that share teachers.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use class_timetable::{
    AvailabilitySource, CommitError, Config, CurriculumSource, Day, GenerationError,
    GenerationPhase, InMemoryAvailability, InMemoryCurriculum, InMemoryScheduleStore,
    NewClassSubject, Orchestrator, ScheduleSlot, ScheduleStore, SourceError, TeacherOccupancy,
    TimetableService,
};
use common::{School, cell, subject};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn contested_cells_go_to_exactly_one_class() {
    let school = School::new();
    school
        .teach("c1", vec![subject("c1", "math", Some("t1"), 2)])
        .await;
    school
        .teach("c2", vec![subject("c2", "math", Some("t1"), 2)])
        .await;
    school
        .available("t1", &[cell(Day::Mon, 1), cell(Day::Mon, 2), cell(Day::Mon, 3)])
        .await;

    let orchestrator = Arc::new(school.orchestrator());
    let (a, b) = tokio::join!(
        {
            let o = orchestrator.clone();
            tokio::spawn(async move { o.generate_schedule("c1").await })
        },
        {
            let o = orchestrator.clone();
            tokio::spawn(async move { o.generate_schedule("c2").await })
        }
    );
    let results = [a.unwrap(), b.unwrap()];

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one class can get both hours");
    let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    match loser {
        GenerationError::Unsatisfiable(e) => {
            assert_eq!(e.unmet_subjects.len(), 1);
            assert_eq!(e.unmet_subjects[0].missing_hours, 1);
        }
        other => panic!("expected an unsatisfiable schedule, got {other:?}"),
    }

    let all = school.store.all_rows().await;
    assert_eq!(all.len(), 2);
    assert_ne!(all[0].cell(), all[1].cell());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn enough_room_lets_both_classes_win() {
    let school = School::new();
    let week: Vec<_> = class_timetable::Cell::all().collect();
    school.available("t1", &week[..6]).await;
    school.available("t2", &week).await;
    for class in ["c1", "c2", "c3"] {
        school
            .teach(
                class,
                vec![
                    subject(class, "math", Some("t1"), 2),
                    subject(class, "art", Some("t2"), 3),
                ],
            )
            .await;
    }

    let orchestrator = Arc::new(school.orchestrator());
    let handles: Vec<_> = ["c1", "c2", "c3"]
        .into_iter()
        .map(|class| {
            let o = orchestrator.clone();
            tokio::spawn(async move { o.generate_schedule(class).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let all = school.store.all_rows().await;
    assert_eq!(all.len(), 15);
    let mut taught: Vec<_> = all
        .iter()
        .filter_map(|r| r.teacher_id.clone().map(|t| (t, r.cell())))
        .collect();
    taught.sort();
    let before = taught.len();
    taught.dedup();
    assert_eq!(taught.len(), before, "a teacher was double-booked");
}

/// A store whose occupancy read stalls, keeping the caller's locks held.
struct SlowStore {
    inner: InMemoryScheduleStore,
    delay: Duration,
}

#[async_trait]
impl ScheduleStore for SlowStore {
    async fn rows(&self, class_id: &str) -> Result<Vec<ScheduleSlot>, SourceError> {
        self.inner.rows(class_id).await
    }

    async fn occupancy_excluding(&self, class_id: &str) -> Result<TeacherOccupancy, SourceError> {
        tokio::time::sleep(self.delay).await;
        self.inner.occupancy_excluding(class_id).await
    }

    async fn commit(&self, class_id: &str, rows: Vec<ScheduleSlot>) -> Result<(), CommitError> {
        self.inner.commit(class_id, rows).await
    }

    async fn clear(&self, class_id: &str) -> Result<usize, SourceError> {
        self.inner.clear(class_id).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn contended_teacher_lock_times_out() {
    let school = School::new();
    school
        .teach("c1", vec![subject("c1", "math", Some("t1"), 1)])
        .await;
    school
        .teach("c2", vec![subject("c2", "math", Some("t1"), 1)])
        .await;
    school
        .available("t1", &[cell(Day::Mon, 1), cell(Day::Mon, 2)])
        .await;

    let store = Arc::new(SlowStore {
        inner: InMemoryScheduleStore::new(),
        delay: Duration::from_millis(300),
    });
    let orchestrator = Arc::new(
        Orchestrator::new(
            school.curriculum.clone() as Arc<dyn CurriculumSource>,
            school.availability.clone() as Arc<dyn AvailabilitySource>,
            store.clone() as Arc<dyn ScheduleStore>,
        )
        .with_lock_timeout(Duration::from_millis(50)),
    );

    let first = {
        let o = orchestrator.clone();
        tokio::spawn(async move { o.generate_schedule("c1").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    let err = orchestrator.generate_schedule("c2").await.unwrap_err();
    assert!(matches!(err, GenerationError::LockTimeout { ref teacher_id, .. } if teacher_id == "t1"));
    assert_eq!(err.phase(), GenerationPhase::Locking);

    first.await.unwrap().unwrap();
    assert!(store.rows("c2").await.unwrap().is_empty());

    // The winner released its locks, so a retry goes through.
    orchestrator.generate_schedule("c2").await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unrelated_teachers_proceed_in_parallel() {
    let school = School::new();
    school
        .teach("c1", vec![subject("c1", "math", Some("t1"), 1)])
        .await;
    school
        .teach("c2", vec![subject("c2", "art", Some("t2"), 1)])
        .await;
    school.available("t1", &[cell(Day::Mon, 1)]).await;
    school.available("t2", &[cell(Day::Mon, 1)]).await;

    let store = Arc::new(SlowStore {
        inner: InMemoryScheduleStore::new(),
        delay: Duration::from_millis(200),
    });
    let orchestrator = Arc::new(
        Orchestrator::new(
            school.curriculum.clone() as Arc<dyn CurriculumSource>,
            school.availability.clone() as Arc<dyn AvailabilitySource>,
            store.clone() as Arc<dyn ScheduleStore>,
        )
        .with_lock_timeout(Duration::from_millis(50)),
    );

    let (a, b) = tokio::join!(
        orchestrator.generate_schedule("c1"),
        orchestrator.generate_schedule("c2")
    );
    a.unwrap();
    b.unwrap();
}

fn line(name: &str, hours: u32) -> NewClassSubject {
    NewClassSubject {
        name: name.into(),
        teacher_id: None,
        hours_weekly: hours,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn curriculum_replaced_mid_generation_leaves_no_stale_rows() {
    let store = Arc::new(SlowStore {
        inner: InMemoryScheduleStore::new(),
        delay: Duration::from_millis(200),
    });
    let service = Arc::new(TimetableService::new(
        Arc::new(InMemoryCurriculum::new()),
        Arc::new(InMemoryAvailability::new()),
        store.clone() as Arc<dyn ScheduleStore>,
        &Config::default(),
    ));
    service
        .set_curriculum("c1", vec![line("Old", 4)])
        .await
        .unwrap();

    let generation = {
        let s = service.clone();
        tokio::spawn(async move { s.generate_schedule("c1").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    service
        .set_curriculum("c1", vec![line("New", 1)])
        .await
        .unwrap();

    // The generation read the old curriculum first, so it commits before the
    // replacement clears the class.
    assert_eq!(generation.await.unwrap().unwrap().len(), 4);
    assert!(store.rows("c1").await.unwrap().is_empty());

    let rows = service.generate_schedule("c1").await.unwrap();
    let names: Vec<&str> = rows.iter().map(|r| r.subject_name.as_str()).collect();
    assert_eq!(names, vec!["New"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn second_generation_of_a_busy_class_times_out() {
    let school = School::new();
    school
        .teach("c1", vec![subject("c1", "homeroom", None, 1)])
        .await;

    let store = Arc::new(SlowStore {
        inner: InMemoryScheduleStore::new(),
        delay: Duration::from_millis(300),
    });
    let orchestrator = Arc::new(
        Orchestrator::new(
            school.curriculum.clone() as Arc<dyn CurriculumSource>,
            school.availability.clone() as Arc<dyn AvailabilitySource>,
            store.clone() as Arc<dyn ScheduleStore>,
        )
        .with_lock_timeout(Duration::from_millis(50)),
    );

    let first = {
        let o = orchestrator.clone();
        tokio::spawn(async move { o.generate_schedule("c1").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    let err = orchestrator.generate_schedule("c1").await.unwrap_err();
    assert!(matches!(err, GenerationError::ClassBusy { ref class_id, .. } if class_id == "c1"));
    assert_eq!(err.phase(), GenerationPhase::Idle);

    assert_eq!(first.await.unwrap().unwrap().len(), 1);
}

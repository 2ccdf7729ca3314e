use sqlx::PgExecutor;
use std::collections::HashMap;
use uuid::Uuid;

use crate::db::Db;
use crate::models::{Course, CourseTree, Lecture, PublicUser, Section, SectionTree};

pub async fn find_course(db: &Db, id: Uuid) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn find_lecture(db: &Db, id: Uuid) -> Result<Option<Lecture>, sqlx::Error> {
    sqlx::query_as::<_, Lecture>("SELECT * FROM lectures WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
}

/// Sections with their lectures, both in curriculum order.
pub async fn curriculum(db: &Db, course_id: Uuid) -> Result<Vec<SectionTree>, sqlx::Error> {
    let sections = sqlx::query_as::<_, Section>(
        "SELECT * FROM sections WHERE course_id = $1 ORDER BY position",
    )
    .bind(course_id)
    .fetch_all(db)
    .await?;

    let section_ids: Vec<Uuid> = sections.iter().map(|s| s.id).collect();
    let lectures = sqlx::query_as::<_, Lecture>(
        "SELECT * FROM lectures WHERE section_id = ANY($1) ORDER BY position",
    )
    .bind(section_ids)
    .fetch_all(db)
    .await?;

    let mut by_section: HashMap<Uuid, Vec<Lecture>> = HashMap::new();
    for lecture in lectures {
        by_section.entry(lecture.section_id).or_default().push(lecture);
    }

    Ok(sections
        .into_iter()
        .map(|section| {
            let lectures = by_section.remove(&section.id).unwrap_or_default();
            SectionTree { section, lectures }
        })
        .collect())
}

pub async fn course_tree(db: &Db, course_id: Uuid) -> Result<Option<CourseTree>, sqlx::Error> {
    let Some(course) = find_course(db, course_id).await? else {
        return Ok(None);
    };
    let sections = curriculum(db, course_id).await?;
    Ok(Some(CourseTree { course, sections }))
}

/// The course's current lecture ids. Always queried fresh for the
/// progress recompute, never cached, so curriculum edits after enrollment
/// are reflected in both numerator and denominator.
pub async fn lecture_ids<'e, E: PgExecutor<'e>>(ex: E, course_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
    sqlx::query_scalar::<_, Uuid>(
        "SELECT l.id FROM lectures l JOIN sections s ON l.section_id = s.id WHERE s.course_id = $1",
    )
    .bind(course_id)
    .fetch_all(ex)
    .await
}

/// Instructor identities for a set of courses, keyed by user id.
pub async fn instructors(db: &Db, ids: Vec<Uuid>) -> Result<HashMap<Uuid, PublicUser>, sqlx::Error> {
    let rows = sqlx::query_as::<_, PublicUser>("SELECT id, name FROM users WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(db)
        .await?;
    Ok(rows.into_iter().map(|u| (u.id, u)).collect())
}

pub async fn push_enrolled_course<'e, E: PgExecutor<'e>>(
    ex: E,
    student: Uuid,
    course: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE users SET enrolled_courses = array_append(enrolled_courses, $2) \
         WHERE id = $1 AND NOT ($2 = ANY(enrolled_courses))",
    )
    .bind(student)
    .bind(course)
    .execute(ex)
    .await?;
    Ok(())
}

pub async fn increment_enrollment_count<'e, E: PgExecutor<'e>>(
    ex: E,
    course: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE courses SET total_enrollments = total_enrollments + 1 WHERE id = $1")
        .bind(course)
        .execute(ex)
        .await?;
    Ok(())
}

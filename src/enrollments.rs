use axum::{
    extract::{Path, State},
    Json,
};
use http::StatusCode;
use serde_json::{json, Value};
use std::collections::HashMap;
use uuid::Uuid;

use crate::auth::{Principal, Role};
use crate::catalog;
use crate::db::Db;
use crate::error::{is_unique_violation, ApiError};
use crate::models::{
    Course, CourseCard, EnrolledCourse, Enrollment, EnrollmentDetail, Lecture, STATUS_PUBLISHED,
};
use crate::routes::AppState;

pub async fn find_enrollment(
    db: &Db,
    student: Uuid,
    course: Uuid,
) -> Result<Option<Enrollment>, sqlx::Error> {
    sqlx::query_as::<_, Enrollment>("SELECT * FROM enrollments WHERE student = $1 AND course = $2")
        .bind(student)
        .bind(course)
        .fetch_optional(db)
        .await
}

pub async fn find_enrollment_by_id(db: &Db, id: Uuid) -> Result<Option<Enrollment>, sqlx::Error> {
    sqlx::query_as::<_, Enrollment>("SELECT * FROM enrollments WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
}

// POST /api/enrollments/:courseId
pub async fn enroll(
    State(state): State<AppState>,
    principal: Principal,
    Path(course_id): Path<Uuid>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let principal = principal.require(Role::Student)?;

    let course = catalog::find_course(&state.db, course_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Course"))?;
    if course.status != STATUS_PUBLISHED {
        return Err(ApiError::InvalidState(
            "Cannot enroll in unpublished course".into(),
        ));
    }
    if find_enrollment(&state.db, principal.id, course_id).await?.is_some() {
        return Err(ApiError::Conflict("Already enrolled in this course".into()));
    }

    // enrollment insert, enrolled-course list append and counter bump
    // commit or roll back together
    let mut tx = state.db.begin().await?;
    let enrollment = sqlx::query_as::<_, Enrollment>(
        "INSERT INTO enrollments (id, student, course) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(principal.id)
    .bind(course_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        // the unique index arbitrates concurrent duplicate enrolls
        if is_unique_violation(&e) {
            ApiError::Conflict("Already enrolled in this course".into())
        } else {
            e.into()
        }
    })?;
    catalog::push_enrolled_course(&mut *tx, principal.id, course_id).await?;
    catalog::increment_enrollment_count(&mut *tx, course_id).await?;
    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Successfully enrolled in course",
            "data": { "enrollment": enrollment },
        })),
    ))
}

// GET /api/enrollments/my-courses
pub async fn my_courses(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Value>, ApiError> {
    let principal = principal.require(Role::Student)?;

    let enrollments = sqlx::query_as::<_, Enrollment>(
        "SELECT * FROM enrollments WHERE student = $1 ORDER BY enrolled_at DESC",
    )
    .bind(principal.id)
    .fetch_all(&state.db)
    .await?;

    let course_ids: Vec<Uuid> = enrollments.iter().map(|e| e.course).collect();
    let courses = sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE id = ANY($1)")
        .bind(course_ids)
        .fetch_all(&state.db)
        .await?;
    let instructors =
        catalog::instructors(&state.db, courses.iter().map(|c| c.instructor).collect()).await?;
    let mut course_map: HashMap<Uuid, Course> = courses.into_iter().map(|c| (c.id, c)).collect();

    let mut out = Vec::with_capacity(enrollments.len());
    for e in enrollments {
        let course = course_map.remove(&e.course).ok_or_else(|| {
            ApiError::Internal(anyhow::anyhow!("enrollment {} references missing course", e.id))
        })?;
        let instructor = instructors.get(&course.instructor).cloned().ok_or_else(|| {
            ApiError::Internal(anyhow::anyhow!("course {} references missing instructor", course.id))
        })?;
        out.push(EnrolledCourse {
            id: e.id,
            student: e.student,
            course: CourseCard::new(course, instructor),
            progress: e.progress,
            completed_lectures: e.completed_lectures,
            enrolled_at: e.enrolled_at,
        });
    }

    Ok(Json(json!({
        "success": true,
        "count": out.len(),
        "data": { "enrollments": out },
    })))
}

// GET /api/enrollments/:courseId/progress
pub async fn course_progress(
    State(state): State<AppState>,
    principal: Principal,
    Path(course_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let principal = principal.require(Role::Student)?;

    let enrollment = find_enrollment(&state.db, principal.id, course_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Enrollment"))?;
    let course = catalog::course_tree(&state.db, course_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Course"))?;

    // completed lectures as full objects, in completion order
    let rows = sqlx::query_as::<_, Lecture>("SELECT * FROM lectures WHERE id = ANY($1)")
        .bind(enrollment.completed_lectures.clone())
        .fetch_all(&state.db)
        .await?;
    let mut by_id: HashMap<Uuid, Lecture> = rows.into_iter().map(|l| (l.id, l)).collect();
    let completed_lectures: Vec<Lecture> = enrollment
        .completed_lectures
        .iter()
        .filter_map(|id| by_id.remove(id))
        .collect();

    let detail = EnrollmentDetail {
        id: enrollment.id,
        student: enrollment.student,
        course,
        progress: enrollment.progress,
        completed_lectures,
        enrolled_at: enrollment.enrolled_at,
    };

    Ok(Json(json!({
        "success": true,
        "data": { "enrollment": detail },
    })))
}

// GET /api/enrollments/:courseId/check
//
// Absence is not an error here: responds 200 with isEnrolled=false.
pub async fn check(
    State(state): State<AppState>,
    principal: Principal,
    Path(course_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let principal = principal.require(Role::Student)?;
    let enrollment = find_enrollment(&state.db, principal.id, course_id).await?;
    Ok(Json(json!({
        "success": true,
        "data": {
            "isEnrolled": enrollment.is_some(),
            "enrollment": enrollment,
        },
    })))
}

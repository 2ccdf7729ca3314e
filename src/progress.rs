use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use uuid::Uuid;

use crate::auth::{ensure_owner, Principal, Role};
use crate::catalog;
use crate::enrollments::find_enrollment_by_id;
use crate::error::ApiError;
use crate::models::{LectureMeta, MarkProgressReq, ProgressRecord, ProgressWithLecture};
use crate::routes::AppState;

/// round(100 * completed / total); 0 for a course with no lectures.
pub fn percentage(completed: usize, total: usize) -> i32 {
    if total == 0 {
        0
    } else {
        ((completed as f64 / total as f64) * 100.0).round() as i32
    }
}

pub fn with_lecture(mut set: Vec<Uuid>, lecture: Uuid) -> Vec<Uuid> {
    if !set.contains(&lecture) {
        set.push(lecture);
    }
    set
}

pub fn without_lecture(set: Vec<Uuid>, lecture: Uuid) -> Vec<Uuid> {
    set.into_iter().filter(|id| *id != lecture).collect()
}

/// Drops completion entries for lectures removed from the curriculum, so
/// the cached set stays consistent with what exists and progress cannot
/// exceed 100.
pub fn retain_existing(set: Vec<Uuid>, live: &[Uuid]) -> Vec<Uuid> {
    set.into_iter().filter(|id| live.contains(id)).collect()
}

fn required_ids(req: MarkProgressReq) -> Result<(Uuid, Uuid), ApiError> {
    match (req.enrollment_id, req.lecture_id) {
        (Some(e), Some(l)) => Ok((e, l)),
        _ => Err(ApiError::Validation(
            "Enrollment ID and Lecture ID are required".into(),
        )),
    }
}

// POST /api/progress/mark-complete
pub async fn mark_complete(
    State(state): State<AppState>,
    principal: Principal,
    Json(req): Json<MarkProgressReq>,
) -> Result<Json<Value>, ApiError> {
    let principal = principal.require(Role::Student)?;
    let (enrollment_id, lecture_id) = required_ids(req)?;

    let enrollment = find_enrollment_by_id(&state.db, enrollment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Enrollment"))?;
    ensure_owner(&principal, &enrollment)?;
    if catalog::find_lecture(&state.db, lecture_id).await?.is_none() {
        return Err(ApiError::not_found("Lecture"));
    }

    let existing = sqlx::query_as::<_, ProgressRecord>(
        "SELECT * FROM progress_records WHERE enrollment = $1 AND lecture = $2",
    )
    .bind(enrollment_id)
    .bind(lecture_id)
    .fetch_optional(&state.db)
    .await?;
    if existing.map(|r| r.completed).unwrap_or(false) {
        return Err(ApiError::Conflict("Lecture already marked as complete".into()));
    }

    // record upsert, completion-set update and percentage recompute are one
    // transaction; the FOR UPDATE row lock serializes concurrent recomputes
    // on the same enrollment
    let mut tx = state.db.begin().await?;
    let record = sqlx::query_as::<_, ProgressRecord>(
        r#"
        INSERT INTO progress_records (id, enrollment, lecture, completed, completed_at)
        VALUES ($1, $2, $3, TRUE, now())
        ON CONFLICT (enrollment, lecture)
        DO UPDATE SET completed = TRUE, completed_at = now()
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(enrollment_id)
    .bind(lecture_id)
    .fetch_one(&mut *tx)
    .await?;

    let current: Vec<Uuid> = sqlx::query_scalar(
        "SELECT completed_lectures FROM enrollments WHERE id = $1 FOR UPDATE",
    )
    .bind(enrollment_id)
    .fetch_one(&mut *tx)
    .await?;
    let live = catalog::lecture_ids(&mut *tx, enrollment.course).await?;
    let completed_lectures = retain_existing(with_lecture(current, lecture_id), &live);
    let progress = percentage(completed_lectures.len(), live.len());
    sqlx::query("UPDATE enrollments SET completed_lectures = $2, progress = $3 WHERE id = $1")
        .bind(enrollment_id)
        .bind(&completed_lectures)
        .bind(progress)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(Json(json!({
        "success": true,
        "message": "Lecture marked as complete",
        "data": {
            "progress": record,
            "courseProgress": progress,
        },
    })))
}

// POST /api/progress/mark-incomplete
//
// Idempotent: un-completing a lecture that was never completed still
// succeeds, it just upserts an incomplete record.
pub async fn mark_incomplete(
    State(state): State<AppState>,
    principal: Principal,
    Json(req): Json<MarkProgressReq>,
) -> Result<Json<Value>, ApiError> {
    let principal = principal.require(Role::Student)?;
    let (enrollment_id, lecture_id) = required_ids(req)?;

    let enrollment = find_enrollment_by_id(&state.db, enrollment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Enrollment"))?;
    ensure_owner(&principal, &enrollment)?;
    if catalog::find_lecture(&state.db, lecture_id).await?.is_none() {
        return Err(ApiError::not_found("Lecture"));
    }

    let mut tx = state.db.begin().await?;
    sqlx::query(
        r#"
        INSERT INTO progress_records (id, enrollment, lecture, completed, completed_at)
        VALUES ($1, $2, $3, FALSE, NULL)
        ON CONFLICT (enrollment, lecture)
        DO UPDATE SET completed = FALSE, completed_at = NULL
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(enrollment_id)
    .bind(lecture_id)
    .execute(&mut *tx)
    .await?;

    let current: Vec<Uuid> = sqlx::query_scalar(
        "SELECT completed_lectures FROM enrollments WHERE id = $1 FOR UPDATE",
    )
    .bind(enrollment_id)
    .fetch_one(&mut *tx)
    .await?;
    let live = catalog::lecture_ids(&mut *tx, enrollment.course).await?;
    let completed_lectures = retain_existing(without_lecture(current, lecture_id), &live);
    let progress = percentage(completed_lectures.len(), live.len());
    sqlx::query("UPDATE enrollments SET completed_lectures = $2, progress = $3 WHERE id = $1")
        .bind(enrollment_id)
        .bind(&completed_lectures)
        .bind(progress)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(Json(json!({
        "success": true,
        "message": "Lecture marked as incomplete",
        "data": { "courseProgress": progress },
    })))
}

// GET /api/progress/:enrollmentId
pub async fn enrollment_progress(
    State(state): State<AppState>,
    principal: Principal,
    Path(enrollment_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let principal = principal.require(Role::Student)?;

    let enrollment = find_enrollment_by_id(&state.db, enrollment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Enrollment"))?;
    ensure_owner(&principal, &enrollment)?;

    let records = sqlx::query_as::<_, ProgressRecord>(
        "SELECT * FROM progress_records WHERE enrollment = $1 ORDER BY created_at",
    )
    .bind(enrollment_id)
    .fetch_all(&state.db)
    .await?;

    let lecture_ids: Vec<Uuid> = records.iter().map(|r| r.lecture).collect();
    let metas = sqlx::query_as::<_, LectureMeta>(
        "SELECT id, title, video_url, duration, position FROM lectures WHERE id = ANY($1)",
    )
    .bind(lecture_ids)
    .fetch_all(&state.db)
    .await?;
    let by_id: HashMap<Uuid, LectureMeta> = metas.into_iter().map(|m| (m.id, m)).collect();

    let progress_records: Vec<ProgressWithLecture> = records
        .into_iter()
        .filter_map(|r| {
            by_id.get(&r.lecture).cloned().map(|lecture| ProgressWithLecture {
                id: r.id,
                enrollment: r.enrollment,
                lecture,
                completed: r.completed,
                completed_at: r.completed_at,
            })
        })
        .collect();

    Ok(Json(json!({
        "success": true,
        "data": {
            "enrollment": enrollment,
            "progressRecords": progress_records,
        },
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_zero_lectures_is_zero() {
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(3, 0), 0);
    }

    #[test]
    fn percentage_rounds_half_up() {
        assert_eq!(percentage(1, 4), 25);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 8), 13);
        assert_eq!(percentage(4, 4), 100);
    }

    #[test]
    fn completion_set_add_is_idempotent() {
        let l1 = Uuid::new_v4();
        let set = with_lecture(vec![], l1);
        assert_eq!(set, vec![l1]);
        let set = with_lecture(set, l1);
        assert_eq!(set, vec![l1]);
    }

    #[test]
    fn completion_set_remove_of_absent_is_noop() {
        let l1 = Uuid::new_v4();
        let l2 = Uuid::new_v4();
        let set = without_lecture(vec![l1], l2);
        assert_eq!(set, vec![l1]);
        let set = without_lecture(set, l1);
        assert!(set.is_empty());
    }

    #[test]
    fn deleted_lectures_fall_out_of_the_set() {
        let l1 = Uuid::new_v4();
        let l2 = Uuid::new_v4();
        let live = vec![l2];
        let set = retain_existing(vec![l1, l2], &live);
        assert_eq!(set, vec![l2]);
        assert!(percentage(set.len(), live.len()) <= 100);
    }

    // two sections of two lectures each: 25 -> 50 -> 25
    #[test]
    fn two_by_two_scenario() {
        let lectures: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let total = lectures.len();

        let set = with_lecture(vec![], lectures[0]);
        assert_eq!(percentage(set.len(), total), 25);

        let set = with_lecture(set, lectures[1]);
        assert_eq!(percentage(set.len(), total), 50);

        let set = without_lecture(set, lectures[0]);
        assert_eq!(percentage(set.len(), total), 25);
    }
}

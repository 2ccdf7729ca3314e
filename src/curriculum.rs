use axum::{
    extract::{Path, State},
    Json,
};
use http::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::{ensure_owner, Principal, Role};
use crate::catalog;
use crate::db::Db;
use crate::error::ApiError;
use crate::models::{Course, Lecture, LectureReq, Section, SectionReq};
use crate::routes::AppState;

/// Common gate for every curriculum mutation: the course must exist and
/// belong to the caller.
async fn owned_course(db: &Db, principal: &Principal, course_id: Uuid) -> Result<Course, ApiError> {
    let course = catalog::find_course(db, course_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Course"))?;
    ensure_owner(principal, &course)?;
    Ok(course)
}

async fn section_in_course(
    db: &Db,
    course_id: Uuid,
    section_id: Uuid,
) -> Result<Section, ApiError> {
    sqlx::query_as::<_, Section>("SELECT * FROM sections WHERE id = $1 AND course_id = $2")
        .bind(section_id)
        .bind(course_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Section"))
}

// POST /api/courses/:courseId/sections
pub async fn add_section(
    State(state): State<AppState>,
    principal: Principal,
    Path(course_id): Path<Uuid>,
    Json(req): Json<SectionReq>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let principal = principal.require(Role::Instructor)?;
    owned_course(&state.db, &principal, course_id).await?;

    let title = req
        .title
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("Section title is required".into()))?;

    let position = match req.order {
        Some(order) => order,
        None => {
            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sections WHERE course_id = $1")
                .bind(course_id)
                .fetch_one(&state.db)
                .await?;
            count as i32 + 1
        }
    };

    let section = sqlx::query_as::<_, Section>(
        r#"
        INSERT INTO sections (id, course_id, title, position)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(course_id)
    .bind(title.trim())
    .bind(position)
    .fetch_one(&state.db)
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Section added successfully",
            "data": { "section": section },
        })),
    ))
}

// PUT /api/courses/:courseId/sections/:sectionId
pub async fn update_section(
    State(state): State<AppState>,
    principal: Principal,
    Path((course_id, section_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<SectionReq>,
) -> Result<Json<Value>, ApiError> {
    let principal = principal.require(Role::Instructor)?;
    owned_course(&state.db, &principal, course_id).await?;

    let section = sqlx::query_as::<_, Section>(
        r#"
        UPDATE sections SET
            title = COALESCE($3, title),
            position = COALESCE($4, position)
        WHERE id = $1 AND course_id = $2
        RETURNING *
        "#,
    )
    .bind(section_id)
    .bind(course_id)
    .bind(req.title)
    .bind(req.order)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Section"))?;

    Ok(Json(json!({
        "success": true,
        "message": "Section updated successfully",
        "data": { "section": section },
    })))
}

// DELETE /api/courses/:courseId/sections/:sectionId
pub async fn delete_section(
    State(state): State<AppState>,
    principal: Principal,
    Path((course_id, section_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, ApiError> {
    let principal = principal.require(Role::Instructor)?;
    owned_course(&state.db, &principal, course_id).await?;

    let result = sqlx::query("DELETE FROM sections WHERE id = $1 AND course_id = $2")
        .bind(section_id)
        .bind(course_id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Section"));
    }

    Ok(Json(json!({
        "success": true,
        "message": "Section deleted successfully",
    })))
}

// POST /api/courses/:courseId/sections/:sectionId/lectures
pub async fn add_lecture(
    State(state): State<AppState>,
    principal: Principal,
    Path((course_id, section_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<LectureReq>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let principal = principal.require(Role::Instructor)?;
    owned_course(&state.db, &principal, course_id).await?;
    section_in_course(&state.db, course_id, section_id).await?;

    let missing = || ApiError::Validation("Title and video URL are required".into());
    let title = req.title.filter(|s| !s.trim().is_empty()).ok_or_else(missing)?;
    let video_url = req.video_url.filter(|s| !s.trim().is_empty()).ok_or_else(missing)?;

    let position = match req.order {
        Some(order) => order,
        None => {
            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lectures WHERE section_id = $1")
                .bind(section_id)
                .fetch_one(&state.db)
                .await?;
            count as i32 + 1
        }
    };

    let lecture = sqlx::query_as::<_, Lecture>(
        r#"
        INSERT INTO lectures (id, section_id, title, video_url, duration, position)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(section_id)
    .bind(title.trim())
    .bind(video_url.trim())
    .bind(req.duration.unwrap_or(0))
    .bind(position)
    .fetch_one(&state.db)
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Lecture added successfully",
            "data": { "lecture": lecture },
        })),
    ))
}

// PUT /api/courses/:courseId/sections/:sectionId/lectures/:lectureId
pub async fn update_lecture(
    State(state): State<AppState>,
    principal: Principal,
    Path((course_id, section_id, lecture_id)): Path<(Uuid, Uuid, Uuid)>,
    Json(req): Json<LectureReq>,
) -> Result<Json<Value>, ApiError> {
    let principal = principal.require(Role::Instructor)?;
    owned_course(&state.db, &principal, course_id).await?;
    section_in_course(&state.db, course_id, section_id).await?;

    let lecture = sqlx::query_as::<_, Lecture>(
        r#"
        UPDATE lectures SET
            title = COALESCE($3, title),
            video_url = COALESCE($4, video_url),
            duration = COALESCE($5, duration),
            position = COALESCE($6, position)
        WHERE id = $1 AND section_id = $2
        RETURNING *
        "#,
    )
    .bind(lecture_id)
    .bind(section_id)
    .bind(req.title)
    .bind(req.video_url)
    .bind(req.duration)
    .bind(req.order)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Lecture"))?;

    Ok(Json(json!({
        "success": true,
        "message": "Lecture updated successfully",
        "data": { "lecture": lecture },
    })))
}

// DELETE /api/courses/:courseId/sections/:sectionId/lectures/:lectureId
pub async fn delete_lecture(
    State(state): State<AppState>,
    principal: Principal,
    Path((course_id, section_id, lecture_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<Json<Value>, ApiError> {
    let principal = principal.require(Role::Instructor)?;
    owned_course(&state.db, &principal, course_id).await?;
    section_in_course(&state.db, course_id, section_id).await?;

    let result = sqlx::query("DELETE FROM lectures WHERE id = $1 AND section_id = $2")
        .bind(lecture_id)
        .bind(section_id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Lecture"));
    }

    Ok(Json(json!({
        "success": true,
        "message": "Lecture deleted successfully",
    })))
}

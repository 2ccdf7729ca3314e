use axum::{
    extract::{Path, State},
    Json,
};
use http::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::{ensure_owner, Principal, Role};
use crate::catalog;
use crate::error::ApiError;
use crate::models::{
    Course, CourseCard, CourseDetail, CreateCourseReq, UpdateCourseReq, STATUS_DRAFT,
    STATUS_PUBLISHED,
};
use crate::routes::AppState;

const LEVELS: [&str; 3] = ["Beginner", "Intermediate", "Advanced"];

// POST /api/courses
pub async fn create_course(
    State(state): State<AppState>,
    principal: Principal,
    Json(req): Json<CreateCourseReq>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let principal = principal.require(Role::Instructor)?;

    let missing = || ApiError::Validation("Title, description and category are required".into());
    let title = req.title.filter(|s| !s.trim().is_empty()).ok_or_else(missing)?;
    let description = req.description.filter(|s| !s.trim().is_empty()).ok_or_else(missing)?;
    let category = req.category.filter(|s| !s.trim().is_empty()).ok_or_else(missing)?;
    let level = req.level.unwrap_or_else(|| "Beginner".into());
    if !LEVELS.contains(&level.as_str()) {
        return Err(ApiError::Validation(
            "Level must be Beginner, Intermediate or Advanced".into(),
        ));
    }

    let course = sqlx::query_as::<_, Course>(
        r#"
        INSERT INTO courses (id, instructor, title, description, category, level, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(principal.id)
    .bind(title.trim())
    .bind(description.trim())
    .bind(category.trim())
    .bind(&level)
    .bind(STATUS_DRAFT)
    .fetch_one(&state.db)
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Course created successfully",
            "data": { "course": course },
        })),
    ))
}

// GET /api/courses
pub async fn list_courses(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let courses = sqlx::query_as::<_, Course>(
        "SELECT * FROM courses WHERE status = $1 ORDER BY created_at DESC",
    )
    .bind(STATUS_PUBLISHED)
    .fetch_all(&state.db)
    .await?;

    let instructors =
        catalog::instructors(&state.db, courses.iter().map(|c| c.instructor).collect()).await?;
    let cards: Vec<CourseCard> = courses
        .into_iter()
        .filter_map(|c| {
            instructors
                .get(&c.instructor)
                .cloned()
                .map(|i| CourseCard::new(c, i))
        })
        .collect();

    Ok(Json(json!({
        "success": true,
        "count": cards.len(),
        "data": { "courses": cards },
    })))
}

// GET /api/courses/:courseId
pub async fn get_course(
    State(state): State<AppState>,
    Path(course_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let course = catalog::find_course(&state.db, course_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Course"))?;
    let sections = catalog::curriculum(&state.db, course_id).await?;
    let instructors = catalog::instructors(&state.db, vec![course.instructor]).await?;
    let instructor = instructors.get(&course.instructor).cloned().ok_or_else(|| {
        ApiError::Internal(anyhow::anyhow!("course {} references missing instructor", course.id))
    })?;

    let detail = CourseDetail {
        id: course.id,
        title: course.title,
        description: course.description,
        category: course.category,
        level: course.level,
        status: course.status,
        total_enrollments: course.total_enrollments,
        created_at: course.created_at,
        instructor,
        sections,
    };

    Ok(Json(json!({
        "success": true,
        "data": { "course": detail },
    })))
}

// GET /api/courses/instructor/my-courses
pub async fn instructor_courses(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Value>, ApiError> {
    let principal = principal.require(Role::Instructor)?;
    let courses = sqlx::query_as::<_, Course>(
        "SELECT * FROM courses WHERE instructor = $1 ORDER BY created_at DESC",
    )
    .bind(principal.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(json!({
        "success": true,
        "count": courses.len(),
        "data": { "courses": courses },
    })))
}

// PUT /api/courses/:courseId
pub async fn update_course(
    State(state): State<AppState>,
    principal: Principal,
    Path(course_id): Path<Uuid>,
    Json(req): Json<UpdateCourseReq>,
) -> Result<Json<Value>, ApiError> {
    let principal = principal.require(Role::Instructor)?;
    let course = catalog::find_course(&state.db, course_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Course"))?;
    ensure_owner(&principal, &course)?;

    if let Some(level) = req.level.as_deref() {
        if !LEVELS.contains(&level) {
            return Err(ApiError::Validation(
                "Level must be Beginner, Intermediate or Advanced".into(),
            ));
        }
    }

    let course = sqlx::query_as::<_, Course>(
        r#"
        UPDATE courses SET
            title = COALESCE($2, title),
            description = COALESCE($3, description),
            category = COALESCE($4, category),
            level = COALESCE($5, level)
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(course_id)
    .bind(req.title)
    .bind(req.description)
    .bind(req.category)
    .bind(req.level)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Course updated successfully",
        "data": { "course": course },
    })))
}

// PATCH /api/courses/:courseId/publish
pub async fn toggle_publish(
    State(state): State<AppState>,
    principal: Principal,
    Path(course_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let principal = principal.require(Role::Instructor)?;
    let course = catalog::find_course(&state.db, course_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Course"))?;
    ensure_owner(&principal, &course)?;

    let course = sqlx::query_as::<_, Course>(
        r#"
        UPDATE courses
        SET status = CASE WHEN status = 'published' THEN 'draft' ELSE 'published' END
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(course_id)
    .fetch_one(&state.db)
    .await?;

    let message = if course.status == STATUS_PUBLISHED {
        "Course published successfully"
    } else {
        "Course unpublished successfully"
    };
    Ok(Json(json!({
        "success": true,
        "message": message,
        "data": { "course": course },
    })))
}

// DELETE /api/courses/:courseId
pub async fn delete_course(
    State(state): State<AppState>,
    principal: Principal,
    Path(course_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let principal = principal.require(Role::Instructor)?;
    let course = catalog::find_course(&state.db, course_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Course"))?;
    ensure_owner(&principal, &course)?;

    // the enrollment ledger is permanent, so a course with enrollments
    // cannot be removed
    let enrolled: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM enrollments WHERE course = $1")
            .bind(course_id)
            .fetch_one(&state.db)
            .await?;
    if enrolled > 0 {
        return Err(ApiError::InvalidState(
            "Cannot delete a course with active enrollments".into(),
        ));
    }

    // sections and lectures go with it (FK cascade)
    sqlx::query("DELETE FROM courses WHERE id = $1")
        .bind(course_id)
        .execute(&state.db)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Course deleted successfully",
    })))
}

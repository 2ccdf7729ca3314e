use axum::{
    routing::{get, patch, post, put},
    Json, Router,
};
use http::StatusCode;
use serde_json::{json, Value};

use crate::auth::JwtKeys;
use crate::db::Db;
use crate::{auth, courses, curriculum, enrollments, progress};

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub jwt: JwtKeys,
}

pub fn router(db: Db, jwt: JwtKeys) -> Router {
    let state = AppState { db, jwt };
    Router::new()
        // identity
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        // catalog
        .route(
            "/api/courses",
            post(courses::create_course).get(courses::list_courses),
        )
        .route(
            "/api/courses/instructor/my-courses",
            get(courses::instructor_courses),
        )
        .route(
            "/api/courses/:course_id",
            get(courses::get_course)
                .put(courses::update_course)
                .delete(courses::delete_course),
        )
        .route("/api/courses/:course_id/publish", patch(courses::toggle_publish))
        .route(
            "/api/courses/:course_id/sections",
            post(curriculum::add_section),
        )
        .route(
            "/api/courses/:course_id/sections/:section_id",
            put(curriculum::update_section).delete(curriculum::delete_section),
        )
        .route(
            "/api/courses/:course_id/sections/:section_id/lectures",
            post(curriculum::add_lecture),
        )
        .route(
            "/api/courses/:course_id/sections/:section_id/lectures/:lecture_id",
            put(curriculum::update_lecture).delete(curriculum::delete_lecture),
        )
        // enrollment ledger
        .route("/api/enrollments/my-courses", get(enrollments::my_courses))
        .route("/api/enrollments/:course_id", post(enrollments::enroll))
        .route(
            "/api/enrollments/:course_id/progress",
            get(enrollments::course_progress),
        )
        .route("/api/enrollments/:course_id/check", get(enrollments::check))
        // progress records
        .route("/api/progress/mark-complete", post(progress::mark_complete))
        .route("/api/progress/mark-incomplete", post(progress::mark_incomplete))
        .route(
            "/api/progress/:enrollment_id",
            get(progress::enrollment_progress),
        )
        .fallback(route_not_found)
        .with_state(state)
}

async fn route_not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "success": false,
            "message": "Route not found",
        })),
    )
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ROLE_STUDENT: &str = "student";
pub const ROLE_INSTRUCTOR: &str = "instructor";

pub const STATUS_DRAFT: &str = "draft";
pub const STATUS_PUBLISHED: &str = "published";

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: String,
    pub bio: Option<String>,
    pub enrolled_courses: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

// instructor identity as embedded in course responses
#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: Uuid,
    pub instructor: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub level: String,
    pub status: String,
    pub total_enrollments: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    #[sqlx(rename = "position")]
    pub order: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Lecture {
    pub id: Uuid,
    pub section_id: Uuid,
    pub title: String,
    pub video_url: String,
    pub duration: i32,
    #[sqlx(rename = "position")]
    pub order: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: Uuid,
    pub student: Uuid,
    pub course: Uuid,
    pub progress: i32,
    pub completed_lectures: Vec<Uuid>,
    pub enrolled_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub id: Uuid,
    pub enrollment: Uuid,
    pub lecture: Uuid,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// --- joined response shapes (the populate-style views) ---

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SectionTree {
    #[serde(flatten)]
    pub section: Section,
    pub lectures: Vec<Lecture>,
}

// course with its curriculum; instructor stays a bare id here
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CourseTree {
    #[serde(flatten)]
    pub course: Course,
    pub sections: Vec<SectionTree>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CourseCard {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub level: String,
    pub status: String,
    pub total_enrollments: i32,
    pub created_at: DateTime<Utc>,
    pub instructor: PublicUser,
}

impl CourseCard {
    pub fn new(course: Course, instructor: PublicUser) -> Self {
        CourseCard {
            id: course.id,
            title: course.title,
            description: course.description,
            category: course.category,
            level: course.level,
            status: course.status,
            total_enrollments: course.total_enrollments,
            created_at: course.created_at,
            instructor,
        }
    }
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CourseDetail {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub level: String,
    pub status: String,
    pub total_enrollments: i32,
    pub created_at: DateTime<Utc>,
    pub instructor: PublicUser,
    pub sections: Vec<SectionTree>,
}

// enrollment joined to its course card for the my-courses list
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EnrolledCourse {
    pub id: Uuid,
    pub student: Uuid,
    pub course: CourseCard,
    pub progress: i32,
    pub completed_lectures: Vec<Uuid>,
    pub enrolled_at: DateTime<Utc>,
}

// enrollment joined to the full curriculum and completed lecture objects
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentDetail {
    pub id: Uuid,
    pub student: Uuid,
    pub course: CourseTree,
    pub progress: i32,
    pub completed_lectures: Vec<Lecture>,
    pub enrolled_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LectureMeta {
    pub id: Uuid,
    pub title: String,
    pub video_url: String,
    pub duration: i32,
    #[sqlx(rename = "position")]
    pub order: i32,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ProgressWithLecture {
    pub id: Uuid,
    pub enrollment: Uuid,
    pub lecture: LectureMeta,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

// --- request payloads ---

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RegisterReq {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LoginReq {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateCourseReq {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub level: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCourseReq {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub level: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SectionReq {
    pub title: Option<String>,
    pub order: Option<i32>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LectureReq {
    pub title: Option<String>,
    pub video_url: Option<String>,
    pub duration: Option<i32>,
    pub order: Option<i32>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MarkProgressReq {
    pub enrollment_id: Option<Uuid>,
    pub lecture_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enrollment_wire_names_are_camel_case() {
        let e = Enrollment {
            id: Uuid::new_v4(),
            student: Uuid::new_v4(),
            course: Uuid::new_v4(),
            progress: 25,
            completed_lectures: vec![Uuid::new_v4()],
            enrolled_at: Utc::now(),
        };
        let v = serde_json::to_value(&e).unwrap();
        assert!(v.get("completedLectures").is_some());
        assert!(v.get("enrolledAt").is_some());
        assert!(v.get("completed_lectures").is_none());
    }

    #[test]
    fn password_hash_never_serialized() {
        let u = User {
            id: Uuid::new_v4(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            password_hash: "secret".into(),
            role: ROLE_STUDENT.into(),
            bio: None,
            enrolled_courses: vec![],
            created_at: Utc::now(),
        };
        let v = serde_json::to_value(&u).unwrap();
        assert!(v.get("passwordHash").is_none());
        assert!(v.get("password_hash").is_none());
    }

    #[test]
    fn mark_progress_req_accepts_camel_case() {
        let req: MarkProgressReq = serde_json::from_str(
            r#"{"enrollmentId":"4f5a0000-0000-0000-0000-000000000001","lectureId":"4f5a0000-0000-0000-0000-000000000002"}"#,
        )
        .unwrap();
        assert!(req.enrollment_id.is_some());
        assert!(req.lecture_id.is_some());
    }
}

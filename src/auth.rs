use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, SaltString},
    Argon2, PasswordVerifier,
};
use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    typed_header::TypedHeader,
};
use chrono::{Duration, Utc};
use http::{request::Parts, StatusCode};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::env;
use uuid::Uuid;

use crate::error::{is_unique_violation, ApiError};
use crate::models::{Course, Enrollment, LoginReq, RegisterReq, User, ROLE_INSTRUCTOR, ROLE_STUDENT};
use crate::routes::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Instructor,
}

impl Role {
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            ROLE_STUDENT => Some(Role::Student),
            ROLE_INSTRUCTOR => Some(Role::Instructor),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => ROLE_STUDENT,
            Role::Instructor => ROLE_INSTRUCTOR,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub exp: i64,
}

#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtKeys {
    pub fn new(secret: &[u8]) -> Self {
        JwtKeys {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    pub fn from_env() -> Self {
        let secret = env::var("JWT_SECRET").expect("JWT_SECRET not set");
        JwtKeys::new(secret.as_bytes())
    }

    pub fn sign(&self, user_id: Uuid, role: Role) -> Result<String, ApiError> {
        let exp = (Utc::now() + Duration::days(7)).timestamp();
        let claims = Claims { sub: user_id, role, exp };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(e.into()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        Ok(decode::<Claims>(token, &self.decoding, &Validation::default())?.claims)
    }
}

/// The authenticated actor. Role gates which operation family is
/// reachable; record-level access goes through `owns`.
#[derive(Debug, Clone, Copy)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
}

impl Principal {
    pub fn require(self, role: Role) -> Result<Principal, ApiError> {
        if self.role == role {
            Ok(self)
        } else {
            Err(ApiError::Forbidden)
        }
    }

    pub fn owns(&self, resource: &impl Owned) -> bool {
        self.id == resource.owner()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::Unauthorized("Not authenticated".into()))?;
        let claims = state
            .jwt
            .verify(bearer.token())
            .map_err(|_| ApiError::Unauthorized("Not authenticated".into()))?;
        Ok(Principal { id: claims.sub, role: claims.role })
    }
}

/// Record-level ownership, checked by id comparison regardless of role.
pub trait Owned {
    fn owner(&self) -> Uuid;
}

impl Owned for Enrollment {
    fn owner(&self) -> Uuid {
        self.student
    }
}

impl Owned for Course {
    fn owner(&self) -> Uuid {
        self.instructor
    }
}

pub fn ensure_owner(principal: &Principal, resource: &impl Owned) -> Result<(), ApiError> {
    if principal.owns(resource) {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

// --- password hashing ---

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("failed to hash password: {}", e)))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

// --- handlers ---

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterReq>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let missing = || ApiError::Validation("Name, email, password and role are required".into());
    let name = req.name.filter(|s| !s.trim().is_empty()).ok_or_else(missing)?;
    let email = req.email.filter(|s| !s.trim().is_empty()).ok_or_else(missing)?;
    let password = req.password.filter(|s| !s.is_empty()).ok_or_else(missing)?;
    let role = Role::parse(req.role.as_deref().unwrap_or(""))
        .ok_or_else(|| ApiError::Validation("Role must be student or instructor".into()))?;
    if password.len() < 6 {
        return Err(ApiError::Validation(
            "Password must be at least 6 characters".into(),
        ));
    }

    let password_hash = hash_password(&password)?;
    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, name, email, password_hash, role)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name.trim())
    .bind(email.trim().to_lowercase())
    .bind(&password_hash)
    .bind(role.as_str())
    .fetch_one(&state.db)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            ApiError::Conflict("Email already registered".into())
        } else {
            e.into()
        }
    })?;

    let token = state.jwt.sign(user.id, role)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "User registered successfully",
            "data": { "user": user, "token": token },
        })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginReq>,
) -> Result<Json<Value>, ApiError> {
    let missing = || ApiError::Validation("Email and password are required".into());
    let email = req.email.filter(|s| !s.trim().is_empty()).ok_or_else(missing)?;
    let password = req.password.filter(|s| !s.is_empty()).ok_or_else(missing)?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email.trim().to_lowercase())
        .fetch_optional(&state.db)
        .await?;

    // one message for both unknown email and wrong password
    let invalid = || ApiError::Unauthorized("Invalid email or password".into());
    let user = user.ok_or_else(invalid)?;
    if !verify_password(&password, &user.password_hash) {
        return Err(invalid());
    }

    let role = Role::parse(&user.role)
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("unknown role in users row: {}", user.role)))?;
    let token = state.jwt.sign(user.id, role)?;
    Ok(Json(json!({
        "success": true,
        "message": "Login successful",
        "data": { "user": user, "token": token },
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn enrollment_for(student: Uuid) -> Enrollment {
        Enrollment {
            id: Uuid::new_v4(),
            student,
            course: Uuid::new_v4(),
            progress: 0,
            completed_lectures: vec![],
            enrolled_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn claims_round_trip() {
        let keys = JwtKeys::new(b"test-secret");
        let id = Uuid::new_v4();
        let token = keys.sign(id, Role::Student).unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.role, Role::Student);
    }

    #[test]
    fn tampered_token_rejected() {
        let keys = JwtKeys::new(b"test-secret");
        let token = keys.sign(Uuid::new_v4(), Role::Instructor).unwrap();
        assert!(JwtKeys::new(b"other-secret").verify(&token).is_err());
        assert!(keys.verify("not-a-token").is_err());
    }

    #[test]
    fn role_parsing() {
        assert_eq!(Role::parse("student"), Some(Role::Student));
        assert_eq!(Role::parse("instructor"), Some(Role::Instructor));
        assert_eq!(Role::parse("admin"), None);
        assert_eq!(Role::parse(""), None);
    }

    #[test]
    fn require_gates_by_role() {
        let p = Principal { id: Uuid::new_v4(), role: Role::Student };
        assert!(p.require(Role::Student).is_ok());
        assert!(matches!(p.require(Role::Instructor), Err(ApiError::Forbidden)));
    }

    #[test]
    fn ownership_is_id_comparison() {
        let student = Uuid::new_v4();
        let enrollment = enrollment_for(student);
        let owner = Principal { id: student, role: Role::Student };
        let stranger = Principal { id: Uuid::new_v4(), role: Role::Student };
        assert!(owner.owns(&enrollment));
        assert!(!stranger.owns(&enrollment));
        assert!(ensure_owner(&owner, &enrollment).is_ok());
        assert!(matches!(
            ensure_owner(&stranger, &enrollment),
            Err(ApiError::Forbidden)
        ));
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("hunter22").unwrap();
        assert!(verify_password("hunter22", &hash));
        assert!(!verify_password("hunter23", &hash));
        assert!(!verify_password("hunter22", "not-a-phc-string"));
    }
}

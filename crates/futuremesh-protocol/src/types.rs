//! Core API types for the FutureMesh REST protocol.
//!
//! Every type here either travels "on the wire" (a JSON request or
//! response body) or is persisted by the session store. The JSON field
//! names match what the server emits, so most types derive serde impls
//! with no renaming at all.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A server-issued record identifier.
///
/// The FutureMesh server issues UUID strings for users and notifications,
/// but older fixtures and test servers use plain integers. `#[serde(untagged)]`
/// makes serde try each variant in order, so both `1` and `"9f3c..."`
/// deserialize, and each serializes back in its original form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    /// A numeric id, e.g. `1`.
    Number(u64),
    /// A string id, e.g. a UUID.
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for RecordId {
    fn from(n: u64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Identifier of a user account.
pub type UserId = RecordId;

// ---------------------------------------------------------------------------
// Role: ordered access levels
// ---------------------------------------------------------------------------

/// One of the six ordered access levels.
///
/// The declaration order IS the privilege order: deriving `PartialOrd` and
/// `Ord` on a fieldless enum compares variants by their position, so
/// `Role::Student < Role::Alumni < ... < Role::SuperAdmin` holds without
/// any hand-written comparison.
///
/// `#[serde(rename_all = "snake_case")]` gives the wire names the server
/// uses: `"student"`, `"hr"`, `"super_admin"`, ...
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Alumni,
    Hr,
    Hod,
    Admin,
    SuperAdmin,
}

impl Role {
    /// All roles, lowest privilege first.
    pub const ALL: [Role; 6] = [
        Role::Student,
        Role::Alumni,
        Role::Hr,
        Role::Hod,
        Role::Admin,
        Role::SuperAdmin,
    ];

    /// Numeric rank, 1 (student) through 6 (super admin).
    pub fn rank(self) -> u8 {
        match self {
            Role::Student => 1,
            Role::Alumni => 2,
            Role::Hr => 3,
            Role::Hod => 4,
            Role::Admin => 5,
            Role::SuperAdmin => 6,
        }
    }

    /// Whether this role is at least as privileged as `required`.
    pub fn satisfies(self, required: Role) -> bool {
        self.rank() >= required.rank()
    }

    /// The wire name of the role.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Alumni => "alumni",
            Role::Hr => "hr",
            Role::Hod => "hod",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownRole(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// UserProfile
// ---------------------------------------------------------------------------

/// The cached profile of the signed-in user.
///
/// Only `id`, `email`, and `role` are interpreted by the client. Every
/// other field the server sends (`first_name`, `department`, `cgpa`,
/// `skills`, ...) lands in `extra` thanks to `#[serde(flatten)]`, and is
/// written back out unchanged, so a profile survives a store round-trip
/// byte-for-byte in meaning even though we never model those fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    pub role: Role,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserProfile {
    /// Creates a profile with no extra fields.
    pub fn new(id: impl Into<UserId>, email: &str, role: Role) -> Self {
        Self {
            id: id.into(),
            email: Some(email.to_string()),
            role,
            extra: Map::new(),
        }
    }

    /// Looks up an opaque profile field, e.g. `"first_name"`.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }

    /// A human-readable name: `first_name last_name` when the server sent
    /// them, otherwise the email, otherwise the id.
    pub fn display_name(&self) -> String {
        let first = self.extra.get("first_name").and_then(Value::as_str);
        let last = self.extra.get("last_name").and_then(Value::as_str);
        match (first, last) {
            (Some(f), Some(l)) => format!("{f} {l}"),
            (Some(f), None) => f.to_string(),
            _ => self
                .email
                .clone()
                .unwrap_or_else(|| self.id.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// Body of `POST /api/login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body of `POST /api/change-password`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Body of `POST /api/reset-password`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

/// Body of `POST /api/reset-password/confirm`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordResetConfirm {
    pub token: String,
    pub new_password: String,
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

/// Success body of login and registration: a fresh token plus the profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub user: UserProfile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Success body of `GET /api/profile` and `PUT /api/profile`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub user: UserProfile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Success body of `POST /api/change-password`.
///
/// The server may rotate the token on a password change; when it does,
/// `access_token` carries the replacement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangePasswordResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// The error body every failing endpoint returns: `{"error": "..."}`.
///
/// `error` is optional so that a body like `{}` still parses and the
/// caller falls back to its own message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

/// A single notification, as listed by `GET /api/notifications`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: RecordId,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    /// The server calls this field `type`, which is a Rust keyword.
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub action_url: Option<String>,
    /// ISO-8601 timestamp as sent by the server.
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Body of `GET /api/notifications`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationList {
    #[serde(default)]
    pub notifications: Vec<Notification>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_order_matches_rank() {
        // Ord (from declaration order) and rank() must agree for every pair.
        for a in Role::ALL {
            for b in Role::ALL {
                assert_eq!(a >= b, a.rank() >= b.rank(), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn test_role_satisfies_hod_examples() {
        assert!(Role::Hod.satisfies(Role::Student));
        assert!(Role::Hod.satisfies(Role::Hr));
        assert!(Role::Hod.satisfies(Role::Hod));
        assert!(!Role::Hod.satisfies(Role::Admin));
    }

    #[test]
    fn test_role_from_str_round_trips_wire_names() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn test_role_from_str_unknown_returns_error() {
        let err = "dean".parse::<Role>().unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownRole(r) if r == "dean"));
    }

    #[test]
    fn test_role_serializes_snake_case() {
        let json = serde_json::to_string(&Role::SuperAdmin).unwrap();
        assert_eq!(json, "\"super_admin\"");
    }

    #[test]
    fn test_profile_accepts_numeric_id_without_email() {
        let profile: UserProfile =
            serde_json::from_str(r#"{"id":1,"role":"student"}"#).unwrap();
        assert_eq!(profile.id, RecordId::Number(1));
        assert_eq!(profile.email, None);
        assert_eq!(profile.role, Role::Student);
        assert!(profile.extra.is_empty());
    }

    #[test]
    fn test_profile_keeps_unknown_fields() {
        let json = r#"{
            "id": "6d1f0c9e-2b7a-4c55-9e0b-4f5f0b1a2c3d",
            "email": "ravi@campus.edu",
            "role": "alumni",
            "first_name": "Ravi",
            "last_name": "Kumar",
            "graduation_year": 2019,
            "skills": ["rust", "sql"]
        }"#;
        let profile: UserProfile = serde_json::from_str(json).unwrap();

        assert_eq!(profile.role, Role::Alumni);
        assert_eq!(profile.field("graduation_year"), Some(&Value::from(2019)));
        assert_eq!(profile.display_name(), "Ravi Kumar");

        let back: UserProfile =
            serde_json::from_str(&serde_json::to_string(&profile).unwrap()).unwrap();
        assert_eq!(back, profile);
    }

    #[test]
    fn test_profile_display_name_falls_back_to_email_then_id() {
        let with_email = UserProfile::new(3u64, "x@y.z", Role::Hr);
        assert_eq!(with_email.display_name(), "x@y.z");

        let mut bare = with_email.clone();
        bare.email = None;
        assert_eq!(bare.display_name(), "3");
    }

    #[test]
    fn test_error_body_tolerates_missing_field() {
        let body: ErrorBody = serde_json::from_str("{}").unwrap();
        assert_eq!(body.error, None);
    }

    #[test]
    fn test_notification_type_field_maps_to_kind() {
        let n: Notification = serde_json::from_str(
            r#"{"id":"n1","title":"Shortlisted","message":"You made it","type":"application","is_read":false}"#,
        )
        .unwrap();
        assert_eq!(n.kind, "application");
        assert!(!n.is_read);
        assert_eq!(n.action_url, None);
    }
}

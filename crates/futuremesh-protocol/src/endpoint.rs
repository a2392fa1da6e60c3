//! API endpoint table and URL construction.
//!
//! Paths are templates: `{id}` placeholders are substituted by
//! [`ApiBase::url`]. Keeping the table in one enum means a typo in a path
//! is a compile error at the call site (`Endpoint::Profile`), not a 404 at
//! runtime.

use std::fmt;

/// A FutureMesh REST endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    // Authentication
    Login,
    Register,
    Profile,
    ChangePassword,
    ResetPassword,
    ResetPasswordConfirm,

    // Jobs
    Jobs,
    ApplyJob,
    ApproveJob,

    // Applications
    Applications,
    ShortlistApplication,

    // Users
    Alumni,

    // Mentorship
    MentorshipRequests,
    RespondMentorship,

    // Notifications
    Notifications,
    MarkNotificationRead,

    // Dashboard
    DashboardStats,

    // File upload
    Upload,
}

impl Endpoint {
    /// The path template, relative to the API base URL.
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Login => "/api/login",
            Endpoint::Register => "/api/register",
            Endpoint::Profile => "/api/profile",
            Endpoint::ChangePassword => "/api/change-password",
            Endpoint::ResetPassword => "/api/reset-password",
            Endpoint::ResetPasswordConfirm => "/api/reset-password/confirm",
            Endpoint::Jobs => "/api/jobs",
            Endpoint::ApplyJob => "/api/jobs/{id}/apply",
            Endpoint::ApproveJob => "/api/jobs/{id}/approve",
            Endpoint::Applications => "/api/applications",
            Endpoint::ShortlistApplication => "/api/applications/{id}/shortlist",
            Endpoint::Alumni => "/api/alumni",
            Endpoint::MentorshipRequests => "/api/mentorship-requests",
            Endpoint::RespondMentorship => "/api/mentorship-requests/{id}/respond",
            Endpoint::Notifications => "/api/notifications",
            Endpoint::MarkNotificationRead => "/api/notifications/{id}/read",
            Endpoint::DashboardStats => "/api/dashboard/stats",
            Endpoint::Upload => "/api/upload",
        }
    }

    /// Whether the endpoint expects a bearer token.
    ///
    /// Login, registration, and the two password-reset steps are the only
    /// anonymous calls.
    pub fn requires_auth(self) -> bool {
        !matches!(
            self,
            Endpoint::Login
                | Endpoint::Register
                | Endpoint::ResetPassword
                | Endpoint::ResetPasswordConfirm
        )
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// The origin all endpoint paths are joined onto, e.g.
/// `https://futuremesh.example.edu`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiBase {
    base_url: String,
}

impl ApiBase {
    /// Creates a base from an origin. A trailing slash is dropped so that
    /// joining never produces `//api/...`.
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// The normalized base URL.
    pub fn as_str(&self) -> &str {
        &self.base_url
    }

    /// Builds the full URL for `endpoint`, replacing each `{name}` with the
    /// matching value from `params`. Unmatched placeholders are left as-is.
    pub fn url(&self, endpoint: Endpoint, params: &[(&str, &str)]) -> String {
        let mut path = endpoint.path().to_string();
        for (name, value) in params {
            path = path.replace(&format!("{{{name}}}"), value);
        }
        format!("{}{}", self.base_url, path)
    }
}

//! Role-based navigation menus.
//!
//! Each role sees a different sidebar. The table is static data, so it
//! lives in `static` slices: no allocation, and `menu_for` hands out
//! `&'static` references that callers can keep as long as they like.

use serde::Serialize;

use crate::Role;

/// One entry in the sidebar menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MenuItem {
    /// Icon class, e.g. `"fas fa-briefcase"`.
    pub icon: &'static str,
    /// Label shown to the user.
    pub text: &'static str,
    /// Path the entry links to.
    pub href: &'static str,
    /// Stable identifier, used to mark the active entry.
    pub id: &'static str,
}

impl MenuItem {
    /// Whether this entry is the one for `current_path`.
    pub fn is_active(&self, current_path: &str) -> bool {
        self.href == current_path
    }
}

const fn item(
    icon: &'static str,
    text: &'static str,
    href: &'static str,
    id: &'static str,
) -> MenuItem {
    MenuItem { icon, text, href, id }
}

const DASHBOARD: MenuItem = item("fas fa-tachometer-alt", "Dashboard", "/dashboard", "dashboard");
const PROFILE: MenuItem = item("fas fa-user", "Profile", "/profile", "profile");
const NOTIFICATIONS: MenuItem =
    item("fas fa-bell", "Notifications", "/notifications", "notifications");
const SETTINGS: MenuItem = item("fas fa-cogs", "Settings", "/settings", "settings");

static STUDENT_MENU: [MenuItem; 7] = [
    DASHBOARD,
    item("fas fa-briefcase", "Jobs", "/jobs", "jobs"),
    item("fas fa-file-alt", "Applications", "/applications", "applications"),
    item("fas fa-users", "Mentorship", "/mentorship", "mentorship"),
    item("fas fa-project-diagram", "Projects", "/projects", "projects"),
    PROFILE,
    NOTIFICATIONS,
];

static ALUMNI_MENU: [MenuItem; 6] = [
    DASHBOARD,
    item("fas fa-user-graduate", "Students", "/students", "students"),
    item("fas fa-comments", "Mentorship", "/mentorship", "mentorship"),
    item("fas fa-chart-line", "Analytics", "/analytics", "analytics"),
    PROFILE,
    NOTIFICATIONS,
];

static HR_MENU: [MenuItem; 7] = [
    DASHBOARD,
    item("fas fa-plus-circle", "Post Job", "/post-job", "post-job"),
    item("fas fa-briefcase", "My Jobs", "/my-jobs", "my-jobs"),
    item("fas fa-file-alt", "Applications", "/applications", "applications"),
    item("fas fa-users", "Candidates", "/candidates", "candidates"),
    item("fas fa-chart-line", "Analytics", "/analytics", "analytics"),
    NOTIFICATIONS,
];

static HOD_MENU: [MenuItem; 7] = [
    DASHBOARD,
    item("fas fa-briefcase", "Jobs", "/jobs", "jobs"),
    item("fas fa-file-alt", "Applications", "/applications", "applications"),
    item("fas fa-users", "Students", "/students", "students"),
    item("fas fa-chart-bar", "Reports", "/reports", "reports"),
    SETTINGS,
    NOTIFICATIONS,
];

static ADMIN_MENU: [MenuItem; 7] = [
    DASHBOARD,
    item("fas fa-check-circle", "Job Approvals", "/job-approvals", "job-approvals"),
    item("fas fa-users", "Users", "/users", "users"),
    item("fas fa-building", "Companies", "/companies", "companies"),
    item("fas fa-chart-bar", "Reports", "/reports", "reports"),
    SETTINGS,
    NOTIFICATIONS,
];

static SUPER_ADMIN_MENU: [MenuItem; 8] = [
    DASHBOARD,
    item("fas fa-users-cog", "User Management", "/user-management", "user-management"),
    item("fas fa-crown", "Admin Control", "/admin-control", "admin-control"),
    item("fas fa-chart-area", "Analytics", "/analytics", "analytics"),
    item("fas fa-server", "System", "/system", "system"),
    item("fas fa-shield-alt", "Security", "/security", "security"),
    SETTINGS,
    NOTIFICATIONS,
];

/// The sidebar menu for `role`.
pub fn menu_for(role: Role) -> &'static [MenuItem] {
    match role {
        Role::Student => &STUDENT_MENU,
        Role::Alumni => &ALUMNI_MENU,
        Role::Hr => &HR_MENU,
        Role::Hod => &HOD_MENU,
        Role::Admin => &ADMIN_MENU,
        Role::SuperAdmin => &SUPER_ADMIN_MENU,
    }
}

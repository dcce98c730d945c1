//! Flat allow-lists checked against the caller's role.

use uuid::Uuid;

use crate::{users::Role, AppError, AppResult};

use super::AuthUser;

use Role::*;

pub const ADMINS: &[Role] = &[Admin];

pub const COMMITTEE: &[Role] = &[
    Admin,
    Chair,
    Secretary,
    Executive,
    Representative,
    Developer,
    DepartmentHead,
];

/// Committee plus faculty: may create events, quizzes, tasks and announcements.
pub const ORGANIZERS: &[Role] = &[
    Admin,
    Faculty,
    Chair,
    Secretary,
    Executive,
    Representative,
    Developer,
    DepartmentHead,
];

pub const PROJECT_APPROVERS: &[Role] = &[Admin, Faculty, Chair, DepartmentHead];

pub const EVENT_APPROVERS: &[Role] = &[Admin, Faculty, Chair, Secretary];

pub const QUIZ_APPROVERS: &[Role] = &[Admin, Faculty, Chair];

pub const REPORT_MANAGERS: &[Role] = &[Admin, Faculty, Chair, Secretary];

impl AuthUser {
    pub fn holds(&self, allowed: &[Role]) -> bool {
        allowed.contains(&self.role)
    }

    pub fn require(&self, allowed: &[Role]) -> AppResult<()> {
        if self.holds(allowed) {
            Ok(())
        } else {
            Err(AppError::forbidden(format!("the {} role may not do this", self.role)))
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Admin
    }

    /// Owners and admins may change a record.
    pub fn owns(&self, owner_id: Uuid) -> bool {
        self.id == owner_id || self.is_admin()
    }

    pub fn require_owner(&self, owner_id: Uuid, what: &str) -> AppResult<()> {
        if self.owns(owner_id) {
            Ok(())
        } else {
            Err(AppError::forbidden(format!("only the owner of this {what} may change it")))
        }
    }
}

#[cfg(test)]
mod tests {
    use sqlx::types::Json;

    use super::*;
    use crate::{db, users::User};

    fn with_role(role: Role) -> AuthUser {
        AuthUser(User {
            id: Uuid::now_v7(),
            username: role.to_string(),
            password_hash: String::new(),
            email: "x@club.org".into(),
            role,
            is_committee: false,
            is_executive: false,
            is_representative: false,
            is_developer: false,
            department: None,
            year: None,
            interests: Json(vec![]),
            photo: None,
            created_at: db::now(),
        })
    }

    #[test]
    fn students_hold_no_privileged_list() {
        let student = with_role(Student);
        for list in [ADMINS, COMMITTEE, ORGANIZERS, PROJECT_APPROVERS, EVENT_APPROVERS, QUIZ_APPROVERS, REPORT_MANAGERS] {
            assert!(matches!(student.require(list), Err(AppError::Forbidden(_))));
        }
    }

    #[test]
    fn admins_hold_every_list() {
        let admin = with_role(Admin);
        for list in [ADMINS, COMMITTEE, ORGANIZERS, PROJECT_APPROVERS, EVENT_APPROVERS, QUIZ_APPROVERS, REPORT_MANAGERS] {
            assert!(admin.require(list).is_ok());
        }
    }

    #[test]
    fn faculty_organize_but_are_not_committee() {
        let faculty = with_role(Faculty);
        assert!(faculty.holds(ORGANIZERS));
        assert!(!faculty.holds(COMMITTEE));
    }

    #[test]
    fn ownership_falls_back_to_admin() {
        let owner = with_role(Student);
        let stranger = with_role(Chair);
        let admin = with_role(Admin);
        assert!(owner.owns(owner.id));
        assert!(!stranger.owns(owner.id));
        assert!(admin.owns(owner.id));
    }
}

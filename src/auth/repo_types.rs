use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 hash, not exposed in JSON
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub is_email_verified: bool,
    pub is_premium: bool,
    pub max_nodes: i32,
    pub max_tasks: i32,
    pub login_count: i32,
    pub last_login: Option<OffsetDateTime>,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            "system" => Some(Theme::System),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: Uuid,
    pub bio: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub twitter: Option<String>,
    pub github: Option<String>,
    pub linkedin: Option<String>,
    pub email_digest: bool,
    pub task_notifications: bool,
    pub node_alerts: bool,
    pub theme: String,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl UserProfile {
    #[cfg(test)]
    pub fn empty(user_id: Uuid, now: OffsetDateTime) -> Self {
        Self {
            user_id,
            bio: None,
            company: None,
            location: None,
            website: None,
            twitter: None,
            github: None,
            linkedin: None,
            email_digest: true,
            task_notifications: true,
            node_alerts: true,
            theme: Theme::default().as_str().to_string(),
            updated_at: now,
        }
    }
}

/// The parts of a live session row needed to authorize a request.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct ActiveSession {
    pub id: Uuid,
    pub user_id: Uuid,
}

/// Fields needed to insert a user at registration.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Register,
    Login,
    Logout,
    ChangePassword,
    UpdateProfile,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Register => "register",
            AuditAction::Login => "login",
            AuditAction::Logout => "logout",
            AuditAction::ChangePassword => "change_password",
            AuditAction::UpdateProfile => "update_profile",
        }
    }
}

/// Partial profile change. `None` leaves a column alone; for nullable
/// columns `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub first_name: Option<Option<String>>,
    pub last_name: Option<Option<String>>,
    pub avatar_url: Option<Option<String>>,
    pub bio: Option<Option<String>>,
    pub company: Option<Option<String>>,
    pub location: Option<Option<String>>,
    pub website: Option<Option<String>>,
    pub twitter: Option<Option<String>>,
    pub github: Option<Option<String>>,
    pub linkedin: Option<Option<String>>,
    pub email_digest: Option<bool>,
    pub task_notifications: Option<bool>,
    pub node_alerts: Option<bool>,
    pub theme: Option<Theme>,
}

impl ProfileUpdate {
    /// Names of the fields present in this update, in wire (camelCase) form.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let present = [
            ("firstName", self.first_name.is_some()),
            ("lastName", self.last_name.is_some()),
            ("avatarUrl", self.avatar_url.is_some()),
            ("bio", self.bio.is_some()),
            ("company", self.company.is_some()),
            ("location", self.location.is_some()),
            ("website", self.website.is_some()),
            ("twitter", self.twitter.is_some()),
            ("github", self.github.is_some()),
            ("linkedin", self.linkedin.is_some()),
            ("emailDigest", self.email_digest.is_some()),
            ("taskNotifications", self.task_notifications.is_some()),
            ("nodeAlerts", self.node_alerts.is_some()),
            ("theme", self.theme.is_some()),
        ];
        present
            .into_iter()
            .filter(|(_, is_set)| *is_set)
            .map(|(name, _)| name)
            .collect()
    }

    pub fn touches_profile(&self) -> bool {
        [
            &self.bio,
            &self.company,
            &self.location,
            &self.website,
            &self.twitter,
            &self.github,
            &self.linkedin,
        ]
        .iter()
        .any(|f| f.is_some())
            || self.email_digest.is_some()
            || self.task_notifications.is_some()
            || self.node_alerts.is_some()
            || self.theme.is_some()
    }

    #[cfg(test)]
    pub fn apply_to_user(&self, user: &mut User) {
        if let Some(v) = &self.first_name {
            user.first_name = v.clone();
        }
        if let Some(v) = &self.last_name {
            user.last_name = v.clone();
        }
        if let Some(v) = &self.avatar_url {
            user.avatar_url = v.clone();
        }
    }

    #[cfg(test)]
    pub fn apply_to_profile(&self, profile: &mut UserProfile) {
        if let Some(v) = &self.bio {
            profile.bio = v.clone();
        }
        if let Some(v) = &self.company {
            profile.company = v.clone();
        }
        if let Some(v) = &self.location {
            profile.location = v.clone();
        }
        if let Some(v) = &self.website {
            profile.website = v.clone();
        }
        if let Some(v) = &self.twitter {
            profile.twitter = v.clone();
        }
        if let Some(v) = &self.github {
            profile.github = v.clone();
        }
        if let Some(v) = &self.linkedin {
            profile.linkedin = v.clone();
        }
        if let Some(v) = self.email_digest {
            profile.email_digest = v;
        }
        if let Some(v) = self.task_notifications {
            profile.task_notifications = v;
        }
        if let Some(v) = self.node_alerts {
            profile.node_alerts = v;
        }
        if let Some(v) = self.theme {
            profile.theme = v.as_str().to_string();
        }
    }
}

/// Per-user counts of compute nodes and tasks by status.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NodeTaskSummary {
    pub total_nodes: i64,
    pub online_nodes: i64,
    pub total_tasks: i64,
    pub running_tasks: i64,
    pub completed_tasks: i64,
    pub failed_tasks: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changed_fields_lists_only_present_fields() {
        let update = ProfileUpdate {
            bio: Some(Some("x".into())),
            website: Some(None),
            node_alerts: Some(false),
            ..Default::default()
        };
        assert_eq!(update.changed_fields(), vec!["bio", "website", "nodeAlerts"]);
        assert!(update.touches_profile());
    }

    #[test]
    fn apply_leaves_absent_fields_alone() {
        let now = OffsetDateTime::now_utc();
        let mut profile = UserProfile::empty(Uuid::new_v4(), now);
        profile.company = Some("Exo".into());
        profile.location = Some("Berlin".into());

        let update = ProfileUpdate {
            bio: Some(Some("hello".into())),
            location: Some(None),
            email_digest: Some(false),
            theme: Some(Theme::Dark),
            ..Default::default()
        };
        update.apply_to_profile(&mut profile);

        assert_eq!(profile.bio.as_deref(), Some("hello"));
        assert_eq!(profile.company.as_deref(), Some("Exo"));
        assert_eq!(profile.location, None);
        assert!(!profile.email_digest);
        assert!(profile.task_notifications);
        assert_eq!(profile.theme, "dark");
    }

    #[test]
    fn theme_parse_matches_as_str() {
        for theme in [Theme::Light, Theme::Dark, Theme::System] {
            assert_eq!(Theme::parse(theme.as_str()), Some(theme));
        }
        assert_eq!(Theme::parse("solarized"), None);
    }
}

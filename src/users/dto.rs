use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    auth::{
        dto::PublicUser,
        repo_types::{NodeTaskSummary, ProfileUpdate, Theme, UserProfile},
    },
    validation::{Validate, ValidationReport},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

impl Validate for ChangePasswordRequest {
    fn validate(&self, report: &mut ValidationReport) {
        report.required("currentPassword", &self.current_password);
        report.min_chars("newPassword", &self.new_password, 6);
    }
}

/// Distinguishes a missing key (`None`) from an explicit `null` (`Some(None)`).
fn present<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

/// Partial profile edit. Only keys present in the body are applied.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(default, deserialize_with = "present")]
    pub first_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub last_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub avatar_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub bio: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub company: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub location: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub website: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub twitter: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub github: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub linkedin: Option<Option<String>>,
    pub email_digest: Option<bool>,
    pub task_notifications: Option<bool>,
    pub node_alerts: Option<bool>,
    pub theme: Option<String>,
}

impl Validate for UpdateProfileRequest {
    fn validate(&self, report: &mut ValidationReport) {
        let limits = [
            ("firstName", &self.first_name, 50),
            ("lastName", &self.last_name, 50),
            ("bio", &self.bio, 500),
            ("company", &self.company, 100),
            ("location", &self.location, 100),
            ("twitter", &self.twitter, 100),
            ("github", &self.github, 100),
            ("linkedin", &self.linkedin, 100),
        ];
        for (field, value, max) in limits {
            if let Some(Some(v)) = value {
                report.max_chars(field, v, max);
            }
        }
        if let Some(Some(url)) = &self.website {
            report.url_or_empty("website", url);
        }
        if let Some(Some(url)) = &self.avatar_url {
            report.url_or_empty("avatarUrl", url);
        }
        if let Some(theme) = &self.theme {
            if Theme::parse(theme).is_none() {
                report.add_error("theme", "Theme must be one of light, dark, system");
            }
        }
    }
}

impl From<UpdateProfileRequest> for ProfileUpdate {
    fn from(r: UpdateProfileRequest) -> Self {
        ProfileUpdate {
            first_name: r.first_name,
            last_name: r.last_name,
            avatar_url: r.avatar_url,
            bio: r.bio,
            company: r.company,
            location: r.location,
            website: r.website,
            twitter: r.twitter,
            github: r.github,
            linkedin: r.linkedin,
            email_digest: r.email_digest,
            task_notifications: r.task_notifications,
            node_alerts: r.node_alerts,
            // Unknown themes never get this far.
            theme: r.theme.as_deref().and_then(Theme::parse),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub user: PublicUser,
    pub profile: UserProfile,
    pub stats: NodeTaskSummary,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: PublicUser,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::AppError, validation::validate};
    use serde_json::json;

    fn parse(v: serde_json::Value) -> UpdateProfileRequest {
        serde_json::from_value(v).expect("deserialize")
    }

    #[test]
    fn absent_null_and_empty_are_distinct() {
        let req = parse(json!({ "bio": null, "company": "", "emailDigest": false }));
        assert_eq!(req.bio, Some(None));
        assert_eq!(req.company, Some(Some(String::new())));
        assert_eq!(req.location, None);
        assert_eq!(req.email_digest, Some(false));

        let update = ProfileUpdate::from(req);
        assert_eq!(update.changed_fields(), vec!["bio", "company", "emailDigest"]);
    }

    #[test]
    fn profile_limits_and_urls() {
        let req = parse(json!({
            "bio": "b".repeat(501),
            "website": "not a url",
            "avatarUrl": "",
            "theme": "neon"
        }));
        match validate(&req) {
            Err(AppError::Validation(details)) => {
                let fields: Vec<_> = details.iter().map(|d| d.field.as_str()).collect();
                assert_eq!(fields, vec!["bio", "website", "theme"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn valid_profile_passes() {
        let req = parse(json!({
            "firstName": "Alice",
            "website": "https://exo.dev",
            "theme": "dark",
            "nodeAlerts": true
        }));
        assert!(validate(&req).is_ok());
        assert_eq!(ProfileUpdate::from(req).theme, Some(Theme::Dark));
    }

    #[test]
    fn change_password_rules() {
        let bad = ChangePasswordRequest {
            current_password: String::new(),
            new_password: "short".into(),
        };
        match validate(&bad) {
            Err(AppError::Validation(details)) => assert_eq!(details.len(), 2),
            other => panic!("expected validation error, got {:?}", other),
        }
        let good = ChangePasswordRequest {
            current_password: "old".into(),
            new_password: "longenough".into(),
        };
        assert!(validate(&good).is_ok());
    }
}

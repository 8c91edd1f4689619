use axum::extract::FromRequest;
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{AppError, FieldError};

/// JSON body extractor whose rejections become validation errors.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Request payloads checked before any service call.
pub trait Validate {
    fn validate(&self, report: &mut ValidationReport);
}

#[derive(Debug, Default)]
pub struct ValidationReport {
    errors: Vec<FieldError>,
}

impl ValidationReport {
    pub fn add_error(&mut self, field: &str, message: &str) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn into_result(self) -> Result<(), AppError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self.errors))
        }
    }

    pub fn email(&mut self, field: &str, value: &str) {
        if !is_valid_email(value) {
            self.add_error(field, "Invalid email address");
        }
    }

    pub fn required(&mut self, field: &str, value: &str) {
        if value.is_empty() {
            self.add_error(field, "This field is required");
        }
    }

    pub fn min_chars(&mut self, field: &str, value: &str, min: usize) {
        if value.chars().count() < min {
            self.add_error(
                field,
                &format!("Must be at least {} characters", min),
            );
        }
    }

    pub fn max_chars(&mut self, field: &str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.add_error(field, &format!("Must be at most {} characters", max));
        }
    }

    /// Empty strings are accepted so a URL can be cleared.
    pub fn url_or_empty(&mut self, field: &str, value: &str) {
        if !value.is_empty() && !is_valid_url(value) {
            self.add_error(field, "Must be a valid http(s) URL");
        }
    }
}

pub fn validate<T: Validate>(payload: &T) -> Result<(), AppError> {
    let mut report = ValidationReport::default();
    payload.validate(&mut report);
    report.into_result()
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_]{3,20}$").unwrap();
    }
    USERNAME_RE.is_match(username)
}

fn is_valid_url(url: &str) -> bool {
    lazy_static! {
        static ref URL_RE: Regex = Regex::new(r"^https?://[^\s/$.?#][^\s]*$").unwrap();
    }
    URL_RE.is_match(url)
}

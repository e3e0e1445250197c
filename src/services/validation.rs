//! Field rules for wishlist entries. A [`MediaDraft`] only becomes a
//! [`ValidatedMedia`] through [`validate_media`], which reports every
//! violation at once.

use crate::models::{MediaDraft, MediaFields, MediaKind};
use chrono::Datelike;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::net::{Ipv4Addr, Ipv6Addr};
use thiserror::Error;
use url::{Host, Url};

pub const NAME_MAX_CHARS: usize = 255;
pub const DESCRIPTION_MAX_CHARS: usize = 1000;
pub const DIRECTOR_MAX_CHARS: usize = 100;
pub const URL_MAX_CHARS: usize = 2000;
pub const MAX_GENRES: usize = 10;
pub const MIN_YEAR_EXCLUSIVE: i64 = 1800;
pub const MAX_YEAR: i64 = 2050;
pub const MAX_DURATION: i64 = 1000;
pub const MAX_COURSE_DURATION: u32 = 600;

static NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^[\w\s\-\.,!?()\[\]{}:;'"@#$%&*+=]+$"#).expect("Invalid name regex pattern")
});
static DESCRIPTION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^[\w\s\-\.,!?()\[\]{}:;'"@#$%&*+=\n\r]*$"#)
        .expect("Invalid description regex pattern")
});
static DIRECTOR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w\s\-\.,]+$").expect("Invalid director regex pattern"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} invalid field(s)", .0.len())]
pub struct ValidationErrors(pub Vec<FieldViolation>);

impl ValidationErrors {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self(vec![FieldViolation::new(field, message)])
    }

    pub fn violations(&self) -> &[FieldViolation] {
        &self.0
    }

    pub fn has_message(&self, needle: &str) -> bool {
        self.0.iter().any(|v| v.message.contains(needle))
    }
}

/// Media fields that passed every rule. Only [`validate_media`] builds one.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedMedia(MediaFields);

impl ValidatedMedia {
    pub fn fields(&self) -> &MediaFields {
        &self.0
    }

    pub fn into_fields(self) -> MediaFields {
        self.0
    }
}

#[derive(Default)]
struct Violations(Vec<FieldViolation>);

impl Violations {
    fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldViolation::new(field, message));
    }

    fn required<T>(&mut self, field: &str, value: Option<T>) -> Option<T> {
        if value.is_none() {
            self.push(field, "Field required");
        }
        value
    }
}

pub fn current_year() -> i64 {
    i64::from(chrono::Utc::now().year())
}

pub fn validate_media(draft: MediaDraft) -> Result<ValidatedMedia, ValidationErrors> {
    let mut errors = Violations::default();

    for key in draft.unknown.keys() {
        errors.push(key, "Extra inputs are not permitted");
    }

    let name = errors
        .required("name", draft.name)
        .map(|n| n.trim().to_string());
    if let Some(name) = &name {
        check_text(&mut errors, "name", name, 1, NAME_MAX_CHARS, &NAME_PATTERN);
    }

    let year = errors.required("year", draft.year);
    if let Some(year) = year {
        check_year(&mut errors, year);
    }

    let kind = errors.required("kind", draft.kind);
    let status = errors.required("status", draft.status);

    let rating = draft.rating.map(|rating| {
        if rating < 0.0 {
            errors.push("rating", "Input should be greater than or equal to 0");
        } else if rating > 10.0 {
            errors.push("rating", "Input should be less than or equal to 10");
        }
        round_rating(rating)
    });

    let description = draft.description.map(|d| d.trim().to_string());
    if let Some(description) = &description {
        check_text(
            &mut errors,
            "description",
            description,
            0,
            DESCRIPTION_MAX_CHARS,
            &DESCRIPTION_PATTERN,
        );
    }

    if let Some(genres) = &draft.genres {
        if genres.len() > MAX_GENRES {
            errors.push("genres", format!("Maximum {} genres allowed", MAX_GENRES));
        }
    }

    let director = draft.director.map(|d| d.trim().to_string());
    if let Some(director) = &director {
        check_text(
            &mut errors,
            "director",
            director,
            1,
            DIRECTOR_MAX_CHARS,
            &DIRECTOR_PATTERN,
        );
    }

    if let Some(duration) = draft.duration {
        if duration <= 0 {
            errors.push("duration", "Input should be greater than 0");
        } else if duration > MAX_DURATION {
            errors.push(
                "duration",
                format!("Input should be less than or equal to {}", MAX_DURATION),
            );
        }
    }

    let url = draft.url.map(|u| u.trim().to_string());
    if let Some(url) = &url {
        if let Err(message) = check_url(url) {
            errors.push("url", message);
        }
    }

    match kind {
        Some(MediaKind::Film) if director.as_deref().map_or(true, str::is_empty) => {
            errors.push("director", "Director is required for films");
        }
        Some(MediaKind::Course)
            if draft
                .duration
                .is_some_and(|d| d > i64::from(MAX_COURSE_DURATION)) =>
        {
            errors.push(
                "duration",
                format!(
                    "Course duration cannot exceed {} minutes",
                    MAX_COURSE_DURATION
                ),
            );
        }
        _ => {}
    }

    if !errors.0.is_empty() {
        return Err(ValidationErrors(errors.0));
    }

    match (name, year, kind, status) {
        (Some(name), Some(year), Some(kind), Some(status)) => Ok(ValidatedMedia(MediaFields {
            name,
            // Range-checked above.
            year: year as i32,
            kind,
            status,
            rating,
            description,
            genres: draft.genres,
            director,
            duration: draft.duration.map(|d| d as u32),
            url,
        })),
        _ => Err(ValidationErrors::single("body", "Field required")),
    }
}

fn check_text(
    errors: &mut Violations,
    field: &str,
    value: &str,
    min_chars: usize,
    max_chars: usize,
    pattern: &Regex,
) {
    let len = value.chars().count();
    if len < min_chars {
        errors.push(
            field,
            format!(
                "String should have at least {} character{}",
                min_chars,
                if min_chars == 1 { "" } else { "s" }
            ),
        );
    } else if len > max_chars {
        errors.push(
            field,
            format!("String should have at most {} characters", max_chars),
        );
    } else if !pattern.is_match(value) {
        errors.push(field, "String contains characters that are not allowed");
    }
}

fn check_year(errors: &mut Violations, year: i64) {
    if year <= MIN_YEAR_EXCLUSIVE {
        errors.push(
            "year",
            format!("Input should be greater than {}", MIN_YEAR_EXCLUSIVE),
        );
        return;
    }
    if year > MAX_YEAR {
        errors.push(
            "year",
            format!("Input should be less than or equal to {}", MAX_YEAR),
        );
        return;
    }
    let now = current_year();
    if year > now {
        errors.push(
            "year",
            format!("Year cannot be in the future. Current year is {}", now),
        );
    }
}

/// Ratings are kept at one decimal place. Rounding works on the exact binary
/// value and breaks exact ties to even, so `7.25` becomes `7.2` and `0.15`
/// (stored just below the tie) becomes `0.1`.
pub fn round_rating(rating: f64) -> f64 {
    format!("{:.1}", rating).parse().unwrap_or(rating)
}

/// Checks a trailer or course link. An empty string is accepted and means
/// "no link".
pub fn check_url(url: &str) -> Result<(), String> {
    if url.is_empty() {
        return Ok(());
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err("URL must start with http:// or https://".to_string());
    }

    let parsed = Url::parse(url).map_err(|e| format!("Invalid URL format: {}", e))?;
    if is_internal_host(parsed.host()) {
        return Err("Internal URLs are not allowed".to_string());
    }

    if url.chars().count() > URL_MAX_CHARS {
        return Err(format!("URL too long (max {} characters)", URL_MAX_CHARS));
    }

    Ok(())
}

fn is_internal_host(host: Option<Host<&str>>) -> bool {
    match host {
        Some(Host::Domain(domain)) => domain.to_ascii_lowercase().contains("localhost"),
        Some(Host::Ipv4(ip)) => is_internal_ipv4(ip),
        Some(Host::Ipv6(ip)) => is_internal_ipv6(ip),
        None => false,
    }
}

fn is_internal_ipv4(ip: Ipv4Addr) -> bool {
    ip.is_loopback() || ip.is_private() || ip.is_link_local() || ip.is_unspecified()
}

fn is_internal_ipv6(ip: Ipv6Addr) -> bool {
    if ip.is_loopback() || ip.is_unspecified() {
        return true;
    }
    ip.to_ipv4_mapped().is_some_and(is_internal_ipv4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WatchStatus;

    fn film(name: &str) -> MediaDraft {
        MediaDraft {
            name: Some(name.to_string()),
            year: Some(2024),
            kind: Some(MediaKind::Film),
            status: Some(WatchStatus::Planned),
            director: Some("Test Director".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_film_passes() {
        let media = validate_media(film("  Dracula  ")).unwrap();
        assert_eq!(media.fields().name, "Dracula");
        assert_eq!(media.fields().year, 2024);
    }

    #[test]
    fn test_collects_every_violation() {
        let mut draft = film("");
        draft.year = Some(1799);
        let err = validate_media(draft).unwrap_err();
        assert!(err.has_message("String should have at least 1 character"));
        assert!(err.has_message("Input should be greater than 1800"));
        assert_eq!(err.violations().len(), 2);
    }

    #[test]
    fn test_missing_required_fields() {
        let err = validate_media(MediaDraft::default()).unwrap_err();
        let fields: Vec<_> = err.violations().iter().map(|v| v.field.as_str()).collect();
        assert!(fields.contains(&"name"));
        assert!(fields.contains(&"year"));
        assert!(fields.contains(&"kind"));
        assert!(fields.contains(&"status"));
    }

    #[test]
    fn test_future_year_rejected() {
        let mut draft = film("Later");
        draft.year = Some(current_year() + 1);
        let err = validate_media(draft).unwrap_err();
        assert!(err.has_message("Year cannot be in the future"));
    }

    #[test]
    fn test_film_requires_director() {
        let mut draft = film("No Director");
        draft.director = None;
        let err = validate_media(draft).unwrap_err();
        assert!(err.has_message("Director is required for films"));

        let mut draft = film("Blank Director");
        draft.director = Some("   ".to_string());
        assert!(validate_media(draft).is_err());
    }

    #[test]
    fn test_course_duration_cap() {
        let mut draft = film("Long Course");
        draft.kind = Some(MediaKind::Course);
        draft.director = None;
        draft.duration = Some(601);
        let err = validate_media(draft).unwrap_err();
        assert!(err.has_message("Course duration cannot exceed 600 minutes"));

        let mut draft = film("Short Course");
        draft.kind = Some(MediaKind::Course);
        draft.director = None;
        draft.duration = Some(600);
        assert!(validate_media(draft).is_ok());
    }

    #[test]
    fn test_markup_in_name_rejected() {
        let err = validate_media(film("<script>alert('xss')</script>")).unwrap_err();
        assert_eq!(err.violations()[0].field, "name");
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let mut draft = film("Extra");
        draft
            .unknown
            .insert("extra_field".to_string(), serde_json::json!("nope"));
        let err = validate_media(draft).unwrap_err();
        assert_eq!(err.violations()[0].field, "extra_field");
        assert!(err.has_message("Extra inputs are not permitted"));
    }

    #[test]
    fn test_rating_rounded_and_bounded() {
        let mut draft = film("Rated");
        draft.rating = Some(7.26);
        let media = validate_media(draft).unwrap();
        assert_eq!(media.fields().rating, Some(7.3));

        let mut draft = film("Overrated");
        draft.rating = Some(10.5);
        assert!(validate_media(draft).is_err());
    }

    #[test]
    fn test_rating_ties_round_to_even() {
        assert_eq!(round_rating(7.25), 7.2);
        assert_eq!(round_rating(8.75), 8.8);
        assert_eq!(round_rating(0.15), 0.1);
        assert_eq!(round_rating(7.35), 7.3);
        assert_eq!(round_rating(7.26), 7.3);
        assert_eq!(round_rating(10.0), 10.0);
        assert_eq!(round_rating(0.0), 0.0);
    }

    #[test]
    fn test_too_many_genres() {
        let mut draft = film("Genres");
        draft.genres = Some((0..11).map(|i| format!("genre-{}", i)).collect());
        let err = validate_media(draft).unwrap_err();
        assert!(err.has_message("Maximum 10 genres allowed"));
    }

    #[test]
    fn test_url_rules() {
        assert!(check_url("").is_ok());
        assert!(check_url("https://example.com/trailer").is_ok());
        assert_eq!(
            check_url("javascript:alert('xss')").unwrap_err(),
            "URL must start with http:// or https://"
        );
        for internal in [
            "https://localhost/admin",
            "http://127.0.0.1:8080/",
            "http://10.1.2.3/",
            "http://172.20.0.1/",
            "http://192.168.1.1/",
            "http://[::1]/",
        ] {
            assert_eq!(
                check_url(internal).unwrap_err(),
                "Internal URLs are not allowed",
                "{}",
                internal
            );
        }
        let long = format!("https://example.com/{}", "a".repeat(2000));
        assert!(check_url(&long).unwrap_err().contains("URL too long"));
    }
}

//! Form-field validation helpers shared by every action.
//!
//! Each helper trims its input and either returns the normalized value or an
//! `Error::Validation` naming the offending field.

use crate::errors::{Error, Result};

/// Requires a non-blank string of at most `max` characters; returns it trimmed.
pub fn required(field: &str, value: &str, max: usize) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(field, "is required"));
    }
    if trimmed.chars().count() > max {
        return Err(Error::validation(
            field,
            format!("must be at most {max} characters"),
        ));
    }
    Ok(trimmed.to_string())
}

/// Normalizes an optional field: blank becomes `None`, otherwise trimmed and length-checked.
pub fn optional(field: &str, value: Option<&str>, max: usize) -> Result<Option<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => required(field, v, max).map(Some),
    }
}

/// Minimal structural email check: one `@`, non-empty local part, dotted domain.
#[must_use]
pub fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !value.chars().any(char::is_whitespace)
        && domain
            .split('.')
            .filter(|part| !part.is_empty())
            .count()
            >= 2
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

/// Requires a valid email; returns it trimmed and lower-cased.
pub fn email(field: &str, value: &str) -> Result<String> {
    let value = required(field, value, 254)?.to_lowercase();
    if !is_email(&value) {
        return Err(Error::validation(field, "must be a valid email address"));
    }
    Ok(value)
}

/// Optional variant of [`email`].
pub fn optional_email(field: &str, value: Option<&str>) -> Result<Option<String>> {
    match optional(field, value, 254)? {
        None => Ok(None),
        Some(v) => email(field, &v).map(Some),
    }
}

/// Slugs are 3 to 48 characters of `a-z`, `0-9` and inner hyphens.
pub fn slug(field: &str, value: &str) -> Result<String> {
    let value = required(field, value, 48)?.to_lowercase();
    let valid_chars = value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if value.len() < 3 || !valid_chars || value.starts_with('-') || value.ends_with('-') {
        return Err(Error::validation(
            field,
            "must be 3-48 characters of lowercase letters, digits and hyphens",
        ));
    }
    Ok(value)
}

/// Derives a slug candidate from a display name ("Acme & Co" -> "acme-co").
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').chars().take(48).collect()
}

/// References are up to 32 characters of letters, digits, `-` and `_`.
pub fn reference(field: &str, value: &str) -> Result<String> {
    let value = required(field, value, 32)?.to_uppercase();
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(Error::validation(
            field,
            "may only contain letters, digits, '-' and '_'",
        ));
    }
    Ok(value)
}

/// Prices must be finite and non-negative.
pub fn price(field: &str, value: f64) -> Result<f64> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::validation(field, "must be a non-negative amount"));
    }
    Ok(value)
}

/// Two-letter upper-case country code.
pub fn country(field: &str, value: &str) -> Result<String> {
    let value = required(field, value, 2)?.to_uppercase();
    if value.len() != 2 || !value.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(Error::validation(field, "must be a two-letter country code"));
    }
    Ok(value)
}

/// Postal codes: 2 to 10 characters of letters, digits, spaces and hyphens.
pub fn postal_code(field: &str, value: &str) -> Result<String> {
    let value = required(field, value, 10)?;
    if value.len() < 2
        || !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '-')
    {
        return Err(Error::validation(field, "is not a valid postal code"));
    }
    Ok(value.to_uppercase())
}

/// SIRET numbers are 14 digits; spaces are ignored.
pub fn optional_siret(field: &str, value: Option<&str>) -> Result<Option<String>> {
    let Some(value) = optional(field, value, 20)? else {
        return Ok(None);
    };
    let digits: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() != 14 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::validation(field, "must contain exactly 14 digits"));
    }
    Ok(Some(digits))
}

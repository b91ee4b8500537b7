//! Input validation for user records

use once_cell::sync::Lazy;
use regex::Regex;

use super::model::VALID_ROLES;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
});

/// Default page size for listings
pub const DEFAULT_PAGE_SIZE: u32 = 10;
/// Largest page size a caller may request
pub const MAX_PAGE_SIZE: u32 = 100;

/// Lowercase and trim an email; the canonical form for storage and lookups
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email.trim())
}

pub fn is_valid_role(role: &str) -> bool {
    VALID_ROLES.contains(&role)
}

/// Check password strength, returning the first unmet rule
pub fn validate_password_strength(password: &str) -> Result<(), &'static str> {
    if password.chars().count() < 8 {
        return Err("password must be at least 8 characters long");
    }

    let mut has_upper = false;
    let mut has_lower = false;
    let mut has_digit = false;
    let mut has_special = false;

    for c in password.chars() {
        if c.is_uppercase() {
            has_upper = true;
        } else if c.is_lowercase() {
            has_lower = true;
        } else if c.is_numeric() {
            has_digit = true;
        } else if c.is_ascii_punctuation() || (!c.is_alphanumeric() && !c.is_whitespace()) {
            has_special = true;
        }
    }

    if !has_upper {
        return Err("password must contain at least one uppercase letter");
    }
    if !has_lower {
        return Err("password must contain at least one lowercase letter");
    }
    if !has_digit {
        return Err("password must contain at least one number");
    }
    if !has_special {
        return Err("password must contain at least one special character");
    }
    Ok(())
}

/// Resolve `page`/`page_size` query values.
///
/// `page` must be at least 1; `page_size` defaults to 10 and is capped at 100.
pub fn resolve_pagination(
    page: Option<u32>,
    page_size: Option<u32>,
) -> Result<(u32, u32), &'static str> {
    let page = page.unwrap_or(1);
    if page < 1 {
        return Err("page must be at least 1");
    }

    let page_size = match page_size {
        None | Some(0) => DEFAULT_PAGE_SIZE,
        Some(size) => size.min(MAX_PAGE_SIZE),
    };

    Ok((page, page_size))
}

//! Name sanitizing and validation for folders and files.
//!
//! Every create/rename goes through [`validate`] before a backend is touched.

use std::fmt;

use thiserror::Error;

/// Maximum name length in UTF-16 code units.
pub const MAX_NAME_LEN: usize = 255;

const SEPARATORS: [char; 2] = ['/', '\\'];

/// Why a name was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameRejection {
    /// Nothing left after sanitizing.
    EmptyName,
    /// The name contained a path separator or was only dots.
    IllegalCharacters,
}

impl fmt::Display for NameRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "name cannot be empty"),
            Self::IllegalCharacters => {
                write!(f, "name cannot contain / or \\ characters or be only dots")
            }
        }
    }
}

/// A rejected name, labelled with the kind of entity being named.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{label} {reason}")]
pub struct InvalidName {
    /// Entity label shown to the user, e.g. `Folder`.
    pub label: String,
    pub reason: NameRejection,
}

/// Clean a raw name: drop separators, trim, cap the length.
///
/// Idempotent: `sanitize(&sanitize(x)) == sanitize(x)`.
#[must_use]
pub fn sanitize(raw: &str) -> String {
    let stripped: String = raw.chars().filter(|ch| !SEPARATORS.contains(ch)).collect();
    let trimmed = stripped.trim();

    let mut out = String::with_capacity(trimmed.len());
    let mut units = 0usize;
    for ch in trimmed.chars() {
        units += ch.len_utf16();
        if units > MAX_NAME_LEN {
            break;
        }
        out.push(ch);
    }

    // truncation can expose trailing whitespace
    out.truncate(out.trim_end().len());
    out
}

/// Whether `name` would read as a relative path step (`.`, `..`, ...).
#[must_use]
pub fn is_dot_only(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|ch| ch == '.')
}

/// Validate a raw name and return its sanitized form.
pub fn validate(raw: &str, label: &str) -> Result<String, InvalidName> {
    let cleaned = sanitize(raw);
    if cleaned.is_empty() {
        return Err(InvalidName {
            label: label.to_string(),
            reason: NameRejection::EmptyName,
        });
    }
    if raw.trim().contains(SEPARATORS) || is_dot_only(&cleaned) {
        return Err(InvalidName {
            label: label.to_string(),
            reason: NameRejection::IllegalCharacters,
        });
    }
    Ok(cleaned)
}

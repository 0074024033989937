use phonenumber::{Mode, country};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// A validated phone number in E.164 form (`+5511987654321`).
///
/// Only [`normalize`] constructs one, so every value held by a job has passed
/// full validity checking for its resolved country.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Recipient(String);

impl Recipient {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Recipient {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid phone number '{raw}': {reason}")]
pub struct InvalidIdentifier {
    pub raw: String,
    pub reason: String,
}

impl InvalidIdentifier {
    fn new(raw: &str, reason: impl Into<String>) -> Self {
        Self { raw: raw.to_string(), reason: reason.into() }
    }
}

/// Parses `raw` as a phone number, resolving numbers without a `+` prefix
/// against `default_region`, and returns its canonical E.164 form.
///
/// # Errors
/// Returns [`InvalidIdentifier`] when the input is blank, cannot be parsed, or
/// parses but is not a valid number for its country.
pub fn normalize(raw: &str, default_region: country::Id) -> Result<Recipient, InvalidIdentifier> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(InvalidIdentifier::new(raw, "empty value"));
    }

    let parsed = phonenumber::parse(Some(default_region), trimmed)
        .map_err(|e| InvalidIdentifier::new(raw, e.to_string()))?;

    if !phonenumber::is_valid(&parsed) {
        return Err(InvalidIdentifier::new(raw, "not a valid number for its region"));
    }

    Ok(Recipient(parsed.format().mode(Mode::E164).to_string()))
}

//! Validation for bulk lead uploads.
//!
//! The dashboard parses the uploaded sheet and posts the rows; each row is
//! checked once, in order, and either accepted (normalized) or reported back
//! with every problem found on it.
use phonenumber::country::Id as CountryId;
use phonenumber::Mode;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::lead_stage::LeadStage;
use crate::models::LeadImportRow;

/// Sheet row number of the first data row (row 1 is the header).
const FIRST_DATA_ROW: usize = 2;

/// A row that passed validation, ready for the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedLead {
    pub name: String,
    pub email: Option<String>,
    /// E.164 phone number.
    pub phone: Option<String>,
    pub stage: LeadStage,
}

/// Every problem found on one sheet row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowError {
    pub row: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Default)]
pub struct ImportReport {
    pub accepted: Vec<ValidatedLead>,
    pub rejected: Vec<RowError>,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Validate email address
///
/// Rejects malformed addresses and the placeholder patterns people type to
/// get past a required field (`999999@...`, `123456789@...`).
pub fn is_valid_email(email: &str) -> bool {
    if email.len() < 5 || !email.contains('@') || !email.contains('.') {
        return false;
    }

    let fake_patterns = ["999999", "111111", "000000", "123456789"];
    if let Some(pattern) = fake_patterns.iter().find(|p| email.contains(*p)) {
        tracing::warn!(
            "Invalid email detected (fake pattern '{}'): {}",
            pattern,
            email
        );
        return false;
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let email_regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(
            r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
        )
        .expect("email regex is valid")
    });

    if !email_regex.is_match(email) {
        tracing::warn!("Invalid email format: {}", email);
        return false;
    }

    true
}

/// Parses a phone number for `region` and returns it in E.164 form.
pub fn normalize_phone(raw: &str, region: CountryId) -> Result<String, String> {
    if raw.trim().is_empty() || raw.len() < 8 {
        return Err("Phone too short".to_string());
    }

    match phonenumber::parse(Some(region), raw) {
        Ok(number) if phonenumber::is_valid(&number) => {
            let formatted = number.format().mode(Mode::E164).to_string();
            tracing::debug!("Valid phone: {} -> {}", raw, formatted);
            Ok(formatted)
        }
        Ok(_) => Err(format!("Invalid phone number '{}'", raw)),
        Err(e) => Err(format!("Could not parse phone '{}': {:?}", raw, e)),
    }
}

/// Reads a sheet cell as trimmed text. Blank and null cells are `None`.
///
/// Numbers are written without a fractional part when they have none, so a
/// phone exported as `9876543210.0` reads back as `9876543210`.
fn cell_text(value: &Option<Value>, column: &str) -> Result<Option<String>, String> {
    let text = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(text)) => text.trim().to_string(),
        Some(Value::Bool(flag)) => flag.to_string(),
        Some(Value::Number(number)) => match (number.as_u64(), number.as_i64(), number.as_f64()) {
            (Some(n), _, _) => n.to_string(),
            (_, Some(n), _) => n.to_string(),
            (_, _, Some(n)) if n.fract() == 0.0 => format!("{:.0}", n),
            _ => number.to_string(),
        },
        Some(Value::Array(_) | Value::Object(_)) => {
            return Err(format!("Unsupported value in {}", column))
        }
    };
    Ok(Some(text).filter(|t| !t.is_empty()))
}

/// Validates rows in sheet order.
///
/// Duplicate emails (case-insensitive) and phones (after normalization) are
/// reported on the later row.
pub fn validate_rows(rows: &[LeadImportRow], region: CountryId) -> ImportReport {
    let mut report = ImportReport::default();
    let mut seen_emails = HashSet::new();
    let mut seen_phones = HashSet::new();

    for (index, row) in rows.iter().enumerate() {
        let row_number = index + FIRST_DATA_ROW;
        let mut errors = Vec::new();

        let mut read = |value: &Option<Value>, column: &str| {
            cell_text(value, column).unwrap_or_else(|message| {
                errors.push(message);
                None
            })
        };
        let name = read(&row.name, "name");
        let email = read(&row.email, "email").map(|email| email.to_lowercase());
        let phone_raw = read(&row.phone, "phone");
        let stage_raw = read(&row.stage, "stage");

        if name.is_none() {
            errors.push("Name is required".to_string());
        }
        if email.is_none() && phone_raw.is_none() {
            errors.push("Either email or phone is required".to_string());
        }

        let stage = match stage_raw.as_deref().map(str::parse::<LeadStage>) {
            None => LeadStage::Lead,
            Some(Ok(stage)) => stage,
            Some(Err(message)) => {
                errors.push(message);
                LeadStage::Lead
            }
        };

        if let Some(ref email) = email {
            if !is_valid_email(email) {
                errors.push(format!("Invalid email '{}'", email));
            } else if seen_emails.contains(email) {
                errors.push(format!("Duplicate email '{}' in file", email));
            }
        }

        let phone = match phone_raw.map(|raw| normalize_phone(&raw, region)) {
            Some(Ok(normalized)) => {
                if seen_phones.contains(&normalized) {
                    errors.push(format!("Duplicate phone '{}' in file", normalized));
                }
                Some(normalized)
            }
            Some(Err(message)) => {
                errors.push(message);
                None
            }
            None => None,
        };

        match name {
            Some(name) if errors.is_empty() => {
                if let Some(ref email) = email {
                    seen_emails.insert(email.clone());
                }
                if let Some(ref phone) = phone {
                    seen_phones.insert(phone.clone());
                }
                report.accepted.push(ValidatedLead {
                    name,
                    email,
                    phone,
                    stage,
                });
            }
            _ => report.rejected.push(RowError {
                row: row_number,
                errors,
            }),
        }
    }

    tracing::info!(
        "Validated {} lead row(s): {} accepted, {} rejected",
        rows.len(),
        report.accepted.len(),
        report.rejected.len()
    );

    report
}

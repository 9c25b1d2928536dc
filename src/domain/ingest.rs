//! CSV contact parsing: header detection, email validation and per-upload
//! dedup. Storage happens in `services::UploadService`.

use std::collections::HashSet;
use std::io::Read;

use serde_json::{Map, Value as JsonValue};
use validator::ValidateEmail;

use crate::error::AppError;

/// Header names accepted as the email column, compared case-insensitively.
const EMAIL_HEADERS: &[&str] = &["email", "e-mail", "email_address"];

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedContact {
    pub email: String,
    /// The full row keyed by header
    pub fields: JsonValue,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedCsv {
    pub columns: Vec<String>,
    pub contacts: Vec<ParsedContact>,
    /// Rows with a missing or invalid email, or that failed to parse
    pub skipped: usize,
    /// Rows whose email already appeared earlier in the file
    pub duplicates: usize,
}

pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    email.validate_email().then_some(email)
}

fn email_column(columns: &[String]) -> Option<usize> {
    columns
        .iter()
        .position(|c| EMAIL_HEADERS.iter().any(|h| c.eq_ignore_ascii_case(h)))
}

pub fn parse_contacts<R: Read>(input: R) -> Result<ParsedCsv, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let email_idx = email_column(&columns).ok_or_else(|| AppError::UnprocessableContent {
        message: format!(
            "CSV has no email column (expected one of: {})",
            EMAIL_HEADERS.join(", ")
        ),
    })?;

    let mut parsed = ParsedCsv {
        columns,
        ..ParsedCsv::default()
    };
    let mut seen: HashSet<String> = HashSet::new();

    for record in reader.records() {
        let Ok(record) = record else {
            parsed.skipped += 1;
            continue;
        };
        let Some(email) = record.get(email_idx).and_then(normalize_email) else {
            parsed.skipped += 1;
            continue;
        };
        if !seen.insert(email.clone()) {
            parsed.duplicates += 1;
            continue;
        }

        let fields: Map<String, JsonValue> = parsed
            .columns
            .iter()
            .zip(record.iter())
            .map(|(column, value)| (column.clone(), JsonValue::String(value.to_string())))
            .collect();

        parsed.contacts.push(ParsedContact {
            email,
            fields: JsonValue::Object(fields),
        });
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_email_rows_are_skipped() {
        let csv = "email,first_name\na@x.com,A\nb@x.com,B\n,NoEmail\nc@x.com,C\n";
        let parsed = parse_contacts(csv.as_bytes()).unwrap();
        assert_eq!(parsed.contacts.len(), 3);
        assert_eq!(parsed.skipped, 1);
        assert_eq!(parsed.columns, vec!["email", "first_name"]);
    }

    #[test]
    fn emails_are_normalized_and_deduplicated() {
        let csv = "Name,E-Mail\nAnn, Ann@Example.COM \nAnnie,ann@example.com\n";
        let parsed = parse_contacts(csv.as_bytes()).unwrap();
        assert_eq!(parsed.contacts.len(), 1);
        assert_eq!(parsed.duplicates, 1);
        assert_eq!(parsed.contacts[0].email, "ann@example.com");
        assert_eq!(parsed.contacts[0].fields["Name"], "Ann");
    }

    #[test]
    fn invalid_emails_are_skipped() {
        let csv = "email_address\nnot-an-email\n@x.com\nok@x.com\n";
        let parsed = parse_contacts(csv.as_bytes()).unwrap();
        assert_eq!(parsed.contacts.len(), 1);
        assert_eq!(parsed.skipped, 2);
    }

    #[test]
    fn short_rows_keep_available_fields() {
        let csv = "email,first_name,city\nz@x.com\n";
        let parsed = parse_contacts(csv.as_bytes()).unwrap();
        let fields = parsed.contacts[0].fields.as_object().unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["email"], "z@x.com");
    }

    #[test]
    fn csv_without_email_column_is_unprocessable() {
        let err = parse_contacts("name,phone\nA,1\n".as_bytes()).unwrap_err();
        assert!(matches!(err, AppError::UnprocessableContent { .. }));
    }

    #[test]
    fn empty_input_is_unprocessable() {
        let err = parse_contacts("".as_bytes()).unwrap_err();
        assert!(matches!(err, AppError::UnprocessableContent { .. }));
    }
}

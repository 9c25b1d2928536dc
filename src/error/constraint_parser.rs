use std::sync::OnceLock;

use regex::Regex;

/// Maps PostgreSQL constraint violations onto the entities of this schema.
///
/// Known constraint names from `migrations/` resolve directly; anything else
/// falls back to the `Key (..)=(..)` detail that PostgreSQL attaches.
pub struct ConstraintParser;

/// (constraint name, entity, field)
const KNOWN_CONSTRAINTS: &[(&str, &str, &str)] = &[
    ("users_email_key", "user", "email"),
    ("contacts_user_upload_email_key", "contact", "email"),
    ("campaign_recipients_campaign_contact_key", "campaign_recipient", "contact_id"),
    ("template_versions_pkey", "template_version", "version"),
    ("contacts_upload_id_fkey", "contact", "upload_id"),
    ("campaigns_template_id_fkey", "campaign", "template_id"),
    ("campaigns_upload_id_fkey", "campaign", "upload_id"),
    ("campaigns_google_account_id_fkey", "campaign", "google_account_id"),
    ("campaign_recipients_campaign_id_fkey", "campaign_recipient", "campaign_id"),
    ("campaign_recipients_contact_id_fkey", "campaign_recipient", "contact_id"),
    ("template_versions_template_id_fkey", "template_version", "template_id"),
];

struct Patterns {
    key_value: Regex,
    column: Regex,
    table: Regex,
}

static PATTERNS: OnceLock<Patterns> = OnceLock::new();

fn patterns() -> &'static Patterns {
    PATTERNS.get_or_init(|| Patterns {
        key_value: Regex::new(r"Key \(([^)]+)\)=\(([^)]*)\)").expect("valid regex"),
        column: Regex::new(r#"column "([^"]+)""#).expect("valid regex"),
        table: Regex::new(r#"(?:relation|table) "([^"]+)""#).expect("valid regex"),
    })
}

impl ConstraintParser {
    /// Resolves a constraint name declared in the migrations.
    pub fn known_constraint(name: &str) -> Option<(String, String)> {
        KNOWN_CONSTRAINTS
            .iter()
            .find(|(constraint, _, _)| *constraint == name)
            .map(|(_, entity, field)| (entity.to_string(), field.to_string()))
    }

    /// Returns `(entity, field, value)` for a unique violation.
    pub fn parse_unique_violation(
        message: &str,
        constraint_name: Option<&str>,
    ) -> Option<(String, String, String)> {
        let detail = Self::extract_key_value(message);

        if let Some((entity, field)) = constraint_name.and_then(Self::known_constraint) {
            let value = detail
                .map(|(_, value)| value)
                .unwrap_or_else(|| "duplicate_value".to_string());
            return Some((entity, field, value));
        }

        let (field, value) = detail?;
        let entity = Self::extract_table(message).unwrap_or_else(|| "resource".to_string());
        Some((entity, field, value))
    }

    /// Returns `(entity, field, referenced_value)` for a foreign key violation.
    pub fn parse_foreign_key_violation(
        message: &str,
        constraint_name: Option<&str>,
    ) -> Option<(String, String, String)> {
        let detail = Self::extract_key_value(message);
        let (entity, field) = constraint_name.and_then(Self::known_constraint).or_else(|| {
            let (field, _) = detail.clone()?;
            Some((Self::extract_table(message)?, field))
        })?;
        let value = detail
            .map(|(_, value)| value)
            .unwrap_or_else(|| "unknown".to_string());
        Some((entity, field, value))
    }

    /// Returns `(entity, field)` for a not-null violation.
    pub fn parse_not_null_violation(message: &str) -> Option<(String, String)> {
        let field = patterns()
            .column
            .captures(message)
            .map(|c| c[1].to_string())?;
        let entity = Self::extract_table(message).unwrap_or_else(|| "resource".to_string());
        Some((entity, field))
    }

    /// Returns `(entity, constraint)` for a check violation.
    pub fn parse_check_violation(
        message: &str,
        constraint_name: Option<&str>,
    ) -> Option<(String, String)> {
        let entity = Self::extract_table(message)?;
        let constraint = constraint_name.unwrap_or("check").to_string();
        Some((entity, constraint))
    }

    /// Extracts the `Key (field)=(value)` pair. Composite keys keep the last
    /// column, which is the distinguishing one for every composite key here.
    pub fn extract_key_value(message: &str) -> Option<(String, String)> {
        let caps = patterns().key_value.captures(message)?;
        let field = caps[1].rsplit(',').next()?.trim().to_string();
        let value = caps[2].rsplit(',').next()?.trim().to_string();
        Some((field, value))
    }

    fn extract_table(message: &str) -> Option<String> {
        patterns()
            .table
            .captures(message)
            .map(|c| c[1].to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_contact_constraint_resolves() {
        let message = "duplicate key value violates unique constraint \"contacts_user_upload_email_key\"\nDETAIL: Key (user_id, upload_id, email)=(a, b, x@example.com) already exists.";
        let parsed =
            ConstraintParser::parse_unique_violation(message, Some("contacts_user_upload_email_key"));
        assert_eq!(
            parsed,
            Some((
                "contact".to_string(),
                "email".to_string(),
                "x@example.com".to_string()
            ))
        );
    }

    #[test]
    fn unknown_constraint_falls_back_to_detail() {
        let message = "duplicate key value violates unique constraint \"things_name_key\"\nDETAIL: Key (name)=(dup) already exists.";
        let parsed = ConstraintParser::parse_unique_violation(message, Some("things_name_key"));
        assert_eq!(
            parsed,
            Some(("resource".to_string(), "name".to_string(), "dup".to_string()))
        );
    }

    #[test]
    fn foreign_key_violation_uses_known_name() {
        let message = "insert or update on table \"campaigns\" violates foreign key constraint \"campaigns_upload_id_fkey\"\nDETAIL: Key (upload_id)=(42) is not present in table \"uploads\".";
        let parsed =
            ConstraintParser::parse_foreign_key_violation(message, Some("campaigns_upload_id_fkey"));
        assert_eq!(
            parsed,
            Some((
                "campaign".to_string(),
                "upload_id".to_string(),
                "42".to_string()
            ))
        );
    }

    #[test]
    fn not_null_violation_reads_column_and_relation() {
        let message =
            "null value in column \"email\" of relation \"contacts\" violates not-null constraint";
        assert_eq!(
            ConstraintParser::parse_not_null_violation(message),
            Some(("contacts".to_string(), "email".to_string()))
        );
    }
}

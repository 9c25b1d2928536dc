//! `{{ var }}` placeholder discovery and substitution.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::Value as JsonValue;

use crate::domain::sanitize::sanitize_html;

/// Values available to a template, keyed by placeholder name.
pub type Variables = HashMap<String, String>;

static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();

fn placeholder() -> &'static Regex {
    PLACEHOLDER
        .get_or_init(|| Regex::new(r"\{\{\s*([A-Za-z0-9_.]+)\s*\}\}").expect("valid regex"))
}

/// Placeholder names in order of first appearance, without duplicates.
pub fn extract_variables(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for caps in placeholder().captures_iter(text) {
        let name = &caps[1];
        if !found.iter().any(|v| v == name) {
            found.push(name.to_string());
        }
    }
    found
}

/// Variables used anywhere in a template, scanning subject, html, then text.
pub fn template_variables(subject: &str, html: &str, text: &str) -> Vec<String> {
    let mut found = extract_variables(subject);
    for name in extract_variables(html)
        .into_iter()
        .chain(extract_variables(text))
    {
        if !found.contains(&name) {
            found.push(name);
        }
    }
    found
}

/// Replaces every well-formed placeholder with its value, or nothing when the
/// key is missing. Anything that does not parse as a placeholder is kept.
pub fn render(template: &str, data: &Variables) -> String {
    substitute(template, |name| data.get(name).cloned().unwrap_or_default())
}

/// Renders an HTML body: values are escaped before substitution and the
/// result goes through [`sanitize_html`].
pub fn render_html(template: &str, data: &Variables) -> String {
    let rendered = substitute(template, |name| {
        data.get(name).map(|v| escape_html(v)).unwrap_or_default()
    });
    sanitize_html(&rendered)
}

/// A fully rendered email for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, utoipa::ToSchema)]
pub struct RenderedMessage {
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Subject and text use plain substitution; html is escaped and sanitized.
pub fn render_message(subject: &str, html: &str, text: &str, data: &Variables) -> RenderedMessage {
    RenderedMessage {
        subject: render(subject, data),
        html: render_html(html, data),
        text: render(text, data),
    }
}

fn substitute(template: &str, value_of: impl Fn(&str) -> String) -> String {
    placeholder()
        .replace_all(template, |caps: &Captures| value_of(&caps[1]))
        .into_owned()
}

pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Flattens a contact's stored CSV row into template variables. `email` is
/// always present and wins over a same-named column.
pub fn contact_variables(email: &str, fields: &JsonValue) -> Variables {
    let mut vars: Variables = match fields {
        JsonValue::Object(map) => map
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    JsonValue::String(s) => s.clone(),
                    JsonValue::Null => String::new(),
                    other => other.to_string(),
                };
                (key.clone(), value)
            })
            .collect(),
        _ => Variables::new(),
    };
    vars.insert("email".to_string(), email.to_string());
    vars
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn vars(pairs: &[(&str, &str)]) -> Variables {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn substitutes_known_variable() {
        let data = vars(&[("first_name", "John")]);
        assert_eq!(render("Hi {{ first_name }}", &data), "Hi John");
    }

    #[test]
    fn missing_variable_renders_empty() {
        assert_eq!(render("Hi {{ first_name }}", &Variables::new()), "Hi ");
    }

    #[test]
    fn whitespace_inside_braces_is_optional() {
        let data = vars(&[("a", "1"), ("b.c", "2")]);
        assert_eq!(render("{{a}}-{{   b.c\t}}", &data), "1-2");
    }

    #[test]
    fn malformed_braces_are_left_alone() {
        let data = vars(&[("a", "1")]);
        for input in ["{{ }}", "{{ a b }}", "{ a }", "{{ a", "a }}", "{{ a-b }}"] {
            assert_eq!(render(input, &data), input, "input {:?}", input);
        }
    }

    #[test]
    fn extraction_is_ordered_and_deduplicated() {
        let found = extract_variables("{{ b }} {{a}} {{ b }} {{ c.d }} {{ bad key }}");
        assert_eq!(found, vec!["b", "a", "c.d"]);
    }

    #[test]
    fn template_variables_scan_subject_then_html_then_text() {
        let found = template_variables("{{ subject_var }}", "<p>{{ name }}</p>", "{{ text_var }} {{ name }}");
        assert_eq!(found, vec!["subject_var", "name", "text_var"]);
    }

    #[test]
    fn html_values_are_escaped() {
        let data = vars(&[("name", "<script>alert(1)</script>")]);
        let html = render_html("<p>Hello {{ name }}</p>", &data);
        assert_eq!(html, "<p>Hello &lt;script&gt;alert(1)&lt;/script&gt;</p>");
    }

    #[test]
    fn html_template_is_sanitized() {
        let html = render_html(
            "<p onclick=\"steal()\">{{ name }}</p><script>x()</script>",
            &vars(&[("name", "Ann")]),
        );
        assert_eq!(html, "<p>Ann</p>");
    }

    #[test]
    fn message_renders_each_part_its_own_way() {
        let data = vars(&[("name", "A&B")]);
        let message = render_message("Hi {{ name }}", "<b>{{ name }}</b>", "Dear {{name}}", &data);
        assert_eq!(message.subject, "Hi A&B");
        assert_eq!(message.html, "<b>A&amp;B</b>");
        assert_eq!(message.text, "Dear A&B");
    }

    #[test]
    fn contact_variables_flatten_json_and_include_email() {
        let fields = json!({"first_name": "Ann", "age": 31, "note": null, "email": "OLD@x.io"});
        let data = contact_variables("ann@example.com", &fields);
        assert_eq!(data["first_name"], "Ann");
        assert_eq!(data["age"], "31");
        assert_eq!(data["note"], "");
        assert_eq!(data["email"], "ann@example.com");
    }

    proptest! {
        #[test]
        fn no_placeholder_survives_for_known_keys(
            keys in prop::collection::vec("[a-z_][a-z0-9_.]{0,8}", 1..5),
            values in prop::collection::vec("[^{}]{0,12}", 5),
            filler in prop::collection::vec("[^{}]{0,10}", 5),
            pad in prop::collection::vec(" {0,2}", 5),
        ) {
            let mut template = String::new();
            for (i, key) in keys.iter().enumerate() {
                template.push_str(&filler[i]);
                template.push_str(&format!("{{{{{}{}{}}}}}", pad[i], key, pad[i]));
            }
            let data: Variables = keys
                .iter()
                .enumerate()
                .map(|(i, k)| (k.clone(), values[i].clone()))
                .collect();

            let rendered = render(&template, &data);
            for key in &keys {
                prop_assert!(!extract_variables(&rendered).contains(key));
            }
        }

        #[test]
        fn extraction_has_no_duplicates(text in "[a-z {}]{0,60}") {
            let found = extract_variables(&text);
            let mut deduped = found.clone();
            deduped.dedup();
            deduped.sort();
            deduped.dedup();
            prop_assert_eq!(found.len(), deduped.len());
        }
    }
}

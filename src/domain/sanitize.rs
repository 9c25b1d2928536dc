//! Strips executable content from rendered HTML bodies.

use std::sync::OnceLock;

use regex::{Captures, Regex};

const BLOCKED_ELEMENTS: &[&str] = &["script", "style", "iframe", "object", "embed"];

/// Attributes whose value is loaded or navigated to.
const URL_ATTRIBUTES: &[&str] = &[
    "href",
    "src",
    "action",
    "formaction",
    "xlink:href",
    "background",
    "poster",
];

const SCRIPT_SCHEMES: &[&str] = &["javascript:", "vbscript:"];

struct Rules {
    /// One `<tag ...>...</tag>` pattern per blocked element
    elements: Vec<Regex>,
    /// Unpaired opening, self-closing or closing blocked tags
    stray_tags: Regex,
    /// An opening tag; quoted attribute values may contain `>`
    tag: Regex,
    /// One attribute inside a tag. Whitespace and `/` both separate them.
    attribute: Regex,
    entity: Regex,
}

static RULES: OnceLock<Rules> = OnceLock::new();

fn rules() -> &'static Rules {
    RULES.get_or_init(|| {
        let names = BLOCKED_ELEMENTS.join("|");
        Rules {
            elements: BLOCKED_ELEMENTS
                .iter()
                .map(|name| {
                    Regex::new(&format!(r"(?is)<{name}\b[^>]*>.*?</{name}\s*>"))
                        .expect("valid regex")
                })
                .collect(),
            stray_tags: Regex::new(&format!(r"(?i)</?(?:{names})\b[^>]*>")).expect("valid regex"),
            tag: Regex::new(r#"<([A-Za-z][A-Za-z0-9:-]*)((?:[^>"']|"[^"]*"|'[^']*')*)>"#)
                .expect("valid regex"),
            attribute: Regex::new(r#"([^\s"'>/=]+)(?:\s*=\s*("[^"]*"|'[^']*'|[^\s"'>]+))?"#)
                .expect("valid regex"),
            entity: Regex::new(r"(?i)&#x([0-9a-f]+);?|&#([0-9]+);?|&([a-z]+);?")
                .expect("valid regex"),
        }
    })
}

/// Removes `script`, `style`, `iframe`, `object` and `embed` elements along
/// with their content, drops `on*` handler attributes and replaces
/// `javascript:`/`vbscript:` URLs with `#`.
///
/// Passes repeat until the output stops changing, so markup that only forms
/// a blocked tag once another one is cut out is removed as well.
pub fn sanitize_html(html: &str) -> String {
    let mut out = html.to_string();
    loop {
        let next = sanitize_once(&out);
        if next == out {
            return out;
        }
        out = next;
    }
}

fn sanitize_once(html: &str) -> String {
    let rules = rules();

    let mut out = html.to_string();
    for element in &rules.elements {
        out = element.replace_all(&out, "").into_owned();
    }
    out = rules.stray_tags.replace_all(&out, "").into_owned();

    rules
        .tag
        .replace_all(&out, |caps: &Captures| clean_tag(&caps[0], &caps[1], &caps[2]))
        .into_owned()
}

/// Rebuilds a tag without handler attributes and with script URLs replaced.
/// Tags with nothing to remove come back byte for byte.
fn clean_tag(original: &str, name: &str, attributes: &str) -> String {
    let mut kept: Vec<String> = Vec::new();
    let mut changed = false;

    for caps in rules().attribute.captures_iter(attributes) {
        let attr_name = &caps[1];
        let lowered = attr_name.to_ascii_lowercase();
        if lowered.starts_with("on") {
            changed = true;
            continue;
        }
        match caps.get(2) {
            Some(value)
                if URL_ATTRIBUTES.contains(&lowered.as_str()) && is_script_url(value.as_str()) =>
            {
                changed = true;
                kept.push(format!("{}=\"#\"", attr_name));
            }
            _ => kept.push(caps[0].to_string()),
        }
    }

    if !changed {
        return original.to_string();
    }

    let mut rebuilt = format!("<{}", name);
    for attr in &kept {
        rebuilt.push(' ');
        rebuilt.push_str(attr);
    }
    if attributes.trim_end().ends_with('/') {
        rebuilt.push_str(" /");
    }
    rebuilt.push('>');
    rebuilt
}

fn is_script_url(raw: &str) -> bool {
    let unquoted = raw
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| raw.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(raw);

    let normalized: String = decode_entities(unquoted)
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    SCRIPT_SCHEMES.iter().any(|scheme| normalized.starts_with(scheme))
}

/// Decodes numeric character references and the named ones that can hide a
/// URL scheme. Anything else is left as written.
fn decode_entities(value: &str) -> String {
    rules()
        .entity
        .replace_all(value, |caps: &Captures| {
            let decoded = if let Some(hex) = caps.get(1) {
                u32::from_str_radix(hex.as_str(), 16)
                    .ok()
                    .and_then(char::from_u32)
            } else if let Some(dec) = caps.get(2) {
                dec.as_str().parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match caps[3].to_ascii_lowercase().as_str() {
                    "colon" => Some(':'),
                    "tab" => Some('\t'),
                    "newline" => Some('\n'),
                    "amp" => Some('&'),
                    _ => None,
                }
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

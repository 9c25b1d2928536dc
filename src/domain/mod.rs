//! Storage-free campaign rules: rendering, sanitizing, lifecycle and CSV
//! parsing.

pub mod ingest;
pub mod lifecycle;
pub mod render;
pub mod sanitize;

pub use ingest::{ParsedContact, ParsedCsv, normalize_email, parse_contacts};
pub use lifecycle::{CampaignAction, LaunchRefs, Transition, TransitionError, transition};
pub use render::{
    RenderedMessage, Variables, contact_variables, extract_variables, render, render_html,
    render_message, template_variables,
};
pub use sanitize::sanitize_html;

//! HTTP request handlers, one module per resource.

pub mod accounts;
pub mod campaigns;
pub mod health;
pub mod templates;
pub mod uploads;

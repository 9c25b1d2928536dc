use diesel::prelude::*;
use jiff_diesel::Timestamp;
use uuid::Uuid;

/// Head row of a template; always mirrors its latest version.
#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = crate::schema::templates)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Template {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub subject: String,
    pub html: String,
    pub text: String,
    pub variables: Vec<String>,
    pub version: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Insertable, Clone)]
#[diesel(table_name = crate::schema::templates)]
pub struct NewTemplate {
    pub user_id: Uuid,
    pub name: String,
    pub subject: String,
    pub html: String,
    pub text: String,
    pub variables: Vec<String>,
}

/// Content written to the head row when a new version is appended.
#[derive(Debug, AsChangeset, Clone)]
#[diesel(table_name = crate::schema::templates)]
pub struct TemplateContent {
    pub name: String,
    pub subject: String,
    pub html: String,
    pub text: String,
    pub variables: Vec<String>,
}

#[derive(Debug, Queryable, Selectable, Insertable, Clone)]
#[diesel(table_name = crate::schema::template_versions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TemplateVersion {
    pub template_id: Uuid,
    pub version: i32,
    pub name: String,
    pub subject: String,
    pub html: String,
    pub text: String,
    pub variables: Vec<String>,
    pub created_at: Timestamp,
}

impl TemplateVersion {
    pub fn snapshot(template: &Template) -> Self {
        Self {
            template_id: template.id,
            version: template.version,
            name: template.name.clone(),
            subject: template.subject.clone(),
            html: template.html.clone(),
            text: template.text.clone(),
            variables: template.variables.clone(),
            created_at: template.updated_at,
        }
    }
}

use diesel::prelude::*;
use jiff_diesel::Timestamp;
use serde_json::Value as JsonValue;
use uuid::Uuid;

#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = crate::schema::uploads)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Upload {
    pub id: Uuid,
    pub user_id: Uuid,
    pub filename: String,
    pub blob_key: String,
    /// Header row, in file order
    pub column_names: Vec<String>,
    pub row_count: i32,
    pub created_at: Timestamp,
}

#[derive(Debug, Insertable, Clone)]
#[diesel(table_name = crate::schema::uploads)]
pub struct NewUpload {
    pub user_id: Uuid,
    pub filename: String,
    pub blob_key: String,
}

/// One CSV row. `fields` holds the whole row keyed by header name.
#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = crate::schema::contacts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Contact {
    pub id: Uuid,
    pub user_id: Uuid,
    pub upload_id: Uuid,
    pub email: String,
    pub unsubscribed: bool,
    pub fields: JsonValue,
    pub created_at: Timestamp,
}

#[derive(Debug, Insertable, Clone)]
#[diesel(table_name = crate::schema::contacts)]
pub struct NewContact {
    pub user_id: Uuid,
    pub upload_id: Uuid,
    pub email: String,
    pub fields: JsonValue,
}

//! Templates with an append-only version history.

use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use uuid::Uuid;

use crate::db::AsyncDbPool;
use crate::error::{AppError, AppResult};
use crate::models::{NewTemplate, Template, TemplateContent, TemplateVersion};
use crate::repositories::{at_cap, lock_user_quota, now};

#[derive(Clone)]
pub struct TemplateRepository {
    pool: AsyncDbPool,
}

impl TemplateRepository {
    pub fn new(pool: AsyncDbPool) -> Self {
        Self { pool }
    }

    /// Inserts the head row together with version 1. Returns `None` without
    /// inserting when the owner already has `cap` templates.
    pub async fn create(
        &self,
        template: NewTemplate,
        cap: Option<i64>,
    ) -> AppResult<Option<Template>> {
        use crate::schema::{template_versions, templates};
        let mut conn = self.pool.get().await?;

        conn.transaction::<_, AppError, _>(|conn| {
            async move {
                lock_user_quota(conn, template.user_id).await?;
                let used = templates::table
                    .filter(templates::user_id.eq(template.user_id))
                    .count()
                    .get_result::<i64>(conn)
                    .await?;
                if at_cap(used, cap) {
                    return Ok(None);
                }

                let created = diesel::insert_into(templates::table)
                    .values(&template)
                    .returning(Template::as_returning())
                    .get_result(conn)
                    .await?;

                diesel::insert_into(template_versions::table)
                    .values(&TemplateVersion::snapshot(&created))
                    .execute(conn)
                    .await?;

                Ok(Some(created))
            }
            .scope_boxed()
        })
        .await
    }

    pub async fn find_by_id(&self, template_id: Uuid) -> AppResult<Option<Template>> {
        use crate::schema::templates::dsl::*;
        let mut conn = self.pool.get().await?;

        templates
            .find(template_id)
            .select(Template::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(AppError::from)
    }

    pub async fn list_by_user(
        &self,
        owner: Uuid,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<Template>, i64)> {
        use crate::schema::templates::dsl::*;
        let mut conn = self.pool.get().await?;

        let items = templates
            .filter(user_id.eq(owner))
            .order(updated_at.desc())
            .offset(offset)
            .limit(limit)
            .select(Template::as_select())
            .load(&mut conn)
            .await?;

        let total = templates
            .filter(user_id.eq(owner))
            .count()
            .get_result::<i64>(&mut conn)
            .await?;

        Ok((items, total))
    }

    pub async fn count_by_user(&self, owner: Uuid) -> AppResult<i64> {
        use crate::schema::templates::dsl::*;
        let mut conn = self.pool.get().await?;

        templates
            .filter(user_id.eq(owner))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(AppError::from)
    }

    /// Bumps the head row to `version + 1` with new content and records the
    /// snapshot. Existing versions are never touched.
    pub async fn append_version(
        &self,
        template_id: Uuid,
        content: TemplateContent,
    ) -> AppResult<Template> {
        use crate::schema::{template_versions, templates};
        let mut conn = self.pool.get().await?;

        conn.transaction::<_, AppError, _>(|conn| {
            async move {
                let updated = diesel::update(templates::table.find(template_id))
                    .set((
                        &content,
                        templates::version.eq(templates::version + 1),
                        templates::updated_at.eq(now()),
                    ))
                    .returning(Template::as_returning())
                    .get_result(conn)
                    .await
                    .optional()?
                    .ok_or_else(|| AppError::not_found("template", template_id))?;

                diesel::insert_into(template_versions::table)
                    .values(&TemplateVersion::snapshot(&updated))
                    .execute(conn)
                    .await?;

                Ok(updated)
            }
            .scope_boxed()
        })
        .await
    }

    pub async fn list_versions(&self, template: Uuid) -> AppResult<Vec<TemplateVersion>> {
        use crate::schema::template_versions::dsl::*;
        let mut conn = self.pool.get().await?;

        template_versions
            .filter(template_id.eq(template))
            .order(version.desc())
            .select(TemplateVersion::as_select())
            .load(&mut conn)
            .await
            .map_err(AppError::from)
    }

    /// Removes the version history and the head row. Campaigns keep their
    /// row with `template_id` cleared by the foreign key.
    pub async fn delete(&self, template: Uuid) -> AppResult<usize> {
        use crate::schema::{template_versions, templates};
        let mut conn = self.pool.get().await?;

        conn.transaction::<_, AppError, _>(|conn| {
            async move {
                diesel::delete(
                    template_versions::table.filter(template_versions::template_id.eq(template)),
                )
                .execute(conn)
                .await?;

                diesel::delete(templates::table.find(template))
                    .execute(conn)
                    .await
                    .map_err(AppError::from)
            }
            .scope_boxed()
        })
        .await
    }
}

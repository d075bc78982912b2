//! Postgres-backed `CatalogStore`.
//!
//! NOTE: All queries use runtime-checked `sqlx::query()` instead of the
//! compile-time `sqlx::query!()` macros because the tables are created by
//! the migration in `migrations/` and may not exist at compile time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgConnection, PgPool};
use tracing::{debug, info};
use uuid::Uuid;

use super::{copy_content, AuditTransition, CatalogStore};
use crate::config::DatabaseConfig;
use crate::error::StoreError;
use crate::types::{
    ApplySerial, AuditLogEntry, AuditState, AuditType, Catalog, CatalogBundle, CatalogCategory,
    CatalogColumn, CatalogId, CategoryType, Lifecycle, MountedResource, OnlineStatus,
    OpenAuditState, OpenCatalog, OpenStatus, OpenType, PublishStatus, ResourceType, SharedType,
    StatusSnapshot,
};

const CATALOG_COLUMNS: &str = r#"
    id, title, description, code, department_id, source_department_id, info_system_id,
    publish_status, online_status, audit_state, audit_type, audit_apply_serial,
    pre_audit_publish_status, pre_audit_online_status, published_at, online_at,
    draft_id, draft_of, view_count, api_count, file_count, column_unshared,
    created_by, updated_by, created_at, updated_at
"#;

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

#[derive(Debug, FromRow)]
struct CatalogRow {
    id: i64,
    title: String,
    description: Option<String>,
    code: String,
    department_id: Option<String>,
    source_department_id: Option<String>,
    info_system_id: Option<String>,
    publish_status: String,
    online_status: String,
    audit_state: String,
    audit_type: Option<String>,
    audit_apply_serial: Option<Uuid>,
    pre_audit_publish_status: Option<String>,
    pre_audit_online_status: Option<String>,
    published_at: Option<DateTime<Utc>>,
    online_at: Option<DateTime<Utc>>,
    draft_id: i64,
    draft_of: Option<i64>,
    view_count: i32,
    api_count: i32,
    file_count: i32,
    column_unshared: bool,
    created_by: Option<String>,
    updated_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn corrupt(catalog_id: i64, column: &str, value: &str) -> StoreError {
    StoreError::Corrupt {
        catalog_id,
        reason: format!("unknown {column} '{value}'"),
    }
}

impl TryFrom<CatalogRow> for Catalog {
    type Error = StoreError;

    fn try_from(r: CatalogRow) -> Result<Self, Self::Error> {
        let id = r.id;
        let publish_status = PublishStatus::parse(&r.publish_status)
            .ok_or_else(|| corrupt(id, "publish_status", &r.publish_status))?;
        let online_status = OnlineStatus::parse(&r.online_status)
            .ok_or_else(|| corrupt(id, "online_status", &r.online_status))?;
        let audit_state = AuditState::parse(&r.audit_state)
            .ok_or_else(|| corrupt(id, "audit_state", &r.audit_state))?;
        let audit_type = r
            .audit_type
            .as_deref()
            .map(|t| AuditType::parse(t).ok_or_else(|| corrupt(id, "audit_type", t)))
            .transpose()?;
        let pre_audit = match (&r.pre_audit_publish_status, &r.pre_audit_online_status) {
            (Some(p), Some(o)) => Some(StatusSnapshot {
                publish_status: PublishStatus::parse(p)
                    .ok_or_else(|| corrupt(id, "pre_audit_publish_status", p))?,
                online_status: OnlineStatus::parse(o)
                    .ok_or_else(|| corrupt(id, "pre_audit_online_status", o))?,
            }),
            _ => None,
        };

        Ok(Catalog {
            id: CatalogId(id),
            title: r.title,
            description: r.description,
            code: r.code,
            department_id: r.department_id,
            source_department_id: r.source_department_id,
            info_system_id: r.info_system_id,
            lifecycle: Lifecycle {
                publish_status,
                online_status,
                audit_state,
                audit_type,
                audit_apply_serial: r.audit_apply_serial.map(ApplySerial),
                pre_audit,
                published_at: r.published_at,
                online_at: r.online_at,
            },
            draft_id: (r.draft_id != 0).then_some(CatalogId(r.draft_id)),
            draft_of: r.draft_of.map(CatalogId),
            view_count: r.view_count.max(0) as u32,
            api_count: r.api_count.max(0) as u32,
            file_count: r.file_count.max(0) as u32,
            column_unshared: r.column_unshared,
            created_by: r.created_by,
            updated_by: r.updated_by,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct CategoryRow {
    catalog_id: i64,
    category_id: String,
    category_type: String,
}

#[derive(Debug, FromRow)]
struct ResourceRow {
    catalog_id: i64,
    resource_type: String,
    resource_id: String,
    name: String,
    department_id: Option<String>,
    subject_id: Option<String>,
    published_at: Option<DateTime<Utc>>,
    derived_from: Option<String>,
}

#[derive(Debug, FromRow)]
struct ColumnRow {
    catalog_id: i64,
    idx: i32,
    business_name: String,
    technical_name: String,
    data_format: String,
    data_length: Option<i32>,
    data_precision: Option<i32>,
    shared_type: String,
    open_type: String,
    classification: Option<String>,
    sensitive: bool,
    primary_key: bool,
    is_timestamp: bool,
    standard_code: Option<String>,
    code_table_id: Option<String>,
}

#[derive(Debug, FromRow)]
struct AuditLogRow {
    catalog_id: i64,
    audit_type: String,
    audit_state: String,
    apply_serial: Option<Uuid>,
    operator_id: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct OpenCatalogRow {
    catalog_id: i64,
    open_status: String,
    open_audit_state: String,
    updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// PgCatalogStore
// ---------------------------------------------------------------------------

pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool from configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect(&config.database_url)
            .await?;
        info!(
            max_connections = config.max_connections,
            "Connected catalog store"
        );
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

async fn fetch_catalog(
    conn: &mut PgConnection,
    id: CatalogId,
    for_update: bool,
) -> Result<Option<Catalog>, StoreError> {
    let sql = format!(
        "SELECT {CATALOG_COLUMNS} FROM catalog.data_catalog WHERE id = $1{}",
        if for_update { " FOR UPDATE" } else { "" }
    );
    let row = sqlx::query_as::<_, CatalogRow>(&sql)
        .bind(id.0)
        .fetch_optional(&mut *conn)
        .await?;
    row.map(Catalog::try_from).transpose()
}

async fn fetch_bundle(
    conn: &mut PgConnection,
    id: CatalogId,
    for_update: bool,
) -> Result<Option<CatalogBundle>, StoreError> {
    let Some(catalog) = fetch_catalog(&mut *conn, id, for_update).await? else {
        return Ok(None);
    };

    let categories = sqlx::query_as::<_, CategoryRow>(
        r#"
        SELECT catalog_id, category_id, category_type
        FROM catalog.data_catalog_category
        WHERE catalog_id = $1
        ORDER BY category_type, category_id
        "#,
    )
    .bind(id.0)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|r| -> Result<CatalogCategory, StoreError> {
        Ok(CatalogCategory {
            catalog_id: CatalogId(r.catalog_id),
            category_type: CategoryType::parse(&r.category_type)
                .ok_or_else(|| corrupt(r.catalog_id, "category_type", &r.category_type))?,
            category_id: r.category_id,
        })
    })
    .collect::<Result<Vec<_>, StoreError>>()?;

    let resources = sqlx::query_as::<_, ResourceRow>(
        r#"
        SELECT catalog_id, resource_type, resource_id, name, department_id,
               subject_id, published_at, derived_from
        FROM catalog.data_catalog_resource
        WHERE catalog_id = $1
        ORDER BY resource_type, resource_id
        "#,
    )
    .bind(id.0)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|r| -> Result<MountedResource, StoreError> {
        Ok(MountedResource {
            catalog_id: CatalogId(r.catalog_id),
            resource_type: ResourceType::parse(&r.resource_type)
                .ok_or_else(|| corrupt(r.catalog_id, "resource_type", &r.resource_type))?,
            resource_id: r.resource_id,
            name: r.name,
            department_id: r.department_id,
            subject_id: r.subject_id,
            published_at: r.published_at,
            derived_from: r.derived_from,
        })
    })
    .collect::<Result<Vec<_>, StoreError>>()?;

    let columns = sqlx::query_as::<_, ColumnRow>(
        r#"
        SELECT catalog_id, idx, business_name, technical_name, data_format,
               data_length, data_precision, shared_type, open_type, classification,
               sensitive, primary_key, is_timestamp, standard_code, code_table_id
        FROM catalog.data_catalog_column
        WHERE catalog_id = $1
        ORDER BY idx
        "#,
    )
    .bind(id.0)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|r| -> Result<CatalogColumn, StoreError> {
        Ok(CatalogColumn {
            catalog_id: CatalogId(r.catalog_id),
            index: r.idx.max(0) as u32,
            business_name: r.business_name,
            technical_name: r.technical_name,
            data_format: r.data_format,
            data_length: r.data_length,
            data_precision: r.data_precision,
            shared_type: SharedType::parse(&r.shared_type)
                .ok_or_else(|| corrupt(r.catalog_id, "shared_type", &r.shared_type))?,
            open_type: OpenType::parse(&r.open_type)
                .ok_or_else(|| corrupt(r.catalog_id, "open_type", &r.open_type))?,
            classification: r.classification,
            sensitive: r.sensitive,
            primary_key: r.primary_key,
            timestamp: r.is_timestamp,
            standard_code: r.standard_code,
            code_table_id: r.code_table_id,
        })
    })
    .collect::<Result<Vec<_>, StoreError>>()?;

    Ok(Some(CatalogBundle {
        catalog,
        categories,
        resources,
        columns,
    }))
}

async fn insert_row(conn: &mut PgConnection, catalog: &Catalog) -> Result<CatalogId, StoreError> {
    let l = &catalog.lifecycle;
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO catalog.data_catalog
            (title, description, code, department_id, source_department_id, info_system_id,
             publish_status, online_status, audit_state, audit_type, audit_apply_serial,
             pre_audit_publish_status, pre_audit_online_status, published_at, online_at,
             draft_id, draft_of, view_count, api_count, file_count, column_unshared,
             created_by, updated_by, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                0, $16, $17, $18, $19, $20, $21, $22, $23, $24)
        RETURNING id
        "#,
    )
    .bind(&catalog.title)
    .bind(&catalog.description)
    .bind(&catalog.code)
    .bind(&catalog.department_id)
    .bind(&catalog.source_department_id)
    .bind(&catalog.info_system_id)
    .bind(l.publish_status.as_str())
    .bind(l.online_status.as_str())
    .bind(l.audit_state.as_str())
    .bind(l.audit_type.map(|t| t.as_str()))
    .bind(l.audit_apply_serial.map(|s| s.0))
    .bind(l.pre_audit.map(|s| s.publish_status.as_str()))
    .bind(l.pre_audit.map(|s| s.online_status.as_str()))
    .bind(l.published_at)
    .bind(l.online_at)
    .bind(catalog.draft_of.map(|d| d.0))
    .bind(catalog.view_count as i32)
    .bind(catalog.api_count as i32)
    .bind(catalog.file_count as i32)
    .bind(catalog.column_unshared)
    .bind(&catalog.created_by)
    .bind(&catalog.updated_by)
    .bind(catalog.created_at)
    .bind(catalog.updated_at)
    .fetch_one(&mut *conn)
    .await?;
    Ok(CatalogId(id))
}

async fn update_content(conn: &mut PgConnection, catalog: &Catalog) -> Result<bool, StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE catalog.data_catalog
        SET title = $2, description = $3, department_id = $4, source_department_id = $5,
            info_system_id = $6, view_count = $7, api_count = $8, file_count = $9,
            column_unshared = $10, updated_by = $11, updated_at = $12
        WHERE id = $1
        "#,
    )
    .bind(catalog.id.0)
    .bind(&catalog.title)
    .bind(&catalog.description)
    .bind(&catalog.department_id)
    .bind(&catalog.source_department_id)
    .bind(&catalog.info_system_id)
    .bind(catalog.view_count as i32)
    .bind(catalog.api_count as i32)
    .bind(catalog.file_count as i32)
    .bind(catalog.column_unshared)
    .bind(&catalog.updated_by)
    .bind(catalog.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

async fn write_associations(
    conn: &mut PgConnection,
    id: CatalogId,
    bundle: &CatalogBundle,
) -> Result<(), StoreError> {
    for table in [
        "catalog.data_catalog_category",
        "catalog.data_catalog_resource",
        "catalog.data_catalog_column",
    ] {
        sqlx::query(&format!("DELETE FROM {table} WHERE catalog_id = $1"))
            .bind(id.0)
            .execute(&mut *conn)
            .await?;
    }

    for c in &bundle.categories {
        sqlx::query(
            r#"
            INSERT INTO catalog.data_catalog_category (catalog_id, category_id, category_type)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(id.0)
        .bind(&c.category_id)
        .bind(c.category_type.as_str())
        .execute(&mut *conn)
        .await?;
    }

    for r in &bundle.resources {
        sqlx::query(
            r#"
            INSERT INTO catalog.data_catalog_resource
                (catalog_id, resource_type, resource_id, name, department_id,
                 subject_id, published_at, derived_from)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(id.0)
        .bind(r.resource_type.as_str())
        .bind(&r.resource_id)
        .bind(&r.name)
        .bind(&r.department_id)
        .bind(&r.subject_id)
        .bind(r.published_at)
        .bind(&r.derived_from)
        .execute(&mut *conn)
        .await?;
    }

    for c in &bundle.columns {
        sqlx::query(
            r#"
            INSERT INTO catalog.data_catalog_column
                (catalog_id, idx, business_name, technical_name, data_format, data_length,
                 data_precision, shared_type, open_type, classification, sensitive,
                 primary_key, is_timestamp, standard_code, code_table_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(id.0)
        .bind(c.index as i32)
        .bind(&c.business_name)
        .bind(&c.technical_name)
        .bind(&c.data_format)
        .bind(c.data_length)
        .bind(c.data_precision)
        .bind(c.shared_type.as_str())
        .bind(c.open_type.as_str())
        .bind(&c.classification)
        .bind(c.sensitive)
        .bind(c.primary_key)
        .bind(c.timestamp)
        .bind(&c.standard_code)
        .bind(&c.code_table_id)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

async fn set_draft_id(
    conn: &mut PgConnection,
    id: CatalogId,
    draft_id: Option<CatalogId>,
) -> Result<(), StoreError> {
    sqlx::query("UPDATE catalog.data_catalog SET draft_id = $2 WHERE id = $1")
        .bind(id.0)
        .bind(draft_id.map(|d| d.0).unwrap_or(0))
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn delete_row(conn: &mut PgConnection, id: CatalogId) -> Result<bool, StoreError> {
    // Association rows and the open-catalog row cascade.
    let result = sqlx::query("DELETE FROM catalog.data_catalog WHERE id = $1")
        .bind(id.0)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

async fn write_lifecycle(
    conn: &mut PgConnection,
    id: CatalogId,
    lifecycle: &Lifecycle,
    updated_by: Option<&str>,
    at: DateTime<Utc>,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        UPDATE catalog.data_catalog
        SET publish_status = $2, online_status = $3, audit_state = $4, audit_type = $5,
            audit_apply_serial = $6, pre_audit_publish_status = $7,
            pre_audit_online_status = $8, published_at = $9, online_at = $10,
            updated_by = COALESCE($11, updated_by), updated_at = $12
        WHERE id = $1
        "#,
    )
    .bind(id.0)
    .bind(lifecycle.publish_status.as_str())
    .bind(lifecycle.online_status.as_str())
    .bind(lifecycle.audit_state.as_str())
    .bind(lifecycle.audit_type.map(|t| t.as_str()))
    .bind(lifecycle.audit_apply_serial.map(|s| s.0))
    .bind(lifecycle.pre_audit.map(|s| s.publish_status.as_str()))
    .bind(lifecycle.pre_audit.map(|s| s.online_status.as_str()))
    .bind(lifecycle.published_at)
    .bind(lifecycle.online_at)
    .bind(updated_by)
    .bind(at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn load_catalog(&self, id: CatalogId) -> Result<Option<Catalog>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        fetch_catalog(&mut conn, id, false).await
    }

    async fn load_bundle(&self, id: CatalogId) -> Result<Option<CatalogBundle>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        fetch_bundle(&mut conn, id, false).await
    }

    async fn title_in_use(&self, title: &str, exclude: &[CatalogId]) -> Result<bool, StoreError> {
        let exclude: Vec<i64> = exclude.iter().map(|c| c.0).collect();
        let taken: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM catalog.data_catalog
                WHERE title = $1 AND NOT (id = ANY($2))
            )
            "#,
        )
        .bind(title)
        .bind(&exclude)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    async fn insert_catalog(&self, bundle: &CatalogBundle) -> Result<CatalogId, StoreError> {
        let mut tx = self.pool.begin().await?;
        let id = insert_row(&mut tx, &bundle.catalog).await?;
        write_associations(&mut tx, id, bundle).await?;
        upsert_open_catalog(&mut tx, &OpenCatalog::not_open(id, bundle.catalog.created_at))
            .await?;
        tx.commit().await?;
        debug!(catalog_id = %id, "Inserted catalog");
        Ok(id)
    }

    async fn replace_content(&self, bundle: &CatalogBundle) -> Result<(), StoreError> {
        let id = bundle.catalog.id;
        let mut tx = self.pool.begin().await?;
        if !update_content(&mut tx, &bundle.catalog).await? {
            return Err(StoreError::NotFound(id));
        }
        write_associations(&mut tx, id, bundle).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn insert_draft_copy(
        &self,
        parent_id: CatalogId,
        bundle: &CatalogBundle,
    ) -> Result<CatalogId, StoreError> {
        let mut tx = self.pool.begin().await?;
        if fetch_catalog(&mut tx, parent_id, true).await?.is_none() {
            return Err(StoreError::NotFound(parent_id));
        }

        let mut draft = bundle.catalog.clone();
        draft.draft_of = Some(parent_id);
        draft.draft_id = None;
        let id = insert_row(&mut tx, &draft).await?;
        write_associations(&mut tx, id, bundle).await?;
        set_draft_id(&mut tx, parent_id, Some(id)).await?;
        tx.commit().await?;
        debug!(catalog_id = %parent_id, draft_id = %id, "Inserted draft copy");
        Ok(id)
    }

    async fn apply_transition(
        &self,
        transition: &AuditTransition,
    ) -> Result<Option<Catalog>, StoreError> {
        let id = transition.catalog_id;
        let mut tx = self.pool.begin().await?;

        let Some(current) = fetch_catalog(&mut tx, id, true).await? else {
            return Ok(None);
        };
        if !transition.expected.matches(&current.lifecycle) {
            return Ok(None);
        }

        if transition.merge_draft {
            if let Some(draft_id) = current.draft_id {
                let draft = fetch_bundle(&mut tx, draft_id, true)
                    .await?
                    .ok_or(StoreError::NotFound(draft_id))?;
                let mut merged = current.clone();
                copy_content(&mut merged, &draft.catalog);
                update_content(&mut tx, &merged).await?;
                write_associations(&mut tx, id, &draft).await?;
                set_draft_id(&mut tx, id, None).await?;
                delete_row(&mut tx, draft_id).await?;
            }
        }

        if transition.reset_open_catalog {
            sqlx::query(
                r#"
                UPDATE catalog.open_catalog
                SET open_status = $2, open_audit_state = $3, updated_at = $4
                WHERE catalog_id = $1
                "#,
            )
            .bind(id.0)
            .bind(OpenStatus::NotOpen.as_str())
            .bind(OpenAuditState::Unaudited.as_str())
            .bind(transition.at)
            .execute(&mut *tx)
            .await?;
        }

        write_lifecycle(
            &mut tx,
            id,
            &transition.lifecycle,
            transition.updated_by.as_deref(),
            transition.at,
        )
        .await?;

        let log = &transition.log;
        sqlx::query(
            r#"
            INSERT INTO catalog.data_catalog_audit_log
                (catalog_id, audit_type, audit_state, apply_serial, operator_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(log.catalog_id.0)
        .bind(log.audit_type.as_str())
        .bind(log.audit_state.as_str())
        .bind(log.apply_serial.map(|s| s.0))
        .bind(&log.operator_id)
        .bind(log.created_at)
        .execute(&mut *tx)
        .await?;

        let updated = fetch_catalog(&mut tx, id, false).await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn delete_catalog(&self, id: CatalogId) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;
        let Some(current) = fetch_catalog(&mut tx, id, true).await? else {
            return Ok(false);
        };
        if let Some(draft_id) = current.draft_id {
            delete_row(&mut tx, draft_id).await?;
        }
        delete_row(&mut tx, id).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn detach_resource(
        &self,
        catalog_id: CatalogId,
        resource_id: &str,
        auto_offline: bool,
    ) -> Result<Option<Catalog>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let Some(mut bundle) = fetch_bundle(&mut tx, catalog_id, true).await? else {
            return Ok(None);
        };

        bundle.resources.retain(|r| {
            r.resource_id != resource_id && r.derived_from.as_deref() != Some(resource_id)
        });
        bundle.refresh_derived();
        bundle.catalog.updated_at = Utc::now();
        update_content(&mut tx, &bundle.catalog).await?;
        write_associations(&mut tx, catalog_id, &bundle).await?;

        if auto_offline && bundle.catalog.lifecycle.online_status == OnlineStatus::Online {
            bundle.catalog.lifecycle.online_status = OnlineStatus::OfflineAuto;
            sqlx::query("UPDATE catalog.data_catalog SET online_status = $2 WHERE id = $1")
                .bind(catalog_id.0)
                .bind(OnlineStatus::OfflineAuto.as_str())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(Some(bundle.catalog))
    }

    async fn list_catalog_ids(&self) -> Result<Vec<CatalogId>, StoreError> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM catalog.data_catalog WHERE draft_of IS NULL ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().map(CatalogId).collect())
    }

    async fn catalogs_mounting(&self, resource_id: &str) -> Result<Vec<CatalogId>, StoreError> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT catalog_id FROM catalog.data_catalog_resource
            WHERE resource_id = $1
            ORDER BY catalog_id
            "#,
        )
        .bind(resource_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().map(CatalogId).collect())
    }

    async fn audit_log(&self, id: CatalogId) -> Result<Vec<AuditLogEntry>, StoreError> {
        let rows = sqlx::query_as::<_, AuditLogRow>(
            r#"
            SELECT catalog_id, audit_type, audit_state, apply_serial, operator_id, created_at
            FROM catalog.data_catalog_audit_log
            WHERE catalog_id = $1
            ORDER BY id
            "#,
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| -> Result<AuditLogEntry, StoreError> {
                Ok(AuditLogEntry {
                    catalog_id: CatalogId(r.catalog_id),
                    audit_type: AuditType::parse(&r.audit_type)
                        .ok_or_else(|| corrupt(r.catalog_id, "audit_type", &r.audit_type))?,
                    audit_state: AuditState::parse(&r.audit_state)
                        .ok_or_else(|| corrupt(r.catalog_id, "audit_state", &r.audit_state))?,
                    apply_serial: r.apply_serial.map(ApplySerial),
                    operator_id: r.operator_id,
                    created_at: r.created_at,
                })
            })
            .collect()
    }

    async fn load_open_catalog(&self, id: CatalogId) -> Result<Option<OpenCatalog>, StoreError> {
        let row = sqlx::query_as::<_, OpenCatalogRow>(
            r#"
            SELECT catalog_id, open_status, open_audit_state, updated_at
            FROM catalog.open_catalog
            WHERE catalog_id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| -> Result<OpenCatalog, StoreError> {
            Ok(OpenCatalog {
                catalog_id: CatalogId(r.catalog_id),
                open_status: OpenStatus::parse(&r.open_status)
                    .ok_or_else(|| corrupt(r.catalog_id, "open_status", &r.open_status))?,
                open_audit_state: OpenAuditState::parse(&r.open_audit_state).ok_or_else(
                    || corrupt(r.catalog_id, "open_audit_state", &r.open_audit_state),
                )?,
                updated_at: r.updated_at,
            })
        })
        .transpose()
    }

    async fn save_open_catalog(&self, open: &OpenCatalog) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        upsert_open_catalog(&mut conn, open).await
    }
}

async fn upsert_open_catalog(conn: &mut PgConnection, open: &OpenCatalog) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO catalog.open_catalog (catalog_id, open_status, open_audit_state, updated_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (catalog_id) DO UPDATE
        SET open_status = EXCLUDED.open_status,
            open_audit_state = EXCLUDED.open_audit_state,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(open.catalog_id.0)
    .bind(open.open_status.as_str())
    .bind(open.open_audit_state.as_str())
    .bind(open.updated_at)
    .execute(conn)
    .await?;
    Ok(())
}

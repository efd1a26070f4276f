//! Database configuration module for Factly.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the database schema always matches the Rust structs. Organization-scoped uniqueness
//! (client references, product references, category names, memberships) is declared here
//! as composite unique indexes.

use crate::config::app::DatabaseConfig;
use crate::entities::{
    Address, Client, ClientColumn, Contact, FiscalYear, Invitation, Member, MemberColumn,
    Organization, Product, ProductCategory, ProductCategoryColumn, ProductColumn, Session,
    Supplier, SupplierColumn, User,
};
use crate::errors::{Error, Result};
use sea_orm::sea_query::{Index, IndexCreateStatement};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Delay before the first retry of the connectivity check; doubles each attempt.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

/// Opens the configured database, verifies connectivity and creates missing tables.
pub async fn init_db(config: &DatabaseConfig) -> Result<DatabaseConnection> {
    ensure_sqlite_parent_dir(&config.url)?;
    let db = connect_with_retry(&config.url, config.connect_attempts).await?;
    create_tables(&db).await?;
    info!("Database schema is ready");
    Ok(db)
}

/// Connects to `url`, retrying failed connections or pings up to `attempts` times.
pub async fn connect_with_retry(url: &str, attempts: u32) -> Result<DatabaseConnection> {
    let attempts = attempts.max(1);
    let mut delay = RETRY_BASE_DELAY;
    let mut last_error = None;

    for attempt in 1..=attempts {
        match try_connect(url).await {
            Ok(db) => {
                debug!("Database reachable on attempt {attempt}/{attempts}");
                return Ok(db);
            }
            Err(e) => {
                warn!("Database connectivity check failed (attempt {attempt}/{attempts}): {e}");
                last_error = Some(e);
            }
        }
        if attempt < attempts {
            tokio::time::sleep(delay).await;
            delay *= 2;
        }
    }

    Err(last_error.unwrap_or_else(|| Error::Config {
        message: "no database connection attempt was made".to_string(),
    }))
}

async fn try_connect(url: &str) -> Result<DatabaseConnection> {
    let db = Database::connect(url).await?;
    db.ping().await?;
    Ok(db)
}

/// Pings an open connection; used by the health endpoint.
pub async fn check_connection(db: &DatabaseConnection) -> Result<()> {
    db.ping().await.map_err(Into::into)
}

/// Creates the directory holding a file-backed `SQLite` database.
fn ensure_sqlite_parent_dir(url: &str) -> Result<()> {
    let Some(rest) = url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = rest.split('?').next().unwrap_or(rest);
    if let Some(parent) = Path::new(path).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

async fn create_table<E: EntityTrait>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<()> {
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

fn unique_indexes() -> Vec<IndexCreateStatement> {
    vec![
        Index::create()
            .name("idx_members_org_user")
            .table(Member)
            .col(MemberColumn::OrganizationId)
            .col(MemberColumn::UserId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_clients_org_reference")
            .table(Client)
            .col(ClientColumn::OrganizationId)
            .col(ClientColumn::Reference)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_suppliers_org_reference")
            .table(Supplier)
            .col(SupplierColumn::OrganizationId)
            .col(SupplierColumn::Reference)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_products_org_reference")
            .table(Product)
            .col(ProductColumn::OrganizationId)
            .col(ProductColumn::Reference)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_product_categories_org_name")
            .table(ProductCategory)
            .col(ProductCategoryColumn::OrganizationId)
            .col(ProductCategoryColumn::Name)
            .unique()
            .if_not_exists()
            .to_owned(),
    ]
}

/// Creates all necessary database tables using `SeaORM`'s schema generation from entity definitions.
///
/// Safe to call on every startup: statements use `IF NOT EXISTS`.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    // Parents before children so foreign keys resolve
    create_table(db, &schema, User).await?;
    create_table(db, &schema, Session).await?;
    create_table(db, &schema, Organization).await?;
    create_table(db, &schema, Member).await?;
    create_table(db, &schema, Invitation).await?;
    create_table(db, &schema, Client).await?;
    create_table(db, &schema, Supplier).await?;
    create_table(db, &schema, Contact).await?;
    create_table(db, &schema, Address).await?;
    create_table(db, &schema, ProductCategory).await?;
    create_table(db, &schema, Product).await?;
    create_table(db, &schema, FiscalYear).await?;

    for index in unique_indexes() {
        db.execute(builder.build(&index)).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{ClientModel, FiscalYearModel, MemberModel, ProductModel};
    use sea_orm::QuerySelect;

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Test that tables exist by querying them
        let _: Vec<MemberModel> = Member::find().limit(1).all(&db).await?;
        let _: Vec<ClientModel> = Client::find().limit(1).all(&db).await?;
        let _: Vec<ProductModel> = Product::find().limit(1).all(&db).await?;
        let _: Vec<FiscalYearModel> = FiscalYear::find().limit(1).all(&db).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_idempotent() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_connect_with_retry_succeeds() -> Result<()> {
        let db = connect_with_retry("sqlite::memory:", 3).await?;
        check_connection(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_connect_with_retry_gives_up() {
        let result = connect_with_retry("notadb://nowhere", 2).await;
        assert!(matches!(result, Err(Error::Database(_))));
    }

    #[test]
    fn test_ensure_sqlite_parent_dir_ignores_memory() -> Result<()> {
        ensure_sqlite_parent_dir("sqlite::memory:")?;
        Ok(())
    }
}

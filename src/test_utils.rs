//! Shared test utilities for Factly.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    core::{
        address::{self, AddressForm},
        auth,
        client::{self, ClientForm},
        contact::{self, ContactForm, Owner},
        organization::{self, OrganizationForm},
        product::{self, ProductForm},
        supplier::{self, SupplierForm},
    },
    entities::{
        enums::{AddressType, ClientType, MemberRole, ProductUnit, SupplierType, VatRate},
        member, organization as organization_entity, user,
    },
    errors::Result,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates (or finds) a user named "Test User" with the given email.
pub async fn create_test_user(db: &DatabaseConnection, email: &str) -> Result<user::Model> {
    auth::ensure_user(db, email, "Test User").await
}

/// Creates an organization owned by `user_id`; the slug is derived from `name`.
pub async fn create_test_organization(
    db: &DatabaseConnection,
    user_id: i64,
    name: &str,
) -> Result<organization_entity::Model> {
    organization::create_organization(
        db,
        user_id,
        &OrganizationForm {
            name: name.to_string(),
            ..Default::default()
        },
    )
    .await
}

/// Sets up a test database with an owner and their organization.
/// This is a common pattern in tests that need a tenant to work in.
///
/// # Returns
/// A tuple of (database connection, owner, organization)
pub async fn setup_with_organization()
-> Result<(DatabaseConnection, user::Model, organization_entity::Model)> {
    let db = setup_test_db().await?;
    let owner = create_test_user(&db, "owner@example.com").await?;
    let org = create_test_organization(&db, owner.id, "Acme Corp").await?;
    Ok((db, owner, org))
}

/// Adds `user_id` to the organization with `role`, bypassing invitations.
pub async fn add_test_member(
    db: &DatabaseConnection,
    organization_id: i64,
    user_id: i64,
    role: MemberRole,
) -> Result<member::Model> {
    member::ActiveModel {
        organization_id: Set(organization_id),
        user_id: Set(user_id),
        role: Set(role),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// A company client form; an empty `reference` lets the server generate one.
pub fn client_form(reference: &str, name: &str) -> ClientForm {
    ClientForm {
        reference: Some(reference.to_string()),
        name: name.to_string(),
        client_type: ClientType::Company,
        status: None,
        email: None,
        phone: None,
        website: None,
        siret: None,
        vat_number: None,
        notes: None,
    }
}

/// Creates a client named after its reference.
pub async fn create_test_client(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    reference: &str,
) -> Result<crate::entities::client::Model> {
    create_test_client_named(db, user_id, organization_id, reference, &format!("Client {reference}"))
        .await
}

/// Creates a client with an explicit name.
pub async fn create_test_client_named(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    reference: &str,
    name: &str,
) -> Result<crate::entities::client::Model> {
    client::create_client(db, user_id, organization_id, &client_form(reference, name)).await
}

/// A supplier form with the default type.
pub fn supplier_form(reference: &str, name: &str) -> SupplierForm {
    SupplierForm {
        reference: Some(reference.to_string()),
        name: name.to_string(),
        supplier_type: SupplierType::Other,
        status: None,
        email: None,
        phone: None,
        website: None,
        siret: None,
        vat_number: None,
        notes: None,
    }
}

/// Creates a supplier named after its reference.
pub async fn create_test_supplier(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    reference: &str,
) -> Result<crate::entities::supplier::Model> {
    supplier::create_supplier(
        db,
        user_id,
        organization_id,
        &supplier_form(reference, &format!("Supplier {reference}")),
    )
    .await
}

fn contact_form() -> ContactForm {
    ContactForm {
        first_name: "Jane".to_string(),
        last_name: "Doe".to_string(),
        email: Some("jane@example.com".to_string()),
        phone: None,
        position: None,
        is_primary: false,
    }
}

/// Adds a "Jane Doe" contact to a client.
pub async fn create_test_client_contact(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    client_id: i64,
) -> Result<crate::entities::contact::Model> {
    contact::create_contact(db, user_id, organization_id, Owner::Client(client_id), &contact_form())
        .await
}

/// Adds a "Jane Doe" contact to a supplier.
pub async fn create_test_supplier_contact(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    supplier_id: i64,
) -> Result<crate::entities::contact::Model> {
    contact::create_contact(
        db,
        user_id,
        organization_id,
        Owner::Supplier(supplier_id),
        &contact_form(),
    )
    .await
}

/// Adds a Paris billing address to a client.
pub async fn create_test_client_address(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    client_id: i64,
) -> Result<crate::entities::address::Model> {
    address::create_address(
        db,
        user_id,
        organization_id,
        Owner::Client(client_id),
        &AddressForm {
            address_type: AddressType::Billing,
            line1: "10 rue de Rivoli".to_string(),
            line2: None,
            postal_code: "75004".to_string(),
            city: "Paris".to_string(),
            country: "FR".to_string(),
            is_default: false,
        },
    )
    .await
}

/// An uncategorized product form at the standard VAT rate.
pub fn product_form(reference: &str, name: &str, price: f64) -> ProductForm {
    ProductForm {
        category_id: None,
        reference: reference.to_string(),
        name: name.to_string(),
        description: None,
        price,
        vat_rate: VatRate::Standard,
        unit: ProductUnit::Unit,
    }
}

/// Creates a 10.00 product named after its reference.
pub async fn create_test_product(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    reference: &str,
) -> Result<crate::entities::product::Model> {
    product::create_product(
        db,
        user_id,
        organization_id,
        &product_form(reference, &format!("Product {reference}"), 10.0),
    )
    .await
}

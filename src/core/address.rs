//! Address business logic - postal addresses of clients and suppliers.
//!
//! Each owner has at most one default address per [`AddressType`]; the first
//! address of a type becomes its default.

use crate::{
    core::{auth, contact::Owner, validation},
    entities::{Address, AddressColumn, address, enums::AddressType},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Select, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::Deserialize;
use tracing::info;

/// Submitted address fields.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressForm {
    pub address_type: AddressType,
    pub line1: String,
    pub line2: Option<String>,
    pub postal_code: String,
    pub city: String,
    /// Two-letter country code, `FR` when omitted
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default)]
    pub is_default: bool,
}

fn default_country() -> String {
    "FR".to_string()
}

fn owner_filter(select: Select<Address>, owner: Owner) -> Select<Address> {
    match owner {
        Owner::Client(id) => select.filter(AddressColumn::ClientId.eq(id)),
        Owner::Supplier(id) => select.filter(AddressColumn::SupplierId.eq(id)),
    }
}

fn owner_of(address: &address::Model) -> Result<Owner> {
    match (address.client_id, address.supplier_id) {
        (Some(id), None) => Ok(Owner::Client(id)),
        (None, Some(id)) => Ok(Owner::Supplier(id)),
        _ => Err(Error::conflict(format!(
            "address {} must belong to exactly one client or supplier",
            address.id
        ))),
    }
}

fn apply_form(active: &mut address::ActiveModel, form: &AddressForm) -> Result<()> {
    active.address_type = Set(form.address_type);
    active.line1 = Set(validation::required("line1", &form.line1, 200)?);
    active.line2 = Set(validation::optional("line2", form.line2.as_deref(), 200)?);
    active.postal_code = Set(validation::postal_code("postal_code", &form.postal_code)?);
    active.city = Set(validation::required("city", &form.city, 120)?);
    active.country = Set(validation::country("country", &form.country)?);
    Ok(())
}

async fn clear_default<C: ConnectionTrait>(
    db: &C,
    owner: Owner,
    address_type: AddressType,
    except: Option<i64>,
) -> Result<()> {
    let mut update = Address::update_many()
        .col_expr(AddressColumn::IsDefault, Expr::value(false))
        .filter(AddressColumn::IsDefault.eq(true))
        .filter(AddressColumn::AddressType.eq(address_type));
    update = match owner {
        Owner::Client(id) => update.filter(AddressColumn::ClientId.eq(id)),
        Owner::Supplier(id) => update.filter(AddressColumn::SupplierId.eq(id)),
    };
    if let Some(id) = except {
        update = update.filter(AddressColumn::Id.ne(id));
    }
    update.exec(db).await?;
    Ok(())
}

async fn has_type<C: ConnectionTrait>(db: &C, owner: Owner, address_type: AddressType) -> Result<bool> {
    let count = owner_filter(Address::find(), owner)
        .filter(AddressColumn::AddressType.eq(address_type))
        .count(db)
        .await?;
    Ok(count > 0)
}

async fn find_in_org<C: ConnectionTrait>(
    db: &C,
    organization_id: i64,
    address_id: i64,
) -> Result<address::Model> {
    Address::find_by_id(address_id)
        .filter(AddressColumn::OrganizationId.eq(organization_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("address", address_id))
}

/// Adds an address to a client or supplier.
pub async fn create_address(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    owner: Owner,
    form: &AddressForm,
) -> Result<address::Model> {
    let mut active = <address::ActiveModel as Default>::default();
    apply_form(&mut active, form)?;
    auth::require_membership(db, user_id, organization_id).await?;

    let txn = db.begin().await?;
    owner.ensure_in(&txn, organization_id).await?;
    let is_default = form.is_default || !has_type(&txn, owner, form.address_type).await?;
    if is_default {
        clear_default(&txn, owner, form.address_type, None).await?;
    }

    let now = Utc::now();
    active.organization_id = Set(organization_id);
    active.client_id = Set(owner.client_id());
    active.supplier_id = Set(owner.supplier_id());
    active.is_default = Set(is_default);
    active.created_at = Set(now);
    active.updated_at = Set(now);
    let created = active.insert(&txn).await?;
    txn.commit().await?;

    info!("address {} added to {owner:?}", created.id);
    Ok(created)
}

/// Addresses of one owner grouped by type, defaults first.
pub async fn list_addresses(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    owner: Owner,
) -> Result<Vec<address::Model>> {
    auth::require_membership(db, user_id, organization_id).await?;
    owner.ensure_in(db, organization_id).await?;

    owner_filter(Address::find(), owner)
        .order_by_asc(AddressColumn::AddressType)
        .order_by_desc(AddressColumn::IsDefault)
        .order_by_asc(AddressColumn::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

pub async fn get_address(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    address_id: i64,
) -> Result<address::Model> {
    auth::require_membership(db, user_id, organization_id).await?;
    find_in_org(db, organization_id, address_id).await
}

/// Updates an address. Changing its type drops the default flag unless the
/// new type has no address yet or `is_default` is requested.
pub async fn update_address(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    address_id: i64,
    form: &AddressForm,
) -> Result<address::Model> {
    apply_form(&mut <address::ActiveModel as Default>::default(), form)?;
    auth::require_membership(db, user_id, organization_id).await?;

    let txn = db.begin().await?;
    let current = find_in_org(&txn, organization_id, address_id).await?;
    let owner = owner_of(&current)?;
    let type_changed = current.address_type != form.address_type;

    let is_default = if form.is_default {
        true
    } else if type_changed {
        !has_type(&txn, owner, form.address_type).await?
    } else {
        current.is_default
    };
    if is_default {
        clear_default(&txn, owner, form.address_type, Some(address_id)).await?;
    }

    let mut active: address::ActiveModel = current.into();
    apply_form(&mut active, form)?;
    active.is_default = Set(is_default);
    active.updated_at = Set(Utc::now());
    let updated = active.update(&txn).await?;
    txn.commit().await?;
    Ok(updated)
}

/// Makes `address_id` the default of its type for its owner.
pub async fn set_default_address(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    address_id: i64,
) -> Result<address::Model> {
    auth::require_membership(db, user_id, organization_id).await?;

    let txn = db.begin().await?;
    let current = find_in_org(&txn, organization_id, address_id).await?;
    let owner = owner_of(&current)?;
    clear_default(&txn, owner, current.address_type, Some(address_id)).await?;

    let mut active: address::ActiveModel = current.into();
    active.is_default = Set(true);
    active.updated_at = Set(Utc::now());
    let updated = active.update(&txn).await?;
    txn.commit().await?;
    Ok(updated)
}

pub async fn delete_address(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    address_id: i64,
) -> Result<()> {
    auth::require_membership(db, user_id, organization_id).await?;
    let current = find_in_org(db, organization_id, address_id).await?;
    current.delete(db).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    fn form(address_type: AddressType, city: &str, is_default: bool) -> AddressForm {
        AddressForm {
            address_type,
            line1: "1 rue de la Paix".to_string(),
            line2: None,
            postal_code: "75002".to_string(),
            city: city.to_string(),
            country: "fr".to_string(),
            is_default,
        }
    }

    #[tokio::test]
    async fn test_create_address_validation() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;
        let client = create_test_client(&db, owner.id, org.id, "CLI-1").await?;

        let mut bad = form(AddressType::Billing, "Paris", false);
        bad.country = "France".to_string();
        let result = create_address(&db, owner.id, org.id, Owner::Client(client.id), &bad).await;
        assert!(matches!(result, Err(Error::Validation { ref field, .. }) if field == "country"));

        let created = create_address(
            &db,
            owner.id,
            org.id,
            Owner::Client(client.id),
            &form(AddressType::Billing, "Paris", false),
        )
        .await?;
        assert_eq!(created.country, "FR");
        assert!(created.is_default);
        Ok(())
    }

    #[tokio::test]
    async fn test_one_default_per_type() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;
        let client = create_test_client(&db, owner.id, org.id, "CLI-1").await?;
        let who = Owner::Client(client.id);

        let paris = create_address(&db, owner.id, org.id, who, &form(AddressType::Billing, "Paris", false)).await?;
        let lyon = create_address(&db, owner.id, org.id, who, &form(AddressType::Billing, "Lyon", false)).await?;
        let depot =
            create_address(&db, owner.id, org.id, who, &form(AddressType::Shipping, "Lille", false)).await?;
        assert!(paris.is_default);
        assert!(!lyon.is_default);
        // First of its type
        assert!(depot.is_default);

        set_default_address(&db, owner.id, org.id, lyon.id).await?;
        assert!(!get_address(&db, owner.id, org.id, paris.id).await?.is_default);
        assert!(get_address(&db, owner.id, org.id, depot.id).await?.is_default);

        let all = list_addresses(&db, owner.id, org.id, who).await?;
        let defaults = all.iter().filter(|a| a.is_default).count();
        assert_eq!(all.len(), 3);
        assert_eq!(defaults, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_address_type_change() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;
        let supplier = create_test_supplier(&db, owner.id, org.id, "FRN-1").await?;
        let who = Owner::Supplier(supplier.id);

        create_address(&db, owner.id, org.id, who, &form(AddressType::Billing, "Paris", false)).await?;
        let second =
            create_address(&db, owner.id, org.id, who, &form(AddressType::Billing, "Lyon", false)).await?;

        let moved =
            update_address(&db, owner.id, org.id, second.id, &form(AddressType::Headquarters, "Lyon", false))
                .await?;
        assert_eq!(moved.address_type, AddressType::Headquarters);
        assert!(moved.is_default);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_address_scoped_to_org() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;
        let other = create_test_organization(&db, owner.id, "Other Org").await?;
        let client = create_test_client(&db, owner.id, other.id, "CLI-1").await?;
        let address = create_address(
            &db,
            owner.id,
            other.id,
            Owner::Client(client.id),
            &form(AddressType::Billing, "Paris", false),
        )
        .await?;

        let result = delete_address(&db, owner.id, org.id, address.id).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
        delete_address(&db, owner.id, other.id, address.id).await?;
        Ok(())
    }
}

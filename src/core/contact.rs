//! Contact business logic - people working for a client or a supplier.

use crate::{
    core::{auth, client, supplier, validation},
    entities::{Contact, ContactColumn, contact},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Select, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::Deserialize;
use tracing::info;

/// The record a contact or an address hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Client(i64),
    Supplier(i64),
}

impl Owner {
    /// Fails with `NotFound` unless the owner lives in `organization_id`.
    pub(crate) async fn ensure_in<C: ConnectionTrait>(self, db: &C, organization_id: i64) -> Result<()> {
        match self {
            Self::Client(id) => client::ensure_exists(db, organization_id, id).await,
            Self::Supplier(id) => supplier::ensure_exists(db, organization_id, id).await,
        }
    }

    pub(crate) const fn client_id(self) -> Option<i64> {
        match self {
            Self::Client(id) => Some(id),
            Self::Supplier(_) => None,
        }
    }

    pub(crate) const fn supplier_id(self) -> Option<i64> {
        match self {
            Self::Supplier(id) => Some(id),
            Self::Client(_) => None,
        }
    }
}

/// Submitted contact fields.
#[derive(Debug, Clone, Deserialize)]
pub struct ContactForm {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub position: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
}

fn owner_filter(select: Select<Contact>, owner: Owner) -> Select<Contact> {
    match owner {
        Owner::Client(id) => select.filter(ContactColumn::ClientId.eq(id)),
        Owner::Supplier(id) => select.filter(ContactColumn::SupplierId.eq(id)),
    }
}

fn owner_of(contact: &contact::Model) -> Result<Owner> {
    match (contact.client_id, contact.supplier_id) {
        (Some(id), None) => Ok(Owner::Client(id)),
        (None, Some(id)) => Ok(Owner::Supplier(id)),
        _ => Err(Error::conflict(format!(
            "contact {} must belong to exactly one client or supplier",
            contact.id
        ))),
    }
}

fn apply_form(active: &mut contact::ActiveModel, form: &ContactForm) -> Result<()> {
    active.first_name = Set(validation::required("first_name", &form.first_name, 80)?);
    active.last_name = Set(validation::required("last_name", &form.last_name, 80)?);
    active.email = Set(validation::optional_email("email", form.email.as_deref())?);
    active.phone = Set(validation::optional("phone", form.phone.as_deref(), 32)?);
    active.position = Set(validation::optional("position", form.position.as_deref(), 120)?);
    active.is_primary = Set(form.is_primary);
    Ok(())
}

async fn clear_primary<C: ConnectionTrait>(db: &C, owner: Owner, except: Option<i64>) -> Result<()> {
    let mut update = Contact::update_many()
        .col_expr(ContactColumn::IsPrimary, Expr::value(false))
        .filter(ContactColumn::IsPrimary.eq(true));
    update = match owner {
        Owner::Client(id) => update.filter(ContactColumn::ClientId.eq(id)),
        Owner::Supplier(id) => update.filter(ContactColumn::SupplierId.eq(id)),
    };
    if let Some(id) = except {
        update = update.filter(ContactColumn::Id.ne(id));
    }
    update.exec(db).await?;
    Ok(())
}

async fn find_in_org<C: ConnectionTrait>(
    db: &C,
    organization_id: i64,
    contact_id: i64,
) -> Result<contact::Model> {
    Contact::find_by_id(contact_id)
        .filter(ContactColumn::OrganizationId.eq(organization_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("contact", contact_id))
}

/// Adds a contact to a client or supplier. The first contact of an owner
/// becomes its primary contact.
pub async fn create_contact(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    owner: Owner,
    form: &ContactForm,
) -> Result<contact::Model> {
    let mut active = <contact::ActiveModel as Default>::default();
    apply_form(&mut active, form)?;
    auth::require_membership(db, user_id, organization_id).await?;

    let txn = db.begin().await?;
    owner.ensure_in(&txn, organization_id).await?;
    let existing = owner_filter(Contact::find(), owner).count(&txn).await?;
    let is_primary = form.is_primary || existing == 0;
    if is_primary {
        clear_primary(&txn, owner, None).await?;
    }

    let now = Utc::now();
    active.organization_id = Set(organization_id);
    active.client_id = Set(owner.client_id());
    active.supplier_id = Set(owner.supplier_id());
    active.is_primary = Set(is_primary);
    active.created_at = Set(now);
    active.updated_at = Set(now);
    let created = active.insert(&txn).await?;
    txn.commit().await?;

    info!("contact {} added to {owner:?}", created.id);
    Ok(created)
}

/// Contacts of one owner, primary first.
pub async fn list_contacts(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    owner: Owner,
) -> Result<Vec<contact::Model>> {
    auth::require_membership(db, user_id, organization_id).await?;
    owner.ensure_in(db, organization_id).await?;

    owner_filter(Contact::find(), owner)
        .order_by_desc(ContactColumn::IsPrimary)
        .order_by_asc(ContactColumn::LastName)
        .order_by_asc(ContactColumn::FirstName)
        .all(db)
        .await
        .map_err(Into::into)
}

/// A single contact of the organization; `NotFound` for contacts of another organization.
pub async fn get_contact(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    contact_id: i64,
) -> Result<contact::Model> {
    auth::require_membership(db, user_id, organization_id).await?;
    find_in_org(db, organization_id, contact_id).await
}

/// Updates a contact. Checking `is_primary` demotes the owner's previous
/// primary contact; unchecking it on the primary contact is ignored.
pub async fn update_contact(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    contact_id: i64,
    form: &ContactForm,
) -> Result<contact::Model> {
    apply_form(&mut <contact::ActiveModel as Default>::default(), form)?;
    auth::require_membership(db, user_id, organization_id).await?;

    let txn = db.begin().await?;
    let current = find_in_org(&txn, organization_id, contact_id).await?;
    let owner = owner_of(&current)?;
    let is_primary = current.is_primary || form.is_primary;
    if form.is_primary && !current.is_primary {
        clear_primary(&txn, owner, Some(contact_id)).await?;
    }

    let mut active: contact::ActiveModel = current.into();
    apply_form(&mut active, form)?;
    active.is_primary = Set(is_primary);
    active.updated_at = Set(Utc::now());
    let updated = active.update(&txn).await?;
    txn.commit().await?;
    Ok(updated)
}

/// Makes `contact_id` the only primary contact of its owner.
pub async fn set_primary_contact(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    contact_id: i64,
) -> Result<contact::Model> {
    auth::require_membership(db, user_id, organization_id).await?;

    let txn = db.begin().await?;
    let current = find_in_org(&txn, organization_id, contact_id).await?;
    let owner = owner_of(&current)?;
    clear_primary(&txn, owner, Some(contact_id)).await?;

    let mut active: contact::ActiveModel = current.into();
    active.is_primary = Set(true);
    active.updated_at = Set(Utc::now());
    let updated = active.update(&txn).await?;
    txn.commit().await?;
    Ok(updated)
}

/// Deletes a contact. When the primary contact goes, the oldest remaining
/// contact of the owner is promoted.
pub async fn delete_contact(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    contact_id: i64,
) -> Result<()> {
    auth::require_membership(db, user_id, organization_id).await?;

    let txn = db.begin().await?;
    let current = find_in_org(&txn, organization_id, contact_id).await?;
    let owner = owner_of(&current)?;
    let was_primary = current.is_primary;
    current.delete(&txn).await?;

    if was_primary {
        let successor = owner_filter(Contact::find(), owner)
            .order_by_asc(ContactColumn::CreatedAt)
            .order_by_asc(ContactColumn::Id)
            .one(&txn)
            .await?;
        if let Some(successor) = successor {
            let mut active: contact::ActiveModel = successor.into();
            active.is_primary = Set(true);
            active.update(&txn).await?;
        }
    }
    txn.commit().await?;
    Ok(())
}

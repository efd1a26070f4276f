//! Organization business logic - tenant creation, settings and overview.
//!
//! Creating an organization also makes the creator its first `OWNER`. Deleting one
//! removes every row scoped to it.

use crate::{
    core::{auth, fiscal_year, validation},
    entities::{
        Address, AddressColumn, Client, ClientColumn, Contact, ContactColumn, FiscalYear,
        FiscalYearColumn, Invitation, InvitationColumn, Member, MemberColumn, Organization,
        OrganizationColumn, Product, ProductCategory, ProductCategoryColumn, ProductColumn,
        Supplier, SupplierColumn,
        enums::{InvitationStatus, MemberRole},
        fiscal_year as fiscal_year_entity, member, organization,
    },
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Submitted organization settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrganizationForm {
    pub name: String,
    /// Derived from the name on creation when omitted; kept on update
    pub slug: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    /// URL returned by the upload service
    pub logo_url: Option<String>,
}

struct ValidOrganization {
    name: String,
    /// Only set when the form carries one
    slug: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    website: Option<String>,
    logo_url: Option<String>,
}

fn validate(form: &OrganizationForm) -> Result<ValidOrganization> {
    let name = validation::required("name", &form.name, 120)?;
    let slug = match form.slug.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => Some(validation::slug("slug", s)?),
        _ => None,
    };
    Ok(ValidOrganization {
        slug,
        name,
        email: validation::optional_email("email", form.email.as_deref())?,
        phone: validation::optional("phone", form.phone.as_deref(), 32)?,
        website: validation::optional("website", form.website.as_deref(), 255)?,
        logo_url: validation::optional("logo_url", form.logo_url.as_deref(), 512)?,
    })
}

/// Slug derived from the name, or `org-xxxxxxxx` when the name has too few
/// ASCII letters and digits to make one.
fn derived_slug(name: &str) -> String {
    let slug = validation::slugify(name);
    if slug.len() >= 3 {
        return slug;
    }
    let suffix = Uuid::new_v4().simple().to_string();
    format!("org-{}", &suffix[..8])
}

async fn ensure_slug_available<C: ConnectionTrait>(
    db: &C,
    slug: &str,
    exclude_id: Option<i64>,
) -> Result<()> {
    let mut query = Organization::find().filter(OrganizationColumn::Slug.eq(slug));
    if let Some(id) = exclude_id {
        query = query.filter(OrganizationColumn::Id.ne(id));
    }
    if query.one(db).await?.is_some() {
        return Err(Error::conflict(format!("the slug '{slug}' is already taken")));
    }
    Ok(())
}

/// An organization together with the caller's role in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrganizationWithRole {
    #[serde(flatten)]
    pub organization: organization::Model,
    pub role: MemberRole,
}

/// Creates an organization and registers `user_id` as its owner.
pub async fn create_organization(
    db: &DatabaseConnection,
    user_id: i64,
    form: &OrganizationForm,
) -> Result<organization::Model> {
    let valid = validate(form)?;
    let slug = valid.slug.unwrap_or_else(|| derived_slug(&valid.name));

    let txn = db.begin().await?;
    ensure_slug_available(&txn, &slug, None).await?;

    let now = Utc::now();
    let organization = organization::ActiveModel {
        name: Set(valid.name),
        slug: Set(slug),
        email: Set(valid.email),
        phone: Set(valid.phone),
        website: Set(valid.website),
        logo_url: Set(valid.logo_url),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    member::ActiveModel {
        organization_id: Set(organization.id),
        user_id: Set(user_id),
        role: Set(MemberRole::Owner),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    info!("organization {} created by user {user_id}", organization.slug);
    Ok(organization)
}

/// Organizations the user belongs to, alphabetically.
pub async fn list_organizations_for_user(
    db: &DatabaseConnection,
    user_id: i64,
) -> Result<Vec<OrganizationWithRole>> {
    let rows = Member::find()
        .filter(MemberColumn::UserId.eq(user_id))
        .find_also_related(Organization)
        .order_by_asc(OrganizationColumn::Name)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(member, organization)| {
            organization.map(|organization| OrganizationWithRole {
                organization,
                role: member.role,
            })
        })
        .collect())
}

/// Returns the organization if the user is a member.
pub async fn get_organization(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
) -> Result<organization::Model> {
    auth::require_membership(db, user_id, organization_id).await?;
    Organization::find_by_id(organization_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("organization", organization_id))
}

/// Updates settings; requires `ADMIN`. An omitted slug keeps the current one.
pub async fn update_organization(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    form: &OrganizationForm,
) -> Result<organization::Model> {
    let valid = validate(form)?;
    auth::require_member_role(db, user_id, organization_id, MemberRole::Admin).await?;
    if let Some(slug) = &valid.slug {
        ensure_slug_available(db, slug, Some(organization_id)).await?;
    }

    let mut organization: organization::ActiveModel = Organization::find_by_id(organization_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("organization", organization_id))?
        .into();

    organization.name = Set(valid.name);
    if let Some(slug) = valid.slug {
        organization.slug = Set(slug);
    }
    organization.email = Set(valid.email);
    organization.phone = Set(valid.phone);
    organization.website = Set(valid.website);
    organization.logo_url = Set(valid.logo_url);
    organization.updated_at = Set(Utc::now());

    organization.update(db).await.map_err(Into::into)
}

/// Deletes the organization and all of its data; requires `OWNER`.
pub async fn delete_organization(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
) -> Result<()> {
    auth::require_member_role(db, user_id, organization_id, MemberRole::Owner).await?;

    let txn = db.begin().await?;
    // Children first so the statements succeed whether or not FK cascades are on
    Contact::delete_many()
        .filter(ContactColumn::OrganizationId.eq(organization_id))
        .exec(&txn)
        .await?;
    Address::delete_many()
        .filter(AddressColumn::OrganizationId.eq(organization_id))
        .exec(&txn)
        .await?;
    Product::delete_many()
        .filter(ProductColumn::OrganizationId.eq(organization_id))
        .exec(&txn)
        .await?;
    ProductCategory::delete_many()
        .filter(ProductCategoryColumn::OrganizationId.eq(organization_id))
        .exec(&txn)
        .await?;
    Client::delete_many()
        .filter(ClientColumn::OrganizationId.eq(organization_id))
        .exec(&txn)
        .await?;
    Supplier::delete_many()
        .filter(SupplierColumn::OrganizationId.eq(organization_id))
        .exec(&txn)
        .await?;
    FiscalYear::delete_many()
        .filter(FiscalYearColumn::OrganizationId.eq(organization_id))
        .exec(&txn)
        .await?;
    Invitation::delete_many()
        .filter(InvitationColumn::OrganizationId.eq(organization_id))
        .exec(&txn)
        .await?;
    Member::delete_many()
        .filter(MemberColumn::OrganizationId.eq(organization_id))
        .exec(&txn)
        .await?;
    Organization::delete_by_id(organization_id).exec(&txn).await?;
    txn.commit().await?;

    info!("organization {organization_id} deleted by user {user_id}");
    Ok(())
}

/// Dashboard counters for an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrganizationOverview {
    pub clients: u64,
    pub suppliers: u64,
    /// Products that are not archived
    pub products: u64,
    pub members: u64,
    pub pending_invitations: u64,
    /// Fiscal year covering today, if any
    pub current_fiscal_year: Option<fiscal_year_entity::Model>,
}

/// Counts rows per collection for the dashboard.
pub async fn organization_overview(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
) -> Result<OrganizationOverview> {
    auth::require_membership(db, user_id, organization_id).await?;

    let clients = Client::find()
        .filter(ClientColumn::OrganizationId.eq(organization_id))
        .count(db)
        .await?;
    let suppliers = Supplier::find()
        .filter(SupplierColumn::OrganizationId.eq(organization_id))
        .count(db)
        .await?;
    let products = Product::find()
        .filter(ProductColumn::OrganizationId.eq(organization_id))
        .filter(ProductColumn::IsArchived.eq(false))
        .count(db)
        .await?;
    let members = Member::find()
        .filter(MemberColumn::OrganizationId.eq(organization_id))
        .count(db)
        .await?;
    let pending_invitations = Invitation::find()
        .filter(InvitationColumn::OrganizationId.eq(organization_id))
        .filter(InvitationColumn::Status.eq(InvitationStatus::Pending))
        .count(db)
        .await?;
    let current_fiscal_year =
        fiscal_year::find_covering(db, organization_id, Utc::now().date_naive()).await?;

    Ok(OrganizationOverview {
        clients,
        suppliers,
        products,
        members,
        pending_invitations,
        current_fiscal_year,
    })
}

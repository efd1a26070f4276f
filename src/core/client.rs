//! Client business logic - Handles all client-related operations.
//!
//! Every action checks the caller's membership before touching rows, and every
//! query is scoped by `organization_id`, so a client id from another organization
//! behaves exactly like a missing one. References are unique per organization;
//! when none is submitted the next `CLI-0001`-style code is assigned.

use crate::{
    core::{
        auth,
        pagination::{self, Page, PageRequest},
        transitions, validation,
    },
    entities::{
        Address, AddressColumn, Client, ClientColumn, Contact, ContactColumn, client,
        enums::{ClientStatus, ClientType},
    },
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{Condition, QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use serde::Deserialize;
use tracing::info;

/// Prefix of generated client references.
pub const REFERENCE_PREFIX: &str = "CLI";

/// Submitted client fields.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientForm {
    /// Generated when omitted on creation
    pub reference: Option<String>,
    pub name: String,
    #[serde(default = "default_client_type")]
    pub client_type: ClientType,
    /// Initial status on creation (defaults to `LEAD`); ignored on update
    pub status: Option<ClientStatus>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub siret: Option<String>,
    pub vat_number: Option<String>,
    pub notes: Option<String>,
}

const fn default_client_type() -> ClientType {
    ClientType::Company
}

/// Filters for [`list_clients`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientQuery {
    /// Matches name, reference or email
    pub search: Option<String>,
    pub status: Option<ClientStatus>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

struct ValidClient {
    reference: Option<String>,
    name: String,
    email: Option<String>,
    phone: Option<String>,
    website: Option<String>,
    siret: Option<String>,
    vat_number: Option<String>,
    notes: Option<String>,
}

fn validate(form: &ClientForm) -> Result<ValidClient> {
    let reference = match form.reference.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(r) => Some(validation::reference("reference", r)?),
    };
    Ok(ValidClient {
        reference,
        name: validation::required("name", &form.name, 160)?,
        email: validation::optional_email("email", form.email.as_deref())?,
        phone: validation::optional("phone", form.phone.as_deref(), 32)?,
        website: validation::optional("website", form.website.as_deref(), 255)?,
        siret: validation::optional_siret("siret", form.siret.as_deref())?,
        vat_number: validation::optional("vat_number", form.vat_number.as_deref(), 20)?
            .map(|v| v.to_uppercase()),
        notes: validation::optional("notes", form.notes.as_deref(), 4000)?,
    })
}

/// Computes `PREFIX-NNNN` one above the highest numeric suffix already used.
///
/// # Errors
/// `Conflict` when the highest suffix is already `u64::MAX`.
pub(crate) fn next_reference_from<'a>(
    prefix: &str,
    existing: impl IntoIterator<Item = &'a str>,
) -> Result<String> {
    let marker = format!("{prefix}-");
    let highest = existing
        .into_iter()
        .filter_map(|r| r.strip_prefix(&marker))
        .filter_map(|n| n.parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    let next = highest.checked_add(1).ok_or_else(|| {
        Error::conflict(format!(
            "no {marker} reference can follow {marker}{highest}; enter one manually"
        ))
    })?;
    Ok(format!("{marker}{next:04}"))
}

async fn ensure_reference_available<C: ConnectionTrait>(
    db: &C,
    organization_id: i64,
    reference: &str,
    exclude_id: Option<i64>,
) -> Result<()> {
    let mut query = Client::find()
        .filter(ClientColumn::OrganizationId.eq(organization_id))
        .filter(ClientColumn::Reference.eq(reference));
    if let Some(id) = exclude_id {
        query = query.filter(ClientColumn::Id.ne(id));
    }
    if query.one(db).await?.is_some() {
        return Err(Error::conflict(format!(
            "a client with reference '{reference}' already exists"
        )));
    }
    Ok(())
}

async fn find_in_org<C: ConnectionTrait>(
    db: &C,
    organization_id: i64,
    client_id: i64,
) -> Result<client::Model> {
    Client::find_by_id(client_id)
        .filter(ClientColumn::OrganizationId.eq(organization_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("client", client_id))
}

/// Verifies that `client_id` exists in the organization, without permission checks.
pub(crate) async fn ensure_exists<C: ConnectionTrait>(
    db: &C,
    organization_id: i64,
    client_id: i64,
) -> Result<()> {
    find_in_org(db, organization_id, client_id).await.map(|_| ())
}

async fn next_reference_in<C: ConnectionTrait>(db: &C, organization_id: i64) -> Result<String> {
    let references: Vec<String> = Client::find()
        .select_only()
        .column(ClientColumn::Reference)
        .filter(ClientColumn::OrganizationId.eq(organization_id))
        .filter(ClientColumn::Reference.starts_with(format!("{REFERENCE_PREFIX}-")))
        .into_tuple()
        .all(db)
        .await?;
    next_reference_from(REFERENCE_PREFIX, references.iter().map(String::as_str))
}

/// Suggests the next free client reference.
pub async fn next_client_reference(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
) -> Result<String> {
    auth::require_membership(db, user_id, organization_id).await?;
    next_reference_in(db, organization_id).await
}

/// Creates a client in the organization.
///
/// # Errors
/// - `Validation` if a field is malformed or the initial status is `INACTIVE`/`ARCHIVED`
/// - `Forbidden` if the user is not a member
/// - `Conflict` if the reference is already used in the organization
pub async fn create_client(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    form: &ClientForm,
) -> Result<client::Model> {
    let valid = validate(form)?;
    let status = form.status.unwrap_or(ClientStatus::Lead);
    if matches!(status, ClientStatus::Inactive | ClientStatus::Archived) {
        return Err(Error::validation(
            "status",
            "a new client must start as LEAD, PROSPECT or ACTIVE",
        ));
    }
    auth::require_membership(db, user_id, organization_id).await?;

    let txn = db.begin().await?;
    let reference = match valid.reference {
        Some(reference) => {
            ensure_reference_available(&txn, organization_id, &reference, None).await?;
            reference
        }
        None => next_reference_in(&txn, organization_id).await?,
    };

    let now = Utc::now();
    let created = client::ActiveModel {
        organization_id: Set(organization_id),
        reference: Set(reference),
        name: Set(valid.name),
        client_type: Set(form.client_type),
        status: Set(status),
        email: Set(valid.email),
        phone: Set(valid.phone),
        website: Set(valid.website),
        siret: Set(valid.siret),
        vat_number: Set(valid.vat_number),
        notes: Set(valid.notes),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    info!(
        "client {} ({}) created in organization {organization_id}",
        created.reference, created.id
    );
    Ok(created)
}

/// One client of the organization.
pub async fn get_client(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    client_id: i64,
) -> Result<client::Model> {
    auth::require_membership(db, user_id, organization_id).await?;
    find_in_org(db, organization_id, client_id).await
}

/// Clients of the organization ordered by name, filtered and paginated.
pub async fn list_clients(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    query: &ClientQuery,
) -> Result<Page<client::Model>> {
    auth::require_membership(db, user_id, organization_id).await?;

    let mut select = Client::find().filter(ClientColumn::OrganizationId.eq(organization_id));
    if let Some(status) = query.status {
        select = select.filter(ClientColumn::Status.eq(status));
    }
    if let Some(term) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        select = select.filter(
            Condition::any()
                .add(ClientColumn::Name.contains(term))
                .add(ClientColumn::Reference.contains(term))
                .add(ClientColumn::Email.contains(term)),
        );
    }
    let select = select
        .order_by_asc(ClientColumn::Name)
        .order_by_asc(ClientColumn::Id);

    pagination::fetch_page(
        db,
        select,
        PageRequest {
            page: query.page,
            per_page: query.per_page,
        },
    )
    .await
}

/// Updates the descriptive fields of a client; status changes go through
/// [`update_client_status`].
pub async fn update_client(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    client_id: i64,
    form: &ClientForm,
) -> Result<client::Model> {
    let valid = validate(form)?;
    auth::require_membership(db, user_id, organization_id).await?;

    let txn = db.begin().await?;
    let current = find_in_org(&txn, organization_id, client_id).await?;
    let reference = valid.reference.unwrap_or_else(|| current.reference.clone());
    if reference != current.reference {
        ensure_reference_available(&txn, organization_id, &reference, Some(client_id)).await?;
    }

    let mut active: client::ActiveModel = current.into();
    active.reference = Set(reference);
    active.name = Set(valid.name);
    active.client_type = Set(form.client_type);
    active.email = Set(valid.email);
    active.phone = Set(valid.phone);
    active.website = Set(valid.website);
    active.siret = Set(valid.siret);
    active.vat_number = Set(valid.vat_number);
    active.notes = Set(valid.notes);
    active.updated_at = Set(Utc::now());
    let updated = active.update(&txn).await?;
    txn.commit().await?;
    Ok(updated)
}

/// Moves a client along the client status table.
pub async fn update_client_status(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    client_id: i64,
    status: ClientStatus,
) -> Result<client::Model> {
    auth::require_membership(db, user_id, organization_id).await?;
    let current = find_in_org(db, organization_id, client_id).await?;
    transitions::ensure_transition(current.status, status)?;

    let mut active: client::ActiveModel = current.into();
    active.status = Set(status);
    active.updated_at = Set(Utc::now());
    active.update(db).await.map_err(Into::into)
}

/// Deletes a client together with its contacts and addresses.
pub async fn delete_client(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    client_id: i64,
) -> Result<()> {
    auth::require_membership(db, user_id, organization_id).await?;

    let txn = db.begin().await?;
    let client = find_in_org(&txn, organization_id, client_id).await?;
    Contact::delete_many()
        .filter(ContactColumn::ClientId.eq(client_id))
        .exec(&txn)
        .await?;
    Address::delete_many()
        .filter(AddressColumn::ClientId.eq(client_id))
        .exec(&txn)
        .await?;
    client.delete(&txn).await?;
    txn.commit().await?;

    info!("client {client_id} deleted from organization {organization_id}");
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::entities::enums::MemberRole;
    use crate::test_utils::*;

    #[test]
    fn test_next_reference_from() {
        assert_eq!(next_reference_from("CLI", []).unwrap(), "CLI-0001");
        assert_eq!(
            next_reference_from("CLI", ["CLI-0001", "CLI-0009", "CLI-ABC", "OTHER-0050"])
                .unwrap(),
            "CLI-0010"
        );
        assert_eq!(next_reference_from("CLI", ["CLI-12345"]).unwrap(), "CLI-12346");
        assert_eq!(
            next_reference_from("CLI", ["CLI-4294967295"]).unwrap(),
            "CLI-4294967296"
        );
        // Suffixes too long for u64 are not numbers
        assert_eq!(
            next_reference_from("CLI", ["CLI-99999999999999999999999", "CLI-0002"]).unwrap(),
            "CLI-0003"
        );
    }

    #[test]
    fn test_next_reference_from_exhausted() {
        let last = format!("CLI-{}", u64::MAX);
        let result = next_reference_from("CLI", [last.as_str()]);
        assert!(matches!(result, Err(Error::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_list_clients_far_past_last_page() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;
        create_test_client(&db, owner.id, org.id, "CLI-0001").await?;

        let query = ClientQuery {
            page: Some(u64::MAX / 10),
            per_page: Some(10),
            ..Default::default()
        };
        let page = list_clients(&db, owner.id, org.id, &query).await?;
        assert!(page.items.is_empty());
        assert_eq!(page.total, 1);
        assert_eq!(page.total_pages, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_generated_reference_after_large_suffix() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;
        create_client(&db, owner.id, org.id, &client_form("CLI-4294967295", "Big")).await?;

        assert_eq!(
            next_client_reference(&db, owner.id, org.id).await?,
            "CLI-4294967296"
        );
        let next = create_client(&db, owner.id, org.id, &client_form("", "Next")).await?;
        assert_eq!(next.reference, "CLI-4294967296");
        Ok(())
    }

    #[tokio::test]
    async fn test_create_client_validation() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;

        let result = create_client(&db, owner.id, org.id, &client_form("", "  ")).await;
        assert!(matches!(result, Err(Error::Validation { ref field, .. }) if field == "name"));

        let result = create_client(&db, owner.id, org.id, &client_form("CLI 1", "Acme")).await;
        assert!(matches!(result, Err(Error::Validation { ref field, .. }) if field == "reference"));

        let mut bad_email = client_form("CLI-1", "Acme");
        bad_email.email = Some("nope".to_string());
        let result = create_client(&db, owner.id, org.id, &bad_email).await;
        assert!(matches!(result, Err(Error::Validation { ref field, .. }) if field == "email"));

        let mut archived = client_form("CLI-1", "Acme");
        archived.status = Some(ClientStatus::Archived);
        let result = create_client(&db, owner.id, org.id, &archived).await;
        assert!(matches!(result, Err(Error::Validation { ref field, .. }) if field == "status"));
        Ok(())
    }

    #[tokio::test]
    async fn test_create_client_integration() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;

        let mut form = client_form("cli-0042", "  Acme Corp ");
        form.email = Some("Billing@Acme.test".to_string());
        let client = create_client(&db, owner.id, org.id, &form).await?;

        assert_eq!(client.reference, "CLI-0042");
        assert_eq!(client.name, "Acme Corp");
        assert_eq!(client.email.as_deref(), Some("billing@acme.test"));
        assert_eq!(client.status, ClientStatus::Lead);
        assert_eq!(client.organization_id, org.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_generated_references_increment() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;
        let first = create_client(&db, owner.id, org.id, &client_form("", "First")).await?;
        let second = create_client(&db, owner.id, org.id, &client_form("", "Second")).await?;
        assert_eq!(first.reference, "CLI-0001");
        assert_eq!(second.reference, "CLI-0002");
        assert_eq!(next_client_reference(&db, owner.id, org.id).await?, "CLI-0003");
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_reference_conflicts_within_org_only() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;
        let other = create_test_organization(&db, owner.id, "Second Org").await?;

        create_test_client(&db, owner.id, org.id, "CLI-1").await?;
        let result = create_test_client(&db, owner.id, org.id, "cli-1").await;
        assert!(matches!(result, Err(Error::Conflict { .. })));

        // The same reference is fine in another organization
        create_test_client(&db, owner.id, other.id, "CLI-1").await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_outsider_is_forbidden() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;
        let client = create_test_client(&db, owner.id, org.id, "CLI-1").await?;
        let outsider = create_test_user(&db, "outsider@example.com").await?;

        let result = get_client(&db, outsider.id, org.id, client.id).await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));
        let result = create_test_client(&db, outsider.id, org.id, "CLI-2").await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_client_of_other_org_is_not_found() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;
        let other = create_test_organization(&db, owner.id, "Second Org").await?;
        let foreign = create_test_client(&db, owner.id, other.id, "CLI-1").await?;

        let result = get_client(&db, owner.id, org.id, foreign.id).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_list_clients_search_filter_and_pages() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;
        for (reference, name) in [("A-1", "Alpha"), ("B-1", "Bravo"), ("C-1", "Charlie")] {
            create_test_client_named(&db, owner.id, org.id, reference, name).await?;
        }
        let bravo_id = list_clients(&db, owner.id, org.id, &ClientQuery {
            search: Some("brav".to_string()),
            ..Default::default()
        })
        .await?
        .items[0]
            .id;
        update_client_status(&db, owner.id, org.id, bravo_id, ClientStatus::Active).await?;

        let all = list_clients(&db, owner.id, org.id, &ClientQuery::default()).await?;
        assert_eq!(all.total, 3);
        let names: Vec<&str> = all.items.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Alpha", "Bravo", "Charlie"]);

        let active = list_clients(&db, owner.id, org.id, &ClientQuery {
            status: Some(ClientStatus::Active),
            ..Default::default()
        })
        .await?;
        assert_eq!(active.total, 1);
        assert_eq!(active.items[0].name, "Bravo");

        let page2 = list_clients(&db, owner.id, org.id, &ClientQuery {
            page: Some(2),
            per_page: Some(2),
            ..Default::default()
        })
        .await?;
        assert_eq!(page2.total_pages, 2);
        assert_eq!(page2.items.len(), 1);
        assert_eq!(page2.items[0].name, "Charlie");
        Ok(())
    }

    #[tokio::test]
    async fn test_update_client_reference_uniqueness() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;
        create_test_client(&db, owner.id, org.id, "CLI-1").await?;
        let second = create_test_client(&db, owner.id, org.id, "CLI-2").await?;

        let result =
            update_client(&db, owner.id, org.id, second.id, &client_form("CLI-1", "Renamed")).await;
        assert!(matches!(result, Err(Error::Conflict { .. })));

        // Keeping the same reference is not a conflict with itself
        let updated =
            update_client(&db, owner.id, org.id, second.id, &client_form("CLI-2", "Renamed")).await?;
        assert_eq!(updated.name, "Renamed");

        // Omitting the reference keeps the current one
        let updated =
            update_client(&db, owner.id, org.id, second.id, &client_form("", "Again")).await?;
        assert_eq!(updated.reference, "CLI-2");
        Ok(())
    }

    #[tokio::test]
    async fn test_status_transitions() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;
        let client = create_test_client(&db, owner.id, org.id, "CLI-1").await?;

        let result =
            update_client_status(&db, owner.id, org.id, client.id, ClientStatus::Inactive).await;
        assert!(matches!(result, Err(Error::InvalidTransition { .. })));

        let prospect =
            update_client_status(&db, owner.id, org.id, client.id, ClientStatus::Prospect).await?;
        assert_eq!(prospect.status, ClientStatus::Prospect);
        let active =
            update_client_status(&db, owner.id, org.id, client.id, ClientStatus::Active).await?;
        assert_eq!(active.status, ClientStatus::Active);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_client_cascades() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;
        let member = create_test_user(&db, "m@example.com").await?;
        add_test_member(&db, org.id, member.id, MemberRole::Member).await?;
        let client = create_test_client(&db, owner.id, org.id, "CLI-1").await?;
        create_test_client_contact(&db, owner.id, org.id, client.id).await?;
        create_test_client_address(&db, owner.id, org.id, client.id).await?;

        delete_client(&db, member.id, org.id, client.id).await?;
        assert_eq!(Client::find().count(&db).await?, 0);
        assert_eq!(Contact::find().count(&db).await?, 0);
        assert_eq!(Address::find().count(&db).await?, 0);
        Ok(())
    }
}

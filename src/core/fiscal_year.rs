//! Fiscal year business logic.
//!
//! Fiscal years of one organization form a contiguous chain of inclusive date
//! ranges: no two overlap and each one starts the day after its predecessor
//! ends. A period lasts at most 24 months. Status changes follow the
//! `ACTIVE -> CLOSED -> ARCHIVED` table in [`super::transitions`]; only active
//! years may have their dates edited or be deleted.

use crate::{
    core::{auth, transitions, validation},
    entities::{FiscalYear, FiscalYearColumn, enums::FiscalYearStatus, enums::MemberRole, fiscal_year},
    errors::{Error, Result},
};
use chrono::{Months, NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::Deserialize;
use tracing::info;

/// Longest allowed period, in months.
pub const MAX_DURATION_MONTHS: u32 = 24;

/// Submitted fiscal year.
#[derive(Debug, Clone, Deserialize)]
pub struct FiscalYearForm {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Checks the bounds of a single period.
pub fn validate_period(start: NaiveDate, end: NaiveDate) -> Result<()> {
    if end <= start {
        return Err(Error::validation("end_date", "must be after the start date"));
    }
    let limit = start
        .checked_add_months(Months::new(MAX_DURATION_MONTHS))
        .ok_or_else(|| Error::validation("start_date", "is out of range"))?;
    if end >= limit {
        return Err(Error::validation(
            "end_date",
            format!("a fiscal year cannot exceed {MAX_DURATION_MONTHS} months"),
        ));
    }
    Ok(())
}

/// Checks a candidate period against the organization's other fiscal years.
///
/// - Overlap with any existing period is a `Conflict`.
/// - When a period ends before the candidate, the closest one must end the day
///   before the candidate starts; symmetrically for periods after it. Otherwise
///   the chain would have a gap and the check fails with a validation error.
pub fn check_against_existing(
    start: NaiveDate,
    end: NaiveDate,
    existing: &[fiscal_year::Model],
) -> Result<()> {
    if let Some(overlapping) = existing
        .iter()
        .find(|fy| start <= fy.end_date && fy.start_date <= end)
    {
        return Err(Error::conflict(format!(
            "the period overlaps fiscal year '{}' ({} to {})",
            overlapping.name, overlapping.start_date, overlapping.end_date
        )));
    }

    let predecessor = existing
        .iter()
        .filter(|fy| fy.end_date < start)
        .max_by_key(|fy| fy.end_date);
    if let Some(prev) = predecessor
        && prev.end_date.succ_opt() != Some(start)
    {
        return Err(Error::validation(
            "start_date",
            format!(
                "leaves a gap after fiscal year '{}'; it must start on {}",
                prev.name,
                prev.end_date.succ_opt().unwrap_or(prev.end_date)
            ),
        ));
    }

    let successor = existing
        .iter()
        .filter(|fy| fy.start_date > end)
        .min_by_key(|fy| fy.start_date);
    if let Some(next) = successor
        && next.start_date.pred_opt() != Some(end)
    {
        return Err(Error::validation(
            "end_date",
            format!(
                "leaves a gap before fiscal year '{}'; it must end on {}",
                next.name,
                next.start_date.pred_opt().unwrap_or(next.start_date)
            ),
        ));
    }

    Ok(())
}

async fn load_org_years<C: ConnectionTrait>(
    db: &C,
    organization_id: i64,
) -> Result<Vec<fiscal_year::Model>> {
    FiscalYear::find()
        .filter(FiscalYearColumn::OrganizationId.eq(organization_id))
        .order_by_asc(FiscalYearColumn::StartDate)
        .all(db)
        .await
        .map_err(Into::into)
}

async fn find_in_org<C: ConnectionTrait>(
    db: &C,
    organization_id: i64,
    fiscal_year_id: i64,
) -> Result<fiscal_year::Model> {
    FiscalYear::find_by_id(fiscal_year_id)
        .filter(FiscalYearColumn::OrganizationId.eq(organization_id))
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("fiscal year", fiscal_year_id))
}

/// Creates a fiscal year; requires `ADMIN`.
///
/// # Errors
///
/// Returns a validation error for a blank name, an invalid period or a gap
/// next to the neighbouring years, and `Conflict` when the period overlaps one.
pub async fn create_fiscal_year(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    form: &FiscalYearForm,
) -> Result<fiscal_year::Model> {
    let name = validation::required("name", &form.name, 60)?;
    validate_period(form.start_date, form.end_date)?;
    auth::require_member_role(db, user_id, organization_id, MemberRole::Admin).await?;

    let txn = db.begin().await?;
    let existing = load_org_years(&txn, organization_id).await?;
    check_against_existing(form.start_date, form.end_date, &existing)?;

    let now = Utc::now();
    let created = fiscal_year::ActiveModel {
        organization_id: Set(organization_id),
        name: Set(name),
        start_date: Set(form.start_date),
        end_date: Set(form.end_date),
        status: Set(FiscalYearStatus::Active),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    info!(
        "fiscal year {} ({} to {}) created in organization {organization_id}",
        created.name, created.start_date, created.end_date
    );
    Ok(created)
}

/// All fiscal years of the organization, oldest first.
pub async fn list_fiscal_years(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
) -> Result<Vec<fiscal_year::Model>> {
    auth::require_membership(db, user_id, organization_id).await?;
    load_org_years(db, organization_id).await
}

/// One fiscal year of the organization.
pub async fn get_fiscal_year(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    fiscal_year_id: i64,
) -> Result<fiscal_year::Model> {
    auth::require_membership(db, user_id, organization_id).await?;
    find_in_org(db, organization_id, fiscal_year_id).await
}

/// The fiscal year containing `date`, without permission checks.
pub async fn find_covering<C: ConnectionTrait>(
    db: &C,
    organization_id: i64,
    date: NaiveDate,
) -> Result<Option<fiscal_year::Model>> {
    FiscalYear::find()
        .filter(FiscalYearColumn::OrganizationId.eq(organization_id))
        .filter(FiscalYearColumn::StartDate.lte(date))
        .filter(FiscalYearColumn::EndDate.gte(date))
        .one(db)
        .await
        .map_err(Into::into)
}

/// The fiscal year containing `date`.
pub async fn current_fiscal_year(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    date: NaiveDate,
) -> Result<Option<fiscal_year::Model>> {
    auth::require_membership(db, user_id, organization_id).await?;
    find_covering(db, organization_id, date).await
}

/// Renames or re-dates a fiscal year; dates can only change while it is `ACTIVE`.
///
/// # Errors
///
/// Same as [`create_fiscal_year`], plus a validation error on `status` when the
/// dates of a closed or archived year change.
pub async fn update_fiscal_year(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    fiscal_year_id: i64,
    form: &FiscalYearForm,
) -> Result<fiscal_year::Model> {
    let name = validation::required("name", &form.name, 60)?;
    validate_period(form.start_date, form.end_date)?;
    auth::require_member_role(db, user_id, organization_id, MemberRole::Admin).await?;

    let txn = db.begin().await?;
    let current = find_in_org(&txn, organization_id, fiscal_year_id).await?;
    let dates_changed =
        current.start_date != form.start_date || current.end_date != form.end_date;

    if dates_changed {
        if current.status != FiscalYearStatus::Active {
            return Err(Error::validation(
                "status",
                "only an active fiscal year can change its dates",
            ));
        }
        let others: Vec<_> = load_org_years(&txn, organization_id)
            .await?
            .into_iter()
            .filter(|fy| fy.id != fiscal_year_id)
            .collect();
        check_against_existing(form.start_date, form.end_date, &others)?;
    }

    let mut active: fiscal_year::ActiveModel = current.into();
    active.name = Set(name);
    active.start_date = Set(form.start_date);
    active.end_date = Set(form.end_date);
    active.updated_at = Set(Utc::now());
    let updated = active.update(&txn).await?;
    txn.commit().await?;
    Ok(updated)
}

/// Moves a fiscal year along the status table; requires `ADMIN`.
///
/// # Errors
///
/// Returns `InvalidTransition` for a move the table does not allow.
pub async fn update_fiscal_year_status(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    fiscal_year_id: i64,
    status: FiscalYearStatus,
) -> Result<fiscal_year::Model> {
    auth::require_member_role(db, user_id, organization_id, MemberRole::Admin).await?;
    let current = find_in_org(db, organization_id, fiscal_year_id).await?;
    transitions::ensure_transition(current.status, status)?;

    let mut active: fiscal_year::ActiveModel = current.into();
    active.status = Set(status);
    active.updated_at = Set(Utc::now());
    let updated = active.update(db).await?;
    info!(
        "fiscal year {fiscal_year_id} moved to {:?} in organization {organization_id}",
        updated.status
    );
    Ok(updated)
}

/// Deletes an `ACTIVE` fiscal year at either end of the chain.
///
/// # Errors
///
/// - Validation error on `status` when the year is not `ACTIVE`
/// - `Conflict` when years exist on both sides of it
pub async fn delete_fiscal_year(
    db: &DatabaseConnection,
    user_id: i64,
    organization_id: i64,
    fiscal_year_id: i64,
) -> Result<()> {
    auth::require_member_role(db, user_id, organization_id, MemberRole::Admin).await?;

    let txn = db.begin().await?;
    let target = find_in_org(&txn, organization_id, fiscal_year_id).await?;
    if target.status != FiscalYearStatus::Active {
        return Err(Error::validation(
            "status",
            "only an active fiscal year can be deleted",
        ));
    }

    let years = load_org_years(&txn, organization_id).await?;
    let has_before = years.iter().any(|fy| fy.end_date < target.start_date);
    let has_after = years.iter().any(|fy| fy.start_date > target.end_date);
    if has_before && has_after {
        return Err(Error::conflict(
            "deleting this fiscal year would leave a gap between its neighbours",
        ));
    }

    target.delete(&txn).await?;
    txn.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn fy(id: i64, start: NaiveDate, end: NaiveDate) -> fiscal_year::Model {
        fiscal_year::Model {
            id,
            organization_id: 1,
            name: format!("FY {id}"),
            start_date: start,
            end_date: end,
            status: FiscalYearStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn form(name: &str, start: NaiveDate, end: NaiveDate) -> FiscalYearForm {
        FiscalYearForm {
            name: name.to_string(),
            start_date: start,
            end_date: end,
        }
    }

    #[test]
    fn test_validate_period() {
        assert!(validate_period(d(2024, 1, 1), d(2024, 12, 31)).is_ok());
        assert!(validate_period(d(2024, 1, 1), d(2025, 12, 31)).is_ok());
        assert!(validate_period(d(2024, 1, 1), d(2026, 1, 1)).is_err());
        assert!(validate_period(d(2024, 1, 1), d(2024, 1, 1)).is_err());
        assert!(validate_period(d(2024, 6, 1), d(2024, 1, 1)).is_err());
    }

    #[test]
    fn test_first_year_is_unconstrained() {
        assert!(check_against_existing(d(2024, 3, 1), d(2025, 2, 28), &[]).is_ok());
    }

    #[test]
    fn test_overlap_is_conflict() {
        let existing = [fy(1, d(2024, 1, 1), d(2024, 12, 31))];
        let result = check_against_existing(d(2024, 12, 31), d(2025, 12, 30), &existing);
        assert!(matches!(result, Err(Error::Conflict { .. })));
        let result = check_against_existing(d(2023, 6, 1), d(2024, 1, 1), &existing);
        assert!(matches!(result, Err(Error::Conflict { .. })));
    }

    #[test]
    fn test_adjacent_years_are_accepted() {
        let existing = [fy(1, d(2024, 1, 1), d(2024, 12, 31))];
        assert!(check_against_existing(d(2025, 1, 1), d(2025, 12, 31), &existing).is_ok());
        assert!(check_against_existing(d(2023, 1, 1), d(2023, 12, 31), &existing).is_ok());
    }

    #[test]
    fn test_gaps_are_rejected() {
        let existing = [fy(1, d(2024, 1, 1), d(2024, 12, 31))];
        let after = check_against_existing(d(2025, 1, 2), d(2025, 12, 31), &existing);
        assert!(matches!(after, Err(Error::Validation { ref field, .. }) if field == "start_date"));
        let before = check_against_existing(d(2023, 1, 1), d(2023, 12, 30), &existing);
        assert!(matches!(before, Err(Error::Validation { ref field, .. }) if field == "end_date"));
    }

    #[test]
    fn test_filling_a_hole_must_touch_both_sides() {
        let existing = [
            fy(1, d(2023, 1, 1), d(2023, 12, 31)),
            fy(3, d(2025, 1, 1), d(2025, 12, 31)),
        ];
        assert!(check_against_existing(d(2024, 1, 1), d(2024, 12, 31), &existing).is_ok());
        assert!(check_against_existing(d(2024, 1, 1), d(2024, 12, 30), &existing).is_err());
    }

    #[tokio::test]
    async fn test_create_and_chain_fiscal_years() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;
        let first =
            create_fiscal_year(&db, owner.id, org.id, &form("FY 2024", d(2024, 1, 1), d(2024, 12, 31)))
                .await?;
        assert_eq!(first.status, FiscalYearStatus::Active);

        create_fiscal_year(&db, owner.id, org.id, &form("FY 2025", d(2025, 1, 1), d(2025, 12, 31)))
            .await?;

        let gap =
            create_fiscal_year(&db, owner.id, org.id, &form("FY 2027", d(2027, 1, 1), d(2027, 12, 31)))
                .await;
        assert!(matches!(gap, Err(Error::Validation { .. })));

        let years = list_fiscal_years(&db, owner.id, org.id).await?;
        assert_eq!(years.len(), 2);
        assert_eq!(years[0].name, "FY 2024");

        let current = current_fiscal_year(&db, owner.id, org.id, d(2025, 6, 15)).await?;
        assert_eq!(current.map(|fy| fy.name), Some("FY 2025".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn test_years_are_scoped_per_organization() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;
        let other = create_test_organization(&db, owner.id, "Other Org").await?;
        create_fiscal_year(&db, owner.id, org.id, &form("FY", d(2024, 1, 1), d(2024, 12, 31)))
            .await?;
        // Same dates in another organization neither overlap nor leave a gap
        create_fiscal_year(&db, owner.id, other.id, &form("FY", d(2024, 1, 1), d(2024, 12, 31)))
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_member_cannot_create_fiscal_year() -> Result<()> {
        let (db, _owner, org) = setup_with_organization().await?;
        let user = create_test_user(&db, "m@example.com").await?;
        add_test_member(&db, org.id, user.id, MemberRole::Member).await?;
        let result =
            create_fiscal_year(&db, user.id, org.id, &form("FY", d(2024, 1, 1), d(2024, 12, 31)))
                .await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_status_transitions() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;
        let year =
            create_fiscal_year(&db, owner.id, org.id, &form("FY", d(2024, 1, 1), d(2024, 12, 31)))
                .await?;

        let skipped =
            update_fiscal_year_status(&db, owner.id, org.id, year.id, FiscalYearStatus::Archived)
                .await;
        assert!(matches!(skipped, Err(Error::InvalidTransition { .. })));

        let closed =
            update_fiscal_year_status(&db, owner.id, org.id, year.id, FiscalYearStatus::Closed)
                .await?;
        assert_eq!(closed.status, FiscalYearStatus::Closed);

        let archived =
            update_fiscal_year_status(&db, owner.id, org.id, year.id, FiscalYearStatus::Archived)
                .await?;
        assert_eq!(archived.status, FiscalYearStatus::Archived);

        let reopened =
            update_fiscal_year_status(&db, owner.id, org.id, year.id, FiscalYearStatus::Active)
                .await;
        assert!(matches!(reopened, Err(Error::InvalidTransition { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_dates_only_while_active() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;
        let year =
            create_fiscal_year(&db, owner.id, org.id, &form("FY", d(2024, 1, 1), d(2024, 12, 31)))
                .await?;

        let moved = update_fiscal_year(
            &db,
            owner.id,
            org.id,
            year.id,
            &form("FY 24/25", d(2024, 1, 1), d(2025, 6, 30)),
        )
        .await?;
        assert_eq!(moved.end_date, d(2025, 6, 30));
        assert_eq!(moved.name, "FY 24/25");

        update_fiscal_year_status(&db, owner.id, org.id, year.id, FiscalYearStatus::Closed).await?;
        let result = update_fiscal_year(
            &db,
            owner.id,
            org.id,
            year.id,
            &form("FY", d(2024, 1, 1), d(2024, 12, 31)),
        )
        .await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        // Renaming a closed year is fine
        let renamed = update_fiscal_year(
            &db,
            owner.id,
            org.id,
            year.id,
            &form("Closed FY", d(2024, 1, 1), d(2025, 6, 30)),
        )
        .await?;
        assert_eq!(renamed.name, "Closed FY");
        Ok(())
    }

    #[tokio::test]
    async fn test_update_dates_checks_neighbours() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;
        let first =
            create_fiscal_year(&db, owner.id, org.id, &form("A", d(2023, 1, 1), d(2023, 12, 31)))
                .await?;
        let second =
            create_fiscal_year(&db, owner.id, org.id, &form("B", d(2024, 1, 1), d(2024, 12, 31)))
                .await?;

        let overlap = update_fiscal_year(
            &db,
            owner.id,
            org.id,
            second.id,
            &form("B", d(2023, 12, 1), d(2024, 12, 31)),
        )
        .await;
        assert!(matches!(overlap, Err(Error::Conflict { .. })));

        let gap_after = update_fiscal_year(
            &db,
            owner.id,
            org.id,
            second.id,
            &form("B", d(2024, 1, 15), d(2024, 12, 31)),
        )
        .await;
        assert!(
            matches!(gap_after, Err(Error::Validation { ref field, .. }) if field == "start_date")
        );

        let gap_before = update_fiscal_year(
            &db,
            owner.id,
            org.id,
            first.id,
            &form("A", d(2023, 1, 1), d(2023, 11, 30)),
        )
        .await;
        assert!(
            matches!(gap_before, Err(Error::Validation { ref field, .. }) if field == "end_date")
        );

        // Its own previous range does not count as an overlap
        let extended = update_fiscal_year(
            &db,
            owner.id,
            org.id,
            second.id,
            &form("B", d(2024, 1, 1), d(2025, 3, 31)),
        )
        .await?;
        assert_eq!(extended.end_date, d(2025, 3, 31));

        let unchanged = get_fiscal_year(&db, owner.id, org.id, first.id).await?;
        assert_eq!(unchanged.end_date, d(2023, 12, 31));
        Ok(())
    }

    #[tokio::test]
    async fn test_closed_year_cannot_be_deleted() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;
        let year =
            create_fiscal_year(&db, owner.id, org.id, &form("FY", d(2024, 1, 1), d(2024, 12, 31)))
                .await?;
        update_fiscal_year_status(&db, owner.id, org.id, year.id, FiscalYearStatus::Closed).await?;

        let result = delete_fiscal_year(&db, owner.id, org.id, year.id).await;
        assert!(matches!(result, Err(Error::Validation { ref field, .. }) if field == "status"));
        assert_eq!(list_fiscal_years(&db, owner.id, org.id).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_middle_year_is_rejected() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;
        let first =
            create_fiscal_year(&db, owner.id, org.id, &form("A", d(2023, 1, 1), d(2023, 12, 31)))
                .await?;
        let middle =
            create_fiscal_year(&db, owner.id, org.id, &form("B", d(2024, 1, 1), d(2024, 12, 31)))
                .await?;
        create_fiscal_year(&db, owner.id, org.id, &form("C", d(2025, 1, 1), d(2025, 12, 31)))
            .await?;

        let result = delete_fiscal_year(&db, owner.id, org.id, middle.id).await;
        assert!(matches!(result, Err(Error::Conflict { .. })));

        delete_fiscal_year(&db, owner.id, org.id, first.id).await?;
        assert_eq!(list_fiscal_years(&db, owner.id, org.id).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_get_fiscal_year_from_other_org_is_not_found() -> Result<()> {
        let (db, owner, org) = setup_with_organization().await?;
        let other = create_test_organization(&db, owner.id, "Other Org").await?;
        let year =
            create_fiscal_year(&db, owner.id, other.id, &form("FY", d(2024, 1, 1), d(2024, 12, 31)))
                .await?;
        let result = get_fiscal_year(&db, owner.id, org.id, year.id).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
        Ok(())
    }
}

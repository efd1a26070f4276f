//! Allow-listed status transitions.
//!
//! Each stateful entity declares an adjacency table; a status change is accepted
//! only when the target appears in the list for the current status. Setting the
//! current status again is not a transition and is rejected too.

use crate::entities::enums::{ClientStatus, FiscalYearStatus, InvitationStatus, SupplierStatus};
use crate::errors::{Error, Result};
use sea_orm::ActiveEnum;
use std::fmt::Debug;

/// A status enum with an adjacency table.
pub trait Transitions: ActiveEnum<Value = String> + Copy + PartialEq + Debug + 'static {
    /// Entity name used in error messages.
    const ENTITY: &'static str;

    /// Statuses reachable in one step from `self`.
    fn allowed(self) -> &'static [Self];

    /// True when `self -> to` is in the table.
    fn can_transition_to(self, to: Self) -> bool {
        self.allowed().contains(&to)
    }
}

/// Fails with `InvalidTransition` when `from -> to` is not allowed.
pub fn ensure_transition<S: Transitions>(from: S, to: S) -> Result<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(Error::InvalidTransition {
            entity: S::ENTITY,
            from: from.to_value(),
            to: to.to_value(),
        })
    }
}

impl Transitions for FiscalYearStatus {
    const ENTITY: &'static str = "fiscal year";

    fn allowed(self) -> &'static [Self] {
        match self {
            Self::Active => &[Self::Closed],
            Self::Closed => &[Self::Active, Self::Archived],
            Self::Archived => &[],
        }
    }
}

impl Transitions for ClientStatus {
    const ENTITY: &'static str = "client";

    fn allowed(self) -> &'static [Self] {
        match self {
            Self::Lead => &[Self::Prospect, Self::Active, Self::Archived],
            Self::Prospect => &[Self::Active, Self::Inactive, Self::Archived],
            Self::Active => &[Self::Inactive, Self::Archived],
            Self::Inactive => &[Self::Active, Self::Archived],
            Self::Archived => &[Self::Inactive],
        }
    }
}

impl Transitions for SupplierStatus {
    const ENTITY: &'static str = "supplier";

    fn allowed(self) -> &'static [Self] {
        match self {
            Self::Active => &[Self::Inactive, Self::Blocked, Self::Archived],
            Self::Inactive => &[Self::Active, Self::Blocked, Self::Archived],
            Self::Blocked => &[Self::Active, Self::Archived],
            Self::Archived => &[Self::Inactive],
        }
    }
}

impl Transitions for InvitationStatus {
    const ENTITY: &'static str = "invitation";

    fn allowed(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Accepted, Self::Rejected, Self::Cancelled, Self::Expired],
            Self::Accepted | Self::Rejected | Self::Cancelled | Self::Expired => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Iterable;

    #[test]
    fn test_fiscal_year_cannot_skip_closing() {
        assert!(ensure_transition(FiscalYearStatus::Active, FiscalYearStatus::Closed).is_ok());
        assert!(ensure_transition(FiscalYearStatus::Closed, FiscalYearStatus::Archived).is_ok());
        assert!(ensure_transition(FiscalYearStatus::Closed, FiscalYearStatus::Active).is_ok());

        let err = ensure_transition(FiscalYearStatus::Active, FiscalYearStatus::Archived);
        assert!(matches!(
            err,
            Err(Error::InvalidTransition { entity: "fiscal year", ref from, ref to })
                if from == "ACTIVE" && to == "ARCHIVED"
        ));
    }

    #[test]
    fn test_archived_fiscal_year_is_final() {
        for to in FiscalYearStatus::iter() {
            assert!(!FiscalYearStatus::Archived.can_transition_to(to));
        }
    }

    #[test]
    fn test_same_status_is_not_a_transition() {
        for s in ClientStatus::iter() {
            assert!(!s.can_transition_to(s));
        }
        for s in SupplierStatus::iter() {
            assert!(!s.can_transition_to(s));
        }
    }

    #[test]
    fn test_invitation_terminal_states() {
        for from in InvitationStatus::iter().filter(|s| *s != InvitationStatus::Pending) {
            assert!(from.allowed().is_empty());
        }
        assert!(InvitationStatus::Pending.can_transition_to(InvitationStatus::Accepted));
    }

    #[test]
    fn test_client_lead_cannot_go_inactive() {
        assert!(ensure_transition(ClientStatus::Lead, ClientStatus::Inactive).is_err());
        assert!(ensure_transition(ClientStatus::Archived, ClientStatus::Inactive).is_ok());
        assert!(ensure_transition(ClientStatus::Archived, ClientStatus::Active).is_err());
    }
}

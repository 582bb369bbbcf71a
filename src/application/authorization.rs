use crate::domain::actor::{Actor, Role};
use crate::domain::booking::{Booking, BookingAction};
use crate::error::{CareError, Result};

/// The role a transition requires. `Cancel` and `Dispute` accept more than
/// one role; this returns the primary one for display purposes.
pub fn required_role(action: BookingAction) -> Role {
    match action {
        BookingAction::MarkPaid => Role::System,
        BookingAction::Forward | BookingAction::Refund => Role::Admin,
        BookingAction::OrgAccept
        | BookingAction::OrgReject
        | BookingAction::Start
        | BookingAction::Complete => Role::Organization,
        BookingAction::Cancel | BookingAction::Dispute => Role::Customer,
    }
}

/// Checks role and ownership before the state machine is consulted. A
/// failure here never touches the booking.
pub fn authorize(actor: &Actor, action: BookingAction, booking: &Booking) -> Result<()> {
    let allowed = match action {
        // Only the reconciliation engine marks bookings paid.
        BookingAction::MarkPaid => actor.role == Role::System,
        // Refunds are issued by admins, or by the engine when a
        // cancellation queues one.
        BookingAction::Forward => actor.role == Role::Admin,
        BookingAction::Refund => matches!(actor.role, Role::Admin | Role::System),
        BookingAction::OrgAccept
        | BookingAction::OrgReject
        | BookingAction::Start
        | BookingAction::Complete => {
            actor.role == Role::Organization && actor.id == booking.organization_id
        }
        BookingAction::Cancel => match actor.role {
            Role::Customer => actor.id == booking.customer_id,
            Role::Admin => true,
            _ => false,
        },
        // Any booking participant may raise a dispute.
        BookingAction::Dispute => match actor.role {
            Role::Customer => actor.id == booking.customer_id,
            Role::Organization => actor.id == booking.organization_id,
            Role::Admin => true,
            Role::System => false,
        },
    };

    if allowed {
        Ok(())
    } else {
        Err(CareError::Unauthorized {
            role: actor.role,
            action: action.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::booking::{Amount, NewBooking, Schedule};
    use chrono::{NaiveDate, NaiveTime};
    use rust_decimal_macros::dec;

    fn booking() -> Booking {
        let date = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        Booking::new(NewBooking {
            id: "B1".into(),
            customer_id: "alice".into(),
            caregiver_id: "cg-7".into(),
            organization_id: "org-1".into(),
            schedule: Schedule {
                start_date: date,
                end_date: date,
                start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
                duration_hours: 8,
            },
            hourly_rate: Amount::new(dec!(250)).unwrap(),
            currency: "INR".into(),
        })
        .unwrap()
    }

    #[test]
    fn test_forward_requires_admin() {
        let b = booking();
        assert!(authorize(&Actor::admin("admin-1"), BookingAction::Forward, &b).is_ok());
        let err = authorize(&Actor::customer("alice"), BookingAction::Forward, &b).unwrap_err();
        assert!(matches!(err, CareError::Unauthorized { .. }));
    }

    #[test]
    fn test_required_role_mapping() {
        assert_eq!(required_role(BookingAction::MarkPaid), Role::System);
        assert_eq!(required_role(BookingAction::Forward), Role::Admin);
        assert_eq!(required_role(BookingAction::Refund), Role::Admin);
        assert_eq!(required_role(BookingAction::OrgAccept), Role::Organization);
        assert_eq!(required_role(BookingAction::Complete), Role::Organization);
        assert_eq!(required_role(BookingAction::Cancel), Role::Customer);
    }

    #[test]
    fn test_org_actions_check_ownership() {
        let b = booking();
        assert!(authorize(&Actor::organization("org-1"), BookingAction::OrgAccept, &b).is_ok());
        // A different organization may not act on this booking.
        assert!(authorize(&Actor::organization("org-2"), BookingAction::OrgAccept, &b).is_err());
        assert!(authorize(&Actor::admin("admin-1"), BookingAction::Start, &b).is_err());
    }

    #[test]
    fn test_cancel_allows_owning_customer_or_admin() {
        let b = booking();
        assert!(authorize(&Actor::customer("alice"), BookingAction::Cancel, &b).is_ok());
        assert!(authorize(&Actor::admin("admin-1"), BookingAction::Cancel, &b).is_ok());
        assert!(authorize(&Actor::customer("mallory"), BookingAction::Cancel, &b).is_err());
        assert!(authorize(&Actor::organization("org-1"), BookingAction::Cancel, &b).is_err());
    }

    #[test]
    fn test_mark_paid_is_system_only() {
        let b = booking();
        assert!(authorize(&Actor::system(), BookingAction::MarkPaid, &b).is_ok());
        assert!(authorize(&Actor::admin("admin-1"), BookingAction::MarkPaid, &b).is_err());
    }

    #[test]
    fn test_dispute_open_to_participants() {
        let b = booking();
        assert!(authorize(&Actor::customer("alice"), BookingAction::Dispute, &b).is_ok());
        assert!(authorize(&Actor::organization("org-1"), BookingAction::Dispute, &b).is_ok());
        assert!(authorize(&Actor::admin("admin-1"), BookingAction::Dispute, &b).is_ok());
        assert!(authorize(&Actor::customer("mallory"), BookingAction::Dispute, &b).is_err());
    }
}

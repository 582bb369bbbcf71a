use super::authorization::authorize;
use super::reconciliation::PaymentReconciliation;
use crate::domain::actor::{Actor, Role};
use crate::domain::booking::{Booking, BookingAction, BookingStatus};
use crate::domain::incident::{
    Incident, IncidentKind, NewIncident, Resolution, ResolutionAction, Severity,
};
use crate::domain::ports::{BookingStoreRef, IncidentStoreRef};
use crate::error::{CareError, Result};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

/// What happens to a `DISPUTED` booking when the incident closes without a
/// refund: back to where it was, or cancelled for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisputeOutcome {
    #[default]
    Reinstate,
    Cancel,
}

/// Records misconduct and quality reports against a booking and resolves
/// them into a terminal booking disposition. Incidents are retained for
/// audit regardless of how the booking ends.
pub struct IncidentResolver {
    incidents: IncidentStoreRef,
    bookings: BookingStoreRef,
    reconciliation: PaymentReconciliation,
}

impl IncidentResolver {
    pub fn new(
        incidents: IncidentStoreRef,
        bookings: BookingStoreRef,
        reconciliation: PaymentReconciliation,
    ) -> Self {
        Self {
            incidents,
            bookings,
            reconciliation,
        }
    }

    /// Files a report. Any booking participant may report; a payment
    /// dispute or a high-severity report against a running or completed
    /// engagement also moves the booking into `DISPUTED`.
    pub async fn report(&self, actor: &Actor, params: NewIncident) -> Result<Incident> {
        let booking = self.load_booking(&params.booking_id).await?;
        authorize(actor, BookingAction::Dispute, &booking)?;

        let escalates = params.kind == IncidentKind::PaymentDispute
            || params.severity >= Severity::High;
        let incident = Incident::new(format!("inc_{}", Uuid::new_v4()), params);
        self.incidents.insert(incident.clone()).await?;

        if escalates
            && matches!(
                booking.status(),
                BookingStatus::InProgress | BookingStatus::Completed
            )
        {
            let mut booking = booking;
            booking.dispute()?;
            self.bookings.update(booking).await?;
        }

        info!(incident = %incident.id, booking = %incident.booking_id, "incident reported");
        Ok(incident)
    }

    pub async fn begin_investigation(&self, actor: &Actor, incident_id: &str) -> Result<Incident> {
        self.require_admin(actor, "investigate an incident")?;
        let mut incident = self.load_incident(incident_id).await?;
        incident.begin_investigation()?;
        self.incidents.update(incident).await
    }

    /// Resolves an incident. A `refund` action drives the reconciliation
    /// refund path; any other action leaves the booking alone unless it is
    /// `DISPUTED`, in which case `outcome` decides where it lands. Booking
    /// effects are applied before the incident is closed, so a lost race
    /// leaves the incident open for a clean retry.
    pub async fn resolve(
        &self,
        actor: &Actor,
        incident_id: &str,
        action: ResolutionAction,
        notes: &str,
        outcome: DisputeOutcome,
    ) -> Result<Incident> {
        self.require_admin(actor, "resolve an incident")?;
        let mut incident = self.load_incident(incident_id).await?;
        let booking = self.load_booking(&incident.booking_id).await?;

        match action {
            ResolutionAction::Refund => self.refund_booking(actor, booking).await?,
            _ => self.settle_dispute(booking, outcome).await?,
        }

        incident.resolve(Resolution {
            action,
            notes: notes.to_string(),
            resolved_by: actor.id.clone(),
            resolved_at: Utc::now(),
        })?;
        let incident = self.incidents.update(incident).await?;
        info!(incident = incident_id, ?action, "incident resolved");
        Ok(incident)
    }

    /// Dismisses a report as unfounded. A booking disputed over it is
    /// reinstated to its pre-dispute status.
    pub async fn dismiss(&self, actor: &Actor, incident_id: &str, notes: &str) -> Result<Incident> {
        self.require_admin(actor, "dismiss an incident")?;
        let mut incident = self.load_incident(incident_id).await?;
        let booking = self.load_booking(&incident.booking_id).await?;
        self.settle_dispute(booking, DisputeOutcome::Reinstate)
            .await?;

        incident.dismiss(Resolution {
            action: ResolutionAction::NoAction,
            notes: notes.to_string(),
            resolved_by: actor.id.clone(),
            resolved_at: Utc::now(),
        })?;
        self.incidents.update(incident).await
    }

    pub async fn for_booking(&self, booking_id: &str) -> Result<Vec<Incident>> {
        self.incidents.by_booking(booking_id).await
    }

    pub async fn get(&self, incident_id: &str) -> Result<Incident> {
        self.load_incident(incident_id).await
    }

    async fn refund_booking(&self, actor: &Actor, mut booking: Booking) -> Result<()> {
        // The refund transition only leaves DISPUTED; a still-running
        // booking is disputed first so the path stays inside the table.
        if matches!(
            booking.status(),
            BookingStatus::InProgress | BookingStatus::Completed
        ) {
            booking.dispute()?;
            booking = self.bookings.update(booking).await?;
        }
        let order_id = booking.payment.order_id.clone().ok_or_else(|| {
            CareError::Validation(format!("booking {} has no payment to refund", booking.id))
        })?;
        self.reconciliation
            .process_refund(&order_id, None, Some("incident resolution".to_string()), actor)
            .await?;
        Ok(())
    }

    async fn settle_dispute(&self, mut booking: Booking, outcome: DisputeOutcome) -> Result<()> {
        if booking.status() != BookingStatus::Disputed {
            return Ok(());
        }
        match outcome {
            DisputeOutcome::Reinstate => booking.reinstate()?,
            DisputeOutcome::Cancel => booking.close_dispute_cancelled("dispute upheld")?,
        }
        self.bookings.update(booking).await?;
        Ok(())
    }

    fn require_admin(&self, actor: &Actor, what: &str) -> Result<()> {
        if actor.role == Role::Admin {
            Ok(())
        } else {
            Err(CareError::Unauthorized {
                role: actor.role,
                action: what.to_string(),
            })
        }
    }

    async fn load_booking(&self, booking_id: &str) -> Result<Booking> {
        self.bookings
            .get(booking_id)
            .await?
            .ok_or_else(|| CareError::NotFound(format!("booking {booking_id}")))
    }

    async fn load_incident(&self, incident_id: &str) -> Result<Incident> {
        self.incidents
            .get(incident_id)
            .await?
            .ok_or_else(|| CareError::NotFound(format!("incident {incident_id}")))
    }
}

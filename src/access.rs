//! Caller identity and the capability table every operation checks once.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bookings::Booking;
use crate::errors::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerRole {
    Devotee,
    Officiant,
    Operations,
    Admin,
}

/// Authenticated principal invoking an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub id: Uuid,
    pub role: CallerRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ViewBooking,
    PayForBooking,
    UploadProof,
    StartService,
    CompleteBooking,
    /// Complete after the grace window has closed
    ForceLateCompletion,
    AssignOfficiant,
    CancelBooking,
    RefundBooking,
    ReviewProof,
    RunSlaScan,
}

impl Caller {
    pub fn new(id: Uuid, role: CallerRole) -> Self {
        Self { id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == CallerRole::Admin
    }

    pub fn is_staff(&self) -> bool {
        matches!(self.role, CallerRole::Operations | CallerRole::Admin)
    }

    fn owns(&self, booking: &Booking) -> bool {
        booking.user_id == self.id
    }

    fn officiates(&self, booking: &Booking) -> bool {
        self.role == CallerRole::Officiant && booking.is_assigned_to(self.id)
    }

    /// Whether this caller holds `capability`, optionally relative to a booking
    pub fn permits(&self, capability: Capability, booking: Option<&Booking>) -> bool {
        let owns = booking.is_some_and(|b| self.owns(b));
        let officiates = booking.is_some_and(|b| self.officiates(b));

        match capability {
            Capability::ViewBooking => owns || officiates || self.is_staff(),
            Capability::PayForBooking => owns,
            Capability::UploadProof => officiates || self.is_admin(),
            Capability::StartService | Capability::CompleteBooking => {
                officiates || self.is_staff()
            }
            Capability::ForceLateCompletion => self.is_admin(),
            Capability::AssignOfficiant => self.is_staff(),
            Capability::CancelBooking => owns || self.is_staff(),
            Capability::RefundBooking => self.is_admin(),
            Capability::ReviewProof | Capability::RunSlaScan => self.is_staff(),
        }
    }

    pub fn require(&self, capability: Capability, booking: &Booking) -> EngineResult<()> {
        if self.permits(capability, Some(booking)) {
            Ok(())
        } else {
            Err(EngineError::forbidden(format!(
                "{:?} may not {:?} on booking {}",
                self.role, capability, booking.id
            )))
        }
    }

    /// Capability check for operations not tied to a single booking
    pub fn require_role(&self, capability: Capability) -> EngineResult<()> {
        if self.permits(capability, None) {
            Ok(())
        } else {
            Err(EngineError::forbidden(format!(
                "{:?} may not {:?}",
                self.role, capability
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bookings::{BookingStatus, ProofProgress};
    use chrono::Utc;

    fn booking(owner: Uuid, officiant: Option<Uuid>) -> Booking {
        let now = Utc::now();
        Booking {
            id: Uuid::now_v7(),
            user_id: owner,
            service_id: Uuid::now_v7(),
            package_id: None,
            officiant_id: officiant,
            scheduled_start: now,
            scheduled_end: now,
            duration_minutes: 60,
            total_amount: 1000,
            currency: "INR".to_string(),
            notes: None,
            status: BookingStatus::Confirmed,
            proof_status: ProofProgress::None,
            proof_sla_hours: 24,
            proof_sla_deadline: now,
            is_sla_breached: false,
            sla_breached_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_upload_requires_assigned_officiant_or_admin() {
        let officiant = Caller::new(Uuid::now_v7(), CallerRole::Officiant);
        let other_officiant = Caller::new(Uuid::now_v7(), CallerRole::Officiant);
        let ops = Caller::new(Uuid::now_v7(), CallerRole::Operations);
        let admin = Caller::new(Uuid::now_v7(), CallerRole::Admin);
        let b = booking(Uuid::now_v7(), Some(officiant.id));

        assert!(officiant.require(Capability::UploadProof, &b).is_ok());
        assert!(admin.require(Capability::UploadProof, &b).is_ok());
        assert!(matches!(
            other_officiant.require(Capability::UploadProof, &b),
            Err(EngineError::Forbidden(_))
        ));
        assert!(ops.require(Capability::UploadProof, &b).is_err());
    }

    #[test]
    fn test_devotee_with_officiant_id_does_not_officiate() {
        let id = Uuid::now_v7();
        let devotee = Caller::new(id, CallerRole::Devotee);
        let b = booking(Uuid::now_v7(), Some(id));
        assert!(!devotee.permits(Capability::CompleteBooking, Some(&b)));
    }

    #[test]
    fn test_only_admin_forces_late_completion_and_refunds() {
        let ops = Caller::new(Uuid::now_v7(), CallerRole::Operations);
        let admin = Caller::new(Uuid::now_v7(), CallerRole::Admin);
        assert!(!ops.permits(Capability::ForceLateCompletion, None));
        assert!(admin.permits(Capability::ForceLateCompletion, None));
        assert!(ops.require_role(Capability::RefundBooking).is_err());
        assert!(admin.require_role(Capability::RefundBooking).is_ok());
    }

    #[test]
    fn test_owner_may_pay_and_cancel() {
        let devotee = Caller::new(Uuid::now_v7(), CallerRole::Devotee);
        let b = booking(devotee.id, None);
        assert!(devotee.require(Capability::PayForBooking, &b).is_ok());
        assert!(devotee.require(Capability::CancelBooking, &b).is_ok());
        assert!(devotee.require(Capability::AssignOfficiant, &b).is_err());

        let stranger = Caller::new(Uuid::now_v7(), CallerRole::Devotee);
        assert!(stranger.require(Capability::ViewBooking, &b).is_err());
    }
}

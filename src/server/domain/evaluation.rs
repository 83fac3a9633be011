//! Ratings customers leave once their part of the bill is paid, and their calls for a waiter

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::server::domain::bill::{Bill, BillId};
use crate::server::domain::error::BillError;
use crate::server::domain::establishment::EstablishmentId;
use crate::server::domain::member::CustomerId;
use crate::server::notify::Notification;

const MIN_RATING: i16 = 1;
const MAX_RATING: i16 = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct Evaluation {
    pub id: Option<i64>,
    pub bill_id: BillId,
    pub establishment_id: EstablishmentId,
    pub customer_id: CustomerId,
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Tells a client whether to offer the rating screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) struct EvaluationStatus {
    pub already_paid: bool,
    pub already_rated: bool,
}

impl EvaluationStatus {
    pub fn can_rate(&self) -> bool {
        self.already_paid && !self.already_rated
    }
}

impl Bill {
    fn has_ever_joined(&self, customer_id: CustomerId) -> bool {
        self.members
            .iter()
            .any(|m| m.customer_id == customer_id && m.has_joined())
    }

    /// A closed bill counts as paid for everyone who sat at it,
    /// otherwise the customer needs a settled payment of their own.
    pub fn evaluation_status(
        &self,
        customer_id: CustomerId,
        already_rated: bool,
    ) -> Result<EvaluationStatus, BillError> {
        if !self.has_ever_joined(customer_id) {
            return Err(BillError::NotBillMember);
        }
        let paid_own = self
            .payments
            .iter()
            .any(|p| p.customer_id == Some(customer_id) && p.status.is_settled());
        Ok(EvaluationStatus {
            already_paid: !self.is_open() || paid_own,
            already_rated,
        })
    }

    pub fn rate(
        &self,
        customer_id: CustomerId,
        rating: i16,
        comment: Option<String>,
        already_rated: bool,
        now: DateTime<Utc>,
    ) -> Result<Evaluation, BillError> {
        let bill_id = self.id.ok_or(BillError::NotBillMember)?;
        let status = self.evaluation_status(customer_id, already_rated)?;
        if !status.already_paid {
            return Err(BillError::NotPaidYet);
        }
        if status.already_rated {
            return Err(BillError::AlreadyRated);
        }
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(BillError::InvalidRating);
        }
        Ok(Evaluation {
            id: None,
            bill_id,
            establishment_id: self.establishment_id,
            customer_id,
            rating,
            comment: comment.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
            created_at: now,
        })
    }

    /// A seated member asks for attendance at the table
    pub fn call_waiter(&mut self, customer_id: CustomerId) -> Result<(), BillError> {
        if !self.is_open() {
            return Err(BillError::BillClosed);
        }
        if !self
            .members
            .iter()
            .any(|m| m.customer_id == customer_id && m.is_seated())
        {
            return Err(BillError::NotBillMember);
        }
        self.push_event(Notification::WaiterCalled {
            table_id: self.table_id,
            customer_id,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::domain::bill::PaymentRequest;
    use crate::server::domain::establishment::{Establishment, Fees, Table};
    use rust_decimal::Decimal;

    const OWNER: CustomerId = 1;
    const GUEST: CustomerId = 2;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(secs, 0).unwrap()
    }

    fn bill_with_guest() -> Bill {
        let establishment = Establishment {
            id: 1,
            name: "Cantina".to_string(),
            enabled: true,
            fees: Fees { couvert: Decimal::new(500, 2), ..Fees::default() },
        };
        let table = Table {
            id: 3,
            establishment_id: 1,
            name: "T3".to_string(),
            enabled: true,
            remote: false,
        };
        let mut bill = Bill::open(&establishment, &table, OWNER, false, false, at(0)).unwrap();
        bill.id = Some(40);
        bill.request_join(GUEST, false).unwrap();
        bill.answer_join(OWNER, GUEST, true, at(1)).unwrap();
        bill
    }

    fn guest_pays(bill: &mut Bill) {
        let request = PaymentRequest {
            payment_uuid: "guest".to_string(),
            customer_id: GUEST,
            value: Decimal::new(500, 2),
            noruh_fee: None,
            promotion: None,
        };
        bill.record_offline_payment(&request, false, at(2)).unwrap();
        bill.approve_offline_payment("guest", at(3)).unwrap();
    }

    #[test]
    fn rating_waits_for_a_settled_payment() {
        let mut bill = bill_with_guest();
        assert_eq!(
            bill.rate(GUEST, 5, None, false, at(2)),
            Err(BillError::NotPaidYet)
        );
        // a payment still waiting on the waiter does not count
        let request = PaymentRequest {
            payment_uuid: "guest".to_string(),
            customer_id: GUEST,
            value: Decimal::new(500, 2),
            noruh_fee: None,
            promotion: None,
        };
        bill.record_offline_payment(&request, false, at(2)).unwrap();
        assert!(!bill.evaluation_status(GUEST, false).unwrap().already_paid);

        bill.approve_offline_payment("guest", at(3)).unwrap();
        let status = bill.evaluation_status(GUEST, false).unwrap();
        assert!(status.can_rate());
        // the owner has not paid and the bill is still open
        assert!(!bill.evaluation_status(OWNER, false).unwrap().already_paid);

        let evaluation = bill
            .rate(GUEST, 4, Some("  great fries ".to_string()), false, at(4))
            .unwrap();
        assert_eq!(evaluation.bill_id, 40);
        assert_eq!(evaluation.comment.as_deref(), Some("great fries"));
    }

    #[test]
    fn closed_bill_lets_every_member_rate() {
        let mut bill = bill_with_guest();
        bill.close_with_offline_payment(None, at(5)).unwrap();
        assert!(bill.evaluation_status(OWNER, false).unwrap().already_paid);
        assert!(bill.evaluation_status(GUEST, false).unwrap().already_paid);
        assert_eq!(bill.evaluation_status(9, false), Err(BillError::NotBillMember));
    }

    #[test]
    fn one_rating_per_customer_within_range() {
        let mut bill = bill_with_guest();
        guest_pays(&mut bill);
        assert_eq!(bill.rate(GUEST, 5, None, true, at(4)), Err(BillError::AlreadyRated));
        assert!(!bill.evaluation_status(GUEST, true).unwrap().can_rate());
        assert_eq!(bill.rate(GUEST, 0, None, false, at(4)), Err(BillError::InvalidRating));
        assert_eq!(bill.rate(GUEST, 6, None, false, at(4)), Err(BillError::InvalidRating));
        let blank = bill.rate(GUEST, 1, Some("   ".to_string()), false, at(4)).unwrap();
        assert!(blank.comment.is_none());
    }

    #[test]
    fn only_seated_members_call_the_waiter() {
        let mut bill = bill_with_guest();
        bill.take_events();
        bill.call_waiter(GUEST).unwrap();
        assert_eq!(
            bill.take_events(),
            vec![Notification::WaiterCalled { table_id: 3, customer_id: GUEST }]
        );
        assert_eq!(bill.call_waiter(9), Err(BillError::NotBillMember));

        guest_pays(&mut bill);
        // paid and released
        assert_eq!(bill.call_waiter(GUEST), Err(BillError::NotBillMember));
        bill.close_with_offline_payment(None, at(6)).unwrap();
        assert_eq!(bill.call_waiter(OWNER), Err(BillError::BillClosed));
    }
}

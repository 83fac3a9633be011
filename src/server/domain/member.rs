use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

pub type CustomerId = i64;
pub type BillMemberId = i64;

/// A customer's seat on a bill.
///
/// `joined_at` is empty while the join request waits for the owner, `leave_at`
/// is set once the member paid or walked away.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct BillMember {
    pub id: Option<BillMemberId>,
    pub customer_id: CustomerId,
    pub bill_owner: bool,
    pub joined_at: Option<DateTime<Utc>>,
    pub leave_at: Option<DateTime<Utc>>,
    pub couvert_value: Decimal,
}

impl BillMember {
    pub fn owner(customer_id: CustomerId, couvert_value: Decimal, now: DateTime<Utc>) -> Self {
        Self {
            id: None,
            customer_id,
            bill_owner: true,
            joined_at: Some(now),
            leave_at: None,
            couvert_value,
        }
    }

    pub fn request(customer_id: CustomerId, couvert_value: Decimal) -> Self {
        Self {
            id: None,
            customer_id,
            bill_owner: false,
            joined_at: None,
            leave_at: None,
            couvert_value,
        }
    }

    pub fn accept(&mut self, now: DateTime<Utc>) {
        if self.joined_at.is_none() {
            self.joined_at = Some(now);
        }
    }

    pub fn leave(&mut self, now: DateTime<Utc>) {
        if self.leave_at.is_none() {
            self.leave_at = Some(now);
        }
    }

    /// still holds the seat, pending requests included
    pub fn is_active(&self) -> bool {
        self.leave_at.is_none()
    }

    pub fn is_pending(&self) -> bool {
        self.joined_at.is_none() && self.leave_at.is_none()
    }

    pub fn has_joined(&self) -> bool {
        self.joined_at.is_some()
    }

    /// member that can order and pay right now
    pub fn is_seated(&self) -> bool {
        self.has_joined() && self.is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn request_then_accept() {
        let mut member = BillMember::request(2, Decimal::ZERO);
        assert!(member.is_pending());
        assert!(member.is_active());
        assert!(!member.is_seated());

        member.accept(at(5));
        assert!(member.is_seated());
        member.accept(at(9));
        assert_eq!(member.joined_at, Some(at(5)));
    }

    #[test]
    fn leave_keeps_first_timestamp() {
        let mut member = BillMember::owner(1, Decimal::ONE, at(0));
        member.leave(at(3));
        member.leave(at(4));
        assert_eq!(member.leave_at, Some(at(3)));
        assert!(!member.is_active());
        assert!(member.has_joined());
    }
}

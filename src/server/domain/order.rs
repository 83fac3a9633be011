use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::server::domain::error::BillError;
use crate::server::domain::establishment::MenuItem;
use crate::server::domain::member::CustomerId;

pub type OrderId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum OrderStatus {
    Pending,
    Preparing,
    Done,
    Rejected,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::Done => "DONE",
            OrderStatus::Rejected => "REJECTED",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "PREPARING" => Ok(Self::Preparing),
            "DONE" => Ok(Self::Done),
            "REJECTED" => Ok(Self::Rejected),
            s => Err(format!("Invalid OrderStatus: {s}")),
        }
    }
}

/// One line on a bill. `id` stays `None` until the row is persisted.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct Order {
    pub id: Option<OrderId>,
    pub customer_id: CustomerId,
    pub menu_item_id: i64,
    pub item_name: String,
    pub quantity: i32,
    pub observation: Option<String>,
    pub value_order: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub kitchen_accepted_at: Option<DateTime<Utc>>,
    pub kitchen_finished_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn new(
        customer_id: CustomerId,
        item: &MenuItem,
        quantity: i32,
        observation: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, BillError> {
        if quantity < 1 {
            return Err(BillError::InvalidQuantity);
        }
        Ok(Self::priced(
            customer_id,
            item,
            quantity,
            observation,
            item.price * Decimal::from(quantity),
            now,
        ))
    }

    /// Single unit at an offer price
    pub fn with_offer(
        customer_id: CustomerId,
        item: &MenuItem,
        price: Decimal,
        observation: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self::priced(customer_id, item, 1, observation, price, now)
    }

    fn priced(
        customer_id: CustomerId,
        item: &MenuItem,
        quantity: i32,
        observation: Option<String>,
        value_order: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            customer_id,
            menu_item_id: item.id,
            item_name: item.name.clone(),
            quantity,
            observation,
            value_order,
            status: OrderStatus::Pending,
            created_at: now,
            kitchen_accepted_at: None,
            kitchen_finished_at: None,
            canceled_at: None,
        }
    }

    pub fn total_price(&self) -> Decimal {
        self.value_order
    }

    /// Rejected orders are not charged
    pub fn counts_toward_bill(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::Pending | OrderStatus::Preparing | OrderStatus::Done
        )
    }

    /// kitchen takes the order
    pub fn accept(&mut self, now: DateTime<Utc>) -> Result<(), BillError> {
        self.transition(OrderStatus::Pending, OrderStatus::Preparing)?;
        self.kitchen_accepted_at = Some(now);
        Ok(())
    }

    /// kitchen finished preparing
    pub fn finish(&mut self, now: DateTime<Utc>) -> Result<(), BillError> {
        self.transition(OrderStatus::Preparing, OrderStatus::Done)?;
        self.kitchen_finished_at = Some(now);
        Ok(())
    }

    /// Staff refuses or cancels the order
    pub fn reject(&mut self, now: DateTime<Utc>) -> Result<(), BillError> {
        if self.kitchen_finished_at.is_some() {
            return Err(BillError::CannotCancelOrder);
        }
        if self.status == OrderStatus::Rejected {
            return Err(BillError::InvalidOrderTransition {
                from: self.status.as_str(),
                to: OrderStatus::Rejected.as_str(),
            });
        }
        self.status = OrderStatus::Rejected;
        self.canceled_at = Some(now);
        Ok(())
    }

    /// The customer may only withdraw an order the kitchen has not taken yet
    pub fn cancel_by_customer(
        &mut self,
        customer_id: CustomerId,
        now: DateTime<Utc>,
    ) -> Result<(), BillError> {
        if self.customer_id != customer_id {
            return Err(BillError::NotOrderOwner);
        }
        if self.kitchen_accepted_at.is_some() {
            return Err(BillError::CannotCancelOrder);
        }
        self.reject(now)
    }

    fn transition(&mut self, from: OrderStatus, to: OrderStatus) -> Result<(), BillError> {
        if self.status != from {
            return Err(BillError::InvalidOrderTransition {
                from: self.status.as_str(),
                to: to.as_str(),
            });
        }
        self.status = to;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn menu_item(id: i64, price: Decimal) -> MenuItem {
        MenuItem {
            id,
            establishment_id: 1,
            name: format!("item-{id}"),
            price,
            available: true,
            category_id: None,
            offer_id: None,
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn new_order_is_priced_by_quantity() {
        let order = Order::new(10, &menu_item(1, Decimal::new(1250, 2)), 3, None, at(0)).unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_price(), Decimal::new(3750, 2));
        assert!(order.counts_toward_bill());
    }

    #[test]
    fn zero_quantity_is_refused() {
        let err = Order::new(10, &menu_item(1, Decimal::ONE), 0, None, at(0)).unwrap_err();
        assert_eq!(err, BillError::InvalidQuantity);
    }

    #[test]
    fn kitchen_flow() {
        let mut order = Order::new(10, &menu_item(1, Decimal::ONE), 1, None, at(0)).unwrap();
        assert!(order.finish(at(1)).is_err());
        order.accept(at(2)).unwrap();
        assert_eq!(order.status, OrderStatus::Preparing);
        assert_eq!(order.kitchen_accepted_at, Some(at(2)));
        order.finish(at(3)).unwrap();
        assert_eq!(order.status, OrderStatus::Done);
        assert_eq!(order.kitchen_finished_at, Some(at(3)));
    }

    #[test]
    fn finished_order_cannot_be_rejected() {
        let mut order = Order::new(10, &menu_item(1, Decimal::ONE), 1, None, at(0)).unwrap();
        order.accept(at(1)).unwrap();
        order.finish(at(2)).unwrap();
        assert_eq!(order.reject(at(3)), Err(BillError::CannotCancelOrder));
        assert!(order.canceled_at.is_none());
    }

    #[test]
    fn preparing_order_can_be_rejected_by_staff() {
        let mut order = Order::new(10, &menu_item(1, Decimal::ONE), 1, None, at(0)).unwrap();
        order.accept(at(1)).unwrap();
        order.reject(at(2)).unwrap();
        assert_eq!(order.status, OrderStatus::Rejected);
        assert!(!order.counts_toward_bill());
        assert!(order.reject(at(3)).is_err());
    }

    #[test]
    fn customer_cancel_rules() {
        let mut order = Order::new(10, &menu_item(1, Decimal::ONE), 1, None, at(0)).unwrap();
        assert_eq!(order.cancel_by_customer(11, at(1)), Err(BillError::NotOrderOwner));
        order.clone().cancel_by_customer(10, at(1)).unwrap();

        order.accept(at(2)).unwrap();
        assert_eq!(order.cancel_by_customer(10, at(3)), Err(BillError::CannotCancelOrder));
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Preparing,
            OrderStatus::Done,
            OrderStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("STATUS_X".parse::<OrderStatus>().is_err());
    }
}

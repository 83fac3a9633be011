//! Observable bill events and where they are delivered

use async_trait::async_trait;
use log::info;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::server::domain::bill::BillId;
use crate::server::domain::member::CustomerId;
use crate::server::domain::order::OrderId;

/// Who should hear about an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Audience {
    /// every active member of the bill
    Customers,
    Customer(CustomerId),
    Waiters,
    Kitchen,
    DoorStaff,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "key", rename_all = "snake_case")]
pub(crate) enum Notification {
    BillOpened { table_id: i64 },
    JoinRequested { customer_id: CustomerId, owner_id: Option<CustomerId> },
    JoinAnswered { customer_id: CustomerId, accepted: bool },
    MemberLeft { customer_id: CustomerId },
    NewOrder { customer_id: CustomerId, item_name: String, quantity: i32 },
    OfferUnlocked { offer_id: i64 },
    OrderAccepted { order_id: Option<OrderId> },
    OrderReady { order_id: Option<OrderId> },
    OrderRefused { order_id: Option<OrderId> },
    OrderCancelled { order_id: Option<OrderId> },
    PaymentCreated { payment_uuid: String, customer_id: Option<CustomerId>, value: Decimal },
    PaymentAccepted { payment_uuid: String, value: Decimal },
    PaymentRefused { payment_uuid: String, value: Decimal },
    WaiterCalled { table_id: i64, customer_id: CustomerId },
    BillClosed,
}

impl Notification {
    pub fn audience(&self) -> Vec<Audience> {
        match self {
            Notification::BillOpened { .. } | Notification::WaiterCalled { .. } => {
                vec![Audience::Waiters]
            }
            Notification::JoinRequested { owner_id, .. } => {
                owner_id.iter().map(|id| Audience::Customer(*id)).collect()
            }
            Notification::JoinAnswered { customer_id, .. } => vec![Audience::Customer(*customer_id)],
            Notification::MemberLeft { .. } | Notification::OfferUnlocked { .. } => {
                vec![Audience::Customers]
            }
            Notification::NewOrder { .. } => {
                vec![Audience::Kitchen, Audience::Waiters, Audience::Customers]
            }
            Notification::OrderAccepted { .. }
            | Notification::OrderReady { .. }
            | Notification::OrderRefused { .. }
            | Notification::PaymentRefused { .. } => vec![Audience::Customers],
            Notification::OrderCancelled { .. } => vec![Audience::Kitchen],
            Notification::PaymentCreated { .. } => vec![Audience::Customers, Audience::Waiters],
            Notification::PaymentAccepted { .. } | Notification::BillClosed => {
                vec![Audience::Customers, Audience::DoorStaff]
            }
        }
    }
}

#[async_trait]
pub(crate) trait Notifier: Send + Sync {
    async fn notify(&self, bill_id: BillId, notification: &Notification);
}

/// Writes every event to the log, stands in for push delivery
pub(crate) struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, bill_id: BillId, notification: &Notification) {
        let payload = serde_json::to_string(notification).unwrap_or_default();
        info!(
            "bill={} audience={:?} event={}",
            bill_id,
            notification.audience(),
            payload
        );
    }
}

pub(crate) async fn dispatch(notifier: &dyn Notifier, bill_id: BillId, events: Vec<Notification>) {
    for event in events.iter() {
        notifier.notify(bill_id, event).await;
    }
}

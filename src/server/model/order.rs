use serde::{Deserialize, Serialize};

use crate::server::domain::establishment::MenuItemId;
use crate::server::domain::member::CustomerId;
use crate::server::model::bill::BillView;

#[derive(Debug, Deserialize)]
pub(crate) struct OrderItemRequest {
    pub menu_item_id: MenuItemId,
    pub quantity: i32,
    pub observation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PostOrdersRequest {
    pub customer_id: CustomerId,
    pub items: Vec<OrderItemRequest>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PostOfferOrderRequest {
    pub customer_id: CustomerId,
    pub menu_item_id: MenuItemId,
    pub offer_id: i64,
    pub observation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum OrderAction {
    Accept,
    Finish,
    Reject,
    Cancel,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PatchOrderRequest {
    pub action: OrderAction,
    /// only needed to cancel
    pub customer_id: Option<CustomerId>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PostOrdersResponse {
    pub offers_unlocked: Vec<i64>,
    pub bill: BillView,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_is_snake_case() {
        let req: PatchOrderRequest = serde_json::from_str(r#"{"action":"finish"}"#).unwrap();
        assert_eq!(req.action, OrderAction::Finish);
        assert!(req.customer_id.is_none());
        assert!(serde_json::from_str::<PatchOrderRequest>(r#"{"action":"eat"}"#).is_err());
    }
}

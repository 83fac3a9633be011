use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::server::domain::bill::{Bill, BillId};
use crate::server::domain::establishment::{EstablishmentId, TableId};
use crate::server::domain::member::{BillMember, CustomerId};
use crate::server::domain::money::round2;
use crate::server::domain::order::Order;
use crate::server::domain::payment::BillPayment;

#[derive(Debug, Deserialize)]
pub(crate) struct PostBillsRequest {
    pub establishment_id: EstablishmentId,
    pub table_id: TableId,
    pub customer_id: CustomerId,
}

/// Body for every action a customer takes on their own behalf
#[derive(Debug, Deserialize)]
pub(crate) struct CustomerRequest {
    pub customer_id: CustomerId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnswerJoinRequest {
    pub owner_id: CustomerId,
    pub customer_id: CustomerId,
    pub accept: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CloseBillRequest {
    /// defaults to whatever is still missing
    pub value: Option<Decimal>,
}

/// Staff close answer; `payment` is empty when nothing was left to pay
#[derive(Debug, Serialize)]
pub(crate) struct CloseBillResponse {
    pub payment: Option<BillPayment>,
    pub bill_closed: bool,
    pub bill: BillView,
}

#[derive(Debug, Serialize)]
pub(crate) struct BillView {
    pub id: Option<BillId>,
    pub establishment_id: EstablishmentId,
    pub table_id: TableId,
    pub opening_date: DateTime<Utc>,
    pub payment_date: Option<DateTime<Utc>>,
    pub open: bool,
    pub number_of_customers: usize,
    pub orders_total: Decimal,
    pub couvert_for_all: Decimal,
    pub service_tax: Decimal,
    pub noruh_fee_for_all: Decimal,
    pub all_value: Decimal,
    pub value_paid: Decimal,
    pub still_to_pay: Decimal,
    pub offers_available: i32,
    pub members: Vec<BillMember>,
    pub orders: Vec<Order>,
    pub payments: Vec<BillPayment>,
}

impl From<&Bill> for BillView {
    fn from(bill: &Bill) -> Self {
        Self {
            id: bill.id,
            establishment_id: bill.establishment_id,
            table_id: bill.table_id,
            opening_date: bill.opening_date,
            payment_date: bill.payment_date,
            open: bill.is_open(),
            number_of_customers: bill.number_of_customers(),
            orders_total: bill.orders_total(),
            couvert_for_all: bill.couvert_for_all(),
            service_tax: round2(bill.service_tax()),
            noruh_fee_for_all: bill.noruh_fee_for_all(),
            all_value: bill.all_value(),
            value_paid: bill.value_paid,
            still_to_pay: bill.still_to_pay(),
            offers_available: (bill.offers_made_count - bill.offers_used_count).max(0),
            members: bill.members.clone(),
            orders: bill.orders.clone(),
            payments: bill.payments.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::domain::establishment::{Establishment, Fees, Table};

    #[test]
    fn view_carries_totals() {
        let establishment = Establishment {
            id: 1,
            name: "Cantina".to_string(),
            enabled: true,
            fees: Fees { couvert: Decimal::new(500, 2), ..Fees::default() },
        };
        let table = Table {
            id: 2,
            establishment_id: 1,
            name: "T2".to_string(),
            enabled: true,
            remote: false,
        };
        let now = DateTime::<Utc>::from_timestamp(0, 0).unwrap();
        let bill = Bill::open(&establishment, &table, 9, false, false, now).unwrap();
        let view = BillView::from(&bill);
        assert!(view.open);
        assert_eq!(view.all_value, Decimal::new(500, 2));
        assert_eq!(view.members.len(), 1);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["still_to_pay"], "5.00");
        assert_eq!(json["offers_available"], 0);
    }
}

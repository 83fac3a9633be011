use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::server::domain::bill::PaymentRequest;
use crate::server::domain::establishment::Promotion;
use crate::server::domain::member::CustomerId;
use crate::server::domain::money::round2;
use crate::server::domain::payment::BillPayment;
use crate::server::model::bill::BillView;

#[derive(Debug, Deserialize)]
pub(crate) struct PaymentBody {
    pub payment_uuid: String,
    pub customer_id: CustomerId,
    pub value: Decimal,
    pub noruh_fee: Option<Decimal>,
    pub promocode: Option<String>,
}

impl PaymentBody {
    pub fn into_request(self, promotion: Option<Promotion>) -> PaymentRequest {
        PaymentRequest {
            payment_uuid: self.payment_uuid,
            customer_id: self.customer_id,
            value: round2(self.value),
            noruh_fee: self.noruh_fee.map(round2),
            promotion,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct OnlinePaymentBody {
    #[serde(flatten)]
    pub payment: PaymentBody,
    /// opaque card reference issued by the gateway
    pub card_token: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct PaymentResponse {
    pub payment: BillPayment,
    pub bill_closed: bool,
    pub bill: BillView,
}

#[derive(Debug, Serialize)]
pub(crate) struct GetPaymentsResponse {
    pub payments: Vec<BillPayment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn online_body_flattens_payment() {
        let body: OnlinePaymentBody = serde_json::from_str(
            r#"{"payment_uuid":"u1","customer_id":3,"value":"10.005","card_token":"tok"}"#,
        )
        .unwrap();
        assert_eq!(body.card_token, "tok");
        let request = body.payment.into_request(None);
        assert_eq!(request.value, Decimal::new(1001, 2));
        assert!(request.noruh_fee.is_none());
    }
}

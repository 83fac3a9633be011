use serde::{Deserialize, Serialize};

use crate::server::database::repository::BillHistoryEntry;
use crate::server::domain::bill::BillId;
use crate::server::domain::member::CustomerId;

#[derive(Debug, Deserialize)]
pub(crate) struct PostEvaluationRequest {
    pub customer_id: CustomerId,
    pub rating: i16,
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct WaiterCallResponse {
    pub id: i64,
    pub bill_id: BillId,
    pub table_id: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct GetBillHistoryResponse {
    pub bills: Vec<BillHistoryEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_is_optional() {
        let body: PostEvaluationRequest =
            serde_json::from_str(r#"{"customer_id": 2, "rating": 5}"#).unwrap();
        assert_eq!(body.rating, 5);
        assert!(body.comment.is_none());
        assert!(serde_json::from_str::<PostEvaluationRequest>(r#"{"customer_id": 2}"#).is_err());
    }
}

use actix_web::http::header::ContentType;
use actix_web::http::StatusCode;
use actix_web::{error, HttpResponse};
use derive_more::{Display, Error};
use log::{error, warn};
use tokio_postgres::error::SqlState;

use crate::server::domain::error::BillError;

#[derive(Debug, Display, Error)]
pub(crate) enum CustomError {
    #[display("server is busy")]
    ServerIsBusy,
    #[display("invalid request")]
    BadRequest,
    #[display("database error")]
    DbError,
    #[display("timeout occurred")]
    Timeout,
    #[display("resource not found")]
    ResourceNotFound,
    #[display("request conflicts with current state")]
    Conflict,
    #[display("payment gateway unavailable")]
    PaymentGatewayError,
    #[display("{_0}")]
    Rejected(#[error(not(source))] BillError),
}

impl CustomError {
    /// Log a business rule violation and wrap it
    pub fn rejected(op: &str, e: BillError) -> Self {
        warn!("{} rejected, {}", op, e);
        CustomError::Rejected(e)
    }

    /// Log a persistence failure; unique violations mean a concurrent request won
    pub fn db(op: &str, e: impl Into<anyhow::Error>) -> Self {
        let e = e.into();
        let unique_violation = e
            .chain()
            .filter_map(|cause| cause.downcast_ref::<tokio_postgres::Error>())
            .any(|pg| pg.code() == Some(&SqlState::UNIQUE_VIOLATION));
        if unique_violation {
            warn!("{} lost a race, {:#}", op, e);
            return CustomError::Conflict;
        }
        error!("{} failed, {:#}", op, e);
        CustomError::DbError
    }
}

fn bill_error_status(e: &BillError) -> StatusCode {
    match e {
        BillError::TableNotFound
        | BillError::OrderNotFound
        | BillError::PaymentNotFound
        | BillError::PromotionNotFound
        | BillError::JoinRequestNotFound => StatusCode::NOT_FOUND,
        BillError::OpenBillExists
        | BillError::TableNotAvailable
        | BillError::BillClosed
        | BillError::DuplicatePayment
        | BillError::AlreadyPaid
        | BillError::AlreadyRated
        | BillError::InvalidOrderTransition { .. }
        | BillError::InvalidPaymentTransition { .. } => StatusCode::CONFLICT,
        BillError::NotBillMember | BillError::NotBillOwner | BillError::NotOrderOwner => {
            StatusCode::FORBIDDEN
        }
        BillError::EstablishmentDisabled
        | BillError::CannotLeaveBill
        | BillError::ItemNotInEstablishment
        | BillError::ItemUnavailable
        | BillError::InvalidQuantity
        | BillError::OfferLimitReached
        | BillError::ItemNotInOfferCategory
        | BillError::CannotCancelOrder
        | BillError::InvalidPaymentValue
        | BillError::MustPayWholeBill
        | BillError::ExceedsRemaining
        | BillError::InvalidPlatformFee
        | BillError::FeeLimitReached
        | BillError::BelowRemaining
        | BillError::NotPaidYet
        | BillError::InvalidRating
        | BillError::PromotionAlreadyUsed => StatusCode::UNPROCESSABLE_ENTITY,
        BillError::PromotionDisabled => StatusCode::NOT_ACCEPTABLE,
    }
}

impl error::ResponseError for CustomError {
    fn status_code(&self) -> StatusCode {
        match self {
            CustomError::ServerIsBusy | CustomError::DbError => StatusCode::INTERNAL_SERVER_ERROR,
            CustomError::BadRequest => StatusCode::BAD_REQUEST,
            CustomError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            CustomError::ResourceNotFound => StatusCode::NOT_FOUND,
            CustomError::Conflict => StatusCode::CONFLICT,
            CustomError::PaymentGatewayError => StatusCode::BAD_GATEWAY,
            CustomError::Rejected(e) => bill_error_status(e),
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::plaintext())
            .body(self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::ResponseError;

    #[test]
    fn rule_violations_map_to_client_errors() {
        assert_eq!(
            CustomError::Rejected(BillError::AlreadyPaid).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            CustomError::Rejected(BillError::NotBillOwner).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            CustomError::Rejected(BillError::ExceedsRemaining).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            CustomError::Rejected(BillError::PaymentNotFound).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            CustomError::Rejected(BillError::PromotionDisabled).status_code(),
            StatusCode::NOT_ACCEPTABLE
        );
        assert_eq!(
            CustomError::Rejected(BillError::AlreadyRated).status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn body_is_the_display_string() {
        let e = CustomError::Rejected(BillError::MustPayWholeBill);
        assert_eq!(e.to_string(), "the last member must pay the whole bill");
        assert_eq!(CustomError::Timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn non_database_errors_are_db_errors() {
        let e = CustomError::db("test", anyhow::anyhow!("boom"));
        assert!(matches!(e, CustomError::DbError));
    }
}

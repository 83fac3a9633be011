use actix_web::{get, post, web, HttpRequest, Responder};
use log::{error, info};
use tokio_postgres::Transaction;

use crate::server::controller::error::CustomError;
use crate::server::controller::{commit_bill, lock_bill, timed};
use crate::server::database::repository;
use crate::server::domain::bill::{Bill, BillId, PaymentRequest};
use crate::server::domain::error::BillError;
use crate::server::domain::establishment::Promotion;
use crate::server::domain::money::to_cents;
use crate::server::domain::payment::FeeSplit;
use crate::server::gateway::{ChargeRequest, GatewayCharge};
use crate::server::model::bill::BillView;
use crate::server::model::payment::{GetPaymentsResponse, OnlinePaymentBody, PaymentBody, PaymentResponse};
use crate::server::model::CommonRequestParams;
use crate::server::state::AppState;
use crate::server::util::time::helper::get_utc_now;

/// Resolve the promocode and the cross-bill uuid check for a payment body
async fn prepare(
    tx: &Transaction<'_>,
    bill: &Bill,
    body: PaymentBody,
    op: &str,
) -> Result<(PaymentRequest, bool), CustomError> {
    let promotion: Option<Promotion> = match body.promocode.as_deref() {
        Some(code) => Some(
            repository::find_promotion(tx, bill.establishment_id, code)
                .await
                .map_err(|e| CustomError::db(op, e))?
                .ok_or_else(|| CustomError::rejected(op, BillError::PromotionNotFound))?,
        ),
        None => None,
    };
    let uuid_taken = repository::payment_uuid_exists(tx, &body.payment_uuid)
        .await
        .map_err(|e| CustomError::db(op, e))?;
    Ok((body.into_request(promotion), uuid_taken))
}

fn payment_response(bill: &Bill, payment_uuid: &str, bill_closed: bool) -> Result<PaymentResponse, CustomError> {
    let payment = bill
        .payments
        .iter()
        .find(|p| p.payment_uuid == payment_uuid)
        .cloned()
        .ok_or(CustomError::ResourceNotFound)?;
    Ok(PaymentResponse {
        payment,
        bill_closed,
        bill: BillView::from(bill),
    })
}

#[post("/v1/bill/{id}/payments/offline")]
/// member declares a cash or card machine payment, waits for staff approval
pub(crate) async fn post_offline_payment(
    id: web::Path<BillId>,
    body: web::Json<PaymentBody>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    const OP: &str = "post_offline_payment";
    let body = body.into_inner();
    let mut conn = data.write_conn().await?;
    timed(&data, OP, async {
        let tx = conn.transaction().await.map_err(|e| CustomError::db(OP, e))?;
        let mut bill = lock_bill(&tx, id.into_inner(), OP).await?;
        let (request, uuid_taken) = prepare(&tx, &bill, body, OP).await?;
        bill.record_offline_payment(&request, uuid_taken, get_utc_now())
            .map_err(|e| CustomError::rejected(OP, e))?;
        commit_bill(&data, tx, &mut bill, OP).await?;
        Ok(web::Json(payment_response(&bill, &request.payment_uuid, false)?))
    })
    .await
}

/// What the gateway is asked to charge, the payment uuid doubles as idempotency key
fn charge_request(request: &PaymentRequest, split: &FeeSplit, card_token: String) -> Result<ChargeRequest, BillError> {
    Ok(ChargeRequest {
        reference: request.payment_uuid.clone(),
        customer_id: request.customer_id,
        amount: to_cents(split.charged)?,
        card_token,
        platform_amount: to_cents(split.platform_value)?,
        establishment_pays_fee: split.establishment_pays_fee,
    })
}

#[post("/v1/bill/{id}/payments/online")]
/// charge the member's card through the gateway
pub(crate) async fn post_online_payment(
    id: web::Path<BillId>,
    body: web::Json<OnlinePaymentBody>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    const OP: &str = "post_online_payment";
    let OnlinePaymentBody { payment, card_token } = body.into_inner();
    let bill_id = id.into_inner();
    let mut conn = data.write_conn().await?;

    // a. the payment is stored in analysis and the lock released before the card is touched
    let charge = timed(&data, OP, async {
        let tx = conn.transaction().await.map_err(|e| CustomError::db(OP, e))?;
        let mut bill = lock_bill(&tx, bill_id, OP).await?;
        let (request, uuid_taken) = prepare(&tx, &bill, payment, OP).await?;
        let split = bill
            .begin_online_payment(&request, uuid_taken, &data.rates, get_utc_now())
            .map_err(|e| CustomError::rejected(OP, e))?;
        let charge = charge_request(&request, &split, card_token).map_err(|e| CustomError::rejected(OP, e))?;
        commit_bill(&data, tx, &mut bill, OP).await?;
        Ok(charge)
    })
    .await?;

    // b. bounded by the gateway client's own timeout, an unanswered charge is left to the poller
    let GatewayCharge {
        id: gateway_payment_id,
        status,
    } = data.gateway.charge(&charge).await.map_err(|e| {
        error!(
            "{} gateway charge for payment={} failed, left in analysis, {:#}",
            OP, charge.reference, e
        );
        CustomError::PaymentGatewayError
    })?;
    info!(
        "payment={} charged {} cents status={}",
        charge.reference,
        charge.amount,
        status.as_str()
    );

    // c. record the gateway's answer
    timed(&data, OP, async {
        let tx = conn.transaction().await.map_err(|e| CustomError::db(OP, e))?;
        let mut bill = lock_bill(&tx, bill_id, OP).await?;
        let settlement = bill
            .attach_gateway_charge(&charge.reference, gateway_payment_id, status, get_utc_now())
            .map_err(|e| CustomError::rejected(OP, e))?;
        commit_bill(&data, tx, &mut bill, OP).await?;
        Ok(web::Json(payment_response(&bill, &charge.reference, settlement.bill_closed)?))
    })
    .await
}

#[post("/v1/bill/{id}/payment/{uuid}/approve")]
/// staff confirms an offline payment was received
pub(crate) async fn post_approve_payment(
    path: web::Path<(BillId, String)>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    const OP: &str = "post_approve_payment";
    let (bill_id, payment_uuid) = path.into_inner();
    let mut conn = data.write_conn().await?;
    timed(&data, OP, async {
        let tx = conn.transaction().await.map_err(|e| CustomError::db(OP, e))?;
        let mut bill = lock_bill(&tx, bill_id, OP).await?;
        let settlement = bill
            .approve_offline_payment(&payment_uuid, get_utc_now())
            .map_err(|e| CustomError::rejected(OP, e))?;
        commit_bill(&data, tx, &mut bill, OP).await?;
        info!("payment={} approved on bill={}", payment_uuid, bill_id);
        Ok(web::Json(payment_response(&bill, &payment_uuid, settlement.bill_closed)?))
    })
    .await
}

#[post("/v1/bill/{id}/payment/{uuid}/reject")]
/// staff refuses an offline payment, the member may pay again
pub(crate) async fn post_reject_payment(
    path: web::Path<(BillId, String)>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    const OP: &str = "post_reject_payment";
    let (bill_id, payment_uuid) = path.into_inner();
    let mut conn = data.write_conn().await?;
    timed(&data, OP, async {
        let tx = conn.transaction().await.map_err(|e| CustomError::db(OP, e))?;
        let mut bill = lock_bill(&tx, bill_id, OP).await?;
        bill.reject_offline_payment(&payment_uuid, get_utc_now())
            .map_err(|e| CustomError::rejected(OP, e))?;
        commit_bill(&data, tx, &mut bill, OP).await?;
        Ok(web::Json(payment_response(&bill, &payment_uuid, false)?))
    })
    .await
}

#[get("/v1/bill/{id}/payments")]
/// payments of a bill, oldest first
pub(crate) async fn get_payments(
    id: web::Path<BillId>,
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    const OP: &str = "get_payments";
    let CommonRequestParams {
        page: maybe_page,
        page_size: maybe_page_size,
    } = web::Query::<CommonRequestParams>::from_query(req.query_string())
        .map_err(|_| CustomError::BadRequest)?
        .into_inner();
    let (page, page_size) = (maybe_page.unwrap_or(0) as usize, maybe_page_size.unwrap_or(20) as usize);
    let conn = data.read_conn().await?;
    timed(&data, OP, async {
        let bill = repository::load_bill(&*conn, id.into_inner(), false)
            .await
            .map_err(|e| CustomError::db(OP, e))?
            .ok_or(CustomError::ResourceNotFound)?;
        let payments = bill
            .payments
            .into_iter()
            .skip(page * page_size)
            .take(page_size)
            .collect();
        Ok(web::Json(GetPaymentsResponse { payments }))
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::domain::payment::PaymentStatus;
    use crate::server::gateway::tests::FixedGateway;
    use crate::server::state::tests::offline_state;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use rust_decimal::Decimal;
    use std::sync::Arc;

    #[actix_web::test]
    async fn bad_paging_is_rejected() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(offline_state()))
                .service(get_payments),
        )
        .await;
        let req = test::TestRequest::get()
            .uri("/v1/bill/1/payments?page=-1")
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    fn split(charged: Decimal, platform_value: Decimal) -> FeeSplit {
        FeeSplit {
            charged,
            establishment_value: charged - platform_value,
            platform_value,
            gateway_fee: Decimal::ZERO,
            establishment_pays_fee: false,
        }
    }

    fn request() -> PaymentRequest {
        PaymentRequest {
            payment_uuid: "pay-7".to_string(),
            customer_id: 4,
            value: Decimal::new(6000, 2),
            noruh_fee: Some(Decimal::new(200, 2)),
            promotion: None,
        }
    }

    #[::core::prelude::v1::test]
    fn charge_is_sent_in_cents_under_the_payment_uuid() {
        let charge = charge_request(
            &request(),
            &split(Decimal::new(6200, 2), Decimal::new(200, 2)),
            "tok".to_string(),
        )
        .unwrap();
        assert_eq!(charge.reference, "pay-7");
        assert_eq!(charge.amount, 6200);
        assert_eq!(charge.platform_amount, 200);
        assert_eq!(charge.card_token, "tok");
    }

    #[::core::prelude::v1::test]
    fn charge_too_large_for_cents_is_rejected() {
        assert_eq!(
            charge_request(&request(), &split(Decimal::MAX, Decimal::ZERO), "tok".to_string()),
            Err(BillError::InvalidPaymentValue)
        );
    }

    #[actix_web::test]
    async fn online_payment_without_database_never_reaches_the_gateway() {
        let gateway = Arc::new(FixedGateway::new(PaymentStatus::Authorized));
        let mut state = offline_state();
        state.gateway = gateway.clone();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .service(post_online_payment),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/v1/bill/1/payments/online")
            .set_json(serde_json::json!({
                "payment_uuid": "u", "customer_id": 1, "value": "10.00", "card_token": "tok"
            }))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(gateway.seen.lock().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn online_payment_needs_a_card_token() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(offline_state()))
                .service(post_online_payment),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/v1/bill/1/payments/online")
            .set_json(serde_json::json!({"payment_uuid": "u", "customer_id": 1, "value": "10.00"}))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}

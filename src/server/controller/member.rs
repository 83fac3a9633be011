use actix_web::{post, web, Responder};
use log::info;

use crate::server::controller::error::CustomError;
use crate::server::controller::{commit_bill, lock_bill, timed};
use crate::server::database::repository;
use crate::server::domain::bill::BillId;
use crate::server::model::bill::{AnswerJoinRequest, BillView, CustomerRequest};
use crate::server::state::AppState;
use crate::server::util::time::helper::get_utc_now;

#[post("/v1/bill/{id}/members")]
/// ask the owner for a seat on the bill
pub(crate) async fn post_join_request(
    id: web::Path<BillId>,
    body: web::Json<CustomerRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    const OP: &str = "post_join_request";
    let mut conn = data.write_conn().await?;
    timed(&data, OP, async {
        let tx = conn.transaction().await.map_err(|e| CustomError::db(OP, e))?;
        let mut bill = lock_bill(&tx, id.into_inner(), OP).await?;
        let seated_elsewhere = repository::customer_is_active(&tx, body.customer_id)
            .await
            .map_err(|e| CustomError::db(OP, e))?;
        bill.request_join(body.customer_id, seated_elsewhere)
            .map_err(|e| CustomError::rejected(OP, e))?;
        commit_bill(&data, tx, &mut bill, OP).await?;
        Ok(web::Json(BillView::from(&bill)))
    })
    .await
}

#[post("/v1/bill/{id}/members/answer")]
/// owner accepts or declines one join request
pub(crate) async fn post_answer_join(
    id: web::Path<BillId>,
    body: web::Json<AnswerJoinRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    const OP: &str = "post_answer_join";
    let mut conn = data.write_conn().await?;
    timed(&data, OP, async {
        let tx = conn.transaction().await.map_err(|e| CustomError::db(OP, e))?;
        let mut bill = lock_bill(&tx, id.into_inner(), OP).await?;
        bill.answer_join(body.owner_id, body.customer_id, body.accept, get_utc_now())
            .map_err(|e| CustomError::rejected(OP, e))?;
        commit_bill(&data, tx, &mut bill, OP).await?;
        Ok(web::Json(BillView::from(&bill)))
    })
    .await
}

#[post("/v1/bill/{id}/members/accept-all")]
pub(crate) async fn post_accept_all(
    id: web::Path<BillId>,
    body: web::Json<CustomerRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    const OP: &str = "post_accept_all";
    let mut conn = data.write_conn().await?;
    timed(&data, OP, async {
        let tx = conn.transaction().await.map_err(|e| CustomError::db(OP, e))?;
        let mut bill = lock_bill(&tx, id.into_inner(), OP).await?;
        let accepted = bill
            .accept_all(body.customer_id, get_utc_now())
            .map_err(|e| CustomError::rejected(OP, e))?;
        commit_bill(&data, tx, &mut bill, OP).await?;
        info!("bill={:?} owner accepted {} join requests", bill.id, accepted);
        Ok(web::Json(BillView::from(&bill)))
    })
    .await
}

#[post("/v1/bill/{id}/members/cancel")]
/// withdraw one's own pending request
pub(crate) async fn post_cancel_join(
    id: web::Path<BillId>,
    body: web::Json<CustomerRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    const OP: &str = "post_cancel_join";
    let mut conn = data.write_conn().await?;
    timed(&data, OP, async {
        let tx = conn.transaction().await.map_err(|e| CustomError::db(OP, e))?;
        let mut bill = lock_bill(&tx, id.into_inner(), OP).await?;
        bill.cancel_join(body.customer_id)
            .map_err(|e| CustomError::rejected(OP, e))?;
        commit_bill(&data, tx, &mut bill, OP).await?;
        Ok(web::Json(BillView::from(&bill)))
    })
    .await
}

#[post("/v1/bill/{id}/members/leave")]
/// leave a bill that has nothing charged on it
pub(crate) async fn post_leave(
    id: web::Path<BillId>,
    body: web::Json<CustomerRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    const OP: &str = "post_leave";
    let mut conn = data.write_conn().await?;
    timed(&data, OP, async {
        let tx = conn.transaction().await.map_err(|e| CustomError::db(OP, e))?;
        let mut bill = lock_bill(&tx, id.into_inner(), OP).await?;
        bill.leave_without_payment(body.customer_id, get_utc_now())
            .map_err(|e| CustomError::rejected(OP, e))?;
        commit_bill(&data, tx, &mut bill, OP).await?;
        Ok(web::Json(BillView::from(&bill)))
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::state::tests::offline_state;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};

    #[actix_web::test]
    async fn answer_needs_a_decision() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(offline_state()))
                .service(post_answer_join),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/v1/bill/1/members/answer")
            .set_json(serde_json::json!({"owner_id": 1, "customer_id": 2}))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn leave_without_database_is_busy() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(offline_state()))
                .service(post_leave),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/v1/bill/1/members/leave")
            .set_json(serde_json::json!({"customer_id": 2}))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use log::info;

use crate::server::controller::error::CustomError;
use crate::server::controller::timed;
use crate::server::database::repository;
use crate::server::domain::bill::BillId;
use crate::server::domain::error::BillError;
use crate::server::domain::establishment::EstablishmentId;
use crate::server::domain::member::CustomerId;
use crate::server::model::bill::CustomerRequest;
use crate::server::model::feedback::{GetBillHistoryResponse, PostEvaluationRequest, WaiterCallResponse};
use crate::server::model::CommonRequestParams;
use crate::server::notify;
use crate::server::state::AppState;
use crate::server::util::time::helper::get_utc_now;

#[post("/v1/bill/{id}/evaluation")]
/// customer rates the establishment once their share is paid
pub(crate) async fn post_evaluation(
    id: web::Path<BillId>,
    body: web::Json<PostEvaluationRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    const OP: &str = "post_evaluation";
    let PostEvaluationRequest {
        customer_id,
        rating,
        comment,
    } = body.into_inner();
    let mut conn = data.write_conn().await?;
    timed(&data, OP, async {
        let tx = conn.transaction().await.map_err(|e| CustomError::db(OP, e))?;
        let bill = repository::load_bill(&tx, id.into_inner(), false)
            .await
            .map_err(|e| CustomError::db(OP, e))?
            .ok_or(CustomError::ResourceNotFound)?;
        let bill_id = bill.id.ok_or(CustomError::ResourceNotFound)?;
        let already_rated = repository::evaluation_exists(&tx, bill_id, customer_id)
            .await
            .map_err(|e| CustomError::db(OP, e))?;
        let mut evaluation = bill
            .rate(customer_id, rating, comment, already_rated, get_utc_now())
            .map_err(|e| CustomError::rejected(OP, e))?;
        // a concurrent rating of the same bill trips the unique index
        repository::insert_evaluation(&tx, &mut evaluation)
            .await
            .map_err(|e| CustomError::db(OP, e))?;
        tx.commit().await.map_err(|e| CustomError::db(OP, e))?;
        info!("bill={} rated {} by customer={}", bill_id, rating, customer_id);
        Ok(HttpResponse::Created().json(evaluation))
    })
    .await
}

#[get("/v1/bill/{id}/evaluation/{customer_id}")]
/// whether the customer already paid and already rated this bill
pub(crate) async fn get_evaluation_status(
    path: web::Path<(BillId, CustomerId)>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    const OP: &str = "get_evaluation_status";
    let (bill_id, customer_id) = path.into_inner();
    let conn = data.read_conn().await?;
    timed(&data, OP, async {
        let bill = repository::load_bill(&*conn, bill_id, false)
            .await
            .map_err(|e| CustomError::db(OP, e))?
            .ok_or(CustomError::ResourceNotFound)?;
        let already_rated = repository::evaluation_exists(&*conn, bill_id, customer_id)
            .await
            .map_err(|e| CustomError::db(OP, e))?;
        let status = bill
            .evaluation_status(customer_id, already_rated)
            .map_err(|e| CustomError::rejected(OP, e))?;
        Ok(web::Json(status))
    })
    .await
}

#[post("/v1/bill/{id}/waiter-call")]
/// seated member asks for a waiter at the table
pub(crate) async fn post_waiter_call(
    id: web::Path<BillId>,
    body: web::Json<CustomerRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    const OP: &str = "post_waiter_call";
    let customer_id = body.customer_id;
    let mut conn = data.write_conn().await?;
    timed(&data, OP, async {
        let tx = conn.transaction().await.map_err(|e| CustomError::db(OP, e))?;
        let mut bill = repository::load_bill(&tx, id.into_inner(), false)
            .await
            .map_err(|e| CustomError::db(OP, e))?
            .ok_or(CustomError::ResourceNotFound)?;
        let bill_id = bill.id.ok_or(CustomError::ResourceNotFound)?;
        bill.call_waiter(customer_id)
            .map_err(|e| CustomError::rejected(OP, e))?;
        let call_id = repository::insert_waiter_call(&tx, &bill, customer_id, get_utc_now())
            .await
            .map_err(|e| CustomError::db(OP, e))?;
        tx.commit().await.map_err(|e| CustomError::db(OP, e))?;

        info!("waiter called to table={} by customer={}", bill.table_id, customer_id);
        notify::dispatch(data.notifier.as_ref(), bill_id, bill.take_events()).await;
        Ok(HttpResponse::Created().json(WaiterCallResponse {
            id: call_id,
            bill_id,
            table_id: bill.table_id,
        }))
    })
    .await
}

#[get("/v1/customer/{id}/bills")]
/// bills the customer sat at, newest first
pub(crate) async fn get_bill_history(
    id: web::Path<CustomerId>,
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    const OP: &str = "get_bill_history";
    let CommonRequestParams {
        page: maybe_page,
        page_size: maybe_page_size,
    } = web::Query::<CommonRequestParams>::from_query(req.query_string())
        .map_err(|_| CustomError::BadRequest)?
        .into_inner();
    let (page, page_size) = (maybe_page.unwrap_or(0) as i64, maybe_page_size.unwrap_or(20) as i64);
    let conn = data.read_conn().await?;
    timed(&data, OP, async {
        let bills = repository::bill_history(&*conn, id.into_inner(), page_size, page * page_size)
            .await
            .map_err(|e| CustomError::db(OP, e))?;
        Ok(web::Json(GetBillHistoryResponse { bills }))
    })
    .await
}

#[get("/v1/establishment/{id}/promocode/{code}")]
/// check a promocode before paying with it
pub(crate) async fn get_promocode(
    path: web::Path<(EstablishmentId, String)>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    const OP: &str = "get_promocode";
    let (establishment_id, code) = path.into_inner();
    let conn = data.read_conn().await?;
    timed(&data, OP, async {
        let promotion = repository::find_promotion(&*conn, establishment_id, code.trim())
            .await
            .map_err(|e| CustomError::db(OP, e))?
            .ok_or_else(|| CustomError::rejected(OP, BillError::PromotionNotFound))?;
        promotion
            .ensure_enabled()
            .map_err(|e| CustomError::rejected(OP, e))?;
        Ok(web::Json(promotion))
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
    async fn evaluation_without_database_is_busy() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(offline_state()))
                .service(post_evaluation),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/v1/bill/1/evaluation")
            .set_json(serde_json::json!({"customer_id": 2, "rating": 5}))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[actix_web::test]
    async fn evaluation_needs_a_rating() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(offline_state()))
                .service(post_evaluation),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/v1/bill/1/evaluation")
            .set_json(serde_json::json!({"customer_id": 2, "rating": "great"}))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn history_rejects_bad_paging() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(offline_state()))
                .service(get_bill_history),
        )
        .await;
        let req = test::TestRequest::get()
            .uri("/v1/customer/2/bills?page_size=999")
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn waiter_call_needs_a_customer() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(offline_state()))
                .service(post_waiter_call),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/v1/bill/1/waiter-call")
            .set_json(serde_json::json!({}))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn promocode_check_without_database_is_busy() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(offline_state()))
                .service(get_promocode)
                .service(get_evaluation_status),
        )
        .await;
        for uri in ["/v1/establishment/1/promocode/WELCOME", "/v1/bill/1/evaluation/2"] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let res = test::call_service(&app, req).await;
            assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
}

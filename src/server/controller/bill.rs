use actix_web::{get, post, web, HttpResponse, Responder};
use log::info;

use crate::server::controller::error::CustomError;
use crate::server::controller::{commit_bill, lock_bill, timed};
use crate::server::database::repository;
use crate::server::domain::bill::{Bill, BillId};
use crate::server::domain::error::BillError;
use crate::server::domain::member::CustomerId;
use crate::server::model::bill::{BillView, CloseBillRequest, CloseBillResponse, PostBillsRequest};
use crate::server::notify;
use crate::server::state::AppState;
use crate::server::util::time::helper::get_utc_now;

#[post("/v1/bills")]
/// open a bill on a table, the caller becomes its owner
pub(crate) async fn post_bills(
    body: web::Json<PostBillsRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    const OP: &str = "post_bills";
    let body = body.into_inner();
    let mut conn = data.write_conn().await?;
    timed(&data, OP, async {
        let tx = conn.transaction().await.map_err(|e| CustomError::db(OP, e))?;
        let establishment = repository::find_establishment(&tx, body.establishment_id)
            .await
            .map_err(|e| CustomError::db(OP, e))?
            .ok_or(CustomError::ResourceNotFound)?;
        let table = repository::find_table(&tx, body.table_id)
            .await
            .map_err(|e| CustomError::db(OP, e))?
            .ok_or_else(|| CustomError::rejected(OP, BillError::TableNotFound))?;
        let owner_seated = repository::customer_is_active(&tx, body.customer_id)
            .await
            .map_err(|e| CustomError::db(OP, e))?;
        let table_busy = repository::table_has_open_bill(&tx, table.id)
            .await
            .map_err(|e| CustomError::db(OP, e))?;

        let mut bill = Bill::open(
            &establishment,
            &table,
            body.customer_id,
            owner_seated,
            table_busy,
            get_utc_now(),
        )
        .map_err(|e| CustomError::rejected(OP, e))?;
        let bill_id = repository::insert_bill(&tx, &mut bill)
            .await
            .map_err(|e| CustomError::db(OP, e))?;
        tx.commit().await.map_err(|e| CustomError::db(OP, e))?;

        info!("bill={} opened on table={} by customer={}", bill_id, table.id, body.customer_id);
        notify::dispatch(data.notifier.as_ref(), bill_id, bill.take_events()).await;
        Ok(HttpResponse::Created().json(BillView::from(&bill)))
    })
    .await
}

#[get("/v1/bill/{id}")]
/// bill summary with totals, members, orders and payments
pub(crate) async fn get_bill(id: web::Path<BillId>, data: web::Data<AppState>) -> Result<impl Responder, CustomError> {
    const OP: &str = "get_bill";
    let conn = data.read_conn().await?;
    timed(&data, OP, async {
        let bill = repository::load_bill(&*conn, id.into_inner(), false)
            .await
            .map_err(|e| CustomError::db(OP, e))?
            .ok_or(CustomError::ResourceNotFound)?;
        Ok(web::Json(BillView::from(&bill)))
    })
    .await
}

#[get("/v1/bill/{id}/members/{customer_id}/consumption")]
/// what one member owes for their own orders
pub(crate) async fn get_consumption(
    path: web::Path<(BillId, CustomerId)>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    const OP: &str = "get_consumption";
    let (bill_id, customer_id) = path.into_inner();
    let conn = data.read_conn().await?;
    timed(&data, OP, async {
        let bill = repository::load_bill(&*conn, bill_id, false)
            .await
            .map_err(|e| CustomError::db(OP, e))?
            .ok_or(CustomError::ResourceNotFound)?;
        let consumption = bill
            .member_consumption(customer_id)
            .map_err(|e| CustomError::rejected(OP, e))?;
        Ok(web::Json(consumption))
    })
    .await
}

#[post("/v1/bill/{id}/payments/close")]
/// staff settles whatever is left with one offline payment
pub(crate) async fn post_close_bill(
    id: web::Path<BillId>,
    body: web::Json<CloseBillRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    const OP: &str = "post_close_bill";
    let CloseBillRequest { value } = body.into_inner();
    let mut conn = data.write_conn().await?;
    timed(&data, OP, async {
        let tx = conn.transaction().await.map_err(|e| CustomError::db(OP, e))?;
        let mut bill = lock_bill(&tx, id.into_inner(), OP).await?;
        let payment = bill
            .close_with_offline_payment(value, get_utc_now())
            .map_err(|e| CustomError::rejected(OP, e))?
            .cloned();
        commit_bill(&data, tx, &mut bill, OP).await?;
        Ok(web::Json(CloseBillResponse {
            payment,
            bill_closed: true,
            bill: BillView::from(&bill),
        }))
    })
    .await
}

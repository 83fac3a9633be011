use actix_web::{patch, post, web, Responder};
use std::collections::HashMap;

use crate::server::controller::error::CustomError;
use crate::server::controller::{commit_bill, lock_bill, timed};
use crate::server::database::repository;
use crate::server::domain::bill::{BillId, OrderLine};
use crate::server::domain::error::BillError;
use crate::server::domain::order::OrderId;
use crate::server::model::bill::BillView;
use crate::server::model::order::{
    OrderAction, PatchOrderRequest, PostOfferOrderRequest, PostOrdersRequest, PostOrdersResponse,
};
use crate::server::state::AppState;
use crate::server::util::time::helper::get_utc_now;

#[post("/v1/bill/{id}/orders")]
/// place a batch of orders, all or nothing
pub(crate) async fn post_orders(
    id: web::Path<BillId>,
    body: web::Json<PostOrdersRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    const OP: &str = "post_orders";
    let PostOrdersRequest { customer_id, items } = body.into_inner();
    if items.is_empty() {
        return Err(CustomError::BadRequest);
    }
    let mut conn = data.write_conn().await?;
    timed(&data, OP, async {
        let tx = conn.transaction().await.map_err(|e| CustomError::db(OP, e))?;
        let mut bill = lock_bill(&tx, id.into_inner(), OP).await?;

        let ids = items.iter().map(|i| i.menu_item_id).collect::<Vec<_>>();
        let menu = repository::find_menu_items(&tx, &ids)
            .await
            .map_err(|e| CustomError::db(OP, e))?
            .into_iter()
            .map(|item| (item.id, item))
            .collect::<HashMap<_, _>>();
        let mut lines = Vec::with_capacity(items.len());
        for requested in items {
            let item = menu
                .get(&requested.menu_item_id)
                .cloned()
                .ok_or_else(|| CustomError::rejected(OP, BillError::ItemNotInEstablishment))?;
            lines.push(OrderLine {
                item,
                quantity: requested.quantity,
                observation: requested.observation,
            });
        }

        let offers_unlocked = bill
            .place_orders(customer_id, lines, get_utc_now())
            .map_err(|e| CustomError::rejected(OP, e))?;
        commit_bill(&data, tx, &mut bill, OP).await?;
        Ok(web::Json(PostOrdersResponse {
            offers_unlocked,
            bill: BillView::from(&bill),
        }))
    })
    .await
}

#[post("/v1/bill/{id}/orders/offer")]
/// redeem an unlocked offer on an item of its category
pub(crate) async fn post_offer_order(
    id: web::Path<BillId>,
    body: web::Json<PostOfferOrderRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    const OP: &str = "post_offer_order";
    let PostOfferOrderRequest {
        customer_id,
        menu_item_id,
        offer_id,
        observation,
    } = body.into_inner();
    let mut conn = data.write_conn().await?;
    timed(&data, OP, async {
        let tx = conn.transaction().await.map_err(|e| CustomError::db(OP, e))?;
        let mut bill = lock_bill(&tx, id.into_inner(), OP).await?;
        let item = repository::find_menu_items(&tx, &[menu_item_id])
            .await
            .map_err(|e| CustomError::db(OP, e))?
            .pop()
            .ok_or_else(|| CustomError::rejected(OP, BillError::ItemNotInEstablishment))?;
        let offer = repository::find_menu_offer(&tx, bill.establishment_id, offer_id)
            .await
            .map_err(|e| CustomError::db(OP, e))?
            .ok_or(CustomError::ResourceNotFound)?;

        bill.place_offer_order(customer_id, &item, &offer, observation, get_utc_now())
            .map_err(|e| CustomError::rejected(OP, e))?;
        commit_bill(&data, tx, &mut bill, OP).await?;
        Ok(web::Json(BillView::from(&bill)))
    })
    .await
}

#[patch("/v1/bill/{id}/order/{order_id}")]
/// kitchen and waiter transitions, or the customer withdrawing an order
pub(crate) async fn patch_order(
    path: web::Path<(BillId, OrderId)>,
    body: web::Json<PatchOrderRequest>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    const OP: &str = "patch_order";
    let (bill_id, order_id) = path.into_inner();
    let body = body.into_inner();
    if body.action == OrderAction::Cancel && body.customer_id.is_none() {
        return Err(CustomError::BadRequest);
    }
    let mut conn = data.write_conn().await?;
    timed(&data, OP, async {
        let tx = conn.transaction().await.map_err(|e| CustomError::db(OP, e))?;
        let mut bill = lock_bill(&tx, bill_id, OP).await?;
        let now = get_utc_now();
        match (body.action, body.customer_id) {
            (OrderAction::Accept, _) => bill.accept_order(order_id, now),
            (OrderAction::Finish, _) => bill.finish_order(order_id, now),
            (OrderAction::Reject, _) => bill.reject_order(order_id, now),
            (OrderAction::Cancel, Some(customer_id)) => bill.cancel_order(customer_id, order_id, now),
            (OrderAction::Cancel, None) => return Err(CustomError::BadRequest),
        }
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
    async fn empty_order_batch_is_a_bad_request() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(offline_state()))
                .service(post_orders),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/v1/bill/1/orders")
            .set_json(serde_json::json!({"customer_id": 3, "items": []}))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn cancel_needs_the_customer() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(offline_state()))
                .service(patch_order),
        )
        .await;
        let req = test::TestRequest::patch()
            .uri("/v1/bill/1/order/2")
            .set_json(serde_json::json!({"action": "cancel"}))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::patch()
            .uri("/v1/bill/1/order/2")
            .set_json(serde_json::json!({"action": "accept"}))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

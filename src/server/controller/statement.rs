use actix_web::{get, web, Responder};

use crate::server::controller::error::CustomError;
use crate::server::controller::timed;
use crate::server::database::repository;
use crate::server::domain::establishment::EstablishmentId;
use crate::server::domain::report::{month_bounds, monthly_statement};
use crate::server::model::StatementQuery;
use crate::server::state::AppState;

#[get("/v1/establishment/{id}/statement")]
/// monthly takings and what is owed to the platform
pub(crate) async fn get_statement(
    id: web::Path<EstablishmentId>,
    query: web::Query<StatementQuery>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    const OP: &str = "get_statement";
    let StatementQuery { year, month } = query.into_inner();
    let (from, until) = month_bounds(year, month).ok_or(CustomError::BadRequest)?;
    let conn = data.read_conn().await?;
    timed(&data, OP, async {
        let establishment = repository::find_establishment(&*conn, id.into_inner())
            .await
            .map_err(|e| CustomError::db(OP, e))?
            .ok_or(CustomError::ResourceNotFound)?;
        let payments = repository::payments_between(&*conn, establishment.id, from, until)
            .await
            .map_err(|e| CustomError::db(OP, e))?;
        Ok(web::Json(monthly_statement(&establishment, &payments, year, month)))
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
    async fn invalid_month_is_a_bad_request() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(offline_state()))
                .service(get_statement),
        )
        .await;
        let req = test::TestRequest::get()
            .uri("/v1/establishment/1/statement?year=2024&month=13")
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(test::read_body(res).await, "invalid request");
    }
}

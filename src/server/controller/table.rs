use actix_web::{get, web, Responder};

use crate::server::controller::error::CustomError;
use crate::server::controller::timed;
use crate::server::database::repository;
use crate::server::model::table::{GetTablesQuery, GetTablesResponse, TableView};
use crate::server::state::AppState;

#[get("/v1/tables")]
/// tables of an establishment with their availability
pub(crate) async fn get_tables(
    query: web::Query<GetTablesQuery>,
    data: web::Data<AppState>,
) -> Result<impl Responder, CustomError> {
    const OP: &str = "get_tables";
    let conn = data.read_conn().await?;
    timed(&data, OP, async {
        let tables = repository::list_tables(&*conn, query.establishment_id)
            .await
            .map_err(|e| CustomError::db(OP, e))?
            .into_iter()
            .map(|(table, bill_ids)| TableView::new(table, bill_ids))
            .collect::<Vec<_>>();
        Ok(web::Json(GetTablesResponse { tables }))
    })
    .await
}

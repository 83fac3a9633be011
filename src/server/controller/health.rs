use actix_web::{get, web, Responder};

#[get("/health")]
pub(crate) async fn get_health() -> impl Responder {
    web::Json(serde_json::json!({ "status": "ok" }))
}

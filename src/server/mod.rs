//! main file for the server

pub(crate) mod controller;
pub(crate) mod domain;
pub(crate) mod gateway;
pub mod model;
pub(crate) mod notify;
pub(crate) mod state;

pub(crate) mod database {
    pub(crate) mod connection;
    pub(crate) mod pool;
    pub(crate) mod pool_config;
    pub(crate) mod repository;
}

pub(crate) mod scheduler {
    pub(crate) mod job;
}

pub(crate) mod util {
    pub(crate) mod time;
}

use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::{Context, Error};
use log::info;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::server::controller::{bill, feedback, health, member, order, payment, statement, table};
use crate::server::database::pool::Pool;
use crate::server::gateway::HttpGateway;
use crate::server::model::config::ServerConfig;
use crate::server::notify::LogNotifier;
use crate::server::scheduler::job::payment_poller;
use crate::server::state::AppState;

/// Run the server
pub async fn run(config: ServerConfig) -> Result<(), Error> {
    let (db_read_pool, db_write_pool) = (
        Pool::connect(&config.read_pool)
            .await
            .context("failed to init read pool")?,
        Pool::connect(&config.write_pool)
            .await
            .context("failed to init write pool")?,
    );
    let state = AppState::new(
        db_read_pool,
        db_write_pool,
        config.db_timeout,
        config.gateway_timeout,
        Arc::new(HttpGateway::new(config.gateway_url.clone(), config.gateway_timeout)?),
        Arc::new(LogNotifier),
        config.gateway_rates,
    );

    let cancel_token = CancellationToken::new();
    let poller = tokio::spawn(payment_poller(
        state.clone(),
        config.payment_poll_interval,
        cancel_token.clone(),
    ));

    info!("listening on {}", config.addr);
    let served = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::Data::new(state.clone()))
            .service(health::get_health)
            .service(table::get_tables)
            .service(bill::post_bills)
            .service(bill::get_bill)
            .service(bill::get_consumption)
            .service(bill::post_close_bill)
            .service(member::post_join_request)
            .service(member::post_answer_join)
            .service(member::post_accept_all)
            .service(member::post_cancel_join)
            .service(member::post_leave)
            .service(order::post_orders)
            .service(order::post_offer_order)
            .service(order::patch_order)
            .service(payment::post_offline_payment)
            .service(payment::post_online_payment)
            .service(payment::post_approve_payment)
            .service(payment::post_reject_payment)
            .service(payment::get_payments)
            .service(statement::get_statement)
            .service(feedback::post_evaluation)
            .service(feedback::get_evaluation_status)
            .service(feedback::post_waiter_call)
            .service(feedback::get_bill_history)
            .service(feedback::get_promocode)
    })
    .bind(config.addr)?
    .run()
    .await;

    cancel_token.cancel();
    poller.await.context("payment poller panicked")?;
    Ok(served?)
}

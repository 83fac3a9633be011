//! HTTP handlers, one module per resource

pub(crate) mod bill;
pub(crate) mod error;
pub(crate) mod feedback;
pub(crate) mod health;
pub(crate) mod member;
pub(crate) mod order;
pub(crate) mod payment;
pub(crate) mod statement;
pub(crate) mod table;

use log::{info, warn};
use std::future::Future;
use tokio::time;
use tokio_postgres::Transaction;

use crate::server::controller::error::CustomError;
use crate::server::database::repository;
use crate::server::domain::bill::{Bill, BillId};
use crate::server::notify::{self, Notification};
use crate::server::state::AppState;

/// Bail out with `Timeout` when the database work outlives the configured limit
pub(crate) async fn timed<T>(
    state: &AppState,
    op: &str,
    fut: impl Future<Output = Result<T, CustomError>>,
) -> Result<T, CustomError> {
    let sleep = time::sleep(state.db_timeout);
    tokio::pin!(sleep);
    tokio::select! {
        result = fut => result,
        _ = &mut sleep => {
            warn!("timeout in {}", op);
            Err(CustomError::Timeout)
        }
    }
}

/// Load a bill holding its row lock until `tx` ends
pub(crate) async fn lock_bill(
    tx: &Transaction<'_>,
    bill_id: BillId,
    op: &str,
) -> Result<Bill, CustomError> {
    repository::load_bill(tx, bill_id, true)
        .await
        .map_err(|e| CustomError::db(op, e))?
        .ok_or(CustomError::ResourceNotFound)
}

/// Persist the bill, commit, then push its events out
pub(crate) async fn commit_bill(
    state: &AppState,
    tx: Transaction<'_>,
    bill: &mut Bill,
    op: &str,
) -> Result<(), CustomError> {
    repository::save_bill(&tx, bill)
        .await
        .map_err(|e| CustomError::db(op, e))?;
    tx.commit().await.map_err(|e| CustomError::db(op, e))?;

    let events = bill.take_events();
    if let Some(bill_id) = bill.id {
        if events.contains(&Notification::BillClosed) {
            info!("bill={} closed, value_paid={}", bill_id, bill.value_paid);
        }
        notify::dispatch(state.notifier.as_ref(), bill_id, events).await;
    }
    Ok(())
}

use anyhow::{Context, Error};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use std::time::Duration;
use tokio::{pin, select, time};
use tokio_util::sync::CancellationToken;
use tokio_util::task::task_tracker;

use crate::server::controller::{commit_bill, lock_bill};
use crate::server::database::repository::{self, PendingCharge};
use crate::server::domain::payment::PaymentStatus;
use crate::server::gateway::PaymentGateway;
use crate::server::state::AppState;
use crate::server::util::time::helper::get_utc_now;

const POLL_BATCH: i64 = 50;
const OP: &str = "payment_poller";

/// Where the gateway stands on one pending charge
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Verdict {
    /// set when the charge was only found through its reference
    pub gateway_payment_id: Option<String>,
    pub status: PaymentStatus,
}

/// `None` while the gateway has not decided yet. A charge the gateway never
/// received under our reference is cancelled, the card was not touched.
pub(crate) async fn gateway_verdict(
    gateway: &dyn PaymentGateway,
    charge: &PendingCharge,
) -> Result<Option<Verdict>, Error> {
    let verdict = match charge.gateway_payment_id.as_deref() {
        Some(id) => Verdict {
            gateway_payment_id: None,
            status: gateway.status(id).await?,
        },
        None => match gateway.find_by_reference(&charge.payment_uuid).await? {
            Some(found) => Verdict {
                gateway_payment_id: Some(found.id),
                status: found.status,
            },
            None => Verdict {
                gateway_payment_id: None,
                status: PaymentStatus::Cancelled,
            },
        },
    };
    if verdict.status == PaymentStatus::InAnalysis && verdict.gateway_payment_id.is_none() {
        return Ok(None);
    }
    Ok(Some(verdict))
}

/// Charges without a gateway id younger than this may still have their
/// request waiting on the gateway
pub(crate) fn orphaned_before(now: DateTime<Utc>, gateway_timeout: Duration) -> DateTime<Utc> {
    let grace = chrono::Duration::from_std(gateway_timeout.saturating_mul(2)).unwrap_or(chrono::Duration::MAX);
    now.checked_sub_signed(grace).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Push one gateway verdict into its bill
async fn settle_charge(state: &AppState, charge: &PendingCharge, verdict: Verdict) -> Result<(), Error> {
    let mut conn = state.write_conn().await?;
    let tx = conn.transaction().await.context("failed to open transaction")?;
    let mut bill = lock_bill(&tx, charge.bill_id, OP).await?;
    let now = get_utc_now();
    let applied = match verdict.gateway_payment_id {
        Some(id) => bill
            .attach_gateway_charge(&charge.payment_uuid, id, verdict.status, now)
            .map(Some),
        None => bill.apply_gateway_status(&charge.payment_uuid, verdict.status, now),
    };
    match applied {
        Ok(Some(settlement)) => {
            commit_bill(state, tx, &mut bill, OP).await?;
            info!(
                "payment={} on bill={} is now {}, bill_closed={}",
                charge.payment_uuid,
                charge.bill_id,
                verdict.status.as_str(),
                settlement.bill_closed
            );
        }
        Ok(None) => {}
        // already moved on by someone else
        Err(e) => warn!("payment={} skipped, {}", charge.payment_uuid, e),
    }
    Ok(())
}

async fn claim_batch(state: &AppState) -> Result<Vec<PendingCharge>, Error> {
    let conn = state.write_conn().await?;
    let now = get_utc_now();
    repository::claim_payments_in_analysis(
        &*conn,
        POLL_BATCH,
        orphaned_before(now, state.gateway_timeout),
        now,
    )
    .await
    .context("failed to claim payments in analysis")
}

pub(crate) async fn poll_once(state: &AppState) {
    let pending = match claim_batch(state).await {
        Ok(pending) => pending,
        Err(e) => {
            error!("{} could not claim a batch, {:#}", OP, e);
            return;
        }
    };

    for charge in pending {
        let verdict = match gateway_verdict(state.gateway.as_ref(), &charge).await {
            Ok(Some(verdict)) => verdict,
            Ok(None) => continue,
            Err(e) => {
                error!("gateway status for payment={} failed, {:#}", charge.payment_uuid, e);
                continue;
            }
        };
        if let Err(e) = settle_charge(state, &charge, verdict).await {
            error!("failed to settle payment={}, {:#}", charge.payment_uuid, e);
        }
    }
}

async fn worker(state: AppState, every: Duration, cancel_token: CancellationToken) {
    let interval = time::interval(every);
    pin!(interval);
    loop {
        select! {
            biased;
            _ = cancel_token.cancelled() => {
                info!("received cancel signal, returning gracefully");
                return;
            }
            _ = interval.tick() => {},
        }
        poll_once(&state).await;
    }
}

/// Ask the gateway about online payments still in analysis until cancelled
pub async fn payment_poller(state: AppState, every: Duration, cancel_token: CancellationToken) {
    let tracker = task_tracker::TaskTracker::new();
    tracker.spawn(worker(state, every, cancel_token));
    if tracker.close() {
        tracker.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::gateway::tests::FixedGateway;
    use crate::server::gateway::ChargeRequest;
    use crate::server::state::tests::offline_state;

    #[actix_web::test]
    async fn poller_stops_when_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let done = time::timeout(
            Duration::from_secs(1),
            payment_poller(offline_state(), Duration::from_millis(5), token),
        )
        .await;
        assert!(done.is_ok());
    }

    #[actix_web::test]
    async fn poll_without_database_is_a_no_op() {
        poll_once(&offline_state()).await;
    }

    fn pending(gateway_payment_id: Option<&str>) -> PendingCharge {
        PendingCharge {
            bill_id: 1,
            payment_uuid: "pay-1".to_string(),
            gateway_payment_id: gateway_payment_id.map(str::to_string),
        }
    }

    #[actix_web::test]
    async fn known_charge_is_asked_by_id() {
        let gateway = FixedGateway::new(PaymentStatus::Authorized);
        let verdict = gateway_verdict(&gateway, &pending(Some("ch_1"))).await.unwrap();
        assert_eq!(
            verdict,
            Some(Verdict { gateway_payment_id: None, status: PaymentStatus::Authorized })
        );

        let undecided = FixedGateway::new(PaymentStatus::InAnalysis);
        assert_eq!(gateway_verdict(&undecided, &pending(Some("ch_1"))).await.unwrap(), None);
    }

    #[actix_web::test]
    async fn unanswered_charge_is_found_by_reference() {
        let gateway = FixedGateway::new(PaymentStatus::InAnalysis);
        gateway
            .charge(&ChargeRequest {
                reference: "pay-1".to_string(),
                customer_id: 2,
                amount: 6000,
                card_token: "tok".to_string(),
                platform_amount: 0,
                establishment_pays_fee: false,
            })
            .await
            .unwrap();
        // still in analysis, but the id is worth recording
        assert_eq!(
            gateway_verdict(&gateway, &pending(None)).await.unwrap(),
            Some(Verdict {
                gateway_payment_id: Some("ch_pay-1".to_string()),
                status: PaymentStatus::InAnalysis,
            })
        );
    }

    #[actix_web::test]
    async fn charge_the_gateway_never_got_is_cancelled() {
        let gateway = FixedGateway::new(PaymentStatus::Authorized);
        assert_eq!(
            gateway_verdict(&gateway, &pending(None)).await.unwrap(),
            Some(Verdict { gateway_payment_id: None, status: PaymentStatus::Cancelled })
        );
    }

    #[test]
    fn orphans_get_twice_the_gateway_timeout() {
        let now = DateTime::<Utc>::from_timestamp(1_000, 0).unwrap();
        assert_eq!(
            orphaned_before(now, Duration::from_secs(10)),
            DateTime::<Utc>::from_timestamp(980, 0).unwrap()
        );
        assert_eq!(orphaned_before(now, Duration::MAX), DateTime::<Utc>::MIN_UTC);
    }
}

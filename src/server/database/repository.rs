//! SQL for loading and persisting the bill aggregate and its reference data

use anyhow::{anyhow, Context, Error};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio_postgres::types::ToSql;
use tokio_postgres::{GenericClient, Row, Transaction};

use crate::server::domain::bill::{Bill, BillId};
use crate::server::domain::establishment::{
    Establishment, EstablishmentId, Fees, MenuItem, MenuItemId, MenuOffer, Promotion, Table,
    TableId,
};
use crate::server::domain::evaluation::Evaluation;
use crate::server::domain::member::{BillMember, CustomerId};
use crate::server::domain::order::Order;
use crate::server::domain::payment::BillPayment;

const ESTABLISHMENT_COLUMNS: &str = r#"
    e.id, e.name, e.enabled, e.taxe_couvert, e.taxe_service, e.noruh_fee,
    e.pays_payment_tax, e.payment_tax, e.offline_percentage,
    e.offer_range_value, e.offer_count_limit
"#;

const PAYMENT_COLUMNS: &str = r#"
    id, payment_uuid, customer_id, bill_member_id, method, status, value,
    noruh_fee, gateway_fee, establishment_value, platform_value,
    gateway_payment_id, promotion_id, promotion_value, date, status_updated
"#;

fn fees_from_row(row: &Row) -> Result<Fees, Error> {
    Ok(Fees {
        couvert: row.try_get("taxe_couvert")?,
        service_tax: row.try_get("taxe_service")?,
        noruh_fee: row.try_get("noruh_fee")?,
        pays_payment_tax: row.try_get("pays_payment_tax")?,
        payment_tax: row.try_get("payment_tax")?,
        offline_percentage: row.try_get("offline_percentage")?,
        offer_range_value: row.try_get("offer_range_value")?,
        offer_count_limit: row.try_get("offer_count_limit")?,
    })
}

fn table_from_row(row: &Row) -> Result<Table, Error> {
    Ok(Table {
        id: row.try_get("id")?,
        establishment_id: row.try_get("establishment_id")?,
        name: row.try_get("name")?,
        enabled: row.try_get("enabled")?,
        remote: row.try_get("remote")?,
    })
}

fn menu_item_from_row(row: &Row) -> Result<MenuItem, Error> {
    Ok(MenuItem {
        id: row.try_get("id")?,
        establishment_id: row.try_get("establishment_id")?,
        name: row.try_get("name")?,
        price: row.try_get("price")?,
        available: row.try_get("available")?,
        category_id: row.try_get("category_id")?,
        offer_id: row.try_get("offer_id")?,
    })
}

fn member_from_row(row: &Row) -> Result<BillMember, Error> {
    Ok(BillMember {
        id: row.try_get("id")?,
        customer_id: row.try_get("customer_id")?,
        bill_owner: row.try_get("bill_owner")?,
        joined_at: row.try_get("joined_at")?,
        leave_at: row.try_get("leave_at")?,
        couvert_value: row.try_get("couvert_value")?,
    })
}

fn order_from_row(row: &Row) -> Result<Order, Error> {
    let status: String = row.try_get("status")?;
    Ok(Order {
        id: row.try_get("id")?,
        customer_id: row.try_get("customer_id")?,
        menu_item_id: row.try_get("menu_item_id")?,
        item_name: row.try_get("item_name")?,
        quantity: row.try_get("quantity")?,
        observation: row.try_get("observation")?,
        value_order: row.try_get("value_order")?,
        status: status.parse().map_err(|e: String| anyhow!(e))?,
        created_at: row.try_get("created_at")?,
        kitchen_accepted_at: row.try_get("kitchen_accepted_at")?,
        kitchen_finished_at: row.try_get("kitchen_finished_at")?,
        canceled_at: row.try_get("canceled_at")?,
    })
}

fn payment_from_row(row: &Row) -> Result<BillPayment, Error> {
    let method: String = row.try_get("method")?;
    let status: String = row.try_get("status")?;
    Ok(BillPayment {
        id: row.try_get("id")?,
        payment_uuid: row.try_get("payment_uuid")?,
        customer_id: row.try_get("customer_id")?,
        bill_member_id: row.try_get("bill_member_id")?,
        method: method.parse().map_err(|e: String| anyhow!(e))?,
        status: status.parse().map_err(|e: String| anyhow!(e))?,
        value: row.try_get("value")?,
        noruh_fee: row.try_get("noruh_fee")?,
        gateway_fee: row.try_get("gateway_fee")?,
        establishment_value: row.try_get("establishment_value")?,
        platform_value: row.try_get("platform_value")?,
        gateway_payment_id: row.try_get("gateway_payment_id")?,
        promotion_id: row.try_get("promotion_id")?,
        promotion_value: row.try_get("promotion_value")?,
        date: row.try_get("date")?,
        status_updated: row.try_get("status_updated")?,
    })
}

pub(crate) async fn find_establishment(
    client: &impl GenericClient,
    id: EstablishmentId,
) -> Result<Option<Establishment>, Error> {
    let stmt = format!("SELECT {ESTABLISHMENT_COLUMNS} FROM establishment e WHERE e.id = $1");
    let Some(row) = client.query_opt(stmt.as_str(), &[&id]).await? else {
        return Ok(None);
    };
    Ok(Some(Establishment {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        enabled: row.try_get("enabled")?,
        fees: fees_from_row(&row)?,
    }))
}

pub(crate) async fn find_table(
    client: &impl GenericClient,
    id: TableId,
) -> Result<Option<Table>, Error> {
    client
        .query_opt(
            r#"SELECT id, establishment_id, name, enabled, remote FROM "table" WHERE id = $1"#,
            &[&id],
        )
        .await?
        .map(|row| table_from_row(&row))
        .transpose()
}

/// Tables of an establishment with the open bill sitting on each, if any
pub(crate) async fn list_tables(
    client: &impl GenericClient,
    establishment_id: EstablishmentId,
) -> Result<Vec<(Table, Vec<BillId>)>, Error> {
    let rows = client
        .query(
            r#"
            SELECT t.id, t.establishment_id, t.name, t.enabled, t.remote,
                   COALESCE(array_agg(b.id ORDER BY b.id) FILTER (WHERE b.id IS NOT NULL), '{}') AS bill_ids
            FROM "table" t
            LEFT JOIN bill b
            ON b.table_id = t.id AND b.payment_date IS NULL
            WHERE t.establishment_id = $1
            GROUP BY t.id
            ORDER BY t.id
            "#,
            &[&establishment_id],
        )
        .await?;
    rows.iter()
        .map(|row| -> Result<_, Error> { Ok((table_from_row(row)?, row.try_get("bill_ids")?)) })
        .collect()
}

pub(crate) async fn table_has_open_bill(
    client: &impl GenericClient,
    table_id: TableId,
) -> Result<bool, Error> {
    let row = client
        .query_one(
            "SELECT EXISTS(SELECT 1 FROM bill WHERE table_id = $1 AND payment_date IS NULL)",
            &[&table_id],
        )
        .await?;
    Ok(row.try_get(0)?)
}

/// Whether the customer holds an active seat or request anywhere
pub(crate) async fn customer_is_active(
    client: &impl GenericClient,
    customer_id: CustomerId,
) -> Result<bool, Error> {
    let row = client
        .query_one(
            "SELECT EXISTS(SELECT 1 FROM bill_member WHERE customer_id = $1 AND leave_at IS NULL)",
            &[&customer_id],
        )
        .await?;
    Ok(row.try_get(0)?)
}

pub(crate) async fn find_menu_items(
    client: &impl GenericClient,
    ids: &[MenuItemId],
) -> Result<Vec<MenuItem>, Error> {
    client
        .query(
            r#"
            SELECT id, establishment_id, name, price, available, category_id, offer_id
            FROM menu_item
            WHERE id = ANY($1)
            "#,
            &[&ids],
        )
        .await?
        .iter()
        .map(menu_item_from_row)
        .collect()
}

pub(crate) async fn find_menu_offer(
    client: &impl GenericClient,
    establishment_id: EstablishmentId,
    id: i64,
) -> Result<Option<MenuOffer>, Error> {
    let Some(row) = client
        .query_opt(
            "SELECT id, category_id, discount FROM menu_offer WHERE id = $1 AND establishment_id = $2",
            &[&id, &establishment_id],
        )
        .await?
    else {
        return Ok(None);
    };
    Ok(Some(MenuOffer {
        id: row.try_get("id")?,
        category_id: row.try_get("category_id")?,
        discount: row.try_get("discount")?,
    }))
}

pub(crate) async fn find_promotion(
    client: &impl GenericClient,
    establishment_id: EstablishmentId,
    promocode: &str,
) -> Result<Option<Promotion>, Error> {
    let Some(row) = client
        .query_opt(
            r#"
            SELECT id, establishment_id, promocode, value, enabled
            FROM promotion
            WHERE establishment_id = $1 AND promocode = $2
            "#,
            &[&establishment_id, &promocode],
        )
        .await?
    else {
        return Ok(None);
    };
    Ok(Some(Promotion {
        id: row.try_get("id")?,
        establishment_id: row.try_get("establishment_id")?,
        promocode: row.try_get("promocode")?,
        value: row.try_get("value")?,
        enabled: row.try_get("enabled")?,
    }))
}

pub(crate) async fn payment_uuid_exists(
    client: &impl GenericClient,
    payment_uuid: &str,
) -> Result<bool, Error> {
    let row = client
        .query_one(
            "SELECT EXISTS(SELECT 1 FROM bill_payment WHERE payment_uuid = $1)",
            &[&payment_uuid],
        )
        .await?;
    Ok(row.try_get(0)?)
}

/// Online payment still waiting on the gateway. No gateway id means the
/// charge request never got an answer back.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PendingCharge {
    pub bill_id: BillId,
    pub payment_uuid: String,
    pub gateway_payment_id: Option<String>,
}

/// Least recently polled first, so a stuck batch never starves newer charges.
/// Charges without a gateway id are only picked once they are older than
/// `$2`, the request that created them may still be waiting on the gateway.
const CLAIM_IN_ANALYSIS: &str = r#"
    UPDATE bill_payment
    SET polled_at = $3
    WHERE id IN (
        SELECT id
        FROM bill_payment
        WHERE status = 'IN_ANALYSIS' AND (gateway_payment_id IS NOT NULL OR date < $2)
        ORDER BY polled_at NULLS FIRST, date
        LIMIT $1
        FOR UPDATE SKIP LOCKED
    )
    RETURNING bill_id, payment_uuid, gateway_payment_id
"#;

/// Take the next batch of charges to ask the gateway about, stamping them polled
pub(crate) async fn claim_payments_in_analysis(
    client: &impl GenericClient,
    limit: i64,
    orphaned_before: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<Vec<PendingCharge>, Error> {
    client
        .query(CLAIM_IN_ANALYSIS, &[&limit, &orphaned_before, &now])
        .await?
        .iter()
        .map(|row| -> Result<_, Error> {
            Ok(PendingCharge {
                bill_id: row.try_get("bill_id")?,
                payment_uuid: row.try_get("payment_uuid")?,
                gateway_payment_id: row.try_get("gateway_payment_id")?,
            })
        })
        .collect()
}

pub(crate) async fn payments_between(
    client: &impl GenericClient,
    establishment_id: EstablishmentId,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Result<Vec<BillPayment>, Error> {
    let stmt = format!(
        "SELECT {PAYMENT_COLUMNS} FROM bill_payment WHERE establishment_id = $1 AND date >= $2 AND date < $3 ORDER BY date"
    );
    client
        .query(stmt.as_str(), &[&establishment_id, &from, &until])
        .await?
        .iter()
        .map(payment_from_row)
        .collect()
}

/// Load the whole aggregate, `lock` takes the bill row `FOR UPDATE`
pub(crate) async fn load_bill(
    client: &impl GenericClient,
    id: BillId,
    lock: bool,
) -> Result<Option<Bill>, Error> {
    let stmt = format!(
        r#"
        SELECT b.id AS bill_id, b.establishment_id, b.table_id, b.opening_date, b.payment_date,
               b.value_paid, b.offers_made_count, b.offers_used_count, b.last_offer_used,
               {ESTABLISHMENT_COLUMNS}
        FROM bill b
        JOIN establishment e
        ON e.id = b.establishment_id
        WHERE b.id = $1
        {}
        "#,
        if lock { "FOR UPDATE OF b" } else { "" }
    );
    let Some(row) = client.query_opt(stmt.as_str(), &[&id]).await? else {
        return Ok(None);
    };

    let members = client
        .query(
            r#"
            SELECT id, customer_id, bill_owner, joined_at, leave_at, couvert_value
            FROM bill_member
            WHERE bill_id = $1
            ORDER BY id
            "#,
            &[&id],
        )
        .await?
        .iter()
        .map(member_from_row)
        .collect::<Result<Vec<_>, _>>()?;
    let orders = client
        .query(
            r#"
            SELECT id, customer_id, menu_item_id, item_name, quantity, observation, value_order,
                   status, created_at, kitchen_accepted_at, kitchen_finished_at, canceled_at
            FROM bill_order
            WHERE bill_id = $1
            ORDER BY id
            "#,
            &[&id],
        )
        .await?
        .iter()
        .map(order_from_row)
        .collect::<Result<Vec<_>, _>>()?;
    let payments = client
        .query(
            format!("SELECT {PAYMENT_COLUMNS} FROM bill_payment WHERE bill_id = $1 ORDER BY id").as_str(),
            &[&id],
        )
        .await?
        .iter()
        .map(payment_from_row)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(Bill::restore(
        row.try_get("bill_id")?,
        row.try_get("establishment_id")?,
        row.try_get("table_id")?,
        fees_from_row(&row)?,
        row.try_get("opening_date")?,
        row.try_get("payment_date")?,
        row.try_get("value_paid")?,
        (
            row.try_get("offers_made_count")?,
            row.try_get("offers_used_count")?,
            row.try_get("last_offer_used")?,
        ),
        members,
        orders,
        payments,
    )))
}

/// Insert a freshly opened bill, fills in its id
pub(crate) async fn insert_bill(tx: &Transaction<'_>, bill: &mut Bill) -> Result<BillId, Error> {
    let row = tx
        .query_one(
            r#"
            INSERT INTO bill(establishment_id, table_id, remote, opening_date)
            SELECT $1, t.id, t.remote, $3
            FROM "table" t
            WHERE t.id = $2
            RETURNING id
            "#,
            &[&bill.establishment_id, &bill.table_id, &bill.opening_date],
        )
        .await
        .context("failed to insert bill")?;
    let id: BillId = row.try_get("id")?;
    bill.id = Some(id);
    save_bill(tx, bill).await?;
    Ok(id)
}

/// Write back every change made to a loaded bill
pub(crate) async fn save_bill(tx: &Transaction<'_>, bill: &mut Bill) -> Result<(), Error> {
    let bill_id = bill.id.ok_or_else(|| anyhow!("bill was never inserted"))?;
    tx.execute(
        r#"
        UPDATE bill
        SET payment_date = $2, value_paid = $3, offers_made_count = $4,
            offers_used_count = $5, last_offer_used = $6
        WHERE id = $1
        "#,
        &[
            &bill_id,
            &bill.payment_date,
            &bill.value_paid,
            &bill.offers_made_count,
            &bill.offers_used_count,
            &bill.last_offer_used,
        ],
    )
    .await?;

    if !bill.removed_members.is_empty() {
        tx.execute(
            "DELETE FROM bill_member WHERE bill_id = $1 AND id = ANY($2)",
            &[&bill_id, &bill.removed_members],
        )
        .await?;
        bill.removed_members.clear();
    }

    // departures first so a member re-seated elsewhere never trips the active index
    for member in bill.members.iter().filter(|m| m.id.is_some()) {
        tx.execute(
            "UPDATE bill_member SET joined_at = $2, leave_at = $3 WHERE id = $1",
            &[&member.id, &member.joined_at, &member.leave_at],
        )
        .await?;
    }
    for member in bill.members.iter_mut().filter(|m| m.id.is_none()) {
        let row = tx
            .query_one(
                r#"
                INSERT INTO bill_member(bill_id, customer_id, bill_owner, joined_at, leave_at, couvert_value)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id
                "#,
                &[
                    &bill_id,
                    &member.customer_id,
                    &member.bill_owner,
                    &member.joined_at,
                    &member.leave_at,
                    &member.couvert_value,
                ],
            )
            .await?;
        member.id = Some(row.try_get("id")?);
    }

    for order in bill.orders.iter_mut() {
        let status = order.status.as_str();
        match order.id {
            Some(id) => {
                tx.execute(
                    r#"
                    UPDATE bill_order
                    SET status = $2, kitchen_accepted_at = $3, kitchen_finished_at = $4, canceled_at = $5
                    WHERE id = $1
                    "#,
                    &[
                        &id,
                        &status,
                        &order.kitchen_accepted_at,
                        &order.kitchen_finished_at,
                        &order.canceled_at,
                    ],
                )
                .await?;
            }
            None => {
                let row = tx
                    .query_one(
                        r#"
                        INSERT INTO bill_order(bill_id, customer_id, menu_item_id, item_name, quantity,
                            observation, value_order, status, created_at)
                        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                        RETURNING id
                        "#,
                        &[
                            &bill_id,
                            &order.customer_id,
                            &order.menu_item_id,
                            &order.item_name,
                            &order.quantity,
                            &order.observation,
                            &order.value_order,
                            &status,
                            &order.created_at,
                        ],
                    )
                    .await?;
                order.id = Some(row.try_get("id")?);
            }
        }
    }

    let establishment_id = bill.establishment_id;
    let members = bill.members.clone();
    for payment in bill.payments.iter_mut() {
        let status = payment.status.as_str();
        if let Some(id) = payment.id {
            tx.execute(
                "UPDATE bill_payment SET status = $2, status_updated = $3, gateway_payment_id = $4 WHERE id = $1",
                &[&id, &status, &payment.status_updated, &payment.gateway_payment_id],
            )
            .await?;
            continue;
        }
        // members added in this same save only got their ids just now
        if payment.bill_member_id.is_none() {
            payment.bill_member_id = members
                .iter()
                .rev()
                .find(|m| Some(m.customer_id) == payment.customer_id && m.has_joined())
                .and_then(|m| m.id);
        }
        let method = payment.method.as_str();
        let params: [&(dyn ToSql + Sync); 17] = [
            &payment.payment_uuid,
            &bill_id,
            &establishment_id,
            &payment.customer_id,
            &payment.bill_member_id,
            &method,
            &status,
            &payment.value,
            &payment.noruh_fee,
            &payment.gateway_fee,
            &payment.establishment_value,
            &payment.platform_value,
            &payment.gateway_payment_id,
            &payment.promotion_id,
            &payment.promotion_value,
            &payment.date,
            &payment.status_updated,
        ];
        let row = tx
            .query_one(
                r#"
                INSERT INTO bill_payment(payment_uuid, bill_id, establishment_id, customer_id,
                    bill_member_id, method, status, value, noruh_fee, gateway_fee,
                    establishment_value, platform_value, gateway_payment_id, promotion_id,
                    promotion_value, date, status_updated)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
                RETURNING id
                "#,
                &params,
            )
            .await?;
        payment.id = Some(row.try_get("id")?);
    }
    Ok(())
}

pub(crate) async fn evaluation_exists(
    client: &impl GenericClient,
    bill_id: BillId,
    customer_id: CustomerId,
) -> Result<bool, Error> {
    let row = client
        .query_one(
            "SELECT EXISTS(SELECT 1 FROM bill_evaluation WHERE bill_id = $1 AND customer_id = $2)",
            &[&bill_id, &customer_id],
        )
        .await?;
    Ok(row.try_get(0)?)
}

pub(crate) async fn insert_evaluation(
    client: &impl GenericClient,
    evaluation: &mut Evaluation,
) -> Result<i64, Error> {
    let row = client
        .query_one(
            r#"
            INSERT INTO bill_evaluation(bill_id, establishment_id, customer_id, rating, comment, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
            &[
                &evaluation.bill_id,
                &evaluation.establishment_id,
                &evaluation.customer_id,
                &evaluation.rating,
                &evaluation.comment,
                &evaluation.created_at,
            ],
        )
        .await
        .context("failed to insert evaluation")?;
    let id: i64 = row.try_get("id")?;
    evaluation.id = Some(id);
    Ok(id)
}

pub(crate) async fn insert_waiter_call(
    client: &impl GenericClient,
    bill: &Bill,
    customer_id: CustomerId,
    now: DateTime<Utc>,
) -> Result<i64, Error> {
    let row = client
        .query_one(
            r#"
            INSERT INTO waiter_call(bill_id, table_id, customer_id, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
            &[&bill.id, &bill.table_id, &customer_id, &now],
        )
        .await
        .context("failed to insert waiter call")?;
    Ok(row.try_get("id")?)
}

/// One bill a customer sat at, seen from their seat
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct BillHistoryEntry {
    pub bill_id: BillId,
    pub establishment_id: EstablishmentId,
    pub establishment_name: String,
    pub table_id: TableId,
    pub table_name: String,
    pub opening_date: DateTime<Utc>,
    pub payment_date: Option<DateTime<Utc>>,
    pub joined_at: Option<DateTime<Utc>>,
    pub leave_at: Option<DateTime<Utc>>,
    /// settled payments made by this customer on the bill
    pub customer_paid: Decimal,
}

/// Newest bill first, a customer who rejoined a bill still gets one entry
const BILL_HISTORY: &str = r#"
    SELECT h.*
    FROM (
        SELECT DISTINCT ON (b.id)
               b.id AS bill_id, b.establishment_id, e.name AS establishment_name,
               b.table_id, t.name AS table_name, b.opening_date, b.payment_date,
               m.joined_at, m.leave_at,
               COALESCE((
                   SELECT SUM(p.value)
                   FROM bill_payment p
                   WHERE p.bill_id = b.id
                     AND p.customer_id = m.customer_id
                     AND p.status IN ('AUTHORIZED', 'OFFLINE_APPROVED')
               ), 0.00) AS customer_paid
        FROM bill_member m
        JOIN bill b
        ON b.id = m.bill_id
        JOIN establishment e
        ON e.id = b.establishment_id
        JOIN "table" t
        ON t.id = b.table_id
        WHERE m.customer_id = $1 AND m.joined_at IS NOT NULL
        ORDER BY b.id, m.joined_at
    ) h
    ORDER BY h.opening_date DESC, h.bill_id DESC
    LIMIT $2 OFFSET $3
"#;

pub(crate) async fn bill_history(
    client: &impl GenericClient,
    customer_id: CustomerId,
    limit: i64,
    offset: i64,
) -> Result<Vec<BillHistoryEntry>, Error> {
    client
        .query(BILL_HISTORY, &[&customer_id, &limit, &offset])
        .await?
        .iter()
        .map(|row| -> Result<_, Error> {
            Ok(BillHistoryEntry {
                bill_id: row.try_get("bill_id")?,
                establishment_id: row.try_get("establishment_id")?,
                establishment_name: row.try_get("establishment_name")?,
                table_id: row.try_get("table_id")?,
                table_name: row.try_get("table_name")?,
                opening_date: row.try_get("opening_date")?,
                payment_date: row.try_get("payment_date")?,
                joined_at: row.try_get("joined_at")?,
                leave_at: row.try_get("leave_at")?,
                customer_paid: row.try_get("customer_paid")?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_rotates_through_pending_charges() {
        let sql = CLAIM_IN_ANALYSIS.split_whitespace().collect::<Vec<_>>().join(" ");
        assert!(sql.contains("SET polled_at = $3"));
        assert!(sql.contains("ORDER BY polled_at NULLS FIRST, date"));
        assert!(sql.contains("FOR UPDATE SKIP LOCKED"));
        assert!(sql.contains("gateway_payment_id IS NOT NULL OR date < $2"));
    }

    #[test]
    fn history_has_one_row_per_bill() {
        let sql = BILL_HISTORY.split_whitespace().collect::<Vec<_>>().join(" ");
        assert!(sql.contains("DISTINCT ON (b.id)"));
        assert!(sql.contains("ORDER BY h.opening_date DESC"));
        assert!(sql.contains("m.joined_at IS NOT NULL"));
    }
}

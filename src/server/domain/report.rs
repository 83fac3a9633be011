use chrono::{Datelike, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::server::domain::establishment::{Establishment, EstablishmentId};
use crate::server::domain::money::round2;
use crate::server::domain::payment::{BillPayment, PaymentMethod};

/// What the establishment took in during one calendar month
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct MonthlyStatement {
    pub establishment_id: EstablishmentId,
    pub year: i32,
    pub month: u32,
    pub payments: usize,
    pub gross_total: Decimal,
    pub average_ticket: Decimal,
    pub platform_fees: Decimal,
    pub online_total: Decimal,
    pub offline_total: Decimal,
    /// owed to the platform for payments it did not process
    pub offline_compensation: Decimal,
}

/// Returns `None` for an invalid month
pub(crate) fn month_bounds(
    year: i32,
    month: u32,
) -> Option<(chrono::DateTime<Utc>, chrono::DateTime<Utc>)> {
    let start = Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single()?;
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let end = Utc.with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0).single()?;
    Some((start, end))
}

pub(crate) fn monthly_statement(
    establishment: &Establishment,
    payments: &[BillPayment],
    year: i32,
    month: u32,
) -> MonthlyStatement {
    let settled: Vec<&BillPayment> = payments
        .iter()
        .filter(|p| p.status.is_settled())
        .filter(|p| p.date.year() == year && p.date.month() == month)
        .collect();

    let total_of = |method: PaymentMethod| -> Decimal {
        settled
            .iter()
            .filter(|p| p.method == method)
            .map(|p| p.value)
            .sum()
    };
    let gross_total: Decimal = settled.iter().map(|p| p.value).sum();
    let offline_total = total_of(PaymentMethod::Offline);
    let average_ticket = if settled.is_empty() {
        Decimal::ZERO
    } else {
        round2(gross_total / Decimal::from(settled.len()))
    };

    MonthlyStatement {
        establishment_id: establishment.id,
        year,
        month,
        payments: settled.len(),
        gross_total,
        average_ticket,
        platform_fees: settled.iter().map(|p| p.platform_value).sum(),
        online_total: total_of(PaymentMethod::Online),
        offline_total,
        offline_compensation: round2(offline_total * establishment.fees.offline_percentage),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::domain::establishment::Fees;
    use crate::server::domain::payment::tests::payment;
    use crate::server::domain::payment::PaymentStatus;

    fn establishment() -> Establishment {
        Establishment {
            id: 4,
            name: "Cantina".to_string(),
            enabled: true,
            fees: Fees::default(),
        }
    }

    #[test]
    fn bounds_wrap_december() {
        let (start, end) = month_bounds(2024, 12).unwrap();
        assert_eq!(start.month(), 12);
        assert_eq!((end.year(), end.month()), (2025, 1));
        assert!(month_bounds(2024, 13).is_none());
    }

    #[test]
    fn only_settled_payments_of_the_month_count() {
        let (start, _) = month_bounds(2024, 3).unwrap();
        let mut online = payment(PaymentStatus::Authorized, Decimal::new(102, 0), Decimal::new(2, 0));
        online.method = PaymentMethod::Online;
        online.date = start;
        let mut offline = payment(PaymentStatus::OfflineApproved, Decimal::new(50, 0), Decimal::ZERO);
        offline.date = start;
        let mut pending = payment(PaymentStatus::OfflinePending, Decimal::new(70, 0), Decimal::ZERO);
        pending.date = start;
        let mut april = offline.clone();
        april.date = month_bounds(2024, 4).unwrap().0;

        let statement = monthly_statement(&establishment(), &[online, offline, pending, april], 2024, 3);
        assert_eq!(statement.payments, 2);
        assert_eq!(statement.gross_total, Decimal::new(152, 0));
        assert_eq!(statement.average_ticket, Decimal::new(76, 0));
        assert_eq!(statement.platform_fees, Decimal::new(2, 0));
        assert_eq!(statement.online_total, Decimal::new(102, 0));
        // 50 * 0.02
        assert_eq!(statement.offline_compensation, Decimal::new(1, 0));
    }

    #[test]
    fn empty_month() {
        let statement = monthly_statement(&establishment(), &[], 2024, 1);
        assert_eq!(statement.payments, 0);
        assert_eq!(statement.average_ticket, Decimal::ZERO);
    }
}

use chrono::NaiveDate;
use serde::Serialize;

use super::error::{FinanceError, Result, ensure_non_negative};
use super::types::{Invoice, InvoiceStatus};

/// Mean days from issue to payment across paid invoices; 0 when none are paid.
pub fn days_sales_outstanding(invoices: &[Invoice]) -> Result<f64> {
    let mut total_days = 0i64;
    let mut paid = 0usize;
    for invoice in invoices {
        let Some(paid_date) = invoice.paid_date else {
            continue;
        };
        if invoice.status != InvoiceStatus::Paid {
            continue;
        }
        let days = (paid_date - invoice.issue_date).num_days();
        if days < 0 {
            return Err(FinanceError::invalid(
                format!("invoice '{}'", invoice.id),
                "paid before it was issued",
            ));
        }
        total_days += days;
        paid += 1;
    }

    if paid == 0 {
        return Ok(0.0);
    }
    Ok(total_days as f64 / paid as f64)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgingBucket {
    pub count: usize,
    pub total: f64,
}

impl AgingBucket {
    fn add(&mut self, amount: f64) {
        self.count += 1;
        self.total += amount;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgingReport {
    pub current: AgingBucket,
    pub days_31_60: AgingBucket,
    pub days_61_90: AgingBucket,
    pub over_90: AgingBucket,
    pub total_outstanding: f64,
}

/// Buckets every invoice that is neither paid nor cancelled by days since issue.
///
/// Bucket upper bounds are inclusive: an invoice exactly 30 days old is current.
pub fn aging_report(invoices: &[Invoice], as_of: NaiveDate) -> Result<AgingReport> {
    let mut report = AgingReport::default();
    for invoice in invoices {
        if matches!(invoice.status, InvoiceStatus::Paid | InvoiceStatus::Cancelled) {
            continue;
        }
        ensure_non_negative(&format!("invoice '{}' total", invoice.id), invoice.total)?;

        let age = (as_of - invoice.issue_date).num_days();
        let bucket = match age {
            ..=30 => &mut report.current,
            31..=60 => &mut report.days_31_60,
            61..=90 => &mut report.days_61_90,
            _ => &mut report.over_90,
        };
        bucket.add(invoice.total);
        report.total_outstanding += invoice.total;
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn invoice(id: &str, issued: NaiveDate, total: f64, status: InvoiceStatus) -> Invoice {
        Invoice {
            id: id.to_string(),
            client_id: "client".to_string(),
            issue_date: issued,
            due_date: issued + chrono::Days::new(30),
            total,
            status,
            paid_date: None,
        }
    }

    #[test]
    fn dso_averages_paid_invoices_only() {
        let mut a = invoice("a", day(2024, 1, 1), 100.0, InvoiceStatus::Paid);
        a.paid_date = Some(day(2024, 1, 21));
        let mut b = invoice("b", day(2024, 2, 1), 100.0, InvoiceStatus::Paid);
        b.paid_date = Some(day(2024, 3, 12));
        let unpaid = invoice("c", day(2024, 1, 1), 100.0, InvoiceStatus::Sent);
        let paid_without_date = invoice("d", day(2024, 1, 1), 100.0, InvoiceStatus::Paid);

        let dso = days_sales_outstanding(&[a, b, unpaid, paid_without_date]).expect("valid");
        // 20 days and 40 days
        assert_eq!(dso, 30.0);
    }

    #[test]
    fn dso_is_zero_without_paid_invoices() {
        let open = invoice("a", day(2024, 1, 1), 100.0, InvoiceStatus::Overdue);
        assert_eq!(days_sales_outstanding(&[open]).expect("valid"), 0.0);
        assert_eq!(days_sales_outstanding(&[]).expect("valid"), 0.0);
    }

    #[test]
    fn dso_rejects_payment_before_issue() {
        let mut a = invoice("early", day(2024, 2, 1), 100.0, InvoiceStatus::Paid);
        a.paid_date = Some(day(2024, 1, 1));
        let err = days_sales_outstanding(&[a]).expect_err("must reject");
        assert!(err.to_string().contains("early"));
    }

    #[test]
    fn aging_buckets_use_inclusive_upper_bounds() {
        let as_of = day(2024, 6, 30);
        let invoices = vec![
            invoice("fresh", day(2024, 6, 20), 100.0, InvoiceStatus::Sent),
            invoice("edge30", day(2024, 5, 31), 200.0, InvoiceStatus::Viewed),
            invoice("mid", day(2024, 5, 1), 300.0, InvoiceStatus::Overdue),
            invoice("old", day(2024, 4, 1), 400.0, InvoiceStatus::Overdue),
            invoice("ancient", day(2023, 1, 1), 500.0, InvoiceStatus::Sent),
            invoice("paid", day(2023, 1, 1), 999.0, InvoiceStatus::Paid),
            invoice("void", day(2023, 1, 1), 999.0, InvoiceStatus::Cancelled),
        ];

        let report = aging_report(&invoices, as_of).expect("valid");
        assert_eq!(report.current.count, 2);
        assert_eq!(report.current.total, 300.0);
        assert_eq!(report.days_31_60.count, 1);
        assert_eq!(report.days_61_90.count, 1);
        assert_eq!(report.over_90.count, 1);
        assert_eq!(report.over_90.total, 500.0);
        assert_eq!(report.total_outstanding, 1_500.0);
    }

    #[test]
    fn aging_rejects_negative_totals() {
        let bad = invoice("neg", day(2024, 1, 1), -5.0, InvoiceStatus::Sent);
        assert!(aging_report(&[bad], day(2024, 2, 1)).is_err());
    }
}

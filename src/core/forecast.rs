use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, Days, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{FinanceError, Result, ensure_in_range, ensure_non_negative};
use super::runway::DAYS_PER_MONTH;
use super::types::{
    BaselineSource, ExpenseRecord, Forecast, ForecastPoint, ForecastSummary, IncomeRecord,
    Invoice,
};

/// Source of the day-to-day noise applied to a forecast.
///
/// Implementations decide how a uniform multiplier band and a payment
/// probability turn into concrete numbers, which keeps `forecast` itself
/// deterministic for a given source.
pub trait VarianceSource {
    /// Multiplier within `[low, high]`.
    fn factor(&mut self, low: f64, high: f64) -> f64;
    /// Weight applied to an amount that arrives with `probability`.
    fn weight(&mut self, probability: f64) -> f64;
}

/// Replaces every draw by its expectation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpectedValue;

impl VarianceSource for ExpectedValue {
    fn factor(&mut self, low: f64, high: f64) -> f64 {
        (low + high) / 2.0
    }

    fn weight(&mut self, probability: f64) -> f64 {
        probability
    }
}

/// Uniform factors and all-or-nothing invoice payments from a seeded RNG.
#[derive(Debug, Clone)]
pub struct SeededVariance {
    rng: StdRng,
}

impl SeededVariance {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl VarianceSource for SeededVariance {
    fn factor(&mut self, low: f64, high: f64) -> f64 {
        self.rng.gen_range(low..=high)
    }

    fn weight(&mut self, probability: f64) -> f64 {
        if self.rng.gen_bool(probability) {
            1.0
        } else {
            0.0
        }
    }
}

/// Ten years of daily points.
pub const HORIZON_LIMIT_DAYS: u32 = 3_650;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VarianceBand {
    pub low: f64,
    pub high: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ForecastSettings {
    /// Monthly income assumed when there is no income history.
    pub fallback_monthly_income: f64,
    /// Monthly expenses assumed when there is no expense history.
    pub fallback_monthly_expenses: f64,
    pub income_variance: VarianceBand,
    pub expense_variance: VarianceBand,
    /// Chance an outstanding invoice is paid on its due date.
    pub invoice_payment_probability: f64,
    /// Half-width of the confidence band as a fraction of |cumulative|.
    /// A placeholder heuristic, not a statistical interval.
    pub confidence_band: f64,
    /// Distinct calendar months of income needed before seasonality applies.
    pub min_seasonality_months: usize,
    /// Longest accepted horizon; may be lowered but not raised past
    /// `HORIZON_LIMIT_DAYS`.
    pub max_horizon_days: u32,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            fallback_monthly_income: 5_000.0,
            fallback_monthly_expenses: 2_000.0,
            income_variance: VarianceBand {
                low: 0.7,
                high: 1.3,
            },
            expense_variance: VarianceBand {
                low: 0.8,
                high: 1.2,
            },
            invoice_payment_probability: 0.7,
            confidence_band: 0.2,
            min_seasonality_months: 6,
            max_horizon_days: HORIZON_LIMIT_DAYS,
        }
    }
}

impl ForecastSettings {
    pub fn validate(&self) -> Result<()> {
        ensure_non_negative("fallback_monthly_income", self.fallback_monthly_income)?;
        ensure_non_negative("fallback_monthly_expenses", self.fallback_monthly_expenses)?;
        for (name, band) in [
            ("income_variance", self.income_variance),
            ("expense_variance", self.expense_variance),
        ] {
            ensure_non_negative(name, band.low)?;
            ensure_non_negative(name, band.high)?;
            if band.low > band.high {
                return Err(FinanceError::invalid(name, "low must not exceed high"));
            }
        }
        ensure_in_range(
            "invoice_payment_probability",
            self.invoice_payment_probability,
            0.0,
            1.0,
        )?;
        ensure_in_range("confidence_band", self.confidence_band, 0.0, 1.0)?;
        if self.max_horizon_days == 0 || self.max_horizon_days > HORIZON_LIMIT_DAYS {
            return Err(FinanceError::invalid(
                "max_horizon_days",
                format!(
                    "must be between 1 and {HORIZON_LIMIT_DAYS}, got {}",
                    self.max_horizon_days
                ),
            ));
        }
        Ok(())
    }
}

fn average_monthly_total(entries: impl Iterator<Item = (NaiveDate, f64)>) -> Option<f64> {
    let mut by_month: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for (date, amount) in entries {
        *by_month.entry((date.year(), date.month())).or_insert(0.0) += amount;
    }
    if by_month.is_empty() {
        return None;
    }
    Some(by_month.values().sum::<f64>() / by_month.len() as f64)
}

/// Month-of-year multipliers, index 0 is January.
///
/// Each factor is the mean record amount in that calendar month over the
/// mean of all monthly means. Returns `None` when history is too short.
fn seasonal_factors(income_history: &[IncomeRecord], min_months: usize) -> Option<[f64; 12]> {
    let distinct_months: BTreeSet<(i32, u32)> = income_history
        .iter()
        .map(|r| (r.date.year(), r.date.month()))
        .collect();
    if income_history.is_empty() || distinct_months.len() < min_months {
        return None;
    }

    let mut sums = [0.0_f64; 12];
    let mut counts = [0_usize; 12];
    for record in income_history {
        let idx = record.date.month0() as usize;
        sums[idx] += record.amount;
        counts[idx] += 1;
    }

    let monthly_means: Vec<(usize, f64)> = (0..12)
        .filter(|&idx| counts[idx] > 0)
        .map(|idx| (idx, sums[idx] / counts[idx] as f64))
        .collect();
    let overall =
        monthly_means.iter().map(|(_, mean)| mean).sum::<f64>() / monthly_means.len() as f64;
    if overall <= 0.0 {
        return None;
    }

    let mut factors = [1.0_f64; 12];
    for (idx, mean) in monthly_means {
        factors[idx] = mean / overall;
    }
    Some(factors)
}

fn validate_history(
    income_history: &[IncomeRecord],
    expense_history: &[ExpenseRecord],
    invoices: &[Invoice],
) -> Result<()> {
    for (i, record) in income_history.iter().enumerate() {
        ensure_non_negative(&format!("income_history[{i}].amount"), record.amount)?;
    }
    for (i, record) in expense_history.iter().enumerate() {
        ensure_non_negative(&format!("expense_history[{i}].amount"), record.amount)?;
        ensure_in_range(
            &format!("expense_history[{i}].deduction_fraction"),
            record.deduction_fraction,
            0.0,
            1.0,
        )?;
    }
    for (i, invoice) in invoices.iter().enumerate() {
        ensure_non_negative(&format!("invoices[{i}].total"), invoice.total)?;
    }
    Ok(())
}

/// Projects daily income, expenses and cumulative net cash flow for
/// `horizon_days` days beginning at `start`.
///
/// Only outstanding invoices (sent, viewed, overdue) contribute, each on its
/// due date and scaled by `variance.weight(invoice_payment_probability)`.
pub fn forecast(
    income_history: &[IncomeRecord],
    expense_history: &[ExpenseRecord],
    invoices: &[Invoice],
    horizon_days: u32,
    start: NaiveDate,
    settings: &ForecastSettings,
    variance: &mut dyn VarianceSource,
) -> Result<Forecast> {
    if horizon_days == 0 {
        return Err(FinanceError::invalid("horizon_days", "must be > 0"));
    }
    settings.validate()?;
    if horizon_days > settings.max_horizon_days {
        return Err(FinanceError::invalid(
            "horizon_days",
            format!("must be <= {}, got {horizon_days}", settings.max_horizon_days),
        ));
    }
    validate_history(income_history, expense_history, invoices)?;

    let (avg_monthly_income, income_source) =
        match average_monthly_total(income_history.iter().map(|r| (r.date, r.amount))) {
            Some(avg) => (avg, BaselineSource::History),
            None => {
                debug!(
                    fallback = settings.fallback_monthly_income,
                    "no income history; using fallback monthly income"
                );
                (settings.fallback_monthly_income, BaselineSource::Fallback)
            }
        };
    let (avg_monthly_expenses, expense_source) =
        match average_monthly_total(expense_history.iter().map(|r| (r.date, r.amount))) {
            Some(avg) => (avg, BaselineSource::History),
            None => {
                debug!(
                    fallback = settings.fallback_monthly_expenses,
                    "no expense history; using fallback monthly expenses"
                );
                (settings.fallback_monthly_expenses, BaselineSource::Fallback)
            }
        };

    let seasonality = seasonal_factors(income_history, settings.min_seasonality_months);

    let mut due_by_date: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for invoice in invoices.iter().filter(|inv| inv.status.is_outstanding()) {
        due_by_date
            .entry(invoice.due_date)
            .or_default()
            .push(invoice.total);
    }

    let daily_income_base = avg_monthly_income / DAYS_PER_MONTH;
    let daily_expense_base = avg_monthly_expenses / DAYS_PER_MONTH;

    let mut points = Vec::with_capacity(horizon_days as usize);
    let mut cumulative = 0.0;
    let mut total_income = 0.0;
    let mut total_expenses = 0.0;

    for offset in 0..horizon_days {
        let date = start
            .checked_add_days(Days::new(offset as u64))
            .ok_or_else(|| {
                FinanceError::invalid("start", "horizon runs past the supported date range")
            })?;

        let seasonal = seasonality.map_or(1.0, |factors| factors[date.month0() as usize]);
        let mut income = daily_income_base
            * seasonal
            * variance.factor(settings.income_variance.low, settings.income_variance.high);
        if let Some(totals) = due_by_date.get(&date) {
            for total in totals {
                income += total * variance.weight(settings.invoice_payment_probability);
            }
        }

        let expenses = daily_expense_base
            * variance.factor(settings.expense_variance.low, settings.expense_variance.high);

        let net = income - expenses;
        cumulative += net;
        total_income += income;
        total_expenses += expenses;

        let band = cumulative.abs() * settings.confidence_band;
        points.push(ForecastPoint {
            date,
            projected_income: income,
            projected_expenses: expenses,
            net,
            cumulative,
            confidence_low: cumulative - band,
            confidence_high: cumulative + band,
        });
    }

    Ok(Forecast {
        points,
        summary: ForecastSummary {
            avg_monthly_income,
            avg_monthly_expenses,
            avg_monthly_net: avg_monthly_income - avg_monthly_expenses,
            income_source,
            expense_source,
            seasonality_applied: seasonality.is_some(),
            forecast_end_balance: cumulative,
            total_projected_income: total_income,
            total_projected_expenses: total_expenses,
        },
    })
}

use chrono::{Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::error::{FinanceError, Result, ensure_non_negative};
use super::types::{RunwayResult, RunwayStatus};

pub const DAYS_PER_MONTH: f64 = 30.0;

const CRITICAL_MONTHS: f64 = 3.0;
const WARNING_MONTHS: f64 = 6.0;
const FAIR_MONTHS: f64 = 12.0;

/// Runway measured from today's UTC date.
pub fn runway(balance: f64, monthly_expenses: f64, monthly_income: f64) -> Result<RunwayResult> {
    runway_as_of(
        balance,
        monthly_expenses,
        monthly_income,
        Utc::now().date_naive(),
    )
}

pub fn runway_as_of(
    balance: f64,
    monthly_expenses: f64,
    monthly_income: f64,
    as_of: NaiveDate,
) -> Result<RunwayResult> {
    ensure_non_negative("balance", balance)?;
    ensure_non_negative("monthly_expenses", monthly_expenses)?;
    ensure_non_negative("monthly_income", monthly_income)?;

    let net_burn = monthly_expenses - monthly_income;
    if net_burn <= 0.0 {
        return Ok(RunwayResult {
            runway_months: f64::INFINITY,
            runway_days: f64::INFINITY,
            net_monthly_burn: net_burn,
            status: RunwayStatus::CashPositive,
            zero_cash_date: None,
        });
    }

    let runway_months = balance / net_burn;
    let runway_days = runway_months * DAYS_PER_MONTH;

    Ok(RunwayResult {
        runway_months,
        runway_days,
        net_monthly_burn: net_burn,
        status: status_for_months(runway_months),
        zero_cash_date: as_of.checked_add_days(Days::new(runway_days as u64)),
    })
}

/// Each threshold is the inclusive lower bound of the next tier.
pub fn status_for_months(runway_months: f64) -> RunwayStatus {
    if runway_months < CRITICAL_MONTHS {
        RunwayStatus::Critical
    } else if runway_months < WARNING_MONTHS {
        RunwayStatus::Warning
    } else if runway_months < FAIR_MONTHS {
        RunwayStatus::Fair
    } else {
        RunwayStatus::Healthy
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub income_change_pct: f64,
    #[serde(default)]
    pub expense_change_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioDelta {
    pub income_delta: f64,
    pub expense_delta: f64,
    pub net_delta: f64,
    /// 0 when either side has unlimited runway.
    pub runway_delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioOutcome {
    pub name: String,
    pub description: String,
    pub monthly_income: f64,
    pub monthly_expenses: f64,
    pub net_monthly: f64,
    pub runway_months: f64,
    pub balance_in_6_months: f64,
    pub balance_in_12_months: f64,
    /// `None` for the baseline row.
    pub vs_baseline: Option<ScenarioDelta>,
}

fn months_of_runway(balance: f64, income: f64, expenses: f64) -> f64 {
    if expenses > income {
        balance / (expenses - income)
    } else {
        f64::INFINITY
    }
}

/// Baseline row followed by one row per what-if scenario.
pub fn scenario_analysis(
    balance: f64,
    monthly_income: f64,
    monthly_expenses: f64,
    scenarios: &[Scenario],
) -> Result<Vec<ScenarioOutcome>> {
    ensure_non_negative("balance", balance)?;
    ensure_non_negative("monthly_income", monthly_income)?;
    ensure_non_negative("monthly_expenses", monthly_expenses)?;

    let base_net = monthly_income - monthly_expenses;
    let base_runway = months_of_runway(balance, monthly_income, monthly_expenses);

    let mut outcomes = Vec::with_capacity(scenarios.len() + 1);
    outcomes.push(ScenarioOutcome {
        name: "Current Baseline".to_string(),
        description: String::new(),
        monthly_income,
        monthly_expenses,
        net_monthly: base_net,
        runway_months: base_runway,
        balance_in_6_months: balance + base_net * 6.0,
        balance_in_12_months: balance + base_net * 12.0,
        vs_baseline: None,
    });

    for (index, scenario) in scenarios.iter().enumerate() {
        for (field, pct) in [
            ("income_change_pct", scenario.income_change_pct),
            ("expense_change_pct", scenario.expense_change_pct),
        ] {
            if !pct.is_finite() || pct < -100.0 {
                return Err(FinanceError::invalid(
                    format!("scenarios[{index}].{field}"),
                    format!("must be >= -100, got {pct}"),
                ));
            }
        }

        let income = monthly_income * (1.0 + scenario.income_change_pct / 100.0);
        let expenses = monthly_expenses * (1.0 + scenario.expense_change_pct / 100.0);
        let net = income - expenses;
        let runway_months = months_of_runway(balance, income, expenses);

        let runway_delta = if base_runway.is_finite() && runway_months.is_finite() {
            runway_months - base_runway
        } else {
            0.0
        };

        outcomes.push(ScenarioOutcome {
            name: scenario.name.clone(),
            description: scenario.description.clone(),
            monthly_income: income,
            monthly_expenses: expenses,
            net_monthly: net,
            runway_months,
            balance_in_6_months: balance + net * 6.0,
            balance_in_12_months: balance + net * 12.0,
            vs_baseline: Some(ScenarioDelta {
                income_delta: income - monthly_income,
                expense_delta: expenses - monthly_expenses,
                net_delta: net - base_net,
                runway_delta,
            }),
        });
    }

    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn break_even_is_cash_positive() {
        let result = runway_as_of(10_000.0, 2_000.0, 2_000.0, day(2024, 1, 1)).expect("valid");
        assert_eq!(result.runway_months, f64::INFINITY);
        assert_eq!(result.status, RunwayStatus::CashPositive);
        assert_eq!(result.zero_cash_date, None);
    }

    #[test]
    fn zero_expenses_and_income_do_not_divide_by_zero() {
        let result = runway_as_of(0.0, 0.0, 0.0, day(2024, 1, 1)).expect("valid");
        assert_eq!(result.status, RunwayStatus::CashPositive);
        assert!(result.runway_months.is_infinite());
    }

    #[test]
    fn exactly_six_months_is_fair() {
        let result = runway_as_of(12_000.0, 3_000.0, 1_000.0, day(2024, 1, 1)).expect("valid");
        assert_approx(result.runway_months, 6.0);
        assert_approx(result.runway_days, 180.0);
        assert_approx(result.net_monthly_burn, 2_000.0);
        assert_eq!(result.status, RunwayStatus::Fair);
        assert_eq!(result.zero_cash_date, Some(day(2024, 6, 29)));
    }

    #[test]
    fn status_thresholds_are_inclusive_lower_bounds() {
        assert_eq!(status_for_months(0.0), RunwayStatus::Critical);
        assert_eq!(status_for_months(2.999), RunwayStatus::Critical);
        assert_eq!(status_for_months(3.0), RunwayStatus::Warning);
        assert_eq!(status_for_months(5.999), RunwayStatus::Warning);
        assert_eq!(status_for_months(6.0), RunwayStatus::Fair);
        assert_eq!(status_for_months(11.999), RunwayStatus::Fair);
        assert_eq!(status_for_months(12.0), RunwayStatus::Healthy);
    }

    #[test]
    fn runway_rejects_negative_balance() {
        let err = runway_as_of(-1.0, 1_000.0, 0.0, day(2024, 1, 1)).expect_err("must reject");
        assert!(err.to_string().contains("balance"));
        assert!(runway(100.0, -5.0, 0.0).is_err());
    }

    #[test]
    fn scenario_analysis_reports_baseline_and_deltas() {
        let scenarios = vec![
            Scenario {
                name: "Lose a client".to_string(),
                description: String::new(),
                income_change_pct: -50.0,
                expense_change_pct: 0.0,
            },
            Scenario {
                name: "Cut costs".to_string(),
                description: "Cancel subscriptions".to_string(),
                income_change_pct: 0.0,
                expense_change_pct: -10.0,
            },
        ];

        let rows = scenario_analysis(12_000.0, 4_000.0, 5_000.0, &scenarios).expect("valid");
        assert_eq!(rows.len(), 3);

        let baseline = &rows[0];
        assert!(baseline.vs_baseline.is_none());
        assert_approx(baseline.net_monthly, -1_000.0);
        assert_approx(baseline.runway_months, 12.0);
        assert_approx(baseline.balance_in_6_months, 6_000.0);

        let lose = &rows[1];
        assert_approx(lose.monthly_income, 2_000.0);
        assert_approx(lose.runway_months, 4.0);
        let delta = lose.vs_baseline.expect("scenario delta");
        assert_approx(delta.income_delta, -2_000.0);
        assert_approx(delta.runway_delta, -8.0);

        let cut = &rows[2];
        assert_approx(cut.monthly_expenses, 4_500.0);
        assert_approx(cut.runway_months, 24.0);
        assert_eq!(cut.description, "Cancel subscriptions");
    }

    #[test]
    fn scenario_runway_delta_is_zero_when_cash_positive() {
        let scenarios = vec![Scenario {
            name: "Raise rates".to_string(),
            description: String::new(),
            income_change_pct: 50.0,
            expense_change_pct: 0.0,
        }];
        let rows = scenario_analysis(1_000.0, 4_000.0, 5_000.0, &scenarios).expect("valid");
        assert!(rows[1].runway_months.is_infinite());
        assert_approx(rows[1].vs_baseline.expect("delta").runway_delta, 0.0);
    }

    #[test]
    fn scenario_rejects_changes_below_minus_hundred() {
        let scenarios = vec![Scenario {
            name: "Impossible".to_string(),
            description: String::new(),
            income_change_pct: -150.0,
            expense_change_pct: 0.0,
        }];
        let err = scenario_analysis(1_000.0, 4_000.0, 5_000.0, &scenarios)
            .expect_err("must reject");
        assert!(err.to_string().contains("income_change_pct"));
    }
}

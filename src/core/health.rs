use serde::Deserialize;

use super::error::{Result, ensure_in_range, ensure_non_negative};
use super::types::{ConcentrationResult, Grade, HealthComponents, HealthScore};

pub const RUNWAY_MAX: f64 = 30.0;
pub const CASH_FLOW_MAX: f64 = 25.0;
pub const DEBT_MAX: f64 = 20.0;
pub const EMERGENCY_FUND_MAX: f64 = 15.0;
pub const INCOME_DIVERSITY_MAX: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthInputs {
    pub balance: f64,
    pub monthly_income: f64,
    pub monthly_expenses: f64,
    pub debt: f64,
    pub emergency_fund: f64,
    /// Concentration of income, 0..100, lower is better.
    pub income_diversity_score: f64,
}

impl HealthInputs {
    /// Takes the diversity input from a concentration analysis of income sources.
    pub fn with_concentration(mut self, concentration: &ConcentrationResult) -> Self {
        self.income_diversity_score = concentration.concentration_score;
        self
    }
}

/// Months of expenses the balance covers; 12 when nothing is spent.
fn runway_months(balance: f64, monthly_expenses: f64) -> f64 {
    if monthly_expenses > 0.0 {
        balance / monthly_expenses
    } else {
        12.0
    }
}

/// Months of expenses the emergency fund covers; 0 when nothing is spent.
fn emergency_months(emergency_fund: f64, monthly_expenses: f64) -> f64 {
    if monthly_expenses > 0.0 {
        emergency_fund / monthly_expenses
    } else {
        0.0
    }
}

fn runway_points(runway_months: f64) -> f64 {
    if runway_months >= 12.0 {
        RUNWAY_MAX
    } else if runway_months >= 6.0 {
        20.0
    } else if runway_months >= 3.0 {
        10.0
    } else {
        5.0
    }
}

fn cash_flow_points(monthly_income: f64, monthly_expenses: f64) -> f64 {
    let net = monthly_income - monthly_expenses;
    if net > monthly_expenses * 0.3 {
        CASH_FLOW_MAX
    } else if net > 0.0 {
        15.0
    } else if net > -monthly_expenses * 0.2 {
        5.0
    } else {
        0.0
    }
}

fn debt_points(debt: f64, monthly_income: f64) -> f64 {
    if debt == 0.0 {
        DEBT_MAX
    } else if debt < monthly_income * 3.0 {
        15.0
    } else if debt < monthly_income * 6.0 {
        10.0
    } else {
        5.0
    }
}

fn emergency_fund_points(emergency_months: f64) -> f64 {
    if emergency_months >= 6.0 {
        EMERGENCY_FUND_MAX
    } else if emergency_months >= 3.0 {
        10.0
    } else {
        emergency_months * 2.0
    }
}

fn income_diversity_points(income_diversity_score: f64) -> f64 {
    (INCOME_DIVERSITY_MAX - income_diversity_score / 10.0).max(0.0)
}

pub fn grade_for(total_score: f64) -> Grade {
    if total_score >= 90.0 {
        Grade::APlus
    } else if total_score >= 80.0 {
        Grade::A
    } else if total_score >= 70.0 {
        Grade::B
    } else if total_score >= 60.0 {
        Grade::C
    } else {
        Grade::D
    }
}

fn recommendations(components: &HealthComponents) -> Vec<String> {
    let mut out = Vec::new();
    if components.runway < 20.0 {
        out.push("Build cash reserves to 6+ months of expenses".to_string());
    }
    if components.cash_flow < 15.0 {
        out.push("Increase revenue or reduce expenses to restore positive cash flow".to_string());
    }
    if components.debt < 15.0 {
        out.push("Pay down debt to improve financial flexibility".to_string());
    }
    if components.emergency_fund < 10.0 {
        out.push("Grow the emergency fund to 3-6 months of expenses".to_string());
    }
    if components.income_diversity < 7.0 {
        out.push("Diversify the client base to reduce concentration risk".to_string());
    }
    if out.is_empty() {
        out.push("Financial health is strong; focus on growth and investment".to_string());
    }
    out
}

/// Weighted 0-100 financial health score.
///
/// Component maxima are runway 30, cash flow 25, debt 20, emergency fund 15
/// and income diversity 10. Every tier boundary is an inclusive lower bound
/// except the cash-flow and debt tiers, which compare strictly.
pub fn score(inputs: &HealthInputs) -> Result<HealthScore> {
    ensure_non_negative("balance", inputs.balance)?;
    ensure_non_negative("monthly_income", inputs.monthly_income)?;
    ensure_non_negative("monthly_expenses", inputs.monthly_expenses)?;
    ensure_non_negative("debt", inputs.debt)?;
    ensure_non_negative("emergency_fund", inputs.emergency_fund)?;
    ensure_in_range(
        "income_diversity_score",
        inputs.income_diversity_score,
        0.0,
        100.0,
    )?;

    let components = HealthComponents {
        runway: runway_points(runway_months(inputs.balance, inputs.monthly_expenses)),
        cash_flow: cash_flow_points(inputs.monthly_income, inputs.monthly_expenses),
        debt: debt_points(inputs.debt, inputs.monthly_income),
        emergency_fund: emergency_fund_points(emergency_months(
            inputs.emergency_fund,
            inputs.monthly_expenses,
        )),
        income_diversity: income_diversity_points(inputs.income_diversity_score),
    };

    let total_score = components.total();
    let grade = grade_for(total_score);

    Ok(HealthScore {
        total_score,
        grade,
        status: grade.status(),
        components,
        recommendations: recommendations(&components),
    })
}

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use super::error::{FinanceError, Result, ensure_in_range, ensure_non_negative};
use super::types::{ExpenseRecord, FilingStatus, TaxEstimate};

/// Combined Social Security + Medicare rate.
pub const SE_TAX_RATE: f64 = 0.153;
/// Share of net earnings subject to self-employment tax.
pub const SE_EARNINGS_FACTOR: f64 = 0.9235;

const SAVINGS_BUFFER_PCT: f64 = 5.0;
const MIN_SAVINGS_PCT: f64 = 25.0;
const MAX_SAVINGS_PCT: f64 = 35.0;
const SLIGHTLY_BEHIND_TOLERANCE: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxBracket {
    /// `None` marks the unbounded top bracket.
    pub upper_limit: Option<f64>,
    pub rate: f64,
}

const fn bracket(upper_limit: f64, rate: f64) -> TaxBracket {
    TaxBracket {
        upper_limit: Some(upper_limit),
        rate,
    }
}

const fn top_bracket(rate: f64) -> TaxBracket {
    TaxBracket {
        upper_limit: None,
        rate,
    }
}

// 2024 federal tables.
const SINGLE_BRACKETS: [TaxBracket; 7] = [
    bracket(11_600.0, 0.10),
    bracket(47_150.0, 0.12),
    bracket(100_525.0, 0.22),
    bracket(191_950.0, 0.24),
    bracket(243_725.0, 0.32),
    bracket(609_350.0, 0.35),
    top_bracket(0.37),
];

const MARRIED_JOINT_BRACKETS: [TaxBracket; 7] = [
    bracket(23_200.0, 0.10),
    bracket(94_300.0, 0.12),
    bracket(201_050.0, 0.22),
    bracket(383_900.0, 0.24),
    bracket(487_450.0, 0.32),
    bracket(731_200.0, 0.35),
    top_bracket(0.37),
];

const MARRIED_SEPARATE_BRACKETS: [TaxBracket; 7] = [
    bracket(11_600.0, 0.10),
    bracket(47_150.0, 0.12),
    bracket(100_525.0, 0.22),
    bracket(191_950.0, 0.24),
    bracket(243_725.0, 0.32),
    bracket(365_600.0, 0.35),
    top_bracket(0.37),
];

const HEAD_OF_HOUSEHOLD_BRACKETS: [TaxBracket; 7] = [
    bracket(16_550.0, 0.10),
    bracket(63_100.0, 0.12),
    bracket(100_500.0, 0.22),
    bracket(191_950.0, 0.24),
    bracket(243_700.0, 0.32),
    bracket(609_350.0, 0.35),
    top_bracket(0.37),
];

pub fn federal_brackets(filing_status: FilingStatus) -> &'static [TaxBracket] {
    match filing_status {
        FilingStatus::Single => &SINGLE_BRACKETS,
        FilingStatus::MarriedJoint => &MARRIED_JOINT_BRACKETS,
        FilingStatus::MarriedSeparate => &MARRIED_SEPARATE_BRACKETS,
        FilingStatus::HeadOfHousehold => &HEAD_OF_HOUSEHOLD_BRACKETS,
    }
}

pub fn standard_deduction(filing_status: FilingStatus) -> f64 {
    match filing_status {
        FilingStatus::Single | FilingStatus::MarriedSeparate => 14_600.0,
        FilingStatus::MarriedJoint => 29_200.0,
        FilingStatus::HeadOfHousehold => 21_900.0,
    }
}

/// Applies `brackets` (ascending by upper limit) to `income`.
pub fn progressive_tax(income: f64, brackets: &[TaxBracket]) -> f64 {
    let income = income.max(0.0);
    let mut tax = 0.0;
    let mut previous_limit = 0.0;

    for bracket in brackets {
        if income <= previous_limit {
            break;
        }

        let bracket_top = bracket
            .upper_limit
            .map_or(income, |limit| income.min(limit));
        tax += (bracket_top - previous_limit) * bracket.rate;

        match bracket.upper_limit {
            Some(limit) => previous_limit = limit,
            None => break,
        }
    }

    tax
}

/// Estimates annual federal, state and self-employment tax for a freelancer.
///
/// `state_rate` is a flat 0..1 fraction applied to federal taxable income.
/// Self-employment tax is only charged on positive net earnings, so a loss
/// year produces zero tax rather than a negative liability.
pub fn estimate(
    gross_income: f64,
    deductible_expenses: f64,
    state_rate: f64,
    filing_status: FilingStatus,
) -> Result<TaxEstimate> {
    ensure_non_negative("gross_income", gross_income)?;
    ensure_non_negative("deductible_expenses", deductible_expenses)?;
    ensure_in_range("state_rate", state_rate, 0.0, 1.0)?;

    let net_income = gross_income - deductible_expenses;

    let se_base = net_income.max(0.0) * SE_EARNINGS_FACTOR;
    let self_employment_tax = se_base * SE_TAX_RATE;

    let adjusted_gross_income = net_income - self_employment_tax / 2.0;
    let taxable_income = (adjusted_gross_income - standard_deduction(filing_status)).max(0.0);

    let federal_tax = progressive_tax(taxable_income, federal_brackets(filing_status));
    let state_tax = taxable_income * state_rate;
    let total_tax = federal_tax + state_tax + self_employment_tax;

    let effective_rate = if gross_income > 0.0 {
        total_tax / gross_income * 100.0
    } else {
        0.0
    };

    Ok(TaxEstimate {
        gross_income,
        deductible_expenses,
        net_income,
        adjusted_gross_income,
        taxable_income,
        federal_tax,
        state_tax,
        self_employment_tax,
        total_tax,
        effective_rate,
        quarterly_payment: total_tax / 4.0,
        recommended_savings_pct: (effective_rate + SAVINGS_BUFFER_PCT)
            .clamp(MIN_SAVINGS_PCT, MAX_SAVINGS_PCT),
    })
}

fn validate_expense(index: usize, expense: &ExpenseRecord) -> Result<()> {
    ensure_non_negative(&format!("expenses[{index}].amount"), expense.amount)?;
    ensure_in_range(
        &format!("expenses[{index}].deduction_fraction"),
        expense.deduction_fraction,
        0.0,
        1.0,
    )
}

fn deductible_amount(expense: &ExpenseRecord) -> f64 {
    if expense.tax_deductible {
        expense.amount * expense.deduction_fraction
    } else {
        0.0
    }
}

/// Sum of the deductible share of every expense.
pub fn deductible_total(expenses: &[ExpenseRecord]) -> Result<f64> {
    let mut total = 0.0;
    for (index, expense) in expenses.iter().enumerate() {
        validate_expense(index, expense)?;
        total += deductible_amount(expense);
    }
    Ok(total)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTaxSummary {
    pub total: f64,
    pub deductible: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseTaxSummary {
    pub total_expenses: f64,
    pub deductible_expenses: f64,
    pub non_deductible_expenses: f64,
    /// Deductible share of total, 0..100; 0 when there are no expenses.
    pub deduction_rate: f64,
    pub by_category: BTreeMap<String, CategoryTaxSummary>,
}

pub fn categorize_expenses(expenses: &[ExpenseRecord]) -> Result<ExpenseTaxSummary> {
    let mut by_category: BTreeMap<String, CategoryTaxSummary> = BTreeMap::new();
    let mut total_expenses = 0.0;
    let mut deductible_expenses = 0.0;

    for (index, expense) in expenses.iter().enumerate() {
        validate_expense(index, expense)?;
        let deductible = deductible_amount(expense);
        total_expenses += expense.amount;
        deductible_expenses += deductible;

        let entry = by_category.entry(expense.category.clone()).or_default();
        entry.total += expense.amount;
        entry.deductible += deductible;
        entry.count += 1;
    }

    let deduction_rate = if total_expenses > 0.0 {
        deductible_expenses / total_expenses * 100.0
    } else {
        0.0
    };

    Ok(ExpenseTaxSummary {
        total_expenses,
        deductible_expenses,
        non_deductible_expenses: total_expenses - deductible_expenses,
        deduction_rate,
        by_category,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuarterlyDueDate {
    pub quarter: &'static str,
    pub due: NaiveDate,
}

/// Estimated-tax due dates for `year`; Q4 falls in January of the next year.
pub fn quarterly_due_dates(year: i32) -> Result<[QuarterlyDueDate; 4]> {
    let date = |y: i32, m: u32, d: u32| {
        NaiveDate::from_ymd_opt(y, m, d)
            .ok_or_else(|| FinanceError::invalid("year", format!("{year} is out of range")))
    };

    Ok([
        QuarterlyDueDate {
            quarter: "Q1",
            due: date(year, 4, 15)?,
        },
        QuarterlyDueDate {
            quarter: "Q2",
            due: date(year, 6, 15)?,
        },
        QuarterlyDueDate {
            quarter: "Q3",
            due: date(year, 9, 15)?,
        },
        QuarterlyDueDate {
            quarter: "Q4",
            due: date(year + 1, 1, 15)?,
        },
    ])
}

/// First due date strictly after `today`.
pub fn next_due_date(today: NaiveDate) -> Result<QuarterlyDueDate> {
    // January 1-15 still belongs to the previous year's Q4.
    for year in [today.year() - 1, today.year()] {
        if let Some(next) = quarterly_due_dates(year)?
            .into_iter()
            .find(|q| q.due > today)
        {
            return Ok(next);
        }
    }
    Ok(quarterly_due_dates(today.year() + 1)?[0])
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SavingsStatus {
    OnTrack,
    SlightlyBehind,
    Behind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxSavingsStatus {
    pub status: SavingsStatus,
    pub recommended_savings: f64,
    pub difference: f64,
    /// `None` when nothing needed to be saved yet.
    pub on_track_pct: Option<f64>,
    pub catch_up_needed: f64,
}

pub fn savings_status(
    ytd_income: f64,
    ytd_saved: f64,
    recommended_rate_pct: f64,
) -> Result<TaxSavingsStatus> {
    ensure_non_negative("ytd_income", ytd_income)?;
    ensure_non_negative("ytd_saved", ytd_saved)?;
    ensure_in_range("recommended_rate_pct", recommended_rate_pct, 0.0, 100.0)?;

    let recommended_savings = ytd_income * recommended_rate_pct / 100.0;
    let difference = ytd_saved - recommended_savings;

    let status = if difference >= 0.0 {
        SavingsStatus::OnTrack
    } else if difference > -SLIGHTLY_BEHIND_TOLERANCE {
        SavingsStatus::SlightlyBehind
    } else {
        SavingsStatus::Behind
    };

    Ok(TaxSavingsStatus {
        status,
        recommended_savings,
        difference,
        on_track_pct: (recommended_savings > 0.0).then(|| ytd_saved / recommended_savings * 100.0),
        catch_up_needed: (-difference).max(0.0),
    })
}

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::FinanceError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeRecord {
    pub date: NaiveDate,
    pub amount: f64,
    #[serde(default)]
    pub source_category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseRecord {
    pub date: NaiveDate,
    pub amount: f64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tax_deductible: bool,
    /// Share of `amount` that is deductible, 0..1.
    #[serde(default = "full_deduction")]
    pub deduction_fraction: f64,
}

fn full_deduction() -> f64 {
    1.0
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Viewed,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    /// Sent to the client and still awaiting payment.
    pub fn is_outstanding(self) -> bool {
        matches!(self, Self::Sent | Self::Viewed | Self::Overdue)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: String,
    pub client_id: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub total: f64,
    pub status: InvoiceStatus,
    #[serde(default)]
    pub paid_date: Option<NaiveDate>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilingStatus {
    Single,
    #[serde(alias = "marriedJoint")]
    MarriedJoint,
    #[serde(alias = "marriedSeparate")]
    MarriedSeparate,
    #[serde(alias = "headOfHousehold")]
    HeadOfHousehold,
}

impl FromStr for FilingStatus {
    type Err = FinanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "single" => Ok(Self::Single),
            "married_joint" | "marriedjoint" => Ok(Self::MarriedJoint),
            "married_separate" | "marriedseparate" => Ok(Self::MarriedSeparate),
            "head_of_household" | "headofhousehold" => Ok(Self::HeadOfHousehold),
            other => Err(FinanceError::invalid(
                "filing_status",
                format!("unknown filing status '{other}'"),
            )),
        }
    }
}

impl fmt::Display for FilingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Single => "single",
            Self::MarriedJoint => "married_joint",
            Self::MarriedSeparate => "married_separate",
            Self::HeadOfHousehold => "head_of_household",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxEstimate {
    pub gross_income: f64,
    pub deductible_expenses: f64,
    pub net_income: f64,
    pub adjusted_gross_income: f64,
    pub taxable_income: f64,
    pub federal_tax: f64,
    pub state_tax: f64,
    pub self_employment_tax: f64,
    pub total_tax: f64,
    /// Percent of gross income.
    pub effective_rate: f64,
    pub quarterly_payment: f64,
    pub recommended_savings_pct: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunwayStatus {
    Critical,
    Warning,
    Fair,
    Healthy,
    CashPositive,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunwayResult {
    /// `f64::INFINITY` when cash positive; serialized as `null`.
    pub runway_months: f64,
    pub runway_days: f64,
    pub net_monthly_burn: f64,
    pub status: RunwayStatus,
    pub zero_cash_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub projected_income: f64,
    pub projected_expenses: f64,
    pub net: f64,
    pub cumulative: f64,
    pub confidence_low: f64,
    pub confidence_high: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineSource {
    History,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastSummary {
    pub avg_monthly_income: f64,
    pub avg_monthly_expenses: f64,
    pub avg_monthly_net: f64,
    pub income_source: BaselineSource,
    pub expense_source: BaselineSource,
    pub seasonality_applied: bool,
    pub forecast_end_balance: f64,
    pub total_projected_income: f64,
    pub total_projected_expenses: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Forecast {
    pub points: Vec<ForecastPoint>,
    pub summary: ForecastSummary,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Unknown,
    Low,
    Moderate,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityShare {
    pub entity: String,
    pub amount: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcentrationResult {
    pub total: f64,
    pub entity_count: usize,
    pub top_entity_pct: f64,
    pub top_three_pct: f64,
    /// 0 (fully diverse) to 10 000 (single entity).
    pub herfindahl_index: f64,
    /// HHI scaled to 0..100, higher is more concentrated.
    pub concentration_score: f64,
    pub risk_level: RiskLevel,
    pub top_entities: Vec<EntityShare>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    B,
    C,
    D,
}

impl Grade {
    pub fn status(self) -> &'static str {
        match self {
            Self::APlus => "Excellent",
            Self::A => "Very Good",
            Self::B => "Good",
            Self::C => "Fair",
            Self::D => "Needs Improvement",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthComponents {
    pub runway: f64,
    pub cash_flow: f64,
    pub debt: f64,
    pub emergency_fund: f64,
    pub income_diversity: f64,
}

impl HealthComponents {
    pub fn total(self) -> f64 {
        self.runway + self.cash_flow + self.debt + self.emergency_fund + self.income_diversity
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthScore {
    pub total_score: f64,
    pub grade: Grade,
    pub status: &'static str,
    pub components: HealthComponents,
    pub recommendations: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filing_status_parses_common_spellings() {
        assert_eq!("single".parse::<FilingStatus>(), Ok(FilingStatus::Single));
        assert_eq!(
            "Married-Joint".parse::<FilingStatus>(),
            Ok(FilingStatus::MarriedJoint)
        );
        assert_eq!(
            "head_of_household".parse::<FilingStatus>(),
            Ok(FilingStatus::HeadOfHousehold)
        );
    }

    #[test]
    fn filing_status_rejects_unknown_value() {
        let err = "widowed".parse::<FilingStatus>().expect_err("must reject");
        assert!(matches!(err, FinanceError::InvalidInput { .. }));
        assert!(err.to_string().contains("widowed"));
    }

    #[test]
    fn only_sent_viewed_and_overdue_invoices_are_outstanding() {
        assert!(InvoiceStatus::Sent.is_outstanding());
        assert!(InvoiceStatus::Viewed.is_outstanding());
        assert!(InvoiceStatus::Overdue.is_outstanding());
        assert!(!InvoiceStatus::Draft.is_outstanding());
        assert!(!InvoiceStatus::Paid.is_outstanding());
        assert!(!InvoiceStatus::Cancelled.is_outstanding());
    }

    #[test]
    fn expense_record_defaults_to_full_deduction() {
        let json = r#"{"date":"2024-03-01","amount":120.0,"category":"Software","taxDeductible":true}"#;
        let expense: ExpenseRecord = serde_json::from_str(json).expect("valid expense json");
        assert_eq!(expense.deduction_fraction, 1.0);
        assert!(expense.tax_deductible);
    }

    #[test]
    fn grade_serializes_a_plus_label() {
        let json = serde_json::to_string(&Grade::APlus).expect("serializable");
        assert_eq!(json, "\"A+\"");
        assert_eq!(Grade::D.status(), "Needs Improvement");
    }
}

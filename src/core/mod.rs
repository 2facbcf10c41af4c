pub mod concentration;
mod error;
pub mod forecast;
pub mod health;
pub mod portfolio;
pub mod receivables;
pub mod runway;
pub mod tax;
mod types;

pub use error::{FinanceError, Result};
pub use types::{
    BaselineSource, ConcentrationResult, EntityShare, ExpenseRecord, FilingStatus, Forecast,
    ForecastPoint, ForecastSummary, Grade, HealthComponents, HealthScore, IncomeRecord, Invoice,
    InvoiceStatus, RiskLevel, RunwayResult, RunwayStatus, TaxEstimate,
};

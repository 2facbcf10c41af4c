use std::collections::BTreeMap;
use std::net::SocketAddr;

use axum::{
    Router,
    extract::{Json, Query},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::core::forecast::{ExpectedValue, ForecastSettings, SeededVariance, VarianceSource};
use crate::core::health::HealthInputs;
use crate::core::portfolio::{Holding, PortfolioHealth, RiskMetrics};
use crate::core::receivables::AgingReport;
use crate::core::runway::Scenario;
use crate::core::tax::{ExpenseTaxSummary, QuarterlyDueDate};
use crate::core::{
    ExpenseRecord, FilingStatus, FinanceError, IncomeRecord, Invoice, TaxEstimate, concentration,
    forecast, health, portfolio, receivables, runway, tax,
};

const DEFAULT_STATE_RATE: f64 = 0.05;
const DEFAULT_SAVINGS_RATE_PCT: f64 = 30.0;
const DEFAULT_HORIZON_DAYS: u32 = 90;
const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct TaxPayload {
    gross_income: Option<f64>,
    deductible_expenses: Option<f64>,
    expenses: Option<Vec<ExpenseRecord>>,
    state_rate: Option<f64>,
    filing_status: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TaxResponse {
    #[serde(flatten)]
    estimate: TaxEstimate,
    #[serde(skip_serializing_if = "Option::is_none")]
    expense_summary: Option<ExpenseTaxSummary>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SavingsPayload {
    ytd_income: Option<f64>,
    ytd_saved: Option<f64>,
    recommended_rate_pct: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DeadlinesQuery {
    today: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeadlinesResponse {
    due_dates: Vec<QuarterlyDueDate>,
    next: QuarterlyDueDate,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RunwayPayload {
    balance: Option<f64>,
    monthly_expenses: Option<f64>,
    monthly_income: Option<f64>,
    as_of: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ScenarioPayload {
    balance: Option<f64>,
    monthly_income: Option<f64>,
    monthly_expenses: Option<f64>,
    scenarios: Vec<Scenario>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ForecastMode {
    Expected,
    Seeded,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ForecastPayload {
    income_history: Vec<IncomeRecord>,
    expense_history: Vec<ExpenseRecord>,
    invoices: Vec<Invoice>,
    horizon_days: Option<u32>,
    start: Option<NaiveDate>,
    seed: Option<u64>,
    mode: Option<ForecastMode>,
    settings: Option<ForecastSettings>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct HealthPayload {
    balance: Option<f64>,
    monthly_income: Option<f64>,
    monthly_expenses: Option<f64>,
    debt: Option<f64>,
    emergency_fund: Option<f64>,
    income_diversity_score: Option<f64>,
    /// Revenue per client; overrides `income_diversity_score` when present.
    income_sources: Option<BTreeMap<String, f64>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PortfolioPayload {
    holdings: Vec<Holding>,
}

#[derive(Debug, Serialize)]
struct PortfolioResponse {
    health: PortfolioHealth,
    risk: RiskMetrics,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ReceivablesPayload {
    invoices: Vec<Invoice>,
    as_of: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReceivablesResponse {
    days_sales_outstanding: f64,
    aging: AgingReport,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    service: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn router() -> Router {
    Router::new()
        .route("/api/status", get(status_handler))
        .route("/api/tax", post(tax_handler))
        .route("/api/tax/savings", post(savings_handler))
        .route("/api/tax/deadlines", get(deadlines_handler))
        .route("/api/runway", post(runway_handler))
        .route("/api/scenarios", post(scenarios_handler))
        .route("/api/forecast", post(forecast_handler))
        .route("/api/concentration", post(concentration_handler))
        .route("/api/health", post(health_handler))
        .route("/api/portfolio", post(portfolio_handler))
        .route("/api/receivables", post(receivables_handler))
        .fallback(not_found_handler)
}

pub async fn run_http_server(addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "pulse-finance API listening");
    axum::serve(listener, router()).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn status_handler() -> Response {
    json_response(
        StatusCode::OK,
        StatusResponse {
            service: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
        },
    )
}

async fn tax_handler(Json(payload): Json<TaxPayload>) -> Response {
    finance_response("tax", tax_impl(payload))
}

async fn savings_handler(Json(payload): Json<SavingsPayload>) -> Response {
    finance_response("tax/savings", savings_impl(payload))
}

async fn deadlines_handler(Query(query): Query<DeadlinesQuery>) -> Response {
    let today = query.today.unwrap_or_else(|| Utc::now().date_naive());
    finance_response("tax/deadlines", deadlines_impl(today))
}

async fn runway_handler(Json(payload): Json<RunwayPayload>) -> Response {
    finance_response("runway", runway_impl(payload))
}

async fn scenarios_handler(Json(payload): Json<ScenarioPayload>) -> Response {
    finance_response("scenarios", scenarios_impl(payload))
}

async fn forecast_handler(Json(payload): Json<ForecastPayload>) -> Response {
    finance_response("forecast", forecast_impl(payload))
}

async fn concentration_handler(Json(payload): Json<BTreeMap<String, f64>>) -> Response {
    debug!(entities = payload.len(), "concentration request");
    finance_response("concentration", concentration::concentration(payload))
}

async fn health_handler(Json(payload): Json<HealthPayload>) -> Response {
    finance_response("health", health_impl(payload))
}

async fn portfolio_handler(Json(payload): Json<PortfolioPayload>) -> Response {
    finance_response("portfolio", portfolio_impl(payload))
}

async fn receivables_handler(Json(payload): Json<ReceivablesPayload>) -> Response {
    finance_response("receivables", receivables_impl(payload))
}

fn tax_impl(payload: TaxPayload) -> crate::core::Result<TaxResponse> {
    let filing_status = match payload.filing_status.as_deref() {
        Some(raw) => raw.parse::<FilingStatus>()?,
        None => FilingStatus::Single,
    };
    let (deductible, expense_summary) = match payload.expenses {
        Some(expenses) => {
            let summary = tax::categorize_expenses(&expenses)?;
            (summary.deductible_expenses, Some(summary))
        }
        None => (payload.deductible_expenses.unwrap_or(0.0), None),
    };
    debug!(%filing_status, itemised = expense_summary.is_some(), "tax request");

    let estimate = tax::estimate(
        payload.gross_income.unwrap_or(0.0),
        deductible,
        payload.state_rate.unwrap_or(DEFAULT_STATE_RATE),
        filing_status,
    )?;
    Ok(TaxResponse {
        estimate,
        expense_summary,
    })
}

fn savings_impl(payload: SavingsPayload) -> crate::core::Result<tax::TaxSavingsStatus> {
    tax::savings_status(
        payload.ytd_income.unwrap_or(0.0),
        payload.ytd_saved.unwrap_or(0.0),
        payload
            .recommended_rate_pct
            .unwrap_or(DEFAULT_SAVINGS_RATE_PCT),
    )
}

fn deadlines_impl(today: NaiveDate) -> crate::core::Result<DeadlinesResponse> {
    let mut due_dates = tax::quarterly_due_dates(today.year())?.to_vec();
    due_dates.extend(tax::quarterly_due_dates(today.year() + 1)?);
    Ok(DeadlinesResponse {
        due_dates,
        next: tax::next_due_date(today)?,
    })
}

fn runway_impl(payload: RunwayPayload) -> crate::core::Result<crate::core::RunwayResult> {
    let as_of = payload.as_of.unwrap_or_else(|| Utc::now().date_naive());
    runway::runway_as_of(
        payload.balance.unwrap_or(0.0),
        payload.monthly_expenses.unwrap_or(0.0),
        payload.monthly_income.unwrap_or(0.0),
        as_of,
    )
}

fn scenarios_impl(payload: ScenarioPayload) -> crate::core::Result<Vec<runway::ScenarioOutcome>> {
    debug!(scenarios = payload.scenarios.len(), "scenario request");
    runway::scenario_analysis(
        payload.balance.unwrap_or(0.0),
        payload.monthly_income.unwrap_or(0.0),
        payload.monthly_expenses.unwrap_or(0.0),
        &payload.scenarios,
    )
}

fn forecast_impl(payload: ForecastPayload) -> crate::core::Result<crate::core::Forecast> {
    let mode = payload.mode.unwrap_or(if payload.seed.is_some() {
        ForecastMode::Seeded
    } else {
        ForecastMode::Expected
    });
    let horizon_days = payload.horizon_days.unwrap_or(DEFAULT_HORIZON_DAYS);
    let start = payload.start.unwrap_or_else(|| Utc::now().date_naive());
    let settings = payload.settings.unwrap_or_default();
    debug!(
        ?mode,
        horizon_days,
        income_records = payload.income_history.len(),
        expense_records = payload.expense_history.len(),
        invoices = payload.invoices.len(),
        "forecast request"
    );

    let mut expected = ExpectedValue;
    let mut seeded;
    let variance: &mut dyn VarianceSource = match mode {
        ForecastMode::Expected => &mut expected,
        ForecastMode::Seeded => {
            seeded = SeededVariance::new(payload.seed.unwrap_or(DEFAULT_SEED));
            &mut seeded
        }
    };

    forecast::forecast(
        &payload.income_history,
        &payload.expense_history,
        &payload.invoices,
        horizon_days,
        start,
        &settings,
        variance,
    )
}

fn health_impl(payload: HealthPayload) -> crate::core::Result<crate::core::HealthScore> {
    let mut inputs = HealthInputs {
        balance: payload.balance.unwrap_or(0.0),
        monthly_income: payload.monthly_income.unwrap_or(0.0),
        monthly_expenses: payload.monthly_expenses.unwrap_or(0.0),
        debt: payload.debt.unwrap_or(0.0),
        emergency_fund: payload.emergency_fund.unwrap_or(0.0),
        income_diversity_score: payload.income_diversity_score.unwrap_or(0.0),
    };
    if let Some(sources) = payload.income_sources {
        let analysis = concentration::concentration(sources)?;
        inputs = inputs.with_concentration(&analysis);
    }
    health::score(&inputs)
}

fn portfolio_impl(payload: PortfolioPayload) -> crate::core::Result<PortfolioResponse> {
    debug!(holdings = payload.holdings.len(), "portfolio request");
    Ok(PortfolioResponse {
        health: portfolio::analyze(&payload.holdings)?,
        risk: portfolio::risk_metrics(&payload.holdings)?,
    })
}

fn receivables_impl(payload: ReceivablesPayload) -> crate::core::Result<ReceivablesResponse> {
    let as_of = payload.as_of.unwrap_or_else(|| Utc::now().date_naive());
    Ok(ReceivablesResponse {
        days_sales_outstanding: receivables::days_sales_outstanding(&payload.invoices)?,
        aging: receivables::aging_report(&payload.invoices, as_of)?,
    })
}

fn finance_response<T: Serialize>(route: &str, result: Result<T, FinanceError>) -> Response {
    match result {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(err) => {
            warn!(route, error = %err, "rejected request");
            error_response(StatusCode::BAD_REQUEST, &err.to_string())
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

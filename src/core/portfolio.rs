use serde::{Deserialize, Serialize};

use super::concentration::concentration;
use super::error::{FinanceError, Result, ensure_non_negative};

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const MARKET_VOLATILITY: f64 = 0.15;
const VAR_PERCENTILE: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub symbol: String,
    pub shares: f64,
    pub avg_price: f64,
    pub current_price: f64,
}

impl Holding {
    pub fn market_value(&self) -> f64 {
        self.shares * self.current_price
    }

    pub fn cost_basis(&self) -> f64 {
        self.shares * self.avg_price
    }

    pub fn gain_loss(&self) -> f64 {
        self.market_value() - self.cost_basis()
    }

    /// Percent return on cost; 0 for a position with no cost basis.
    pub fn gain_loss_pct(&self) -> f64 {
        let cost = self.cost_basis();
        if cost > 0.0 {
            self.gain_loss() / cost * 100.0
        } else {
            0.0
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PortfolioRisk {
    High,
    MediumHigh,
    Medium,
    LowMedium,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceRating {
    Excellent,
    Good,
    Moderate,
    NeedsImprovement,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    Aggressive,
    Growth,
    Moderate,
    Conservative,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionWeight {
    pub symbol: String,
    pub market_value: f64,
    pub weight_pct: f64,
    pub gain_loss_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioHealth {
    pub total_value: f64,
    pub total_cost: f64,
    pub total_gain_loss: f64,
    pub total_gain_loss_pct: f64,
    pub num_positions: usize,
    pub herfindahl_index: f64,
    pub diversity_score: f64,
    pub max_concentration_pct: f64,
    pub risk_level: PortfolioRisk,
    pub sharpe_approximation: f64,
    pub performance_rating: PerformanceRating,
    pub positions: Vec<PositionWeight>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskMetrics {
    pub value_at_risk_95: f64,
    pub max_drawdown_pct: f64,
    pub volatility_pct: f64,
    pub beta_estimate: f64,
    pub risk_category: RiskCategory,
    pub downside_risk_pct: f64,
}

fn validate_holdings(holdings: &[Holding]) -> Result<()> {
    if holdings.is_empty() {
        return Err(FinanceError::invalid("holdings", "must not be empty"));
    }
    for (index, holding) in holdings.iter().enumerate() {
        ensure_non_negative(&format!("holdings[{index}].shares"), holding.shares)?;
        ensure_non_negative(&format!("holdings[{index}].avg_price"), holding.avg_price)?;
        ensure_non_negative(
            &format!("holdings[{index}].current_price"),
            holding.current_price,
        )?;
    }
    let total_cost: f64 = holdings.iter().map(Holding::cost_basis).sum();
    if total_cost <= 0.0 {
        return Err(FinanceError::invalid("holdings", "total cost basis must be > 0"));
    }
    Ok(())
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation; 0 with fewer than two values.
fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() as f64 - 1.0);
    var.sqrt()
}

fn percentile(values: &mut [f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    values.sort_by(|a, b| a.total_cmp(b));

    let rank = (p / 100.0) * (values.len() as f64 - 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let w = rank - lower as f64;
    values[lower] * (1.0 - w) + values[upper] * w
}

fn risk_level_for(max_concentration_pct: f64, num_positions: usize) -> PortfolioRisk {
    if max_concentration_pct > 40.0 {
        PortfolioRisk::High
    } else if max_concentration_pct > 30.0 {
        PortfolioRisk::MediumHigh
    } else if num_positions < 5 {
        PortfolioRisk::Medium
    } else {
        PortfolioRisk::LowMedium
    }
}

fn rating_for(total_gain_loss_pct: f64) -> PerformanceRating {
    if total_gain_loss_pct > 15.0 {
        PerformanceRating::Excellent
    } else if total_gain_loss_pct > 8.0 {
        PerformanceRating::Good
    } else if total_gain_loss_pct > 0.0 {
        PerformanceRating::Moderate
    } else {
        PerformanceRating::NeedsImprovement
    }
}

fn category_for(beta: f64) -> RiskCategory {
    if beta > 1.3 {
        RiskCategory::Aggressive
    } else if beta > 1.1 {
        RiskCategory::Growth
    } else if beta > 0.9 {
        RiskCategory::Moderate
    } else {
        RiskCategory::Conservative
    }
}

fn portfolio_recommendations(
    positions: &[PositionWeight],
    diversity_score: f64,
    total_gain_loss_pct: f64,
) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(top) = positions.first().filter(|p| p.weight_pct > 35.0) {
        out.push(format!(
            "Reduce {} exposure; it is {:.1}% of the portfolio",
            top.symbol, top.weight_pct
        ));
    }
    if positions.len() < 5 {
        out.push("Add positions to spread single-name risk".to_string());
    }
    if diversity_score < 50.0 {
        out.push("Rebalance toward a more even allocation".to_string());
    }
    let losers = positions.iter().filter(|p| p.gain_loss_pct < -10.0).count();
    if losers > 0 {
        out.push(format!("Review {losers} position(s) down more than 10%"));
    }
    if total_gain_loss_pct < 5.0 {
        out.push("Overall return trails a 5% benchmark; revisit the strategy".to_string());
    }
    out
}

/// Allocation, concentration and performance summary for a set of holdings.
pub fn analyze(holdings: &[Holding]) -> Result<PortfolioHealth> {
    validate_holdings(holdings)?;

    let total_value: f64 = holdings.iter().map(Holding::market_value).sum();
    let total_cost: f64 = holdings.iter().map(Holding::cost_basis).sum();
    let total_gain_loss = total_value - total_cost;
    let total_gain_loss_pct = total_gain_loss / total_cost * 100.0;

    let allocation = concentration(
        holdings
            .iter()
            .map(|h| (h.symbol.as_str(), h.market_value())),
    )?;
    // Worthless holdings have no allocation to be diverse across.
    let diversity_score = if total_value > 0.0 {
        let sum_sq_weights = allocation.herfindahl_index / 10_000.0;
        ((1.0 - sum_sq_weights) * 150.0).clamp(0.0, 100.0)
    } else {
        0.0
    };

    let mut positions: Vec<PositionWeight> = holdings
        .iter()
        .map(|h| PositionWeight {
            symbol: h.symbol.clone(),
            market_value: h.market_value(),
            weight_pct: if total_value > 0.0 {
                h.market_value() / total_value * 100.0
            } else {
                0.0
            },
            gain_loss_pct: h.gain_loss_pct(),
        })
        .collect();
    positions.sort_by(|a, b| b.market_value.total_cmp(&a.market_value));

    let returns: Vec<f64> = holdings.iter().map(Holding::gain_loss_pct).collect();
    let std = sample_std(&returns);
    let sharpe_approximation = if std > 0.0 { mean(&returns) / std } else { 0.0 };

    let recommendations =
        portfolio_recommendations(&positions, diversity_score, total_gain_loss_pct);

    Ok(PortfolioHealth {
        total_value,
        total_cost,
        total_gain_loss,
        total_gain_loss_pct,
        num_positions: holdings.len(),
        herfindahl_index: allocation.herfindahl_index,
        diversity_score,
        max_concentration_pct: allocation.top_entity_pct,
        risk_level: risk_level_for(allocation.top_entity_pct, holdings.len()),
        sharpe_approximation,
        performance_rating: rating_for(total_gain_loss_pct),
        positions,
        recommendations,
    })
}

/// Cross-sectional risk figures built from each position's return on cost.
///
/// Without a price history the spread of position returns stands in for
/// volatility, so these are rough indicators rather than market risk measures.
pub fn risk_metrics(holdings: &[Holding]) -> Result<RiskMetrics> {
    validate_holdings(holdings)?;

    let total_value: f64 = holdings.iter().map(Holding::market_value).sum();
    let returns: Vec<f64> = holdings.iter().map(|h| h.gain_loss_pct() / 100.0).collect();

    let mut value_changes: Vec<f64> = returns.iter().map(|r| r * total_value).collect();
    let value_at_risk_95 = percentile(&mut value_changes, VAR_PERCENTILE).abs();

    let worst = returns.iter().copied().fold(f64::INFINITY, f64::min);
    let annualise = TRADING_DAYS_PER_YEAR.sqrt();
    let volatility = sample_std(&returns) * annualise;
    let beta_estimate = volatility / MARKET_VOLATILITY;

    let negatives: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    let downside = sample_std(&negatives) * annualise;

    Ok(RiskMetrics {
        value_at_risk_95,
        max_drawdown_pct: worst * 100.0,
        volatility_pct: volatility * 100.0,
        beta_estimate,
        risk_category: category_for(beta_estimate),
        downside_risk_pct: downside * 100.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::collection::vec;
    use proptest::prelude::{prop_assert, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn holding(symbol: &str, shares: f64, avg_price: f64, current_price: f64) -> Holding {
        Holding {
            symbol: symbol.to_string(),
            shares,
            avg_price,
            current_price,
        }
    }

    fn sample_holdings() -> Vec<Holding> {
        vec![
            holding("AAA", 10.0, 100.0, 120.0),
            holding("BBB", 10.0, 100.0, 90.0),
            holding("CCC", 20.0, 50.0, 55.0),
        ]
    }

    #[test]
    fn holding_derived_values() {
        let h = holding("AAA", 10.0, 100.0, 120.0);
        assert_approx(h.market_value(), 1_200.0);
        assert_approx(h.cost_basis(), 1_000.0);
        assert_approx(h.gain_loss(), 200.0);
        assert_approx(h.gain_loss_pct(), 20.0);
        assert_approx(holding("FREE", 5.0, 0.0, 10.0).gain_loss_pct(), 0.0);
    }

    #[test]
    fn analyze_sample_portfolio() {
        let health = analyze(&sample_holdings()).expect("valid");
        assert_approx(health.total_value, 3_200.0);
        assert_approx(health.total_cost, 3_000.0);
        assert_approx(health.total_gain_loss_pct, 200.0 / 3_000.0 * 100.0);
        assert_approx(health.herfindahl_index, 3_378.90625);
        assert_approx(health.diversity_score, 99.31640625);
        assert_approx(health.max_concentration_pct, 37.5);
        assert_eq!(health.risk_level, PortfolioRisk::MediumHigh);
        assert_eq!(health.performance_rating, PerformanceRating::Moderate);
        assert_approx(
            health.sharpe_approximation,
            (20.0 / 3.0) / (700.0_f64 / 3.0).sqrt(),
        );
        assert_eq!(health.positions[0].symbol, "AAA");
        assert_eq!(health.num_positions, 3);
    }

    #[test]
    fn single_position_is_high_risk_with_zero_sharpe() {
        let health = analyze(&[holding("ONE", 10.0, 10.0, 12.0)]).expect("valid");
        assert_eq!(health.risk_level, PortfolioRisk::High);
        assert_approx(health.diversity_score, 0.0);
        assert_approx(health.sharpe_approximation, 0.0);
        assert_eq!(health.performance_rating, PerformanceRating::Excellent);
    }

    #[test]
    fn evenly_spread_portfolio_is_low_medium() {
        let holdings: Vec<Holding> = (0..8)
            .map(|i| holding(&format!("S{i}"), 10.0, 10.0, 10.0))
            .collect();
        let health = analyze(&holdings).expect("valid");
        assert_eq!(health.risk_level, PortfolioRisk::LowMedium);
        assert_approx(health.diversity_score, 100.0);
        assert_eq!(health.performance_rating, PerformanceRating::NeedsImprovement);
    }

    #[test]
    fn worthless_portfolio_has_no_diversity() {
        let health = analyze(&[holding("GONE", 10.0, 10.0, 0.0)]).expect("valid");
        assert_approx(health.total_value, 0.0);
        assert_approx(health.diversity_score, 0.0);
        assert_approx(health.total_gain_loss_pct, -100.0);

        let spread: Vec<Holding> = (0..6)
            .map(|i| holding(&format!("Z{i}"), 5.0, 20.0, 0.0))
            .collect();
        let health = analyze(&spread).expect("valid");
        assert_approx(health.diversity_score, 0.0);
        assert_eq!(health.performance_rating, PerformanceRating::NeedsImprovement);
    }

    #[test]
    fn analyze_rejects_empty_and_costless_portfolios() {
        let err = analyze(&[]).expect_err("empty must fail");
        assert!(err.to_string().contains("holdings"));
        assert!(analyze(&[holding("FREE", 10.0, 0.0, 5.0)]).is_err());
        assert!(risk_metrics(&[holding("NEG", -1.0, 10.0, 5.0)]).is_err());
    }

    #[test]
    fn risk_metrics_sample_portfolio() {
        let risk = risk_metrics(&sample_holdings()).expect("valid");
        // value changes sorted: -320, 320, 640; 5th percentile interpolates
        assert_approx(risk.value_at_risk_95, 256.0);
        assert_approx(risk.max_drawdown_pct, -10.0);

        let std = (0.07_f64 / 3.0).sqrt();
        assert_approx(risk.volatility_pct, std * 252.0_f64.sqrt() * 100.0);
        assert_approx(risk.beta_estimate, std * 252.0_f64.sqrt() / 0.15);
        assert_eq!(risk.risk_category, RiskCategory::Aggressive);
        assert_approx(risk.downside_risk_pct, 0.0);
    }

    #[test]
    fn flat_portfolio_is_conservative() {
        let risk = risk_metrics(&[
            holding("A", 1.0, 10.0, 10.0),
            holding("B", 1.0, 10.0, 10.0),
        ])
        .expect("valid");
        assert_approx(risk.value_at_risk_95, 0.0);
        assert_approx(risk.beta_estimate, 0.0);
        assert_eq!(risk.risk_category, RiskCategory::Conservative);
    }

    #[test]
    fn category_cutoffs_are_strict() {
        assert_eq!(category_for(1.3), RiskCategory::Growth);
        assert_eq!(category_for(1.1), RiskCategory::Moderate);
        assert_eq!(category_for(0.9), RiskCategory::Conservative);
        assert_eq!(category_for(1.31), RiskCategory::Aggressive);
    }

    #[test]
    fn percentile_interpolates_between_points() {
        let mut values = vec![4.0, 1.0, 3.0, 2.0];
        assert_approx(percentile(&mut values, 25.0), 1.75);
        assert_approx(percentile(&mut [7.0], 5.0), 7.0);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_scores_stay_in_bounds(
            prices in vec((1u32..1_000, 1u32..1_000, 1u32..100), 1..12)
        ) {
            let holdings: Vec<Holding> = prices
                .iter()
                .enumerate()
                .map(|(i, (avg, current, shares))| {
                    holding(&format!("H{i}"), *shares as f64, *avg as f64, *current as f64)
                })
                .collect();
            let health = analyze(&holdings).expect("valid holdings");
            prop_assert!((0.0..=100.0).contains(&health.diversity_score));
            prop_assert!(health.max_concentration_pct <= 100.0 + 1e-9);

            let risk = risk_metrics(&holdings).expect("valid holdings");
            prop_assert!(risk.value_at_risk_95 >= 0.0);
            prop_assert!(risk.volatility_pct >= 0.0);
            prop_assert!(risk.max_drawdown_pct >= -100.0 - 1e-9);
        }
    }
}

use std::collections::BTreeMap;

use super::error::{FinanceError, Result, ensure_non_negative};
use super::types::{ConcentrationResult, EntityShare, RiskLevel};

const HIGH_TOP_SHARE_PCT: f64 = 50.0;
const HIGH_HHI: f64 = 2_500.0;
const MODERATE_TOP_SHARE_PCT: f64 = 30.0;
const MODERATE_HHI: f64 = 1_500.0;
const TOP_ENTITIES_REPORTED: usize = 5;

/// Herfindahl-Hirschman concentration of revenue (or value) across entities.
///
/// Repeated entity names are summed. Empty input and a zero total both yield
/// `RiskLevel::Unknown` with every figure at zero.
pub fn concentration<K: AsRef<str>>(
    entity_amounts: impl IntoIterator<Item = (K, f64)>,
) -> Result<ConcentrationResult> {
    let mut amounts: BTreeMap<String, f64> = BTreeMap::new();
    for (entity, amount) in entity_amounts {
        let entity = entity.as_ref();
        ensure_non_negative(&format!("amount for '{entity}'"), amount)?;
        *amounts.entry(entity.to_string()).or_insert(0.0) += amount;
    }

    let total: f64 = amounts.values().sum();
    if !total.is_finite() {
        return Err(FinanceError::invalid("total", "amounts overflow when summed"));
    }
    if amounts.is_empty() || total <= 0.0 {
        return Ok(ConcentrationResult {
            total: 0.0,
            entity_count: amounts.len(),
            top_entity_pct: 0.0,
            top_three_pct: 0.0,
            herfindahl_index: 0.0,
            concentration_score: 0.0,
            risk_level: RiskLevel::Unknown,
            top_entities: Vec::new(),
        });
    }

    let mut ranked: Vec<(String, f64)> = amounts.into_iter().collect();
    // Stable sort keeps ties in name order.
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    let herfindahl_index = ranked
        .iter()
        .map(|(_, amount)| (amount / total * 100.0).powi(2))
        .sum::<f64>();
    let top_entity_pct = ranked[0].1 / total * 100.0;
    let top_three_pct =
        ranked.iter().take(3).map(|(_, amount)| amount).sum::<f64>() / total * 100.0;

    Ok(ConcentrationResult {
        total,
        entity_count: ranked.len(),
        top_entity_pct,
        top_three_pct,
        herfindahl_index,
        concentration_score: (herfindahl_index / 25.0).min(100.0),
        risk_level: risk_level(top_entity_pct, herfindahl_index),
        top_entities: ranked
            .iter()
            .take(TOP_ENTITIES_REPORTED)
            .map(|(entity, amount)| EntityShare {
                entity: entity.clone(),
                amount: *amount,
                percentage: amount / total * 100.0,
            })
            .collect(),
    })
}

/// Both cutoffs are strict: a share of exactly 50% or an HHI of exactly
/// 2500 is still moderate.
pub fn risk_level(top_entity_pct: f64, herfindahl_index: f64) -> RiskLevel {
    if top_entity_pct > HIGH_TOP_SHARE_PCT || herfindahl_index > HIGH_HHI {
        RiskLevel::High
    } else if top_entity_pct > MODERATE_TOP_SHARE_PCT || herfindahl_index > MODERATE_HHI {
        RiskLevel::Moderate
    } else {
        RiskLevel::Low
    }
}

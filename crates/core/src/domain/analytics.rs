use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Token counts reported by the completion API for one model invocation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: i64,
    #[serde(default)]
    pub completion_tokens: i64,
    #[serde(default)]
    pub total_tokens: i64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub prompt_cost: Decimal,
    pub completion_cost: Decimal,
    pub total_cost: Decimal,
}

/// Fixed per-million-token rates for the configured completion model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModelPricing {
    pub prompt_per_million: Decimal,
    pub completion_per_million: Decimal,
}

impl Default for ModelPricing {
    fn default() -> Self {
        // o3-mini list pricing, USD per million tokens.
        Self {
            prompt_per_million: Decimal::new(110, 2),
            completion_per_million: Decimal::new(440, 2),
        }
    }
}

impl ModelPricing {
    pub fn cost_for(&self, usage: &TokenUsage) -> CostBreakdown {
        let million = Decimal::from(1_000_000u32);
        let prompt_cost = self.prompt_per_million * Decimal::from(usage.prompt_tokens) / million;
        let completion_cost =
            self.completion_per_million * Decimal::from(usage.completion_tokens) / million;
        CostBreakdown { prompt_cost, completion_cost, total_cost: prompt_cost + completion_cost }
    }
}

/// One persisted row of token-cost analytics, appended after every completed
/// model invocation and never mutated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsRecord {
    pub date: DateTime<Utc>,
    pub model: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub prompt_cost: Decimal,
    pub completion_cost: Decimal,
    pub total_cost: Decimal,
}

impl AnalyticsRecord {
    pub fn from_usage(model: impl Into<String>, usage: TokenUsage, cost: CostBreakdown) -> Self {
        Self {
            date: Utc::now(),
            model: model.into(),
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
            prompt_cost: cost.prompt_cost,
            completion_cost: cost.completion_cost,
            total_cost: cost.total_cost,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelAggregate {
    pub model: String,
    pub requests: u64,
    pub total_tokens: i64,
    pub total_cost: Decimal,
}

/// Totals and averages over the full analytics table, computed in exact
/// decimal arithmetic from the persisted rows.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsAggregate {
    pub total_requests: u64,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub prompt_cost: Decimal,
    pub completion_cost: Decimal,
    pub total_cost: Decimal,
    pub average_tokens_per_request: f64,
    pub first_request: Option<DateTime<Utc>>,
    pub last_request: Option<DateTime<Utc>>,
    pub models: Vec<ModelAggregate>,
}

impl AnalyticsAggregate {
    pub fn from_records(records: &[AnalyticsRecord]) -> Self {
        let mut aggregate = Self::default();
        let mut per_model: BTreeMap<&str, ModelAggregate> = BTreeMap::new();

        for record in records {
            aggregate.total_requests += 1;
            aggregate.prompt_tokens += record.prompt_tokens;
            aggregate.completion_tokens += record.completion_tokens;
            aggregate.total_tokens += record.total_tokens;
            aggregate.prompt_cost += record.prompt_cost;
            aggregate.completion_cost += record.completion_cost;
            aggregate.total_cost += record.total_cost;

            aggregate.first_request = match aggregate.first_request {
                Some(first) if first <= record.date => Some(first),
                _ => Some(record.date),
            };
            aggregate.last_request = match aggregate.last_request {
                Some(last) if last >= record.date => Some(last),
                _ => Some(record.date),
            };

            let entry = per_model.entry(record.model.as_str()).or_insert_with(|| {
                ModelAggregate { model: record.model.clone(), ..ModelAggregate::default() }
            });
            entry.requests += 1;
            entry.total_tokens += record.total_tokens;
            entry.total_cost += record.total_cost;
        }

        if aggregate.total_requests > 0 {
            aggregate.average_tokens_per_request =
                aggregate.total_tokens as f64 / aggregate.total_requests as f64;
        }
        aggregate.models = per_model.into_values().collect();
        aggregate
    }
}

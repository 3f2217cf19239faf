// Threshold alert evaluation. Pure: rules are fixed at construction.

use std::collections::HashMap;

use crate::models::{AlertEvent, AlertRule, Category, Reading};

/// Rules keyed by category and optional metric name.
type RuleKey = (Category, Option<String>);

#[derive(Debug, Clone)]
pub struct AlertEvaluator {
    rules: HashMap<RuleKey, AlertRule>,
}

impl Default for AlertEvaluator {
    fn default() -> Self {
        Self::new(vec![AlertRule::high_cpu()])
    }
}

impl AlertEvaluator {
    /// One rule per category and metric; a later rule for the same pair replaces the earlier one.
    pub fn new(rules: impl IntoIterator<Item = AlertRule>) -> Self {
        Self {
            rules: rules
                .into_iter()
                .map(|r| ((r.category.clone(), r.metric.clone()), r))
                .collect(),
        }
    }

    /// An event for every reading that crosses its rule. A rule naming the reading's metric
    /// wins over the category-wide one. No cooldown.
    pub fn evaluate(&self, reading: &Reading) -> Option<AlertEvent> {
        let rule = self
            .rules
            .get(&(reading.category.clone(), Some(reading.name.clone())))
            .or_else(|| self.rules.get(&(reading.category.clone(), None)))
            .filter(|r| r.applies_to(reading))?;
        if !rule.comparator.holds(reading.value, rule.threshold) {
            return None;
        }
        Some(AlertEvent {
            category: reading.category.clone(),
            observed_value: reading.value,
            threshold: rule.threshold,
            message: rule.render(reading),
            timestamp: reading.timestamp,
            entity: reading.entity.clone(),
        })
    }

    /// The category-wide rule, if any.
    pub fn rule(&self, category: &Category) -> Option<&AlertRule> {
        self.rules.get(&(category.clone(), None))
    }
}

use std::collections::BTreeMap;

use crate::perks::model::EPSILON;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackCategory {
    /// Summed into the additive accumulator (`add`)
    Additive,
    /// Multiplied into the multiplicative accumulator (`mul`)
    Multiplicative,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StackContribution<K> {
    pub key: K,
    pub category: StackCategory,
    pub value: f64,
}

impl<K> StackContribution<K> {
    pub fn additive(key: K, value: f64) -> Self {
        Self {
            key,
            category: StackCategory::Additive,
            value,
        }
    }

    pub fn multiplicative(key: K, value: f64) -> Self {
        Self {
            key,
            category: StackCategory::Multiplicative,
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryTotals {
    pub additive: f64,
    pub multiplicative: f64,
}

impl Default for CategoryTotals {
    fn default() -> Self {
        Self {
            additive: 0.0,
            multiplicative: 1.0,
        }
    }
}

impl CategoryTotals {
    pub fn apply(&mut self, category: StackCategory, value: f64) {
        match category {
            StackCategory::Additive => self.additive += value,
            StackCategory::Multiplicative => self.multiplicative *= value,
        }
    }

    /// Folds another accumulator into self.
    pub fn add_from(&mut self, other: &CategoryTotals) {
        self.additive += other.additive;
        self.multiplicative *= other.multiplicative;
    }

    pub fn compose(self, base: f64) -> f64 {
        (base + self.additive) * self.multiplicative
    }

    pub fn is_identity(&self) -> bool {
        self.additive.abs() <= EPSILON && (self.multiplicative - 1.0).abs() <= EPSILON
    }
}

#[derive(Debug, Clone)]
pub struct StatStacking<K: Ord> {
    totals: BTreeMap<K, CategoryTotals>,
}

impl<K: Ord> Default for StatStacking<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord> StatStacking<K> {
    pub fn new() -> Self {
        Self {
            totals: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, contribution: StackContribution<K>) {
        self.totals
            .entry(contribution.key)
            .or_default()
            .apply(contribution.category, contribution.value);
    }

    /// Identity totals for keys nothing contributed to.
    pub fn totals_for(&self, key: &K) -> CategoryTotals {
        self.totals.get(key).copied().unwrap_or_default()
    }

    pub fn composed_for(&self, key: &K, base: f64) -> f64 {
        self.totals_for(key).compose(base)
    }

    /// Merges the accumulators of `other` into self, key by key.
    pub fn merge_from(&mut self, other: &StatStacking<K>)
    where
        K: Clone,
    {
        for (key, totals) in &other.totals {
            self.totals
                .entry(key.clone())
                .or_default()
                .add_from(totals);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &CategoryTotals)> {
        self.totals.iter()
    }
}

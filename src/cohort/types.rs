use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::models::{
    AggregationAnchor, Category, DataRecencyFilter, OffsetSpec, SummarizationPeriod,
    SyntheticPatient,
};

use super::error::CohortError;

// ═══════════════════════════════════════════
// Category sets and counts
// ═══════════════════════════════════════════

/// Categories a single patient belongs to.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CategorySet(u8);

impl CategorySet {
    pub const EMPTY: CategorySet = CategorySet(0);

    pub fn of(categories: &[Category]) -> Self {
        categories.iter().copied().collect()
    }

    pub fn single(category: Category) -> Self {
        Self(category.bit())
    }

    pub fn insert(&mut self, category: Category) {
        self.0 |= category.bit();
    }

    pub fn contains(&self, category: Category) -> bool {
        self.0 & category.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = Category> + '_ {
        Category::ALL.iter().copied().filter(|c| self.contains(*c))
    }

    pub fn union(self, other: CategorySet) -> CategorySet {
        CategorySet(self.0 | other.0)
    }

    /// Only the threshold categories.
    pub fn flagged(self) -> CategorySet {
        self.iter().filter(Category::is_flagged).collect()
    }
}

impl FromIterator<Category> for CategorySet {
    fn from_iter<I: IntoIterator<Item = Category>>(iter: I) -> Self {
        let mut set = CategorySet::EMPTY;
        for category in iter {
            set.insert(category);
        }
        set
    }
}

impl fmt::Debug for CategorySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for CategorySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<&str> = self.iter().map(|c| c.as_str()).collect();
        if ids.is_empty() {
            f.write_str("(none)")
        } else {
            f.write_str(&ids.join("+"))
        }
    }
}

impl Serialize for CategorySet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for CategorySet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let categories = Vec::<Category>::deserialize(deserializer)?;
        Ok(categories.into_iter().collect())
    }
}

/// Per-category patient counts. Absent categories count as zero.
///
/// Deserializes from any accepted label form, so a creation-label map such as
/// `{"Time below 3.0 mmol/L > 1%": 40}` loads directly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryCounts(BTreeMap<Category, u32>);

impl CategoryCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: &[(Category, u32)]) -> Self {
        let mut counts = Self::new();
        for (category, count) in pairs {
            counts.set(*category, *count);
        }
        counts
    }

    /// Build from `(label, count)` pairs in any accepted label form.
    pub fn from_labels<'a, I>(pairs: I) -> Result<Self, CohortError>
    where
        I: IntoIterator<Item = (&'a str, u32)>,
    {
        let mut counts = Self::new();
        for (label, count) in pairs {
            counts.set(label.parse()?, count);
        }
        Ok(counts)
    }

    pub fn get(&self, category: Category) -> u32 {
        self.0.get(&category).copied().unwrap_or(0)
    }

    pub fn set(&mut self, category: Category, count: u32) {
        self.0.insert(category, count);
    }

    pub fn increment(&mut self, category: Category) {
        *self.0.entry(category).or_insert(0) += 1;
    }

    pub fn contains(&self, category: Category) -> bool {
        self.0.contains_key(&category)
    }

    /// Categories with an explicit entry, including explicit zeros.
    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, u32)> + '_ {
        self.0.iter().map(|(c, n)| (*c, *n))
    }

    pub fn nonzero(&self) -> impl Iterator<Item = (Category, u32)> + '_ {
        self.iter().filter(|(_, n)| *n > 0)
    }

    pub fn total(&self) -> u32 {
        self.0.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Multiply every count by `factor`, rounding half up.
    pub fn scaled(&self, factor: f64) -> Self {
        let scaled = self
            .0
            .iter()
            .map(|(c, n)| (*c, (f64::from(*n) * factor + 0.5).floor().max(0.0) as u32))
            .collect();
        Self(scaled)
    }

    /// Entry-wise sum.
    pub fn merge(&mut self, other: &CategoryCounts) {
        for (category, count) in other.iter() {
            *self.0.entry(category).or_insert(0) += count;
        }
    }
}

// ═══════════════════════════════════════════
// Requests and batches
// ═══════════════════════════════════════════

/// What to generate for one offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CategoryRequest {
    /// Each nonzero category gets that many patients from its own template.
    Independent { counts: CategoryCounts },
    /// `count` patients that each satisfy every listed category at once.
    Combination { categories: CategorySet, count: u32 },
}

impl CategoryRequest {
    pub fn independent(counts: CategoryCounts) -> Self {
        Self::Independent { counts }
    }

    pub fn total_patients(&self) -> u32 {
        match self {
            Self::Independent { counts } => counts.total(),
            Self::Combination { count, .. } => *count,
        }
    }

    pub fn scaled(&self, factor: f64) -> Self {
        match self {
            Self::Independent { counts } => Self::Independent {
                counts: counts.scaled(factor),
            },
            Self::Combination { categories, count } => Self::Combination {
                categories: *categories,
                count: (f64::from(*count) * factor + 0.5).floor() as u32,
            },
        }
    }
}

/// Patients generated for one offset spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedBatch {
    pub spec: OffsetSpec,
    pub request: CategoryRequest,
    pub generated_at: DateTime<Utc>,
    pub patients: Vec<SyntheticPatient>,
}

// ═══════════════════════════════════════════
// Evaluation
// ═══════════════════════════════════════════

/// When and how the dashboard looks at the data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationContext {
    /// Minutes between generation and dashboard evaluation.
    pub elapsed_minutes: u32,
    pub anchor: AggregationAnchor,
}

impl EvaluationContext {
    pub fn after(elapsed_minutes: u32) -> Self {
        Self {
            elapsed_minutes,
            ..Self::default()
        }
    }
}

/// Predicted counts for one (recency, period) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectationCell {
    pub recency: DataRecencyFilter,
    pub period: SummarizationPeriod,
    pub counts: CategoryCounts,
}

/// Predicted counts for every (recency, period) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectationMatrix {
    pub cells: Vec<ExpectationCell>,
}

impl ExpectationMatrix {
    pub fn counts(
        &self,
        recency: DataRecencyFilter,
        period: SummarizationPeriod,
    ) -> Option<&CategoryCounts> {
        self.cells
            .iter()
            .find(|cell| cell.recency == recency && cell.period == period)
            .map(|cell| &cell.counts)
    }

    pub fn expected(
        &self,
        category: Category,
        recency: DataRecencyFilter,
        period: SummarizationPeriod,
    ) -> u32 {
        self.counts(recency, period)
            .map(|c| c.get(category))
            .unwrap_or(0)
    }
}

/// Counts read off the dashboard for one (recency, period) pair.
///
/// Only the categories present in `counts` were observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedCounts {
    pub recency: DataRecencyFilter,
    pub period: SummarizationPeriod,
    pub counts: CategoryCounts,
}

/// One category whose observed count differs from the prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Discrepancy {
    pub category: Category,
    pub expected: u32,
    pub actual: u32,
}

/// How to wait for the upstream summary computation before sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlePolicy {
    /// Sleep once, then sample.
    Fixed(Duration),
    /// Ask the probe every `interval` until it reports settled or `timeout` passes.
    Poll { interval: Duration, timeout: Duration },
}

impl Default for SettlePolicy {
    fn default() -> Self {
        Self::Fixed(Duration::from_millis(crate::config::DEFAULT_SUMMARY_WAIT_MS))
    }
}

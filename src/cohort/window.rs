//! Offset and period arithmetic.
//!
//! Decides which recency filters a patient is visible under, which slice of
//! its readings each summarization period aggregates, and the categories that
//! slice lands in.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AggregationAnchor, DataRecencyFilter, SummarizationPeriod, SyntheticPatient};

use super::metrics::{categorize, window_stats, WindowStats};
use super::types::{CategorySet, EvaluationContext};

/// Inclusive at the boundary: an upload exactly `window` minutes old is shown.
pub fn is_visible(staleness_minutes: u64, filter: DataRecencyFilter) -> bool {
    staleness_minutes <= u64::from(filter.window_minutes())
}

pub fn patient_visible(
    patient: &SyntheticPatient,
    filter: DataRecencyFilter,
    ctx: &EvaluationContext,
) -> bool {
    is_visible(patient.staleness_minutes(ctx.elapsed_minutes), filter)
}

/// Recency filters the patient shows up under, narrowest first.
pub fn visible_filters(patient: &SyntheticPatient, ctx: &EvaluationContext) -> Vec<DataRecencyFilter> {
    DataRecencyFilter::ALL
        .iter()
        .copied()
        .filter(|f| patient_visible(patient, *f, ctx))
        .collect()
}

/// End of the aggregation window for this patient.
pub fn window_end(patient: &SyntheticPatient, ctx: &EvaluationContext) -> DateTime<Utc> {
    match ctx.anchor {
        AggregationAnchor::LastUpload => patient.anchor,
        AggregationAnchor::Now => {
            patient.generated_at() + Duration::minutes(i64::from(ctx.elapsed_minutes))
        }
    }
}

/// How the generated sample range sits against an aggregation window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Overlap {
    Contained,
    Partial { covered_fraction: f64 },
    Outside,
}

/// Classify the half-open span `(span_start, span_end]` against
/// `(window_start, window_end]`.
pub fn classify_overlap(
    span: (DateTime<Utc>, DateTime<Utc>),
    window: (DateTime<Utc>, DateTime<Utc>),
) -> Overlap {
    let (span_start, span_end) = span;
    let (window_start, window_end) = window;
    if span_end <= window_start || span_start >= window_end {
        return Overlap::Outside;
    }
    if span_start >= window_start && span_end <= window_end {
        return Overlap::Contained;
    }
    let covered_start = span_start.max(window_start);
    let covered_end = span_end.min(window_end);
    let span_minutes = (span_end - span_start).num_minutes();
    if span_minutes <= 0 {
        return Overlap::Outside;
    }
    let covered = (covered_end - covered_start).num_minutes() as f64 / span_minutes as f64;
    Overlap::Partial {
        covered_fraction: covered,
    }
}

pub fn overlap(
    patient: &SyntheticPatient,
    period: SummarizationPeriod,
    ctx: &EvaluationContext,
) -> Overlap {
    let end = window_end(patient, ctx);
    let start = end - Duration::days(i64::from(period.days()));
    classify_overlap(patient.sample_span(), (start, end))
}

pub fn stats(
    patient: &SyntheticPatient,
    period: SummarizationPeriod,
    ctx: &EvaluationContext,
) -> WindowStats {
    window_stats(&patient.readings, window_end(patient, ctx), period.days())
}

/// Categories the dashboard assigns this patient for `period`.
pub fn membership(
    patient: &SyntheticPatient,
    period: SummarizationPeriod,
    ctx: &EvaluationContext,
) -> CategorySet {
    categorize(&stats(patient, period, ctx))
}

/// Membership keyed by every recency filter the patient is visible under.
/// Filters that hide the patient are absent.
pub fn membership_by_filter(
    patient: &SyntheticPatient,
    period: SummarizationPeriod,
    ctx: &EvaluationContext,
) -> BTreeMap<DataRecencyFilter, CategorySet> {
    let filters = visible_filters(patient, ctx);
    if filters.is_empty() {
        return BTreeMap::new();
    }
    let set = membership(patient, period, ctx);
    filters.into_iter().map(|f| (f, set)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CgmReading, MgDl, OffsetSpec};
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 10, 9, 0, 0).unwrap()
    }

    fn patient(offset_minutes: u32, days: u32) -> SyntheticPatient {
        let anchor = t0() - Duration::minutes(i64::from(offset_minutes));
        let readings = (0..i64::from(days) * 288)
            .rev()
            .map(|k| CgmReading {
                time: anchor - Duration::minutes(5 * k),
                value: MgDl(120),
            })
            .collect();
        SyntheticPatient {
            name: "window test".into(),
            offset: OffsetSpec::new(offset_minutes, days, "window", "clinic", "tag"),
            intended: CategorySet::EMPTY,
            anchor,
            readings,
        }
    }

    #[test]
    fn visibility_boundary_is_inclusive() {
        assert!(is_visible(1440, DataRecencyFilter::Within24Hours));
        assert!(!is_visible(1441, DataRecencyFilter::Within24Hours));
        assert!(is_visible(2880, DataRecencyFilter::Within2Days));
        assert!(is_visible(43200, DataRecencyFilter::Within30Days));
    }

    #[test]
    fn elapsed_time_pushes_patients_out() {
        let p = patient(2880, 14);
        let at_once = EvaluationContext::default();
        let later = EvaluationContext::after(1);
        assert!(patient_visible(&p, DataRecencyFilter::Within2Days, &at_once));
        assert!(!patient_visible(&p, DataRecencyFilter::Within2Days, &later));
        assert!(patient_visible(&p, DataRecencyFilter::Within7Days, &later));
    }

    #[test]
    fn visible_filters_are_monotonic() {
        let p = patient(10080, 14);
        let filters = visible_filters(&p, &EvaluationContext::default());
        assert_eq!(
            filters,
            vec![
                DataRecencyFilter::Within7Days,
                DataRecencyFilter::Within14Days,
                DataRecencyFilter::Within30Days,
            ]
        );
    }

    #[test]
    fn shorter_period_covers_recent_part_only() {
        let p = patient(0, 14);
        let ctx = EvaluationContext::default();
        match overlap(&p, SummarizationPeriod::Last7Days, &ctx) {
            Overlap::Partial { covered_fraction } => {
                assert!((covered_fraction - 0.5).abs() < 1e-9)
            }
            other => panic!("expected partial overlap, got {other:?}"),
        }
        assert_eq!(overlap(&p, SummarizationPeriod::Last14Days, &ctx), Overlap::Contained);
        assert_eq!(overlap(&p, SummarizationPeriod::Last30Days, &ctx), Overlap::Contained);
        let s = stats(&p, SummarizationPeriod::Last7Days, &ctx);
        assert_eq!(s.present, 7 * 288);
    }

    #[test]
    fn now_anchor_moves_the_window_past_stale_data() {
        let p = patient(2 * 1440, 1);
        let ctx = EvaluationContext {
            elapsed_minutes: 0,
            anchor: AggregationAnchor::Now,
        };
        assert_eq!(window_end(&p, &ctx), t0());
        assert_eq!(overlap(&p, SummarizationPeriod::Last24Hours, &ctx), Overlap::Outside);
        assert_eq!(
            membership(&p, SummarizationPeriod::Last24Hours, &ctx),
            CategorySet::single(crate::models::Category::DataIssues)
        );
    }

    #[test]
    fn full_wear_in_range_meets_targets() {
        let p = patient(0, 14);
        let ctx = EvaluationContext::default();
        let set = membership(&p, SummarizationPeriod::Last14Days, &ctx);
        assert_eq!(set, CategorySet::single(crate::models::Category::MeetingTargets));
    }

    #[test]
    fn thirty_day_period_over_fourteen_days_is_low_wear() {
        let p = patient(0, 14);
        let set = membership(&p, SummarizationPeriod::Last30Days, &EvaluationContext::default());
        assert_eq!(set, CategorySet::single(crate::models::Category::CgmWearLow70pct));
    }

    #[test]
    fn membership_by_filter_omits_hidden_filters() {
        let p = patient(20160, 14);
        let map = membership_by_filter(&p, SummarizationPeriod::Last14Days, &EvaluationContext::default());
        assert_eq!(map.len(), 2);
        assert!(map.contains_key(&DataRecencyFilter::Within14Days));
        assert!(map.contains_key(&DataRecencyFilter::Within30Days));
        assert!(!map.contains_key(&DataRecencyFilter::Within7Days));
    }
}

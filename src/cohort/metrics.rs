//! Summary statistics over a summarization window and the category predicates.
//!
//! Everything here is a pure function of the readings, the window end and the
//! window length. Window membership is `(end - days, end]`; the recent half is
//! `(end - days / 2, end]`.

use chrono::{DateTime, Duration, Utc};

use crate::models::{CgmReading, Category, GlucoseBand, READINGS_PER_DAY};

use super::types::CategorySet;

/// Counts for one half of a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HalfStats {
    pub present: u32,
    pub in_range: u32,
}

impl HalfStats {
    pub fn tir_percent(&self) -> Option<f64> {
        (self.present > 0).then(|| f64::from(self.in_range) * 100.0 / f64::from(self.present))
    }
}

/// Band counts for the readings inside one window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowStats {
    pub present: u32,
    /// Slots the window would hold with full sensor wear.
    pub expected: u32,
    /// Readings below 54 mg/dL.
    pub very_low: u32,
    /// Readings below 70 mg/dL, very low included.
    pub below_70: u32,
    pub in_range: u32,
    pub prior: HalfStats,
    pub recent: HalfStats,
}

impl WindowStats {
    pub fn has_data(&self) -> bool {
        self.present > 0
    }

    pub fn tir_percent(&self) -> Option<f64> {
        (self.present > 0).then(|| f64::from(self.in_range) * 100.0 / f64::from(self.present))
    }

    pub fn wear_percent(&self) -> f64 {
        if self.expected == 0 {
            return 0.0;
        }
        f64::from(self.present) * 100.0 / f64::from(self.expected)
    }
}

/// Collect band counts for readings in `(end - days, end]`.
pub fn window_stats(readings: &[CgmReading], end: DateTime<Utc>, days: u32) -> WindowStats {
    let start = end - Duration::days(i64::from(days));
    let midpoint = end - Duration::hours(i64::from(days) * 12);
    let mut stats = WindowStats {
        expected: days.saturating_mul(READINGS_PER_DAY),
        ..WindowStats::default()
    };

    for reading in readings {
        if reading.time <= start || reading.time > end {
            continue;
        }
        let band = reading.band();
        stats.present += 1;
        match band {
            GlucoseBand::VeryLow => {
                stats.very_low += 1;
                stats.below_70 += 1;
            }
            GlucoseBand::Low => stats.below_70 += 1,
            GlucoseBand::InRange => stats.in_range += 1,
            GlucoseBand::High => {}
        }

        let half = if reading.time > midpoint {
            &mut stats.recent
        } else {
            &mut stats.prior
        };
        half.present += 1;
        if band == GlucoseBand::InRange {
            half.in_range += 1;
        }
    }

    stats
}

// ═══════════════════════════════════════════
// Predicate table
// ═══════════════════════════════════════════

/// A threshold category and the rule that places a patient in it.
pub struct Predicate {
    pub category: Category,
    pub rule: &'static str,
    pub holds: fn(&WindowStats) -> bool,
}

fn below_54_over_1pct(s: &WindowStats) -> bool {
    u64::from(s.very_low) * 100 > u64::from(s.present)
}

fn below_70_over_4pct(s: &WindowStats) -> bool {
    u64::from(s.below_70) * 100 > u64::from(s.present) * 4
}

/// Recent-half TIR more than 15 points under prior-half TIR, cross-multiplied.
fn tir_drop_over_15(s: &WindowStats) -> bool {
    let (prior, recent) = (s.prior, s.recent);
    if prior.present == 0 || recent.present == 0 {
        return false;
    }
    let prior_in = i64::from(prior.in_range) * i64::from(recent.present);
    let recent_in = i64::from(recent.in_range) * i64::from(prior.present);
    (prior_in - recent_in) * 100 > 15 * i64::from(prior.present) * i64::from(recent.present)
}

fn tir_under_70(s: &WindowStats) -> bool {
    u64::from(s.in_range) * 100 < u64::from(s.present) * 70
}

fn wear_under_70(s: &WindowStats) -> bool {
    u64::from(s.present) * 100 < u64::from(s.expected) * 70
}

pub static PREDICATES: [Predicate; 5] = [
    Predicate {
        category: Category::BelowRange1pct,
        rule: "readings < 54 mg/dL over 1%",
        holds: below_54_over_1pct,
    },
    Predicate {
        category: Category::BelowRange4pct,
        rule: "readings < 70 mg/dL over 4%",
        holds: below_70_over_4pct,
    },
    Predicate {
        category: Category::TirDrop15pct,
        rule: "recent-half TIR more than 15 points below prior-half TIR",
        holds: tir_drop_over_15,
    },
    Predicate {
        category: Category::TimeInRangeLow70pct,
        rule: "readings in 70..=180 mg/dL under 70%",
        holds: tir_under_70,
    },
    Predicate {
        category: Category::CgmWearLow70pct,
        rule: "readings present under 70% of expected",
        holds: wear_under_70,
    },
];

pub fn predicate_for(category: Category) -> Option<&'static Predicate> {
    PREDICATES.iter().find(|p| p.category == category)
}

/// Categories for one window: `DataIssues` when empty, the firing threshold
/// categories otherwise, or `MeetingTargets` when none fire.
pub fn categorize(stats: &WindowStats) -> CategorySet {
    if !stats.has_data() {
        return CategorySet::single(Category::DataIssues);
    }
    let flagged: CategorySet = PREDICATES
        .iter()
        .filter(|p| (p.holds)(stats))
        .map(|p| p.category)
        .collect();
    if flagged.is_empty() {
        CategorySet::single(Category::MeetingTargets)
    } else {
        flagged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MgDl;
    use chrono::TimeZone;

    fn end() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn stats(present: u32, expected: u32, very_low: u32, below_70: u32, in_range: u32) -> WindowStats {
        WindowStats {
            present,
            expected,
            very_low,
            below_70,
            in_range,
            prior: HalfStats {
                present: present / 2,
                in_range: in_range / 2,
            },
            recent: HalfStats {
                present: present - present / 2,
                in_range: in_range - in_range / 2,
            },
        }
    }

    #[test]
    fn predicate_table_covers_flagged_categories() {
        for category in Category::FLAGGED {
            assert!(predicate_for(category).is_some(), "{category} has no predicate");
        }
        assert!(predicate_for(Category::MeetingTargets).is_none());
        assert!(predicate_for(Category::DataIssues).is_none());
    }

    #[test]
    fn below_54_is_strictly_over_one_percent() {
        assert!(!below_54_over_1pct(&stats(100, 100, 1, 1, 99)));
        assert!(below_54_over_1pct(&stats(100, 100, 2, 2, 98)));
        assert!(below_54_over_1pct(&stats(48, 48, 1, 1, 47)));
    }

    #[test]
    fn below_70_is_strictly_over_four_percent() {
        assert!(!below_70_over_4pct(&stats(100, 100, 0, 4, 96)));
        assert!(below_70_over_4pct(&stats(100, 100, 0, 5, 95)));
        assert!(!below_70_over_4pct(&stats(48, 48, 1, 1, 47)));
        assert!(below_70_over_4pct(&stats(48, 48, 0, 3, 45)));
    }

    #[test]
    fn tir_and_wear_are_strictly_under_seventy() {
        assert!(!tir_under_70(&stats(100, 100, 0, 0, 70)));
        assert!(tir_under_70(&stats(100, 100, 0, 0, 69)));
        assert!(!wear_under_70(&stats(70, 100, 0, 0, 70)));
        assert!(wear_under_70(&stats(32, 48, 0, 0, 32)));
    }

    #[test]
    fn drop_needs_both_halves() {
        let mut s = stats(48, 96, 0, 0, 48);
        s.prior = HalfStats { present: 48, in_range: 48 };
        s.recent = HalfStats::default();
        assert!(!tir_drop_over_15(&s));
    }

    #[test]
    fn drop_threshold() {
        let mut s = stats(96, 96, 0, 0, 83);
        s.prior = HalfStats { present: 48, in_range: 48 };
        s.recent = HalfStats { present: 48, in_range: 35 };
        assert!(tir_drop_over_15(&s));

        // exactly 15 points is not a drop
        s.prior = HalfStats { present: 100, in_range: 90 };
        s.recent = HalfStats { present: 100, in_range: 75 };
        assert!(!tir_drop_over_15(&s));
    }

    #[test]
    fn categorize_empty_window_is_data_issues() {
        let s = window_stats(&[], end(), 14);
        assert_eq!(s.expected, 14 * 288);
        assert_eq!(categorize(&s), CategorySet::single(Category::DataIssues));
    }

    #[test]
    fn categorize_clean_window_meets_targets() {
        let readings: Vec<CgmReading> = (0..288)
            .map(|k| CgmReading {
                time: end() - Duration::minutes(5 * k),
                value: MgDl(120),
            })
            .collect();
        let s = window_stats(&readings, end(), 1);
        assert_eq!(s.present, 288);
        assert_eq!(s.recent.present, 144);
        assert_eq!(s.prior.present, 144);
        assert_eq!(categorize(&s), CategorySet::single(Category::MeetingTargets));
    }

    #[test]
    fn window_is_open_at_start_closed_at_end() {
        let readings = vec![
            CgmReading { time: end() - Duration::days(1), value: MgDl(40) },
            CgmReading { time: end(), value: MgDl(120) },
            CgmReading { time: end() + Duration::minutes(5), value: MgDl(40) },
        ];
        let s = window_stats(&readings, end(), 1);
        assert_eq!(s.present, 1);
        assert_eq!(s.very_low, 0);
    }

    #[test]
    fn categorize_reports_every_firing_predicate() {
        let mut s = stats(32, 48, 1, 4, 20);
        s.prior = HalfStats { present: 16, in_range: 10 };
        s.recent = HalfStats { present: 16, in_range: 10 };
        let set = categorize(&s);
        assert!(set.contains(Category::BelowRange1pct));
        assert!(set.contains(Category::BelowRange4pct));
        assert!(set.contains(Category::TimeInRangeLow70pct));
        assert!(set.contains(Category::CgmWearLow70pct));
        assert!(!set.contains(Category::TirDrop15pct));
        assert!(!set.contains(Category::MeetingTargets));
    }
}

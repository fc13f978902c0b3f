//! End-to-end checks of the built-in scenarios: generate, compute the
//! expectation matrix, and compare with the counts the dashboard shows.

use chrono::{DateTime, TimeZone, Utc};

use super::scenarios::Scenario;
use super::*;
use crate::models::{Category, DataRecencyFilter as R, SummarizationPeriod as P};

fn seeded_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 20, 10, 30, 0).unwrap()
}

fn ledger_for(scenario: Scenario, scale: Option<f64>) -> ScenarioLedger {
    let plan = scenario.plan();
    let plan = match scale {
        Some(factor) => plan.scaled(factor),
        None => plan,
    };
    plan.seed_ledger("clinic-qa", "tag-qa", seeded_at()).unwrap()
}

#[test]
fn cgm_use_24_hours_fixture() {
    let ledger = ledger_for(Scenario::CgmUse24Hours, None);
    let matrix = ledger.expectation_matrix(&EvaluationContext::default());
    let counts = matrix.counts(R::Within24Hours, P::Last24Hours).unwrap();

    assert_eq!(counts.get(Category::TimeInRangeLow70pct), 1);
    assert_eq!(counts.get(Category::CgmWearLow70pct), 3);
    assert_eq!(counts.get(Category::MeetingTargets), 1);
    assert_eq!(counts.get(Category::BelowRange1pct), 1);
    assert_eq!(counts.get(Category::BelowRange4pct), 1);
    assert_eq!(counts.get(Category::TirDrop15pct), 0);
    assert_eq!(counts.get(Category::DataIssues), 0);
}

#[test]
fn cgm_use_24_hours_passes_verification_on_three_sections() {
    let ledger = ledger_for(Scenario::CgmUse24Hours, None);
    let matrix = ledger.expectation_matrix(&EvaluationContext::default());
    let observed = ObservedCounts {
        recency: R::Within24Hours,
        period: P::Last24Hours,
        counts: CategoryCounts::from_pairs(&[
            (Category::TimeInRangeLow70pct, 1),
            (Category::CgmWearLow70pct, 3),
            (Category::MeetingTargets, 1),
        ]),
    };
    let verifier = CategorizationVerifier::new(SettlePolicy::Fixed(std::time::Duration::ZERO));
    verifier.check(&matrix, &observed).unwrap();
}

#[test]
fn multi_offset_below_range_grows_with_recency() {
    let ledger = ledger_for(Scenario::MultiOffset, None);
    let ctx = EvaluationContext::default();
    let below = |recency| {
        ledger
            .expected_counts(recency, P::Last14Days, &ctx)
            .get(Category::BelowRange1pct)
    };
    assert_eq!(below(R::Within24Hours), 50);
    assert_eq!(below(R::Within2Days), 90);
    assert_eq!(below(R::Within7Days), 130);
    assert_eq!(below(R::Within14Days), 170);
    assert_eq!(below(R::Within30Days), 170);
}

#[test]
fn multi_offset_other_sections_come_from_offset_zero() {
    let ledger = ledger_for(Scenario::MultiOffset, None);
    let ctx = EvaluationContext::default();
    for recency in R::ALL {
        let counts = ledger.expected_counts(*recency, P::Last14Days, &ctx);
        for category in [
            Category::BelowRange4pct,
            Category::TirDrop15pct,
            Category::TimeInRangeLow70pct,
            Category::CgmWearLow70pct,
            Category::MeetingTargets,
        ] {
            assert_eq!(counts.get(category), 40, "{category} under {recency}");
        }
    }
}

#[test]
fn multi_offset_two_day_filter_hides_older_offsets() {
    let ledger = ledger_for(Scenario::MultiOffset, None);
    let ctx = EvaluationContext::default();
    let visible: Vec<u32> = ledger
        .batches
        .iter()
        .filter(|b| {
            b.patients
                .iter()
                .all(|p| window::patient_visible(p, R::Within2Days, &ctx))
        })
        .map(|b| b.spec.offset_minutes)
        .collect();
    assert_eq!(visible, vec![0, 2880]);

    let all: usize = ledger
        .patients()
        .filter(|p| window::patient_visible(p, R::Within30Days, &ctx))
        .count();
    assert_eq!(all, ledger.patient_count());
}

#[test]
fn scaled_multi_offset_with_evaluation_delay() {
    let ledger = ledger_for(Scenario::MultiOffset, Some(0.1));
    let ctx = EvaluationContext::after(5);
    let below = |recency| {
        ledger
            .expected_counts(recency, P::Last14Days, &ctx)
            .get(Category::BelowRange1pct)
    };
    assert_eq!(below(R::Within2Days), 5);
    assert_eq!(below(R::Within7Days), 9);
    assert_eq!(below(R::Within14Days), 13);
    assert_eq!(below(R::Within30Days), 17);
}

#[test]
fn all_categories_one_each_across_periods() {
    let ledger = ledger_for(Scenario::AllCategories, None);
    let matrix = ledger.expectation_matrix(&EvaluationContext::default());
    for period in [P::Last7Days, P::Last14Days, P::Last30Days] {
        let counts = matrix.counts(R::Within24Hours, period).unwrap();
        for category in [
            Category::BelowRange1pct,
            Category::BelowRange4pct,
            Category::TimeInRangeLow70pct,
            Category::CgmWearLow70pct,
            Category::MeetingTargets,
        ] {
            assert_eq!(counts.get(category), 1, "{category} under {period}");
        }
        assert_eq!(counts.get(Category::TirDrop15pct), 0);
    }
}

#[test]
fn single_offset_visible_at_24_hour_boundary() {
    let ledger = ledger_for(Scenario::SingleOffset, None);
    let matrix = ledger.expectation_matrix(&EvaluationContext::default());
    let counts = matrix.counts(R::Within24Hours, P::Last14Days).unwrap();
    for category in Category::FLAGGED {
        assert_eq!(counts.get(category), 1, "{category}");
    }
    assert_eq!(counts.get(Category::MeetingTargets), 1);

    let later = ledger.expectation_matrix(&EvaluationContext::after(1));
    assert!(later
        .counts(R::Within24Hours, P::Last14Days)
        .unwrap()
        .is_empty());
}

#[test]
fn period_changes_membership_of_the_same_readings() {
    let ledger = ledger_for(Scenario::SingleOffset, None);
    let ctx = EvaluationContext::default();
    let drop = ledger
        .patients()
        .find(|p| p.intended == CategorySet::single(Category::TirDrop15pct))
        .unwrap();

    assert_eq!(
        window::membership(drop, P::Last14Days, &ctx),
        CategorySet::single(Category::TirDrop15pct)
    );
    assert_eq!(
        window::membership(drop, P::Last7Days, &ctx),
        CategorySet::single(Category::MeetingTargets)
    );
    assert_eq!(
        window::membership(drop, P::Last30Days, &ctx),
        CategorySet::single(Category::CgmWearLow70pct)
    );
}

#[test]
fn regenerating_a_scenario_is_reproducible() {
    let a = ledger_for(Scenario::AllCategories, None);
    let b = ledger_for(Scenario::AllCategories, None);
    assert_eq!(a, b);
}

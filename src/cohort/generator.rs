//! Synthetic patient generator.
//!
//! Patients are built in 4-hour blocks of 48 reading slots, block 0 being the
//! most recent. Every summarization window and half-window anchored at the
//! last upload is a whole number of blocks, so the band fractions a template
//! sets per block hold exactly in any such window.
//!
//! Slot positions and values inside a block are shuffled from a seed derived
//! from the patient name, so the same name always yields the same readings.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

use crate::models::{
    CgmReading, Category, GlucoseBand, MgDl, OffsetSpec, SyntheticPatient, READINGS_PER_DAY,
    READING_INTERVAL_MINUTES,
};

use super::error::CohortError;
use super::metrics::{categorize, window_stats};
use super::types::{CategoryCounts, CategoryRequest, CategorySet, GeneratedBatch};

pub const SLOTS_PER_BLOCK: u32 = 48;
const BLOCKS_PER_DAY: u32 = READINGS_PER_DAY / SLOTS_PER_BLOCK;

/// Present readings per block for a low-wear template (66.7% wear).
const LOW_WEAR_PRESENT: u32 = 32;

// ═══════════════════════════════════════════
// Block template
// ═══════════════════════════════════════════

/// Band counts for one 48-slot block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockComposition {
    pub present: u32,
    pub very_low: u32,
    pub low: u32,
    pub in_range: u32,
    pub high: u32,
}

/// Per-block compositions for the prior and recent halves of a patient's span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    pub prior: BlockComposition,
    pub recent: BlockComposition,
}

impl Template {
    /// Compose the blocks for a patient that must land in exactly `set`.
    /// The meeting-targets shape keeps one high in eight so the trace is not flat.
    pub fn for_set(set: CategorySet) -> Result<Self, CohortError> {
        validate_set(set)?;

        let present = if set.contains(Category::CgmWearLow70pct) {
            LOW_WEAR_PRESENT
        } else {
            SLOTS_PER_BLOCK
        };
        let very_low = u32::from(set.contains(Category::BelowRange1pct));
        let low = if set.contains(Category::BelowRange4pct) { 3 } else { 0 };
        let below = very_low + low;
        let tir_low = set.contains(Category::TimeInRangeLow70pct);

        let (prior_in, recent_in) = if set.contains(Category::TirDrop15pct) {
            if tir_low {
                ((present * 3).div_ceil(4), present / 2)
            } else {
                (present - below, ceil_fraction(present, 71))
            }
        } else {
            let in_range = if tir_low {
                present * 6 / 10
            } else if set == CategorySet::single(Category::MeetingTargets) {
                present - below - present / 8
            } else {
                present - below
            };
            (in_range, in_range)
        };

        let block = |in_range: u32| -> Result<BlockComposition, CohortError> {
            let used = below + in_range;
            if used > present {
                return Err(CohortError::SpecConflict(format!(
                    "combination {set} needs {used} readings in a block of {present}"
                )));
            }
            Ok(BlockComposition {
                present,
                very_low,
                low,
                in_range,
                high: present - used,
            })
        };

        Ok(Self {
            prior: block(prior_in)?,
            recent: block(recent_in)?,
        })
    }

    pub fn data_issues() -> Self {
        let empty = BlockComposition {
            present: 0,
            very_low: 0,
            low: 0,
            in_range: 0,
            high: 0,
        };
        Self {
            prior: empty,
            recent: empty,
        }
    }
}

/// `ceil(n * percent / 100)`.
fn ceil_fraction(n: u32, percent: u32) -> u32 {
    (n * percent).div_ceil(100)
}

fn validate_set(set: CategorySet) -> Result<(), CohortError> {
    if set.is_empty() {
        return Err(CohortError::SpecConflict("empty category combination".into()));
    }
    if set.contains(Category::DataIssues) && set.len() > 1 {
        return Err(CohortError::SpecConflict(format!(
            "data_issues means no readings and cannot be combined: {set}"
        )));
    }
    if set.contains(Category::MeetingTargets) && set.len() > 1 {
        return Err(CohortError::SpecConflict(format!(
            "meeting_targets excludes every flagged category: {set}"
        )));
    }
    Ok(())
}

// ═══════════════════════════════════════════
// Generation
// ═══════════════════════════════════════════

/// Categories a patient generated for one independent request must land in.
///
/// On a single-day period the below-range templates run on a partial sensor
/// day, so they also land in `CgmWearLow70pct`.
pub fn intended_set(category: Category, period_length_days: u32) -> CategorySet {
    let mut set = CategorySet::single(category);
    let below_range = matches!(category, Category::BelowRange1pct | Category::BelowRange4pct);
    if below_range && period_length_days <= 1 {
        set.insert(Category::CgmWearLow70pct);
    }
    set
}

/// A requested category whose template also lands in a category the same
/// request pins to an explicit 0 cannot be generated as asked.
fn check_forced_overlap(counts: &CategoryCounts, period_length_days: u32) -> Result<(), CohortError> {
    for (category, _) in counts.nonzero() {
        let forced = intended_set(category, period_length_days);
        for other in forced.iter().filter(|c| *c != category) {
            if counts.contains(other) && counts.get(other) == 0 {
                return Err(CohortError::SpecConflict(format!(
                    "{category} over {period_length_days} day(s) also lands in {other}, \
                     which the request sets to 0"
                )));
            }
        }
    }
    Ok(())
}

/// Seed derived from the first 8 bytes of SHA-256 over the patient name.
pub fn seed_for(name: &str) -> u64 {
    let digest = Sha256::digest(name.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

fn draw_value(rng: &mut StdRng, band: GlucoseBand) -> MgDl {
    let (lo, hi) = band.synthetic_range();
    MgDl(rng.gen_range(lo..=hi))
}

/// Build readings for `template` over `days` days ending at `anchor`.
fn build_readings(
    template: &Template,
    days: u32,
    anchor: DateTime<Utc>,
    rng: &mut StdRng,
) -> Vec<CgmReading> {
    let blocks = days * BLOCKS_PER_DAY;
    let recent_blocks = days * BLOCKS_PER_DAY / 2;
    let mut readings = Vec::with_capacity((blocks * template.prior.present) as usize);
    let mut slots: Vec<u32> = (0..SLOTS_PER_BLOCK).collect();

    for block in 0..blocks {
        let composition = if block < recent_blocks {
            template.recent
        } else {
            template.prior
        };
        if composition.present == 0 {
            continue;
        }

        let mut bands = Vec::with_capacity(composition.present as usize);
        bands.extend(std::iter::repeat(GlucoseBand::VeryLow).take(composition.very_low as usize));
        bands.extend(std::iter::repeat(GlucoseBand::Low).take(composition.low as usize));
        bands.extend(std::iter::repeat(GlucoseBand::InRange).take(composition.in_range as usize));
        bands.extend(std::iter::repeat(GlucoseBand::High).take(composition.high as usize));
        bands.shuffle(rng);
        slots.shuffle(rng);

        for (slot, band) in slots.iter().zip(bands) {
            let k = block * SLOTS_PER_BLOCK + slot;
            readings.push(CgmReading {
                time: anchor - Duration::minutes(READING_INTERVAL_MINUTES * i64::from(k)),
                value: draw_value(rng, band),
            });
        }
    }

    readings.sort_by_key(|r| r.time);
    readings
}

/// Generate one patient landing in exactly `set` at its own period.
pub fn compose_patient(
    name: &str,
    set: CategorySet,
    spec: &OffsetSpec,
    generated_at: DateTime<Utc>,
) -> Result<SyntheticPatient, CohortError> {
    let template = if set == CategorySet::single(Category::DataIssues) {
        Template::data_issues()
    } else {
        Template::for_set(set)?
    };
    let anchor = generated_at - Duration::minutes(i64::from(spec.offset_minutes));
    let mut rng = StdRng::seed_from_u64(seed_for(name));
    let readings = build_readings(&template, spec.period_length_days, anchor, &mut rng);

    let evaluated = categorize(&window_stats(&readings, anchor, spec.period_length_days));
    if evaluated != set {
        return Err(CohortError::SpecConflict(format!(
            "patient '{name}' evaluates to {evaluated} over {} days instead of {set}",
            spec.period_length_days
        )));
    }

    Ok(SyntheticPatient {
        name: name.to_string(),
        offset: spec.clone(),
        intended: set,
        anchor,
        readings,
    })
}

/// Generate every patient a request asks for.
pub fn generate_batch(
    spec: &OffsetSpec,
    request: &CategoryRequest,
    generated_at: DateTime<Utc>,
) -> Result<GeneratedBatch, CohortError> {
    spec.validate()?;

    let prefix = spec.patient_name_prefix.trim();
    let mut patients = Vec::with_capacity(request.total_patients() as usize);

    match request {
        CategoryRequest::Independent { counts } => {
            check_forced_overlap(counts, spec.period_length_days)?;
            for (category, count) in counts.nonzero() {
                let set = intended_set(category, spec.period_length_days);
                for n in 1..=count {
                    let name = format!("{prefix} {} {n}", category.as_str());
                    patients.push(compose_patient(&name, set, spec, generated_at)?);
                }
            }
        }
        CategoryRequest::Combination { categories, count } => {
            validate_set(*categories)?;
            for n in 1..=*count {
                let name = format!("{prefix} combo {n}");
                patients.push(compose_patient(&name, *categories, spec, generated_at)?);
            }
        }
    }

    tracing::info!(
        offset_minutes = spec.offset_minutes,
        period_days = spec.period_length_days,
        tag = %spec.tag_id,
        patients = patients.len(),
        "Generated synthetic patient batch"
    );

    Ok(GeneratedBatch {
        spec: spec.clone(),
        request: request.clone(),
        generated_at,
        patients,
    })
}

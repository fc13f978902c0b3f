use std::sync::LazyLock;

use regex::Regex;

use crate::cohort::CohortError;

/// Lowercases and strips whitespace so `CGM Wear Time <70%` and
/// `CGM Wear Time < 70%` compare equal.
pub fn normalize_label(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Macro to generate enum with as_str + std::str::FromStr pattern.
///
/// Each variant has a canonical id followed by optional `| "alias"` labels.
/// Parsing is whitespace- and case-insensitive; serde goes through the id.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal $(| $alias:literal)*),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::cohort::CohortError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                use $crate::models::enums::normalize_label;
                let wanted = normalize_label(s);
                $(
                    if wanted == normalize_label($s) $(|| wanted == normalize_label($alias))* {
                        return Ok(Self::$variant);
                    }
                )+
                Err($crate::cohort::CohortError::UnknownLabel {
                    field: stringify!($name).into(),
                    value: s.into(),
                })
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = <String as serde::Deserialize>::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

pub(crate) use str_enum;

str_enum!(Category {
    BelowRange1pct => "below_range_1pct"
        | "Time below 3.0 mmol/L > 1%" | "Time below 54 mg/dL > 1%",
    BelowRange4pct => "below_range_4pct"
        | "Time below 3.9 mmol/L > 4%" | "Time below 70 mg/dL > 4%",
    TirDrop15pct => "tir_drop_15pct" | "Drop in Time in Range > 15%",
    TimeInRangeLow70pct => "time_in_range_low_70pct" | "Time in Range < 70%",
    CgmWearLow70pct => "cgm_wear_low_70pct" | "CGM Wear Time < 70%",
    MeetingTargets => "meeting_targets" | "Meeting Targets",
    DataIssues => "data_issues" | "Data Issues",
});

impl Category {
    /// The five threshold categories; `MeetingTargets` is their complement.
    pub const FLAGGED: [Category; 5] = [
        Category::BelowRange1pct,
        Category::BelowRange4pct,
        Category::TirDrop15pct,
        Category::TimeInRangeLow70pct,
        Category::CgmWearLow70pct,
    ];

    /// Label the patient-creation collaborator keys its counts by (mmol/L wording).
    pub fn creation_label(&self) -> &'static str {
        match self {
            Self::BelowRange1pct => "Time below 3.0 mmol/L > 1%",
            Self::BelowRange4pct => "Time below 3.9 mmol/L > 4%",
            Self::TirDrop15pct => "Drop in Time in Range > 15%",
            Self::TimeInRangeLow70pct => "Time in Range < 70%",
            Self::CgmWearLow70pct => "CGM Wear Time <70%",
            Self::MeetingTargets => "Meeting Targets",
            Self::DataIssues => "Data Issues",
        }
    }

    /// Section title rendered by the dashboard (mg/dL wording).
    pub fn dashboard_title(&self) -> &'static str {
        match self {
            Self::BelowRange1pct => "Time below 54 mg/dL > 1%",
            Self::BelowRange4pct => "Time below 70 mg/dL > 4%",
            Self::TirDrop15pct => "Drop in Time in Range > 15%",
            Self::TimeInRangeLow70pct => "Time in Range < 70%",
            Self::CgmWearLow70pct => "CGM Wear Time < 70%",
            Self::MeetingTargets => "Meeting Targets",
            Self::DataIssues => "Data Issues",
        }
    }

    pub fn is_flagged(&self) -> bool {
        Self::FLAGGED.contains(self)
    }

    pub(crate) fn bit(&self) -> u8 {
        1 << (*self as u8)
    }
}

str_enum!(DataRecencyFilter {
    Within24Hours => "24h" | "24 hours" | "Within 24 hours",
    Within2Days => "2d" | "2 days" | "Within 2 days",
    Within7Days => "7d" | "7 days" | "Within 7 days",
    Within14Days => "14d" | "14 days" | "Within 14 days",
    Within30Days => "30d" | "30 days" | "Within 30 days",
});

impl DataRecencyFilter {
    /// Upload-age window; a patient is shown when staleness is at most this.
    pub fn window_minutes(&self) -> u32 {
        match self {
            Self::Within24Hours => 24 * 60,
            Self::Within2Days => 2 * 24 * 60,
            Self::Within7Days => 7 * 24 * 60,
            Self::Within14Days => 14 * 24 * 60,
            Self::Within30Days => 30 * 24 * 60,
        }
    }

    pub fn display_label(&self) -> &'static str {
        match self {
            Self::Within24Hours => "24 hours",
            Self::Within2Days => "2 days",
            Self::Within7Days => "7 days",
            Self::Within14Days => "14 days",
            Self::Within30Days => "30 days",
        }
    }
}

str_enum!(SummarizationPeriod {
    Last24Hours => "24h" | "24 hours" | "1 day",
    Last7Days => "7d" | "7 days",
    Last14Days => "14d" | "14 days",
    Last30Days => "30d" | "30 days",
});

static SUMMARY_BANNER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Summarizing\s*(.+?)\s+of data").expect("static summary banner pattern")
});

impl SummarizationPeriod {
    pub fn days(&self) -> u32 {
        match self {
            Self::Last24Hours => 1,
            Self::Last7Days => 7,
            Self::Last14Days => 14,
            Self::Last30Days => 30,
        }
    }

    pub fn display_label(&self) -> &'static str {
        match self {
            Self::Last24Hours => "24 hours",
            Self::Last7Days => "7 days",
            Self::Last14Days => "14 days",
            Self::Last30Days => "30 days",
        }
    }

    /// Period whose length matches a generation period, if any.
    pub fn from_days(days: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.days() == days)
    }

    /// Reads the period out of the dashboard header, e.g.
    /// `Summarizing24 hours of data` or `Summarizing 14 days of data`.
    pub fn from_summary_banner(text: &str) -> Result<Self, CohortError> {
        let captured = SUMMARY_BANNER
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim())
            .ok_or_else(|| CohortError::UnknownLabel {
                field: "SummarizationPeriod".into(),
                value: text.into(),
            })?;
        captured.parse()
    }
}

str_enum!(AggregationAnchor {
    LastUpload => "last_upload" | "last upload",
    Now => "now",
});

impl Default for AggregationAnchor {
    fn default() -> Self {
        Self::LastUpload
    }
}

//! 🏷️ Label tables — narrow codes in, human sentences out.
//!
//! The store keeps most enum fields as `"0"`, `"1"`, `"2"`. Humans searching for
//! courses would prefer words. These tables are the dictionary. Small, fixed,
//! and tested for completeness, because an unmapped code is a bug, not a vibe.

/// 🎓 Honours award provision — a boolean that wanted to be a sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HonoursAward {
    NotAvailable,
    Available,
}

impl HonoursAward {
    pub(crate) fn from_flag(flag: bool) -> Self {
        if flag {
            HonoursAward::Available
        } else {
            HonoursAward::NotAvailable
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            HonoursAward::NotAvailable => "Not available",
            HonoursAward::Available => "Available",
        }
    }
}

/// 🔢 The availability tristate shared by foundation year, sandwich year and year abroad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Availability {
    NotAvailable,
    Optional,
    Compulsory,
}

impl Availability {
    pub(crate) fn from_code(code: &str) -> Option<Self> {
        match code {
            "0" => Some(Availability::NotAvailable),
            "1" => Some(Availability::Optional),
            "2" => Some(Availability::Compulsory),
            _ => None,
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            Availability::NotAvailable => "Not available",
            Availability::Optional => "Optional",
            Availability::Compulsory => "Compulsory",
        }
    }
}

/// 📡 Distance learning — three ways to not be in the lecture hall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DistanceLearning {
    NotAvailable,
    OnlyDistance,
    OptionallyDistance,
}

impl DistanceLearning {
    pub(crate) fn from_code(code: &str) -> Option<Self> {
        match code {
            "0" => Some(DistanceLearning::NotAvailable),
            "1" => Some(DistanceLearning::OnlyDistance),
            "2" => Some(DistanceLearning::OptionallyDistance),
            _ => None,
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            DistanceLearning::NotAvailable => {
                "Course is available other than by distance learning"
            }
            DistanceLearning::OnlyDistance => "Course is only available through distance learning",
            DistanceLearning::OptionallyDistance => {
                "Course is optionally available through distance learning"
            }
        }
    }
}

/// ⏱️ Mode of study.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StudyMode {
    FullTime,
    PartTime,
    Both,
}

impl StudyMode {
    pub(crate) fn from_code(code: &str) -> Option<Self> {
        match code {
            "1" => Some(StudyMode::FullTime),
            "2" => Some(StudyMode::PartTime),
            "3" => Some(StudyMode::Both),
            _ => None,
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            StudyMode::FullTime => "Full-time",
            StudyMode::PartTime => "Part-time",
            StudyMode::Both => "Both",
        }
    }
}

/// 🏥 Whether any students on the course are NHS funded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NhsFunded {
    None,
    Any,
}

impl NhsFunded {
    pub(crate) fn from_code(code: &str) -> Option<Self> {
        match code {
            "0" => Some(NhsFunded::None),
            "1" => Some(NhsFunded::Any),
            _ => None,
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            NhsFunded::None => "None",
            NhsFunded::Any => "Any",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// 🧪 every code in a table maps to a distinct, non-empty label
    fn assert_complete(codes: &[&str], label_of: impl Fn(&str) -> Option<&'static str>) {
        let mut the_labels = HashSet::new();
        for code in codes {
            let the_label = label_of(code)
                .unwrap_or_else(|| panic!("💀 code {code:?} fell through the lookup table"));
            assert!(!the_label.is_empty(), "💀 code {code:?} mapped to an empty label");
            the_labels.insert(the_label);
        }
        assert_eq!(the_labels.len(), codes.len(), "💀 two codes share a label");
    }

    #[test]
    fn the_one_where_distance_learning_has_exactly_three_faces() {
        assert_complete(&["0", "1", "2"], |c| DistanceLearning::from_code(c).map(DistanceLearning::label));
        assert_eq!(DistanceLearning::from_code("3"), None);
    }

    #[test]
    fn the_one_where_the_tristate_covers_zero_one_two() {
        assert_complete(&["0", "1", "2"], |c| Availability::from_code(c).map(Availability::label));
        assert_eq!(Availability::from_code("2"), Some(Availability::Compulsory));
        assert_eq!(Availability::from_code(""), None);
    }

    #[test]
    fn the_one_where_modes_and_nhs_are_accounted_for() {
        assert_complete(&["1", "2", "3"], |c| StudyMode::from_code(c).map(StudyMode::label));
        assert_complete(&["0", "1"], |c| NhsFunded::from_code(c).map(NhsFunded::label));
        assert_eq!(StudyMode::from_code("0"), None);
    }

    #[test]
    fn the_one_where_honours_is_binary_and_proud() {
        assert_eq!(HonoursAward::from_flag(true).label(), "Available");
        assert_eq!(HonoursAward::from_flag(false).label(), "Not available");
    }
}

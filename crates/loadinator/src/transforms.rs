//! 🔄 Transforms — the course record goes in, the search document comes out 🎭🚀
//!
//! 🎬 COLD OPEN — INT. SIMULTANEOUS TRANSLATION BOOTH — 2:47 AM
//!
//! Stored course on the left screen. Search document on the right. In between:
//! field renames, code-to-label lookups, a name normaliser with opinions about
//! the word "university", and a strict policy on empty nested objects.
//!
//! ```text
//!   SourceRecord ──▶ CourseTransform::transform ──▶ (IndexDocument, id)
//!                                                        │
//!                                                        ▼
//!                                          BulkRequest::push (create + body)
//! ```
//!
//! ## Knowledge Graph 🧠
//! - Depends on: `common::SourceRecord` (input), `labels` (code tables)
//! - Used by: `supervisors::workers::bulk_worker` (one call per record)
//! - Pure: no I/O, no clocks, no hidden state. Same record, same output. Always.
//!
//! ⚠️ A record that can't produce an identifier yields `None`. The worker logs
//! and skips it. Everything else missing is zero-valued, never fatal. 🦆

use serde::Serialize;
use tracing::warn;

use crate::common::{CodeLabel, SourceRecord};

pub(crate) mod bulk;
pub(crate) mod labels;

pub(crate) use bulk::BulkRequest;
use labels::{Availability, DistanceLearning, HonoursAward, NhsFunded, StudyMode};

/// 📦 The wire-ready search document. Wrapped in `doc` because the mapping says so.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub(crate) struct IndexDocument {
    pub doc: CourseDocument,
}

/// 🎓 The course as the search index sees it — flat-ish, labelled, sortable.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub(crate) struct CourseDocument {
    pub kis_course_id: String,
    pub english_title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub welsh_title: String,
    pub country: String,
    pub country_code: String,
    pub distance_learning: String,
    pub distance_learning_code: String,
    pub foundation_year: String,
    pub honours_award: String,
    /// 🔤 Normalised name, for sorting and grouping. The original lives in `institution`.
    pub institution_name: String,
    pub institution: InstitutionDocument,
    pub length_of_course: String,
    pub link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationDocument>,
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nhs_funded: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualification: Option<QualificationDocument>,
    pub sandwich_year: String,
    pub subject_code: String,
    pub subject_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ucas_code: String,
    pub year_abroad: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub(crate) struct InstitutionDocument {
    pub public_ukprn: String,
    pub public_ukprn_name: String,
    pub ukprn: String,
    /// Original casing, commas stripped.
    pub ukprn_name: String,
    /// Lowercased, commas stripped.
    pub lc_ukprn_name: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub(crate) struct LocationDocument {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub english_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub welsh_name: String,
    pub latitude: String,
    pub longitude: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub(crate) struct QualificationDocument {
    pub code: String,
    pub label: String,
    pub level: String,
    pub name: String,
}

/// 🔤 Lowercase, drop commas, peel off any leading "the university of " / "university of ".
///
/// Peels repeatedly so the output never starts with either prefix, which keeps
/// `normalize(normalize(s)) == normalize(s)`.
pub(crate) fn normalize_institution_name(name: &str) -> String {
    const PREFIXES: [&str; 2] = ["the university of ", "university of "];

    let lowered = name.to_lowercase().replace(',', "");
    let mut rest = lowered.as_str();
    while let Some(stripped) = PREFIXES.iter().find_map(|prefix| rest.strip_prefix(prefix)) {
        rest = stripped;
    }
    rest.to_string()
}

/// 🎯 The Document Transformer. Zero-sized, stateless, monomorphized, unbothered.
pub(crate) struct CourseTransform;

impl CourseTransform {
    /// 🔄 Turn one stored course into `(document, identifier)`.
    ///
    /// `None` when the identifier can't be derived (no institution, no mode,
    /// no KIS course id). Everything else degrades to empty strings.
    pub(crate) fn transform(record: &SourceRecord) -> Option<(IndexDocument, String)> {
        let identifier = record.identifier()?;
        let institution = record.institution.clone().unwrap_or_default();
        let kis_course_id = record.kis_course_id.as_str();

        let (distance_learning, distance_learning_code) = match &record.distance_learning {
            Some(dl) => (
                label_or_derive(dl, "distance_learning", kis_course_id, |c| {
                    DistanceLearning::from_code(c).map(DistanceLearning::label)
                }),
                dl.code.clone(),
            ),
            None => (String::new(), String::new()),
        };

        // -- 🔢 foundation year is stored as a bare code, always derived
        let foundation_year = if record.foundation_year.is_empty() {
            Availability::NotAvailable.label().to_string()
        } else {
            match Availability::from_code(&record.foundation_year) {
                Some(availability) => availability.label().to_string(),
                None => {
                    warn!(
                        kis_course_id,
                        field = "foundation_year",
                        code = %record.foundation_year,
                        "⚠️ unknown availability code, leaving label empty"
                    );
                    String::new()
                }
            }
        };

        let availability = |field: &'static str, value: &Option<CodeLabel>| {
            value
                .as_ref()
                .map(|cl| {
                    label_or_derive(cl, field, kis_course_id, |c| {
                        Availability::from_code(c).map(Availability::label)
                    })
                })
                .unwrap_or_default()
        };

        let mode = record
            .mode
            .as_ref()
            .map(|m| {
                label_or_derive(m, "mode", kis_course_id, |c| {
                    StudyMode::from_code(c).map(StudyMode::label)
                })
            })
            .unwrap_or_default();

        // 🏥 present and non-empty, or not at all
        let nhs_funded = record
            .nhs_funded
            .as_ref()
            .filter(|nhs| !nhs.code.is_empty() || !nhs.label.is_empty())
            .map(|nhs| {
                label_or_derive(nhs, "nhs_funded", kis_course_id, |c| {
                    NhsFunded::from_code(c).map(NhsFunded::label)
                })
            })
            .filter(|label| !label.is_empty());

        // 📍 a location with nothing in it is not a location
        let location = record.location.as_ref().and_then(|loc| {
            let name = loc.name.clone().unwrap_or_default();
            let the_location = LocationDocument {
                english_name: name.english,
                welsh_name: name.welsh,
                latitude: loc.latitude.clone(),
                longitude: loc.longitude.clone(),
            };
            (the_location != LocationDocument::default()).then_some(the_location)
        });

        let qualification = record.qualification.as_ref().map(|q| QualificationDocument {
            code: q.code.clone(),
            label: q.label.clone(),
            level: q.level.clone(),
            name: q.name.clone(),
        });

        let country = record.country.clone().unwrap_or_default();
        let title = record.title.clone().unwrap_or_default();
        let subject = record.subject.clone().unwrap_or_default();

        let course = CourseDocument {
            kis_course_id: record.kis_course_id.clone(),
            english_title: title.english,
            welsh_title: title.welsh,
            country: country.name,
            country_code: country.code,
            distance_learning,
            distance_learning_code,
            foundation_year,
            honours_award: HonoursAward::from_flag(record.honours).label().to_string(),
            institution_name: normalize_institution_name(&institution.ukprn_name),
            institution: InstitutionDocument {
                lc_ukprn_name: institution.ukprn_name.to_lowercase().replace(',', ""),
                ukprn_name: institution.ukprn_name.replace(',', ""),
                public_ukprn: institution.public_ukprn,
                public_ukprn_name: institution.public_ukprn_name,
                ukprn: institution.ukprn,
            },
            length_of_course: record.length.as_ref().map(|l| l.code.clone()).unwrap_or_default(),
            link: record.links.as_ref().map(|l| l.self_link.clone()).unwrap_or_default(),
            location,
            mode,
            nhs_funded,
            qualification,
            sandwich_year: availability("sandwich_year", &record.sandwich_year),
            subject_code: subject.code,
            subject_name: subject.name,
            ucas_code: record.ucas_code.clone(),
            year_abroad: availability("year_abroad", &record.year_abroad),
        };

        Some((IndexDocument { doc: course }, identifier))
    }
}

/// 🏷️ Stored label wins. Empty label → derive from the code. Unknown code → warn, empty.
fn label_or_derive(
    value: &CodeLabel,
    field: &'static str,
    kis_course_id: &str,
    lookup: impl Fn(&str) -> Option<&'static str>,
) -> String {
    if !value.label.is_empty() {
        return value.label.clone();
    }
    if value.code.is_empty() {
        return String::new();
    }
    match lookup(&value.code) {
        Some(label) => label.to_string(),
        None => {
            warn!(
                kis_course_id,
                field,
                code = %value.code,
                "⚠️ unknown code, leaving label empty"
            );
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::fixtures::a_course;
    use crate::common::{CodeLabel, Language, Location};

    #[test]
    fn the_one_where_the_university_of_gets_politely_removed() {
        let the_forms = [
            "University of Leeds",
            "The University of Leeds",
            "THE UNIVERSITY OF LEEDS",
            "leeds",
            "Leeds",
        ];
        for form in the_forms {
            assert_eq!(normalize_institution_name(form), "leeds", "form: {form}");
        }
        assert_eq!(
            normalize_institution_name("University of Wales, Trinity Saint David"),
            "wales trinity saint david"
        );
    }

    #[test]
    fn the_one_where_normalizing_twice_changes_nothing() {
        let the_suspects = [
            "University of University of Nowhere",
            "the university of the university of x",
            "Imperial College London",
            ",,,University of, Bath",
            "",
        ];
        for suspect in the_suspects {
            let once = normalize_institution_name(suspect);
            assert_eq!(normalize_institution_name(&once), once, "suspect: {suspect}");
        }
    }

    #[test]
    fn the_one_where_a_full_course_becomes_a_full_document() {
        let the_course = a_course("10007795", "H200", "1");
        let (the_document, the_id) =
            CourseTransform::transform(&the_course).expect("💀 a complete course must transform");

        assert_eq!(the_id, "10007795H2001");
        let doc = &the_document.doc;
        assert_eq!(doc.honours_award, "Available");
        assert_eq!(doc.foundation_year, "Optional");
        assert_eq!(doc.sandwich_year, "Compulsory");
        assert_eq!(doc.year_abroad, "Not available");
        assert_eq!(doc.mode, "Full-time");
        assert_eq!(
            doc.distance_learning,
            "Course is available other than by distance learning"
        );
        assert_eq!(doc.distance_learning_code, "0");
        assert_eq!(doc.institution_name, "leeds main campus");
        assert_eq!(doc.institution.ukprn_name, "The University of Leeds Main Campus");
        assert_eq!(doc.institution.lc_ukprn_name, "the university of leeds main campus");
        assert_eq!(doc.link, "/courses/H200");
        assert_eq!(doc.length_of_course, "3");
        assert_eq!(
            doc.location.as_ref().map(|l| l.english_name.as_str()),
            Some("Main Site")
        );
    }

    #[test]
    fn the_one_where_foundation_code_two_really_means_compulsory() {
        let mut the_course = a_course("10007795", "H200", "1");
        the_course.foundation_year = "2".to_string();
        let (the_document, _) = CourseTransform::transform(&the_course).expect("💀 transform");
        assert_eq!(the_document.doc.foundation_year, "Compulsory");
    }

    #[test]
    fn the_one_where_stored_labels_beat_derived_ones() {
        let mut the_course = a_course("10007795", "H200", "1");
        the_course.mode = Some(CodeLabel {
            code: "1".to_string(),
            label: "Full time (stored)".to_string(),
        });
        let (the_document, the_id) = CourseTransform::transform(&the_course).expect("💀 transform");
        assert_eq!(the_document.doc.mode, "Full time (stored)");
        assert_eq!(the_id, "10007795H2001");
    }

    #[test]
    fn the_one_where_absent_sub_objects_leave_no_empty_husks() -> anyhow::Result<()> {
        let mut the_course = a_course("10007795", "H200", "1");
        the_course.location = Some(Location::default());
        the_course.nhs_funded = Some(CodeLabel::default());
        the_course.qualification = None;
        the_course.title = Some(Language {
            english: "Civil Engineering".to_string(),
            welsh: String::new(),
        });

        let (the_document, _) = CourseTransform::transform(&the_course).expect("💀 transform");
        let the_json = serde_json::to_value(&the_document)?;
        let doc = &the_json["doc"];

        assert!(doc.get("location").is_none(), "empty location must vanish");
        assert!(doc.get("nhs_funded").is_none(), "empty nhs flag must vanish");
        assert!(doc.get("qualification").is_none(), "absent qualification must vanish");
        assert!(doc.get("welsh_title").is_none(), "empty welsh title must vanish");
        assert_eq!(doc["english_title"], "Civil Engineering");
        Ok(())
    }

    #[test]
    fn the_one_where_a_location_without_a_name_keeps_only_coordinates() -> anyhow::Result<()> {
        let mut the_course = a_course("10007795", "H200", "1");
        the_course.location = Some(Location {
            latitude: "51.5".to_string(),
            longitude: "-0.1".to_string(),
            name: None,
        });
        let (the_document, _) = CourseTransform::transform(&the_course).expect("💀 transform");
        let the_json = serde_json::to_value(&the_document)?;
        let the_location = &the_json["doc"]["location"];

        assert_eq!(the_location["latitude"], "51.5");
        assert!(the_location.get("english_name").is_none());
        assert!(the_location.get("welsh_name").is_none());
        Ok(())
    }

    #[test]
    fn the_one_where_nhs_funding_is_labelled_when_present() {
        let mut the_course = a_course("10007795", "B700", "2");
        the_course.nhs_funded = Some(CodeLabel {
            code: "1".to_string(),
            label: String::new(),
        });
        let (the_document, _) = CourseTransform::transform(&the_course).expect("💀 transform");
        assert_eq!(the_document.doc.nhs_funded.as_deref(), Some("Any"));
        assert_eq!(the_document.doc.mode, "Part-time");
    }

    #[test]
    fn the_one_where_unknown_codes_are_survivable() {
        let mut the_course = a_course("10007795", "H200", "9");
        the_course.sandwich_year = Some(CodeLabel {
            code: "7".to_string(),
            label: String::new(),
        });
        let (the_document, the_id) = CourseTransform::transform(&the_course).expect("💀 transform");
        assert_eq!(the_document.doc.mode, "");
        assert_eq!(the_document.doc.sandwich_year, "");
        assert_eq!(the_id, "10007795H2009");
    }

    #[test]
    fn the_one_where_transform_is_a_pure_function() {
        let the_course = a_course("10007795", "H200", "1");
        let first = CourseTransform::transform(&the_course);
        let second = CourseTransform::transform(&the_course);
        assert_eq!(first, second);
    }

    #[test]
    fn the_one_where_an_institutionless_course_transforms_to_nothing() {
        let mut the_course = a_course("10007795", "H200", "1");
        the_course.institution = None;
        assert!(CourseTransform::transform(&the_course).is_none());
    }
}

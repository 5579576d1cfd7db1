//! 📦 Common data structures — the course record as it sits in the store.
//!
//! 🎬 COLD OPEN — INT. DATA CENTER — 3:47 AM
//!
//! Thirty thousand courses, exported one JSON object per line. Each one knows
//! its institution, its mode, its title in two languages, and absolutely nothing
//! about the search cluster it is about to be hurled into. Relatable.
//!
//! These structs are owned by the record source and read, never written, by the
//! rest of the pipeline. Every field defaults when absent — a course with no
//! sandwich year is still a course. Probably. 🦆

use serde::Deserialize;

/// 📄 A page — an ordered slice of records pulled in one cursor advance.
/// Owned by whichever worker claims it, gone the moment it's transformed.
pub(crate) type Page = Vec<SourceRecord>;

/// 🏷️ The `{code, label}` pair the store uses for every narrow enum field.
///
/// The label may be empty in older dumps; the transformer derives it from the
/// code when that happens.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CodeLabel {
    pub code: String,
    pub label: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Country {
    pub code: String,
    pub name: String,
}

/// 🌍 English and Welsh strings. Either may be missing. Both may be missing.
/// Bilingual data: twice the fields, twice the empty strings.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Language {
    pub english: String,
    pub welsh: String,
}

/// 🏛️ The institution block. `public_ukprn` is the one that ends up in the id.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InstitutionObject {
    pub public_ukprn_name: String,
    pub public_ukprn: String,
    pub ukprn_name: String,
    pub ukprn: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LinkList {
    #[serde(rename = "self")]
    pub self_link: String,
    pub institution: String,
}

/// 📍 Teaching location. `name` only exists when the location lookup found one.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Location {
    pub latitude: String,
    pub longitude: String,
    pub name: Option<Language>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Qualification {
    pub code: String,
    pub label: String,
    pub level: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Subject {
    pub code: String,
    pub name: String,
}

/// 🎓 One course, exactly as the course builder stored it.
///
/// Field names follow the stored document keys, so a `mongoexport` line
/// deserializes straight into this. Unknown keys (`_id`, `statistics`, the
/// other link flavours) are ignored without complaint.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SourceRecord {
    pub country: Option<Country>,
    pub distance_learning: Option<CodeLabel>,
    /// 🔢 Tristate code: "0" not available, "1" optional, "2" compulsory.
    #[serde(rename = "foundation_year_availability")]
    pub foundation_year: String,
    #[serde(rename = "honours_award_provision")]
    pub honours: bool,
    pub institution: Option<InstitutionObject>,
    pub kis_course_id: String,
    #[serde(rename = "length_of_course")]
    pub length: Option<CodeLabel>,
    pub links: Option<LinkList>,
    pub location: Option<Location>,
    pub mode: Option<CodeLabel>,
    pub nhs_funded: Option<CodeLabel>,
    pub qualification: Option<Qualification>,
    pub sandwich_year: Option<CodeLabel>,
    pub subject: Option<Subject>,
    pub title: Option<Language>,
    #[serde(rename = "ucas_code_id")]
    pub ucas_code: String,
    pub year_abroad: Option<CodeLabel>,
}

impl SourceRecord {
    /// 🔑 public UKPRN + KIS course id + mode code, glued together with no separator.
    ///
    /// ⚠️ No escaping, no delimiter: ("1", "23", "1") and ("12", "3", "1") collide.
    /// The source data has fixed-width UKPRNs so it doesn't happen in practice.
    ///
    /// Returns `None` when any of the three parts has nowhere to come from.
    pub(crate) fn identifier(&self) -> Option<String> {
        let institution = self.institution.as_ref()?;
        let mode = self.mode.as_ref()?;
        if self.kis_course_id.is_empty() {
            return None;
        }
        Some(format!(
            "{}{}{}",
            institution.public_ukprn, self.kis_course_id, mode.code
        ))
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// 🧪 A course with every field filled in. The overachiever of test data.
    pub(crate) fn a_course(public_ukprn: &str, kis_course_id: &str, mode_code: &str) -> SourceRecord {
        SourceRecord {
            country: Some(Country {
                code: "XF".to_string(),
                name: "England".to_string(),
            }),
            distance_learning: Some(CodeLabel {
                code: "0".to_string(),
                label: String::new(),
            }),
            foundation_year: "1".to_string(),
            honours: true,
            institution: Some(InstitutionObject {
                public_ukprn_name: "The University of Leeds".to_string(),
                public_ukprn: public_ukprn.to_string(),
                ukprn_name: "The University of Leeds, Main Campus".to_string(),
                ukprn: public_ukprn.to_string(),
            }),
            kis_course_id: kis_course_id.to_string(),
            length: Some(CodeLabel {
                code: "3".to_string(),
                label: "3 stages".to_string(),
            }),
            links: Some(LinkList {
                self_link: format!("/courses/{kis_course_id}"),
                institution: format!("/institutions/{public_ukprn}"),
            }),
            location: Some(Location {
                latitude: "53.8067".to_string(),
                longitude: "-1.5550".to_string(),
                name: Some(Language {
                    english: "Main Site".to_string(),
                    welsh: String::new(),
                }),
            }),
            mode: Some(CodeLabel {
                code: mode_code.to_string(),
                label: String::new(),
            }),
            nhs_funded: None,
            qualification: Some(Qualification {
                code: "021".to_string(),
                label: "BSc (Hons)".to_string(),
                level: "F".to_string(),
                name: "Bachelor of Science with Honours".to_string(),
            }),
            sandwich_year: Some(CodeLabel {
                code: "2".to_string(),
                label: String::new(),
            }),
            subject: Some(Subject {
                code: "CAH10-01-01".to_string(),
                name: "Civil engineering".to_string(),
            }),
            title: Some(Language {
                english: "Civil Engineering".to_string(),
                welsh: String::new(),
            }),
            ucas_code: "H200".to_string(),
            year_abroad: Some(CodeLabel {
                code: "0".to_string(),
                label: "Not available".to_string(),
            }),
        }
    }
}

//! 📡 Bulk request building — formatting documents for the `_bulk` API's peculiar tastes 🚀
//!
//! Rule 1: Two lines per document. Action metadata, then document source. Always.
//! Rule 2: Newline-delimited. Not comma-separated. Not XML. NEWLINES.
//! Rule 3: The trailing newline on the whole body matters. It MATTERS.
//!
//! ## Knowledge Graph 🧠
//! - Action is always `create`, never `index`: a duplicate id must come back as a
//!   409 conflict we can log, not a silent overwrite we never hear about.
//! - Action line is serialized with serde, so ids with quotes in them stay valid JSON.
//! - `_type` is emitted only when configured (typeless clusters reject it).

use anyhow::{Context, Result};
use serde::Serialize;

use super::IndexDocument;

#[derive(Debug, Serialize)]
struct BulkAction<'a> {
    create: BulkActionMeta<'a>,
}

#[derive(Debug, Serialize)]
struct BulkActionMeta<'a> {
    #[serde(rename = "_index")]
    index: &'a str,
    #[serde(rename = "_type", skip_serializing_if = "Option::is_none")]
    doc_type: Option<&'a str>,
    #[serde(rename = "_id")]
    id: &'a str,
}

/// 📦 One bulk request in the making. Lives inside a worker, dies with it.
#[derive(Debug)]
pub(crate) struct BulkRequest {
    index: String,
    doc_type: Option<String>,
    body: String,
    len: usize,
}

impl BulkRequest {
    pub(crate) fn new(index: impl Into<String>, doc_type: Option<String>) -> Self {
        Self {
            index: index.into(),
            doc_type,
            body: String::new(),
            len: 0,
        }
    }

    /// ➕ Append the sacred pair: create header, then body.
    pub(crate) fn push(&mut self, id: &str, document: &IndexDocument) -> Result<()> {
        let action = BulkAction {
            create: BulkActionMeta {
                index: &self.index,
                doc_type: self.doc_type.as_deref(),
                id,
            },
        };
        let action_line = serde_json::to_string(&action)
            .context("💀 Failed to serialize the bulk create header. The JSON that describes JSON has failed to become JSON.")?;
        let document_line = serde_json::to_string(document).with_context(|| {
            format!("💀 Failed to serialize course '{id}' for the bulk body")
        })?;

        self.body.push_str(&action_line);
        self.body.push('\n');
        self.body.push_str(&document_line);
        self.body.push('\n');
        self.len += 1;
        Ok(())
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 🚀 Hand over the NDJSON payload. Trailing newline included, no extra charge.
    pub(crate) fn into_payload(self) -> String {
        self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::fixtures::a_course;
    use crate::transforms::CourseTransform;

    fn a_document(id_suffix: &str) -> (IndexDocument, String) {
        CourseTransform::transform(&a_course("10007795", id_suffix, "1")).expect("💀 transform")
    }

    #[test]
    fn the_one_where_two_courses_become_four_lines() -> Result<()> {
        let mut the_request = BulkRequest::new("courses", Some("course".to_string()));
        for suffix in ["H200", "H201"] {
            let (doc, id) = a_document(suffix);
            the_request.push(&id, &doc)?;
        }
        assert_eq!(the_request.len(), 2);

        let the_payload = the_request.into_payload();
        assert!(the_payload.ends_with('\n'), "the trailing newline MATTERS");
        let the_lines: Vec<&str> = the_payload.lines().collect();
        assert_eq!(the_lines.len(), 4);

        let the_action: serde_json::Value = serde_json::from_str(the_lines[0])?;
        assert_eq!(
            the_action,
            serde_json::json!({"create": {"_index": "courses", "_type": "course", "_id": "10007795H2001"}})
        );
        let the_body: serde_json::Value = serde_json::from_str(the_lines[1])?;
        assert_eq!(the_body["doc"]["kis_course_id"], "H200");

        let the_second_action: serde_json::Value = serde_json::from_str(the_lines[2])?;
        assert_eq!(the_second_action["create"]["_id"], "10007795H2011");
        Ok(())
    }

    #[test]
    fn the_one_where_typeless_clusters_get_no_type() -> Result<()> {
        let mut the_request = BulkRequest::new("courses", None);
        let (doc, id) = a_document("H200");
        the_request.push(&id, &doc)?;
        let the_payload = the_request.into_payload();
        let the_action: serde_json::Value =
            serde_json::from_str(the_payload.lines().next().unwrap_or_default())?;
        assert!(the_action["create"].get("_type").is_none());
        assert!(the_action.get("index").is_none(), "create, never index");
        Ok(())
    }

    #[test]
    fn the_one_where_a_quote_in_the_id_does_not_break_the_json() -> Result<()> {
        let mut the_request = BulkRequest::new("courses", None);
        let (doc, _) = a_document("H200");
        the_request.push(r#"10007795"H2001"#, &doc)?;
        let the_payload = the_request.into_payload();
        let the_action: serde_json::Value =
            serde_json::from_str(the_payload.lines().next().unwrap_or_default())?;
        assert_eq!(the_action["create"]["_id"], r#"10007795"H2001"#);
        Ok(())
    }

    #[test]
    fn the_one_where_an_empty_request_is_honest_about_it() {
        let the_request = BulkRequest::new("courses", None);
        assert!(the_request.is_empty());
        assert_eq!(the_request.into_payload(), "");
    }
}

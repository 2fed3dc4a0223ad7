//! Machine-readable metadata blocks embedded in host issues.
//!
//! A plan record is an issue labeled `erk-plan` whose body carries exactly
//! one `plan-header` block (YAML inside a collapsed disclosure) and whose
//! first comment carries exactly one `plan-body` block wrapping the
//! user-visible plan markdown:
//!
//! ```text
//! <!-- erk:metadata-block:plan-header -->
//! <details><summary><code>plan-header</code></summary>
//!
//! ```yaml
//! schema_version: "2"
//! ...
//! ```
//!
//! </details>
//! <!-- /erk:metadata-block:plan-header -->
//! ```
//!
//! Auxiliary comments may carry further blocks with distinct ids.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ErkError;

/// Label marking an issue as a plan record.
pub const PLAN_LABEL: &str = "erk-plan";

/// Label color used when erk has to create the label.
pub const PLAN_LABEL_COLOR: &str = "5319E7";

pub const PLAN_LABEL_DESCRIPTION: &str = "Implementation plan managed by erk";

pub const HEADER_BLOCK: &str = "plan-header";
pub const BODY_BLOCK: &str = "plan-body";

/// Current `plan-header` schema version.
pub const SCHEMA_VERSION: &str = "2";

/// Typed contents of the `plan-header` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanHeader {
    pub schema_version: String,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub worktree_name: String,
    pub last_dispatched_run_id: Option<String>,
    pub last_dispatched_at: Option<DateTime<Utc>>,
}

impl PlanHeader {
    pub fn new(
        created_at: DateTime<Utc>,
        created_by: impl Into<String>,
        worktree_name: impl Into<String>,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            created_at,
            created_by: created_by.into(),
            worktree_name: worktree_name.into(),
            last_dispatched_run_id: None,
            last_dispatched_at: None,
        }
    }
}

fn open_marker(id: &str) -> String {
    format!("<!-- erk:metadata-block:{id} -->")
}

fn close_marker(id: &str) -> String {
    format!("<!-- /erk:metadata-block:{id} -->")
}

/// Wrap a payload in the block markers and disclosure.
fn render_block(id: &str, payload: &str) -> String {
    format!(
        "{}\n<details><summary><code>{id}</code></summary>\n\n{payload}\n\n</details>\n{}",
        open_marker(id),
        close_marker(id)
    )
}

/// Extract every payload for `id` from `text`, in order.
fn extract_blocks(text: &str, id: &str) -> Vec<String> {
    let open = open_marker(id);
    let close = close_marker(id);
    let mut payloads = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find(&open) {
        let after_open = &rest[start + open.len()..];
        let Some(end) = after_open.find(&close) else {
            break;
        };
        let inner = &after_open[..end];
        if let Some(payload) = strip_disclosure(inner) {
            payloads.push(payload.to_string());
        }
        rest = &after_open[end + close.len()..];
    }

    payloads
}

/// Strip the `<details>` wrapper, returning the payload byte-for-byte.
fn strip_disclosure(inner: &str) -> Option<&str> {
    let after_summary = inner.split_once("</summary>\n\n")?.1;
    let payload = after_summary.rsplit_once("\n\n</details>")?.0;
    Some(payload)
}

// ============================================================================
// plan-header
// ============================================================================

/// Render the header as a complete `plan-header` block.
pub fn render_header_block(header: &PlanHeader) -> Result<String, ErkError> {
    let yaml = serde_yaml::to_string(header).map_err(|e| ErkError::Internal {
        identifier: format!("header-yaml: {e}"),
    })?;
    Ok(render_block(
        HEADER_BLOCK,
        &format!("```yaml\n{}```", yaml),
    ))
}

/// Parse the `plan-header` block out of an issue body.
///
/// Exactly one block must be present.
pub fn parse_header_block(issue_body: &str) -> Result<PlanHeader, ErkError> {
    let blocks = extract_blocks(issue_body, HEADER_BLOCK);
    match blocks.len() {
        0 => Err(ErkError::MetadataBlock {
            block: HEADER_BLOCK.to_string(),
            details: "no plan-header block in the issue body".to_string(),
        }),
        1 => {
            let payload = &blocks[0];
            let yaml = payload
                .strip_prefix("```yaml\n")
                .and_then(|p| p.strip_suffix("```"))
                .ok_or_else(|| ErkError::MetadataBlock {
                    block: HEADER_BLOCK.to_string(),
                    details: "plan-header payload is not a yaml fence".to_string(),
                })?;
            serde_yaml::from_str(yaml).map_err(|e| ErkError::MetadataBlock {
                block: HEADER_BLOCK.to_string(),
                details: e.to_string(),
            })
        }
        n => Err(ErkError::MetadataBlock {
            block: HEADER_BLOCK.to_string(),
            details: format!("expected exactly one plan-header block, found {n}"),
        }),
    }
}

// ============================================================================
// plan-body
// ============================================================================

/// Render plan markdown as a complete `plan-body` block.
pub fn render_body_block(markdown: &str) -> String {
    render_block(BODY_BLOCK, markdown)
}

/// Extract the plan markdown from a comment, if it carries a `plan-body`
/// block. The payload round-trips byte-for-byte through
/// [`render_body_block`].
pub fn extract_body_block(comment: &str) -> Option<String> {
    extract_blocks(comment, BODY_BLOCK).into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn header() -> PlanHeader {
        PlanHeader::new(
            Utc.with_ymd_and_hms(2025, 11, 26, 14, 30, 0).unwrap(),
            "alice",
            "refactor-parser",
        )
    }

    #[test]
    fn header_block_roundtrips() {
        let block = render_header_block(&header()).unwrap();
        assert!(block.starts_with("<!-- erk:metadata-block:plan-header -->"));
        assert!(block.ends_with("<!-- /erk:metadata-block:plan-header -->"));
        assert!(block.contains("<details><summary><code>plan-header</code></summary>"));
        assert!(block.contains("schema_version"));

        let parsed = parse_header_block(&block).unwrap();
        assert_eq!(parsed, header());
    }

    #[test]
    fn header_parses_inside_larger_body() {
        let block = render_header_block(&header()).unwrap();
        let body = format!("Some intro text.\n\n{block}\n\nTrailing notes.");
        let parsed = parse_header_block(&body).unwrap();
        assert_eq!(parsed.worktree_name, "refactor-parser");
        assert_eq!(parsed.schema_version, "2");
        assert_eq!(parsed.last_dispatched_run_id, None);
    }

    #[test]
    fn missing_header_is_an_error() {
        let err = parse_header_block("no blocks here").unwrap_err();
        assert!(matches!(err, ErkError::MetadataBlock { .. }));
    }

    #[test]
    fn duplicate_header_is_an_error() {
        let block = render_header_block(&header()).unwrap();
        let body = format!("{block}\n\n{block}");
        let err = parse_header_block(&body).unwrap_err();
        assert!(err.summary().contains("plan-header"));
    }

    #[test]
    fn body_block_roundtrips_byte_for_byte() {
        let markdown = "# Refactor parser\n\n- [ ] Split lexer\n- [ ] Add tests\n\n```rust\nfn main() {}\n```";
        let block = render_body_block(markdown);
        let extracted = extract_body_block(&block).unwrap();
        assert_eq!(extracted, markdown);
    }

    #[test]
    fn body_block_ignores_other_ids() {
        let block = render_block("planning-context", "not a plan body");
        assert_eq!(extract_body_block(&block), None);
    }

    #[test]
    fn dispatched_fields_roundtrip_when_set() {
        let mut h = header();
        h.last_dispatched_run_id = Some("123456".to_string());
        h.last_dispatched_at = Some(Utc.with_ymd_and_hms(2025, 11, 27, 9, 0, 0).unwrap());
        let block = render_header_block(&h).unwrap();
        let parsed = parse_header_block(&block).unwrap();
        assert_eq!(parsed, h);
    }
}

//! Static dashboard
//!
//! One page per loop under `site/loops/` plus an index of the newest loops.

use crate::error::Result;
use crate::id::LoopId;
use crate::storage::{LoopEntry, LoopOutcome, Workspace, write_atomic};

pub const INDEX_LOOPS: usize = 50;

const STYLE: &str = "body{font-family:sans-serif;max-width:60em;margin:2em auto;padding:0 1em}\
pre{background:#f4f4f4;padding:1em;overflow-x:auto;white-space:pre-wrap}\
.failed{color:#b00}.completed{color:#070}";

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Content of one loop page; every field is raw text
#[derive(Debug, Clone, Default)]
pub struct LoopPage {
    pub loop_id: LoopId,
    pub ordinal: u64,
    pub spec_md: String,
    pub diff: String,
    pub review_summary: String,
    pub report_md: String,
    pub reflection_md: String,
}

fn section(title: &str, body: &str) -> String {
    format!("<h2>{}</h2>\n<pre>{}</pre>\n", title, escape_html(body))
}

pub fn render_loop_page(page: &LoopPage) -> String {
    let mut html = format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>Loop {id}</title><style>{style}</style></head>\n<body>\n\
         <p><a href=\"/\">&larr; All loops</a></p>\n<h1>Loop {id} (#{ordinal})</h1>\n",
        id = page.loop_id,
        ordinal = page.ordinal,
        style = STYLE
    );
    html.push_str(&section("Plan", &page.spec_md));
    html.push_str(&section("Plan vs Approved", &page.diff));
    html.push_str(&section("Review", &page.review_summary));
    html.push_str(&section("Report", &page.report_md));
    html.push_str(&section("Reflection", &page.reflection_md));
    html.push_str("</body></html>\n");
    html
}

/// Counters shown at the top of the index
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexHeader {
    pub ordinal: u64,
    pub escalation_runs: u64,
    pub cadence: u64,
}

fn outcome_label(outcome: &LoopOutcome) -> (&'static str, String) {
    match outcome {
        LoopOutcome::Running => ("running", "running".to_string()),
        LoopOutcome::Completed => ("completed", "completed".to_string()),
        LoopOutcome::Failed { stage, .. } => ("failed", format!("failed: {}", stage)),
        LoopOutcome::Interrupted => ("failed", "interrupted".to_string()),
    }
}

/// Index page listing `loops`, newest first
pub fn render_index(header: IndexHeader, loops: &[LoopEntry]) -> String {
    let mut html = format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>Kaizen</title><style>{}</style></head>\n<body>\n\
         <h1>Kaizen</h1>\n<p>Loop Counter: {} | System Agent Runs: {}/{}</p>\n<ul>\n",
        STYLE, header.ordinal, header.escalation_runs, header.cadence
    );
    for entry in loops.iter().take(INDEX_LOOPS) {
        let (class, label) = outcome_label(&entry.outcome);
        html.push_str(&format!(
            "<li><a href=\"/loops/{id}.html\">Loop {id}</a> #{ordinal} <span class=\"{class}\">{label}</span></li>\n",
            id = escape_html(&entry.id),
            ordinal = entry.ordinal,
            class = class,
            label = escape_html(&label)
        ));
    }
    html.push_str("</ul>\n</body></html>\n");
    html
}

/// Write the loop page and regenerate the index
pub fn publish(workspace: &Workspace, page: &LoopPage, header: IndexHeader, loops: &[LoopEntry]) -> Result<()> {
    write_atomic(&workspace.site_page(page.loop_id), render_loop_page(page).as_bytes())?;
    write_atomic(&workspace.site_index(), render_index(header, loops).as_bytes())?;
    log::debug!("Loop {}: dashboard updated", page.loop_id);
    Ok(())
}

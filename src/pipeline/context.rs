//! Prompt assembly for the planner and the reflector

use crate::text::truncate_with_ellipsis;

/// Mission used when no mission file exists
pub const DEFAULT_MISSION: &str = "Your primary mission is to maintain and improve the public dashboard at /site. Keep it simple, fast, and informative.";

pub const MEMORY_SNIPPETS: usize = 3;
pub const MEMORY_SNIPPET_CHARS: usize = 200;
pub const RECENT_REFLECTIONS: usize = 2;
pub const RECENT_REPORTS: usize = 5;

/// Everything the planner is told about the world
#[derive(Debug, Clone, Default)]
pub struct PlanningContext {
    pub mission: String,
    pub ordinal: u64,
    pub memories: Vec<String>,
    /// Newest first
    pub reflections: Vec<String>,
    /// Report filenames, newest first
    pub reports: Vec<String>,
    pub failure_summary: String,
}

fn or_none(s: String) -> String {
    if s.trim().is_empty() { "None".to_string() } else { s }
}

impl PlanningContext {
    /// Mission text, falling back to the built-in default
    pub fn mission_or_default(mission: Option<String>) -> String {
        mission.unwrap_or_else(|| DEFAULT_MISSION.to_string())
    }

    pub fn render(&self) -> String {
        let memories = self
            .memories
            .iter()
            .take(MEMORY_SNIPPETS)
            .map(|m| format!("- {}", truncate_with_ellipsis(m, MEMORY_SNIPPET_CHARS)))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "Current Mission: {}\n\
             Loop Number: {}\n\
             ---\n\
             Relevant long-term memories:\n{}\n\
             ---\n\
             Recent reflections (learnings from past loops):\n{}\n\
             ---\n\
             Recent reports (actions taken):\n{}\n\
             ---\n\
             Known failure patterns to avoid:\n{}",
            self.mission,
            self.ordinal,
            or_none(memories),
            or_none(self.reflections.join("\n---\n")),
            or_none(self.reports.join("\n")),
            self.failure_summary
        )
    }
}

/// Prompt asking the reflector for the three fixed sections
pub fn reflect_prompt(spec_md: &str, summary_md: &str, report_md: &str) -> String {
    format!(
        "Plan Summary:\n{}\n\n\
         Reviewer Summary:\n{}\n\n\
         Execution Report:\n{}\n\n\
         Provide a reflection with these EXACT sections (30 words max each):\n\
         1. KEY LESSON: The single most important thing learned\n\
         2. AVOID: What failed or should not be repeated\n\
         3. NEXT ACTION: One specific thing to try next loop\n",
        spec_md, summary_md, report_md
    )
}

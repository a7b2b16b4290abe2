//! Artifact naming
//!
//! Every durable per-loop file is named `{loopId}_{kind}.{ext}`. Retention
//! recovers the loop id from the filename, so parsing must accept any
//! `{digits}_{anything}` name, including kinds this build does not write.

use crate::id::LoopId;
use std::fmt;

/// Kinds of artifact written by the pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Plan,
    Review,
    Diff,
    Gate,
    Report,
    Reflection,
    Error,
}

impl ArtifactKind {
    pub fn tag(&self) -> &'static str {
        match self {
            ArtifactKind::Plan => "plan",
            ArtifactKind::Review => "review",
            ArtifactKind::Diff => "diff",
            ArtifactKind::Gate => "gate",
            ArtifactKind::Report => "report",
            ArtifactKind::Reflection => "reflection",
            ArtifactKind::Error => "error",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Plan | ArtifactKind::Review | ArtifactKind::Gate => "json",
            ArtifactKind::Diff => "txt",
            ArtifactKind::Report | ArtifactKind::Reflection => "md",
            ArtifactKind::Error => "log",
        }
    }

    /// Filename for this kind of artifact of the given loop
    pub fn file_name(&self, loop_id: LoopId) -> String {
        format!("{}_{}.{}", loop_id, self.tag(), self.extension())
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// A parsed artifact filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactName {
    pub loop_id: LoopId,
    /// Kind tag as it appears in the filename, without the extension
    pub tag: String,
}

impl ArtifactName {
    /// Parse `{loopId}_{tag}[.ext]`; None for anything else
    pub fn parse(file_name: &str) -> Option<Self> {
        let (id_part, rest) = file_name.split_once('_')?;
        if id_part.is_empty() || !id_part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let loop_id = id_part.parse().ok()?;
        let tag = rest.split('.').next().unwrap_or(rest);
        if tag.is_empty() {
            return None;
        }
        Some(Self {
            loop_id,
            tag: tag.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_names() {
        let id = LoopId(1738300800123);
        assert_eq!(ArtifactKind::Plan.file_name(id), "1738300800123_plan.json");
        assert_eq!(ArtifactKind::Diff.file_name(id), "1738300800123_diff.txt");
        assert_eq!(ArtifactKind::Report.file_name(id), "1738300800123_report.md");
        assert_eq!(ArtifactKind::Error.file_name(id), "1738300800123_error.log");
        assert_eq!(ArtifactKind::Reflection.file_name(id), "1738300800123_reflection.md");
    }

    #[test]
    fn test_parse_artifact_name() {
        let parsed = ArtifactName::parse("1738300800123_report.md").unwrap();
        assert_eq!(parsed.loop_id, LoopId(1738300800123));
        assert_eq!(parsed.tag, "report");

        let unknown_kind = ArtifactName::parse("42_screenshot.png").unwrap();
        assert_eq!(unknown_kind.tag, "screenshot");
    }

    #[test]
    fn test_parse_rejects_foreign_files() {
        assert!(ArtifactName::parse("README.md").is_none());
        assert!(ArtifactName::parse("abc_plan.json").is_none());
        assert!(ArtifactName::parse("_plan.json").is_none());
        assert!(ArtifactName::parse("123_").is_none());
        assert!(ArtifactName::parse(".gitkeep").is_none());
    }
}

//! Mission strategist
//!
//! Turns recent reflections and reports into the next mission. Missions
//! that drift into abstraction are replaced with the core anchor.

use crate::text::truncate_chars;

pub const CORE_MISSION: &str = "Maintain a simple, fast, informative dashboard at /site";

pub const STRATEGY_REFLECTIONS: usize = 10;
pub const STRATEGY_REPORTS: usize = 20;
pub const MAX_MISSION_WORDS: usize = 50;
const MAX_ABSTRACT_WORDS: usize = 2;

const RECURSIVE_PHRASES: [&str; 7] = [
    "optimize optimization",
    "improve improvement",
    "analyze analysis",
    "document documentation",
    "understand understanding",
    "process process",
    "system system",
];

const ABSTRACT_WORDS: [&str; 6] = ["optimize", "enhance", "improve", "analyze", "understand", "investigate"];

/// Why a proposed mission was turned down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionRejection {
    Empty,
    Recursive,
    TooAbstract,
    TooLong,
}

/// Mission used when the strategist's proposal is rejected
pub fn fallback_mission() -> String {
    format!("{}. Focus on stability and performance.", CORE_MISSION)
}

/// Check a proposed mission and return it trimmed
pub fn validate_mission(mission: &str) -> Result<String, MissionRejection> {
    let trimmed = mission.trim();
    if trimmed.is_empty() {
        return Err(MissionRejection::Empty);
    }

    let lower = trimmed.to_lowercase();
    if RECURSIVE_PHRASES.iter().any(|phrase| lower.contains(phrase)) {
        return Err(MissionRejection::Recursive);
    }

    let abstract_count = ABSTRACT_WORDS.iter().filter(|word| lower.contains(*word)).count();
    if abstract_count > MAX_ABSTRACT_WORDS {
        return Err(MissionRejection::TooAbstract);
    }

    if trimmed.split_whitespace().count() > MAX_MISSION_WORDS {
        return Err(MissionRejection::TooLong);
    }

    Ok(trimmed.to_string())
}

/// Validated mission, or the fallback when the proposal is rejected
pub fn accept_or_fallback(mission: &str) -> String {
    match validate_mission(mission) {
        Ok(mission) => mission,
        Err(reason) => {
            log::warn!(
                "Rejected mission ({:?}): {}",
                reason,
                truncate_chars(mission.trim(), 120)
            );
            fallback_mission()
        }
    }
}

/// Prompt for the strategist collaborator
pub fn strategist_prompt(reflections: &[String], reports: &[String]) -> String {
    format!(
        "Recent Reflections (last {}):\n{}\n\n\
         Recent Reports (last {} files):\n{}\n\n\
         Based on all of this, define the next primary mission.\n\
         IMPORTANT: Keep it simple and concrete. Avoid recursive or self-referential goals.\n\
         The core mission is always: {}",
        STRATEGY_REFLECTIONS,
        reflections.join("\n---\n"),
        STRATEGY_REPORTS,
        reports.join("\n"),
        CORE_MISSION
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concrete_mission_accepted() {
        assert_eq!(
            validate_mission("  Add a loop history chart to /site  ").unwrap(),
            "Add a loop history chart to /site"
        );
    }

    #[test]
    fn test_rejections() {
        assert_eq!(validate_mission("   "), Err(MissionRejection::Empty));
        assert_eq!(
            validate_mission("Improve improvement of the loop"),
            Err(MissionRejection::Recursive)
        );
        assert_eq!(
            validate_mission("Analyze, optimize and enhance the dashboard"),
            Err(MissionRejection::TooAbstract)
        );
        assert_eq!(validate_mission(&"word ".repeat(51)), Err(MissionRejection::TooLong));
    }

    #[test]
    fn test_two_abstract_words_allowed() {
        assert!(validate_mission("Optimize images and improve caching headers").is_ok());
    }

    #[test]
    fn test_fallback() {
        assert_eq!(accept_or_fallback(""), fallback_mission());
        assert!(fallback_mission().starts_with(CORE_MISSION));
    }

    #[test]
    fn test_prompt_mentions_core_mission() {
        let prompt = strategist_prompt(&["r1".into(), "r2".into()], &["1_report.md".into()]);
        assert!(prompt.contains("r1\n---\nr2"));
        assert!(prompt.contains("1_report.md"));
        assert!(prompt.ends_with(CORE_MISSION));
    }
}

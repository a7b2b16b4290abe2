use std::fmt;

/// Stages of one loop iteration, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Start,
    Plan,
    Review,
    Diff,
    RiskGate,
    Execute,
    Report,
    Reflect,
    Memorize,
    SiteUpdate,
    Retain,
    End,
}

impl Stage {
    pub const ALL: [Stage; 12] = [
        Stage::Start,
        Stage::Plan,
        Stage::Review,
        Stage::Diff,
        Stage::RiskGate,
        Stage::Execute,
        Stage::Report,
        Stage::Reflect,
        Stage::Memorize,
        Stage::SiteUpdate,
        Stage::Retain,
        Stage::End,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Start => "start",
            Stage::Plan => "plan",
            Stage::Review => "review",
            Stage::Diff => "diff",
            Stage::RiskGate => "risk_gate",
            Stage::Execute => "execute",
            Stage::Report => "report",
            Stage::Reflect => "reflect",
            Stage::Memorize => "memorize",
            Stage::SiteUpdate => "site_update",
            Stage::Retain => "retain",
            Stage::End => "end",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_is_in_order() {
        let mut sorted = Stage::ALL;
        sorted.sort();
        assert_eq!(sorted, Stage::ALL);
        assert_eq!(Stage::ALL.first(), Some(&Stage::Start));
        assert_eq!(Stage::ALL.last(), Some(&Stage::End));
    }

    #[test]
    fn test_names() {
        assert_eq!(Stage::RiskGate.to_string(), "risk_gate");
        assert_eq!(Stage::SiteUpdate.name(), "site_update");
    }
}

use super::{Tag, TestCase};

/// Which discovered cases to run.
///
/// A case is selected when its name contains any of `patterns` (or there are none), it
/// carries any of `include_tags` (or there are none), and it carries none of `exclude_tags`.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub patterns: Vec<String>,
    pub include_tags: Vec<Tag>,
    pub exclude_tags: Vec<Tag>,
}

impl Selection {
    pub fn matches(&self, case: &TestCase) -> bool {
        let name_ok =
            self.patterns.is_empty() || self.patterns.iter().any(|p| case.name().contains(p.as_str()));
        let include_ok =
            self.include_tags.is_empty() || self.include_tags.iter().any(|t| case.has_tag(*t));
        let exclude_ok = !self.exclude_tags.iter().any(|t| case.has_tag(*t));
        name_ok && include_ok && exclude_ok
    }

    /// Keep matching cases in discovery order.
    pub fn apply(&self, cases: Vec<TestCase>) -> Vec<TestCase> {
        cases.into_iter().filter(|c| self.matches(c)).collect()
    }
}

//! Scenario selection and ordering

use std::collections::BTreeSet;

use crate::spec::Scenario;

/// Selects scenarios by tag intersection, tag exclusion and name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScenarioFilter {
    /// Every tag here must be present on a scenario
    pub require: BTreeSet<String>,
    /// No tag here may be present on a scenario
    pub exclude: BTreeSet<String>,
    /// When non-empty, only these scenario names are selected
    pub names: BTreeSet<String>,
}

impl ScenarioFilter {
    /// A filter that selects everything
    pub fn all() -> Self {
        Self::default()
    }

    /// Parse an expression such as `smoke & critical & !slow`.
    ///
    /// Terms are separated by `&`, `,` or whitespace; a leading `!` excludes.
    pub fn parse(expr: &str) -> Self {
        let mut filter = Self::default();
        for term in expr
            .split(|c: char| c == '&' || c == ',' || c.is_whitespace())
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            match term.strip_prefix('!') {
                Some(tag) if !tag.is_empty() => {
                    filter.exclude.insert(tag.to_string());
                }
                Some(_) => {}
                None => {
                    filter.require.insert(term.to_string());
                }
            }
        }
        filter
    }

    pub fn require_tag(mut self, tag: impl Into<String>) -> Self {
        self.require.insert(tag.into());
        self
    }

    pub fn exclude_tag(mut self, tag: impl Into<String>) -> Self {
        self.exclude.insert(tag.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.names.insert(name.into());
        self
    }

    pub fn matches(&self, scenario: &Scenario) -> bool {
        (self.names.is_empty() || self.names.contains(&scenario.name))
            && self.require.iter().all(|t| scenario.tags.contains(t))
            && !self.exclude.iter().any(|t| scenario.tags.contains(t))
    }

    /// Matching scenarios in execution order: ascending priority, ties in
    /// declaration order
    pub fn select<'a>(&self, scenarios: &'a [Scenario]) -> Vec<&'a Scenario> {
        let mut selected: Vec<&Scenario> = scenarios.iter().filter(|s| self.matches(s)).collect();
        selected.sort_by_key(|s| s.priority);
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(name: &str, priority: i32, tags: &[&str]) -> Scenario {
        Scenario {
            name: name.to_string(),
            description: String::new(),
            target: "saucedemo".to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            priority,
            steps: Vec::new(),
            origin: None,
        }
    }

    fn names(selected: Vec<&Scenario>) -> Vec<&str> {
        selected.into_iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn test_tag_intersection() {
        let scenarios = vec![
            scenario("valid-login", 1, &["smoke", "critical"]),
            scenario("invalid-login", 2, &["smoke", "security"]),
            scenario("checkout", 6, &["functional", "critical"]),
        ];
        let filter = ScenarioFilter::parse("smoke & critical");
        assert_eq!(names(filter.select(&scenarios)), vec!["valid-login"]);

        let filter = ScenarioFilter::all().require_tag("critical");
        assert_eq!(names(filter.select(&scenarios)), vec!["valid-login", "checkout"]);
    }

    #[test]
    fn test_exclusion_and_names() {
        let scenarios = vec![
            scenario("a", 1, &["smoke"]),
            scenario("b", 1, &["smoke", "slow"]),
            scenario("c", 1, &["edge-case"]),
        ];
        let filter = ScenarioFilter::parse("smoke,!slow");
        assert_eq!(names(filter.select(&scenarios)), vec!["a"]);

        let filter = ScenarioFilter::all().name("c");
        assert_eq!(names(filter.select(&scenarios)), vec!["c"]);
    }

    #[test]
    fn test_priority_order_is_stable() {
        let scenarios = vec![
            scenario("third", 3, &[]),
            scenario("first-a", 1, &[]),
            scenario("second", 2, &[]),
            scenario("first-b", 1, &[]),
        ];
        let ordered = names(ScenarioFilter::all().select(&scenarios));
        assert_eq!(ordered, vec!["first-a", "first-b", "second", "third"]);
    }

    #[test]
    fn test_empty_expression_selects_all() {
        let filter = ScenarioFilter::parse("  ");
        assert_eq!(filter, ScenarioFilter::all());
        assert!(filter.matches(&scenario("x", 0, &[])));
    }
}

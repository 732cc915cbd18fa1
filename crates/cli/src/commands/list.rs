//! `uiflow list`

use clap::Args;
use serde::Serialize;

use uiflow_e2e::{HarnessConfig, Scenario};

use super::Selection;
use crate::output::{print_list, OutputFormat, TableDisplay};

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub selection: Selection,
}

/// One line of the scenario listing
#[derive(Debug, Serialize)]
pub struct ScenarioRow {
    pub order: usize,
    pub name: String,
    pub target: String,
    pub base_url: String,
    pub priority: i32,
    pub tags: Vec<String>,
    pub steps: usize,
}

impl ScenarioRow {
    fn new(order: usize, scenario: &Scenario, base_url: &str) -> Self {
        Self {
            order,
            name: scenario.name.clone(),
            target: scenario.target.clone(),
            base_url: base_url.to_string(),
            priority: scenario.priority,
            tags: scenario.tags.iter().cloned().collect(),
            steps: scenario.steps.len(),
        }
    }
}

impl TableDisplay for ScenarioRow {
    fn headers() -> Vec<&'static str> {
        vec!["#", "Name", "Target", "Base URL", "Priority", "Tags", "Steps"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.order.to_string(),
            self.name.clone(),
            self.target.clone(),
            self.base_url.clone(),
            self.priority.to_string(),
            self.tags.join(", "),
            self.steps.to_string(),
        ]
    }
}

pub fn execute(args: ListArgs, config: HarnessConfig, format: OutputFormat) -> anyhow::Result<i32> {
    let plan = args.selection.resolve(&config)?;

    let rows: Vec<ScenarioRow> = plan
        .ordered()
        .into_iter()
        .enumerate()
        .map(|(i, s)| ScenarioRow::new(i + 1, s, plan.environment.base_url(&s.target).unwrap_or_default()))
        .collect();

    print_list(&rows, format);
    Ok(0)
}

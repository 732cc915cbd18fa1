//! `uiflow validate`

use std::collections::BTreeSet;

use clap::Args;

use uiflow_e2e::HarnessConfig;

use super::Selection;
use crate::output::print_success;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub selection: Selection,
}

/// Load errors surface as `Err` and exit with code 2
pub fn execute(args: ValidateArgs, config: HarnessConfig) -> anyhow::Result<i32> {
    config.validate()?;
    let plan = args.selection.resolve(&config)?;

    let files: BTreeSet<_> = plan.scenarios.iter().filter_map(|s| s.origin.as_ref()).collect();
    let steps: usize = plan.scenarios.iter().map(|s| s.steps.len()).sum();

    print_success(&format!(
        "{} scenario(s) with {} step(s) in {} file(s) are valid for environment '{}'",
        plan.scenarios.len(),
        steps,
        files.len(),
        plan.environment.name
    ));
    Ok(0)
}

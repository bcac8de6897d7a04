use crate::commands::PlanArgs;
use crate::{manifest, setup};
use anyhow::Result;

pub fn run(args: &PlanArgs) -> Result<()> {
    let loaded = manifest::load(&args.config, &args.db)?;
    let (mut collector, input) = setup::build_collector(loaded);

    let plan = collector.refine(&input)?;
    tracing::debug!(actions = plan.actions.len(), "plan computed, resolving config vars");

    let vars = bpkg_planner::apply_config_vars(&collector);
    let mut keys: Vec<_> = vars.keys().collect();
    keys.sort();
    for key in keys {
        let entry_vars = &vars[key];
        if entry_vars.is_empty() {
            continue;
        }
        println!("{key}:");
        for var in entry_vars {
            println!("  {var}");
        }
    }
    Ok(())
}

use crate::commands::PlanArgs;
use crate::executor::PrintingExecutor;
use crate::{manifest, setup};
use anyhow::Result;
use bpkg_planner::interfaces::PlanExecutor;

pub fn run(args: &PlanArgs) -> Result<()> {
    let loaded = manifest::load(&args.config, &args.db)?;
    let (mut collector, input) = setup::build_collector(loaded);

    let plan = collector.refine(&input)?;
    tracing::info!(checksum = %plan.checksum, actions = plan.actions.len(), "plan computed");

    PrintingExecutor.execute_plan(&plan.actions, args.simulate).map_err(|e| anyhow::anyhow!(e))?;
    println!("checksum: {}", plan.checksum);
    Ok(())
}

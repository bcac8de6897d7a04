//! A stub [`PlanExecutor`] that renders a plan instead of invoking a real
//! build system (explicit Non-goal: filesystem unpack/checkout, the
//! build-system invocation itself). The simulating executor used by the
//! refinement driver lives in `bpkg_store::simulate`; this one is the
//! CLI-facing counterpart spec.md §6.4 describes as swappable.

use bpkg_store::PlanAction;
use bpkg_planner::interfaces::PlanExecutor;

#[derive(Debug, Default)]
pub struct PrintingExecutor;

impl PlanExecutor for PrintingExecutor {
    fn execute_plan(&self, actions: &[PlanAction], simulate: bool) -> Result<(), String> {
        let verb = if simulate { "would apply" } else { "applying (stub)" };
        for action in actions {
            println!("{verb}: {} -> {} [{:?}/{:?}]", action.key, action.version, action.state, action.substate);
        }
        Ok(())
    }
}

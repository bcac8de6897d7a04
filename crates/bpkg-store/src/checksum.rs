//! SHA-256 plan checksums (spec.md §6 "Output"): a stable digest over the
//! ordered plan actions, used by the CLI and by tests to detect a no-op
//! refinement pass.

use crate::types::{SelectedState, SubState};
use bpkg_config::PackageKey;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;

/// One action in the rendered plan, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanAction {
    pub key: PackageKey,
    pub version: String,
    pub state: SelectedState,
    pub substate: SubState,
}

/// Compute the plan checksum: a SHA-256 hex digest over each action's key,
/// version and target state, in order. Two plans with the same checksum
/// are equivalent for execution purposes, which is how the refinement
/// driver (spec.md §4.10 step 10) detects convergence.
#[must_use]
pub fn plan_checksum(actions: &[PlanAction]) -> String {
    let mut hasher = Sha256::new();
    for action in actions {
        hasher.update(action.key.to_string().as_bytes());
        hasher.update([0u8]);
        hasher.update(action.version.as_bytes());
        hasher.update([0u8]);
        hasher.update(state_tag(action.state, action.substate).as_bytes());
        hasher.update([0xffu8]);
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

fn state_tag(state: SelectedState, substate: SubState) -> &'static str {
    match (state, substate) {
        (SelectedState::Broken, _) => "broken",
        (SelectedState::Fetched, _) => "fetched",
        (SelectedState::Unpacked, _) => "unpacked",
        (SelectedState::Configured, SubState::System) => "configured/system",
        (SelectedState::Configured, SubState::Normal) => "configured",
        (SelectedState::Transient, _) => "transient",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bpkg_config::ConfigId;
    use bpkg_core::PackageName;

    fn action(name: &str, version: &str) -> PlanAction {
        PlanAction {
            key: PackageKey::new(ConfigId::from_raw(1), PackageName::parse(name).unwrap()),
            version: version.to_string(),
            state: SelectedState::Configured,
            substate: SubState::Normal,
        }
    }

    #[test]
    fn identical_plans_checksum_equal() {
        let a = vec![action("libfoo", "1.0.0"), action("libbar", "2.0.0")];
        let b = vec![action("libfoo", "1.0.0"), action("libbar", "2.0.0")];
        assert_eq!(plan_checksum(&a), plan_checksum(&b));
    }

    #[test]
    fn reordered_plans_checksum_differently() {
        let a = vec![action("libfoo", "1.0.0"), action("libbar", "2.0.0")];
        let b = vec![action("libbar", "2.0.0"), action("libfoo", "1.0.0")];
        assert_ne!(plan_checksum(&a), plan_checksum(&b));
    }

    #[test]
    fn version_change_checksum_differs() {
        let a = vec![action("libfoo", "1.0.0")];
        let b = vec![action("libfoo", "1.0.1")];
        assert_ne!(plan_checksum(&a), plan_checksum(&b));
    }
}

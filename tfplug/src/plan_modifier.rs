//! Built-in plan modifiers
//!
//! Plan modifiers run per attribute during PlanResourceChange, after defaults
//! and computed-value handling. The gRPC layer only runs them when a prior
//! state exists; creates never require replacement.

use crate::schema::{PlanModifier, PlanModifierRequest, PlanModifierResponse};
use crate::types::{values_equal, Dynamic};

/// Marks the resource for replacement when the attribute changes
pub struct RequiresReplace;

impl PlanModifier for RequiresReplace {
    fn description(&self) -> String {
        "changing this attribute forces a new resource".to_string()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        let plan = &request.plan_value.value;
        let state = &request.state_value.value;

        let requires_replace = !plan.contains_unknown() && !values_equal(state, plan);

        PlanModifierResponse {
            plan_value: request.plan_value,
            requires_replace,
            diagnostics: vec![],
        }
    }
}

/// Carries the prior state value forward when the planned value is unknown
///
/// Useful for computed attributes that never change after create, such as
/// vendor-assigned identifiers, so updates do not show them as "known after apply".
pub struct UseStateForUnknown;

impl PlanModifier for UseStateForUnknown {
    fn description(&self) -> String {
        "once set, the value of this attribute in state will not change".to_string()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        let plan_value = match (&request.plan_value.value, &request.state_value.value) {
            (Dynamic::Unknown, Dynamic::Null) => request.plan_value,
            (Dynamic::Unknown, _) => request.state_value,
            _ => request.plan_value,
        };

        PlanModifierResponse {
            plan_value,
            requires_replace: false,
            diagnostics: vec![],
        }
    }
}

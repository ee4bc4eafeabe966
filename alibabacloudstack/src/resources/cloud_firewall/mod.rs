pub mod resource_control_policy_order;

pub use resource_control_policy_order::ControlPolicyOrderResource;

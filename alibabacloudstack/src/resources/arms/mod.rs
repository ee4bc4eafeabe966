pub mod resource_alert_contact_group;

pub use resource_alert_contact_group::AlertContactGroupResource;

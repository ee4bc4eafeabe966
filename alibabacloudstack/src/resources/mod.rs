//! Resource implementations

pub mod arms;
pub mod cloud_firewall;
pub mod cms;
pub mod ecs;
pub mod graph_database;
pub mod nas;
pub mod quick_bi;

pub use arms::AlertContactGroupResource;
pub use cloud_firewall::ControlPolicyOrderResource;
pub use cms::MetricRuleTemplateResource;
pub use ecs::EbsStorageSetResource;
pub use graph_database::DbInstanceResource;
pub use nas::{FileSystemResource, MountTargetResource};
pub use quick_bi::UserResource;

use crate::api::ApiError;
use crate::AlibabacloudStackProviderData;
use std::any::Any;
use std::sync::Arc;
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

/// Downcast the provider data handed to `configure`
pub(crate) fn provider_data_from(
    data: Option<Arc<dyn Any + Send + Sync>>,
) -> Result<AlibabacloudStackProviderData, Diagnostic> {
    match data {
        Some(data) => data
            .downcast_ref::<AlibabacloudStackProviderData>()
            .cloned()
            .ok_or_else(|| {
                Diagnostic::error(
                    "Invalid provider data",
                    "Failed to extract AlibabacloudStackProviderData from provider data",
                )
            }),
        None => Err(Diagnostic::error(
            "No provider data",
            "No provider data was provided to the resource",
        )),
    }
}

pub(crate) fn not_configured() -> Diagnostic {
    Diagnostic::error(
        "Provider not configured",
        "Provider data was not properly configured",
    )
}

/// Diagnostic for a failed call; the detail carries resource, code and message
pub(crate) fn api_error(summary: &str, err: &ApiError) -> Diagnostic {
    Diagnostic::error(summary, err.to_string())
}

/// Known, non-empty string at `name`
pub(crate) fn get_string(value: &DynamicValue, name: &str) -> Option<String> {
    value
        .get_string(&AttributePath::new(name))
        .ok()
        .filter(|s| !s.is_empty())
}

pub(crate) fn get_number(value: &DynamicValue, name: &str) -> Option<f64> {
    value.get_number(&AttributePath::new(name)).ok()
}

pub(crate) fn get_bool(value: &DynamicValue, name: &str) -> Option<bool> {
    value.get_bool(&AttributePath::new(name)).ok()
}

pub(crate) fn get_string_list(value: &DynamicValue, name: &str) -> Vec<String> {
    value
        .get_string_list(&AttributePath::new(name))
        .unwrap_or_default()
}

pub(crate) fn changed(prior: &DynamicValue, planned: &DynamicValue, name: &str) -> bool {
    prior.has_changed(planned, &AttributePath::new(name))
}

/// Set `name` to `value`, or to null when there is none
pub(crate) fn set_attr<T: Into<Dynamic>>(state: &mut DynamicValue, name: &str, value: Option<T>) {
    let path = AttributePath::new(name);
    let _ = match value {
        Some(v) => state.set(&path, v),
        None => state.set_null(&path),
    };
}

/// Split a composite `a:b` identifier
pub(crate) fn split_id(id: &str) -> Option<(&str, &str)> {
    let (first, second) = id.split_once(':')?;
    if first.is_empty() || second.is_empty() || second.contains(':') {
        return None;
    }
    Some((first, second))
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::api::test_helpers::create_test_client;
    use crate::AlibabacloudStackProviderData;
    use std::any::Any;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tfplug::types::{Dynamic, DynamicValue};

    pub fn provider_data(url: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        Some(Arc::new(AlibabacloudStackProviderData::new(
            create_test_client(url),
        )))
    }

    pub fn object(attrs: &[(&str, Dynamic)]) -> DynamicValue {
        let map: HashMap<String, Dynamic> = attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        DynamicValue::new(Dynamic::Map(map))
    }

    pub fn s(value: &str) -> Dynamic {
        Dynamic::String(value.to_string())
    }
}

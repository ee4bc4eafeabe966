//! Default value providers for attributes
//!
//! Defaults are evaluated during planning when an attribute is null in the
//! configuration. The planned value then carries the default, so the apply
//! handlers always see it.

use crate::schema::{AttributeDefault, DefaultRequest, DefaultResponse};
use crate::types::{Dynamic, DynamicValue};

/// StaticDefault provides a fixed default value
pub struct StaticDefault {
    value: Dynamic,
}

impl StaticDefault {
    pub fn new(value: impl Into<Dynamic>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn string(value: &str) -> Self {
        Self::new(value)
    }

    pub fn number(value: f64) -> Self {
        Self::new(value)
    }

    pub fn bool(value: bool) -> Self {
        Self::new(value)
    }
}

impl AttributeDefault for StaticDefault {
    fn description(&self) -> String {
        match &self.value {
            Dynamic::String(s) => format!("defaults to \"{}\"", s),
            other => format!("defaults to {:?}", other),
        }
    }

    fn default_value(&self, _request: DefaultRequest) -> DefaultResponse {
        DefaultResponse {
            value: DynamicValue::new(self.value.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttributePath;

    #[test]
    fn static_default_returns_value() {
        let default = StaticDefault::string("DEFAULT_VPC_GROUP_NAME");
        let response = default.default_value(DefaultRequest {
            path: AttributePath::new("access_group_name"),
        });
        assert_eq!(
            response.value.value,
            Dynamic::String("DEFAULT_VPC_GROUP_NAME".to_string())
        );
        assert_eq!(default.description(), "defaults to \"DEFAULT_VPC_GROUP_NAME\"");
    }

    #[test]
    fn static_default_typed_constructors() {
        let number = StaticDefault::number(0.0);
        let flag = StaticDefault::bool(false);
        let path = AttributePath::new("x");

        assert_eq!(
            number
                .default_value(DefaultRequest { path: path.clone() })
                .value
                .value,
            Dynamic::Number(0.0)
        );
        assert_eq!(
            flag.default_value(DefaultRequest { path }).value.value,
            Dynamic::Bool(false)
        );
    }
}

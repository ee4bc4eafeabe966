//! Cloud Monitor alert templates

pub mod resource_metric_rule_template;

pub use resource_metric_rule_template::MetricRuleTemplateResource;

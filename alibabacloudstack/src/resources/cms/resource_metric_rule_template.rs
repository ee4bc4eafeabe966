//! Cloud Monitor metric rule template
//!
//! A template holds alert rules that can be applied to an application group.
//! Applying happens whenever `enable` is true and one of the apply settings
//! changed; content changes go through ModifyMetricRuleTemplate, which needs
//! the current `rest_version`.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
use tfplug::plan_modifier::UseStateForUnknown;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, ResourceWithImportState, UpdateResourceRequest,
    UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, NestedBlock, NestedBlockBuilder, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::{IntBetween, StringInSlice};

use crate::api::cms::TEMPLATE_GONE;
use crate::api::common::{json_array, json_string};
use crate::api::{ApiError, Client, Retry, RpcParams};
use crate::resources::{
    api_error, changed, get_bool, get_number, get_string, not_configured, provider_data_from,
    set_attr,
};
use crate::AlibabacloudStackProviderData;

const TYPE_NAME: &str = "alibabacloudstack_cms_metric_rule_template";

const CATEGORIES: &[&str] = &[
    "ecs",
    "rds",
    "ads",
    "slb",
    "vpc",
    "apigateway",
    "cdn",
    "cs",
    "dcdn",
    "ddos",
    "eip",
    "elasticsearch",
    "emr",
    "ess",
    "hbase",
    "iot_edge",
    "kvstore_sharding",
    "kvstore_splitrw",
    "kvstore_standard",
    "memcache",
    "mns",
    "mongodb",
    "mongodb_cluster",
    "mongodb_sharding",
    "mq_topic",
    "ocs",
    "opensearch",
    "oss",
    "polardb",
    "petadata",
    "scdn",
    "sharebandwidthpackages",
    "sls",
    "vpn",
];

const COMPARISON_OPERATORS: &[&str] = &[
    "GreaterThanOrEqualToThreshold",
    "GreaterThanThreshold",
    "LessThanOrEqualToThreshold",
    "LessThanThreshold",
    "NotEqualToThreshold",
    "GreaterThanYesterday",
    "LessThanYesterday",
    "GreaterThanLastWeek",
    "LessThanLastWeek",
    "GreaterThanLastPeriod",
    "LessThanLastPeriod",
];

/// Attribute name and API key of the plain alert template fields
const TEMPLATE_FIELDS: [(&str, &str); 5] = [
    ("category", "Category"),
    ("metric_name", "MetricName"),
    ("namespace", "Namespace"),
    ("rule_name", "RuleName"),
    ("webhook", "Webhook"),
];

const LEVELS: [(&str, &str); 3] = [("critical", "Critical"), ("info", "Info"), ("warn", "Warn")];

const THRESHOLD_FIELDS: [(&str, &str); 4] = [
    ("comparison_operator", "ComparisonOperator"),
    ("statistics", "Statistics"),
    ("threshold", "Threshold"),
    ("times", "Times"),
];

/// Changes to any of these re-apply an enabled template
const APPLY_FIELDS: &[&str] = &[
    "enable",
    "group_id",
    "apply_mode",
    "enable_start_time",
    "enable_end_time",
    "notify_level",
    "silence_time",
    "webhook",
    "overwrite",
];

#[derive(Default)]
pub struct MetricRuleTemplateResource {
    provider_data: Option<AlibabacloudStackProviderData>,
}

impl MetricRuleTemplateResource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the template to its group and records the group used
    async fn apply(
        &self,
        ctx: &Context,
        client: &Client,
        id: &str,
        state: &mut DynamicValue,
    ) -> Result<(), ApiError> {
        let group_id = get_string(state, "group_id")
            .or_else(|| client.config().resource_group.clone())
            .unwrap_or_default();
        let params = apply_params(id, &group_id, state);

        Retry::new(TYPE_NAME, "ApplyMetricRuleTemplate")
            .run(ctx, || {
                let params = params.clone();
                async move { client.cms().apply_metric_rule_template(params).await }
            })
            .await?;
        tracing::info!(id = %id, group_id = %group_id, "applied metric rule template");

        set_attr(state, "group_id", Some(group_id));
        Ok(())
    }

    async fn read_state(
        &self,
        ctx: &Context,
        client: &Client,
        id: &str,
        mut state: DynamicValue,
    ) -> Result<Option<DynamicValue>, ApiError> {
        let template = Retry::new(TYPE_NAME, "DescribeMetricRuleTemplateAttribute")
            .run(ctx, || async move {
                client.cms().describe_metric_rule_template(id).await
            })
            .await?;
        let Some(template) = template else {
            return Ok(None);
        };

        let _ = state.set_string(&AttributePath::new("id"), id.to_string());
        set_attr(
            &mut state,
            "metric_rule_template_name",
            json_string(&template, "Name"),
        );
        set_attr(
            &mut state,
            "description",
            json_string(&template, "Description").filter(|d| !d.is_empty()),
        );
        set_attr(&mut state, "rest_version", json_string(&template, "RestVersion"));
        if let Some(group_id) = json_string(&template, "GroupId").filter(|g| !g.is_empty()) {
            set_attr(&mut state, "group_id", Some(group_id));
        }

        let templates = alert_templates_from(&template);
        if !templates.is_empty() {
            let _ = state.set_list(&AttributePath::new("alert_templates"), templates);
        }
        Ok(Some(state))
    }
}

/// First element of a nested block list, as an object
fn first_block<'a>(
    object: &'a HashMap<String, Dynamic>,
    name: &str,
) -> Option<&'a HashMap<String, Dynamic>> {
    object.get(name)?.as_list()?.first()?.as_map()
}

fn non_empty<'a>(object: &'a HashMap<String, Dynamic>, name: &str) -> Option<&'a str> {
    object
        .get(name)
        .and_then(Dynamic::as_str)
        .filter(|s| !s.is_empty())
}

/// Flatten `alert_templates` blocks into `AlertTemplates.N.*` parameters
pub(crate) fn alert_template_params(templates: &[Dynamic]) -> RpcParams {
    let mut params = RpcParams::new();
    for (idx, template) in templates.iter().enumerate() {
        let Some(template) = template.as_map() else {
            continue;
        };
        let prefix = format!("AlertTemplates.{}", idx + 1);

        for (field, key) in TEMPLATE_FIELDS {
            if let Some(value) = non_empty(template, field) {
                params.insert(format!("{}.{}", prefix, key), value);
            }
        }

        let Some(escalations) = first_block(template, "escalations") else {
            continue;
        };
        for (level, level_key) in LEVELS {
            let Some(threshold) = first_block(escalations, level) else {
                continue;
            };
            for (field, key) in THRESHOLD_FIELDS {
                if let Some(value) = non_empty(threshold, field) {
                    params.insert(
                        format!("{}.Escalations.{}.{}", prefix, level_key, key),
                        value,
                    );
                }
            }
        }
    }
    params
}

/// `Resource.AlertTemplates.AlertTemplate[]` as `alert_templates` blocks.
///
/// A level the API reports with no values at all is left out so configs
/// that only set `critical` do not drift.
pub(crate) fn alert_templates_from(template: &Value) -> Vec<Dynamic> {
    json_array(template, "AlertTemplates.AlertTemplate")
        .iter()
        .map(|alert| {
            let mut block: HashMap<String, Dynamic> = TEMPLATE_FIELDS
                .iter()
                .filter_map(|(field, key)| {
                    json_string(alert, key)
                        .filter(|v| !v.is_empty())
                        .map(|v| (field.to_string(), Dynamic::String(v)))
                })
                .collect();

            let mut escalations = HashMap::new();
            for (level, level_key) in LEVELS {
                let threshold: HashMap<String, Dynamic> = THRESHOLD_FIELDS
                    .iter()
                    .filter_map(|(field, key)| {
                        json_string(alert, &format!("Escalations.{}.{}", level_key, key))
                            .filter(|v| !v.is_empty())
                            .map(|v| (field.to_string(), Dynamic::String(v)))
                    })
                    .collect();
                if !threshold.is_empty() {
                    escalations.insert(
                        level.to_string(),
                        Dynamic::List(vec![Dynamic::Map(threshold)]),
                    );
                }
            }
            if !escalations.is_empty() {
                block.insert(
                    "escalations".to_string(),
                    Dynamic::List(vec![Dynamic::Map(escalations)]),
                );
            }
            Dynamic::Map(block)
        })
        .collect()
}

fn apply_params(id: &str, group_id: &str, state: &DynamicValue) -> RpcParams {
    RpcParams::new()
        .add("TemplateIds", id)
        .add("GroupId", group_id)
        .add("Overwrite", get_bool(state, "overwrite").unwrap_or(false))
        .add_optional("ApplyMode", get_string(state, "apply_mode"))
        .add_optional("EnableStartTime", get_string(state, "enable_start_time"))
        .add_optional("EnableEndTime", get_string(state, "enable_end_time"))
        .add_optional("NotifyLevel", get_string(state, "notify_level"))
        .add_optional(
            "SilenceTime",
            get_number(state, "silence_time").map(|t| t as i64),
        )
        .add_optional("Webhook", get_string(state, "webhook"))
}

fn alert_templates(value: &DynamicValue) -> Vec<Dynamic> {
    value
        .get_list(&AttributePath::new("alert_templates"))
        .unwrap_or_default()
}

fn threshold_block(name: &str) -> NestedBlock {
    NestedBlockBuilder::list(name)
        .attribute(
            AttributeBuilder::new("comparison_operator", AttributeType::String)
                .optional()
                .validator(StringInSlice::new(COMPARISON_OPERATORS))
                .build(),
        )
        .attribute(
            AttributeBuilder::new("statistics", AttributeType::String)
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("threshold", AttributeType::String)
                .optional()
                .build(),
        )
        .attribute(
            AttributeBuilder::new("times", AttributeType::String)
                .optional()
                .build(),
        )
        .max_items(1)
        .build()
}

#[async_trait]
impl Resource for MetricRuleTemplateResource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages a Cloud Monitor metric rule template")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("metric_rule_template_name", AttributeType::String)
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("rest_version", AttributeType::String)
                    .description("Template version, bumped by every modification")
                    .optional()
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("group_id", AttributeType::String)
                    .description("Application group the template is applied to; defaults to the provider resource_group")
                    .optional()
                    .computed()
                    .plan_modifier(UseStateForUnknown)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("apply_mode", AttributeType::String)
                    .optional()
                    .validator(StringInSlice::new(&[
                        "GROUP_INSTANCE_FIRST",
                        "ALARM_TEMPLATE_FIRST",
                    ]))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("enable", AttributeType::Bool)
                    .description("Apply the template to group_id")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("enable_start_time", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("enable_end_time", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("notify_level", AttributeType::String)
                    .optional()
                    .validator(StringInSlice::new(&["2", "3", "4"]))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("silence_time", AttributeType::Number)
                    .description("Seconds an alert stays silent after firing")
                    .optional()
                    .validator(IntBetween::new(0, 86400))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("webhook", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("overwrite", AttributeType::Bool)
                    .optional()
                    .computed()
                    .default(StaticDefault::bool(false))
                    .build(),
            )
            .block(
                NestedBlockBuilder::list("alert_templates")
                    .attribute(
                        AttributeBuilder::new("category", AttributeType::String)
                            .required()
                            .validator(StringInSlice::new(CATEGORIES))
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("metric_name", AttributeType::String)
                            .required()
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("namespace", AttributeType::String)
                            .required()
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("rule_name", AttributeType::String)
                            .required()
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("webhook", AttributeType::String)
                            .optional()
                            .build(),
                    )
                    .block(
                        NestedBlockBuilder::list("escalations")
                            .block(threshold_block("critical"))
                            .block(threshold_block("info"))
                            .block(threshold_block("warn"))
                            .max_items(1)
                            .build(),
                    )
                    .build(),
            )
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let Some(data) = &self.provider_data else {
            return CreateResourceResponse {
                new_state: request.planned_state,
                private: vec![],
                diagnostics: vec![not_configured()],
            };
        };
        let client = data.client.as_ref();
        let planned = request.planned_state;

        let mut params = alert_template_params(&alert_templates(&planned));
        params.insert(
            "Name",
            get_string(&planned, "metric_rule_template_name").unwrap_or_default(),
        );
        if let Some(description) = get_string(&planned, "description") {
            params.insert("Description", description);
        }

        let created = Retry::new(TYPE_NAME, "CreateMetricRuleTemplate")
            .run(&ctx, || {
                let params = params.clone();
                async move { client.cms().create_metric_rule_template(params).await }
            })
            .await;
        let id = match created {
            Ok(id) => id,
            Err(e) => {
                return CreateResourceResponse {
                    new_state: planned,
                    private: vec![],
                    diagnostics: vec![api_error("Failed to create metric rule template", &e)],
                }
            }
        };
        tracing::info!(id = %id, "created metric rule template");

        let mut state = planned;
        let _ = state.set_string(&AttributePath::new("id"), id.clone());

        if get_bool(&state, "enable") == Some(true) {
            if let Err(e) = self.apply(&ctx, client, &id, &mut state).await {
                return CreateResourceResponse {
                    new_state: state,
                    private: vec![],
                    diagnostics: vec![api_error("Failed to apply metric rule template", &e)],
                };
            }
        }

        match self.read_state(&ctx, client, &id, state.clone()).await {
            Ok(Some(new_state)) => CreateResourceResponse {
                new_state,
                private: vec![],
                diagnostics: vec![],
            },
            Ok(None) => CreateResourceResponse {
                new_state: state,
                private: vec![],
                diagnostics: vec![Diagnostic::error(
                    "Metric rule template disappeared after create",
                    format!("Template {} was not found after creation", id),
                )],
            },
            Err(e) => CreateResourceResponse {
                new_state: state,
                private: vec![],
                diagnostics: vec![api_error("Failed to read metric rule template", &e)],
            },
        }
    }

    async fn read(&self, ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let Some(data) = &self.provider_data else {
            return ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![not_configured()],
                private: request.private,
                deferred: None,
            };
        };
        let Some(id) = get_string(&request.current_state, "id") else {
            return ReadResourceResponse {
                new_state: None,
                diagnostics: vec![],
                private: request.private,
                deferred: None,
            };
        };

        let (new_state, diagnostics) = match self
            .read_state(&ctx, &data.client, &id, request.current_state.clone())
            .await
        {
            Ok(Some(state)) => (Some(state), vec![]),
            Ok(None) => {
                tracing::warn!(id = %id, "metric rule template not found, removing from state");
                (None, vec![])
            }
            Err(e) => (
                Some(request.current_state),
                vec![api_error("Failed to read metric rule template", &e)],
            ),
        };

        ReadResourceResponse {
            new_state,
            diagnostics,
            private: request.private,
            deferred: None,
        }
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let Some(data) = &self.provider_data else {
            return UpdateResourceResponse {
                new_state: request.planned_state,
                private: vec![],
                diagnostics: vec![not_configured()],
            };
        };
        let client = data.client.as_ref();
        let prior = &request.prior_state;
        let mut planned = request.planned_state.clone();
        let id = get_string(prior, "id").unwrap_or_default();

        let reapply = get_bool(&planned, "enable") == Some(true)
            && APPLY_FIELDS.iter().any(|name| changed(prior, &planned, name));
        if reapply {
            if let Err(e) = self.apply(&ctx, client, &id, &mut planned).await {
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    private: vec![],
                    diagnostics: vec![api_error("Failed to apply metric rule template", &e)],
                };
            }
        }

        let templates_changed = changed(prior, &planned, "alert_templates");
        let description_changed = changed(prior, &planned, "description");
        let name_changed = changed(prior, &planned, "metric_rule_template_name");
        if templates_changed || description_changed || name_changed {
            let mut params = if templates_changed {
                alert_template_params(&alert_templates(&planned))
            } else {
                RpcParams::new()
            };
            params.insert("TemplateId", &id);
            if let Some(version) = get_string(prior, "rest_version") {
                params.insert("RestVersion", version);
            }
            if description_changed {
                params.insert(
                    "Description",
                    get_string(&planned, "description").unwrap_or_default(),
                );
            }
            if name_changed {
                params.insert(
                    "Name",
                    get_string(&planned, "metric_rule_template_name").unwrap_or_default(),
                );
            }

            let modified = Retry::new(TYPE_NAME, "ModifyMetricRuleTemplate")
                .run(&ctx, || {
                    let params = params.clone();
                    async move { client.cms().modify_metric_rule_template(params).await }
                })
                .await;
            if let Err(e) = modified {
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    private: vec![],
                    diagnostics: vec![api_error("Failed to modify metric rule template", &e)],
                };
            }
        }

        match self.read_state(&ctx, client, &id, planned.clone()).await {
            Ok(Some(new_state)) => UpdateResourceResponse {
                new_state,
                private: vec![],
                diagnostics: vec![],
            },
            Ok(None) => UpdateResourceResponse {
                new_state: planned,
                private: vec![],
                diagnostics: vec![Diagnostic::error(
                    "Metric rule template not found",
                    format!("Template {} no longer exists", id),
                )],
            },
            Err(e) => UpdateResourceResponse {
                new_state: planned,
                private: vec![],
                diagnostics: vec![api_error("Failed to read metric rule template", &e)],
            },
        }
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let Some(data) = &self.provider_data else {
            return DeleteResourceResponse {
                diagnostics: vec![not_configured()],
            };
        };
        let client = data.client.as_ref();
        let Some(id) = get_string(&request.prior_state, "id") else {
            return DeleteResourceResponse {
                diagnostics: vec![],
            };
        };
        let template_id = id.as_str();

        let deleted = Retry::new(TYPE_NAME, "DeleteMetricRuleTemplate")
            .run(&ctx, || async move {
                client.cms().delete_metric_rule_template(template_id).await
            })
            .await;
        let diagnostics = match deleted {
            Ok(()) => vec![],
            Err(e) if e.is_expected(TEMPLATE_GONE) => {
                tracing::debug!(id = %id, "metric rule template already gone");
                vec![]
            }
            Err(e) => vec![api_error("Failed to delete metric rule template", &e)],
        };
        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithConfigure for MetricRuleTemplateResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        match provider_data_from(request.provider_data) {
            Ok(data) => {
                self.provider_data = Some(data);
                ConfigureResourceResponse {
                    diagnostics: vec![],
                }
            }
            Err(diag) => ConfigureResourceResponse {
                diagnostics: vec![diag],
            },
        }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithImportState for MetricRuleTemplateResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
            deferred: None,
        };
        tfplug::import_state_passthrough_id(&ctx, AttributePath::new("id"), &request, &mut response);
        response
    }
}

#[cfg(test)]
#[path = "./resource_metric_rule_template_test.rs"]
mod resource_metric_rule_template_test;

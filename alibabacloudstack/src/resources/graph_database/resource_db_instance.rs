//! Graph Database (GDB) instance
//!
//! Whitelist groups are managed through `db_instance_ip_array`; groups the
//! service keeps for itself (named `hidden...`) are never shown, and the
//! `default` group every instance starts with only once it is configured.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tfplug::context::Context;
use tfplug::plan_modifier::UseStateForUnknown;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, ResourceWithImportState, UpdateResourceRequest,
    UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, NestedBlockBuilder, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::{IntBetween, StringInSlice};
use uuid::Uuid;

use crate::api::common::{json_f64, json_string};
use crate::api::gdb::INSTANCE_GONE;
use crate::api::{ApiError, Client, Refresh, Retry, RpcParams, StateConf};
use crate::resources::{
    api_error, changed, get_number, get_string, not_configured, provider_data_from, set_attr,
};
use crate::AlibabacloudStackProviderData;

const TYPE_NAME: &str = "alibabacloudstack_graph_database_db_instance";

const POLL_INTERVAL: Duration = Duration::from_secs(10);
const WAIT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Whitelist groups owned by the service
const HIDDEN_GROUP_PREFIX: &str = "hidden";

/// Created with every instance; only tracked once configured
const DEFAULT_GROUP: &str = "default";

#[derive(Default)]
pub struct DbInstanceResource {
    provider_data: Option<AlibabacloudStackProviderData>,
}

impl DbInstanceResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn wait_running(&self, ctx: &Context, client: &Client, id: &str) -> Result<(), ApiError> {
        StateConf::new(&["Running"])
            .pending(&["Creating", "ClassChanging"])
            .fail(&["Deleting"])
            .interval(POLL_INTERVAL)
            .timeout(WAIT_TIMEOUT)
            .wait(ctx, || async move {
                Ok(match client.gdb().describe_db_instance(id).await? {
                    Some(instance) => Refresh::Found(
                        json_string(&instance, "DBInstanceStatus").unwrap_or_default(),
                    ),
                    None => Refresh::Gone,
                })
            })
            .await
            .map(|_| ())
            .map_err(|e| e.wrap(TYPE_NAME, "waiting for instance Running"))
    }

    /// Brings the whitelist groups from `prior` to `planned`: changed and new
    /// groups are covered, dropped groups deleted
    async fn sync_ip_arrays(
        &self,
        ctx: &Context,
        client: &Client,
        id: &str,
        prior: &BTreeMap<String, String>,
        planned: &BTreeMap<String, String>,
    ) -> Result<(), ApiError> {
        for (name, ips, mode) in ip_array_changes(prior, planned) {
            Retry::new(TYPE_NAME, "ModifyDBInstanceAccessWhiteList")
                .run(ctx, || {
                    let (name, ips) = (name.as_str(), ips.as_str());
                    async move {
                        client
                            .gdb()
                            .modify_access_white_list(id, name, ips, mode)
                            .await
                    }
                })
                .await?;
            tracing::debug!(id = %id, group = %name, mode, "updated whitelist group");
        }
        Ok(())
    }

    async fn read_state(
        &self,
        ctx: &Context,
        client: &Client,
        id: &str,
        mut state: DynamicValue,
    ) -> Result<Option<DynamicValue>, ApiError> {
        let instance = Retry::new(TYPE_NAME, "DescribeDBInstanceAttribute")
            .run(ctx, || async move { client.gdb().describe_db_instance(id).await })
            .await?;
        let Some(instance) = instance else {
            return Ok(None);
        };

        let groups = Retry::new(TYPE_NAME, "DescribeDBInstanceAccessWhiteList")
            .run(ctx, || async move {
                client.gdb().describe_access_white_list(id).await
            })
            .await?;

        let managed = ip_arrays(&state);
        let _ = state.set_string(&AttributePath::new("id"), id.to_string());
        apply_instance(&mut state, &instance);
        let _ = state.set_list(
            &AttributePath::new("db_instance_ip_array"),
            visible_ip_arrays(&groups, &managed),
        );
        Ok(Some(state))
    }
}

/// `(group, security_ips, ModifyMode)` calls needed to go from `prior` to `planned`
pub(crate) fn ip_array_changes(
    prior: &BTreeMap<String, String>,
    planned: &BTreeMap<String, String>,
) -> Vec<(String, String, &'static str)> {
    let mut changes: Vec<_> = planned
        .iter()
        .filter(|(name, ips)| prior.get(*name) != Some(*ips))
        .map(|(name, ips)| (name.clone(), ips.clone(), "Cover"))
        .collect();
    changes.extend(
        prior
            .iter()
            .filter(|(name, _)| !planned.contains_key(*name))
            .map(|(name, ips)| (name.clone(), ips.clone(), "Delete")),
    );
    changes
}

/// `db_instance_ip_array` blocks keyed by group name
fn ip_arrays(value: &DynamicValue) -> BTreeMap<String, String> {
    value
        .get_list(&AttributePath::new("db_instance_ip_array"))
        .unwrap_or_default()
        .iter()
        .filter_map(|group| {
            let group = group.as_map()?;
            let name = group.get("db_instance_ip_array_name")?.as_str()?;
            let ips = group.get("security_ips")?.as_str()?;
            Some((name.to_string(), ips.to_string()))
        })
        .collect()
}

/// Whitelist groups to report. Service groups are never shown and the
/// `default` group only when `managed` names it.
pub(crate) fn visible_ip_arrays(
    groups: &[Value],
    managed: &BTreeMap<String, String>,
) -> Vec<Dynamic> {
    groups
        .iter()
        .filter_map(|group| {
            let name = json_string(group, "DBInstanceIPArrayName")?;
            if name.starts_with(HIDDEN_GROUP_PREFIX)
                || (name == DEFAULT_GROUP && !managed.contains_key(&name))
            {
                return None;
            }
            let ips = json_string(group, "SecurityIps").unwrap_or_default();
            Some(Dynamic::Map(
                [
                    ("db_instance_ip_array_name".to_string(), Dynamic::String(name)),
                    ("security_ips".to_string(), Dynamic::String(ips)),
                ]
                .into_iter()
                .collect(),
            ))
        })
        .collect()
}

fn pay_type(payment_type: &str) -> &str {
    match payment_type {
        "PayAsYouGo" => "Postpaid",
        other => other,
    }
}

fn payment_type(pay_type: &str) -> &str {
    match pay_type {
        "Postpaid" => "PayAsYouGo",
        other => other,
    }
}

fn apply_instance(state: &mut DynamicValue, instance: &Value) {
    set_attr(state, "db_node_class", json_string(instance, "DBNodeClass"));
    set_attr(
        state,
        "db_instance_network_type",
        json_string(instance, "DBInstanceNetworkType"),
    );
    set_attr(state, "db_version", json_string(instance, "DBVersion"));
    set_attr(
        state,
        "db_instance_category",
        json_string(instance, "Category").map(|c| c.to_uppercase()),
    );
    set_attr(
        state,
        "db_instance_storage_type",
        json_string(instance, "DBInstanceStorageType"),
    );
    set_attr(state, "db_node_storage", json_f64(instance, "DBNodeStorage"));
    set_attr(
        state,
        "payment_type",
        json_string(instance, "PayType").map(|p| payment_type(&p).to_string()),
    );
    set_attr(
        state,
        "db_instance_description",
        json_string(instance, "DBInstanceDescription").filter(|d| !d.is_empty()),
    );
    set_attr(state, "zone_id", json_string(instance, "ZoneId"));
    set_attr(state, "vswitch_id", json_string(instance, "VSwitchId"));
    set_attr(state, "vpc_id", json_string(instance, "VpcId"));
    set_attr(state, "status", json_string(instance, "DBInstanceStatus"));
    set_attr(
        state,
        "connection_string",
        json_string(instance, "ConnectionString"),
    );
}

fn create_params(planned: &DynamicValue) -> RpcParams {
    RpcParams::new()
        .add_optional("DBNodeClass", get_string(planned, "db_node_class"))
        .add_optional(
            "DBInstanceNetworkType",
            get_string(planned, "db_instance_network_type"),
        )
        .add_optional("DBInstanceVersion", get_string(planned, "db_version"))
        .add_optional("DBInstanceCategory", get_string(planned, "db_instance_category"))
        .add_optional(
            "DBInstanceStorageType",
            get_string(planned, "db_instance_storage_type"),
        )
        .add_optional(
            "DBNodeStorage",
            get_number(planned, "db_node_storage").map(|s| s as i64),
        )
        .add_optional(
            "PayType",
            get_string(planned, "payment_type").map(|p| pay_type(&p).to_string()),
        )
        .add_optional(
            "DBInstanceDescription",
            get_string(planned, "db_instance_description"),
        )
        .add_optional("ZoneId", get_string(planned, "zone_id"))
        .add_optional("VSwitchId", get_string(planned, "vswitch_id"))
        .add_optional("VPCId", get_string(planned, "vpc_id"))
        .add("ClientToken", Uuid::new_v4())
}

/// Required, force-new string limited to `allowed`
fn fixed_choice(name: &str, allowed: &[&str]) -> AttributeBuilder {
    AttributeBuilder::new(name, AttributeType::String)
        .required()
        .force_new()
        .validator(StringInSlice::new(allowed))
}

#[async_trait]
impl Resource for DbInstanceResource {
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
            .description("Manages a Graph Database instance")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("db_node_class", AttributeType::String)
                    .description("Node class, e.g. gdb.r.xlarge")
                    .required()
                    .build(),
            )
            .attribute(
                fixed_choice("db_instance_network_type", &["vpc"]).build(),
            )
            .attribute(
                fixed_choice("db_version", &["1.0", "1.0-OpenCypher"]).build(),
            )
            .attribute(
                fixed_choice("db_instance_category", &["HA", "SINGLE"]).build(),
            )
            .attribute(
                fixed_choice("db_instance_storage_type", &["cloud_essd", "cloud_ssd"]).build(),
            )
            .attribute(
                AttributeBuilder::new("db_node_storage", AttributeType::Number)
                    .description("Storage per node in GB")
                    .required()
                    .validator(IntBetween::new(20, 64000))
                    .build(),
            )
            .attribute(
                fixed_choice("payment_type", &["PayAsYouGo"]).build(),
            )
            .attribute(
                AttributeBuilder::new("db_instance_description", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("zone_id", AttributeType::String)
                    .optional()
                    .computed()
                    .force_new()
                    .plan_modifier(UseStateForUnknown)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("vswitch_id", AttributeType::String)
                    .optional()
                    .computed()
                    .force_new()
                    .plan_modifier(UseStateForUnknown)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("vpc_id", AttributeType::String)
                    .optional()
                    .computed()
                    .force_new()
                    .plan_modifier(UseStateForUnknown)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("status", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("connection_string", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown)
                    .build(),
            )
            .block(
                NestedBlockBuilder::set("db_instance_ip_array")
                    .description("Access whitelist groups")
                    .attribute(
                        AttributeBuilder::new("db_instance_ip_array_name", AttributeType::String)
                            .required()
                            .build(),
                    )
                    .attribute(
                        AttributeBuilder::new("security_ips", AttributeType::String)
                            .description("Comma separated IPs or CIDR blocks")
                            .required()
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

        // ClientToken stays the same across retries
        let params = create_params(&planned);
        let created = Retry::new(TYPE_NAME, "CreateDBInstance")
            .run(&ctx, || {
                let params = params.clone();
                async move { client.gdb().create_db_instance(params).await }
            })
            .await;
        let id = match created {
            Ok(id) => id,
            Err(e) => {
                return CreateResourceResponse {
                    new_state: planned,
                    private: vec![],
                    diagnostics: vec![api_error("Failed to create graph database instance", &e)],
                }
            }
        };
        tracing::info!(id = %id, "created graph database instance");

        let mut state = planned.clone();
        let _ = state.set_string(&AttributePath::new("id"), id.clone());

        let prepared = async {
            self.wait_running(&ctx, client, &id).await?;
            self.sync_ip_arrays(&ctx, client, &id, &BTreeMap::new(), &ip_arrays(&planned))
                .await
        }
        .await;
        if let Err(e) = prepared {
            return CreateResourceResponse {
                new_state: state,
                private: vec![],
                diagnostics: vec![api_error("Failed to prepare graph database instance", &e)],
            };
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
                    "Graph database instance disappeared after create",
                    format!("Instance {} was not found after creation", id),
                )],
            },
            Err(e) => CreateResourceResponse {
                new_state: state,
                private: vec![],
                diagnostics: vec![api_error("Failed to read graph database instance", &e)],
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
                tracing::warn!(id = %id, "graph database instance not found, removing from state");
                (None, vec![])
            }
            Err(e) => (
                Some(request.current_state),
                vec![api_error("Failed to read graph database instance", &e)],
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
        let planned = request.planned_state.clone();
        let id = get_string(prior, "id").unwrap_or_default();

        let updated = async {
            if changed(prior, &planned, "db_instance_description") {
                let description = get_string(&planned, "db_instance_description").unwrap_or_default();
                Retry::new(TYPE_NAME, "ModifyDBInstanceDescription")
                    .run(&ctx, || {
                        let (id, description) = (id.as_str(), description.as_str());
                        async move { client.gdb().modify_description(id, description).await }
                    })
                    .await?;
            }

            if changed(prior, &planned, "db_instance_ip_array") {
                self.sync_ip_arrays(&ctx, client, &id, &ip_arrays(prior), &ip_arrays(&planned))
                    .await?;
            }

            if changed(prior, &planned, "db_node_class")
                || changed(prior, &planned, "db_node_storage")
            {
                let params = RpcParams::new()
                    .add("DBInstanceId", &id)
                    .add_optional("DBNodeClass", get_string(&planned, "db_node_class"))
                    .add_optional(
                        "DBNodeStorage",
                        get_number(&planned, "db_node_storage").map(|s| s as i64),
                    )
                    .add_optional(
                        "DBInstanceStorageType",
                        get_string(&planned, "db_instance_storage_type"),
                    );
                Retry::new(TYPE_NAME, "ModifyDBInstanceSpec")
                    .run(&ctx, || {
                        let params = params.clone();
                        async move { client.gdb().modify_spec(params).await }
                    })
                    .await?;
                tracing::info!(id = %id, "graph database instance spec change submitted");
                self.wait_running(&ctx, client, &id).await?;
            }
            Ok::<(), ApiError>(())
        }
        .await;

        if let Err(e) = updated {
            return UpdateResourceResponse {
                new_state: request.prior_state,
                private: vec![],
                diagnostics: vec![api_error("Failed to update graph database instance", &e)],
            };
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
                    "Graph database instance not found",
                    format!("Instance {} no longer exists", id),
                )],
            },
            Err(e) => UpdateResourceResponse {
                new_state: planned,
                private: vec![],
                diagnostics: vec![api_error("Failed to read graph database instance", &e)],
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
        let instance_id = id.as_str();

        let deleted = Retry::new(TYPE_NAME, "DeleteDBInstance")
            .run(&ctx, || async move {
                client.gdb().delete_db_instance(instance_id).await
            })
            .await;
        match deleted {
            Ok(()) => {}
            Err(e) if e.is_expected(INSTANCE_GONE) => {
                tracing::debug!(id = %id, "graph database instance already gone");
                return DeleteResourceResponse {
                    diagnostics: vec![],
                };
            }
            Err(e) => {
                return DeleteResourceResponse {
                    diagnostics: vec![api_error("Failed to delete graph database instance", &e)],
                }
            }
        }

        let gone = StateConf::new(&[])
            .pending(&["Deleting", "Running"])
            .interval(POLL_INTERVAL)
            .timeout(WAIT_TIMEOUT)
            .wait(&ctx, || async move {
                Ok(match client.gdb().describe_db_instance(instance_id).await? {
                    Some(instance) => Refresh::Found(
                        json_string(&instance, "DBInstanceStatus").unwrap_or_default(),
                    ),
                    None => Refresh::Gone,
                })
            })
            .await;

        let diagnostics = match gone {
            Ok(_) => {
                tracing::info!(id = %id, "deleted graph database instance");
                vec![]
            }
            Err(e) => vec![api_error(
                "Failed waiting for graph database instance deletion",
                &e.wrap(TYPE_NAME, "waiting for deletion"),
            )],
        };
        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithConfigure for DbInstanceResource {
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
impl ResourceWithImportState for DbInstanceResource {
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
#[path = "./resource_db_instance_test.rs"]
mod resource_db_instance_test;

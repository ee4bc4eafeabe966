//! Priority of a Cloud Firewall access control policy
//!
//! The policy itself is managed elsewhere; this resource only owns its
//! position. Destroying it leaves the policy where it is.

use async_trait::async_trait;
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
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};
use tfplug::validator::{IntBetween, StringInSlice};

use crate::api::common::json_f64;
use crate::api::{ApiError, Client, Retry};
use crate::resources::{
    api_error, changed, get_number, get_string, not_configured, provider_data_from, set_attr,
    split_id,
};
use crate::AlibabacloudStackProviderData;

const TYPE_NAME: &str = "alibabacloudstack_cloud_firewall_control_policy_order";

#[derive(Default)]
pub struct ControlPolicyOrderResource {
    provider_data: Option<AlibabacloudStackProviderData>,
}

impl ControlPolicyOrderResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn set_order(
        &self,
        ctx: &Context,
        client: &Client,
        acl_uuid: &str,
        direction: &str,
        order: i64,
    ) -> Result<(), ApiError> {
        Retry::new(TYPE_NAME, "ModifyControlPolicyPriority")
            .run(ctx, || async move {
                client
                    .cloudfw()
                    .modify_control_policy_priority(acl_uuid, direction, order)
                    .await
            })
            .await
    }

    async fn read_state(
        &self,
        ctx: &Context,
        client: &Client,
        acl_uuid: &str,
        direction: &str,
        mut state: DynamicValue,
    ) -> Result<Option<DynamicValue>, ApiError> {
        let policy = Retry::new(TYPE_NAME, "DescribeControlPolicy")
            .run(ctx, || async move {
                client
                    .cloudfw()
                    .describe_control_policy(acl_uuid, direction)
                    .await
            })
            .await?;
        let Some(policy) = policy else {
            return Ok(None);
        };

        let _ = state.set_string(
            &AttributePath::new("id"),
            format!("{}:{}", acl_uuid, direction),
        );
        set_attr(&mut state, "acl_uuid", Some(acl_uuid));
        set_attr(&mut state, "direction", Some(direction));
        set_attr(&mut state, "order", json_f64(&policy, "Order"));
        Ok(Some(state))
    }
}

#[async_trait]
impl Resource for ControlPolicyOrderResource {
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
            .description("Sets the priority of a Cloud Firewall control policy")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("<acl_uuid>:<direction>")
                    .computed()
                    .plan_modifier(UseStateForUnknown)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("acl_uuid", AttributeType::String)
                    .description("UUID of the access control policy")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("direction", AttributeType::String)
                    .description("Traffic direction of the policy")
                    .required()
                    .force_new()
                    .validator(StringInSlice::new(&["in", "out"]))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("order", AttributeType::Number)
                    .description("Priority, starting at 1; the current priority is kept when unset")
                    .optional()
                    .computed()
                    .plan_modifier(UseStateForUnknown)
                    .validator(IntBetween::new(1, i64::MAX))
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

        let (Some(acl_uuid), Some(direction)) = (
            get_string(&planned, "acl_uuid"),
            get_string(&planned, "direction"),
        ) else {
            return CreateResourceResponse {
                new_state: planned,
                private: vec![],
                diagnostics: vec![Diagnostic::error(
                    "Missing acl_uuid or direction",
                    "Both acl_uuid and direction are required",
                )],
            };
        };

        if let Some(order) = get_number(&planned, "order") {
            if let Err(e) = self
                .set_order(&ctx, client, &acl_uuid, &direction, order as i64)
                .await
            {
                return CreateResourceResponse {
                    new_state: planned,
                    private: vec![],
                    diagnostics: vec![api_error("Failed to set control policy order", &e)],
                };
            }
        }

        match self
            .read_state(&ctx, client, &acl_uuid, &direction, planned.clone())
            .await
        {
            Ok(Some(new_state)) => CreateResourceResponse {
                new_state,
                private: vec![],
                diagnostics: vec![],
            },
            Ok(None) => CreateResourceResponse {
                new_state: planned,
                private: vec![],
                diagnostics: vec![Diagnostic::error(
                    "Control policy not found",
                    format!(
                        "No {} control policy with AclUuid {} exists",
                        direction, acl_uuid
                    ),
                )],
            },
            Err(e) => CreateResourceResponse {
                new_state: planned,
                private: vec![],
                diagnostics: vec![api_error("Failed to read control policy", &e)],
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
        let id = get_string(&request.current_state, "id").unwrap_or_default();
        let Some((acl_uuid, direction)) = split_id(&id) else {
            return ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![Diagnostic::error(
                    "Invalid ID",
                    format!("Expected <acl_uuid>:<direction>, got '{}'", id),
                )],
                private: request.private,
                deferred: None,
            };
        };

        let (new_state, diagnostics) = match self
            .read_state(
                &ctx,
                &data.client,
                acl_uuid,
                direction,
                request.current_state.clone(),
            )
            .await
        {
            Ok(Some(state)) => (Some(state), vec![]),
            Ok(None) => {
                tracing::warn!(id = %id, "control policy not found, removing from state");
                (None, vec![])
            }
            Err(e) => (
                Some(request.current_state),
                vec![api_error("Failed to read control policy", &e)],
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
        let Some((acl_uuid, direction)) = split_id(&id) else {
            return UpdateResourceResponse {
                new_state: planned,
                private: vec![],
                diagnostics: vec![Diagnostic::error(
                    "Invalid ID",
                    format!("Expected <acl_uuid>:<direction>, got '{}'", id),
                )],
            };
        };

        if changed(prior, &planned, "order") {
            if let Some(order) = get_number(&planned, "order") {
                if let Err(e) = self
                    .set_order(&ctx, client, acl_uuid, direction, order as i64)
                    .await
                {
                    return UpdateResourceResponse {
                        new_state: request.prior_state,
                        private: vec![],
                        diagnostics: vec![api_error("Failed to update control policy order", &e)],
                    };
                }
            }
        }

        match self
            .read_state(&ctx, client, acl_uuid, direction, planned.clone())
            .await
        {
            Ok(Some(new_state)) => UpdateResourceResponse {
                new_state,
                private: vec![],
                diagnostics: vec![],
            },
            Ok(None) => UpdateResourceResponse {
                new_state: planned,
                private: vec![],
                diagnostics: vec![Diagnostic::error(
                    "Control policy not found",
                    format!("Control policy {} no longer exists", id),
                )],
            },
            Err(e) => UpdateResourceResponse {
                new_state: planned,
                private: vec![],
                diagnostics: vec![api_error("Failed to read control policy", &e)],
            },
        }
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        tracing::info!(
            id = ?get_string(&request.prior_state, "id"),
            "control policy order removed from state, the policy keeps its priority"
        );
        DeleteResourceResponse {
            diagnostics: vec![],
        }
    }
}

#[async_trait]
impl ResourceWithConfigure for ControlPolicyOrderResource {
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
impl ResourceWithImportState for ControlPolicyOrderResource {
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
        if split_id(&request.id).is_none() {
            response.diagnostics.push(Diagnostic::error(
                "Invalid import ID",
                format!("Expected <acl_uuid>:<direction>, got '{}'", request.id),
            ));
            return response;
        }
        tfplug::import_state_passthrough_id(&ctx, AttributePath::new("id"), &request, &mut response);
        response
    }
}

#[cfg(test)]
#[path = "./resource_control_policy_order_test.rs"]
mod resource_control_policy_order_test;

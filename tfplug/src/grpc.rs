//! gRPC service implementation for the Terraform Plugin Protocol 6
//!
//! `GrpcProviderServer` adapts a [`Provider`] to the generated tonic service.
//! Every RPC that touches a resource or data source creates a fresh instance
//! from the provider's factories, so no per-resource locks are held.
//!
//! Planning is done here rather than in resources:
//! 1. defaults are applied to attributes that are null in configuration
//! 2. computed attributes left null by configuration become unknown on create,
//!    and on update when anything changed
//! 3. schema plan modifiers run, collecting requires_replace paths

use crate::context::Context;
use crate::data_source::{
    ConfigureDataSourceRequest, DataSourceSchemaRequest, DataSourceWithConfigure,
    ReadDataSourceRequest, ValidateDataSourceConfigRequest,
};
use crate::error::TfplugError;
use crate::proto;
use crate::provider::{
    ConfigureProviderRequest, DataSourceFactory, Provider, ProviderMetaSchemaRequest,
    ProviderMetadataRequest, ProviderSchemaRequest, ResourceFactory, StopProviderRequest,
    ValidateProviderConfigRequest,
};
use crate::resource::{
    ConfigureResourceRequest, CreateResourceRequest, DeleteResourceRequest,
    ImportResourceStateRequest, ReadResourceRequest, ResourceSchemaRequest,
    ResourceWithConfigure, UpdateResourceRequest, ValidateResourceConfigRequest,
};
use crate::schema::{
    Block, DefaultRequest, NestedBlock, NestingMode, PlanModifierRequest, Schema, StringKind,
    ValidatorRequest,
};
use crate::types::{
    has_errors, values_equal, AttributePath, AttributePathStep, ClientCapabilities, Deferred,
    DeferredReason, Diagnostic, DiagnosticSeverity, Dynamic, DynamicValue, ServerCapabilities,
};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tonic::{Request, Response, Status};

type ProviderData = Option<Arc<dyn Any + Send + Sync>>;

pub struct GrpcProviderServer<P: Provider> {
    provider: Arc<RwLock<P>>,
    resources: HashMap<String, ResourceFactory>,
    data_sources: HashMap<String, DataSourceFactory>,
    provider_data: RwLock<ProviderData>,
    root: Context,
}

impl<P: Provider + 'static> GrpcProviderServer<P> {
    pub fn new(provider: P) -> Self {
        let resources = provider.resources();
        let data_sources = provider.data_sources();

        Self {
            provider: Arc::new(RwLock::new(provider)),
            resources,
            data_sources,
            provider_data: RwLock::new(None),
            root: Context::new(),
        }
    }

    /// Cancelled by StopProvider; every RPC context derives from it
    pub fn root_context(&self) -> Context {
        self.root.clone()
    }

    fn request_context(&self, rpc: &'static str) -> Context {
        self.root.with_value("rpc", rpc)
    }

    #[allow(clippy::result_large_err)]
    fn new_resource(&self, type_name: &str) -> Result<Box<dyn ResourceWithConfigure>, Status> {
        let factory = self
            .resources
            .get(type_name)
            .ok_or_else(|| TfplugError::ResourceNotFound(type_name.to_string()))?;
        Ok(factory())
    }

    #[allow(clippy::result_large_err)]
    fn new_data_source(&self, type_name: &str) -> Result<Box<dyn DataSourceWithConfigure>, Status> {
        let factory = self
            .data_sources
            .get(type_name)
            .ok_or_else(|| TfplugError::DataSourceNotFound(type_name.to_string()))?;
        Ok(factory())
    }

    async fn configured_resource(
        &self,
        ctx: &Context,
        type_name: &str,
    ) -> Result<(Box<dyn ResourceWithConfigure>, Vec<Diagnostic>), Status> {
        let mut resource = self.new_resource(type_name)?;
        let provider_data = self.provider_data.read().await.clone();
        let response = resource
            .configure(ctx.clone(), ConfigureResourceRequest { provider_data })
            .await;
        Ok((resource, response.diagnostics))
    }

    async fn configured_data_source(
        &self,
        ctx: &Context,
        type_name: &str,
    ) -> Result<(Box<dyn DataSourceWithConfigure>, Vec<Diagnostic>), Status> {
        let mut data_source = self.new_data_source(type_name)?;
        let provider_data = self.provider_data.read().await.clone();
        let response = data_source
            .configure(ctx.clone(), ConfigureDataSourceRequest { provider_data })
            .await;
        Ok((data_source, response.diagnostics))
    }

    async fn resource_schema(
        &self,
        ctx: &Context,
        resource: &dyn ResourceWithConfigure,
    ) -> Schema {
        resource.schema(ctx.clone(), ResourceSchemaRequest).await.schema
    }
}

#[tonic::async_trait]
impl<P: Provider + 'static> proto::ProviderService for GrpcProviderServer<P> {
    async fn get_metadata(
        &self,
        _request: Request<proto::get_metadata::Request>,
    ) -> Result<Response<proto::get_metadata::Response>, Status> {
        let ctx = self.request_context("GetMetadata");
        let provider = self.provider.read().await;
        let metadata = provider.metadata(ctx, ProviderMetadataRequest).await;

        let mut resources: Vec<_> = self.resources.keys().cloned().collect();
        resources.sort();
        let mut data_sources: Vec<_> = self.data_sources.keys().cloned().collect();
        data_sources.sort();

        Ok(Response::new(proto::get_metadata::Response {
            server_capabilities: Some(server_capabilities_to_proto(&metadata.server_capabilities)),
            diagnostics: vec![],
            data_sources: data_sources
                .into_iter()
                .map(|type_name| proto::get_metadata::DataSourceMetadata { type_name })
                .collect(),
            resources: resources
                .into_iter()
                .map(|type_name| proto::get_metadata::ResourceMetadata { type_name })
                .collect(),
        }))
    }

    async fn get_provider_schema(
        &self,
        _request: Request<proto::get_provider_schema::Request>,
    ) -> Result<Response<proto::get_provider_schema::Response>, Status> {
        let ctx = self.request_context("GetProviderSchema");
        let provider = self.provider.read().await;

        let mut diagnostics = Vec::new();

        let provider_schema = provider.schema(ctx.clone(), ProviderSchemaRequest).await;
        diagnostics.extend(provider_schema.diagnostics);

        let meta_schema = provider
            .meta_schema(ctx.clone(), ProviderMetaSchemaRequest)
            .await;
        diagnostics.extend(meta_schema.diagnostics);

        let metadata = provider
            .metadata(ctx.clone(), ProviderMetadataRequest)
            .await;

        let mut resource_schemas = HashMap::new();
        for (type_name, factory) in &self.resources {
            let response = factory().schema(ctx.clone(), ResourceSchemaRequest).await;
            diagnostics.extend(response.diagnostics);
            resource_schemas.insert(type_name.clone(), schema_to_proto(&response.schema));
        }

        let mut data_source_schemas = HashMap::new();
        for (type_name, factory) in &self.data_sources {
            let response = factory().schema(ctx.clone(), DataSourceSchemaRequest).await;
            diagnostics.extend(response.diagnostics);
            data_source_schemas.insert(type_name.clone(), schema_to_proto(&response.schema));
        }

        tracing::debug!(
            resources = resource_schemas.len(),
            data_sources = data_source_schemas.len(),
            "serving provider schema"
        );

        Ok(Response::new(proto::get_provider_schema::Response {
            provider: Some(schema_to_proto(&provider_schema.schema)),
            resource_schemas,
            data_source_schemas,
            diagnostics: diagnostics_to_proto(diagnostics),
            provider_meta: meta_schema.schema.as_ref().map(schema_to_proto),
            server_capabilities: Some(server_capabilities_to_proto(&metadata.server_capabilities)),
        }))
    }

    async fn validate_provider_config(
        &self,
        request: Request<proto::validate_provider_config::Request>,
    ) -> Result<Response<proto::validate_provider_config::Response>, Status> {
        let ctx = self.request_context("ValidateProviderConfig");
        let req = request.into_inner();
        let config = decode_dynamic_value(&req.config)?;

        let provider = self.provider.read().await;
        let schema = provider
            .schema(ctx.clone(), ProviderSchemaRequest)
            .await
            .schema;

        let mut diagnostics = Vec::new();
        validate_block(
            &schema.block,
            &config.value,
            AttributePath::root(),
            &mut diagnostics,
        );
        diagnostics.extend(
            provider
                .validate(ctx, ValidateProviderConfigRequest { config })
                .await
                .diagnostics,
        );

        Ok(Response::new(proto::validate_provider_config::Response {
            diagnostics: diagnostics_to_proto(diagnostics),
        }))
    }

    async fn validate_resource_config(
        &self,
        request: Request<proto::validate_resource_config::Request>,
    ) -> Result<Response<proto::validate_resource_config::Response>, Status> {
        let ctx = self.request_context("ValidateResourceConfig");
        let req = request.into_inner();
        let config = decode_dynamic_value(&req.config)?;

        let resource = self.new_resource(&req.type_name)?;
        let schema = self.resource_schema(&ctx, resource.as_ref()).await;

        let mut diagnostics = Vec::new();
        validate_block(
            &schema.block,
            &config.value,
            AttributePath::root(),
            &mut diagnostics,
        );
        diagnostics.extend(
            resource
                .validate(
                    ctx,
                    ValidateResourceConfigRequest {
                        type_name: req.type_name,
                        config,
                        client_capabilities: client_capabilities_from_proto(
                            req.client_capabilities,
                        ),
                    },
                )
                .await
                .diagnostics,
        );

        Ok(Response::new(proto::validate_resource_config::Response {
            diagnostics: diagnostics_to_proto(diagnostics),
        }))
    }

    async fn validate_data_resource_config(
        &self,
        request: Request<proto::validate_data_resource_config::Request>,
    ) -> Result<Response<proto::validate_data_resource_config::Response>, Status> {
        let ctx = self.request_context("ValidateDataResourceConfig");
        let req = request.into_inner();
        let config = decode_dynamic_value(&req.config)?;

        let data_source = self.new_data_source(&req.type_name)?;
        let schema = data_source
            .schema(ctx.clone(), DataSourceSchemaRequest)
            .await
            .schema;

        let mut diagnostics = Vec::new();
        validate_block(
            &schema.block,
            &config.value,
            AttributePath::root(),
            &mut diagnostics,
        );
        diagnostics.extend(
            data_source
                .validate(
                    ctx,
                    ValidateDataSourceConfigRequest {
                        type_name: req.type_name,
                        config,
                    },
                )
                .await
                .diagnostics,
        );

        Ok(Response::new(proto::validate_data_resource_config::Response {
            diagnostics: diagnostics_to_proto(diagnostics),
        }))
    }

    async fn upgrade_resource_state(
        &self,
        request: Request<proto::upgrade_resource_state::Request>,
    ) -> Result<Response<proto::upgrade_resource_state::Response>, Status> {
        let ctx = self.request_context("UpgradeResourceState");
        let req = request.into_inner();

        let resource = self.new_resource(&req.type_name)?;
        let schema = self.resource_schema(&ctx, resource.as_ref()).await;

        let raw = req.raw_state.unwrap_or_default();
        if raw.json.is_empty() {
            let diagnostics = if raw.flatmap.is_empty() {
                vec![]
            } else {
                vec![Diagnostic::error(
                    "Unsupported state format",
                    format!(
                        "{} state is stored in the legacy flatmap format, which this provider cannot read",
                        req.type_name
                    ),
                )]
            };
            return Ok(Response::new(proto::upgrade_resource_state::Response {
                upgraded_state: None,
                diagnostics: diagnostics_to_proto(diagnostics),
            }));
        }

        let state = DynamicValue::decode_json(&raw.json)?;
        if req.version > schema.version {
            tracing::warn!(
                type_name = %req.type_name,
                stored = req.version,
                current = schema.version,
                "state was written by a newer schema version"
            );
        }

        let upgraded = DynamicValue::new(conform_to_block(state.value, &schema.block));

        Ok(Response::new(proto::upgrade_resource_state::Response {
            upgraded_state: Some(encode_dynamic_value(&upgraded)?),
            diagnostics: vec![],
        }))
    }

    async fn configure_provider(
        &self,
        request: Request<proto::configure_provider::Request>,
    ) -> Result<Response<proto::configure_provider::Response>, Status> {
        let ctx = self.request_context("ConfigureProvider");
        let req = request.into_inner();
        let config = decode_dynamic_value(&req.config)?;

        tracing::info!(terraform_version = %req.terraform_version, "configuring provider");

        let response = {
            let mut provider = self.provider.write().await;
            provider
                .configure(
                    ctx,
                    ConfigureProviderRequest {
                        terraform_version: req.terraform_version,
                        config,
                        client_capabilities: client_capabilities_from_proto(
                            req.client_capabilities,
                        ),
                    },
                )
                .await
        };

        if !has_errors(&response.diagnostics) {
            *self.provider_data.write().await = response.provider_data;
        }

        Ok(Response::new(proto::configure_provider::Response {
            diagnostics: diagnostics_to_proto(response.diagnostics),
        }))
    }

    async fn read_resource(
        &self,
        request: Request<proto::read_resource::Request>,
    ) -> Result<Response<proto::read_resource::Response>, Status> {
        let ctx = self.request_context("ReadResource");
        let req = request.into_inner();
        let current_state = decode_dynamic_value(&req.current_state)?;

        if current_state.is_null() {
            return Ok(Response::new(proto::read_resource::Response {
                new_state: Some(encode_dynamic_value(&current_state)?),
                diagnostics: vec![],
                private: req.private,
                deferred: None,
            }));
        }

        let (resource, mut diagnostics) = self.configured_resource(&ctx, &req.type_name).await?;
        if has_errors(&diagnostics) {
            return Ok(Response::new(proto::read_resource::Response {
                new_state: req.current_state,
                diagnostics: diagnostics_to_proto(diagnostics),
                private: req.private,
                deferred: None,
            }));
        }

        let schema = self.resource_schema(&ctx, resource.as_ref()).await;
        let response = resource
            .read(
                ctx,
                ReadResourceRequest {
                    type_name: req.type_name.clone(),
                    current_state,
                    private: req.private,
                    provider_meta: decode_optional(&req.provider_meta)?,
                    client_capabilities: client_capabilities_from_proto(req.client_capabilities),
                },
            )
            .await;
        diagnostics.extend(response.diagnostics);

        let new_state = match response.new_state {
            Some(state) => DynamicValue::new(conform_to_block(
                strip_unknowns(state.value),
                &schema.block,
            )),
            None => {
                tracing::debug!(type_name = %req.type_name, "resource is gone, removing from state");
                DynamicValue::null()
            }
        };

        Ok(Response::new(proto::read_resource::Response {
            new_state: Some(encode_dynamic_value(&new_state)?),
            diagnostics: diagnostics_to_proto(diagnostics),
            private: response.private,
            deferred: response.deferred.as_ref().map(deferred_to_proto),
        }))
    }

    async fn plan_resource_change(
        &self,
        request: Request<proto::plan_resource_change::Request>,
    ) -> Result<Response<proto::plan_resource_change::Response>, Status> {
        let ctx = self.request_context("PlanResourceChange");
        let req = request.into_inner();

        let prior_state = decode_dynamic_value(&req.prior_state)?;
        let proposed_new_state = decode_dynamic_value(&req.proposed_new_state)?;
        let config = decode_dynamic_value(&req.config)?;

        // destroy plans carry no new state
        if proposed_new_state.is_null() {
            return Ok(Response::new(proto::plan_resource_change::Response {
                planned_state: req.proposed_new_state,
                requires_replace: vec![],
                planned_private: req.prior_private,
                diagnostics: vec![],
                legacy_type_system: false,
                deferred: None,
            }));
        }

        let resource = self.new_resource(&req.type_name)?;
        let schema = self.resource_schema(&ctx, resource.as_ref()).await;

        let plan = plan_resource_change(
            &schema,
            &prior_state.value,
            &config.value,
            proposed_new_state.value,
        );

        tracing::debug!(
            type_name = %req.type_name,
            requires_replace = plan.requires_replace.len(),
            "planned resource change"
        );

        Ok(Response::new(proto::plan_resource_change::Response {
            planned_state: Some(encode_dynamic_value(&DynamicValue::new(plan.planned))?),
            requires_replace: plan
                .requires_replace
                .into_iter()
                .map(attribute_path_to_proto)
                .collect(),
            planned_private: req.prior_private,
            diagnostics: diagnostics_to_proto(plan.diagnostics),
            legacy_type_system: false,
            deferred: None,
        }))
    }

    async fn apply_resource_change(
        &self,
        request: Request<proto::apply_resource_change::Request>,
    ) -> Result<Response<proto::apply_resource_change::Response>, Status> {
        let ctx = self.request_context("ApplyResourceChange");
        let req = request.into_inner();

        let prior_state = decode_dynamic_value(&req.prior_state)?;
        let planned_state = decode_dynamic_value(&req.planned_state)?;
        let config = decode_dynamic_value(&req.config)?;
        let provider_meta = decode_optional(&req.provider_meta)?;

        let (resource, mut diagnostics) = self.configured_resource(&ctx, &req.type_name).await?;
        if has_errors(&diagnostics) {
            return Ok(Response::new(proto::apply_resource_change::Response {
                new_state: req.prior_state,
                private: req.planned_private,
                diagnostics: diagnostics_to_proto(diagnostics),
                legacy_type_system: false,
            }));
        }
        let schema = self.resource_schema(&ctx, resource.as_ref()).await;

        let (new_state, private) = if planned_state.is_null() {
            tracing::info!(type_name = %req.type_name, "deleting resource");
            let response = resource
                .delete(
                    ctx,
                    DeleteResourceRequest {
                        type_name: req.type_name.clone(),
                        prior_state: prior_state.clone(),
                        planned_private: req.planned_private.clone(),
                        provider_meta,
                    },
                )
                .await;
            diagnostics.extend(response.diagnostics);
            if has_errors(&diagnostics) {
                (prior_state, req.planned_private)
            } else {
                (DynamicValue::null(), vec![])
            }
        } else if prior_state.is_null() {
            tracing::info!(type_name = %req.type_name, "creating resource");
            let response = resource
                .create(
                    ctx,
                    CreateResourceRequest {
                        type_name: req.type_name.clone(),
                        planned_state,
                        config,
                        planned_private: req.planned_private,
                        provider_meta,
                    },
                )
                .await;
            diagnostics.extend(response.diagnostics);
            let state = strip_unknowns(response.new_state.value);
            // a failed create is only kept (as tainted) once an id exists
            let keep = !has_errors(&diagnostics) || has_known_id(&state);
            if keep {
                (
                    DynamicValue::new(conform_to_block(state, &schema.block)),
                    response.private,
                )
            } else {
                (DynamicValue::null(), vec![])
            }
        } else {
            tracing::info!(type_name = %req.type_name, "updating resource");
            let response = resource
                .update(
                    ctx,
                    UpdateResourceRequest {
                        type_name: req.type_name.clone(),
                        prior_state,
                        planned_state,
                        config,
                        planned_private: req.planned_private,
                        provider_meta,
                    },
                )
                .await;
            diagnostics.extend(response.diagnostics);
            (
                DynamicValue::new(conform_to_block(
                    strip_unknowns(response.new_state.value),
                    &schema.block,
                )),
                response.private,
            )
        };

        Ok(Response::new(proto::apply_resource_change::Response {
            new_state: Some(encode_dynamic_value(&new_state)?),
            private,
            diagnostics: diagnostics_to_proto(diagnostics),
            legacy_type_system: false,
        }))
    }

    async fn import_resource_state(
        &self,
        request: Request<proto::import_resource_state::Request>,
    ) -> Result<Response<proto::import_resource_state::Response>, Status> {
        let ctx = self.request_context("ImportResourceState");
        let req = request.into_inner();

        let (resource, mut diagnostics) = self.configured_resource(&ctx, &req.type_name).await?;
        let schema = self.resource_schema(&ctx, resource.as_ref()).await;

        let Some(importer) = resource.as_import_state() else {
            diagnostics.push(Diagnostic::error(
                "Resource Import Not Implemented",
                format!("{} does not support import", req.type_name),
            ));
            return Ok(Response::new(proto::import_resource_state::Response {
                imported_resources: vec![],
                diagnostics: diagnostics_to_proto(diagnostics),
                deferred: None,
            }));
        };

        tracing::info!(type_name = %req.type_name, id = %req.id, "importing resource");

        let response = importer
            .import_state(
                ctx,
                ImportResourceStateRequest {
                    type_name: req.type_name,
                    id: req.id,
                    client_capabilities: client_capabilities_from_proto(req.client_capabilities),
                },
            )
            .await;
        diagnostics.extend(response.diagnostics);

        let mut imported_resources = Vec::with_capacity(response.imported_resources.len());
        for imported in response.imported_resources {
            let state = DynamicValue::new(conform_to_block(imported.state.value, &schema.block));
            imported_resources.push(proto::import_resource_state::ImportedResource {
                type_name: imported.type_name,
                state: Some(encode_dynamic_value(&state)?),
                private: imported.private,
            });
        }

        Ok(Response::new(proto::import_resource_state::Response {
            imported_resources,
            diagnostics: diagnostics_to_proto(diagnostics),
            deferred: response.deferred.as_ref().map(deferred_to_proto),
        }))
    }

    async fn read_data_source(
        &self,
        request: Request<proto::read_data_source::Request>,
    ) -> Result<Response<proto::read_data_source::Response>, Status> {
        let ctx = self.request_context("ReadDataSource");
        let req = request.into_inner();
        let config = decode_dynamic_value(&req.config)?;

        let (data_source, mut diagnostics) =
            self.configured_data_source(&ctx, &req.type_name).await?;
        if has_errors(&diagnostics) {
            return Ok(Response::new(proto::read_data_source::Response {
                state: None,
                diagnostics: diagnostics_to_proto(diagnostics),
                deferred: None,
            }));
        }

        let schema = data_source
            .schema(ctx.clone(), DataSourceSchemaRequest)
            .await
            .schema;

        let response = data_source
            .read(
                ctx,
                ReadDataSourceRequest {
                    type_name: req.type_name,
                    config,
                    provider_meta: decode_optional(&req.provider_meta)?,
                    client_capabilities: client_capabilities_from_proto(req.client_capabilities),
                },
            )
            .await;
        diagnostics.extend(response.diagnostics);

        let state = DynamicValue::new(conform_to_block(
            strip_unknowns(response.state.value),
            &schema.block,
        ));

        Ok(Response::new(proto::read_data_source::Response {
            state: Some(encode_dynamic_value(&state)?),
            diagnostics: diagnostics_to_proto(diagnostics),
            deferred: response.deferred.as_ref().map(deferred_to_proto),
        }))
    }

    async fn stop_provider(
        &self,
        _request: Request<proto::stop_provider::Request>,
    ) -> Result<Response<proto::stop_provider::Response>, Status> {
        tracing::info!("stop requested, cancelling in-flight operations");
        self.root.cancel();

        let provider = self.provider.read().await;
        let response = provider.stop(Context::new(), StopProviderRequest).await;

        Ok(Response::new(proto::stop_provider::Response {
            error: response.error.unwrap_or_default(),
        }))
    }
}

/// Result of framework planning for one resource
pub struct PlannedChange {
    pub planned: Dynamic,
    pub requires_replace: Vec<AttributePath>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Plan top-level attributes; nested blocks are planned as proposed
pub fn plan_resource_change(
    schema: &Schema,
    prior: &Dynamic,
    config: &Dynamic,
    proposed: Dynamic,
) -> PlannedChange {
    let is_create = prior.is_null();
    let has_change = is_create || !values_equal(prior, &proposed);

    let mut requires_replace = Vec::new();
    let mut diagnostics = Vec::new();

    let mut planned = match conform_to_block(proposed, &schema.block) {
        Dynamic::Map(attrs) => attrs,
        other => {
            return PlannedChange {
                planned: other,
                requires_replace,
                diagnostics,
            }
        }
    };

    for attr in &schema.block.attributes {
        let path = AttributePath::new(&attr.name);
        let config_value = field(config, &attr.name);
        let prior_value = field(prior, &attr.name);
        let mut plan_value = planned.remove(&attr.name).unwrap_or(Dynamic::Null);

        if config_value.is_null() {
            if let Some(default) = &attr.default {
                plan_value = default
                    .default_value(DefaultRequest { path: path.clone() })
                    .value
                    .value;
            } else if attr.computed && has_change {
                plan_value = Dynamic::Unknown;
            }
        }

        for modifier in &attr.plan_modifiers {
            let response = modifier.modify(PlanModifierRequest {
                config_value: DynamicValue::new(config_value.clone()),
                state_value: DynamicValue::new(prior_value.clone()),
                plan_value: DynamicValue::new(plan_value),
                path: path.clone(),
            });
            plan_value = response.plan_value.value;
            diagnostics.extend(response.diagnostics);
            if response.requires_replace && !is_create && !requires_replace.contains(&path) {
                requires_replace.push(path.clone());
            }
        }

        planned.insert(attr.name.clone(), plan_value);
    }

    PlannedChange {
        planned: Dynamic::Map(planned),
        requires_replace,
        diagnostics,
    }
}

fn field(value: &Dynamic, name: &str) -> Dynamic {
    value
        .as_map()
        .and_then(|m| m.get(name))
        .cloned()
        .unwrap_or(Dynamic::Null)
}

fn has_known_id(state: &Dynamic) -> bool {
    matches!(field(state, "id"), Dynamic::String(ref id) if !id.is_empty())
}

/// Shape a value to exactly the attributes and blocks of `block`: missing
/// attributes become null, missing list/set blocks become empty, and keys
/// the schema does not know are dropped
pub fn conform_to_block(value: Dynamic, block: &Block) -> Dynamic {
    let mut attrs = match value {
        Dynamic::Map(m) => m,
        other => return other,
    };

    let mut out = HashMap::with_capacity(block.attributes.len() + block.block_types.len());
    for attr in &block.attributes {
        out.insert(
            attr.name.clone(),
            attrs.remove(&attr.name).unwrap_or(Dynamic::Null),
        );
    }
    for nested in &block.block_types {
        let value = attrs.remove(&nested.type_name).unwrap_or(Dynamic::Null);
        out.insert(nested.type_name.clone(), conform_nested(value, nested));
    }

    Dynamic::Map(out)
}

fn conform_nested(value: Dynamic, nested: &NestedBlock) -> Dynamic {
    match nested.nesting {
        NestingMode::List | NestingMode::Set => match value {
            Dynamic::List(items) => Dynamic::List(
                items
                    .into_iter()
                    .map(|item| conform_to_block(item, &nested.block))
                    .collect(),
            ),
            Dynamic::Unknown => Dynamic::Unknown,
            _ => Dynamic::List(vec![]),
        },
        NestingMode::Map => match value {
            Dynamic::Map(items) => Dynamic::Map(
                items
                    .into_iter()
                    .map(|(k, v)| (k, conform_to_block(v, &nested.block)))
                    .collect(),
            ),
            Dynamic::Unknown => Dynamic::Unknown,
            _ => Dynamic::Map(HashMap::new()),
        },
        NestingMode::Single | NestingMode::Group | NestingMode::Invalid => {
            conform_to_block(value, &nested.block)
        }
    }
}

/// Replace unknown values with null; state must never contain unknowns
pub fn strip_unknowns(value: Dynamic) -> Dynamic {
    match value {
        Dynamic::Unknown => Dynamic::Null,
        Dynamic::List(items) => Dynamic::List(items.into_iter().map(strip_unknowns).collect()),
        Dynamic::Map(items) => Dynamic::Map(
            items
                .into_iter()
                .map(|(k, v)| (k, strip_unknowns(v)))
                .collect(),
        ),
        other => other,
    }
}

/// Run schema validators and type checks over a configuration value
pub fn validate_block(
    block: &Block,
    value: &Dynamic,
    path: AttributePath,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let Dynamic::Map(attrs) = value else {
        return;
    };

    for attr in &block.attributes {
        let Some(attr_value) = attrs.get(&attr.name) else {
            continue;
        };
        if attr_value.is_null() || attr_value.contains_unknown() {
            continue;
        }

        let attr_path = path.clone().attribute(&attr.name);
        if !attr.r#type.accepts(attr_value) {
            diagnostics.push(
                Diagnostic::error(
                    "Incorrect attribute value type",
                    format!(
                        "Inappropriate value for attribute \"{}\": got {}",
                        attr.name,
                        attr_value.type_name()
                    ),
                )
                .with_attribute(attr_path),
            );
            continue;
        }

        for validator in &attr.validators {
            let response = validator.validate(ValidatorRequest {
                config_value: DynamicValue::new(attr_value.clone()),
                path: attr_path.clone(),
            });
            diagnostics.extend(response.diagnostics);
        }
    }

    for nested in &block.block_types {
        let nested_path = path.clone().attribute(&nested.type_name);
        match (nested.nesting, attrs.get(&nested.type_name)) {
            (NestingMode::List | NestingMode::Set, Some(Dynamic::List(items))) => {
                let count = items.len() as i64;
                if nested.max_items > 0 && count > nested.max_items {
                    diagnostics.push(
                        Diagnostic::error(
                            format!("Too many {} blocks", nested.type_name),
                            format!(
                                "No more than {} \"{}\" blocks are allowed",
                                nested.max_items, nested.type_name
                            ),
                        )
                        .with_attribute(nested_path.clone()),
                    );
                }
                if count < nested.min_items {
                    diagnostics.push(
                        Diagnostic::error(
                            format!("Insufficient {} blocks", nested.type_name),
                            format!(
                                "At least {} \"{}\" blocks are required",
                                nested.min_items, nested.type_name
                            ),
                        )
                        .with_attribute(nested_path.clone()),
                    );
                }
                for (idx, item) in items.iter().enumerate() {
                    let item_path = if nested.nesting == NestingMode::List {
                        nested_path.clone().index(idx as i64)
                    } else {
                        nested_path.clone()
                    };
                    validate_block(&nested.block, item, item_path, diagnostics);
                }
            }
            (NestingMode::Single | NestingMode::Group, Some(item)) => {
                validate_block(&nested.block, item, nested_path, diagnostics);
            }
            _ => {}
        }
    }
}

#[allow(clippy::result_large_err)]
fn decode_dynamic_value(value: &Option<proto::DynamicValue>) -> Result<DynamicValue, Status> {
    let Some(value) = value else {
        return Ok(DynamicValue::null());
    };

    let decoded = if !value.msgpack.is_empty() {
        DynamicValue::decode_msgpack(&value.msgpack)?
    } else {
        DynamicValue::decode_json(&value.json)?
    };
    Ok(decoded)
}

#[allow(clippy::result_large_err)]
fn decode_optional(
    value: &Option<proto::DynamicValue>,
) -> Result<Option<DynamicValue>, Status> {
    match value {
        Some(_) => Ok(Some(decode_dynamic_value(value)?).filter(|v| !v.is_null())),
        None => Ok(None),
    }
}

#[allow(clippy::result_large_err)]
fn encode_dynamic_value(value: &DynamicValue) -> Result<proto::DynamicValue, Status> {
    Ok(proto::DynamicValue {
        msgpack: value.encode_msgpack()?,
        json: vec![],
    })
}

fn schema_to_proto(schema: &Schema) -> proto::Schema {
    proto::Schema {
        version: schema.version,
        block: Some(block_to_proto(&schema.block)),
    }
}

fn block_to_proto(block: &Block) -> proto::schema::Block {
    proto::schema::Block {
        version: block.version,
        attributes: block
            .attributes
            .iter()
            .map(|attr| proto::schema::Attribute {
                name: attr.name.clone(),
                r#type: attr.r#type.to_json_bytes(),
                description: attr.description.clone(),
                required: attr.required,
                optional: attr.optional,
                computed: attr.computed,
                sensitive: attr.sensitive,
                description_kind: proto::StringKind::Plain as i32,
                deprecated: attr.deprecated,
                write_only: false,
            })
            .collect(),
        block_types: block
            .block_types
            .iter()
            .map(|nested| proto::schema::NestedBlock {
                type_name: nested.type_name.clone(),
                block: Some(block_to_proto(&nested.block)),
                nesting: nesting_to_proto(nested.nesting) as i32,
                min_items: nested.min_items,
                max_items: nested.max_items,
            })
            .collect(),
        description: block.description.clone(),
        description_kind: match block.description_kind {
            StringKind::Plain => proto::StringKind::Plain as i32,
            StringKind::Markdown => proto::StringKind::Markdown as i32,
        },
        deprecated: block.deprecated,
    }
}

fn nesting_to_proto(nesting: NestingMode) -> proto::schema::nested_block::NestingMode {
    use proto::schema::nested_block::NestingMode as Proto;
    match nesting {
        NestingMode::Invalid => Proto::Invalid,
        NestingMode::Single => Proto::Single,
        NestingMode::List => Proto::List,
        NestingMode::Set => Proto::Set,
        NestingMode::Map => Proto::Map,
        NestingMode::Group => Proto::Group,
    }
}

fn diagnostics_to_proto(diagnostics: Vec<Diagnostic>) -> Vec<proto::Diagnostic> {
    diagnostics
        .into_iter()
        .map(|d| proto::Diagnostic {
            severity: match d.severity {
                DiagnosticSeverity::Invalid => proto::diagnostic::Severity::Invalid as i32,
                DiagnosticSeverity::Error => proto::diagnostic::Severity::Error as i32,
                DiagnosticSeverity::Warning => proto::diagnostic::Severity::Warning as i32,
            },
            summary: d.summary,
            detail: d.detail,
            attribute: d.attribute.map(attribute_path_to_proto),
        })
        .collect()
}

fn attribute_path_to_proto(path: AttributePath) -> proto::AttributePath {
    use proto::attribute_path::step::Selector;

    proto::AttributePath {
        steps: path
            .steps
            .into_iter()
            .map(|step| proto::attribute_path::Step {
                selector: Some(match step {
                    AttributePathStep::AttributeName(name) => Selector::AttributeName(name),
                    AttributePathStep::ElementKeyString(key) => Selector::ElementKeyString(key),
                    AttributePathStep::ElementKeyInt(idx) => Selector::ElementKeyInt(idx),
                }),
            })
            .collect(),
    }
}

fn server_capabilities_to_proto(capabilities: &ServerCapabilities) -> proto::ServerCapabilities {
    proto::ServerCapabilities {
        plan_destroy: capabilities.plan_destroy,
        get_provider_schema_optional: capabilities.get_provider_schema_optional,
        move_resource_state: capabilities.move_resource_state,
    }
}

fn client_capabilities_from_proto(
    capabilities: Option<proto::ClientCapabilities>,
) -> ClientCapabilities {
    capabilities
        .map(|c| ClientCapabilities {
            deferral_allowed: c.deferral_allowed,
            write_only_attributes_allowed: c.write_only_attributes_allowed,
        })
        .unwrap_or_default()
}

fn deferred_to_proto(deferred: &Deferred) -> proto::Deferred {
    use proto::deferred::Reason;

    let reason = match deferred.reason {
        DeferredReason::Unknown => Reason::Unknown,
        DeferredReason::ResourceConfigUnknown => Reason::ResourceConfigUnknown,
        DeferredReason::ProviderConfigUnknown => Reason::ProviderConfigUnknown,
        DeferredReason::AbsentPrereq => Reason::AbsentPrereq,
    };
    proto::Deferred {
        reason: reason as i32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::StaticDefault;
    use crate::plan_modifier::UseStateForUnknown;
    use crate::schema::{AttributeBuilder, AttributeType, NestedBlockBuilder, SchemaBuilder};
    use crate::validator::StringInSlice;

    fn schema() -> Schema {
        SchemaBuilder::new()
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("protocol_type", AttributeType::String)
                    .required()
                    .force_new()
                    .validator(StringInSlice::new(&["NFS", "SMB"]))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("file_system_type", AttributeType::String)
                    .optional()
                    .default(StaticDefault::string("standard"))
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("status", AttributeType::String)
                    .computed()
                    .build(),
            )
            .block(
                NestedBlockBuilder::list("rule")
                    .max_items(1)
                    .attribute(
                        AttributeBuilder::new("name", AttributeType::String)
                            .required()
                            .build(),
                    )
                    .build(),
            )
            .build()
    }

    fn object(pairs: &[(&str, Dynamic)]) -> Dynamic {
        Dynamic::Map(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn create_plan_marks_computed_unknown_and_applies_defaults() {
        let config = object(&[("protocol_type", "NFS".into())]);
        let plan = plan_resource_change(&schema(), &Dynamic::Null, &config, config.clone());

        let planned = plan.planned.as_map().unwrap();
        assert!(planned["id"].is_unknown());
        assert!(planned["status"].is_unknown());
        assert_eq!(planned["file_system_type"], Dynamic::from("standard"));
        assert_eq!(planned["description"], Dynamic::Null);
        assert_eq!(planned["rule"], Dynamic::List(vec![]));
        assert!(plan.requires_replace.is_empty());
    }

    #[test]
    fn update_plan_reports_force_new_changes() {
        let prior = object(&[
            ("id", "fs-1".into()),
            ("protocol_type", "NFS".into()),
            ("description", Dynamic::Null),
            ("file_system_type", "standard".into()),
            ("status", "Running".into()),
            ("rule", Dynamic::List(vec![])),
        ]);
        let config = object(&[("protocol_type", "SMB".into())]);
        let mut proposed = prior.clone();
        if let Dynamic::Map(m) = &mut proposed {
            m.insert("protocol_type".into(), "SMB".into());
        }

        let plan = plan_resource_change(&schema(), &prior, &config, proposed);
        let planned = plan.planned.as_map().unwrap();

        assert_eq!(plan.requires_replace, vec![AttributePath::new("protocol_type")]);
        assert_eq!(planned["id"], Dynamic::from("fs-1"));
        assert!(planned["status"].is_unknown());
    }

    #[test]
    fn unchanged_update_keeps_computed_values() {
        let prior = object(&[
            ("id", "fs-1".into()),
            ("protocol_type", "NFS".into()),
            ("description", Dynamic::Null),
            ("file_system_type", "standard".into()),
            ("status", "Running".into()),
            ("rule", Dynamic::List(vec![])),
        ]);
        let config = object(&[
            ("protocol_type", "NFS".into()),
            ("file_system_type", "standard".into()),
        ]);

        let plan = plan_resource_change(&schema(), &prior, &config, prior.clone());
        assert_eq!(plan.planned, prior);
        assert!(plan.requires_replace.is_empty());
    }

    #[test]
    fn validation_reports_bad_enum_and_block_count() {
        let config = object(&[
            ("protocol_type", "FTP".into()),
            (
                "rule",
                Dynamic::List(vec![
                    object(&[("name", "a".into())]),
                    object(&[("name", "b".into())]),
                ]),
            ),
        ]);

        let mut diagnostics = Vec::new();
        validate_block(
            &schema().block,
            &config,
            AttributePath::root(),
            &mut diagnostics,
        );

        assert_eq!(diagnostics.len(), 2);
        assert_eq!(
            diagnostics[0].attribute,
            Some(AttributePath::new("protocol_type"))
        );
        assert!(diagnostics[1].summary.contains("Too many rule blocks"));
    }

    #[test]
    fn conform_fills_missing_and_drops_unknown_keys() {
        let value = object(&[("id", "fs-1".into()), ("legacy", "x".into())]);
        let conformed = conform_to_block(value, &schema().block);
        let attrs = conformed.as_map().unwrap();

        assert!(!attrs.contains_key("legacy"));
        assert_eq!(attrs["protocol_type"], Dynamic::Null);
        assert_eq!(attrs["rule"], Dynamic::List(vec![]));
        assert_eq!(attrs.len(), 6);
    }

    #[test]
    fn strip_unknowns_is_recursive() {
        let value = object(&[
            ("id", Dynamic::Unknown),
            ("list", Dynamic::List(vec![Dynamic::Unknown])),
        ]);
        assert!(!strip_unknowns(value).contains_unknown());
    }
}

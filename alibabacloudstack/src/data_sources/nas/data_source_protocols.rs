//! Protocols supported by NAS file systems in the current region

use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tfplug::context::Context;
use tfplug::data_source::{
    ConfigureDataSourceRequest, ConfigureDataSourceResponse, DataSource, DataSourceSchemaRequest,
    DataSourceSchemaResponse, DataSourceWithConfigure, ReadDataSourceRequest,
    ReadDataSourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::StringInSlice;

use crate::api::common::{json_array, json_string};
use crate::api::Retry;
use crate::resources::{api_error, get_string, not_configured, provider_data_from};
use crate::AlibabacloudStackProviderData;

const TYPE_NAME: &str = "alibabacloudstack_nas_protocols";

#[derive(Default)]
pub struct NasProtocolsDataSource {
    provider_data: Option<AlibabacloudStackProviderData>,
}

impl NasProtocolsDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Protocol types of the first cluster of every matching zone, in API order.
/// Zones without clusters contribute nothing.
pub(crate) fn zone_protocols(zones: &Value, zone_id: Option<&str>) -> Vec<String> {
    json_array(zones, "Zones.Zone")
        .iter()
        .filter(|zone| match zone_id {
            Some(wanted) => json_string(zone, "ZoneId").as_deref() == Some(wanted),
            None => true,
        })
        .flat_map(|zone| {
            json_array(zone, "Clusters.Cluster[0].InstanceTypes.InstanceType")
                .iter()
                .filter_map(|instance_type| json_string(instance_type, "ProtocolType"))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Stable identifier for a protocol list
pub(crate) fn protocols_id(protocols: &[String]) -> String {
    let mut hasher = Sha256::new();
    for protocol in protocols {
        hasher.update(protocol.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

#[async_trait]
impl DataSource for NasProtocolsDataSource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: DataSourceSchemaRequest,
    ) -> DataSourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Lists the protocols NAS file systems support")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("type", AttributeType::String)
                    .description("File system type")
                    .required()
                    .validator(StringInSlice::new(&["Capacity", "Performance"]))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("zone_id", AttributeType::String)
                    .description("Only list protocols of this zone")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("output_file", AttributeType::String)
                    .description("Write the protocol list to this file as JSON")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    "protocols",
                    AttributeType::List(Box::new(AttributeType::String)),
                )
                .description("Upper-cased protocol names, e.g. NFS or SMB")
                .computed()
                .build(),
            )
            .build();

        DataSourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn read(&self, ctx: Context, request: ReadDataSourceRequest) -> ReadDataSourceResponse {
        let Some(data) = &self.provider_data else {
            return ReadDataSourceResponse {
                state: request.config,
                diagnostics: vec![not_configured()],
                deferred: None,
            };
        };
        let client = data.client.as_ref();
        let config = request.config;

        let zones = match Retry::new(TYPE_NAME, "DescribeZones")
            .run(&ctx, || async move { client.nas().describe_zones().await })
            .await
        {
            Ok(zones) => zones,
            Err(e) => {
                return ReadDataSourceResponse {
                    state: config,
                    diagnostics: vec![api_error("Failed to describe NAS zones", &e)],
                    deferred: None,
                }
            }
        };

        let raw = zone_protocols(&zones, get_string(&config, "zone_id").as_deref());
        let protocols: Vec<String> = raw.iter().map(|p| p.to_uppercase()).collect();
        tracing::debug!(count = protocols.len(), "found NAS protocols");

        let mut diagnostics = vec![];
        if let Some(path) = get_string(&config, "output_file") {
            let written = match serde_json::to_string_pretty(&protocols) {
                Ok(json) => tokio::fs::write(&path, json).await.map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            if let Err(e) = written {
                diagnostics.push(
                    Diagnostic::error(
                        "Failed to write output file",
                        format!("Could not write {}: {}", path, e),
                    )
                    .with_attribute(AttributePath::new("output_file")),
                );
            }
        }

        let mut state = config;
        let _ = state.set_string(&AttributePath::new("id"), protocols_id(&raw));
        let _ = state.set_list(
            &AttributePath::new("protocols"),
            protocols.into_iter().map(Dynamic::String).collect(),
        );

        ReadDataSourceResponse {
            state,
            diagnostics,
            deferred: None,
        }
    }
}

#[async_trait]
impl DataSourceWithConfigure for NasProtocolsDataSource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureDataSourceRequest,
    ) -> ConfigureDataSourceResponse {
        match provider_data_from(request.provider_data) {
            Ok(data) => {
                self.provider_data = Some(data);
                ConfigureDataSourceResponse {
                    diagnostics: vec![],
                }
            }
            Err(diag) => ConfigureDataSourceResponse {
                diagnostics: vec![diag],
            },
        }
    }
}

use serde_json::Value;

use super::client::{Client, Product};
use super::common::{json_path, json_string, RpcParams};
use super::error::{ApiError, Result};

pub const TEMPLATE_GONE: &[&str] = &["ResourceNotFound", "404"];

pub struct CmsApi<'a> {
    client: &'a Client,
}

impl<'a> CmsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Cms reports some failures as `Success=false` in a 200 body with a
    /// numeric `Code`
    async fn call(&self, action: &str, params: RpcParams) -> Result<Value> {
        let body = self.client.rpc(Product::Cms, action, params).await?;
        match json_string(&body, "Code") {
            Some(code) if code != "200" => Err(ApiError::Service {
                status: 200,
                code,
                message: json_string(&body, "Message").unwrap_or_default(),
                request_id: json_string(&body, "RequestId").unwrap_or_default(),
            }),
            _ => Ok(body),
        }
    }

    /// Returns the template `Id`
    pub async fn create_metric_rule_template(&self, params: RpcParams) -> Result<String> {
        let body = self.call("CreateMetricRuleTemplate", params).await?;
        json_string(&body, "Id").ok_or_else(|| {
            ApiError::Parse("CreateMetricRuleTemplate response has no Id".to_string())
        })
    }

    /// The `Resource` object, `None` when the template does not exist
    pub async fn describe_metric_rule_template(&self, id: &str) -> Result<Option<Value>> {
        let params = RpcParams::new().add("TemplateId", id);
        match self
            .call("DescribeMetricRuleTemplateAttribute", params)
            .await
        {
            Ok(body) => Ok(json_path(&body, "Resource")
                .filter(|resource| resource.is_object())
                .cloned()),
            Err(e) if e.is_expected(TEMPLATE_GONE) || e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn apply_metric_rule_template(&self, params: RpcParams) -> Result<()> {
        self.call("ApplyMetricRuleTemplate", params).await.map(|_| ())
    }

    pub async fn modify_metric_rule_template(&self, params: RpcParams) -> Result<()> {
        self.call("ModifyMetricRuleTemplate", params).await.map(|_| ())
    }

    pub async fn delete_metric_rule_template(&self, id: &str) -> Result<()> {
        self.call(
            "DeleteMetricRuleTemplate",
            RpcParams::new().add("TemplateId", id),
        )
        .await
        .map(|_| ())
    }
}

use serde_json::Value;

use super::client::{Client, Product};
use super::common::{json_array, json_string, RpcParams};
use super::error::{ApiError, Result};

pub struct ArmsApi<'a> {
    client: &'a Client,
}

impl<'a> ArmsApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Contact ids are sent space separated
    pub async fn create_alert_contact_group(
        &self,
        name: &str,
        contact_ids: &[String],
    ) -> Result<String> {
        let params = RpcParams::new()
            .add("ContactGroupName", name)
            .add_optional(
                "ContactIds",
                (!contact_ids.is_empty()).then(|| contact_ids.join(" ")),
            );
        let body = self
            .client
            .rpc(Product::Arms, "CreateAlertContactGroup", params)
            .await?;
        json_string(&body, "ContactGroupId").ok_or_else(|| {
            ApiError::Parse("CreateAlertContactGroup response has no ContactGroupId".to_string())
        })
    }

    /// `ContactGroups[0]` with contact details, `None` when it does not exist
    pub async fn describe_alert_contact_group(&self, id: &str) -> Result<Option<Value>> {
        let params = RpcParams::new()
            .add("ContactGroupIds", id)
            .add("IsDetail", true);
        let body = self
            .client
            .rpc(Product::Arms, "SearchAlertContactGroup", params)
            .await?;
        Ok(json_array(&body, "ContactGroups").first().cloned())
    }

    pub async fn update_alert_contact_group(
        &self,
        id: &str,
        name: &str,
        contact_ids: &[String],
    ) -> Result<()> {
        let params = RpcParams::new()
            .add("ContactGroupId", id)
            .add("ContactGroupName", name)
            .add("ContactIds", contact_ids.join(" "));
        self.client
            .rpc(Product::Arms, "UpdateAlertContactGroup", params)
            .await
            .map(|_| ())
    }

    pub async fn delete_alert_contact_group(&self, id: &str) -> Result<()> {
        self.client
            .rpc(
                Product::Arms,
                "DeleteAlertContactGroup",
                RpcParams::new().add("ContactGroupId", id),
            )
            .await
            .map(|_| ())
    }
}

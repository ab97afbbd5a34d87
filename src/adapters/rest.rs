//! Warehouse client over the BigQuery v2 REST API.

use crate::app::dto::{
    ErrorEnvelope, GetIamPolicyRequest, GetPolicyOptionsDto, PolicyDto, SetIamPolicyRequest,
};
use crate::config::ClientConfig;
use crate::domain::dataset::DatasetInfo;
use crate::domain::error::{Result, WarehouseError};
use crate::domain::ids::{DatasetId, TableId};
use crate::domain::policy::Policy;
use crate::domain::ports::{DeleteOutcome, Warehouse};
use crate::domain::table::TableInfo;
use reqwest::Method;
use reqwest::blocking::{Client, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

const API_ROOT: [&str; 2] = ["bigquery", "v2"];
const USER_AGENT: &str = concat!("bq-fixtures/", env!("CARGO_PKG_VERSION"));

/// Blocking REST client. The inner `reqwest` client pools connections and is
/// safe to share across threads, so one `RestWarehouse` serves a whole test
/// process.
pub struct RestWarehouse {
    client: Client,
    endpoint: Url,
    access_token: Option<String>,
}

impl RestWarehouse {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let endpoint = config
            .endpoint_url()
            .map_err(|e| WarehouseError::invalid(format!("Invalid endpoint url: {e}")))?;
        if endpoint.cannot_be_a_base() {
            return Err(WarehouseError::invalid(format!(
                "Invalid endpoint url: {endpoint}"
            )));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(WarehouseError::transport)?;

        Ok(Self {
            client,
            endpoint,
            access_token: config.access_token.clone(),
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| WarehouseError::invalid(format!("Invalid endpoint url: {}", self.endpoint)))?
            .pop_if_empty()
            .extend(API_ROOT)
            .extend(segments);
        Ok(url)
    }

    fn datasets_url(&self, project_id: &str) -> Result<Url> {
        self.url(&["projects", project_id, "datasets"])
    }

    fn dataset_url(&self, id: &DatasetId) -> Result<Url> {
        self.url(&["projects", &id.project_id, "datasets", &id.dataset_id])
    }

    fn tables_url(&self, id: &DatasetId) -> Result<Url> {
        self.url(&[
            "projects",
            &id.project_id,
            "datasets",
            &id.dataset_id,
            "tables",
        ])
    }

    fn table_url(&self, id: &TableId, action: Option<&str>) -> Result<Url> {
        let last = match action {
            Some(action) => format!("{}:{action}", id.table_id),
            None => id.table_id.clone(),
        };
        self.url(&[
            "projects",
            &id.project_id,
            "datasets",
            &id.dataset_id,
            "tables",
            &last,
        ])
    }

    /// Sends one request; non-2xx responses become typed errors.
    fn execute<B: Serialize>(&self, method: Method, url: Url, body: Option<&B>) -> Result<Response> {
        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().map_err(WarehouseError::transport)?;
        let status = response.status();
        tracing::debug!(%method, %url, %status, "BigQuery request");

        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&text)
            .map(|env| env.error.message)
            .ok()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| {
                if text.is_empty() {
                    status.canonical_reason().unwrap_or("unknown error").to_string()
                } else {
                    text
                }
            });
        Err(WarehouseError::from_status(status.as_u16(), message))
    }

    fn call<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<T> {
        self.execute(method, url, body)?
            .json::<T>()
            .map_err(WarehouseError::transport)
    }

    fn get_optional<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>> {
        match self.call::<(), T>(Method::GET, url, None) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn delete(&self, url: Url) -> Result<DeleteOutcome> {
        match self.execute::<()>(Method::DELETE, url, None) {
            Ok(_) => Ok(DeleteOutcome::Deleted),
            Err(e) if e.is_not_found() => Ok(DeleteOutcome::NotFound),
            Err(e) => Err(e),
        }
    }
}

impl Warehouse for RestWarehouse {
    fn create_dataset(&self, info: &DatasetInfo) -> Result<DatasetInfo> {
        let url = self.datasets_url(&info.dataset_id.project_id)?;
        self.call(Method::POST, url, Some(info))
    }

    fn get_dataset(&self, id: &DatasetId) -> Result<Option<DatasetInfo>> {
        self.get_optional(self.dataset_url(id)?)
    }

    fn update_dataset(&self, info: &DatasetInfo) -> Result<DatasetInfo> {
        let url = self.dataset_url(&info.dataset_id)?;
        self.call(Method::PUT, url, Some(info))
    }

    fn delete_dataset(&self, id: &DatasetId, delete_contents: bool) -> Result<DeleteOutcome> {
        let mut url = self.dataset_url(id)?;
        url.query_pairs_mut()
            .append_pair("deleteContents", if delete_contents { "true" } else { "false" });
        self.delete(url)
    }

    fn create_table(&self, info: &TableInfo) -> Result<TableInfo> {
        let url = self.tables_url(&info.table_id.dataset())?;
        self.call(Method::POST, url, Some(info))
    }

    fn get_table(&self, id: &TableId) -> Result<Option<TableInfo>> {
        self.get_optional(self.table_url(id, None)?)
    }

    fn delete_table(&self, id: &TableId) -> Result<DeleteOutcome> {
        self.delete(self.table_url(id, None)?)
    }

    fn get_iam_policy(&self, id: &TableId) -> Result<Policy> {
        let url = self.table_url(id, Some("getIamPolicy"))?;
        let request = GetIamPolicyRequest {
            options: Some(GetPolicyOptionsDto {
                requested_policy_version: 1,
            }),
        };
        let dto: PolicyDto = self.call(Method::POST, url, Some(&request))?;
        Ok(dto.into())
    }

    fn set_iam_policy(&self, id: &TableId, policy: &Policy) -> Result<Policy> {
        let url = self.table_url(id, Some("setIamPolicy"))?;
        let request = SetIamPolicyRequest {
            policy: policy.into(),
        };
        let dto: PolicyDto = self.call(Method::POST, url, Some(&request))?;
        Ok(dto.into())
    }
}

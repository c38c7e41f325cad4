use std::{collections::HashMap, env};

use reqwest::{
    header::{HeaderValue, AUTHORIZATION, COOKIE},
    RequestBuilder,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use url::Url;

use super::{auth::AuthResponse, session::SessionConfig};
use crate::error::{Error, Result};

pub const BASE_URL: &str = "https://workflowy.com";
pub const ROOT_TREE: &str = "Root";

const CLIENT_VERSION: &str = "21";
const BASE_URL_VAR: &str = "WORKFLOWY_URL";
const API_KEY_VAR: &str = "WORKFLOWY_API_KEY";
const SESSION_ID_VAR: &str = "WORKFLOWY_SESSION_ID";

/// One outline item. Fields the client doesn't know about are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeItem {
    pub id: String,
    #[serde(rename = "nm", default)]
    pub name: String,
    #[serde(rename = "prnt", default)]
    pub parent: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(default)]
    pub children: Vec<TreeItem>,
}

#[derive(Deserialize)]
struct TreeData {
    items: Vec<TreeItem>,
}

/// Links a flat item list into a forest via each item's `prnt`.
///
/// Items whose parent is not in the list become roots. Sibling order follows
/// the input order. Items caught in a parent cycle are unreachable from any
/// root and are dropped.
pub fn build_tree(items: Vec<TreeItem>) -> Vec<TreeItem> {
    let index: HashMap<String, usize> = items
        .iter()
        .enumerate()
        .map(|(i, item)| (item.id.clone(), i))
        .collect();

    let mut children = vec![Vec::new(); items.len()];
    let mut roots = Vec::new();
    for (i, item) in items.iter().enumerate() {
        match item.parent.as_ref().and_then(|p| index.get(p)) {
            Some(&p) => children[p].push(i),
            None => roots.push(i),
        }
    }

    let mut slots: Vec<Option<TreeItem>> = items.into_iter().map(Some).collect();
    roots
        .into_iter()
        .filter_map(|i| attach(i, &mut slots, &children))
        .collect()
}

fn attach(i: usize, slots: &mut [Option<TreeItem>], children: &[Vec<usize>]) -> Option<TreeItem> {
    let mut item = slots[i].take()?;
    item.children = children[i]
        .iter()
        .filter_map(|&c| attach(c, slots, children))
        .collect();
    Some(item)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserData {
    pub user_id: String,
    /// Seconds since the account was created, the clock WorkFlowy stamps operations with.
    pub timestamp: i64,
    pub recent_transaction_ids: HashMap<String, String>,
}

impl UserData {
    pub fn recent_id(&self, tree: &str) -> Option<&str> {
        self.recent_transaction_ids.get(tree).map(String::as_str)
    }

    fn from_initialization_data(data: &Value, now: i64) -> Result<UserData> {
        let tree_data = data
            .get("projectTreeData")
            .ok_or(Error::MissingField("projectTreeData"))?;
        let main = tree_data
            .get("mainProjectTreeInfo")
            .ok_or(Error::MissingField("mainProjectTreeInfo"))?;

        let mut recent_transaction_ids = HashMap::new();
        recent_transaction_ids.insert(
            ROOT_TREE.to_string(),
            id_string(field(main, "initialMostRecentOperationTransactionId")?),
        );
        for tree in tree_data
            .get("auxiliaryProjectTreeInfos")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            if let (Some(share_id), Some(recent)) = (
                tree.get("shareId"),
                tree.get("initialMostRecentOperationTransactionId"),
            ) {
                recent_transaction_ids.insert(id_string(share_id), id_string(recent));
            }
        }

        let joined = field(main, "dateJoinedTimestampInSeconds")?
            .as_i64()
            .ok_or(Error::MissingField("dateJoinedTimestampInSeconds"))?;

        Ok(UserData {
            user_id: id_string(field(main, "ownerId")?),
            timestamp: now - joined,
            recent_transaction_ids,
        })
    }
}

fn field<'a>(value: &'a Value, name: &'static str) -> Result<&'a Value> {
    value.get(name).ok_or(Error::MissingField(name))
}

fn id_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Client id in the format the web app sends, e.g. `2025-07-05 07:13:29.026`.
pub fn client_id() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

#[derive(Debug, Clone)]
pub struct WorkflowyClient {
    http: reqwest::Client,
    base: Url,
    session_id: Option<String>,
    api_key: Option<String>,
}

impl WorkflowyClient {
    pub fn new(base: &str) -> Result<WorkflowyClient> {
        WorkflowyClient::with_client(reqwest::Client::new(), base)
    }

    pub fn with_client(http: reqwest::Client, base: &str) -> Result<WorkflowyClient> {
        Ok(WorkflowyClient {
            http,
            base: Url::parse(base)?,
            session_id: None,
            api_key: None,
        })
    }

    /// `WORKFLOWY_URL`, `WORKFLOWY_API_KEY` and `WORKFLOWY_SESSION_ID`, with the
    /// session falling back to the one in `session`.
    pub fn from_env(session: &SessionConfig) -> Result<WorkflowyClient> {
        let base = env::var(BASE_URL_VAR).unwrap_or_else(|_| BASE_URL.to_string());
        let mut client = WorkflowyClient::new(&base)?;
        client.api_key = env::var(API_KEY_VAR).ok();
        client.session_id = env::var(SESSION_ID_VAR).ok().or_else(|| session.session_id.clone());
        Ok(client)
    }

    pub fn with_session(mut self, session_id: &str) -> WorkflowyClient {
        self.session_id = Some(session_id.to_string());
        self
    }

    pub fn with_api_key(mut self, api_key: &str) -> WorkflowyClient {
        self.api_key = Some(api_key.to_string());
        self
    }

    /// Uses the `access_token` from an auth exchange as the API key.
    pub fn with_auth(self, auth: &AuthResponse) -> Result<WorkflowyClient> {
        let token = auth
            .access_token()
            .ok_or(Error::MissingField("access_token"))?
            .to_string();
        Ok(self.with_api_key(&token))
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }

    fn with_cookie(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let session_id = self
            .session_id
            .as_ref()
            .ok_or(Error::MissingCredential("session id"))?;
        let cookie = HeaderValue::from_str(&format!("sessionid={session_id}"))
            .map_err(|_| Error::MissingCredential("valid session id"))?;
        Ok(request.header(COOKIE, cookie))
    }

    async fn send(request: RequestBuilder) -> Result<Value> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!(%status, "WorkFlowy request was rejected");
            return Err(Error::Status { status, body });
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// Fetches every item and returns them as a forest.
    pub async fn get_tree(&self) -> Result<Vec<TreeItem>> {
        let request = self.with_cookie(self.http.get(self.url("/get_tree_data/")?))?;
        let data: TreeData = serde_json::from_value(Self::send(request).await?)?;

        tracing::debug!(items = data.items.len(), "Fetched tree data");
        Ok(build_tree(data.items))
    }

    pub async fn get_user_data(&self) -> Result<UserData> {
        let mut url = self.url("/get_initialization_data")?;
        url.query_pairs_mut()
            .append_pair("client_version", CLIENT_VERSION)
            .append_pair("client_version_v2", "28")
            .append_pair("no_root_children", "1");

        let data = Self::send(self.with_cookie(self.http.get(url))?).await?;
        UserData::from_initialization_data(&data, chrono::Utc::now().timestamp())
    }

    /// Creates a top-level bullet through the public API.
    pub async fn create_node(&self, title: &str) -> Result<Value> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(Error::MissingCredential("API key"))?;
        let authorization = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| Error::MissingCredential("valid API key"))?;

        let request = self
            .http
            .post(self.url("/api/bullets/create/")?)
            .header(AUTHORIZATION, authorization)
            .json(&json!({ "new_bullet_title": title }));

        Self::send(request).await
    }

    /// Pushes one operation against the main tree and returns the poll result.
    pub async fn push_and_poll(&self, operation: Value) -> Result<Value> {
        let user = self.get_user_data().await?;
        self.push_operation(&user, operation).await
    }

    async fn push_operation(&self, user: &UserData, operation: Value) -> Result<Value> {
        let payload = json!([{
            "most_recent_operation_transaction_id": user.recent_id(ROOT_TREE),
            "operations": [operation],
        }]);
        let push_poll_id = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();

        let request = self.with_cookie(self.http.post(self.url("/push_and_poll")?))?.form(&[
            ("client_id", client_id()),
            ("client_version", CLIENT_VERSION.to_string()),
            ("push_poll_id", push_poll_id),
            ("push_poll_data", payload.to_string()),
            ("crosscheck_user_id", user.user_id.clone()),
        ]);

        Self::send(request).await
    }

    pub async fn edit_node(&self, project_id: &str, name: &str) -> Result<Value> {
        let user = self.get_user_data().await?;
        let operation = json!({
            "type": "edit",
            "data": {
                "projectid": project_id,
                "metadataPatches": [],
                "metadataInversePatches": [],
                "name": name,
            },
            "undo_data": {
                "previous_last_modified": 0,
                "previous_last_modified_by": null,
                "previous_name": "",
                "metadataPatches": [],
            },
            "client_timestamp": user.timestamp,
        });

        self.push_operation(&user, operation).await
    }

    /// Creates a bullet under `parent_id` (or at the top level) via push-and-poll.
    pub async fn create_node_under(&self, name: &str, parent_id: Option<&str>) -> Result<Value> {
        let user = self.get_user_data().await?;
        let creator = user
            .user_id
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::from(user.user_id.clone()));
        let project_trees = json!([{
            "nm": name,
            "metadata": {},
            "id": uuid::Uuid::new_v4().to_string(),
            "ct": user.timestamp,
            "cb": creator,
        }]);
        let operation = json!({
            "type": "bulk_create",
            "data": {
                "parentid": parent_id.unwrap_or("None"),
                "starting_priority": 1,
                "isForSearch": false,
                "project_trees": project_trees.to_string(),
            },
            "client_timestamp": user.timestamp,
            "undo_data": {},
        });

        self.push_operation(&user, operation).await
    }
}

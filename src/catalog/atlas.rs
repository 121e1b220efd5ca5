//! Apache Atlas v2 REST client
//!
//! Consumes three endpoints: entity lookup by unique `qualifiedName`, entity
//! create, and classification typedef create. Requests use basic authentication and
//! are retried per [`RetryPolicy`].

use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::client::CatalogClient;
use super::entity::{CatalogEntity, ClassificationDef, EntityRef, QUALIFIED_NAME, Relationship};
use super::error::CatalogError;
use super::retry::RetryPolicy;

const UNIQUE_ATTRIBUTE_PATH: &str = "/api/atlas/v2/entity/uniqueAttribute/type";
const ENTITY_PATH: &str = "/api/atlas/v2/entity";
const TYPEDEFS_PATH: &str = "/api/atlas/v2/types/typedefs";

/// Static credential pair for the catalog
#[derive(Clone)]
pub struct CatalogCredentials {
    pub username: String,
    password: String,
}

impl CatalogCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

// Hide the password from logs and debug output
impl std::fmt::Debug for CatalogCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AtlasObjectId {
    type_name: String,
    unique_attributes: Map<String, Value>,
}

impl From<&EntityRef> for AtlasObjectId {
    fn from(r: &EntityRef) -> Self {
        let mut unique_attributes = Map::new();
        unique_attributes.insert(
            QUALIFIED_NAME.to_string(),
            Value::String(r.qualified_name.clone()),
        );
        Self {
            type_name: r.type_name.clone(),
            unique_attributes,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AtlasEntity<'a> {
    type_name: &'a str,
    attributes: &'a Map<String, Value>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    relationship_attributes: Map<String, Value>,
}

#[derive(Serialize)]
struct AtlasEntityWithExtInfo<'a> {
    entity: AtlasEntity<'a>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AtlasEntityHeader {
    type_name: String,
    guid: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    attributes: Map<String, Value>,
}

impl AtlasEntityHeader {
    fn qualified_name(&self) -> Option<&str> {
        self.attributes.get(QUALIFIED_NAME).and_then(Value::as_str)
    }

    fn into_entity(self) -> Option<CatalogEntity> {
        let qualified_name = self.qualified_name()?.to_string();
        let mut entity = CatalogEntity::new(self.type_name, qualified_name);
        entity.guid = self.guid;
        entity.attributes.extend(self.attributes);
        Some(entity)
    }
}

#[derive(Deserialize)]
struct AtlasEntityLookup {
    entity: AtlasEntityHeader,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
struct MutatedEntities {
    #[serde(default)]
    create: Vec<AtlasEntityHeader>,
    #[serde(default)]
    update: Vec<AtlasEntityHeader>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AtlasMutationResponse {
    #[serde(default)]
    mutated_entities: Option<MutatedEntities>,
    #[serde(default)]
    guid_assignments: Map<String, Value>,
}

fn entity_payload(entity: &CatalogEntity) -> Result<Value, CatalogError> {
    let mut relationship_attributes = Map::new();
    for (name, relationship) in &entity.relationships {
        let value = match relationship {
            Relationship::One(r) => serde_json::to_value(AtlasObjectId::from(r)),
            Relationship::Many(refs) => serde_json::to_value(
                refs.iter().map(AtlasObjectId::from).collect::<Vec<_>>(),
            ),
        }
        .map_err(|e| CatalogError::InvalidResponse(e.to_string()))?;
        relationship_attributes.insert(name.clone(), value);
    }

    serde_json::to_value(AtlasEntityWithExtInfo {
        entity: AtlasEntity {
            type_name: &entity.type_name,
            attributes: &entity.attributes,
            relationship_attributes,
        },
    })
    .map_err(|e| CatalogError::InvalidResponse(e.to_string()))
}

fn classification_payload(def: &ClassificationDef) -> Value {
    serde_json::json!({
        "classificationDefs": [{
            "category": "CLASSIFICATION",
            "name": def.name,
            "description": def.description,
            "typeVersion": "1.0",
            "attributeDefs": []
        }]
    })
}

/// Blocking Atlas client
pub struct AtlasClient {
    endpoint: String,
    credentials: CatalogCredentials,
    client: Client,
    retry: RetryPolicy,
}

impl AtlasClient {
    /// Create a client for `endpoint` (e.g. `http://localhost:21000`)
    pub fn new(
        endpoint: impl Into<String>,
        credentials: CatalogCredentials,
        timeout: Duration,
    ) -> Result<Self, CatalogError> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(CatalogError::Config(format!(
                "endpoint '{}' must start with http:// or https://",
                endpoint
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CatalogError::Config(e.to_string()))?;

        Ok(Self {
            endpoint,
            credentials,
            client,
            retry: RetryPolicy::default(),
        })
    }

    /// Replace the retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Catalog endpoint
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    /// `.../uniqueAttribute/type/{type_name}` with the type name encoded
    fn unique_attribute_url(&self, type_name: &str) -> Result<Url, CatalogError> {
        let mut url = Url::parse(&self.url(UNIQUE_ATTRIBUTE_PATH))
            .map_err(|e| CatalogError::Config(format!("endpoint '{}': {}", self.endpoint, e)))?;
        url.path_segments_mut()
            .map_err(|_| {
                CatalogError::Config(format!("endpoint '{}' cannot carry a path", self.endpoint))
            })?
            .push(type_name);
        Ok(url)
    }

    fn send(&self, request: reqwest::blocking::RequestBuilder) -> Result<Response, CatalogError> {
        request
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .header("Accept", "application/json")
            .send()
            .map_err(|e| CatalogError::Transport(e.to_string()))
    }

    fn post_json(&self, path: &str, body: &Value) -> Result<(u16, String), CatalogError> {
        let response = self.send(self.client.post(self.url(path)).json(body))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .map_err(|e| CatalogError::Transport(e.to_string()))?;
        if status >= 500 {
            return Err(CatalogError::Request { status, body: text });
        }
        Ok((status, text))
    }
}

impl std::fmt::Debug for AtlasClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtlasClient")
            .field("endpoint", &self.endpoint)
            .field("credentials", &self.credentials)
            .field("retry", &self.retry)
            .finish()
    }
}

impl CatalogClient for AtlasClient {
    fn get_entity(
        &self,
        type_name: &str,
        qualified_name: &str,
    ) -> Result<Option<CatalogEntity>, CatalogError> {
        let url = self.unique_attribute_url(type_name)?;
        let attr = format!("attr:{}", QUALIFIED_NAME);

        let found: Option<AtlasEntityLookup> = self.retry.run("lookup", || {
            let response = self.send(self.client.get(url.clone()).query(&[
                (attr.as_str(), qualified_name),
                ("minExtInfo", "true"),
                ("ignoreRelationships", "true"),
            ]))?;
            let status = response.status().as_u16();
            let body = response
                .text()
                .map_err(|e| CatalogError::Transport(e.to_string()))?;
            match status {
                200..=299 => serde_json::from_str(&body)
                    .map(Some)
                    .map_err(|e| CatalogError::InvalidResponse(format!("lookup: {}", e))),
                404 => Ok(None),
                _ => Err(CatalogError::Request { status, body }),
            }
        })?;

        debug!(type_name, qualified_name, found = found.is_some(), "Catalog lookup");

        // A soft-deleted entity still answers the lookup
        Ok(found
            .map(|lookup| lookup.entity)
            .filter(|e| e.status.as_deref() != Some("DELETED"))
            .filter(|e| e.type_name == type_name && e.qualified_name() == Some(qualified_name))
            .and_then(AtlasEntityHeader::into_entity))
    }

    fn create_entity(&self, entity: &CatalogEntity) -> Result<CatalogEntity, CatalogError> {
        let payload = entity_payload(entity)?;
        let conflict = || CatalogError::Conflict {
            type_name: entity.type_name.clone(),
            qualified_name: entity.qualified_name.clone(),
        };

        let (status, body) = self
            .retry
            .run("create", || self.post_json(ENTITY_PATH, &payload))?;

        if status == 409 {
            return Err(conflict());
        }
        if !(200..300).contains(&status) {
            return Err(CatalogError::Request { status, body });
        }

        let response: AtlasMutationResponse = serde_json::from_str(&body)
            .map_err(|e| CatalogError::InvalidResponse(format!("create: {}", e)))?;
        let mutated = response.mutated_entities.unwrap_or_default();

        // Atlas upserts by unique attribute: an UPDATE means someone else created it
        if mutated.create.is_empty() && !mutated.update.is_empty() {
            return Err(conflict());
        }

        let guid = mutated
            .create
            .into_iter()
            .find(|h| h.type_name == entity.type_name)
            .and_then(|h| h.guid)
            .or_else(|| {
                response
                    .guid_assignments
                    .values()
                    .find_map(|v| v.as_str().map(str::to_string))
            })
            .ok_or_else(|| {
                CatalogError::InvalidResponse("create response has no entity guid".to_string())
            })?;

        info!(
            type_name = %entity.type_name,
            qualified_name = %entity.qualified_name,
            guid = %guid,
            "Created catalog entity"
        );
        Ok(entity.clone().with_guid(guid))
    }

    fn create_classification(&self, def: &ClassificationDef) -> Result<(), CatalogError> {
        let payload = classification_payload(def);
        let (status, body) = self
            .retry
            .run("typedef", || self.post_json(TYPEDEFS_PATH, &payload))?;

        match status {
            200..=299 => {
                info!(name = %def.name, "Created classification");
                Ok(())
            }
            409 => Err(CatalogError::Conflict {
                type_name: "classification".to_string(),
                qualified_name: def.name.clone(),
            }),
            _ => Err(CatalogError::Request { status, body }),
        }
    }
}

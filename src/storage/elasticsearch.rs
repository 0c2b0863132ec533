//! Elasticsearch search index over the REST API
//!
//! Documents are addressed as `/{index}/_doc/{id}` and searched with
//! `POST /{index}/_search` using the body produced by the index compiler.
//! Several node addresses may be configured; a request moves on to the next
//! address only when the current one cannot be reached.

use crate::core::order::Order;
use crate::core::service::{Backend, BackendRejection, OrderIndex};
use crate::query::SearchQuery;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde_json::{Value, json};

/// Order index backed by an Elasticsearch cluster
#[derive(Debug, Clone)]
pub struct ElasticOrderIndex {
    client: Client,
    addresses: Vec<Url>,
    index: String,
    refresh: bool,
}

impl ElasticOrderIndex {
    /// Create a client for `index` on the given node addresses
    pub fn new<I, S>(addresses: I, index: impl Into<String>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let addresses = addresses
            .into_iter()
            .map(|address| {
                Url::parse(address.as_ref())
                    .map_err(|e| anyhow!("Invalid search index address '{}': {}", address.as_ref(), e))
            })
            .collect::<Result<Vec<_>>>()?;

        if addresses.is_empty() {
            return Err(anyhow!("At least one search index address is required"));
        }

        let client = Client::builder()
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            client,
            addresses,
            index: index.into(),
            refresh: true,
        })
    }

    /// Whether writes wait for the index to refresh before returning
    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn index_name(&self) -> &str {
        &self.index
    }

    /// Create the index with the order mapping if it does not exist yet
    pub async fn ensure_index(&self) -> Result<()> {
        let response = self.send(Method::HEAD, &[], None, None).await?;
        match response.status() {
            StatusCode::OK => return Ok(()),
            StatusCode::NOT_FOUND => {}
            status => {
                return Err(anyhow!(
                    "Unexpected status {} checking index {}",
                    status,
                    self.index
                ));
            }
        }

        let response = self
            .send(Method::PUT, &[], None, Some(order_mapping()))
            .await?;
        if response.status().is_success() {
            tracing::info!(index = %self.index, "created search index");
            return Ok(());
        }

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        // Another instance may have created it in between
        if error_type(&body) == Some("resource_already_exists_exception") {
            return Ok(());
        }
        Err(index_error(status, &body))
    }

    fn endpoint(&self, base: &Url, segments: &[&str], refresh: Option<bool>) -> Result<Url> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("Search index address '{}' cannot be a base URL", base))?
            .pop_if_empty()
            .push(&self.index)
            .extend(segments);

        if let Some(refresh) = refresh {
            url.query_pairs_mut()
                .append_pair("refresh", if refresh { "true" } else { "false" });
        }
        Ok(url)
    }

    fn request(&self, method: &Method, url: Url, body: Option<&Value>) -> RequestBuilder {
        let request = self.client.request(method.clone(), url);
        match body {
            Some(body) => request.json(body),
            None => request,
        }
    }

    /// Send to the first reachable address
    async fn send(
        &self,
        method: Method,
        segments: &[&str],
        refresh: Option<bool>,
        body: Option<Value>,
    ) -> Result<Response> {
        let mut last_error = None;

        for base in &self.addresses {
            let url = self.endpoint(base, segments, refresh)?;
            match self.request(&method, url, body.as_ref()).send().await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_connect() => {
                    tracing::warn!(address = %base, error = %e, "search index node unreachable");
                    last_error = Some(e);
                }
                Err(e) => return Err(anyhow!("Search index request failed: {}", e)),
            }
        }

        Err(match last_error {
            Some(e) => anyhow!("No search index node reachable: {}", e),
            None => anyhow!("No search index address configured"),
        })
    }

    async fn expect_success(response: Response) -> Result<Value> {
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| anyhow!("Search index returned an unreadable body ({}): {}", status, e))?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(index_error(status, &body))
        }
    }
}

#[async_trait]
impl OrderIndex for ElasticOrderIndex {
    async fn put(&self, order: &Order) -> Result<()> {
        let source = serde_json::to_value(order)
            .map_err(|e| anyhow!("Failed to serialize order: {}", e))?;

        let response = self
            .send(
                Method::PUT,
                &["_doc", order.id.as_str()],
                Some(self.refresh),
                Some(source),
            )
            .await?;
        Self::expect_success(response).await?;

        Ok(())
    }

    async fn search(&self, query: &SearchQuery) -> Result<Value> {
        let response = self
            .send(
                Method::POST,
                &["_search"],
                None,
                Some(query.body().clone()),
            )
            .await?;

        Self::expect_success(response).await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let response = self
            .send(Method::DELETE, &["_doc", id], Some(self.refresh), None)
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::expect_success(response).await?;

        Ok(true)
    }
}

/// Field mapping for the order index
///
/// Exact-match fields are `keyword` so that `term`/`terms` compare whole
/// values; `addressDetail` is analyzed text for `match`.
pub fn order_mapping() -> Value {
    json!({
        "mappings": {
            "properties": {
                "id": { "type": "keyword" },
                "userId": { "type": "keyword" },
                "status": { "type": "keyword" },
                "city": { "type": "keyword" },
                "addressDetail": { "type": "text" },
                "lineItems": {
                    "properties": {
                        "name": { "type": "keyword" },
                        "quantity": { "type": "integer" },
                        "unitPrice": { "type": "double" }
                    }
                },
                "total": { "type": "double" },
                "createdAt": { "type": "date", "ignore_malformed": true },
                "updatedAt": { "type": "date", "ignore_malformed": true }
            }
        }
    })
}

fn error_type(body: &Value) -> Option<&str> {
    body.pointer("/error/type").and_then(Value::as_str)
}

/// Build an error from an Elasticsearch error body
///
/// Client errors other than timeouts and throttling are a [`BackendRejection`].
fn index_error(status: StatusCode, body: &Value) -> anyhow::Error {
    let reason = body
        .pointer("/error/reason")
        .and_then(Value::as_str)
        .or_else(|| body.get("error").and_then(Value::as_str));

    let message = match (error_type(body), reason) {
        (Some(kind), Some(reason)) => {
            format!("Search index returned {}: {}: {}", status, kind, reason)
        }
        (_, Some(reason)) => format!("Search index returned {}: {}", status, reason),
        _ => format!("Search index returned {}", status),
    };

    let transient = matches!(
        status,
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS
    );
    if status.is_client_error() && !transient {
        BackendRejection::new(Backend::Index, message).into()
    } else {
        anyhow!(message)
    }
}

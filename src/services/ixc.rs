//! Thin client for the IXC webservice search API.
//!
//! Every listing endpoint is a `POST {base}/{resource}` with the vendor's
//! `ixcsoft: listar` header and a Basic auth token. Responses come back as a
//! `registros` array plus, depending on the endpoint, a total count under one
//! of several key names. This layer maps requests and responses and nothing
//! else: no retries, no caching.

use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::error::{truncate_body, IxcError};

#[derive(Debug, Clone, Serialize)]
pub struct IxcFilter {
    pub field: String,
    #[serde(rename = "type")]
    pub filter_type: String,
    pub comparison: String,
    pub value: String,
}

impl IxcFilter {
    /// Server-side `between` filter on a date field. The IXC applies this
    /// approximately at best, so callers re-validate dates client-side.
    pub fn date_between(field: &str, inicio: &str, fim: &str) -> Self {
        Self {
            field: field.to_string(),
            filter_type: "date".to_string(),
            comparison: "between".to_string(),
            value: format!("{inicio}|{fim}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchRequest<'a> {
    pub resource: &'a str,
    pub qtype: &'a str,
    pub query: &'a str,
    pub page: u32,
    pub rp: usize,
    pub sortname: &'a str,
    pub sortorder: &'a str,
    pub filters: Vec<IxcFilter>,
}

/// One page of raw upstream records. No schema is guaranteed; each record is
/// kept as a loose JSON map for the normalizer to pick apart.
#[derive(Debug, Clone)]
pub struct IxcPage {
    pub registros: Vec<Map<String, Value>>,
    pub total: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct IxcClient {
    http: Client,
    base_url: String,
    auth_user: String,
    auth_secret: String,
}

impl IxcClient {
    pub fn new(http: Client, base_url: &str, token: &str) -> Self {
        let (auth_user, auth_secret) = split_token(token);
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_user,
            auth_secret,
        }
    }

    pub async fn search(&self, request: &SearchRequest<'_>) -> Result<IxcPage, IxcError> {
        let body = json!({
            "qtype": request.qtype,
            "query": request.query,
            "oper": "=",
            "page": request.page,
            "rp": request.rp,
            "sortname": request.sortname,
            "sortorder": request.sortorder,
            "filters": request.filters,
        });

        let response = self
            .http
            .post(format!("{}/{}", self.base_url, request.resource))
            .basic_auth(&self.auth_user, Some(&self.auth_secret))
            .header("ixcsoft", "listar")
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let raw = response.text().await?;

        if status >= 400 {
            return Err(IxcError::UpstreamStatus {
                status,
                body: truncate_body(&raw),
            });
        }

        let payload: Value = serde_json::from_str(&raw).map_err(|error| IxcError::Parse {
            message: error.to_string(),
            body: truncate_body(&raw),
        })?;

        Ok(IxcPage {
            registros: extract_registros(&payload),
            total: extract_total(&payload),
        })
    }

    /// Fetch the full customer record for a single id, used by the roster
    /// enrichment pass. Returns `None` when the id is unknown upstream.
    pub async fn buscar_cliente(&self, id: &str) -> Result<Option<Map<String, Value>>, IxcError> {
        let page = self
            .search(&SearchRequest {
                resource: "cliente",
                qtype: "cliente.id",
                query: id,
                page: 1,
                rp: 1,
                sortname: "cliente.id",
                sortorder: "desc",
                filters: Vec::new(),
            })
            .await?;
        Ok(page.registros.into_iter().next())
    }
}

fn split_token(token: &str) -> (String, String) {
    match token.split_once(':') {
        Some((id, secret)) => (id.to_string(), secret.to_string()),
        None => (token.to_string(), String::new()),
    }
}

fn extract_registros(payload: &Value) -> Vec<Map<String, Value>> {
    payload
        .get("registros")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

/// The total count shows up under different key names depending on the
/// endpoint (and sometimes not at all).
fn extract_total(payload: &Value) -> Option<u64> {
    let candidates = [
        payload.get("total"),
        payload.get("total_registros"),
        payload.get("totalItems"),
        payload.get("total_items"),
        payload.get("pagination").and_then(|p| p.get("total")),
        payload
            .get("pagination")
            .and_then(|p| p.get("total_registros")),
    ];

    candidates.into_iter().flatten().find_map(count_value)
}

fn count_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    }
}

//! RDAP-backed expiry checker
//!
//! Queries `{base}/domain/{name}` on an RDAP service (by default the
//! rdap.org bootstrap redirector) and reads the `expiration` event.

use crate::config::ExpiryConfig;
use crate::expiry::{DomainCheck, DomainExpiryChecker, ExpiryError};
use crate::url::registry_name;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;

const RDAP_MEDIA_TYPE: &str = "application/rdap+json, application/json;q=0.9";

#[derive(Debug, Deserialize)]
struct RdapDomain {
    #[serde(default)]
    events: Vec<RdapEvent>,
    #[serde(default)]
    entities: Vec<RdapEntity>,
}

#[derive(Debug, Deserialize)]
struct RdapEvent {
    #[serde(rename = "eventAction")]
    action: String,
    #[serde(rename = "eventDate")]
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RdapEntity {
    #[serde(default)]
    roles: Vec<String>,
    #[serde(rename = "vcardArray")]
    vcard_array: Option<Value>,
}

/// [`DomainExpiryChecker`] backed by the Registration Data Access Protocol
#[derive(Debug, Clone)]
pub struct RdapChecker {
    client: Client,
    base_url: String,
}

impl RdapChecker {
    /// Builds a checker using the expiry section of the configuration
    pub fn new(config: &ExpiryConfig, user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.rdap_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn lookup_url(&self, name: &str) -> String {
        format!("{}/domain/{}", self.base_url, name)
    }
}

#[async_trait]
impl DomainExpiryChecker for RdapChecker {
    async fn check(&self, host: &str) -> Result<DomainCheck, ExpiryError> {
        let domain = registry_name(host);
        let url = self.lookup_url(&domain);
        tracing::debug!("RDAP lookup for {} at {}", domain, url);

        let response = self
            .client
            .get(&url)
            .header(header::ACCEPT, RDAP_MEDIA_TYPE)
            .send()
            .await
            .map_err(|source| ExpiryError::Request {
                domain: domain.clone(),
                source,
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            // No registration object: the name is free to register
            return Ok(DomainCheck {
                domain,
                is_expired: true,
                expires_at: None,
                registrar: None,
                checked_at: Utc::now(),
            });
        }

        if !status.is_success() {
            return Err(ExpiryError::Status {
                domain,
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|source| ExpiryError::Request {
                domain: domain.clone(),
                source,
            })?;

        parse_rdap_domain(&domain, &body, Utc::now())
    }
}

/// Turns an RDAP domain object into a [`DomainCheck`] as seen at `now`
fn parse_rdap_domain(
    domain: &str,
    body: &str,
    now: DateTime<Utc>,
) -> Result<DomainCheck, ExpiryError> {
    let parsed: RdapDomain = serde_json::from_str(body).map_err(|e| ExpiryError::Parse {
        domain: domain.to_string(),
        message: e.to_string(),
    })?;

    let expires_at = match parsed
        .events
        .iter()
        .find(|event| event.action.eq_ignore_ascii_case("expiration"))
        .and_then(|event| event.date.as_deref())
    {
        Some(date) => Some(
            DateTime::parse_from_rfc3339(date)
                .map_err(|e| ExpiryError::Parse {
                    domain: domain.to_string(),
                    message: format!("bad expiration date '{}': {}", date, e),
                })?
                .with_timezone(&Utc),
        ),
        None => None,
    };

    let registrar = parsed
        .entities
        .iter()
        .filter(|entity| entity.roles.iter().any(|role| role == "registrar"))
        .find_map(|entity| entity.vcard_array.as_ref().and_then(vcard_full_name));

    Ok(DomainCheck {
        domain: domain.to_string(),
        is_expired: expires_at.map_or(false, |at| at < now),
        expires_at,
        registrar,
        checked_at: now,
    })
}

/// Extracts the `fn` property from a jCard (`["vcard", [[name, params, type, value], ...]]`)
fn vcard_full_name(vcard: &Value) -> Option<String> {
    vcard
        .get(1)?
        .as_array()?
        .iter()
        .filter_map(Value::as_array)
        .find(|property| property.first().and_then(Value::as_str) == Some("fn"))
        .and_then(|property| property.get(3))
        .and_then(Value::as_str)
        .map(str::to_string)
}

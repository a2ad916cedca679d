//! HTTP implementation of the remote mutation gateway.
//!
//! Talks to a PostgREST-style REST API:
//!
//! | Operation | Request |
//! |---|---|
//! | insert transaction | `POST /rest/v1/transactions` |
//! | update transaction | `PATCH /rest/v1/transactions?id=eq.{id}` |
//! | upsert profile | `POST /rest/v1/profiles?on_conflict=owner_id` |
//! | upsert forecast | `POST /rest/v1/forecasts?on_conflict=owner_id,month_index` |
//!
//! Writes ask for `return=representation` so the canonical row (and its
//! server-assigned `id`) comes back in the response body.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ResolvedConfig;
use crate::error::{Error, Result};
use crate::model::{ForecastFields, NewTransaction, ProfileFields, RemoteRecord, TransactionFields};
use crate::sync::RemoteMutationGateway;

const RETURN_REPRESENTATION: &str = "return=representation";
const UPSERT_REPRESENTATION: &str = "resolution=merge-duplicates,return=representation";

/// REST gateway backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    endpoint: Option<String>,
    api_key: Option<String>,
    access_token: Option<String>,
}

/// Write responses are usually an array, but some deployments return the
/// single object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Records {
    Many(Vec<RemoteRecord>),
    One(RemoteRecord),
}

impl HttpGateway {
    /// Create a gateway. With no endpoint every call fails with a config error.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        endpoint: Option<String>,
        api_key: Option<String>,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.map(|e| e.trim_end_matches('/').to_string()),
            api_key,
            access_token,
        })
    }

    /// Create a gateway from resolved settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &ResolvedConfig) -> Result<Self> {
        Self::new(
            config.endpoint.clone(),
            config.api_key.clone(),
            config.access_token.clone(),
            config.request_timeout,
        )
    }

    fn table_url(&self, table: &str) -> Result<String> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or_else(|| Error::Config("No remote endpoint configured".to_string()))?;
        Ok(format!("{endpoint}/rest/v1/{table}"))
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, url);
        if let Some(key) = &self.api_key {
            builder = builder.header("apikey", key);
        }
        if let Some(token) = self.access_token.as_ref().or(self.api_key.as_ref()) {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn write<T: Serialize + ?Sized>(
        &self,
        method: reqwest::Method,
        table: &str,
        query: &[(&str, &str)],
        prefer: &str,
        body: &T,
    ) -> Result<Vec<RemoteRecord>> {
        let url = self.table_url(table)?;
        debug!(%method, table, "Remote write");

        let response = self
            .request(method, &url)
            .query(query)
            .header("Prefer", prefer)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(Error::Remote {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        parse_records(&text)
    }
}

/// Parse a write response body into records. An empty body has none.
fn parse_records(body: &str) -> Result<Vec<RemoteRecord>> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(match serde_json::from_str::<Records>(body)? {
        Records::Many(records) => records,
        Records::One(record) => vec![record],
    })
}

/// Pull a readable message out of an error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

fn first_record(records: Vec<RemoteRecord>, what: &str) -> Result<RemoteRecord> {
    records
        .into_iter()
        .next()
        .ok_or_else(|| Error::MissingRecord(what.to_string()))
}

impl RemoteMutationGateway for HttpGateway {
    async fn insert_transaction(&self, tx: &NewTransaction) -> Result<RemoteRecord> {
        let records = self
            .write(reqwest::Method::POST, "transactions", &[], RETURN_REPRESENTATION, tx)
            .await?;
        first_record(records, "transaction insert")
    }

    async fn update_transaction_by_id(
        &self,
        remote_id: &str,
        fields: &TransactionFields,
    ) -> Result<()> {
        let filter = format!("eq.{remote_id}");
        self.write(
            reqwest::Method::PATCH,
            "transactions",
            &[("id", filter.as_str())],
            "return=minimal",
            fields,
        )
        .await?;
        Ok(())
    }

    async fn upsert_profile(&self, profile: &ProfileFields) -> Result<Option<RemoteRecord>> {
        let records = self
            .write(
                reqwest::Method::POST,
                "profiles",
                &[("on_conflict", "owner_id")],
                UPSERT_REPRESENTATION,
                profile,
            )
            .await?;
        Ok(records.into_iter().next())
    }

    async fn upsert_forecast(&self, forecast: &ForecastFields) -> Result<RemoteRecord> {
        let records = self
            .write(
                reqwest::Method::POST,
                "forecasts",
                &[("on_conflict", "owner_id,month_index")],
                UPSERT_REPRESENTATION,
                forecast,
            )
            .await?;
        first_record(records, "forecast upsert")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_records_shapes() {
        let many = parse_records(r#"[{"id":"11111111-1111-1111-1111-111111111111","amount":1}]"#)
            .unwrap();
        assert_eq!(many, vec![RemoteRecord::new("11111111-1111-1111-1111-111111111111")]);

        let one = parse_records(r#"{"id":"abc","owner_id":"u1"}"#).unwrap();
        assert_eq!(one, vec![RemoteRecord::new("abc")]);

        assert!(parse_records("").unwrap().is_empty());
        assert!(parse_records("[]").unwrap().is_empty());
        assert!(parse_records("not json").is_err());
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(r#"{"code":"23505","message":"duplicate key"}"#),
            "duplicate key"
        );
        assert_eq!(error_message(r#"{"error":"invalid token"}"#), "invalid token");
        assert_eq!(error_message(" Bad Gateway \n"), "Bad Gateway");
    }

    #[test]
    fn test_table_url_trims_trailing_slash() {
        let gateway = HttpGateway::new(
            Some("https://api.example.com/".to_string()),
            None,
            None,
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            gateway.table_url("forecasts").unwrap(),
            "https://api.example.com/rest/v1/forecasts"
        );
    }

    #[tokio::test]
    async fn test_calls_without_endpoint_fail_with_config_error() {
        let gateway = HttpGateway::new(None, None, None, Duration::from_secs(1)).unwrap();
        let err = gateway
            .upsert_forecast(&ForecastFields {
                owner_id: "u1".to_string(),
                month_index: 0,
                projected_income: 1.0,
                projected_expenses: 1.0,
                note: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let gateway = HttpGateway::new(
            Some("http://127.0.0.1:9".to_string()),
            Some("anon".to_string()),
            None,
            Duration::from_millis(500),
        )
        .unwrap();
        let err = gateway
            .update_transaction_by_id(
                "11111111-1111-1111-1111-111111111111",
                &TransactionFields {
                    amount: 1.0,
                    category: "Food".to_string(),
                    kind: crate::model::TransactionKind::Expense,
                    date: "2026-01-01".to_string(),
                    note: None,
                },
            )
            .await
            .unwrap_err();
        assert!(err.error_code().is_retryable());
    }
}

//! Paged fetches against the workflow insights resource.

use std::collections::HashSet;
use std::future::Future;

use reqwest::header::ACCEPT;
use tracing::{debug, warn};

use insights_core::{
    Credential, ExporterConfig, InsightsTarget, WorkflowInsightPage, WorkflowInsightRecord,
};

use crate::error::FetchError;

/// Header carrying the API token.
pub const AUTH_HEADER: &str = "Circle-Token";

/// Upper bound on pages per `fetch_all`, guarding against a remote that
/// never returns a null token.
pub const MAX_PAGES: usize = 1000;

const USER_AGENT: &str = concat!("insights-exporter/", env!("CARGO_PKG_VERSION"));

/// Bytes of a non-2xx body kept in the error.
const MAX_ERROR_BODY: usize = 512;

/// A source of complete workflow insight record sets.
///
/// The snapshot scheduler only depends on this, so tests can script
/// fetch outcomes without a network.
pub trait InsightSource: Send + Sync {
    fn fetch_all(
        &self,
    ) -> impl Future<Output = Result<Vec<WorkflowInsightRecord>, FetchError>> + Send;
}

/// HTTP client for one project's workflow insights.
#[derive(Debug, Clone)]
pub struct InsightsClient {
    http: reqwest::Client,
    endpoint: String,
    target: InsightsTarget,
    credential: Credential,
}

impl InsightsClient {
    /// Build a client from resolved configuration.
    ///
    /// The request timeout covers the whole exchange, including reading
    /// the body.
    pub fn new(config: &ExporterConfig) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout)
            .connect_timeout(config.request_timeout)
            .build()
            .map_err(FetchError::transport)?;

        let endpoint = format!(
            "{}/insights/{}/workflows",
            config.base_url,
            config.target.project_slug()
        );

        Ok(Self {
            http,
            endpoint,
            target: config.target.clone(),
            credential: config.credential.clone(),
        })
    }

    /// The resource path every page is requested from.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetch one page. `page_token` is the previous page's continuation.
    pub async fn fetch_page(
        &self,
        page_token: Option<&str>,
    ) -> Result<WorkflowInsightPage, FetchError> {
        let mut request = self
            .http
            .get(&self.endpoint)
            .header(AUTH_HEADER, self.credential.expose())
            .header(ACCEPT, "application/json")
            .query(&[
                ("branch", self.target.branch.as_str()),
                ("reporting-window", self.target.reporting_window.as_str()),
            ]);
        if let Some(token) = page_token {
            request = request.query(&[("page-token", token)]);
        }

        let response = request.send().await.map_err(FetchError::transport)?;
        let status = response.status();
        let body = response.bytes().await.map_err(FetchError::transport)?;

        if !status.is_success() {
            return Err(FetchError::Remote {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let page: WorkflowInsightPage = serde_json::from_slice(&body)?;
        debug!(
            items = page.items.len(),
            has_next = page.continuation().is_some(),
            "fetched insights page"
        );
        Ok(page)
    }

    /// Fetch every page, threading continuation tokens, and concatenate
    /// the records in response order.
    ///
    /// Any failing page fails the whole call; nothing partial is returned.
    pub async fn fetch_all(&self) -> Result<Vec<WorkflowInsightRecord>, FetchError> {
        let mut records = Vec::new();
        let mut seen = HashSet::new();
        let mut token: Option<String> = None;

        for pages in 1..=MAX_PAGES {
            let page = self.fetch_page(token.as_deref()).await?;
            let next = page.continuation().map(str::to_string);
            records.extend(page.items);

            let Some(next) = next else {
                debug!(pages, records = records.len(), "fetched all insights pages");
                return Ok(records);
            };
            if !seen.insert(next.clone()) {
                warn!(token = %next, "insights API repeated a page token");
                return Err(FetchError::Pagination(format!(
                    "page token {next:?} repeated after {pages} pages"
                )));
            }
            token = Some(next);
        }

        Err(FetchError::Pagination(format!(
            "more than {MAX_PAGES} pages"
        )))
    }
}

impl InsightSource for InsightsClient {
    async fn fetch_all(&self) -> Result<Vec<WorkflowInsightRecord>, FetchError> {
        InsightsClient::fetch_all(self).await
    }
}

fn truncate_body(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.len() <= MAX_ERROR_BODY {
        return text.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

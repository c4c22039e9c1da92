use reqwest::{header::CONTENT_TYPE, Client, Response, StatusCode};
use url::Url;

use crate::{
    error::{MockServerError, MockServerResult},
    model::Expectation,
    ControlPlane,
};

/// Client for the `/mockserver/*` control endpoints of a running MockServer.
#[derive(Clone)]
pub struct MockServerClient {
    client: Client,
    base_url: Url,
}

impl MockServerClient {
    pub fn new(base_url: &str) -> MockServerResult<Self> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> MockServerResult<Self> {
        let mut base_url = Url::parse(base_url)?;
        // `Url::join` replaces the last segment unless the path ends with a slash
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self { client, base_url })
    }

    /// Base URL of the mock server. Requests sent here are matched against
    /// the registered expectations.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> MockServerResult<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Clears every expectation and recorded request.
    pub async fn reset(&self) -> MockServerResult<()> {
        let response = self
            .client
            .put(self.endpoint("mockserver/reset")?)
            .send()
            .await?;
        expect_status(response, StatusCode::OK).await?;
        log::debug!("Reset mock server at {}", self.base_url);

        Ok(())
    }

    pub async fn register(&self, expectation: &Expectation) -> MockServerResult<()> {
        let body = serde_json::to_vec(expectation)?;
        let response = self
            .client
            .put(self.endpoint("mockserver/expectation")?)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        expect_status(response, StatusCode::CREATED).await?;

        Ok(())
    }

    pub async fn retrieve_active_expectations(&self) -> MockServerResult<Vec<Expectation>> {
        let response = self
            .client
            .put(self.endpoint("mockserver/retrieve")?)
            .query(&[("type", "ACTIVE_EXPECTATIONS"), ("format", "JSON")])
            .send()
            .await?;
        let response = expect_status(response, StatusCode::OK).await?;

        let text = response.text().await?;
        // an empty rule table may come back as an empty body
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&text)?)
    }
}

async fn expect_status(response: Response, expected: StatusCode) -> MockServerResult<Response> {
    let status = response.status();
    if status != expected {
        let body = response.text().await.unwrap_or_default();
        log::warn!("Unexpected mock server response {status}: {body}");
        return Err(MockServerError::Rejected { status, body });
    }

    Ok(response)
}

impl ControlPlane for MockServerClient {
    async fn reset(&self) -> MockServerResult<()> {
        MockServerClient::reset(self).await
    }

    async fn register(&self, expectation: &Expectation) -> MockServerResult<()> {
        MockServerClient::register(self, expectation).await
    }

    async fn retrieve_active_expectations(&self) -> MockServerResult<Vec<Expectation>> {
        MockServerClient::retrieve_active_expectations(self).await
    }
}

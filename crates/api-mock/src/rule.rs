use std::path::{Path, PathBuf};

use api_mock_mockserver::{Expectation, HttpRequest, HttpResponse};

use crate::{
    error::{RegistrarError, RegistrarResult},
    instance::InstanceId,
};

/// Host header of the link-local instance metadata service.
pub const METADATA_HOST: &str = "169.254.169.254";
/// Host header of the public Hetzner Cloud API.
pub const API_HOST: &str = "api.hetzner.cloud";
pub const DEFAULT_HCLOUD_TOKEN: &str = "hcloudtoken";

const APPLICATION_JSON: &str = "application/json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    /// Served as-is.
    Literal(String),
    /// Path relative to the fixtures directory, served verbatim.
    Fixture(PathBuf),
}

/// A request matcher and the response template registered for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub method: &'static str,
    pub path: String,
    pub headers: Vec<(&'static str, String)>,
    pub response_headers: Vec<(&'static str, &'static str)>,
    pub body: ResponseBody,
}

impl Rule {
    fn get(path: impl Into<String>, body: ResponseBody) -> Self {
        Self {
            method: "GET",
            path: path.into(),
            headers: Vec::new(),
            response_headers: Vec::new(),
            body,
        }
    }

    fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    fn response_header(mut self, name: &'static str, value: &'static str) -> Self {
        self.response_headers.push((name, value));
        self
    }

    fn metadata(path: &str, body: ResponseBody) -> Self {
        Self::get(path, body).header("Host", METADATA_HOST)
    }

    fn api(path: &str, token: &str, fixture: &str) -> Self {
        Self::get(path, ResponseBody::Fixture(fixture.into()))
            .header("Host", API_HOST)
            .header("Authorization", format!("Bearer {token}"))
            .response_header("Content-Type", APPLICATION_JSON)
    }

    /// Resolves the body and converts the rule into its wire form.
    pub async fn into_expectation(self, fixtures_dir: &Path) -> RegistrarResult<Expectation> {
        let body = match self.body {
            ResponseBody::Literal(text) => text,
            ResponseBody::Fixture(relative) => {
                let path = fixtures_dir.join(relative);
                tokio::fs::read_to_string(&path)
                    .await
                    .map_err(|source| RegistrarError::Fixture { path, source })?
            }
        };

        let request = self
            .headers
            .into_iter()
            .fold(
                HttpRequest::new().method(self.method).path(self.path),
                |request, (name, value)| request.header(name, value),
            );
        let response = self
            .response_headers
            .into_iter()
            .fold(HttpResponse::new(), |response, (name, value)| {
                response.header(name, value)
            })
            .body(body);

        Ok(Expectation::new(request, response))
    }
}

/// Every rule needed to simulate the metadata service and the cloud API
/// for a single node.
pub fn hcloud_rules(instance_id: &InstanceId, token: &str) -> Vec<Rule> {
    vec![
        Rule::metadata(
            "/latest/user-data",
            ResponseBody::Fixture("latest/user-data.yml".into()),
        ),
        Rule::metadata(
            "/hetzner/v1/metadata/instance-id",
            ResponseBody::Literal(instance_id.as_str().to_string()),
        ),
        Rule::api("/v1/networks/50343", token, "v1/networks/50343.json"),
        Rule::api("/v1/floating_ips", token, "v1/floating_ips.json"),
        Rule::api("/v1/servers", token, "v1/_servers.json"),
        Rule::api("/v1/servers/4406144", token, "v1/servers/4406144.json"),
        Rule::api("/v1/servers/4406228", token, "v1/servers/4406228.json"),
    ]
}

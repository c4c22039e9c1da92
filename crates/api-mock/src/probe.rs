use api_mock_mockserver::{Expectation, MockServerError};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Client, Method,
};
use url::Url;

use crate::error::{RegistrarError, RegistrarResult};

/// Replays the matcher of every expectation against the mock server and
/// checks the answer is the registered response.
pub async fn probe(
    client: &Client,
    base_url: &Url,
    expectations: &[Expectation],
) -> RegistrarResult<()> {
    for expectation in expectations {
        probe_one(client, base_url, expectation).await?;
    }

    log::info!("Probed {} expectations.", expectations.len());
    Ok(())
}

async fn probe_one(client: &Client, base_url: &Url, expectation: &Expectation) -> RegistrarResult<()> {
    let path = expectation.path();
    let mismatch = |reason: String| RegistrarError::ProbeMismatch {
        path: path.to_string(),
        reason,
    };

    let request = &expectation.http_request;
    let method = request.method.as_deref().unwrap_or("GET");
    let method = Method::from_bytes(method.as_bytes())
        .map_err(|_| mismatch(format!("invalid method {method}")))?;

    let mut headers = HeaderMap::new();
    for (name, values) in &request.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| mismatch(format!("invalid header name {name}")))?;
        for value in values {
            let value = HeaderValue::from_str(value)
                .map_err(|_| mismatch(format!("invalid value for header {name}")))?;
            headers.append(name.clone(), value);
        }
    }

    let url = base_url
        .join(path.trim_start_matches('/'))
        .map_err(MockServerError::from)?;
    let response = client
        .request(method, url)
        .headers(headers)
        .send()
        .await
        .map_err(MockServerError::from)?;

    let status = response.status();
    if status.as_u16() != expectation.http_response.status_code {
        return Err(mismatch(format!(
            "expected status {}, got {status}",
            expectation.http_response.status_code
        )));
    }

    for (name, values) in &expectation.http_response.headers {
        let actual: Vec<_> = response
            .headers()
            .get_all(name.as_str())
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect();
        if !values.iter().all(|value| actual.contains(&value.as_str())) {
            return Err(mismatch(format!(
                "expected header {name}: {values:?}, got {actual:?}"
            )));
        }
    }

    let expected = match &expectation.http_response.body {
        Some(body) => body
            .as_text()
            .ok_or_else(|| mismatch("structured bodies can not be probed".to_string()))?,
        None => "",
    };
    let actual = response.bytes().await.map_err(MockServerError::from)?;
    if actual.as_ref() != expected.as_bytes() {
        return Err(mismatch(format!(
            "body differs: expected {} bytes, got {} bytes",
            expected.len(),
            actual.len()
        )));
    }

    log::debug!("Probe of {path} matched.");
    Ok(())
}

pub mod client;
pub mod error;
pub mod model;

pub use client::MockServerClient;
pub use error::{MockServerError, MockServerResult};
pub use model::{Body, Expectation, Headers, HttpRequest, HttpResponse, Times};

/// The subset of the MockServer control API needed to prime a rule table.
///
/// Implemented by [`MockServerClient`]; tests substitute recording fakes.
pub trait ControlPlane {
    fn reset(&self) -> impl std::future::Future<Output = MockServerResult<()>> + Send;

    fn register(
        &self,
        expectation: &Expectation,
    ) -> impl std::future::Future<Output = MockServerResult<()>> + Send;

    fn retrieve_active_expectations(
        &self,
    ) -> impl std::future::Future<Output = MockServerResult<Vec<Expectation>>> + Send;
}

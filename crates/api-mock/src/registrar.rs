use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use api_mock_mockserver::{ControlPlane, Expectation};
use futures::future::join_all;

use crate::{
    error::{RegistrarError, RegistrarResult},
    instance::InstanceId,
    rule::{hcloud_rules, Rule, DEFAULT_HCLOUD_TOKEN},
};

/// Expectations accepted by the mock server in a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationReport {
    pub expectations: Vec<Expectation>,
}

/// Resets a mock server and registers the fixture rule table on it.
pub struct Registrar<C> {
    control: C,
    fixtures_dir: PathBuf,
    token: String,
}

impl<C> Registrar<C>
where
    C: ControlPlane,
{
    pub fn new(control: C, fixtures_dir: impl Into<PathBuf>) -> Self {
        Self {
            control,
            fixtures_dir: fixtures_dir.into(),
            token: DEFAULT_HCLOUD_TOKEN.to_string(),
        }
    }

    /// Token the simulated API requires in its `Authorization` header.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    pub fn control(&self) -> &C {
        &self.control
    }

    pub fn fixtures_dir(&self) -> &Path {
        &self.fixtures_dir
    }

    /// Validates the raw instance id before touching the mock server, then
    /// registers the rule table.
    pub async fn run(&self, instance_id: Option<&str>) -> RegistrarResult<RegistrationReport> {
        let instance_id = InstanceId::new(instance_id.unwrap_or_default())?;
        self.register(&instance_id).await
    }

    pub async fn register(&self, instance_id: &InstanceId) -> RegistrarResult<RegistrationReport> {
        self.control.reset().await?;
        log::info!("Mock server reset, registering fixtures for instance {instance_id}");

        let rules = hcloud_rules(instance_id, &self.token);
        let total = rules.len();
        // every registration settles before the outcome is reported
        let results = join_all(rules.into_iter().map(|rule| self.register_rule(rule))).await;

        let mut expectations = Vec::with_capacity(total);
        let mut failed = Vec::new();
        let mut first_error = None;
        for (path, result) in results {
            match result {
                Ok(expectation) => expectations.push(expectation),
                Err(e) => {
                    log::error!("Registering {path} failed: {e}");
                    failed.push(path);
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(source) = first_error {
            return Err(RegistrarError::Registration {
                failed,
                source: Box::new(source),
            });
        }

        log::info!("Registered {total} expectations.");
        Ok(RegistrationReport { expectations })
    }

    async fn register_rule(&self, rule: Rule) -> (String, RegistrarResult<Expectation>) {
        let path = rule.path.clone();
        let result = async {
            let expectation = rule.into_expectation(&self.fixtures_dir).await?;
            self.control.register(&expectation).await?;
            log::debug!("Registered {}", expectation.path());
            Ok::<_, RegistrarError>(expectation)
        }
        .await;

        (path, result)
    }

    /// Checks that exactly the reported expectations are active on the
    /// mock server.
    pub async fn verify(&self, report: &RegistrationReport) -> RegistrarResult<()> {
        let active = self.control.retrieve_active_expectations().await?;
        let active_paths: HashSet<_> = active.iter().map(Expectation::path).collect();

        let missing: Vec<_> = report
            .expectations
            .iter()
            .map(Expectation::path)
            .filter(|path| !active_paths.contains(path))
            .map(ToString::to_string)
            .collect();

        if active.len() != report.expectations.len() || !missing.is_empty() {
            return Err(RegistrarError::Verification {
                expected: report.expectations.len(),
                actual: active.len(),
                missing,
            });
        }

        log::info!("Verified {} active expectations.", active.len());
        Ok(())
    }
}

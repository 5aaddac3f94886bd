//! Suite aggregator
//!
//! Groups test cases under a subject, runs them one after another and tallies
//! the results.

use std::future::Future;

use tracing::{info, info_span, Instrument};

use crate::case::{TestCase, TestResult};
use crate::config::RunConfig;
use crate::failure::{capture, Failure};
use crate::scenario::Scenario;

/// Aggregated result of a suite run
#[derive(Debug, Clone)]
pub struct SuiteResult {
    pub number_of_tests: usize,
    pub number_passed: usize,
    pub number_failed: usize,

    /// Logical AND over every test result, false when the suite declaration failed
    pub passed: bool,

    /// Failure of the suite-level declaration callback; no case ran
    pub error: Option<Failure>,

    pub results: Vec<TestResult>,
}

impl SuiteResult {
    pub fn new() -> Self {
        Self {
            number_of_tests: 0,
            number_passed: 0,
            number_failed: 0,
            passed: true,
            error: None,
            results: Vec::new(),
        }
    }

    fn declaration_failed(error: Failure) -> Self {
        Self {
            passed: false,
            error: Some(error),
            ..Self::new()
        }
    }

    pub fn add_result(&mut self, result: TestResult) {
        self.number_of_tests += 1;

        if result.passed {
            self.number_passed += 1;
        } else {
            self.number_failed += 1;
            self.passed = false;
        }

        self.results.push(result);
    }

    pub fn failures(&self) -> impl Iterator<Item = &TestResult> {
        self.results.iter().filter(|result| !result.passed)
    }
}

impl Default for SuiteResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Test cases declared about one subject
pub struct Suite<S> {
    subject: S,
    cases: Vec<TestCase>,
    config: RunConfig,
    declaration: Result<(), Failure>,
}

impl<S> Suite<S> {
    pub fn new(subject: S) -> Self {
        Self {
            subject,
            cases: Vec::new(),
            config: RunConfig::default(),
            declaration: Ok(()),
        }
    }

    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    pub fn subject(&self) -> &S {
        &self.subject
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Register a test case about the subject; `define` runs immediately
    pub fn declare<F>(&mut self, description: impl Into<String>, define: F) -> &mut Self
    where
        F: FnOnce(&Scenario, &S) -> anyhow::Result<()>,
    {
        let case = TestCase::declare(description, &self.subject, define);
        self.add(case)
    }

    /// Alias of [`Suite::declare`]
    pub fn test_that<F>(&mut self, description: impl Into<String>, define: F) -> &mut Self
    where
        F: FnOnce(&Scenario, &S) -> anyhow::Result<()>,
    {
        self.declare(description, define)
    }

    /// Register a test case whose declaration callback suspends
    pub fn declare_async<F, Fut>(&mut self, description: impl Into<String>, define: F) -> &mut Self
    where
        S: Clone,
        F: FnOnce(Scenario, S) -> Fut,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        let case = TestCase::declare_async(description, self.subject.clone(), define);
        self.add(case)
    }

    /// Alias of [`Suite::declare_async`]
    pub fn test_that_async<F, Fut>(
        &mut self,
        description: impl Into<String>,
        define: F,
    ) -> &mut Self
    where
        S: Clone,
        F: FnOnce(Scenario, S) -> Fut,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        self.declare_async(description, define)
    }

    /// Register an already declared test case
    pub fn add(&mut self, case: TestCase) -> &mut Self {
        self.cases.push(case);
        self
    }

    /// Settle every declaration callback without running anything
    ///
    /// Resolves to the first declaration failure, if any, starting with the
    /// suite-level callback.
    pub async fn defined(&mut self) -> Result<(), Failure> {
        let mut first_failure = self.declaration.clone().err();

        for case in &mut self.cases {
            if let Err(error) = case.defined().await {
                first_failure.get_or_insert(error);
            }
        }

        match first_failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Run every test case in registration order, one at a time
    pub async fn run(self) -> SuiteResult {
        let Suite {
            cases,
            config,
            declaration,
            ..
        } = self;
        let span = info_span!("suite", number_of_tests = cases.len());

        async move {
            if let Err(error) = declaration {
                info!(error = %error, "suite declaration failed");
                return SuiteResult::declaration_failed(error);
            }

            let mut report = SuiteResult::new();

            for case in cases {
                let result = case.with_config(config.clone()).run().await;
                let failed = !result.passed;
                report.add_result(result);

                if failed && config.stop_on_first_failure {
                    info!("stopping after first failure");
                    break;
                }
            }

            info!(
                number_of_tests = report.number_of_tests,
                number_failed = report.number_failed,
                passed = report.passed,
                "suite finished"
            );
            report
        }
        .instrument(span)
        .await
    }

    /// Run the suite on the current thread, blocking until it finishes
    ///
    /// No tokio runtime is entered. Suites whose steps use tokio timers or IO
    /// must `run().await` inside that runtime instead.
    pub fn run_blocking(self) -> SuiteResult {
        futures::executor::block_on(self.run())
    }
}

/// Declare a suite of test cases about `subject`
///
/// An `Err` or a panic from `define` is captured: [`Suite::defined`] reports
/// it and [`Suite::run`] yields a failing result without running any case.
pub fn regarding<S, F>(subject: S, define: F) -> Suite<S>
where
    F: FnOnce(&mut Suite<S>) -> anyhow::Result<()>,
{
    let mut suite = Suite::new(subject);
    let declaration = capture(true, || define(&mut suite));
    suite.declaration = declaration;
    suite
}

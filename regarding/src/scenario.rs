//! Declaration API for a single test case
//!
//! A [`Scenario`] is handed to the declaration callback of a test case. It
//! registers preconditions, the action under test and observations. Each
//! registration returns a small builder exposing only the continuations valid
//! for it: a plain-value given cannot take a cleanup, a computed one can.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use serde_json::Value;

use crate::error::{DeclarationError, Result};
use crate::failure::{capture, capture_async, Failure};
use crate::given::{Cleanup, GivenEntry, Setup};
use crate::outcome::Outcome;
use crate::variables::TestVariables;

type ActionFn = Box<dyn FnOnce(TestVariables) -> anyhow::Result<Value>>;
type AsyncActionFn =
    Box<dyn FnOnce(TestVariables) -> LocalBoxFuture<'static, anyhow::Result<Value>>>;
type ObservationFn = Box<dyn FnOnce(Option<&Outcome>, &TestVariables) -> anyhow::Result<()>>;
type AsyncObservationFn =
    Box<dyn FnOnce(Option<Outcome>, TestVariables) -> LocalBoxFuture<'static, anyhow::Result<()>>>;

/// The action under test
pub(crate) enum Action {
    Sync(ActionFn),
    Async(AsyncActionFn),
}

impl Action {
    /// Run the action and normalize whatever happens into an [`Outcome`]
    pub(crate) async fn perform(self, variables: TestVariables, catch_panics: bool) -> Outcome {
        match self {
            Action::Sync(action) => match capture(catch_panics, move || action(variables)) {
                Ok(value) => Outcome::Returned(value),
                Err(error) => Outcome::Threw(error),
            },
            Action::Async(action) => {
                let pending = match capture(catch_panics, move || Ok(action(variables))) {
                    Ok(pending) => pending,
                    Err(error) => return Outcome::Threw(error),
                };
                match capture_async(catch_panics, pending).await {
                    Ok(value) => Outcome::Fulfilled(value),
                    Err(error) => Outcome::Rejected(error),
                }
            }
        }
    }
}

/// An observation of the outcome and variables
pub(crate) enum Observation {
    Sync(ObservationFn),
    Async(AsyncObservationFn),
}

impl Observation {
    pub(crate) async fn inspect(
        self,
        outcome: Option<Outcome>,
        variables: TestVariables,
        catch_panics: bool,
    ) -> std::result::Result<(), Failure> {
        match self {
            Observation::Sync(observe) => {
                capture(catch_panics, move || observe(outcome.as_ref(), &variables))
            }
            Observation::Async(observe) => {
                let pending = capture(catch_panics, move || Ok(observe(outcome, variables)))?;
                capture_async(catch_panics, pending).await
            }
        }
    }
}

/// Everything declared for one test case
#[derive(Default)]
pub(crate) struct Blueprint {
    pub(crate) description: String,
    pub(crate) givens: Vec<GivenEntry>,
    pub(crate) when: Option<Action>,
    pub(crate) thens: Vec<Observation>,
    sealed: bool,
}

/// Handle used to declare the steps of a test case
#[derive(Clone)]
pub struct Scenario {
    inner: Rc<RefCell<Blueprint>>,
}

impl Scenario {
    pub(crate) fn new(description: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Blueprint {
                description: description.into(),
                ..Blueprint::default()
            })),
        }
    }

    pub fn description(&self) -> String {
        self.inner.borrow().description.clone()
    }

    /// Register a precondition from a plain mapping
    pub fn given(&self, variables: impl Into<TestVariables>) -> Result<StaticGiven> {
        let index = self.push_given(Setup::Value(variables.into()))?;
        Ok(StaticGiven { index })
    }

    /// Register a precondition from a JSON object
    pub fn given_json(&self, value: Value) -> Result<StaticGiven> {
        let variables = TestVariables::from_json(value)?;
        self.given(variables)
    }

    /// Register a precondition from a pending computation of a mapping
    pub fn given_deferred<Fut>(&self, pending: Fut) -> Result<StaticGiven>
    where
        Fut: Future<Output = anyhow::Result<TestVariables>> + 'static,
    {
        let index = self.push_given(Setup::Deferred(pending.boxed_local()))?;
        Ok(StaticGiven { index })
    }

    /// Register a precondition computed from the variables accumulated so far
    pub fn given_with<F>(&self, setup: F) -> Result<GivenHandle>
    where
        F: FnOnce(TestVariables) -> anyhow::Result<TestVariables> + 'static,
    {
        let index = self.push_given(Setup::Compute(Box::new(setup)))?;
        Ok(GivenHandle {
            scenario: self.clone(),
            index,
        })
    }

    /// Register a precondition computed asynchronously from the variables accumulated so far
    pub fn given_async<F, Fut>(&self, setup: F) -> Result<GivenHandle>
    where
        F: FnOnce(TestVariables) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<TestVariables>> + 'static,
    {
        let setup = Setup::ComputeAsync(Box::new(move |variables: TestVariables| {
            setup(variables).boxed_local()
        }));
        let index = self.push_given(setup)?;
        Ok(GivenHandle {
            scenario: self.clone(),
            index,
        })
    }

    /// Register the action under test
    pub fn when<F, V>(&self, action: F) -> Result<()>
    where
        F: FnOnce(TestVariables) -> anyhow::Result<V> + 'static,
        V: Into<Value>,
    {
        self.set_action(Action::Sync(Box::new(move |variables: TestVariables| {
            action(variables).map(|value| -> Value { value.into() })
        })))
    }

    /// Register an asynchronous action under test
    pub fn when_async<F, Fut, V>(&self, action: F) -> Result<()>
    where
        F: FnOnce(TestVariables) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<V>> + 'static,
        V: Into<Value>,
    {
        self.set_action(Action::Async(Box::new(move |variables: TestVariables| {
            action(variables)
                .map(|result| result.map(|value| -> Value { value.into() }))
                .boxed_local()
        })))
    }

    /// Alias of [`Scenario::when`]
    pub fn exercise<F, V>(&self, action: F) -> Result<()>
    where
        F: FnOnce(TestVariables) -> anyhow::Result<V> + 'static,
        V: Into<Value>,
    {
        self.when(action)
    }

    /// Register an observation, called with the action outcome (absent when
    /// no action was declared) and the final variables
    pub fn then<F>(&self, observation: F) -> Result<Observations>
    where
        F: FnOnce(Option<&Outcome>, &TestVariables) -> anyhow::Result<()> + 'static,
    {
        self.push_observation(Observation::Sync(Box::new(observation)))
    }

    /// Register an asynchronous observation
    pub fn then_async<F, Fut>(&self, observation: F) -> Result<Observations>
    where
        F: FnOnce(Option<Outcome>, TestVariables) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        self.push_observation(Observation::Async(Box::new(
            move |outcome: Option<Outcome>, variables: TestVariables| {
                observation(outcome, variables).boxed_local()
            },
        )))
    }

    /// Alias of [`Scenario::then`]
    pub fn one_may<F>(&self, observation: F) -> Result<Observations>
    where
        F: FnOnce(Option<&Outcome>, &TestVariables) -> anyhow::Result<()> + 'static,
    {
        self.then(observation)
    }

    /// Alias of [`Scenario::then`]
    pub fn verify<F>(&self, observation: F) -> Result<Observations>
    where
        F: FnOnce(Option<&Outcome>, &TestVariables) -> anyhow::Result<()> + 'static,
    {
        self.then(observation)
    }

    /// Close the declaration; later registrations fail with [`DeclarationError::Sealed`]
    pub(crate) fn seal(&self) {
        self.inner.borrow_mut().sealed = true;
    }

    /// Move the declared steps out, leaving an empty sealed blueprint behind
    pub(crate) fn take_blueprint(&self) -> Blueprint {
        let mut blueprint = self.inner.borrow_mut();
        let description = blueprint.description.clone();
        std::mem::replace(
            &mut *blueprint,
            Blueprint {
                description,
                sealed: true,
                ..Blueprint::default()
            },
        )
    }

    fn register<T>(&self, f: impl FnOnce(&mut Blueprint) -> Result<T>) -> Result<T> {
        let mut blueprint = self.inner.borrow_mut();
        if blueprint.sealed {
            return Err(DeclarationError::sealed(blueprint.description.clone()));
        }
        f(&mut blueprint)
    }

    fn push_given(&self, setup: Setup) -> Result<usize> {
        self.register(|blueprint| {
            blueprint.givens.push(GivenEntry::new(setup));
            Ok(blueprint.givens.len() - 1)
        })
    }

    fn attach_cleanup(&self, index: usize, cleanup: Cleanup) -> Result<()> {
        self.register(|blueprint| {
            if let Some(given) = blueprint.givens.get_mut(index) {
                given.taken = Some(cleanup);
            }
            Ok(())
        })
    }

    fn set_action(&self, action: Action) -> Result<()> {
        self.register(|blueprint| {
            if blueprint.when.is_some() {
                return Err(DeclarationError::duplicate_action(blueprint.description.clone()));
            }
            blueprint.when = Some(action);
            Ok(())
        })
    }

    fn push_observation(&self, observation: Observation) -> Result<Observations> {
        self.register(|blueprint| {
            blueprint.thens.push(observation);
            Ok(())
        })?;
        Ok(Observations {
            scenario: self.clone(),
        })
    }
}

/// A given whose setup is a plain value; it has no cleanup
#[derive(Debug, Clone, Copy)]
pub struct StaticGiven {
    index: usize,
}

impl StaticGiven {
    pub fn index(&self) -> usize {
        self.index
    }
}

/// A given whose setup is a computation; a cleanup may be paired with it
pub struct GivenHandle {
    scenario: Scenario,
    index: usize,
}

impl GivenHandle {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Pair a cleanup with this given; it receives the final variables
    pub fn taken<F>(self, cleanup: F) -> Result<()>
    where
        F: FnOnce(TestVariables) -> anyhow::Result<()> + 'static,
    {
        self.scenario
            .attach_cleanup(self.index, Cleanup::Sync(Box::new(cleanup)))
    }

    /// Pair an asynchronous cleanup with this given
    pub fn taken_async<F, Fut>(self, cleanup: F) -> Result<()>
    where
        F: FnOnce(TestVariables) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        let cleanup = Cleanup::Async(Box::new(move |variables: TestVariables| {
            cleanup(variables).boxed_local()
        }));
        self.scenario.attach_cleanup(self.index, cleanup)
    }
}

/// Continuation after registering an observation
pub struct Observations {
    scenario: Scenario,
}

impl Observations {
    /// Register a further observation
    pub fn and<F>(self, observation: F) -> Result<Observations>
    where
        F: FnOnce(Option<&Outcome>, &TestVariables) -> anyhow::Result<()> + 'static,
    {
        self.scenario.then(observation)
    }

    pub fn and_async<F, Fut>(self, observation: F) -> Result<Observations>
    where
        F: FnOnce(Option<Outcome>, TestVariables) -> Fut + 'static,
        Fut: Future<Output = anyhow::Result<()>> + 'static,
    {
        self.scenario.then_async(observation)
    }
}

//! Ordering, cleanup and failure propagation rules of a test case run

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use anyhow::anyhow;
use regarding::{
    regarding, DeclarationError, Phase, RunConfig, Scenario, Suite, TestCase, TestVariables,
};
use serde_json::json;

type Log = Rc<RefCell<Vec<String>>>;

fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

fn entries(log: &Log) -> Vec<String> {
    log.borrow().clone()
}

/// A given that records its setup and cleanup in `log`
fn logged_given(scenario: &Scenario, log: &Log, name: &'static str) -> anyhow::Result<()> {
    let setup_log = log.clone();
    let cleanup_log = log.clone();

    scenario
        .given_with(move |_| {
            setup_log.borrow_mut().push(format!("setup {}", name));
            Ok(TestVariables::new().with(name, true))
        })?
        .taken(move |_| {
            cleanup_log.borrow_mut().push(format!("cleanup {}", name));
            Ok(())
        })?;
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

#[tokio::test]
async fn cleanups_run_in_reverse_declaration_order() {
    init_tracing();
    let log = new_log();

    let scenario_log = log.clone();
    let result = TestCase::declare("ordering", &(), move |scenario, _| {
        logged_given(scenario, &scenario_log, "g1")?;
        logged_given(scenario, &scenario_log, "g2")?;
        let observe_log = scenario_log.clone();
        scenario.then(move |_, _| {
            observe_log.borrow_mut().push("observe".to_string());
            Ok(())
        })?;
        Ok(())
    })
    .run()
    .await;

    assert!(result.passed);
    assert_eq!(
        entries(&log),
        vec!["setup g1", "setup g2", "observe", "cleanup g2", "cleanup g1"]
    );
    let order: Vec<usize> = result.cleanup.iter().map(|record| record.index).collect();
    assert_eq!(order, vec![1, 0]);
}

#[tokio::test]
async fn a_failing_given_skips_its_own_and_later_cleanups() {
    let log = new_log();

    let scenario_log = log.clone();
    let result = TestCase::declare("setup failure", &(), move |scenario, _| {
        logged_given(scenario, &scenario_log, "g1")?;
        scenario
            .given_async(|_| async { Err(anyhow!("setup-error")) })?
            .taken({
                let log = scenario_log.clone();
                move |_| {
                    log.borrow_mut().push("cleanup g2".to_string());
                    Ok(())
                }
            })?;
        logged_given(scenario, &scenario_log, "g3")?;

        let when_log = scenario_log.clone();
        scenario.when(move |_| {
            when_log.borrow_mut().push("when".to_string());
            Ok(())
        })?;
        let observe_log = scenario_log.clone();
        scenario.then(move |_, _| {
            observe_log.borrow_mut().push("observe".to_string());
            Ok(())
        })?;
        Ok(())
    })
    .run()
    .await;

    assert!(!result.passed);
    assert_eq!(result.phase, Some(Phase::Setup));
    assert_eq!(result.error.as_ref().unwrap().message(), "setup-error");
    assert_eq!(entries(&log), vec!["setup g1", "cleanup g1"]);

    assert!(result.setup[0].succeeded());
    assert!(result.setup[1].ran() && !result.setup[1].succeeded());
    assert!(!result.setup[2].ran());
    let ran: Vec<(usize, bool)> = result
        .cleanup
        .iter()
        .map(|record| (record.index, record.ran()))
        .collect();
    assert_eq!(ran, vec![(2, false), (1, false), (0, true)]);
}

#[tokio::test]
async fn a_failing_cleanup_does_not_stop_the_others() {
    let log = new_log();

    let scenario_log = log.clone();
    let result = TestCase::declare("cleanup failure", &(), move |scenario, _| {
        logged_given(scenario, &scenario_log, "g1")?;
        scenario
            .given_with(|_| Ok(TestVariables::new()))?
            .taken_async(|_| async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Err(anyhow!("cleanup-error"))
            })?;
        logged_given(scenario, &scenario_log, "g3")?;
        Ok(())
    })
    .run()
    .await;

    assert!(result.passed, "cleanup failures are reported separately by default");
    assert!(result.error.is_none());
    assert_eq!(
        entries(&log),
        vec!["setup g1", "setup g3", "cleanup g3", "cleanup g1"]
    );

    let cleanup_errors = result.cleanup_errors();
    assert_eq!(cleanup_errors.len(), 1);
    assert_eq!(cleanup_errors[0].message(), "cleanup-error");
}

#[tokio::test]
async fn cleanup_failures_can_fail_the_test() {
    let config = RunConfig {
        fail_on_cleanup_error: true,
        ..RunConfig::default()
    };

    let result = TestCase::declare("strict cleanup", &(), |scenario, _| {
        scenario
            .given_with(|_| Ok(TestVariables::new()))?
            .taken(|_| panic!("cleanup panicked"))?;
        Ok(())
    })
    .with_config(config)
    .run()
    .await;

    assert!(!result.passed);
    assert_eq!(result.phase, Some(Phase::Cleanup));
    assert!(result.error.unwrap().is_panic());
}

#[tokio::test]
async fn cleanup_failures_never_mask_the_primary_failure() {
    let config = RunConfig {
        fail_on_cleanup_error: true,
        ..RunConfig::default()
    };

    let result = TestCase::declare("both fail", &(), |scenario, _| {
        scenario
            .given_with(|_| Ok(TestVariables::new()))?
            .taken(|_| Err(anyhow!("cleanup-error")))?;
        scenario.then(|_, _| Err(anyhow!("observation-error")))?;
        Ok(())
    })
    .with_config(config)
    .run()
    .await;

    assert!(!result.passed);
    assert_eq!(result.phase, Some(Phase::Observation));
    assert_eq!(result.error.as_ref().unwrap().message(), "observation-error");
    assert_eq!(result.cleanup_errors().len(), 1);
}

#[tokio::test]
async fn the_first_failing_observation_stops_the_rest() {
    let log = new_log();

    let scenario_log = log.clone();
    let result = TestCase::declare("observations", &(), move |scenario, _| {
        let first = scenario_log.clone();
        let third = scenario_log.clone();
        scenario
            .then(move |_, _| {
                first.borrow_mut().push("first".to_string());
                Ok(())
            })?
            .and_async(|_, _| async { Err(anyhow!("second failed")) })?
            .and(move |_, _| {
                third.borrow_mut().push("third".to_string());
                Ok(())
            })?;
        Ok(())
    })
    .run()
    .await;

    assert!(!result.passed);
    assert_eq!(result.error.unwrap().message(), "second failed");
    assert_eq!(entries(&log), vec!["first"]);
}

#[tokio::test]
async fn observations_receive_defensive_copies() {
    let result = TestCase::declare("copies", &(), |scenario, _| {
        scenario.given(TestVariables::from([("foo", "bar")]))?;
        scenario.then_async(|_, mut variables| async move {
            variables.insert("foo", "changed");
            Ok(())
        })?;
        scenario.then(|_, variables| {
            anyhow::ensure!(variables.get_str("foo") == Some("bar"));
            Ok(())
        })?;
        Ok(())
    })
    .run()
    .await;

    assert!(result.passed, "{:?}", result.error);
}

#[tokio::test]
async fn observations_see_no_outcome_without_an_action() {
    let result = TestCase::declare("no action", &(), |scenario, _| {
        scenario.then(|outcome, _| {
            anyhow::ensure!(outcome.is_none());
            Ok(())
        })?;
        Ok(())
    })
    .run()
    .await;

    assert!(result.passed);
}

#[tokio::test]
async fn a_panicking_action_is_a_throw() {
    let result = TestCase::declare("panicking action", &(), |scenario, _| {
        scenario.when(|_| -> anyhow::Result<u32> { panic!("action panicked") })?;
        scenario.then(|outcome, _| {
            let outcome = outcome.ok_or_else(|| anyhow!("missing outcome"))?;
            anyhow::ensure!(outcome.threw() && !outcome.rejected());
            anyhow::ensure!(outcome.error().map_or(false, |error| error.is_panic()));
            Ok(())
        })?;
        Ok(())
    })
    .run()
    .await;

    assert!(result.passed, "{:?}", result.error);
}

#[tokio::test]
async fn a_panicking_async_action_factory_is_a_throw() {
    let result = TestCase::declare("panicking factory", &(), |scenario, _| {
        scenario.when_async(|_| -> std::future::Ready<anyhow::Result<serde_json::Value>> {
            panic!("factory panicked")
        })?;
        scenario.then(|outcome, _| {
            let outcome = outcome.ok_or_else(|| anyhow!("missing outcome"))?;
            anyhow::ensure!(outcome.threw() && !outcome.rejected());
            anyhow::ensure!(!outcome.promised());
            anyhow::ensure!(outcome.error().map_or(false, |error| error.is_panic()));
            Ok(())
        })?;
        Ok(())
    })
    .run()
    .await;

    assert!(result.passed, "{:?}", result.error);
}

#[tokio::test]
async fn cleanups_receive_the_final_variables() {
    let cleaned_with = Rc::new(RefCell::new(None));

    let recorder = cleaned_with.clone();
    let result = TestCase::declare("final variables", &(), move |scenario, _| {
        scenario
            .given_with(|_| Ok(TestVariables::new().with("first", 1)))?
            .taken(move |variables| {
                *recorder.borrow_mut() = Some(variables.into_json());
                Ok(())
            })?;
        scenario.given([("second", 2)])?;
        scenario.given_with(|_| Ok(TestVariables::new().with("first", 3)))?;
        Ok(())
    })
    .run()
    .await;

    assert!(result.passed, "{:?}", result.error);
    assert_eq!(
        *cleaned_with.borrow(),
        Some(json!({ "first": 3, "second": 2 }))
    );
}

#[tokio::test]
async fn cleanups_after_a_failing_given_receive_the_variables_so_far() {
    let cleaned_with = Rc::new(RefCell::new(None));

    let recorder = cleaned_with.clone();
    let result = TestCase::declare("partial variables", &(), move |scenario, _| {
        scenario
            .given_with(|_| Ok(TestVariables::new().with("first", 1)))?
            .taken(move |variables| {
                *recorder.borrow_mut() = Some(variables.into_json());
                Ok(())
            })?;
        scenario.given([("second", 2)])?;
        scenario.given_with(|_| Err(anyhow!("setup-error")))?;
        scenario.given([("never", true)])?;
        Ok(())
    })
    .run()
    .await;

    assert_eq!(result.phase, Some(Phase::Setup));
    assert_eq!(
        *cleaned_with.borrow(),
        Some(json!({ "first": 1, "second": 2 }))
    );
}

#[tokio::test]
async fn registering_after_declaration_is_rejected() {
    let stash: Rc<RefCell<Option<Scenario>>> = Rc::new(RefCell::new(None));

    let keep = stash.clone();
    let mut case = TestCase::declare("stash", &(), move |scenario, _| {
        *keep.borrow_mut() = Some(scenario.clone());
        Ok(())
    });
    case.defined().await.unwrap();

    let scenario = stash.borrow_mut().take().unwrap();
    let err = scenario.given([("late", true)]).unwrap_err();
    assert_eq!(err, DeclarationError::sealed("stash"));
}

#[tokio::test]
async fn async_declarations_settle_before_running() {
    let mut suite = Suite::new("subject".to_string());
    suite.declare_async("suspends", |scenario, subject| async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        scenario.given_json(json!({ "subject": subject }))?;
        scenario.then(|_, variables| {
            anyhow::ensure!(variables.get_str("subject") == Some("subject"));
            Ok(())
        })?;
        Ok(())
    });
    suite.test_that_async("rejects", |_, _| async {
        Err(anyhow!("declaration-error"))
    });

    let failure = suite.defined().await.unwrap_err();
    assert_eq!(failure.message(), "declaration-error");

    let results = suite.run().await;
    assert_eq!(results.number_of_tests, 2);
    assert!(results.results[0].passed, "{:?}", results.results[0].error);
    assert_eq!(results.results[1].phase, Some(Phase::Declaration));
}

#[tokio::test]
async fn a_panicking_declaration_is_captured() {
    let results = regarding("subject", |suite| {
        suite.test_that("panics", |_, _| panic!("declaration panicked"));
        Ok(())
    })
    .run()
    .await;

    assert!(!results.passed);
    assert_eq!(results.results[0].phase, Some(Phase::Declaration));
}

#[tokio::test]
async fn a_panicking_suite_declaration_is_captured() {
    let mut suite = regarding("subject", |suite| {
        suite.test_that("fine", |_, _| Ok(()));
        panic!("suite-level declaration failed")
    });

    let failure = suite.defined().await.unwrap_err();
    assert!(failure.is_panic());
    assert!(failure.message().contains("suite-level declaration failed"));

    let results = suite.run().await;
    assert!(!results.passed);
    assert_eq!(results.number_of_tests, 0);
    assert!(results.error.is_some());
}

#[tokio::test]
async fn a_failing_suite_declaration_is_reported_first() {
    let mut suite = regarding("subject", |suite| {
        suite.test_that("fails too", |_, _| Err(anyhow!("case-error")));
        Err(anyhow!("suite-error"))
    });

    let failure = suite.defined().await.unwrap_err();
    assert_eq!(failure.message(), "suite-error");
}

#[tokio::test]
async fn cases_run_one_after_another() {
    let log = new_log();

    let suite_log = log.clone();
    let results = regarding("subject", move |suite| {
        for name in ["a", "b"] {
            let log = suite_log.clone();
            suite.test_that(name, move |scenario, _| {
                let setup_log = log.clone();
                let cleanup_log = log.clone();
                scenario
                    .given_async(move |_| async move {
                        setup_log.borrow_mut().push(format!("setup {}", name));
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        Ok(TestVariables::new())
                    })?
                    .taken_async(move |_| async move {
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        cleanup_log.borrow_mut().push(format!("cleanup {}", name));
                        Ok(())
                    })?;
                Ok(())
            });
        }
        Ok(())
    })
    .run()
    .await;

    assert!(results.passed);
    assert_eq!(
        entries(&log),
        vec!["setup a", "cleanup a", "setup b", "cleanup b"]
    );
}

#[tokio::test]
async fn stop_on_first_failure() {
    let config = RunConfig::from_toml_str("stop_on_first_failure = true").unwrap();

    let results = regarding("subject", |suite| {
        suite
            .test_that("fails", |scenario, _| {
                scenario.then(|_, _| Err(anyhow!("nope")))?;
                Ok(())
            })
            .test_that("never runs", |_, _| Ok(()));
        Ok(())
    })
    .with_config(config)
    .run()
    .await;

    assert!(!results.passed);
    assert_eq!(results.number_of_tests, 1);
}

#[tokio::test]
async fn single_case_entry_point() {
    regarding::test(|scenario| {
        scenario.given([("foo", "bar")])?;
        scenario.then(|_, variables| {
            anyhow::ensure!(variables.get_str("foo") == Some("bar"));
            Ok(())
        })?;
        Ok(())
    })
    .await
    .unwrap();

    let err = regarding::test(|scenario| {
        scenario.given_with(|_| Err(anyhow!("setup-error")))?;
        Ok(())
    })
    .await
    .unwrap_err();
    assert_eq!(err.to_string(), "Test 'test' failed during setup");
}

#[test]
#[should_panic(expected = "escapes the engine")]
fn panics_propagate_when_not_caught() {
    let config = RunConfig {
        catch_panics: false,
        ..RunConfig::default()
    };

    regarding((), |suite| {
        suite.test_that("panics", |scenario, _| {
            scenario.then(|_, _| panic!("escapes the engine"))?;
            Ok(())
        });
        Ok(())
    })
    .with_config(config)
    .run_blocking();
}

//! Quickpromise CLI
//!
//! Runs named promise scenarios on the reference event loop and prints how
//! each one settled.

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use quickpromise::{
    Error, EventLoop, Function, Promise, Runtime, RuntimeConfig, SettledOutcome, Value, VERSION,
};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quickpromise")]
#[command(author, version, about = "Deferred values with thenable interop", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Runtime configuration (JSON)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbose output (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scenarios (all of them when none are named)
    Run {
        /// Scenario names
        names: Vec<String>,
    },

    /// List available scenarios
    List,
}

/// A named demonstration: builds a promise whose settlement is printed
struct Scenario {
    name: &'static str,
    about: &'static str,
    build: fn(&Runtime, &EventLoop) -> Promise,
}

const SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "passthrough",
        about: "links without handlers forward the value",
        build: passthrough,
    },
    Scenario {
        name: "tunneling",
        about: "a rejection skips fulfillment handlers until caught",
        build: tunneling,
    },
    Scenario {
        name: "flattening",
        about: "nested thenables returned from a handler flatten",
        build: flattening,
    },
    Scenario {
        name: "all",
        about: "all keeps input order regardless of completion order",
        build: all_in_order,
    },
    Scenario {
        name: "all-fail-fast",
        about: "all rejects with the first rejection",
        build: all_fail_fast,
    },
    Scenario {
        name: "race",
        about: "race follows whichever input settles first",
        build: race,
    },
    Scenario {
        name: "all-settled",
        about: "allSettled reports every outcome",
        build: all_settled,
    },
    Scenario {
        name: "any",
        about: "any fulfills with the first fulfillment",
        build: any,
    },
    Scenario {
        name: "any-rejected",
        about: "any rejects with an AggregateError when every input rejects",
        build: any_rejected,
    },
    Scenario {
        name: "cycle",
        about: "a promise resolved with itself rejects with a TypeError",
        build: cycle,
    },
    Scenario {
        name: "finally",
        about: "finally observes settlement without changing it",
        build: finally,
    },
];

fn main() {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let result = match cli.command.unwrap_or(Commands::Run { names: Vec::new() }) {
        Commands::List => {
            list_scenarios();
            Ok(())
        }
        Commands::Run { names } => run_scenarios(&names, cli.config.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn setup_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn list_scenarios() {
    println!("Quickpromise {} scenarios:", VERSION);
    for scenario in SCENARIOS {
        println!("  {:<14} {}", scenario.name, scenario.about);
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<RuntimeConfig> {
    let Some(path) = path else {
        return Ok(RuntimeConfig::default());
    };
    // The library error holds `Rc` values, so it is flattened to text here
    RuntimeConfig::from_path(path)
        .map_err(|e| anyhow!("{}", e))
        .with_context(|| format!("loading '{}'", path.display()))
}

fn run_scenarios(names: &[String], config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    let selected: Vec<&Scenario> = if names.is_empty() {
        SCENARIOS.iter().collect()
    } else {
        names
            .iter()
            .map(|name| {
                SCENARIOS
                    .iter()
                    .find(|s| s.name == name.as_str())
                    .ok_or_else(|| anyhow!("unknown scenario '{}' (see `quickpromise list`)", name))
            })
            .collect::<anyhow::Result<_>>()?
    };
    if selected.is_empty() {
        bail!("no scenarios to run");
    }

    for scenario in selected {
        let event_loop = Rc::new(EventLoop::with_config(&config));
        let runtime =
            Runtime::with_config(event_loop.clone(), config.clone()).map_err(|e| anyhow!("{}", e))?;

        let promise = (scenario.build)(&runtime, &event_loop);
        let run = event_loop.run_until_idle();
        tracing::info!(
            scenario = scenario.name,
            microtasks = run.microtasks_processed,
            timers = run.macrotasks_processed,
            final_time = run.final_time,
            "scenario finished"
        );

        match promise.outcome() {
            Some(SettledOutcome::Fulfilled(value)) => {
                println!("{:<14} fulfilled: {}", scenario.name, value)
            }
            Some(SettledOutcome::Rejected(reason)) => {
                println!("{:<14} rejected:  {}", scenario.name, reason)
            }
            None => println!("{:<14} pending", scenario.name),
        }
    }
    Ok(())
}

fn number(value: &Value) -> f64 {
    value.as_number().unwrap_or(f64::NAN)
}

fn list(values: impl IntoIterator<Item = Promise>) -> Value {
    Value::from(values.into_iter().map(Value::from).collect::<Vec<_>>())
}

fn passthrough(runtime: &Runtime, _event_loop: &EventLoop) -> Promise {
    runtime
        .resolve(1)
        .then(None, None)
        .then(None, None)
        .then_fn(|v| Ok(Value::from(number(&v) + 1.0)))
}

fn tunneling(runtime: &Runtime, _event_loop: &EventLoop) -> Promise {
    runtime
        .reject("boom")
        .then_fn(|_| Ok(Value::from("skipped")))
        .then_fn(|_| Ok(Value::from("skipped again")))
        .catch_fn(|reason| Ok(Value::from(format!("caught {}", reason))))
}

fn flattening(runtime: &Runtime, _event_loop: &EventLoop) -> Promise {
    fn thenable(inner: Value) -> Value {
        let then = Function::new("then", move |_this, args| {
            let resolve = args.first().and_then(Value::as_function).cloned();
            match resolve {
                Some(resolve) => resolve.call(&Value::Undefined, &[inner.clone()]),
                None => Ok(Value::Undefined),
            }
        });
        Value::object([("then", Value::from(then))])
    }

    runtime
        .resolve(Value::Undefined)
        .then_fn(|_| Ok(thenable(thenable(thenable(Value::from(42))))))
}

fn all_in_order(runtime: &Runtime, event_loop: &EventLoop) -> Promise {
    let inputs = list([
        event_loop.delayed(runtime, 30, SettledOutcome::Fulfilled(Value::from("a"))),
        event_loop.delayed(runtime, 10, SettledOutcome::Fulfilled(Value::from("b"))),
        event_loop.delayed(runtime, 20, SettledOutcome::Fulfilled(Value::from("c"))),
    ]);
    runtime.all(&inputs)
}

fn all_fail_fast(runtime: &Runtime, event_loop: &EventLoop) -> Promise {
    let inputs = list([
        event_loop.delayed(runtime, 10, SettledOutcome::Fulfilled(Value::from("a"))),
        event_loop.delayed(runtime, 5, SettledOutcome::Rejected(Value::from("x"))),
        event_loop.delayed(runtime, 20, SettledOutcome::Fulfilled(Value::from("c"))),
    ]);
    runtime.all(&inputs)
}

fn race(runtime: &Runtime, event_loop: &EventLoop) -> Promise {
    let inputs = list([
        event_loop.delayed(runtime, 20, SettledOutcome::Fulfilled(Value::from("slow"))),
        event_loop.delayed(runtime, 5, SettledOutcome::Fulfilled(Value::from("fast"))),
    ]);
    runtime.race(&inputs)
}

fn all_settled(runtime: &Runtime, _event_loop: &EventLoop) -> Promise {
    let inputs = list([runtime.resolve(1), runtime.reject("e")]);
    runtime.all_settled(&inputs)
}

fn any(runtime: &Runtime, event_loop: &EventLoop) -> Promise {
    let inputs = list([
        event_loop.delayed(runtime, 5, SettledOutcome::Rejected(Value::from("e1"))),
        event_loop.delayed(runtime, 10, SettledOutcome::Fulfilled(Value::from("ok"))),
    ]);
    runtime.any(&inputs)
}

fn any_rejected(runtime: &Runtime, _event_loop: &EventLoop) -> Promise {
    let inputs = list([runtime.reject("e1"), runtime.reject("e2")]);
    runtime
        .any(&inputs)
        .catch_fn(|reason| match reason.as_error().and_then(Error::errors) {
            Some(errors) => Err(Error::thrown(format!(
                "{} {}",
                reason,
                Value::from(errors.to_vec())
            ))),
            None => Err(Error::from_reason(reason.clone())),
        })
}

fn cycle(runtime: &Runtime, _event_loop: &EventLoop) -> Promise {
    let slot: Rc<RefCell<Option<Promise>>> = Rc::new(RefCell::new(None));
    let inner = slot.clone();
    let derived = runtime.resolve(1).then_fn(move |_| {
        // Hand the derived promise back to itself
        Ok(inner.borrow_mut().take().map(Value::from).unwrap_or(Value::Undefined))
    });
    *slot.borrow_mut() = Some(derived.clone());
    derived
}

fn finally(runtime: &Runtime, _event_loop: &EventLoop) -> Promise {
    runtime
        .resolve("kept")
        .finally_fn(|| {
            tracing::info!("cleanup ran");
            Ok(Value::from("ignored"))
        })
}

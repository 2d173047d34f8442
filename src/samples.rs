//! Built-in `selftest` suite
//!
//! Registered by the binary so a target list can point at a manifest with
//! `suite = "selftest"` and exercise the harness end to end.

use std::sync::Arc;

use crate::row;
use crate::testing::{
    ensure_eq, EnumType, FixtureType, Method, Param, ParamType, Settings, Suite, SuiteRegistry,
    TestOutput, Value,
};

/// Name the self-test suite is registered under
pub const SELFTEST_SUITE: &str = "selftest";

/// Integer arithmetic used by the sample fixtures
pub struct Calculator;

impl Calculator {
    pub fn add(&self, a: i64, b: i64) -> i64 {
        a + b
    }

    pub fn divide(&self, a: i64, b: i64) -> Option<i64> {
        a.checked_div(b)
    }
}

pub struct CalculatorTests {
    calculator: Arc<Calculator>,
    output: Arc<dyn TestOutput>,
}

pub struct GreetingTests {
    settings: Arc<Settings>,
    output: Arc<dyn TestOutput>,
}

impl GreetingTests {
    fn greeting(&self) -> String {
        self.settings
            .get("greeting")
            .unwrap_or_else(|| "Hello".to_string())
    }
}

fn mood() -> ParamType {
    ParamType::Enum(EnumType::new("Mood", ["Calm", "Excited"]))
}

fn calculator_tests() -> FixtureType {
    FixtureType::builder::<CalculatorTests>("samples.CalculatorTests")
        .constructor(
            vec![Param::of::<Calculator>(), Param::of::<dyn TestOutput>()],
            |deps| {
                Ok(CalculatorTests {
                    calculator: deps.get(0)?,
                    output: deps.get(1)?,
                })
            },
        )
        .test("AddsZero", |t| {
            ensure_eq(t.calculator.add(7, 0), 7)?;
            Ok(())
        })
        .method(
            Method::new("Adds")
                .marker("theory")
                .data("data", vec![row![1, 2, 3], row![-4, 4, 0]])
                .data("data", vec![row![20, 22]])
                .param("a", ParamType::I64)
                .param("b", ParamType::I64)
                .param_with_default("expected", ParamType::I64, 42),
            |t, args| {
                let (a, b, expected): (i64, i64, i64) = (args.get(0)?, args.get(1)?, args.get(2)?);
                t.output
                    .write_fmt_line(format_args!("{} + {} = {}", a, b, t.calculator.add(a, b)));
                ensure_eq(t.calculator.add(a, b), expected)?;
                Ok(())
            },
        )
        .method(
            Method::new("Divides")
                .data("case", vec![row![9, 3, 3]])
                .data("case", vec![row![1, 0, Value::Null]])
                .param("a", ParamType::I64)
                .param("b", ParamType::I64)
                .param("expected", ParamType::nullable(ParamType::I64)),
            |t, args| {
                let expected: Option<i64> = args.get(2)?;
                ensure_eq(t.calculator.divide(args.get(0)?, args.get(1)?), expected)?;
                Ok(())
            },
        )
        .build()
}

fn greeting_tests() -> FixtureType {
    FixtureType::builder::<GreetingTests>("samples.GreetingTests")
        .constructor(
            vec![Param::of::<Settings>(), Param::of::<dyn TestOutput>()],
            |deps| {
                Ok(GreetingTests {
                    settings: deps.get(0)?,
                    output: deps.get(1)?,
                })
            },
        )
        .setup("LogGreeting", |t| {
            t.output.write_line(&format!("greeting is {:?}", t.greeting()));
            Ok(())
        })
        .method(
            Method::new("Greets")
                .marker("theory")
                .data("data", vec![row!["World", "Calm"], row!["Harness", "Excited"]])
                .param("name", ParamType::String)
                .param("mood", mood()),
            |t, args| {
                let name: String = args.get(0)?;
                let mood: String = args.get(1)?;
                let punctuation = if mood == "Excited" { "!" } else { "." };
                let text = format!("{}, {}{}", t.greeting(), name, punctuation);
                assert!(text.ends_with(punctuation));
                assert!(text.contains(&name));
                Ok(())
            },
        )
        .build()
}

/// The self-test fixtures with their services
pub fn selftest() -> Suite {
    Suite::new()
        .services(|catalog| {
            catalog
                .declare::<Calculator>("samples.Calculator")
                .constructor::<Calculator, _>(vec![], |_| Ok(Calculator));
        })
        .fixture(calculator_tests())
        .fixture(greeting_tests())
}

/// Every suite compiled into the binary
pub fn suites() -> SuiteRegistry {
    let mut registry = SuiteRegistry::new();
    registry.register(SELFTEST_SUITE, selftest);
    registry
}

//! Step catalog: human-readable phrases bound to actions and assertions
//!
//! A phrase is literal text with `{string}` placeholders. In a step the
//! placeholder stands for a double-quoted literal whose contents are passed
//! on unchanged. The step keyword plays no part in matching.

use loancheck_common::locators::{INTEREST_RATE, LOAN_AMOUNT, TERM};
use regex::Regex;
use tracing::debug;

use crate::error::{E2eError, E2eResult};
use crate::session::Session;

const PLACEHOLDER: &str = "{string}";

/// A step argument: fixed by the definition or captured from the step text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Literal(String),
    Param(usize),
}

impl Operand {
    pub fn literal(value: &str) -> Self {
        Operand::Literal(value.to_string())
    }

    fn resolve<'a>(&'a self, params: &'a [String]) -> &'a str {
        match self {
            Operand::Literal(value) => value,
            Operand::Param(index) => params.get(*index).map(String::as_str).unwrap_or(""),
        }
    }

    fn max_param(&self) -> Option<usize> {
        match self {
            Operand::Literal(_) => None,
            Operand::Param(index) => Some(*index),
        }
    }
}

/// What a step does when it runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    /// The session's page is at the target URL, navigating there if not
    OnTargetPage,

    /// Fill fields in order (name, value), then optionally blur
    Fill {
        entries: Vec<(Operand, Operand)>,
        blur: bool,
    },

    /// Move focus off the current field
    Blur,

    /// Click the element labelled exactly so
    Click { label: Operand },

    /// Field holds exactly this string
    ExpectValue { field: Operand, expected: Operand },

    /// Some visible text matches the pattern
    ExpectText { pattern: Operand },

    /// The field's validation error is visible
    ExpectFieldError { field: Operand },

    /// No field's validation error is visible right now
    ExpectNoError,

    /// The result region shows a number
    ExpectNumericResult { positive: bool },

    /// The result region shows a well-formed currency amount
    ExpectCurrencyResult,

    /// Every registered field is empty
    ExpectAllCleared,
}

impl StepAction {
    fn operands(&self) -> Vec<&Operand> {
        match self {
            StepAction::Fill { entries, .. } => {
                entries.iter().flat_map(|(field, value)| [field, value]).collect()
            }
            StepAction::Click { label } => vec![label],
            StepAction::ExpectValue { field, expected } => vec![field, expected],
            StepAction::ExpectText { pattern } => vec![pattern],
            StepAction::ExpectFieldError { field } => vec![field],
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StepDefinition {
    pub phrase: String,
    pub action: StepAction,
    matcher: Regex,
}

impl StepDefinition {
    pub fn new(phrase: &str, action: StepAction) -> E2eResult<Self> {
        let pieces: Vec<&str> = phrase.split(PLACEHOLDER).collect();
        let params = pieces.len() - 1;

        if let Some(index) = action.operands().iter().filter_map(|o| o.max_param()).max() {
            if index >= params {
                return Err(E2eError::InvalidStepDefinition {
                    phrase: phrase.to_string(),
                    reason: format!("uses parameter {} but the phrase has {}", index, params),
                });
            }
        }

        let body = pieces
            .iter()
            .map(|piece| regex::escape(piece))
            .collect::<Vec<_>>()
            .join(r#""([^"]*)""#);
        let matcher = Regex::new(&format!("^{}$", body)).map_err(|e| {
            E2eError::InvalidStepDefinition {
                phrase: phrase.to_string(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            phrase: phrase.to_string(),
            action,
            matcher,
        })
    }

    /// Captured parameters if `text` matches this phrase
    pub fn captures(&self, text: &str) -> Option<Vec<String>> {
        let caps = self.matcher.captures(text)?;
        Some(
            caps.iter()
                .skip(1)
                .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                .collect(),
        )
    }
}

/// Ordered set of step definitions
#[derive(Debug, Clone, Default)]
pub struct StepCatalog {
    definitions: Vec<StepDefinition>,
}

fn fill(entries: &[(&str, &str)], blur: bool) -> StepAction {
    StepAction::Fill {
        entries: entries
            .iter()
            .map(|(field, value)| (Operand::literal(field), Operand::literal(value)))
            .collect(),
        blur,
    }
}

impl StepCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(mut self, phrase: &str, action: StepAction) -> E2eResult<Self> {
        self.definitions.push(StepDefinition::new(phrase, action)?);
        Ok(self)
    }

    /// Phrases for the personal loan calculator
    pub fn loan_calculator() -> E2eResult<Self> {
        use Operand::Param;

        Self::new()
            .define(
                "the user is on the Personal Loan Calculator page",
                StepAction::OnTargetPage,
            )?
            // valid inputs
            .define("the user enters a valid loan amount", fill(&[(LOAN_AMOUNT, "10000")], false))?
            .define("the user enters a valid interest rate", fill(&[(INTEREST_RATE, "5")], false))?
            .define("the user enters a valid loan term", fill(&[(TERM, "36")], false))?
            .define(
                "the user enters a valid loan amount, interest rate, and loan term",
                fill(&[(LOAN_AMOUNT, "10000"), (INTEREST_RATE, "5"), (TERM, "36")], false),
            )?
            .define(
                "the user enters valid values in all fields",
                fill(&[(LOAN_AMOUNT, "15000"), (INTEREST_RATE, "6.5"), (TERM, "60")], false),
            )?
            // invalid inputs, blurred so validation runs
            .define("the user enters an invalid loan amount", fill(&[(LOAN_AMOUNT, "100")], true))?
            .define("the user enters an invalid interest rate", fill(&[(INTEREST_RATE, "0")], true))?
            .define("the user enters an invalid loan term", fill(&[(TERM, "-12")], true))?
            // boundaries
            .define(
                "the user enters the minimum allowed values in all fields",
                fill(&[(LOAN_AMOUNT, "1000"), (INTEREST_RATE, "1"), (TERM, "6")], false),
            )?
            .define(
                "the user enters the maximum allowed values in all fields",
                fill(&[(LOAN_AMOUNT, "100000"), (INTEREST_RATE, "20"), (TERM, "84")], false),
            )?
            .define("clicks the {string} button", StepAction::Click { label: Param(0) })?
            // field values
            .define(
                "the loan amount should be accepted without error",
                StepAction::ExpectValue {
                    field: Operand::literal(LOAN_AMOUNT),
                    expected: Operand::literal("10000"),
                },
            )?
            .define(
                "the interest rate should be accepted without error",
                StepAction::ExpectValue {
                    field: Operand::literal(INTEREST_RATE),
                    expected: Operand::literal("5"),
                },
            )?
            .define(
                "the loan term should be accepted without error",
                StepAction::ExpectValue {
                    field: Operand::literal(TERM),
                    expected: Operand::literal("36"),
                },
            )?
            // result region
            .define(
                "the monthly payment should be calculated and displayed correctly",
                StepAction::ExpectNumericResult { positive: false },
            )?
            .define(
                "the calculator should display the correct result",
                StepAction::ExpectNumericResult { positive: false },
            )?
            .define(
                "the monthly payment should be a positive number",
                StepAction::ExpectNumericResult { positive: true },
            )?
            .define(
                "the result should be displayed with proper currency and decimal formatting",
                StepAction::ExpectCurrencyResult,
            )?
            // validation errors
            .define(
                "an error message should be displayed for the invalid loan amount",
                StepAction::ExpectFieldError { field: Operand::literal(LOAN_AMOUNT) },
            )?
            .define(
                "an error message should be displayed for the invalid interest rate",
                StepAction::ExpectFieldError { field: Operand::literal(INTEREST_RATE) },
            )?
            .define(
                "an error message should be displayed for the invalid loan term",
                StepAction::ExpectFieldError { field: Operand::literal(TERM) },
            )?
            .define("no error message should be displayed", StepAction::ExpectNoError)?
            .define("all input fields should be cleared", StepAction::ExpectAllCleared)?
            // generic
            .define(
                "the user fills {string} with {string}",
                StepAction::Fill {
                    entries: vec![(Param(0), Param(1))],
                    blur: false,
                },
            )?
            .define("the user leaves the field", StepAction::Blur)?
            .define(
                "the {string} field should contain {string}",
                StepAction::ExpectValue {
                    field: Param(0),
                    expected: Param(1),
                },
            )?
            .define(
                "an error matching {string} should be displayed",
                StepAction::ExpectText { pattern: Param(0) },
            )
    }

    pub fn definitions(&self) -> &[StepDefinition] {
        &self.definitions
    }

    /// Find the single definition matching `text`
    pub fn resolve(&self, text: &str) -> E2eResult<(&StepDefinition, Vec<String>)> {
        let mut matches = self
            .definitions
            .iter()
            .filter_map(|def| def.captures(text).map(|params| (def, params)));

        let Some(first) = matches.next() else {
            return Err(E2eError::UndefinedStep(text.to_string()));
        };
        let rest: Vec<_> = matches.collect();
        if !rest.is_empty() {
            let mut candidates = vec![first.0.phrase.clone()];
            candidates.extend(rest.into_iter().map(|(def, _)| def.phrase.clone()));
            return Err(E2eError::AmbiguousStep {
                step: text.to_string(),
                candidates,
            });
        }
        Ok(first)
    }

    /// Resolve `text` and run it against the session
    pub async fn execute(&self, session: &Session, text: &str) -> E2eResult<()> {
        let (definition, params) = self.resolve(text)?;
        debug!("step '{}' -> {:?} {:?}", text, definition.action, params);
        run(session, &definition.action, &params).await
    }
}

async fn run(session: &Session, action: &StepAction, params: &[String]) -> E2eResult<()> {
    match action {
        StepAction::OnTargetPage => {
            let target = session.config().target_url.as_str();
            let driver = session.driver()?;
            let current = driver.current_url().await?.unwrap_or_default();
            if !current.starts_with(target.trim_end_matches('/')) {
                debug!("At {:?}, navigating to {}", current, target);
                let timeout = session.config().timeouts.navigation_timeout();
                tokio::time::timeout(timeout, driver.goto(target))
                    .await
                    .map_err(|_| E2eError::NavigationTimeout {
                        url: target.to_string(),
                        timeout,
                    })??;
            }
            Ok(())
        }
        StepAction::Fill { entries, blur } => {
            for (field, value) in entries {
                session
                    .set_field(field.resolve(params), value.resolve(params))
                    .await?;
            }
            if *blur {
                session.trigger_validation().await?;
            }
            Ok(())
        }
        StepAction::Blur => session.trigger_validation().await,
        StepAction::Click { label } => session.click_action(label.resolve(params)).await,
        StepAction::ExpectValue { field, expected } => {
            session
                .assert_field_value(field.resolve(params), expected.resolve(params), None)
                .await
        }
        StepAction::ExpectText { pattern } => session
            .assert_visible_text_matches(pattern.resolve(params), None)
            .await
            .map(|_| ()),
        StepAction::ExpectFieldError { field } => {
            let pattern = session.locators().field(field.resolve(params))?.error_pattern();
            session
                .assert_visible_text_matches(&pattern, None)
                .await
                .map(|_| ())
        }
        StepAction::ExpectNoError => {
            for field in session.locators().fields() {
                session
                    .assert_no_visible_text_matches(&field.error_pattern())
                    .await?;
            }
            Ok(())
        }
        StepAction::ExpectNumericResult { positive } => {
            let snapshot = session.assert_result_is_numeric(None).await?;
            match snapshot.amount {
                Some(amount) if *positive && amount <= 0.0 => Err(E2eError::ValueMismatch {
                    target: "result".to_string(),
                    expected: "a positive amount".to_string(),
                    actual: snapshot.raw,
                }),
                _ => Ok(()),
            }
        }
        StepAction::ExpectCurrencyResult => session
            .assert_result_formatted_as_currency(None)
            .await
            .map(|_| ()),
        StepAction::ExpectAllCleared => {
            let names = session.locators().names();
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            session.assert_fields_cleared(&names, None).await
        }
    }
}

//! Assertion library
//!
//! Three predicates are kept apart on purpose: a field holding an exact
//! string, the result region rendering *some* number, and the result region
//! rendering a well-formed currency amount. Every assertion waits up to the
//! session budget unless the caller passes its own timeout.

use std::time::Duration;

use loancheck_common::ResultSnapshot;
use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::driver::ElementState;
use crate::error::{E2eError, E2eResult};
use crate::session::Session;
use crate::wait::{poll, Polled, Probe};

/// Case-insensitive pattern as used by text assertions
pub fn text_pattern(pattern: &str) -> E2eResult<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| E2eError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}

impl Session {
    /// The field's value equals `expected` exactly
    pub async fn assert_field_value(
        &self,
        name: &str,
        expected: &str,
        timeout: Option<Duration>,
    ) -> E2eResult<()> {
        let selector = self.locators().selector(name)?;
        let driver = self.driver()?;

        let polled = poll(self.budget(timeout), || async move {
            Ok(match driver.input_value(selector).await? {
                Some(actual) if actual == expected => Probe::Ready(()),
                Some(actual) => Probe::Pending(actual),
                None => Probe::Pending(format!("no element matches {}", selector)),
            })
        })
        .await?;

        match polled {
            Polled::Ready(()) => Ok(()),
            Polled::TimedOut { waited, .. } => match driver.input_value(selector).await? {
                Some(actual) => Err(E2eError::ValueMismatch {
                    target: format!("field '{}'", name),
                    expected: expected.to_string(),
                    actual,
                }),
                None => Err(E2eError::ElementNotFound {
                    target: format!("field '{}' ({})", name, selector),
                    waited,
                }),
            },
        }
    }

    /// Some visible element's text matches `pattern` (case-insensitive).
    /// Returns the matching text.
    pub async fn assert_visible_text_matches(
        &self,
        pattern: &str,
        timeout: Option<Duration>,
    ) -> E2eResult<String> {
        let regex = text_pattern(pattern)?;
        let driver = self.driver()?;
        let regex = &regex;

        let polled = poll(self.budget(timeout), || async move {
            let texts = driver.visible_texts().await?;
            Ok(match texts.into_iter().find(|t| regex.is_match(t)) {
                Some(text) => Probe::Ready(text),
                None => Probe::Pending("no visible text matches".to_string()),
            })
        })
        .await?;

        match polled {
            Polled::Ready(text) => {
                debug!("/{}/i matched {:?}", pattern, text);
                Ok(text)
            }
            Polled::TimedOut { last, .. } => Err(E2eError::ValueMismatch {
                target: "visible text".to_string(),
                expected: format!("/{}/i", pattern),
                actual: last,
            }),
        }
    }

    /// No visible element's text matches `pattern`, checked once, now
    pub async fn assert_no_visible_text_matches(&self, pattern: &str) -> E2eResult<()> {
        let regex = text_pattern(pattern)?;
        let texts = self.driver()?.visible_texts().await?;
        match texts.into_iter().find(|t| regex.is_match(t)) {
            Some(text) => Err(E2eError::ValueMismatch {
                target: "visible text".to_string(),
                expected: format!("nothing matching /{}/i", pattern),
                actual: text,
            }),
            None => Ok(()),
        }
    }

    /// The result region is visible and its stripped text is a finite number
    pub async fn assert_result_is_numeric(
        &self,
        timeout: Option<Duration>,
    ) -> E2eResult<ResultSnapshot> {
        let selector = self.locators().result().selector.as_str();
        let driver = self.driver()?;

        let polled = poll(self.budget(timeout), || async move {
            let state = driver.element_state(selector).await?;
            Ok(match state.visible_text() {
                Some(text) => {
                    let snapshot = ResultSnapshot::capture(text);
                    if snapshot.is_numeric() {
                        Probe::Ready(snapshot)
                    } else {
                        Probe::Pending(format!("result text {:?} is not numeric", text))
                    }
                }
                None => Probe::Pending(state.describe()),
            })
        })
        .await?;

        match polled {
            Polled::Ready(snapshot) => {
                debug!("Result {:?} parsed as {:?}", snapshot.raw, snapshot.amount);
                Ok(snapshot)
            }
            Polled::TimedOut { last, waited } => Err(E2eError::ResultNotComputed(format!(
                "{} after {} ms",
                last,
                waited.as_millis()
            ))),
        }
    }

    /// The result region's raw text is a well-formed currency amount
    pub async fn assert_result_formatted_as_currency(
        &self,
        timeout: Option<Duration>,
    ) -> E2eResult<ResultSnapshot> {
        let selector = self.locators().result().selector.as_str();
        let driver = self.driver()?;

        let polled = poll(self.budget(timeout), || async move {
            let state = driver.element_state(selector).await?;
            Ok(match state {
                ElementState::Visible(text) if !text.trim().is_empty() => Probe::Ready(text),
                other => Probe::Pending(other.describe()),
            })
        })
        .await?;

        let raw = match polled {
            Polled::Ready(raw) => raw,
            Polled::TimedOut { last, waited } => {
                return Err(E2eError::ResultNotComputed(format!(
                    "{} after {} ms",
                    last,
                    waited.as_millis()
                )))
            }
        };

        let pattern = self.currency_pattern();
        if pattern.is_match(raw.trim()) {
            Ok(ResultSnapshot::capture(raw))
        } else {
            Err(E2eError::FormatMismatch {
                pattern: pattern.as_str().to_string(),
                actual: raw,
            })
        }
    }

    /// Every named field holds the empty string
    pub async fn assert_fields_cleared(
        &self,
        names: &[&str],
        timeout: Option<Duration>,
    ) -> E2eResult<()> {
        let mut selectors = Vec::with_capacity(names.len());
        for name in names {
            selectors.push((*name, self.locators().selector(name)?));
        }
        let driver = self.driver()?;
        let selectors = &selectors;

        let polled = poll(self.budget(timeout), || async move {
            let mut dirty = Vec::new();
            for (name, selector) in selectors {
                match driver.input_value(selector).await? {
                    Some(value) if value.is_empty() => {}
                    Some(value) => dirty.push(format!("{}={:?}", name, value)),
                    None => dirty.push(format!("{} missing", name)),
                }
            }
            Ok(if dirty.is_empty() {
                Probe::Ready(())
            } else {
                Probe::Pending(dirty.join(", "))
            })
        })
        .await?;

        let waited = match polled {
            Polled::Ready(()) => return Ok(()),
            Polled::TimedOut { waited, .. } => waited,
        };
        for (name, selector) in selectors {
            match driver.input_value(selector).await? {
                Some(value) if value.is_empty() => {}
                Some(actual) => {
                    return Err(E2eError::ValueMismatch {
                        target: format!("field '{}'", name),
                        expected: String::new(),
                        actual,
                    })
                }
                None => {
                    return Err(E2eError::ElementNotFound {
                        target: format!("field '{}' ({})", name, selector),
                        waited,
                    })
                }
            }
        }
        Ok(())
    }
}

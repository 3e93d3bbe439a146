//! Value-format predicates for rendered results

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Keep only ASCII digits and `.`
pub fn strip_numeric(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect()
}

/// Strip `raw` and parse the remainder as a finite number.
///
/// An empty remainder is not a number.
pub fn parse_stripped_number(raw: &str) -> Option<f64> {
    let stripped = strip_numeric(raw);
    if stripped.is_empty() {
        return None;
    }
    stripped.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Currency rendering rules for the result region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencyFormat {
    pub symbol: String,
    pub group_separator: String,
    pub decimal_separator: String,
    pub decimals: u8,
}

impl Default for CurrencyFormat {
    fn default() -> Self {
        Self {
            symbol: "$".to_string(),
            group_separator: ",".to_string(),
            decimal_separator: ".".to_string(),
            decimals: 2,
        }
    }
}

impl CurrencyFormat {
    /// Pattern source. The default yields `^\$\d{1,3}(,\d{3})*(\.\d{2})?$`.
    pub fn pattern(&self) -> String {
        let mut pattern = format!(
            r"^{}\d{{1,3}}({}\d{{3}})*",
            regex::escape(&self.symbol),
            regex::escape(&self.group_separator)
        );
        if self.decimals > 0 {
            pattern.push_str(&format!(
                r"({}\d{{{}}})?",
                regex::escape(&self.decimal_separator),
                self.decimals
            ));
        }
        pattern.push('$');
        pattern
    }

    /// Compile the pattern once for repeated matching
    pub fn compile(&self) -> Result<Regex> {
        let pattern = self.pattern();
        Regex::new(&pattern).map_err(|e| Error::InvalidPattern {
            pattern,
            reason: e.to_string(),
        })
    }

    /// Whether rendered text is a well-formed amount. Surrounding whitespace
    /// from the DOM is ignored; nothing else is normalized.
    pub fn matches(&self, raw: &str) -> Result<bool> {
        Ok(self.compile()?.is_match(raw.trim()))
    }

    /// Render `amount` the way the calculator displays it
    pub fn render(&self, amount: f64) -> String {
        let rendered = format!("{:.*}", self.decimals as usize, amount.abs());
        let (whole, frac) = match rendered.split_once('.') {
            Some((w, f)) => (w.to_string(), Some(f.to_string())),
            None => (rendered, None),
        };

        let mut grouped = String::new();
        for (i, digit) in whole.chars().enumerate() {
            if i > 0 && (whole.len() - i) % 3 == 0 {
                grouped.push_str(&self.group_separator);
            }
            grouped.push(digit);
        }

        let mut out = String::new();
        if amount < 0.0 {
            out.push('-');
        }
        out.push_str(&self.symbol);
        out.push_str(&grouped);
        if let Some(frac) = frac {
            out.push_str(&self.decimal_separator);
            out.push_str(&frac);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_default_pattern_is_literal() {
        assert_eq!(
            CurrencyFormat::default().pattern(),
            r"^\$\d{1,3}(,\d{3})*(\.\d{2})?$"
        );
    }

    #[test_case("$299.71", true ; "plain cents")]
    #[test_case("$1,234.56", true ; "grouped")]
    #[test_case("$100,000", true ; "no cents")]
    #[test_case("$1234.56", false ; "missing group separator")]
    #[test_case("299.71", false ; "missing symbol")]
    #[test_case("$1,23.45", false ; "short group")]
    #[test_case("$12.3", false ; "one decimal")]
    #[test_case("  $299.71\n", true ; "surrounding whitespace is trimmed before matching")]
    #[test_case("$ 299.71", false ; "inner whitespace is not trimmed")]
    fn test_currency_matches(raw: &str, expected: bool) {
        assert_eq!(CurrencyFormat::default().matches(raw).unwrap(), expected);
    }

    #[test]
    fn test_custom_locale_pattern() {
        let euro = CurrencyFormat {
            symbol: "€".to_string(),
            group_separator: ".".to_string(),
            decimal_separator: ",".to_string(),
            decimals: 2,
        };
        assert!(euro.matches("€1.234,56").unwrap());
        assert!(!euro.matches("$1,234.56").unwrap());
    }

    #[test_case("$299.71", Some(299.71))]
    #[test_case("Monthly: $1,000", Some(1000.0))]
    #[test_case("--", None)]
    #[test_case("", None)]
    #[test_case("1.2.3", None)]
    fn test_parse_stripped_number(raw: &str, expected: Option<f64>) {
        assert_eq!(parse_stripped_number(raw), expected);
    }

    #[test]
    fn test_render() {
        let fmt = CurrencyFormat::default();
        assert_eq!(fmt.render(299.7106), "$299.71");
        assert_eq!(fmt.render(1234567.891), "$1,234,567.89");
        assert_eq!(fmt.render(999.999), "$1,000.00");
        assert!(fmt.matches(&fmt.render(42.0)).unwrap());
    }
}

//! Feature files: a small Gherkin subset
//!
//! Supported: `Feature:` with free description, `@tag` lines, one
//! `Background:`, `Scenario:`, `Given/When/Then/And/But` and `#` comments.
//! `And`/`But` take the kind of the step before them.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{E2eError, E2eResult};

/// Tag that marks a scenario as not to be run
pub const SKIP_TAG: &str = "skip";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Given,
    When,
    Then,
}

/// One step line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub kind: StepKind,

    /// Keyword as written (`And`, `But`, ...)
    pub keyword: String,

    /// Text after the keyword, matched against the step catalog
    pub text: String,

    /// 1-based source line
    pub line: usize,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.keyword, self.text)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,

    /// Own tags plus the feature's, without the leading `@`
    pub tags: Vec<String>,

    pub steps: Vec<Step>,
    pub line: usize,
}

impl Scenario {
    pub fn has_tag(&self, tag: &str) -> bool {
        let tag = tag.trim_start_matches('@');
        self.tags.iter().any(|t| t == tag)
    }

    pub fn is_skipped(&self) -> bool {
        self.has_tag(SKIP_TAG)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Steps run before every scenario
    #[serde(default)]
    pub background: Vec<Step>,

    pub scenarios: Vec<Scenario>,

    /// File the feature was read from, if any
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Which block step lines currently belong to
enum Block {
    Description,
    Background,
    Scenario,
}

fn parse_error(line: usize, reason: impl Into<String>) -> E2eError {
    E2eError::FeatureParse {
        line,
        reason: reason.into(),
    }
}

fn parse_tags(line_no: usize, line: &str) -> E2eResult<Vec<String>> {
    line.split_whitespace()
        .map(|word| match word.strip_prefix('@') {
            Some(tag) if !tag.is_empty() => Ok(tag.to_string()),
            _ => Err(parse_error(line_no, format!("expected @tag, found '{}'", word))),
        })
        .collect()
}

/// Split a step line into keyword and text
fn split_step(line: &str) -> Option<(&str, &str)> {
    ["Given", "When", "Then", "And", "But"]
        .into_iter()
        .find_map(|keyword| {
            let rest = line.strip_prefix(keyword)?;
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                Some((keyword, rest.trim()))
            } else {
                None
            }
        })
}

impl Feature {
    /// Parse a feature from source text
    pub fn parse(source: &str) -> E2eResult<Self> {
        let mut feature: Option<Feature> = None;
        let mut pending_tags: Vec<String> = Vec::new();
        let mut pending_tags_line = 0;
        let mut block = Block::Description;
        let mut last_kind: Option<StepKind> = None;

        for (index, raw) in source.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.starts_with('@') {
                pending_tags.extend(parse_tags(line_no, line)?);
                pending_tags_line = line_no;
                continue;
            }

            if let Some(name) = line.strip_prefix("Feature:") {
                if feature.is_some() {
                    return Err(parse_error(line_no, "only one Feature per file"));
                }
                feature = Some(Feature {
                    name: name.trim().to_string(),
                    description: String::new(),
                    tags: std::mem::take(&mut pending_tags),
                    background: Vec::new(),
                    scenarios: Vec::new(),
                    path: None,
                });
                continue;
            }

            let Some(current) = feature.as_mut() else {
                return Err(parse_error(line_no, "expected 'Feature:'"));
            };

            if line.starts_with("Background:") {
                if !current.scenarios.is_empty() {
                    return Err(parse_error(line_no, "Background must precede all scenarios"));
                }
                if matches!(block, Block::Background) || !current.background.is_empty() {
                    return Err(parse_error(line_no, "only one Background per feature"));
                }
                if !pending_tags.is_empty() {
                    return Err(parse_error(line_no, "tags are not allowed on Background"));
                }
                block = Block::Background;
                last_kind = None;
                continue;
            }

            if line.starts_with("Scenario Outline:") || line.starts_with("Examples:") {
                return Err(parse_error(line_no, "scenario outlines are not supported"));
            }

            if let Some(name) = line.strip_prefix("Scenario:") {
                let mut tags = current.tags.clone();
                for tag in pending_tags.drain(..) {
                    if !tags.contains(&tag) {
                        tags.push(tag);
                    }
                }
                current.scenarios.push(Scenario {
                    name: name.trim().to_string(),
                    tags,
                    steps: Vec::new(),
                    line: line_no,
                });
                block = Block::Scenario;
                last_kind = None;
                continue;
            }

            if let Some((keyword, text)) = split_step(line) {
                if text.is_empty() {
                    return Err(parse_error(line_no, format!("'{}' without step text", keyword)));
                }
                let kind = match keyword {
                    "Given" => StepKind::Given,
                    "When" => StepKind::When,
                    "Then" => StepKind::Then,
                    _ => last_kind.ok_or_else(|| {
                        parse_error(line_no, format!("'{}' must follow another step", keyword))
                    })?,
                };
                let step = Step {
                    kind,
                    keyword: keyword.to_string(),
                    text: text.to_string(),
                    line: line_no,
                };
                match block {
                    Block::Background => current.background.push(step),
                    Block::Scenario => {
                        if let Some(scenario) = current.scenarios.last_mut() {
                            scenario.steps.push(step);
                        }
                    }
                    Block::Description => {
                        return Err(parse_error(line_no, "step outside of a scenario"));
                    }
                }
                last_kind = Some(kind);
                continue;
            }

            match block {
                Block::Description => {
                    if !current.description.is_empty() {
                        current.description.push('\n');
                    }
                    current.description.push_str(line);
                }
                _ => return Err(parse_error(line_no, format!("unexpected line '{}'", line))),
            }
        }

        if !pending_tags.is_empty() {
            return Err(parse_error(pending_tags_line, "tags not followed by a Scenario"));
        }

        feature.ok_or_else(|| parse_error(1, "no 'Feature:' found"))
    }

    /// Parse a feature file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut feature = Self::parse(&content).map_err(|e| match e {
            E2eError::FeatureParse { line, reason } => E2eError::FeatureParse {
                line,
                reason: format!("{}: {}", path.display(), reason),
            },
            other => other,
        })?;
        feature.path = Some(path.to_path_buf());
        Ok(feature)
    }

    /// Load a single `.feature` file, or every one under a directory in
    /// path order
    pub fn load_all(path: &Path) -> E2eResult<Vec<Self>> {
        if path.is_file() {
            return Ok(vec![Self::from_file(path)?]);
        }

        let mut features = Vec::new();
        for entry in walkdir::WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.file_type().is_file()
                    && e.path()
                        .extension()
                        .map(|ext| ext == "feature")
                        .unwrap_or(false)
            })
        {
            features.push(Self::from_file(entry.path())?);
        }

        Ok(features)
    }
}

/// Scenario selection by tag and name substring
#[derive(Debug, Clone, Default)]
pub struct ScenarioFilter {
    pub tags: Vec<String>,
    pub name: Option<String>,
}

impl ScenarioFilter {
    /// A scenario is selected when it carries every tag and its name
    /// contains the name filter
    pub fn matches(&self, scenario: &Scenario) -> bool {
        self.tags.iter().all(|t| scenario.has_tag(t))
            && self
                .name
                .as_deref()
                .map(|n| scenario.name.contains(n))
                .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEATURE: &str = r#"
@calculator
Feature: Personal loan calculator
  Checks the widget on the public page.

  Background:
    Given the user is on the Personal Loan Calculator page

  # happy path
  @smoke
  Scenario: Calculate monthly payment
    When the user enters a valid loan amount
    And the user enters a valid interest rate
    And clicks the "Calculate" button
    Then the result should be displayed with proper currency and decimal formatting
    But no error message should be displayed

  @skip
  Scenario: Not ready
    Given the user leaves the field
"#;

    #[test]
    fn test_parse_feature() {
        let feature = Feature::parse(FEATURE).unwrap();
        assert_eq!(feature.name, "Personal loan calculator");
        assert_eq!(feature.description, "Checks the widget on the public page.");
        assert_eq!(feature.tags, vec!["calculator"]);
        assert_eq!(feature.background.len(), 1);
        assert_eq!(feature.scenarios.len(), 2);

        let scenario = &feature.scenarios[0];
        assert_eq!(scenario.name, "Calculate monthly payment");
        assert_eq!(scenario.tags, vec!["calculator", "smoke"]);
        assert_eq!(scenario.steps.len(), 5);
        assert_eq!(scenario.steps[1].kind, StepKind::When);
        assert_eq!(scenario.steps[1].keyword, "And");
        assert_eq!(scenario.steps[4].kind, StepKind::Then);
        assert_eq!(scenario.steps[2].text, r#"clicks the "Calculate" button"#);
        assert_eq!(scenario.steps[0].line, 12);

        assert!(!scenario.is_skipped());
        assert!(feature.scenarios[1].is_skipped());
    }

    #[test]
    fn test_and_without_previous_step() {
        let err = Feature::parse("Feature: f\nScenario: s\n  And something\n").unwrap_err();
        assert!(matches!(err, E2eError::FeatureParse { line: 3, .. }));
    }

    #[test]
    fn test_step_before_scenario() {
        let err = Feature::parse("Feature: f\n  Given something\n").unwrap_err();
        assert!(matches!(err, E2eError::FeatureParse { line: 2, .. }));
    }

    #[test]
    fn test_missing_feature() {
        assert!(matches!(
            Feature::parse("Scenario: s\n"),
            Err(E2eError::FeatureParse { line: 1, .. })
        ));
        assert!(Feature::parse("# only a comment\n").is_err());
    }

    #[test]
    fn test_dangling_tags() {
        let err = Feature::parse("Feature: f\nScenario: s\n  Given x\n@orphan\n").unwrap_err();
        assert!(matches!(err, E2eError::FeatureParse { line: 4, .. }));
    }

    #[test]
    fn test_background_after_scenario() {
        let err =
            Feature::parse("Feature: f\nScenario: s\n  Given x\nBackground:\n  Given y\n")
                .unwrap_err();
        assert!(matches!(err, E2eError::FeatureParse { line: 4, .. }));
    }

    #[test]
    fn test_keyword_needs_word_boundary() {
        let err = Feature::parse("Feature: f\nScenario: s\n  Givenx\n").unwrap_err();
        assert!(matches!(err, E2eError::FeatureParse { line: 3, .. }));
    }

    #[test]
    fn test_filter() {
        let feature = Feature::parse(FEATURE).unwrap();
        let smoke = ScenarioFilter {
            tags: vec!["@smoke".to_string()],
            name: None,
        };
        let by_name = ScenarioFilter {
            tags: vec![],
            name: Some("ready".to_string()),
        };
        assert!(smoke.matches(&feature.scenarios[0]));
        assert!(!smoke.matches(&feature.scenarios[1]));
        assert!(by_name.matches(&feature.scenarios[1]));
        assert!(ScenarioFilter::default().matches(&feature.scenarios[0]));
    }

    #[test]
    fn test_load_all_walks_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("b.feature"), "Feature: B\n").unwrap();
        std::fs::write(dir.path().join("nested/a.feature"), "Feature: A\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "Feature: ignored\n").unwrap();

        let features = Feature::load_all(dir.path()).unwrap();
        let names: Vec<_> = features.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["B", "A"]);
        assert!(features[0].path.is_some());
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.feature");
        std::fs::write(&path, "Feature: f\nScenario: s\n  But x\n").unwrap();
        let err = Feature::load_all(dir.path()).unwrap_err();
        assert!(err.to_string().contains("broken.feature"));
    }
}

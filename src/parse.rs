use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::BenchError;

pub const DEFAULT_PATTERN: &str = r"Execution time: ([\d.]+) milliseconds";

/// Extracts one timing sample, in whole milliseconds, from a run's stdout.
pub trait OutputParser {
    fn parse(&self, output: &str) -> Result<u64, BenchError>;
}

/// Unit of the number captured by the pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TimeUnit {
    #[default]
    Milliseconds,
    Seconds,
}

impl TimeUnit {
    /// Convert to whole milliseconds, truncating. Negative and non-finite
    /// values are rejected.
    pub fn to_millis(self, value: f64) -> Option<u64> {
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        let millis = match self {
            TimeUnit::Milliseconds => value,
            TimeUnit::Seconds => value * 1000.0,
        };
        Some(millis as u64)
    }
}

/// Which part of the output the pattern is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MatchScope {
    /// First match anywhere in the output.
    #[default]
    Anywhere,
    /// Only the last non-empty line.
    LastLine,
}

#[derive(Debug, Clone)]
pub struct RegexParser {
    regex: Regex,
    unit: TimeUnit,
    scope: MatchScope,
}

impl RegexParser {
    /// Compile `pattern`. Capture group 1 must hold the number.
    pub fn new(pattern: &str, unit: TimeUnit, scope: MatchScope) -> Result<Self, BenchError> {
        let regex = Regex::new(pattern).map_err(|e| BenchError::InvalidPattern {
            pattern: pattern.to_string(),
            detail: e.to_string(),
        })?;

        if regex.captures_len() < 2 {
            return Err(BenchError::InvalidPattern {
                pattern: pattern.to_string(),
                detail: "pattern needs a capture group around the time value".to_string(),
            });
        }

        Ok(RegexParser { regex, unit, scope })
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }
}

impl OutputParser for RegexParser {
    fn parse(&self, output: &str) -> Result<u64, BenchError> {
        let haystack = match self.scope {
            MatchScope::Anywhere => output,
            MatchScope::LastLine => last_line(output),
        };

        let captured = self
            .regex
            .captures(haystack)
            .and_then(|caps| caps.get(1))
            .ok_or_else(|| BenchError::PatternNotFound {
                pattern: self.pattern().to_string(),
            })?;

        let text = captured.as_str();
        text.trim()
            .parse::<f64>()
            .ok()
            .and_then(|value| self.unit.to_millis(value))
            .ok_or_else(|| BenchError::NumberParse {
                text: text.to_string(),
            })
    }
}

fn last_line(output: &str) -> &str {
    output
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_parser() -> RegexParser {
        RegexParser::new(DEFAULT_PATTERN, TimeUnit::Milliseconds, MatchScope::Anywhere).unwrap()
    }

    const RAY_PATTERN: &str = r"OpenMP \(\d+ threads\) ray tracing: ([\d.]+) sec";

    #[test]
    fn default_pattern_parses_milliseconds() {
        let parser = default_parser();
        let output = "Setting up\nExecution time: 123.987 milliseconds\nDone\n";
        assert_eq!(parser.parse(output).unwrap(), 123);
    }

    #[test]
    fn seconds_are_truncated_to_millis() {
        let parser = RegexParser::new(RAY_PATTERN, TimeUnit::Seconds, MatchScope::Anywhere).unwrap();
        let output = "OpenMP (8 threads) ray tracing: 2.345 sec\n";
        assert_eq!(parser.parse(output).unwrap(), 2345);
    }

    #[test]
    fn to_millis_truncates_not_rounds() {
        assert_eq!(TimeUnit::Seconds.to_millis(2.345), Some(2345));
        assert_eq!(TimeUnit::Seconds.to_millis(0.1234), Some(123));
        assert_eq!(TimeUnit::Milliseconds.to_millis(99.99), Some(99));
    }

    #[test]
    fn to_millis_rejects_negative_and_non_finite() {
        assert_eq!(TimeUnit::Milliseconds.to_millis(-1.0), None);
        assert_eq!(TimeUnit::Seconds.to_millis(f64::NAN), None);
        assert_eq!(TimeUnit::Seconds.to_millis(f64::INFINITY), None);
    }

    #[test]
    fn first_match_wins() {
        let parser = default_parser();
        let output = "Execution time: 10.0 milliseconds\nExecution time: 20.0 milliseconds\n";
        assert_eq!(parser.parse(output).unwrap(), 10);
    }

    #[test]
    fn missing_pattern_is_reported() {
        let parser = default_parser();
        let err = parser.parse("segfault\n").unwrap_err();
        assert!(matches!(err, BenchError::PatternNotFound { .. }));
        assert!(err.to_string().contains("Execution time"));
    }

    #[test]
    fn unparsable_number_is_reported() {
        let parser = default_parser();
        let err = parser.parse("Execution time: 1.2.3 milliseconds").unwrap_err();
        match err {
            BenchError::NumberParse { text } => assert_eq!(text, "1.2.3"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn last_line_scope_ignores_earlier_lines() {
        let parser = RegexParser::new(r"(\d+)ms$", TimeUnit::Milliseconds, MatchScope::LastLine).unwrap();
        assert_eq!(parser.parse("warmup 5ms\nsum=42\ntime 250ms\n\n").unwrap(), 250);
        assert!(parser.parse("time 250ms\nsum=42\n").is_err());
    }

    #[test]
    fn last_line_of_empty_output() {
        assert_eq!(last_line(""), "");
        assert_eq!(last_line("\n  \n"), "");
    }

    #[test]
    fn invalid_regex_is_rejected() {
        let err = RegexParser::new("([", TimeUnit::Milliseconds, MatchScope::Anywhere).unwrap_err();
        assert!(matches!(err, BenchError::InvalidPattern { .. }));
    }

    #[test]
    fn pattern_without_group_is_rejected() {
        let err = RegexParser::new(r"\d+ ms", TimeUnit::Milliseconds, MatchScope::Anywhere).unwrap_err();
        assert!(err.to_string().contains("capture group"));
    }
}

//! Configuration loading from `threadbench.toml` and command-line overrides.
//!
//! A config file is optional. Values are layered file-first, then flags, and
//! the result is validated once into an immutable [`BenchConfig`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::BenchError;
use crate::filter::FilterPolicy;
use crate::parse::{DEFAULT_PATTERN, MatchScope, RegexParser, TimeUnit};
use crate::types::ModeSpec;

pub const CONFIG_FILE_NAME: &str = "threadbench.toml";
pub const DEFAULT_THREADS: &[u32] = &[1, 2, 4, 6, 8, 10, 12, 14, 16];
pub const DEFAULT_RUNS: usize = 10;
pub const DEFAULT_OUTPUT: &str = "results.json";

/// Raw, partially specified configuration as read from TOML or built from flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub program: Option<PathBuf>,
    /// Arguments placed before the mode id (e.g. a script or class name).
    pub pre_args: Option<Vec<String>>,
    /// Extra positional arguments appended after the cell parameters.
    pub args: Option<Vec<String>>,
    /// Result key used when the program has no modes.
    pub name: Option<String>,
    pub threads: Option<Vec<u32>>,
    pub runs: Option<usize>,
    pub filter: Option<FilterPolicy>,
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub parser: ParserSection,
    pub modes: Option<Vec<ModeSpec>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParserSection {
    pub pattern: Option<String>,
    pub unit: Option<TimeUnit>,
    pub scope: Option<MatchScope>,
}

impl FileConfig {
    /// Read and parse a TOML config file.
    pub fn load(path: &Path) -> Result<Self, BenchError> {
        let text = std::fs::read_to_string(path).map_err(|source| BenchError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text, path)
    }

    pub fn from_toml(text: &str, path: &Path) -> Result<Self, BenchError> {
        toml::from_str(text).map_err(|e| BenchError::ConfigParse {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
    }

    /// Layer `overlay` on top of `self`; every key set in `overlay` wins.
    pub fn merge(self, overlay: FileConfig) -> FileConfig {
        FileConfig {
            program: overlay.program.or(self.program),
            pre_args: overlay.pre_args.or(self.pre_args),
            args: overlay.args.or(self.args),
            name: overlay.name.or(self.name),
            threads: overlay.threads.or(self.threads),
            runs: overlay.runs.or(self.runs),
            filter: overlay.filter.or(self.filter),
            output: overlay.output.or(self.output),
            parser: ParserSection {
                pattern: overlay.parser.pattern.or(self.parser.pattern),
                unit: overlay.parser.unit.or(self.parser.unit),
                scope: overlay.parser.scope.or(self.parser.scope),
            },
            modes: overlay.modes.or(self.modes),
        }
    }

    /// Apply defaults and validate.
    pub fn into_config(self) -> Result<BenchConfig, BenchError> {
        let program = self.program.ok_or(BenchError::MissingProgram)?;

        let threads = self.threads.unwrap_or_else(|| DEFAULT_THREADS.to_vec());
        validate_threads(&threads, "threads")?;

        let runs = self.runs.unwrap_or(DEFAULT_RUNS);
        if runs == 0 {
            return Err(invalid("runs must be at least 1"));
        }

        let modes = match self.modes {
            Some(modes) if !modes.is_empty() => modes,
            _ => {
                let name = self
                    .name
                    .unwrap_or_else(|| default_mode_name(&program));
                vec![ModeSpec::single(name)]
            }
        };
        validate_modes(&modes)?;

        let pattern = self
            .parser
            .pattern
            .unwrap_or_else(|| DEFAULT_PATTERN.to_string());
        let unit = self.parser.unit.unwrap_or_default();
        let scope = self.parser.scope.unwrap_or_default();
        // Compile once here so a bad pattern fails before any process runs.
        RegexParser::new(&pattern, unit, scope)?;

        Ok(BenchConfig {
            program,
            pre_args: self.pre_args.unwrap_or_default(),
            extra_args: self.args.unwrap_or_default(),
            modes,
            threads,
            runs,
            filter: self.filter.unwrap_or_default(),
            output: self.output.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT)),
            pattern,
            unit,
            scope,
        })
    }
}

/// Find the config file to use.
///
/// An explicit path must exist. Otherwise `./threadbench.toml`, then
/// `<config_dir>/threadbench/config.toml`, are tried in order.
pub fn discover(explicit: Option<&Path>) -> Result<Option<PathBuf>, BenchError> {
    let cwd = std::env::current_dir().unwrap_or_default();
    discover_in(explicit, &cwd, dirs::config_dir())
}

pub fn discover_in(
    explicit: Option<&Path>,
    cwd: &Path,
    config_dir: Option<PathBuf>,
) -> Result<Option<PathBuf>, BenchError> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(BenchError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        return Ok(Some(path.to_path_buf()));
    }

    let local = cwd.join(CONFIG_FILE_NAME);
    if local.is_file() {
        return Ok(Some(local));
    }

    let user = config_dir.map(|dir| dir.join("threadbench").join("config.toml"));
    Ok(user.filter(|path| path.is_file()))
}

/// Fully resolved, immutable benchmark settings.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchConfig {
    pub program: PathBuf,
    pub pre_args: Vec<String>,
    pub extra_args: Vec<String>,
    pub modes: Vec<ModeSpec>,
    pub threads: Vec<u32>,
    pub runs: usize,
    pub filter: FilterPolicy,
    pub output: PathBuf,
    pub pattern: String,
    pub unit: TimeUnit,
    pub scope: MatchScope,
}

impl BenchConfig {
    /// Thread counts benchmarked for `mode`.
    pub fn threads_for<'a>(&'a self, mode: &'a ModeSpec) -> &'a [u32] {
        mode.threads.as_deref().unwrap_or(self.threads.as_slice())
    }

    pub fn parser(&self) -> Result<RegexParser, BenchError> {
        RegexParser::new(&self.pattern, self.unit, self.scope)
    }

    /// Total number of configuration cells.
    pub fn cell_count(&self) -> usize {
        self.modes.iter().map(|m| self.threads_for(m).len()).sum()
    }
}

fn invalid(detail: impl Into<String>) -> BenchError {
    BenchError::InvalidConfig {
        detail: detail.into(),
    }
}

fn validate_threads(threads: &[u32], what: &str) -> Result<(), BenchError> {
    if threads.is_empty() {
        return Err(invalid(format!("{} must list at least one thread count", what)));
    }
    if threads.contains(&0) {
        return Err(invalid(format!("{} contains a zero thread count", what)));
    }
    let mut seen = HashSet::new();
    if let Some(dup) = threads.iter().find(|&&t| !seen.insert(t)) {
        return Err(invalid(format!("{} has duplicate thread count {}", what, dup)));
    }
    Ok(())
}

fn validate_modes(modes: &[ModeSpec]) -> Result<(), BenchError> {
    let mut seen = HashSet::new();
    for mode in modes {
        if mode.name.trim().is_empty() {
            return Err(invalid("mode names must not be empty"));
        }
        if !seen.insert(mode.name.as_str()) {
            return Err(invalid(format!("duplicate mode name '{}'", mode.name)));
        }
        if let Some(threads) = &mode.threads {
            validate_threads(threads, &format!("threads for mode '{}'", mode.name))?;
        }
    }

    if modes.len() > 1 && modes.iter().any(|m| m.id.is_none()) {
        return Err(invalid("every mode needs an id when more than one mode is configured"));
    }
    Ok(())
}

fn default_mode_name(program: &Path) -> String {
    program
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("benchmark")
        .to_string()
}

use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum BenchError {
    #[error("No config file found at {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {detail}")]
    ConfigParse { path: PathBuf, detail: String },

    #[error("Invalid configuration: {detail}")]
    InvalidConfig { detail: String },

    #[error("Invalid output pattern '{pattern}': {detail}")]
    InvalidPattern { pattern: String, detail: String },

    #[error("No benchmark program given. Pass it as an argument or set `program` in the config file")]
    MissingProgram,

    #[error("Invalid mode '{spec}'. Expected ID=NAME or NAME")]
    InvalidMode { spec: String },

    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{command} exited with {status}")]
    ProcessFailed { command: String, status: String },

    #[error("No line matching '{pattern}' in output")]
    PatternNotFound { pattern: String },

    #[error("Could not parse '{text}' as a time measurement")]
    NumberParse { text: String },

    #[error("No valid runs for {cell}")]
    NoSamples { cell: String },

    #[error("All {count} runs excluded after filtering for {cell}")]
    AllFiltered { cell: String, count: usize },

    #[error("Result serialization failed: {source}")]
    Serialize { source: serde_json::Error },

    #[error("Failed to write results to {path}: {source}")]
    WriteResults {
        path: PathBuf,
        source: std::io::Error,
    },
}

//! Error types for the few truly exceptional conditions.
//!
//! Infeasible sequences are not errors: they are plain `None`/`false` results
//! consumed by the search. The enums below cover malformed inputs and solver
//! backend failures only.

use std::path::PathBuf;

use crate::model::NodeId;

#[derive(thiserror::Error, Debug)]
pub enum OracleError {
    #[error("distance matrix row {row} has {len} entries, expected {expected}")]
    NotSquare {
        row: usize,
        len: usize,
        expected: usize,
    },
    #[error("travel time {0} does not fit in seconds")]
    OutOfRange(i64),
    #[error("edge references unknown node {0}")]
    UnknownNode(NodeId),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failure reading config from {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse matching config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid matching config: {0}")]
    Invalid(String),
}

#[derive(thiserror::Error, Debug)]
pub enum SolverError {
    #[error("variable {0} does not belong to this model")]
    UnknownVariable(usize),
    #[error("constraint '{name}' references variable {var} more than once")]
    DuplicateTerm { name: String, var: usize },
    #[error("objective weights overflow: {0}")]
    Overflow(String),
    #[error("no solution available, solve status is {0}")]
    NoSolution(String),
}

#[derive(thiserror::Error, Debug)]
pub enum SnapshotError {
    #[error("failure writing snapshot to {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum ScenarioError {
    #[error("scenario center {0:#x} is not a valid H3 cell")]
    InvalidCenter(u64),
    #[error("scenario needs at least two nodes, grid radius {0} gives fewer")]
    TooFewNodes(u32),
    #[error("invalid scenario: {0}")]
    Invalid(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

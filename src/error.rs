use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("benchmark id: {0} not found")]
    BenchmarkNotFound(String),

    #[error("benchmark {0} has a cyclic parent chain")]
    ParentCycle(String),

    #[error("system_query or datasets must be set by benchmark {0}")]
    MissingSystemSource(String),

    #[error(
        "metrics must be specified either on a global or local level, but {dataset_name} -- {sub_dataset} -- {split} specified neither"
    )]
    MissingMetrics {
        dataset_name: String,
        sub_dataset: String,
        split: String,
    },

    #[error("unsupported operation `{0}` in view spec")]
    UnknownOperation(String),

    #[error("operation `{op}` requires parameter `{param}`")]
    MissingParameter { op: &'static str, param: &'static str },

    #[error("unknown weight map `{0}`")]
    UnknownWeightMap(String),

    #[error("unknown default set `{0}`")]
    UnknownDefaultSet(String),

    #[error("view name `{0}` is reserved")]
    ReservedViewName(String),

    #[error("operation `{op}` references missing column `{column}`")]
    MissingColumn { op: &'static str, column: String },
}

//! Observability: typed append-only logs, local JSON artifacts and the
//! optional Elasticsearch index.

pub mod elastic;
pub mod log;
pub mod records;

pub use elastic::{ElasticClient, ElasticConfig, ElasticError, IndexNames};
pub use log::{BatchLogger, JsonLog, PreprocessLogger, RouterLogger, RunSummary};
pub use records::{
    BatchLog, CandidateLog, DecisionLog, LogRecord, PreprocessRecord, RunSummaryEntry,
};

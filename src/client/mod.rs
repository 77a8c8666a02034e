//! Consumer side of the analysis API.

pub mod poller;

pub use poller::{
    AnalysisEndpoint, AnalysisPoller, AnalyzeReply, HttpAnalysisEndpoint, PollError, PollOutcome,
    PollerConfig,
};

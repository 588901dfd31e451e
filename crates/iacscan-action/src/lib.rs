//! Pull request scanning workflow.
//!
//! Selects changed infrastructure-as-code files, uploads them to the
//! template scanning service, polls for results and reports findings as
//! pull request comments.

pub mod github;
pub mod pipeline;
pub mod poller;
pub mod report;
pub mod scanner;
pub mod selector;

pub(crate) mod bootstrap;
pub(crate) mod cli;
pub(crate) mod loop_runner;
pub(crate) mod report;
pub(crate) mod scenario;
pub(crate) mod script_log;

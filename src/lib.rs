pub mod cli;
pub mod config;
pub mod events;
pub mod logging;
pub mod run;
pub mod store;
pub mod vcs;

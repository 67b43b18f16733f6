pub mod builder;
pub mod error;
pub mod event;
pub mod formatter;
pub mod job;
pub mod probe;
pub mod progress;
pub mod runner;
pub mod suggest;
pub mod tokenize;

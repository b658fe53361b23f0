//! Integration tests

mod config_test;
mod execution_test;
mod scheduler_test;
mod stream_test;
mod support;

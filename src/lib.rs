pub mod block_state;
pub mod clean;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod pipeline;
pub mod scheduler;
pub mod screener;
pub mod storage;

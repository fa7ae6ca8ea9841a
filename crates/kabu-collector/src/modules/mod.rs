//! 데이터 수집 모듈.

pub mod executor;
pub mod history;
pub mod pipeline;
pub mod universe_sync;
pub mod view;
pub mod window;

pub use executor::{wait_with_retry, ExecutorOptions, FetchBatch, FetchExecutor, RetryPolicy};
pub use history::{cleanup_history, history_statistics, query_history};
pub use pipeline::{run_collection, RunOptions, RunReport};
pub use universe_sync::{acquire_codes, build_universe_chain, sync_codes, CodesSyncReport};
pub use view::sector_view;
pub use window::{select_window, Window, WindowOptions};

#![allow(dead_code)]

pub mod fixtures;
pub mod mock_collector;
pub mod shared_buffer;

pub use fixtures::{
    BufferedConsole, FLUSH_WAIT, RecordingSink, buffered_console, new_buffered_console, test_config,
};
pub use mock_collector::{CapturedRequest, spawn_mock_collector};
pub use shared_buffer::SharedBuf;

pub mod fake_interpreter;
pub mod mock_execution_server;
pub mod recording_sink;

//! Shared helpers for transport integration tests.

pub mod mock_ws;

//! Integration tests for Opswatch
//!
//! These tests drive complete watchdog cycles through the real stages and
//! reasoning client, with tool backends replaced by in-memory fakes and the
//! chat completions endpoint replaced by a mock server.

mod escalation;
mod reasoning;
mod status_routes;

//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters.  All tests run on the host with no modem
//! required.

mod loader_tests;
mod mock_modem;
mod refresh_tests;
mod session_tests;

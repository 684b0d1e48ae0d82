//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises the node core against
//! the simulation adapters.  All tests run on the host (x86_64) with no
//! real hardware required.

mod lifecycle_tests;
mod mock_hw;
mod poll_cycle_tests;

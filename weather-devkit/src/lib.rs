/*!
# Weather DevKit

Helpers for exercising the aggregator end to end:
- `TestHarness`: aggregator on an ephemeral port with a scratch data dir,
  restartable on the same data
- `fixtures`: station builders with their JSON and station-file encodings
*/

pub mod fixtures;
pub mod test_utils;

pub use fixtures::{station, StationBuilder};
pub use test_utils::{clock_of, TestHarness};

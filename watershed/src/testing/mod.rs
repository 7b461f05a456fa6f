//! Test support: a small valley scenario and fault-injecting engines.

mod fixtures;
mod mocks;

pub use fixtures::{
    pitted_dem, quarter_sections, scenario_config, scenario_tiles, seed_workspace, valley_dem, write_reference,
    write_sections,
};
pub use mocks::FailAfterEngine;

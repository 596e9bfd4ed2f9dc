//! Job setup: the ordered pre phase and the post phase

pub mod layout;
pub mod sequencer;
pub mod steps;

pub use layout::{Layout, SetupInputs, ALL_ARCHES};
pub use sequencer::{PreReport, Sequencer, SetupContext};
pub use steps::{SetupStep, PRE_SEQUENCE};

//! Execution engine
//!
//! 1. Planning - refresh tracked objects and stage the changes
//! 2. Diffing - render what each object will go through
//! 3. Executing - apply the stages in order, saving state after each

pub mod differ;
pub mod executor;
pub mod planner;

pub use executor::{ApplyOptions, apply};

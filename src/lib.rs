//! Packing of binarized neural network parameters for a bit-serial accelerator
//! and verification of the accelerator's output against reference results.

pub mod accel;
pub mod binarize;
pub mod harness;
pub mod initializer;
pub mod layout;
pub mod packer;
pub mod topology;
pub mod word;

pub use accel::{Accelerator, Execution, Geometry, LayerMode};
pub use harness::{Harness, HarnessError, Verdict};
pub use layout::{LayerLayout, Layout};
pub use packer::Packer;
pub use topology::{LayerKind, LayerSpec, Topology, TopologyError};
pub use word::Word;

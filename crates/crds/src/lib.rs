//! oVirt ImageIO Populator CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the oVirt ImageIO volume populator.

pub mod ovirt_imageio_populator;

pub use ovirt_imageio_populator::*;

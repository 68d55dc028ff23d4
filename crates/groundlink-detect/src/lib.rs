//! Operating-envelope anomaly detection for Groundlink telemetry.
//!
//! Each measurement field carries a two-tier policy: a single-sided hard
//! limit signalling an acute condition, checked first, and a two-sided
//! normal operating band checked only if the hard limit passes. A field
//! therefore contributes at most one finding per frame, and findings are
//! reported in the fixed order temperature, battery, altitude, signal.
//!
//! Evaluation is a pure function over the payload; it knows nothing about
//! which subsystem produced the sample. The caller stamps the subsystem ID
//! onto the findings when persisting them.

mod envelope;

pub use envelope::{evaluate, Finding};

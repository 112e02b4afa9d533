//! Fixed point estimation of breathing and heart rate from a single sensor trace
//!
//! The building blocks (filters, detectors, peak finding, signal quality) are plain functions over
//! caller supplied buffers and state structs. [`stream`] wires them into a sample-by-sample state
//! machine that reports a rate once per increment.
#![cfg_attr(not(feature = "std"), no_std)]

pub mod buffer;
pub mod config;
pub mod crossing;
#[cfg(feature = "cwt")]
pub mod cwt;
pub mod error;
pub mod fft;
pub mod find_peaks;
pub mod fixed;
#[cfg(feature = "std")]
pub mod generation;
pub mod pipeline;
pub mod sos;
pub mod sqi;
pub mod srmac;
pub mod stats;
pub mod stream;
pub mod terma;

pub use error::{Error, Result};
pub use fixed::Fixed;
pub use pipeline::{ChannelParams, RateEstimate, Sqi};
pub use stream::{JointChannels, SingleChannel, Status, StreamConfig};

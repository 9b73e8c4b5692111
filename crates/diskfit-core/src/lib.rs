//! Radiative-transfer modeling of protoplanetary disks.
//!
//! Parameters are resolved into a [`model::PhysicalModel`], written in the
//! engine's file formats, run through the external engine by a
//! [`engine::SimulationDriver`] and turned into visibilities, images and
//! spectra comparable with observations.

pub mod common;
pub mod domain;
pub mod engine;
pub mod formats;
pub mod model;
pub mod observables;

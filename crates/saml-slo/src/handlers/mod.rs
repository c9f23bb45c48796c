//! HTTP handlers for Single Logout endpoints

pub mod slo;

pub use slo::{slo_post, slo_redirect, SharedSessionParticipants, SloState};

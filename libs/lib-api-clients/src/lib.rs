//! Thin HTTP/SMTP clients for the external systems the robot talks to.
//!
//! These wrappers carry no pipeline logic. Tokens and connection strings are
//! handed in by the caller; acquiring them is someone else's job.

pub mod bucket;
pub mod graph;
pub mod nova;
pub mod queue;
pub mod smtp;

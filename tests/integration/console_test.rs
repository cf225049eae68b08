//! End-to-end console scenarios against a stubbed lending backend
//!
//! Every test drives the real reqwest transport through the composition root.

#![allow(dead_code)]

mod common;
mod loans;
mod session;
mod users;

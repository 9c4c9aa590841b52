//! Entity Module

pub mod answer;
pub mod participant;
pub mod room;

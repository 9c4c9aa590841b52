//! Value Object Module

pub mod display_name;
pub mod question;
pub mod room_code;
pub mod room_status;

#![forbid(unsafe_code)]

pub mod import;
pub mod list;
pub mod model;
pub mod view;

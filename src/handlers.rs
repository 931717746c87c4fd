pub mod contracts;
pub mod files;
pub mod signing;

pub mod contract;
pub mod rendering;
pub mod signing;

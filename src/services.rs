pub mod auth;
pub mod contract_service;
pub mod document_service;
pub mod feed;
pub mod lifecycle;
pub mod placement;
pub mod rendering;
pub mod signature_image;
pub mod signing;

pub mod auth;
pub mod dashboard_service;
pub mod document_service;
pub mod material_payment_service;
pub mod payment_grouping;
pub mod treasury_service;

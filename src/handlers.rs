pub mod auth;
pub mod dashboard;
pub mod documents;
pub mod material_payments;
pub mod treasury;
pub mod users;

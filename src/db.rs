pub mod user_repo;
pub use user_repo::UserRepository;
pub mod treasury_repo;
pub use treasury_repo::TreasuryRepository;
pub mod account_repo;
pub use account_repo::AccountRepository;
pub mod material_payment_repo;
pub use material_payment_repo::MaterialPaymentRepository;
pub mod dashboard_repo;
pub use dashboard_repo::DashboardRepository;

pub mod user_repo;
pub use user_repo::UserRepository;
pub mod organization_repo;
pub use organization_repo::OrganizationRepository;
pub mod company_repo;
pub use company_repo::CompanyRepository;
pub mod certificate_repo;
pub use certificate_repo::CertificateRepository;
pub mod permission_repo;
pub use permission_repo::PermissionRepository;
pub mod session_repo;
pub use session_repo::SessionRepository;
pub mod audit_repo;
pub use audit_repo::AuditRepository;
pub mod dashboard_repo;
pub use dashboard_repo::DashboardRepository;

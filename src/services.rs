pub mod audit_service;
pub mod auth;
pub mod certificate_service;
pub mod company_service;
pub mod dashboard_service;
pub mod organization_service;
pub mod permission_service;
pub mod user_service;
#[cfg(test)]
pub mod testing;

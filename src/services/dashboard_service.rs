// src/services/dashboard_service.rs

use chrono::{NaiveDate, Utc};

use crate::{
    common::error::AppError,
    db::{DashboardRepository, OrganizationRepository},
    models::{
        auth::User,
        certificate::{days_until, CertificateStatus, EXPIRING_THRESHOLD_DAYS},
        dashboard::{CertificateExpiryRow, CertificateStats, UpcomingExpiration, UserStats},
        organization::OrganizationSummary,
    },
    services::permission_service::admin_scope,
};

const UPCOMING_LIMIT: usize = 10;

/// Monta as estatísticas a partir das linhas cruas. A situação de cada
/// certificado é derivada de `today`, nunca lida do banco.
pub fn summarize_certificates(
    rows: Vec<CertificateExpiryRow>,
    today: NaiveDate,
    warning_days: i64,
) -> CertificateStats {
    let mut stats = CertificateStats::default();

    for row in rows {
        stats.total += 1;
        match row.certificate_type.as_str() {
            "A1" => stats.a1 += 1,
            "A3" => stats.a3 += 1,
            _ => {}
        }

        let days = days_until(row.expiration_date, today);
        match CertificateStatus::from_days_remaining(days) {
            CertificateStatus::Valid => stats.valid += 1,
            CertificateStatus::Expiring => stats.expiring += 1,
            CertificateStatus::Expired => stats.expired += 1,
        }

        if days > 0 && days <= warning_days && stats.upcoming.len() < UPCOMING_LIMIT {
            stats.upcoming.push(UpcomingExpiration {
                certificate_id: row.id,
                name: row.name,
                company_name: row.company_name,
                expiration_date: row.expiration_date,
                days_until_expiration: days,
            });
        }
    }

    stats
}

#[derive(Clone)]
pub struct DashboardService {
    repo: DashboardRepository,
    org_repo: OrganizationRepository,
}

impl DashboardService {
    pub fn new(repo: DashboardRepository, org_repo: OrganizationRepository) -> Self {
        Self { repo, org_repo }
    }

    pub async fn user_stats(&self, actor: &User) -> Result<UserStats, AppError> {
        let scope = admin_scope(actor)?;
        self.repo.user_stats(scope).await
    }

    pub async fn certificate_stats(&self, actor: &User) -> Result<CertificateStats, AppError> {
        let scope = admin_scope(actor)?;

        let warning_days = match scope {
            Some(org_id) => {
                self.org_repo
                    .get_settings(org_id)
                    .await?
                    .notification_policy
                    .expiration_warning_days
            }
            None => EXPIRING_THRESHOLD_DAYS,
        };

        let rows = self.repo.certificate_expiry_rows(scope).await?;
        Ok(summarize_certificates(rows, Utc::now().date_naive(), warning_days))
    }

    /// Visão de todas as organizações. Exclusivo do system_admin.
    pub async fn organizations(&self, actor: &User) -> Result<Vec<OrganizationSummary>, AppError> {
        if !actor.role.is_system_admin() {
            return Err(AppError::Forbidden);
        }
        self.repo.organization_summaries().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()
    }

    fn row(kind: &str, days: i64) -> CertificateExpiryRow {
        CertificateExpiryRow {
            id: Uuid::new_v4(),
            name: format!("{} em {} dias", kind, days),
            company_name: "Acme".into(),
            certificate_type: kind.into(),
            expiration_date: today() + Duration::days(days),
        }
    }

    #[test]
    fn counts_by_status_and_type() {
        let rows = vec![row("A1", -3), row("A1", 0), row("A3", 10), row("A1", 30), row("A3", 200)];
        let stats = summarize_certificates(rows, today(), 30);

        assert_eq!(stats.total, 5);
        assert_eq!(stats.expired, 2);
        assert_eq!(stats.expiring, 2);
        assert_eq!(stats.valid, 1);
        assert_eq!(stats.a1, 3);
        assert_eq!(stats.a3, 2);
    }

    #[test]
    fn upcoming_excludes_expired_and_respects_warning_window() {
        let rows = vec![row("A1", -1), row("A1", 5), row("A1", 20), row("A1", 45)];
        let stats = summarize_certificates(rows, today(), 30);
        let days: Vec<i64> = stats.upcoming.iter().map(|u| u.days_until_expiration).collect();
        assert_eq!(days, vec![5, 20]);

        let wider = summarize_certificates(vec![row("A3", 45)], today(), 60);
        assert_eq!(wider.upcoming.len(), 1);
    }

    #[test]
    fn upcoming_list_is_capped() {
        let rows = (1..=15).map(|d| row("A1", d)).collect();
        let stats = summarize_certificates(rows, today(), 30);
        assert_eq!(stats.upcoming.len(), UPCOMING_LIMIT);
        assert_eq!(stats.expiring, 15);
    }
}

// src/services/auth.rs

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    crypto::{password, totp, SecretCipher},
    db::{user_repo::NewUser, OrganizationRepository, SessionRepository, UserRepository},
    models::{
        audit::{ActivityAction, AuditEntity, ClientInfo, NewActivityLog, NewSecurityLog, SecurityEvent},
        auth::{
            ChangePasswordPayload, Claims, LoginPayload, RegisterPayload, Session, TwoFactorSetupResponse,
            User, UserRole,
        },
        organization::{OrganizationSettings, PasswordPolicy},
    },
    services::audit_service::AuditTrail,
};

pub const MAX_FAILED_ATTEMPTS: i32 = 5;
pub const LOCKOUT_WINDOW_MINUTES: i64 = 15;
pub const TOTP_ISSUER: &str = "Gestor de Certificados";

// =========================================================================
//  BLOQUEIO POR TENTATIVAS
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockoutState {
    /// Login liberado; `prior_failures` conta as falhas ainda dentro da janela.
    Open { prior_failures: i32 },
    Locked { retry_after_secs: i64 },
}

/// Janela móvel: cada falha renova a janela de 15 minutos. Falhas mais
/// antigas que a janela não contam.
pub fn lockout_state(
    failed_attempts: i32,
    last_failed_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> LockoutState {
    let window = Duration::minutes(LOCKOUT_WINDOW_MINUTES);
    let Some(last) = last_failed_at else {
        return LockoutState::Open { prior_failures: 0 };
    };

    let unlocks_at = last + window;
    if now >= unlocks_at {
        return LockoutState::Open { prior_failures: 0 };
    }

    if failed_attempts >= MAX_FAILED_ATTEMPTS {
        LockoutState::Locked { retry_after_secs: (unlocks_at - now).num_seconds().max(1) }
    } else {
        LockoutState::Open { prior_failures: failed_attempts }
    }
}

/// 2FA é exigido quando o próprio usuário ativou, ou quando a política
/// da organização alcança o papel dele.
pub fn two_factor_required(user: &User, settings: Option<&OrganizationSettings>) -> bool {
    user.two_factor_enabled
        || settings.is_some_and(|s| s.two_factor_policy.applies_to(user.role))
}

// =========================================================================
//  SERVIÇO
// =========================================================================

/// Resultado de um login (ou registro) bem-sucedido.
pub struct SessionGrant {
    pub user: User,
    pub session: Session,
    /// JWT a ser gravado no cookie
    pub token: String,
    pub requires_two_factor: bool,
}

#[derive(Clone)]
pub struct AuthService {
    user_repo: UserRepository,
    org_repo: OrganizationRepository,
    session_repo: SessionRepository,
    cipher: SecretCipher,
    audit: AuditTrail,
    session_secret: String,
    pool: PgPool,
}

impl AuthService {
    pub fn new(
        user_repo: UserRepository,
        org_repo: OrganizationRepository,
        session_repo: SessionRepository,
        cipher: SecretCipher,
        audit: AuditTrail,
        session_secret: String,
        pool: PgPool,
    ) -> Self {
        Self { user_repo, org_repo, session_repo, cipher, audit, session_secret, pool }
    }

    // ---
    // Registro
    // ---

    /// Com organização: cria a organização e o usuário como org_admin.
    /// Sem organização: só a primeira conta do sistema, que vira system_admin.
    pub async fn register(&self, payload: RegisterPayload, client: &ClientInfo) -> Result<SessionGrant, AppError> {
        let role = if payload.organization.is_some() {
            UserRole::OrgAdmin
        } else if self.user_repo.count_users().await? == 0 {
            UserRole::SystemAdmin
        } else {
            return Err(AppError::InvalidInput(
                "Informe os dados da organização para criar a conta.".into(),
            ));
        };

        // Organização nova ainda não tem configuração: vale a política padrão
        PasswordPolicy::default()
            .check(&payload.password)
            .map_err(AppError::WeakPassword)?;

        let password_hash = hash_blocking(payload.password.clone()).await?;

        let mut tx = self.pool.begin().await?;

        let organization = match &payload.organization {
            Some(org) => Some(
                self.org_repo
                    .create_organization(&mut *tx, &org.name, &org.identifier, org.domain.as_deref())
                    .await?,
            ),
            None => None,
        };

        let user = self
            .user_repo
            .create_user(
                &mut *tx,
                NewUser {
                    organization_id: organization.as_ref().map(|o| o.id),
                    username: &payload.username,
                    email: &payload.email,
                    password_hash: &password_hash,
                    name: &payload.name,
                    role,
                },
            )
            .await?;

        tx.commit().await?;

        tracing::info!("🆕 Conta '{}' registrada como {}", user.username, role.as_str());
        self.audit.append_activity(
            NewActivityLog::new(ActivityAction::Create, AuditEntity::User, client)
                .by(user.id, user.organization_id)
                .on(user.id)
                .with_details(json!({ "selfRegistration": true, "role": role.as_str() })),
        );

        self.start_session(user, client).await
    }

    // ---
    // Login / logout
    // ---

    pub async fn login(&self, payload: LoginPayload, client: &ClientInfo) -> Result<SessionGrant, AppError> {
        let now = Utc::now();

        let Some(user) = self.user_repo.find_by_login(payload.username.trim()).await? else {
            self.audit.append_security(
                NewSecurityLog::new(SecurityEvent::LoginFailed, client)
                    .with_details(json!({ "reason": "unknown_user", "username": payload.username })),
            );
            return Err(AppError::InvalidCredentials);
        };

        if !user.is_active() {
            self.audit.append_security(
                NewSecurityLog::new(SecurityEvent::LoginFailed, client)
                    .by(user.id, user.organization_id)
                    .with_details(json!({ "reason": "account_inactive" })),
            );
            return Err(AppError::AccountInactive);
        }

        let prior_failures = match lockout_state(user.failed_login_attempts, user.last_failed_login_at, now) {
            LockoutState::Locked { retry_after_secs } => {
                self.audit.append_security(
                    NewSecurityLog::new(SecurityEvent::LoginFailed, client)
                        .by(user.id, user.organization_id)
                        .with_details(json!({ "reason": "account_locked" })),
                );
                return Err(AppError::AccountLocked { retry_after_secs });
            }
            LockoutState::Open { prior_failures } => prior_failures,
        };

        if !verify_blocking(payload.password, user.password_hash.clone()).await? {
            let attempts = prior_failures + 1;
            self.user_repo.record_failed_login(user.id, attempts, now).await?;
            self.audit.append_security(
                NewSecurityLog::new(SecurityEvent::LoginFailed, client)
                    .by(user.id, user.organization_id)
                    .with_details(json!({ "reason": "invalid_password", "attempts": attempts })),
            );

            if attempts >= MAX_FAILED_ATTEMPTS {
                tracing::warn!("🔒 Conta '{}' bloqueada após {} falhas", user.username, attempts);
                self.audit.append_security(
                    NewSecurityLog::new(SecurityEvent::AccountLocked, client)
                        .by(user.id, user.organization_id)
                        .with_details(json!({ "attempts": attempts, "windowMinutes": LOCKOUT_WINDOW_MINUTES })),
                );
            }
            return Err(AppError::InvalidCredentials);
        }

        self.user_repo
            .record_successful_login(user.id, client.ip_address.as_deref())
            .await?;

        let grant = self.start_session(user, client).await?;

        self.audit.append_activity(
            NewActivityLog::new(ActivityAction::Login, AuditEntity::Session, client)
                .by(grant.user.id, grant.user.organization_id)
                .on(grant.session.id),
        );
        self.audit.append_security(
            NewSecurityLog::new(SecurityEvent::LoginSuccess, client)
                .by(grant.user.id, grant.user.organization_id)
                .with_details(json!({ "requiresTwoFactor": grant.requires_two_factor })),
        );

        Ok(grant)
    }

    /// Os registros são enfileirados antes de a sessão ser destruída,
    /// enquanto a identidade do usuário ainda está disponível.
    pub async fn logout(&self, user: &User, session: &Session, client: &ClientInfo) -> Result<(), AppError> {
        self.audit.append_activity(
            NewActivityLog::new(ActivityAction::Logout, AuditEntity::Session, client)
                .by(user.id, user.organization_id)
                .on(session.id),
        );
        self.audit.append_security(
            NewSecurityLog::new(SecurityEvent::Logout, client).by(user.id, user.organization_id),
        );

        self.session_repo.delete_session(session.id).await
    }

    // ---
    // Sessões
    // ---

    async fn start_session(&self, user: User, client: &ClientInfo) -> Result<SessionGrant, AppError> {
        let settings = self.settings_for(&user).await?;
        let requires_two_factor = two_factor_required(&user, settings.as_ref());
        let max_age_hours = settings
            .as_ref()
            .map(|s| s.session_policy.max_age_hours)
            .unwrap_or(24)
            .max(1);

        let now = Utc::now();
        let expires_at = now + Duration::hours(max_age_hours);

        let session = self
            .session_repo
            .create_session(user.id, !requires_two_factor, client, expires_at)
            .await?;
        let token = self.create_token(user.id, session.id, now, expires_at)?;

        Ok(SessionGrant { user, session, token, requires_two_factor })
    }

    /// Remove sessões vencidas; chamado periodicamente pelo main.
    pub async fn purge_expired_sessions(&self) -> Result<u64, AppError> {
        self.session_repo.purge_expired().await
    }

    /// Valida o JWT do cookie e carrega sessão + usuário.
    /// Sessão expirada, removida ou usuário inativo = não autenticado.
    pub async fn authenticate(&self, token: &str) -> Result<(User, Session), AppError> {
        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.session_secret.as_ref()),
            &Validation::default(),
        )
        .map_err(|_| AppError::Unauthenticated)?
        .claims;

        let session = self
            .session_repo
            .find_active(claims.sid)
            .await?
            .filter(|s| s.user_id == claims.sub)
            .ok_or(AppError::Unauthenticated)?;

        let user = self
            .user_repo
            .find_by_id(session.user_id)
            .await?
            .filter(User::is_active)
            .ok_or(AppError::Unauthenticated)?;

        Ok((user, session))
    }

    fn create_token(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let claims = Claims {
            sub: user_id,
            sid: session_id,
            exp: expires_at.timestamp() as usize,
            iat: issued_at.timestamp() as usize,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.session_secret.as_ref()),
        )?)
    }

    async fn settings_for(&self, user: &User) -> Result<Option<OrganizationSettings>, AppError> {
        match user.organization_id {
            Some(org_id) => Ok(Some(self.org_repo.get_settings(org_id).await?)),
            None => Ok(None),
        }
    }

    pub async fn password_policy_for(&self, organization_id: Option<Uuid>) -> Result<PasswordPolicy, AppError> {
        match organization_id {
            Some(org_id) => Ok(self.org_repo.get_settings(org_id).await?.password_policy),
            None => Ok(PasswordPolicy::default()),
        }
    }

    /// Barreira das operações sensíveis (ex.: revelar senha de certificado).
    pub async fn ensure_two_factor(&self, user: &User, session: &Session) -> Result<(), AppError> {
        if session.two_factor_authenticated {
            return Ok(());
        }
        let settings = self.settings_for(user).await?;
        if two_factor_required(user, settings.as_ref()) {
            Err(AppError::TwoFactorRequired)
        } else {
            Ok(())
        }
    }

    pub async fn requires_two_factor(&self, user: &User, session: &Session) -> Result<bool, AppError> {
        Ok(self.ensure_two_factor(user, session).await.is_err())
    }

    // ---
    // Segundo fator (TOTP)
    // ---

    pub async fn verify_two_factor(
        &self,
        user: &User,
        session: &Session,
        code: &str,
        client: &ClientInfo,
    ) -> Result<(), AppError> {
        let secret = self.active_secret(user)?;
        let now = Utc::now();

        // Códigos errados contam no mesmo bloqueio do login
        let prior_failures = match lockout_state(user.failed_login_attempts, user.last_failed_login_at, now) {
            LockoutState::Locked { retry_after_secs } => {
                self.audit.append_security(
                    NewSecurityLog::new(SecurityEvent::TwoFactorFailed, client)
                        .by(user.id, user.organization_id)
                        .with_details(json!({ "reason": "account_locked" })),
                );
                return Err(AppError::AccountLocked { retry_after_secs });
            }
            LockoutState::Open { prior_failures } => prior_failures,
        };

        if !totp::verify_code(&secret, code, now.timestamp()) {
            let attempts = prior_failures + 1;
            self.user_repo.record_failed_login(user.id, attempts, now).await?;
            self.audit.append_security(
                NewSecurityLog::new(SecurityEvent::TwoFactorFailed, client)
                    .by(user.id, user.organization_id)
                    .with_details(json!({ "attempts": attempts })),
            );

            if attempts >= MAX_FAILED_ATTEMPTS {
                tracing::warn!("🔒 Conta '{}' bloqueada após {} códigos 2FA inválidos", user.username, attempts);
                self.audit.append_security(
                    NewSecurityLog::new(SecurityEvent::AccountLocked, client)
                        .by(user.id, user.organization_id)
                        .with_details(json!({
                            "attempts": attempts,
                            "windowMinutes": LOCKOUT_WINDOW_MINUTES,
                            "reason": "two_factor",
                        })),
                );
            }
            return Err(AppError::InvalidTwoFactorCode);
        }

        if prior_failures > 0 {
            self.user_repo.clear_failed_logins(user.id).await?;
        }
        self.session_repo.mark_two_factor_verified(session.id).await?;
        self.audit.append_security(
            NewSecurityLog::new(SecurityEvent::TwoFactorVerified, client).by(user.id, user.organization_id),
        );
        Ok(())
    }

    /// Gera um segredo pendente. Só passa a valer depois do `enable_two_factor`.
    pub async fn setup_two_factor(&self, user: &User) -> Result<TwoFactorSetupResponse, AppError> {
        if user.two_factor_enabled {
            return Err(AppError::InvalidInput(
                "A autenticação de dois fatores já está ativa.".into(),
            ));
        }

        let secret = totp::generate_secret();
        self.user_repo
            .set_two_factor(user.id, Some(&self.cipher.encrypt(&secret)), false)
            .await?;

        let otpauth_url = totp::provisioning_uri(&secret, TOTP_ISSUER, &user.username);
        let qr_code_svg = qrcode::QrCode::new(otpauth_url.as_bytes())
            .map_err(|e| anyhow::anyhow!("Falha ao gerar QR Code: {}", e))?
            .render::<qrcode::render::svg::Color>()
            .min_dimensions(200, 200)
            .build();

        Ok(TwoFactorSetupResponse { secret, otpauth_url, qr_code_svg })
    }

    pub async fn enable_two_factor(
        &self,
        user: &User,
        session: &Session,
        code: &str,
        client: &ClientInfo,
    ) -> Result<(), AppError> {
        let encrypted = user
            .two_factor_secret
            .as_deref()
            .ok_or(AppError::TwoFactorNotConfigured)?;
        let secret = self.cipher.decrypt(encrypted)?;

        if !totp::verify_code(&secret, code, Utc::now().timestamp()) {
            return Err(AppError::InvalidTwoFactorCode);
        }

        self.user_repo.set_two_factor(user.id, Some(encrypted), true).await?;
        // Quem acabou de provar o código já está verificado nesta sessão
        self.session_repo.mark_two_factor_verified(session.id).await?;

        self.audit.append_security(
            NewSecurityLog::new(SecurityEvent::TwoFactorEnabled, client).by(user.id, user.organization_id),
        );
        Ok(())
    }

    pub async fn disable_two_factor(&self, user: &User, code: &str, client: &ClientInfo) -> Result<(), AppError> {
        let secret = self.active_secret(user)?;

        let settings = self.settings_for(user).await?;
        if settings.is_some_and(|s| s.two_factor_policy.applies_to(user.role)) {
            return Err(AppError::TwoFactorEnforced);
        }

        if !totp::verify_code(&secret, code, Utc::now().timestamp()) {
            return Err(AppError::InvalidTwoFactorCode);
        }

        self.user_repo.set_two_factor(user.id, None, false).await?;
        self.audit.append_security(
            NewSecurityLog::new(SecurityEvent::TwoFactorDisabled, client).by(user.id, user.organization_id),
        );
        Ok(())
    }

    fn active_secret(&self, user: &User) -> Result<String, AppError> {
        match (&user.two_factor_secret, user.two_factor_enabled) {
            (Some(encrypted), true) => Ok(self.cipher.decrypt(encrypted)?),
            _ => Err(AppError::TwoFactorNotConfigured),
        }
    }

    // ---
    // Troca de senha
    // ---

    /// Troca a própria senha. As demais sessões do usuário são encerradas;
    /// a sessão atual continua válida.
    pub async fn change_password(
        &self,
        user: &User,
        session: &Session,
        payload: ChangePasswordPayload,
        client: &ClientInfo,
    ) -> Result<(), AppError> {
        if !verify_blocking(payload.current_password, user.password_hash.clone()).await? {
            return Err(AppError::InvalidCredentials);
        }

        self.password_policy_for(user.organization_id)
            .await?
            .check(&payload.new_password)
            .map_err(AppError::WeakPassword)?;

        let password_hash = hash_blocking(payload.new_password).await?;
        self.user_repo.update_password(user.id, &password_hash).await?;
        let removed = self.session_repo.delete_other_sessions(user.id, session.id).await?;

        self.audit.append_security(
            NewSecurityLog::new(SecurityEvent::PasswordChanged, client).by(user.id, user.organization_id),
        );
        if removed > 0 {
            self.audit.append_security(
                NewSecurityLog::new(SecurityEvent::SessionTerminated, client)
                    .by(user.id, user.organization_id)
                    .with_details(json!({ "sessions": removed, "by": user.id })),
            );
        }
        self.audit.append_activity(
            NewActivityLog::new(ActivityAction::ChangePassword, AuditEntity::User, client)
                .by(user.id, user.organization_id)
                .on(user.id),
        );
        Ok(())
    }
}

// scrypt é caro de propósito: fora do executor assíncrono
pub async fn hash_blocking(password: String) -> Result<String, AppError> {
    let hashed = tokio::task::spawn_blocking(move || password::hash_password(&password))
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de hashing: {}", e))??;
    Ok(hashed)
}

pub async fn verify_blocking(password: String, stored: String) -> Result<bool, AppError> {
    let valid = tokio::task::spawn_blocking(move || password::verify_password(&password, &stored))
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))?;
    Ok(valid)
}

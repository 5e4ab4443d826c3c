//! Payment Accounts
//!
//! Each company is paid out through its own account at the payment
//! provider. Once onboarding is finished the dashboard link logs the company
//! in; before that it resumes onboarding.

use std::sync::Arc;

use tracing::{info, instrument};

use tow_core::{
    CompanyRepository, DashboardLink, DashboardLinkKind, PaymentAccount, PaymentAccountProvider,
    Result, TowError,
};

use crate::config::{with_deadline, BookingConfig};

/// Looks up company payment accounts and issues dashboard links
pub struct PaymentAccountService {
    companies: Arc<dyn CompanyRepository>,
    accounts: Arc<dyn PaymentAccountProvider>,
    config: BookingConfig,
}

impl PaymentAccountService {
    pub fn new(
        companies: Arc<dyn CompanyRepository>,
        accounts: Arc<dyn PaymentAccountProvider>,
        config: BookingConfig,
    ) -> Self {
        Self {
            companies,
            accounts,
            config,
        }
    }

    /// The payment account of a company
    #[instrument(skip(self))]
    pub async fn payment_account(&self, company_id: &str) -> Result<PaymentAccount> {
        let account_id = self.account_id(company_id).await?;
        with_deadline(
            self.config.call_timeout,
            self.accounts.account(&account_id),
            TowError::PaymentGateway,
        )
        .await
    }

    /// Login link for an onboarded account, onboarding link otherwise
    #[instrument(skip(self, return_url, refresh_url))]
    pub async fn dashboard_link(
        &self,
        company_id: &str,
        return_url: &str,
        refresh_url: &str,
    ) -> Result<DashboardLink> {
        let account = self.payment_account(company_id).await?;

        let (url, kind) = if account.details_submitted {
            let url = with_deadline(
                self.config.call_timeout,
                self.accounts.login_link(&account.id, return_url),
                TowError::PaymentGateway,
            )
            .await?;
            (url, DashboardLinkKind::Login)
        } else {
            let url = with_deadline(
                self.config.call_timeout,
                self.accounts.onboarding_link(&account.id, return_url, refresh_url),
                TowError::PaymentGateway,
            )
            .await?;
            (url, DashboardLinkKind::Onboarding)
        };

        info!(account_id = %account.id, kind = ?kind, "Issued dashboard link");
        Ok(DashboardLink { url, kind })
    }

    async fn account_id(&self, company_id: &str) -> Result<String> {
        if company_id.trim().is_empty() {
            return Err(TowError::CompanyNotFound("company id is empty".into()));
        }

        let company = self
            .companies
            .find_by_key(company_id)
            .await?
            .ok_or_else(|| TowError::CompanyNotFound(company_id.to_string()))?;

        company
            .stripe_account_id
            .filter(|id| !id.trim().is_empty())
            .ok_or(TowError::NoPaymentAccount(company.id))
    }
}

//! Stripe Connect Accounts
//!
//! Companies receive payouts through Express accounts. Only reading an
//! account and issuing its dashboard links is supported; accounts are
//! created during company onboarding elsewhere.

use async_trait::async_trait;
use stripe::{Account, AccountId, AccountLink, AccountLinkType, CreateAccountLink, LoginLink};
use tracing::debug;

use tow_core::{PaymentAccount, PaymentAccountProvider};

use crate::checkout::StripeGateway;
use crate::error::{logged, PaymentError, Result};

fn account_id(id: &str) -> Result<AccountId> {
    id.parse()
        .map_err(|e| PaymentError::InvalidAccount(format!("bad account id {id}: {e}")))
}

fn payment_account(account: &Account) -> PaymentAccount {
    PaymentAccount {
        id: account.id.to_string(),
        details_submitted: account.details_submitted.unwrap_or(false),
        charges_enabled: account.charges_enabled.unwrap_or(false),
        payouts_enabled: account.payouts_enabled.unwrap_or(false),
        email: account.email.clone(),
        country: account.country.clone(),
    }
}

impl StripeGateway {
    /// Fetch a connected account
    pub async fn retrieve_account(&self, id: &str) -> Result<PaymentAccount> {
        let id = account_id(id)?;
        let account = Account::retrieve(self.client(), &id, &[])
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        debug!(
            account_id = %id,
            details_submitted = ?account.details_submitted,
            "Retrieved account"
        );
        Ok(payment_account(&account))
    }

    /// Express dashboard login for an onboarded account
    pub async fn create_login_link(&self, id: &str, redirect_url: &str) -> Result<String> {
        let id = account_id(id)?;
        let link = LoginLink::create(self.client(), &id, redirect_url)
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;
        Ok(link.url)
    }

    /// Onboarding link for an account whose details are incomplete
    pub async fn create_onboarding_link(
        &self,
        id: &str,
        return_url: &str,
        refresh_url: &str,
    ) -> Result<String> {
        let mut params =
            CreateAccountLink::new(account_id(id)?, AccountLinkType::AccountOnboarding);
        params.return_url = Some(return_url);
        params.refresh_url = Some(refresh_url);

        let link = AccountLink::create(self.client(), params)
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;
        Ok(link.url)
    }
}

#[async_trait]
impl PaymentAccountProvider for StripeGateway {
    async fn account(&self, account_id: &str) -> tow_core::Result<PaymentAccount> {
        logged("retrieve_account", self.retrieve_account(account_id).await)
    }

    async fn login_link(&self, account_id: &str, redirect_url: &str) -> tow_core::Result<String> {
        logged(
            "create_login_link",
            self.create_login_link(account_id, redirect_url).await,
        )
    }

    async fn onboarding_link(
        &self,
        account_id: &str,
        return_url: &str,
        refresh_url: &str,
    ) -> tow_core::Result<String> {
        logged(
            "create_onboarding_link",
            self.create_onboarding_link(account_id, return_url, refresh_url).await,
        )
    }
}

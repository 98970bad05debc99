//! Account information calls authorised by a consent's resource token.

// crates.io
use oauth2::http::Method;
// self
use crate::{
	_prelude::*,
	auth::{BankId, Cid},
	config::ConfigName,
	flows::{Broker, common},
	http::{self, SecureHttpClient},
	obs::{self, FlowKind},
};

const ACCEPTED_STATUSES: [u16; 2] = [200, 201];

impl<C> Broker<C>
where
	C: ?Sized + SecureHttpClient,
{
	/// Lists the accounts covered by the consent; returns the bank's raw JSON body.
	pub async fn accounts(&self, bank: &BankId, cid: &Cid) -> Result<String> {
		self.fetch_accounts("accounts", bank, cid, None).await
	}

	/// Fetches one account covered by the consent; returns the bank's raw JSON body.
	pub async fn account(&self, bank: &BankId, cid: &Cid, account_id: &str) -> Result<String> {
		self.fetch_accounts("account", bank, cid, Some(account_id)).await
	}

	async fn fetch_accounts(
		&self,
		operation: &'static str,
		bank: &BankId,
		cid: &Cid,
		account_id: Option<&str>,
	) -> Result<String> {
		obs::observe(FlowKind::Accounts, operation, async move {
			let base = self.config.find_url(bank, ConfigName::AccountsEndpoint).await?;
			let endpoint = match account_id {
				Some(id) => common::join_segment(bank, ConfigName::AccountsEndpoint, &base, id)?,
				None => base,
			};
			let financial_id = self.config.find(bank, ConfigName::FinancialId).await?;
			let token = self.authorised_resource_token(bank, cid).await?;
			let request =
				common::api_request(Method::GET, &endpoint, &token, &financial_id, Vec::new())?;
			let response = http::send(self.http_client.as_ref(), operation, request).await?;

			http::expect_body(operation, &response, &ACCEPTED_STATUSES)
		})
		.await
	}
}

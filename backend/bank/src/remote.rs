use prost::Message;
use reqwest::get;

use crate::{BankError, foods::Bank};

pub async fn get_remote_bank(url: &str) -> Result<Bank, BankError> {
    let response = get(url).await?.error_for_status()?;
    let bytes = response.bytes().await?;

    Ok(Bank::decode(&*bytes)?)
}

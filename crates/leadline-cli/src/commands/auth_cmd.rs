use leadline_core::credentials::CredentialStore;

use crate::auth::{mask_token, KeychainTokenStore};
use crate::commands::common::{normalize_content, read_piped_stdin, CliContext};
use crate::error::CliError;

pub fn run_login(ctx: &CliContext, token: Option<String>) -> Result<(), CliError> {
    let token = match token.and_then(|value| normalize_content(&value)) {
        Some(token) => token,
        None => read_piped_stdin()?.ok_or_else(|| {
            CliError::InvalidInput(
                "pass --token or pipe the token on stdin".to_string(),
            )
        })?,
    };

    KeychainTokenStore::new(ctx.profile).save_token(&token)?;
    println!("Token stored for profile {:?}.", ctx.profile);
    Ok(())
}

pub fn run_status(ctx: &CliContext) -> Result<(), CliError> {
    match KeychainTokenStore::new(ctx.profile).load_token()? {
        Some(token) => println!(
            "Signed in on {:?} (token {}), API: {}",
            ctx.profile,
            mask_token(&token),
            ctx.config.api_base_url()
        ),
        None => println!("Not signed in on {:?}.", ctx.profile),
    }
    Ok(())
}

pub fn run_logout(ctx: &CliContext) -> Result<(), CliError> {
    KeychainTokenStore::new(ctx.profile).clear_token()?;
    println!("Token cleared for profile {:?}.", ctx.profile);
    Ok(())
}

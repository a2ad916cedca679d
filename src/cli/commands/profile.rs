//! Profile command implementations.

use colored::Colorize;
use serde::Serialize;

use crate::cli::{GlobalOpts, ProfileCommands};
use crate::config::load_config;
use crate::error::{Error, Result};
use crate::model::PendingProfile;
use crate::remote::SessionSource;
use crate::sync::{SessionProvider, SyncRunSummary};
use crate::validate::{normalize_currency, required, validate_projection};

use super::sync::{after_write, print_summary};
use super::{CLI_ACTOR, open_storage, runtime};

const DEFAULT_CURRENCY: &str = "USD";

#[derive(Serialize)]
struct ProfileSetOutput<'a> {
    profile: &'a PendingProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    sync: Option<&'a SyncRunSummary>,
}

/// Execute profile commands.
///
/// # Errors
///
/// Returns an error if no owner can be resolved, on invalid input, or if the
/// database is missing.
pub fn execute(command: &ProfileCommands, opts: &GlobalOpts<'_>) -> Result<()> {
    match command {
        ProfileCommands::Set {
            name,
            currency,
            income,
            no_sync,
        } => set(
            name.as_deref(),
            currency.as_deref(),
            *income,
            *no_sync,
            opts,
        ),
        ProfileCommands::Show => show(opts),
    }
}

/// Profiles are keyed by owner, so one must be known even for a local write.
///
/// A configured access token is resolved against the remote here.
fn resolve_owner(opts: &GlobalOpts<'_>) -> Result<String> {
    let config = load_config()?.resolve();
    let source = SessionSource::from_config(&config, opts.owner)?;

    if let Some(owner) = source.known_owner() {
        return Ok(owner.to_string());
    }
    if matches!(source, SessionSource::Static(None)) || opts.offline {
        return Err(Error::NoSession);
    }

    runtime()?
        .block_on(source.get_session())?
        .map(|session| session.owner_id)
        .ok_or(Error::NoSession)
}

fn set(
    name: Option<&str>,
    currency: Option<&str>,
    income: Option<f64>,
    no_sync: bool,
    opts: &GlobalOpts<'_>,
) -> Result<()> {
    let owner = resolve_owner(opts)?;
    let mut storage = open_storage(opts.db)?;

    let mut profile = match storage.get_profile(&owner)? {
        Some(mut existing) => {
            if name.is_none() && currency.is_none() && income.is_none() {
                return Err(Error::InvalidArgument(
                    "Nothing to update: pass --name, --currency or --income".to_string(),
                ));
            }
            if let Some(name) = name {
                existing.display_name = required("name", name)?;
            }
            if let Some(currency) = currency {
                existing.currency = normalize_currency(currency)?;
            }
            existing.updated_at = chrono::Utc::now().timestamp_millis();
            existing
        }
        None => {
            let name = required("name", name.unwrap_or_default())?;
            let currency = normalize_currency(currency.unwrap_or(DEFAULT_CURRENCY))?;
            PendingProfile::new(&owner, &name, &currency)
        }
    };
    if let Some(income) = income {
        profile.monthly_income = Some(validate_projection("income", income)?);
    }

    storage.save_profile(&profile, CLI_ACTOR)?;
    profile.synced = false;

    let sync = after_write(storage, opts, no_sync);

    if opts.json {
        let output = ProfileSetOutput {
            profile: &profile,
            sync: sync.as_ref(),
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!(
            "Saved profile for {}: {} ({})",
            owner.bold(),
            profile.display_name,
            profile.currency
        );
        match &sync {
            Some(summary) => print_summary(summary),
            None => println!("  {}", "queued for sync".yellow()),
        }
    }

    Ok(())
}

fn show(opts: &GlobalOpts<'_>) -> Result<()> {
    let owner = resolve_owner(opts)?;
    let storage = open_storage(opts.db)?;
    let profile = storage
        .get_profile(&owner)?
        .ok_or_else(|| Error::ProfileNotFound {
            owner_id: owner.clone(),
        })?;

    if opts.json {
        println!("{}", serde_json::to_string(&profile)?);
        return Ok(());
    }

    println!("{}", profile.display_name.bold());
    println!("  Owner:    {}", profile.owner_id);
    println!("  Currency: {}", profile.currency);
    if let Some(income) = profile.monthly_income {
        println!("  Income:   {income:.2}/month");
    }
    println!("  Remote:   {}", profile.remote_id.as_deref().unwrap_or("-"));
    println!(
        "  Status:   {}",
        if profile.synced {
            "synced".green()
        } else {
            "pending".yellow()
        }
    );

    Ok(())
}

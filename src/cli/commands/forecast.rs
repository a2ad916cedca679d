//! Forecast command implementations.

use colored::Colorize;
use serde::Serialize;

use crate::cli::{ForecastCommands, GlobalOpts};
use crate::error::Result;
use crate::model::PendingForecast;
use crate::sync::SyncRunSummary;
use crate::validate::{month_name, parse_month, validate_projection};

use super::sync::{after_write, print_summary};
use super::{CLI_ACTOR, open_storage, write_owner};

#[derive(Serialize)]
struct ForecastSetOutput<'a> {
    forecast: &'a PendingForecast,
    replaced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    sync: Option<&'a SyncRunSummary>,
}

#[derive(Serialize)]
struct ForecastListOutput {
    forecasts: Vec<PendingForecast>,
    count: usize,
}

/// Execute forecast commands.
///
/// # Errors
///
/// Returns an error on invalid input or a missing database.
pub fn execute(command: &ForecastCommands, opts: &GlobalOpts<'_>) -> Result<()> {
    match command {
        ForecastCommands::Set {
            month,
            income,
            expenses,
            note,
            no_sync,
        } => set(month, *income, *expenses, note.as_deref(), *no_sync, opts),
        ForecastCommands::List => list(opts),
    }
}

fn set(
    month: &str,
    income: f64,
    expenses: f64,
    note: Option<&str>,
    no_sync: bool,
    opts: &GlobalOpts<'_>,
) -> Result<()> {
    let month_index = parse_month(month)?;
    let income = validate_projection("income", income)?;
    let expenses = validate_projection("expenses", expenses)?;
    let note = note.map(str::trim).filter(|n| !n.is_empty()).map(String::from);

    let mut storage = open_storage(opts.db)?;
    let owner = write_owner(opts.owner);

    // Editing a month keeps its local id; the remote upserts by (owner, month)
    let existing = storage.find_forecast(owner.as_deref(), month_index)?;
    let replaced = existing.is_some();
    let forecast = match existing {
        Some(existing) => PendingForecast {
            synced: false,
            projected_income: income,
            projected_expenses: expenses,
            note: note.or(existing.note.clone()),
            ..existing
        },
        None => PendingForecast {
            note,
            ..PendingForecast::new(owner, month_index, income, expenses)
        },
    };

    storage.save_forecast(&forecast, CLI_ACTOR)?;
    let sync = after_write(storage, opts, no_sync);

    if opts.json {
        let output = ForecastSetOutput {
            forecast: &forecast,
            replaced,
            sync: sync.as_ref(),
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!(
            "{} forecast for {}: income {:.2}, expenses {:.2}, net {:.2}",
            if replaced { "Updated" } else { "Saved" },
            month_name(forecast.month_index).bold(),
            forecast.projected_income,
            forecast.projected_expenses,
            forecast.projected_net()
        );
        match &sync {
            Some(summary) => print_summary(summary),
            None => println!("  {}", "queued for sync".yellow()),
        }
    }

    Ok(())
}

fn list(opts: &GlobalOpts<'_>) -> Result<()> {
    let storage = open_storage(opts.db)?;
    let owner = write_owner(opts.owner);

    // Ownerless rows are adopted by whoever syncs next, so show them too
    let mut forecasts = storage.list_forecasts(owner.as_deref())?;
    if owner.is_some() {
        forecasts.extend(storage.list_forecasts(None)?);
        forecasts.sort_by_key(|f| f.month_index);
    }

    if opts.json {
        let output = ForecastListOutput {
            count: forecasts.len(),
            forecasts,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if forecasts.is_empty() {
        println!("No forecasts found.");
        return Ok(());
    }

    println!("Forecasts ({} found):", forecasts.len());
    println!();
    for f in &forecasts {
        let net = f.projected_net();
        let net_str = format!("{net:>10.2}");
        let state = if f.synced {
            "synced".green()
        } else {
            "pending".yellow()
        };
        println!(
            "  {:<10} {:>10.2} {:>10.2} {}  {state}",
            month_name(f.month_index),
            f.projected_income,
            f.projected_expenses,
            if net < 0.0 { net_str.red() } else { net_str.green() }
        );
    }

    Ok(())
}

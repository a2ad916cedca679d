//! Transaction command implementations.

use colored::Colorize;
use serde::Serialize;
use tracing::info;

use crate::cli::{GlobalOpts, TxAddArgs, TxCommands};
use crate::error::{Error, Result};
use crate::model::{PendingTransaction, TransactionFields, TransactionKind};
use crate::sync::SyncRunSummary;
use crate::validate::{normalize_kind, required, validate_amount, validate_date};

use super::sync::{after_write, print_summary};
use super::{CLI_ACTOR, open_storage, write_owner};

/// Output for tx add.
#[derive(Serialize)]
struct TxAddOutput<'a> {
    transaction: &'a PendingTransaction,
    #[serde(skip_serializing_if = "Option::is_none")]
    sync: Option<&'a SyncRunSummary>,
}

/// Output for tx list.
#[derive(Serialize)]
struct TxListOutput {
    transactions: Vec<PendingTransaction>,
    count: usize,
}

#[derive(Serialize)]
struct HistoryEntry {
    event: &'static str,
    actor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    old_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    new_value: Option<String>,
    created_at: i64,
}

/// Execute transaction commands.
///
/// # Errors
///
/// Returns an error on invalid input, a missing database or a missing row.
pub fn execute(command: &TxCommands, opts: &GlobalOpts<'_>) -> Result<()> {
    match command {
        TxCommands::Add(args) => add(args, opts),
        TxCommands::List { pending, limit } => list(*pending, *limit, opts),
        TxCommands::Show { id } => show(id, opts),
    }
}

fn add(args: &TxAddArgs, opts: &GlobalOpts<'_>) -> Result<()> {
    let fields = TransactionFields {
        amount: validate_amount(args.amount)?,
        category: required("category", &args.category)?,
        kind: normalize_kind(&args.kind)?,
        date: validate_date(&args.date)?,
        note: args
            .note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from),
    };

    let mut storage = open_storage(opts.db)?;
    let tx = PendingTransaction::new(write_owner(opts.owner), fields);
    storage.record_transaction(&tx, CLI_ACTOR)?;
    info!(local_id = %tx.local_id, owner = ?tx.owner_id, "Transaction recorded");

    let sync = after_write(storage, opts, args.no_sync);

    if opts.json {
        let output = TxAddOutput {
            transaction: &tx,
            sync: sync.as_ref(),
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!(
            "Recorded {} {:.2} [{}] {}",
            tx.fields.kind,
            tx.fields.amount,
            tx.fields.category,
            tx.local_id.dimmed()
        );
        match &sync {
            Some(summary) => print_summary(summary),
            None => println!("  {}", "queued for sync".yellow()),
        }
    }

    Ok(())
}

fn list(pending: bool, limit: Option<u32>, opts: &GlobalOpts<'_>) -> Result<()> {
    let storage = open_storage(opts.db)?;
    let transactions = storage.list_transactions(pending, limit)?;

    if opts.json {
        let output = TxListOutput {
            count: transactions.len(),
            transactions,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if transactions.is_empty() {
        println!("No transactions found.");
        return Ok(());
    }

    println!("Transactions ({} found):", transactions.len());
    println!();
    for tx in &transactions {
        let amount = format!("{:>10.2}", tx.fields.amount);
        let amount = match tx.fields.kind {
            TransactionKind::Income => amount.green(),
            TransactionKind::Expense => amount.red(),
        };
        let state = if tx.synced {
            "synced".green()
        } else {
            "pending".yellow()
        };
        println!(
            "  {}  {amount}  {:<16} {state}  {}",
            tx.fields.date,
            tx.fields.category,
            tx.local_id.dimmed()
        );
    }

    Ok(())
}

fn show(id: &str, opts: &GlobalOpts<'_>) -> Result<()> {
    let storage = open_storage(opts.db)?;

    let tx = match storage.get_transaction(id)? {
        Some(tx) => tx,
        None => storage
            .get_transaction_by_remote_id(id)?
            .ok_or_else(|| Error::TransactionNotFound { id: id.to_string() })?,
    };

    let history: Vec<HistoryEntry> = storage
        .transaction_history(&tx.local_id, Some(20))?
        .into_iter()
        .map(|e| HistoryEntry {
            event: e.event_type.as_str(),
            actor: e.actor,
            old_value: e.old_value,
            new_value: e.new_value,
            created_at: e.created_at,
        })
        .collect();

    if opts.json {
        let output = serde_json::json!({
            "transaction": tx,
            "history": history,
        });
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("{}", tx.local_id.bold());
    println!("  Kind:     {}", tx.fields.kind);
    println!("  Amount:   {:.2}", tx.fields.amount);
    println!("  Category: {}", tx.fields.category);
    println!("  Date:     {}", tx.fields.date);
    if let Some(note) = &tx.fields.note {
        println!("  Note:     {note}");
    }
    println!("  Owner:    {}", tx.owner_id.as_deref().unwrap_or("-"));
    println!("  Remote:   {}", tx.remote_id.as_deref().unwrap_or("-"));
    println!(
        "  Status:   {}",
        if tx.synced { "synced" } else { "pending" }
    );

    if !history.is_empty() {
        println!();
        println!("History:");
        for entry in &history {
            let when = chrono::DateTime::from_timestamp_millis(entry.created_at)
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default();
            println!("  {} {} ({})", when.dimmed(), entry.event, entry.actor);
        }
    }

    Ok(())
}

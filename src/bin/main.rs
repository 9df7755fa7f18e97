// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use fieldcards_rs::{
    AddressId, AddressRegistry, CardId, Engine, GroupId, InMemoryAddressBook,
    InMemoryUserDirectory, UserDirectory, UserId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

/// Field Cards - Replay card operation CSV files
///
/// Reads card operations from a CSV file and outputs the resulting card
/// states to stdout. Supports address/user registration, card creation,
/// membership edits, designation, return, and deletion.
#[derive(Parser, Debug)]
#[command(name = "fieldcards-rs")]
#[command(about = "A card assignment engine that replays operation CSVs", long_about = None)]
struct Args {
    /// Path to CSV file with operations
    ///
    /// Expected format: op,group,card,user,addresses
    /// Example: cargo run -- operations.csv > cards.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Output the audit timeline instead of card states
    #[arg(long)]
    audit: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let replay = match replay_operations(BufReader::new(file)) {
        Ok(replay) => replay,
        Err(e) => {
            eprintln!("Error replaying operations: {}", e);
            process::exit(1);
        }
    };

    let result = if args.audit {
        write_audit_timeline(&replay, std::io::stdout())
    } else {
        write_cards(&replay, std::io::stdout())
    };
    if let Err(e) = result {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `op, group, card, user, addresses`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    op: String,
    #[serde(default)]
    group: String,
    #[serde(default)]
    card: String,
    #[serde(default)]
    user: String,
    /// Semicolon-separated address ids (or card labels for `designate`).
    #[serde(default)]
    addresses: String,
}

/// Engine plus the replay-local bookkeeping the CSV format needs.
struct Replay {
    engine: Engine,
    addresses: Arc<InMemoryAddressBook>,
    users: Arc<InMemoryUserDirectory>,
    /// CSV card labels mapped to engine-minted card ids.
    labels: HashMap<String, CardId>,
    /// Groups touched by the replay, in first-seen order.
    groups: Vec<GroupId>,
}

impl Replay {
    fn new() -> Self {
        let addresses = Arc::new(InMemoryAddressBook::new());
        let users = Arc::new(InMemoryUserDirectory::new());
        Self {
            engine: Engine::new(
                Arc::clone(&addresses) as Arc<dyn AddressRegistry>,
                Arc::clone(&users) as Arc<dyn UserDirectory>,
            ),
            addresses,
            users,
            labels: HashMap::new(),
            groups: Vec::new(),
        }
    }
}

/// Replays operations from a CSV reader against a fresh engine.
///
/// Streaming parse; malformed rows and rejected operations are skipped so a
/// bad row never aborts the replay. Rejections are reported on stderr in
/// debug builds.
///
/// # CSV Format
///
/// Columns: `op, group, card, user, addresses`
/// - `address`: registers an address id (`addresses` column) under `group`
/// - `user`: registers a user id (`user` column)
/// - `create`: creates a card labeled `card` in `group` from `addresses`
/// - `update`: replaces membership of the card labeled `card`
/// - `designate`: assigns the card labels in `addresses` to `user`
/// - `return`: returns the card labeled `card` held by `user`
/// - `delete`: deletes the card labeled `card`
///
/// # Example
///
/// ```csv
/// op,group,card,user,addresses
/// address,north,,,A1
/// address,north,,,A2
/// user,,,U1,
/// create,north,T1,,A1;A2
/// designate,,,U1,T1
/// return,,T1,U1,
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
fn replay_operations<R: Read>(reader: R) -> Result<Replay, csv::Error> {
    let mut replay = Replay::new();

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for result in rdr.deserialize::<CsvRecord>() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                #[cfg(debug_assertions)]
                eprintln!("Skipping malformed row: {}", e);
                continue;
            }
        };

        let outcome = apply_record(&mut replay, &record);
        if let Err(reason) = outcome {
            #[cfg(debug_assertions)]
            eprintln!("Skipping {} row: {}", record.op, reason);
            let _ = reason;
        }
    }

    Ok(replay)
}

fn apply_record(replay: &mut Replay, record: &CsvRecord) -> Result<(), String> {
    match record.op.to_lowercase().as_str() {
        "address" => {
            if record.group.is_empty() || record.addresses.is_empty() {
                return Err("address rows need group and addresses".into());
            }
            replay
                .addresses
                .insert_id(record.addresses.as_str(), record.group.as_str());
            track_group(replay, &record.group);
            Ok(())
        }
        "user" => {
            if record.user.is_empty() {
                return Err("user rows need a user id".into());
            }
            replay.users.insert(record.user.as_str(), record.user.as_str());
            Ok(())
        }
        "create" => {
            if record.card.is_empty() {
                return Err("create rows need a card label".into());
            }
            let members = split_ids(&record.addresses);
            let card = replay
                .engine
                .create_card(members, GroupId::from(record.group.as_str()))
                .map_err(|e| e.to_string())?;
            track_group(replay, &record.group);
            replay.labels.insert(record.card.clone(), card.id().clone());
            Ok(())
        }
        "update" => {
            let card_id = label_to_id(replay, &record.card)?;
            let members = split_ids(&record.addresses);
            replay
                .engine
                .update_card_membership(&card_id, members)
                .map_err(|e| e.to_string())?;
            Ok(())
        }
        "designate" => {
            let card_ids = record
                .addresses
                .split(';')
                .filter(|label| !label.is_empty())
                .map(|label| label_to_id(replay, label))
                .collect::<Result<Vec<_>, _>>()?;
            replay
                .engine
                .designate_cards(&card_ids, &UserId::from(record.user.as_str()))
                .map_err(|e| e.to_string())?;
            Ok(())
        }
        "return" => {
            let card_id = label_to_id(replay, &record.card)?;
            replay
                .engine
                .return_card(&card_id, &UserId::from(record.user.as_str()))
                .map_err(|e| e.to_string())?;
            Ok(())
        }
        "delete" => {
            let card_id = label_to_id(replay, &record.card)?;
            replay
                .engine
                .delete_card(&card_id)
                .map_err(|e| e.to_string())?;
            replay.labels.remove(&record.card);
            Ok(())
        }
        other => Err(format!("unknown op '{}'", other)),
    }
}

fn track_group(replay: &mut Replay, group: &str) {
    let group = GroupId::from(group);
    if !replay.groups.contains(&group) {
        replay.groups.push(group);
    }
}

fn label_to_id(replay: &Replay, label: &str) -> Result<CardId, String> {
    replay
        .labels
        .get(label)
        .cloned()
        .ok_or_else(|| format!("unknown card label '{}'", label))
}

fn split_ids(raw: &str) -> Vec<AddressId> {
    raw.split(';')
        .filter(|id| !id.is_empty())
        .map(AddressId::from)
        .collect()
}

/// Flat card state row for CSV output.
#[derive(Debug, Serialize)]
struct CardRow {
    group: String,
    number: u32,
    status: String,
    assignee: String,
    addresses: String,
    history_events: usize,
}

/// Write card states to a CSV writer, grouped and ordered by card number.
///
/// # CSV Format
///
/// Columns: `group, number, status, assignee, addresses, history_events`
///
/// # Errors
///
/// Returns a CSV error if writing fails.
fn write_cards<W: Write>(replay: &Replay, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for group in &replay.groups {
        for card in replay.engine.cards_in_group(group) {
            wtr.serialize(CardRow {
                group: group.to_string(),
                number: card.number(),
                status: format!("{:?}", card.status()).to_lowercase(),
                assignee: card
                    .current_assignment()
                    .map(|a| a.user_id.to_string())
                    .unwrap_or_default(),
                addresses: card
                    .addresses()
                    .iter()
                    .map(|a| a.to_string())
                    .collect::<Vec<_>>()
                    .join(";"),
                history_events: card.history().len(),
            })?;
        }
    }

    wtr.flush()?;
    Ok(())
}

/// Flat audit event row for CSV output.
#[derive(Debug, Serialize)]
struct AuditRow {
    card: String,
    user: String,
    action: String,
    at: String,
}

/// Write the engine-wide audit timeline, oldest event first.
///
/// # Errors
///
/// Returns a CSV error if writing fails.
fn write_audit_timeline<W: Write>(replay: &Replay, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for event in replay.engine.drain_audit_trail() {
        wtr.serialize(AuditRow {
            card: event.card_id.to_string(),
            user: event.user_id.to_string(),
            action: format!("{:?}", event.action).to_lowercase(),
            at: event.at.to_rfc3339(),
        })?;
    }

    wtr.flush()?;
    Ok(())
}

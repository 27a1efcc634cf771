//! Command dispatch.
//!
//! Every command renders exactly one JSON document. Whole-carrier output
//! goes through the engine codec so enumeration order is preserved.

use crate::error::{CliError, Result};
use carrier_engine::{Backend, Clock, Key, OrderedCarrier};
use clap::Subcommand;
use serde_json::{json, Value};

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Get the value at a key
    Get {
        /// The key to read
        key: String,
    },

    /// Set a key to a JSON value, keeping its position
    Set {
        /// The key to set
        key: String,

        /// The value, as JSON
        value: String,
    },

    /// Store a member object under its `k` field or a timestamp key
    Add {
        /// The member, as JSON
        member: String,
    },

    /// Move a key to the back with a new value
    Push {
        /// The key to push
        key: String,

        /// The value, as JSON
        value: String,
    },

    /// Insert a value intended to become the first entry
    Unshift {
        /// The value, as JSON
        value: String,

        /// Explicit key instead of one derived from the member
        #[arg(long)]
        key: Option<String>,
    },

    /// Remove and print the last value
    Pop,

    /// Remove and print the first value
    Shift,

    /// Print the first value
    First,

    /// Print the last value
    Last,

    /// Remove one or more keys
    Remove {
        /// Keys to remove
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// List keys in enumeration order
    Keys {
        /// List in reverse enumeration order
        #[arg(long, conflicts_with = "sorted")]
        reverse: bool,

        /// List in lexicographic order
        #[arg(long)]
        sorted: bool,
    },

    /// Print values whose property equals a JSON value
    Find {
        /// Property name
        prop: String,

        /// Expected value, as JSON
        value: String,
    },

    /// Print the number of entries
    Len,

    /// Remove every entry
    Clear,

    /// Print the whole carrier
    Dump {
        /// Pretty-print the output
        #[arg(long)]
        pretty: bool,
    },
}

impl Command {
    /// Whether the command writes to the carrier.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Command::Set { .. }
                | Command::Add { .. }
                | Command::Push { .. }
                | Command::Unshift { .. }
                | Command::Pop
                | Command::Shift
                | Command::Remove { .. }
                | Command::Clear
        )
    }
}

/// Run one command against an open carrier and render its output.
pub fn run<B: Backend, C: Clock>(
    carrier: &mut OrderedCarrier<B, C>,
    command: Command,
) -> Result<String> {
    let output = match command {
        Command::Get { key } => render(&carrier.get(key))?,
        Command::Set { key, value } => {
            carrier.set(key, parse_json("value", &value)?)?;
            render_len(carrier)?
        }
        Command::Add { member } => {
            let key = carrier.set_member(parse_json("member", &member)?)?;
            render(&key)?
        }
        Command::Push { key, value } => {
            carrier.push(key, parse_json("value", &value)?)?;
            render_len(carrier)?
        }
        Command::Unshift { value, key } => {
            let value = parse_json("value", &value)?;
            let key = match key {
                Some(key) => {
                    let key = Key::from(key);
                    if value.is_null() {
                        None
                    } else {
                        carrier.unshift(key.clone(), value)?;
                        Some(key)
                    }
                }
                None => carrier.unshift_member(value)?,
            };
            render(&key)?
        }
        Command::Pop => render(&carrier.pop()?)?,
        Command::Shift => render(&carrier.shift()?)?,
        Command::First => render(&carrier.get_first())?,
        Command::Last => render(&carrier.get_last())?,
        Command::Remove { keys } => {
            carrier.remove_many(keys)?;
            render_len(carrier)?
        }
        Command::Keys { reverse, sorted } => {
            let keys = if sorted {
                carrier.sort()
            } else if reverse {
                carrier.reverse()
            } else {
                carrier.keys()
            };
            render(&keys)?
        }
        Command::Find { prop, value } => {
            let expected = parse_json("value", &value)?;
            render(&carrier.find_prop(&prop, &expected))?
        }
        Command::Len => render(&carrier.len())?,
        Command::Clear => {
            carrier.clear()?;
            render_len(carrier)?
        }
        Command::Dump { pretty } => {
            if pretty {
                carrier.to_json_pretty()?
            } else {
                carrier.to_json()?
            }
        }
    };
    Ok(output)
}

fn parse_json(what: &'static str, text: &str) -> Result<Value> {
    serde_json::from_str(text).map_err(|e| CliError::InvalidJson {
        what,
        reason: e.to_string(),
    })
}

fn render<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn render_len<B: Backend, C: Clock>(carrier: &OrderedCarrier<B, C>) -> Result<String> {
    render(&json!({ "len": carrier.len() }))
}

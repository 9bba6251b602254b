use crate::cli::{parse_format, print_json, CliContext};
use crate::constants;
use crate::core::keys;
use crate::models::kv::KeyValue;
use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Table};
use std::io::Read;

#[derive(Subcommand, Debug)]
pub enum KeyCommand {
    /// Write a key, creating it if needed
    Put(WriteArgs),
    /// Show one key
    Get(GetArgs),
    /// Overwrite a key that must already exist
    Update(WriteArgs),
    /// Delete a key
    Delete(KeyArgs),
    /// List keys under a prefix
    List(ListArgs),
}

#[derive(Args, Debug)]
pub struct WriteArgs {
    pub key: String,

    /// Value; read from stdin when omitted
    pub value: Option<String>,
}

#[derive(Args, Debug)]
pub struct KeyArgs {
    pub key: String,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    pub key: String,

    /// Output format: table|json
    #[arg(long, default_value = "table", value_parser = parse_format)]
    pub format: String,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    pub prefix: String,

    /// Output format: table|json
    #[arg(long, default_value = "table", value_parser = parse_format)]
    pub format: String,
}

pub fn run(ctx: &CliContext, cmd: KeyCommand) -> Result<()> {
    match cmd {
        KeyCommand::Put(args) => run_write(ctx, args, false),
        KeyCommand::Get(args) => run_get(ctx, args),
        KeyCommand::Update(args) => run_write(ctx, args, true),
        KeyCommand::Delete(args) => run_delete(ctx, args),
        KeyCommand::List(args) => run_list(ctx, args),
    }
}

fn read_value(value: Option<String>) -> Result<String> {
    let value = match value {
        Some(v) => v,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("read value from stdin")?;
            buf
        }
    };
    if value.len() > constants::MAX_VALUE_SIZE {
        bail!(
            "value exceeds maximum size ({} bytes, max {} bytes)",
            value.len(),
            constants::MAX_VALUE_SIZE
        );
    }
    Ok(value)
}

fn run_write(ctx: &CliContext, args: WriteArgs, update: bool) -> Result<()> {
    let value = read_value(args.value)?;
    let (action, outcome) = if update {
        ("update", keys::update(&ctx.store, &args.key, &value))
    } else {
        ("create", keys::create(&ctx.store, &args.key, &value))
    };
    ctx.audit(action, "key", &args.key, &outcome);
    let kv = outcome?;
    println!("{} {} (revision {})", action_past(action), kv.key, kv.mod_revision);
    Ok(())
}

fn action_past(action: &str) -> &'static str {
    match action {
        "update" => "Updated",
        _ => "Created",
    }
}

fn run_get(ctx: &CliContext, args: GetArgs) -> Result<()> {
    let kv = keys::read(&ctx.store, &args.key)?;
    if args.format == "json" {
        return print_json(&kv);
    }
    println!("{}", kv_table(std::slice::from_ref(&kv)));
    Ok(())
}

fn run_delete(ctx: &CliContext, args: KeyArgs) -> Result<()> {
    let outcome = keys::delete(&ctx.store, &args.key);
    ctx.audit("delete", "key", &args.key, &outcome);
    outcome?;
    println!("Deleted {}", args.key);
    Ok(())
}

fn run_list(ctx: &CliContext, args: ListArgs) -> Result<()> {
    let kvs = keys::list_prefix(&ctx.store, &args.prefix)?;
    if args.format == "json" {
        return print_json(&kvs);
    }
    if kvs.is_empty() {
        println!("No keys under {}.", args.prefix);
        return Ok(());
    }
    println!("{}", kv_table(&kvs));
    println!("\n{} keys.", kvs.len());
    Ok(())
}

fn kv_table(kvs: &[KeyValue]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        Cell::new("Key").add_attribute(Attribute::Bold),
        Cell::new("Value").add_attribute(Attribute::Bold),
        Cell::new("Version").add_attribute(Attribute::Bold),
        Cell::new("Modified").add_attribute(Attribute::Bold),
    ]);
    for kv in kvs {
        table.add_row(vec![
            kv.key.clone(),
            kv.value.clone(),
            kv.version.to_string(),
            kv.mod_revision.to_string(),
        ]);
    }
    table
}

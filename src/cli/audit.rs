use crate::cli::{parse_format, print_json, CliContext};
use anyhow::Result;
use chrono::{DateTime, Local};
use clap::{Args, Subcommand};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Table};

#[derive(Subcommand, Debug)]
pub enum AuditCommand {
    /// Display the audit trail
    Log(AuditLogArgs),
}

#[derive(Args, Debug)]
pub struct AuditLogArgs {
    /// Maximum number of entries to display
    #[arg(long, default_value_t = 50)]
    pub limit: usize,

    /// Output format: table|json
    #[arg(long, default_value = "table", value_parser = parse_format)]
    pub format: String,
}

pub fn run(ctx: &CliContext, cmd: AuditCommand) -> Result<()> {
    match cmd {
        AuditCommand::Log(args) => run_log(ctx, args),
    }
}

fn run_log(ctx: &CliContext, args: AuditLogArgs) -> Result<()> {
    let Some(log) = &ctx.audit else {
        println!("Audit logging is disabled.");
        return Ok(());
    };
    let entries = log.read(Some(args.limit))?;

    if args.format == "json" {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("No audit entries found.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        Cell::new("Timestamp").add_attribute(Attribute::Bold),
        Cell::new("Action").add_attribute(Attribute::Bold),
        Cell::new("Resource").add_attribute(Attribute::Bold),
        Cell::new("Target").add_attribute(Attribute::Bold),
        Cell::new("Actor").add_attribute(Attribute::Bold),
        Cell::new("Result").add_attribute(Attribute::Bold),
    ]);

    for entry in &entries {
        let local: DateTime<Local> = entry.timestamp.into();
        let result_str = match &entry.result {
            Some(r) if r.success => "OK".to_string(),
            Some(r) => format!("FAIL: {}", r.error.as_deref().unwrap_or("?")),
            None => "-".to_string(),
        };
        table.add_row(vec![
            local.format("%Y-%m-%d %H:%M:%S").to_string(),
            entry.action.clone(),
            entry.resource.clone(),
            entry.target.clone(),
            entry.actor.clone(),
            result_str,
        ]);
    }

    println!("{}", table);
    println!("\n{} entries shown ({}).", entries.len(), log.path().display());
    Ok(())
}

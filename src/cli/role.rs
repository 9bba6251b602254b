use crate::cli::{parse_format, print_json, CliContext};
use crate::core::roles;
use crate::models::permission::display_bytes;
use crate::models::role::Role;
use anyhow::Result;
use clap::{Args, Subcommand};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Table};

#[derive(Subcommand, Debug)]
pub enum RoleCommand {
    /// Create an empty role
    Create(NameArgs),
    /// Show a role and its permissions
    Get(GetArgs),
    /// Move every permission to a new role and delete the old one
    Rename(RenameArgs),
    /// Delete a role
    Delete(NameArgs),
}

#[derive(Args, Debug)]
pub struct NameArgs {
    pub name: String,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    pub name: String,

    /// Output format: table|json
    #[arg(long, default_value = "table", value_parser = parse_format)]
    pub format: String,
}

#[derive(Args, Debug)]
pub struct RenameArgs {
    pub old: String,
    pub new: String,
}

pub fn run(ctx: &CliContext, cmd: RoleCommand) -> Result<()> {
    match cmd {
        RoleCommand::Create(args) => {
            let outcome = roles::create(&ctx.store, &args.name);
            ctx.audit("create", "role", &args.name, &outcome);
            println!("Created role {}", outcome?.name);
            Ok(())
        }
        RoleCommand::Get(args) => run_get(ctx, args),
        RoleCommand::Rename(args) => {
            let target = format!("{}->{}", args.old, args.new);
            let outcome = roles::rename(&ctx.store, &args.old, &args.new);
            ctx.audit("rename", "role", &target, &outcome);
            let role = outcome?;
            println!(
                "Renamed role {} to {} ({} permissions)",
                args.old,
                role.name,
                role.permissions.len()
            );
            Ok(())
        }
        RoleCommand::Delete(args) => {
            let outcome = roles::delete(&ctx.store, &args.name);
            ctx.audit("delete", "role", &args.name, &outcome);
            outcome?;
            println!("Deleted role {}", args.name);
            Ok(())
        }
    }
}

fn run_get(ctx: &CliContext, args: GetArgs) -> Result<()> {
    let role = roles::read(&ctx.store, &args.name)?;
    if args.format == "json" {
        return print_json(&role);
    }
    if role.permissions.is_empty() {
        println!("Role {} has no permissions.", role.name);
        return Ok(());
    }
    println!("{}", permission_table(&role));
    Ok(())
}

pub(crate) fn permission_table(role: &Role) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        Cell::new("Role").add_attribute(Attribute::Bold),
        Cell::new("Access").add_attribute(Attribute::Bold),
        Cell::new("Key").add_attribute(Attribute::Bold),
        Cell::new("Range end").add_attribute(Attribute::Bold),
    ]);
    for perm in &role.permissions {
        let range_end = match perm.range_end.as_slice() {
            b"" => "-".to_string(),
            crate::constants::FROM_KEY_RANGE_END => "(all following keys)".to_string(),
            end => display_bytes(end),
        };
        table.add_row(vec![
            role.name.clone(),
            perm.access.to_string(),
            display_bytes(&perm.key),
            range_end,
        ]);
    }
    table
}

use crate::cli::{parse_format, print_json, CliContext};
use crate::core::permissions;
use crate::models::permission::{AccessLevel, KeyRange};
use crate::models::role::Role;
use anyhow::Result;
use clap::{Args, Subcommand};

#[derive(Subcommand, Debug)]
pub enum PermissionCommand {
    /// Grant access on a key or range to a role
    Grant(GrantArgs),
    /// Show a role's grant on a key or range
    Get(GetArgs),
    /// Revoke a role's grant on a key or range
    Revoke(TargetArgs),
}

/// A role and the key or range a grant applies to.
#[derive(Args, Debug)]
pub struct TargetArgs {
    pub role: String,
    pub key: String,

    /// Treat KEY as a prefix
    #[arg(long, conflicts_with_all = ["range_end", "from_key"])]
    pub prefix: bool,

    /// Cover [KEY, END)
    #[arg(long, value_name = "END", conflicts_with = "from_key")]
    pub range_end: Option<String>,

    /// Cover every key from KEY on
    #[arg(long)]
    pub from_key: bool,
}

impl TargetArgs {
    fn range(&self) -> KeyRange {
        if self.prefix {
            KeyRange::Prefix
        } else if self.from_key {
            KeyRange::FromKey
        } else if let Some(end) = &self.range_end {
            KeyRange::Until(end.clone())
        } else {
            KeyRange::Single
        }
    }
}

#[derive(Args, Debug)]
pub struct GrantArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// READ, WRITE, or READWRITE
    #[arg(long, default_value = "READ")]
    pub access: AccessLevel,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Output format: table|json
    #[arg(long, default_value = "table", value_parser = parse_format)]
    pub format: String,
}

pub fn run(ctx: &CliContext, cmd: PermissionCommand) -> Result<()> {
    match cmd {
        PermissionCommand::Grant(args) => {
            let t = &args.target;
            let outcome = permissions::grant(&ctx.store, &t.role, &t.key, &t.range(), args.access);
            ctx.audit("grant", "permission", &audit_target(t), &outcome);
            let perm = outcome?;
            println!("Granted {} to role {}", perm, t.role);
            Ok(())
        }
        PermissionCommand::Get(args) => {
            let t = &args.target;
            let perm = permissions::read(&ctx.store, &t.role, &t.key, &t.range())?;
            if args.format == "json" {
                return print_json(&perm);
            }
            let role = Role {
                name: t.role.clone(),
                permissions: vec![perm],
            };
            println!("{}", crate::cli::role::permission_table(&role));
            Ok(())
        }
        PermissionCommand::Revoke(t) => {
            let outcome = permissions::revoke(&ctx.store, &t.role, &t.key, &t.range());
            ctx.audit("revoke", "permission", &audit_target(&t), &outcome);
            outcome?;
            println!("Revoked role {} access on {}", t.role, t.key);
            Ok(())
        }
    }
}

fn audit_target(t: &TargetArgs) -> String {
    format!("{}:{}", t.role, t.key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    fn parse(args: &[&str]) -> PermissionCommand {
        let mut argv = vec!["etcd-steward", "permission"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Permission { command } => command,
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_grant_prefix_readwrite() {
        match parse(&["grant", "app", "/app/", "--prefix", "--access", "readwrite"]) {
            PermissionCommand::Grant(args) => {
                assert_eq!(args.target.range(), KeyRange::Prefix);
                assert_eq!(args.access, AccessLevel::ReadWrite);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_range_flags() {
        match parse(&["revoke", "app", "/a", "--range-end", "/b"]) {
            PermissionCommand::Revoke(t) => assert_eq!(t.range(), KeyRange::Until("/b".into())),
            other => panic!("unexpected {:?}", other),
        }
        match parse(&["revoke", "app", "/a", "--from-key"]) {
            PermissionCommand::Revoke(t) => assert_eq!(t.range(), KeyRange::FromKey),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_prefix_conflicts_with_range_end() {
        let argv = [
            "etcd-steward", "permission", "revoke", "app", "/a", "--prefix", "--range-end", "/b",
        ];
        assert!(Cli::try_parse_from(argv).is_err());
    }
}

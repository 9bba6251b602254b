use crate::cli::CliContext;
use crate::core::role_users;
use anyhow::Result;
use clap::{Args, Subcommand};

#[derive(Subcommand, Debug)]
pub enum RoleUserCommand {
    /// Grant a role to an existing user
    Grant(BindingArgs),
    /// Check that a user holds a role
    Get(BindingArgs),
    /// Revoke a role from a user
    Revoke(BindingArgs),
}

#[derive(Args, Debug)]
pub struct BindingArgs {
    pub user: String,
    pub role: String,
}

impl BindingArgs {
    fn target(&self) -> String {
        format!("{}:{}", self.user, self.role)
    }
}

pub fn run(ctx: &CliContext, cmd: RoleUserCommand) -> Result<()> {
    match cmd {
        RoleUserCommand::Grant(args) => {
            let outcome = role_users::grant(&ctx.store, &args.user, &args.role);
            ctx.audit("grant", "role-user", &args.target(), &outcome);
            outcome?;
            println!("Granted role {} to {}", args.role, args.user);
        }
        RoleUserCommand::Get(args) => {
            role_users::read(&ctx.store, &args.user, &args.role)?;
            println!("{} holds role {}", args.user, args.role);
        }
        RoleUserCommand::Revoke(args) => {
            let outcome = role_users::revoke(&ctx.store, &args.user, &args.role);
            ctx.audit("revoke", "role-user", &args.target(), &outcome);
            outcome?;
            println!("Revoked role {} from {}", args.role, args.user);
        }
    }
    Ok(())
}

use crate::cli::CliContext;
use crate::core::password::PasswordGenerator;
use crate::models::settings::PasswordPolicy;
use anyhow::Result;
use clap::{Args, Subcommand};

#[derive(Subcommand, Debug)]
pub enum PasswordCommand {
    /// Print a random password (nothing is sent to etcd)
    Generate(GenerateArgs),
}

/// Unset options fall back to the `[password]` settings.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    #[arg(long)]
    pub length: Option<usize>,

    /// Minimum special characters
    #[arg(long)]
    pub special: Option<usize>,

    /// Minimum digits
    #[arg(long)]
    pub digits: Option<usize>,

    /// Minimum uppercase letters
    #[arg(long)]
    pub upper: Option<usize>,
}

impl GenerateArgs {
    fn policy(&self, base: &PasswordPolicy) -> PasswordPolicy {
        PasswordPolicy {
            length: self.length.unwrap_or(base.length),
            min_special: self.special.unwrap_or(base.min_special),
            min_digits: self.digits.unwrap_or(base.min_digits),
            min_upper: self.upper.unwrap_or(base.min_upper),
        }
    }
}

pub fn run(ctx: &CliContext, cmd: PasswordCommand) -> Result<()> {
    match cmd {
        PasswordCommand::Generate(args) => {
            let policy = args.policy(&ctx.settings.password);
            let password = PasswordGenerator::new().generate(&policy)?;
            println!("{}", password.as_str());
            Ok(())
        }
    }
}

use crate::cli::{parse_format, print_json, CliContext};
use crate::constants;
use crate::core::password::PasswordGenerator;
use crate::core::users;
use crate::util::fs::StagedFile;
use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Table};
use std::path::PathBuf;
use zeroize::Zeroizing;

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// Create a user with a supplied or generated password
    Create(CreateArgs),
    /// Show a user and its roles
    Get(GetArgs),
    /// Change a user's password
    Passwd(PasswdArgs),
    /// Recreate a user under a new name with the same roles
    Rename(RenameArgs),
    /// Delete a user
    Delete(NameArgs),
}

/// Where a new password comes from. Without `--from-stdin` or `--prompt` one
/// is generated.
#[derive(Args, Debug)]
pub struct PasswordSource {
    /// Read the password from stdin
    #[arg(long, conflicts_with = "prompt")]
    pub from_stdin: bool,

    /// Prompt for the password
    #[arg(long)]
    pub prompt: bool,

    /// Write a generated password to this file (mode 0600)
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Print a generated password to stdout
    #[arg(long)]
    pub print_password: bool,
}

impl PasswordSource {
    fn supplied(&self) -> bool {
        self.from_stdin || self.prompt
    }

    /// Refuse to generate a password that nobody would ever see.
    fn check(&self) -> Result<()> {
        if self.supplied() && (self.output.is_some() || self.print_password) {
            bail!("--output and --print-password only apply to generated passwords");
        }
        if !self.supplied() && self.output.is_none() && !self.print_password {
            bail!("a generated password needs --output PATH or --print-password");
        }
        Ok(())
    }

    fn read(&self, ctx: &CliContext, name: &str) -> Result<Option<Zeroizing<String>>> {
        if !self.supplied() {
            return Ok(None);
        }
        let password = ctx.read_password(self.from_stdin, &format!("Password for {}", name))?;
        Ok(Some(password))
    }

    fn resolve(&self, ctx: &CliContext, name: &str) -> Result<(Zeroizing<String>, bool)> {
        match self.read(ctx, name)? {
            Some(p) => Ok((p, false)),
            None => {
                let p = PasswordGenerator::new().generate(&ctx.settings.password)?;
                Ok((p, true))
            }
        }
    }

    /// Create the `--output` file. Must run before any store mutation.
    fn stage(&self) -> Result<Option<StagedFile>> {
        match &self.output {
            Some(path) if !self.supplied() => {
                Ok(Some(StagedFile::create(path, constants::SECRET_FILE_MODE)?))
            }
            _ => Ok(None),
        }
    }

    /// Hand a generated password back exactly once. If the staged file
    /// cannot be committed the password goes to stderr instead.
    fn deliver(&self, staged: Option<StagedFile>, name: &str, password: &str) -> Result<()> {
        if let Some(staged) = staged {
            let path = staged.path().to_path_buf();
            let line = Zeroizing::new(format!("{}\n", password));
            if let Err(e) = staged.commit(line.as_bytes()) {
                if self.print_password {
                    println!("{}", password);
                } else {
                    eprintln!(
                        "Could not write {}; password for {}: {}",
                        path.display(),
                        name,
                        password
                    );
                }
                return Err(e);
            }
            println!("Password for {} written to {}", name, path.display());
        }
        if self.print_password {
            println!("{}", password);
        }
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    pub name: String,

    #[command(flatten)]
    pub password: PasswordSource,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    pub name: String,

    /// Output format: table|json
    #[arg(long, default_value = "table", value_parser = parse_format)]
    pub format: String,
}

#[derive(Args, Debug)]
pub struct PasswdArgs {
    pub name: String,

    #[command(flatten)]
    pub password: PasswordSource,
}

#[derive(Args, Debug)]
pub struct RenameArgs {
    pub old: String,
    pub new: String,

    #[command(flatten)]
    pub password: PasswordSource,
}

#[derive(Args, Debug)]
pub struct NameArgs {
    pub name: String,
}

pub fn run(ctx: &CliContext, cmd: UserCommand) -> Result<()> {
    match cmd {
        UserCommand::Create(args) => run_create(ctx, args),
        UserCommand::Get(args) => run_get(ctx, args),
        UserCommand::Passwd(args) => run_passwd(ctx, args),
        UserCommand::Rename(args) => run_rename(ctx, args),
        UserCommand::Delete(args) => {
            let outcome = users::delete(&ctx.store, &args.name);
            ctx.audit("delete", "user", &args.name, &outcome);
            outcome?;
            println!("Deleted user {}", args.name);
            Ok(())
        }
    }
}

fn run_create(ctx: &CliContext, args: CreateArgs) -> Result<()> {
    args.password.check()?;
    let supplied = args.password.read(ctx, &args.name)?;
    let staged = args.password.stage()?;
    let mut generator = PasswordGenerator::new();
    let outcome = users::create(
        &ctx.store,
        &args.name,
        supplied,
        &mut generator,
        &ctx.settings.password,
    );
    ctx.audit("create", "user", &args.name, &outcome);
    let created = outcome?;
    println!("Created user {}", created.user.name);
    if created.generated {
        args.password.deliver(staged, &created.user.name, &created.password)?;
    }
    Ok(())
}

fn run_get(ctx: &CliContext, args: GetArgs) -> Result<()> {
    let user = users::read(&ctx.store, &args.name)?;
    if args.format == "json" {
        return print_json(&user);
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        Cell::new("User").add_attribute(Attribute::Bold),
        Cell::new("Roles").add_attribute(Attribute::Bold),
    ]);
    let roles = if user.roles.is_empty() {
        "-".to_string()
    } else {
        user.roles.join(", ")
    };
    table.add_row(vec![user.name.clone(), roles]);
    println!("{}", table);
    Ok(())
}

fn run_passwd(ctx: &CliContext, args: PasswdArgs) -> Result<()> {
    args.password.check()?;
    let (password, generated) = args.password.resolve(ctx, &args.name)?;
    let staged = args.password.stage()?;
    let outcome = users::change_password(&ctx.store, &args.name, &password);
    ctx.audit("passwd", "user", &args.name, &outcome);
    outcome?;
    println!("Changed password for {}", args.name);
    if generated {
        args.password.deliver(staged, &args.name, &password)?;
    }
    Ok(())
}

fn run_rename(ctx: &CliContext, args: RenameArgs) -> Result<()> {
    args.password.check()?;
    let (password, generated) = args.password.resolve(ctx, &args.new)?;
    let staged = args.password.stage()?;
    let target = format!("{}->{}", args.old, args.new);
    let outcome = users::rename(&ctx.store, &args.old, &args.new, &password);
    ctx.audit("rename", "user", &target, &outcome);
    let result = outcome.map(|user| {
        println!(
            "Renamed user {} to {} ({} roles)",
            args.old,
            user.name,
            user.roles.len()
        );
    });
    // past creation the new user exists, so its password must still be handed out
    if generated && renamed_user_exists(&result) {
        args.password.deliver(staged, &args.new, &password)?;
    }
    Ok(result?)
}

fn renamed_user_exists(result: &crate::error::Result<()>) -> bool {
    use crate::error::Error;
    matches!(
        result,
        Ok(()) | Err(Error::PartialMigration { .. }) | Err(Error::CleanupFailed { .. })
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::fs;
    use tempfile::TempDir;

    fn source(from_stdin: bool, output: bool, print: bool) -> PasswordSource {
        PasswordSource {
            from_stdin,
            prompt: false,
            output: output.then(|| PathBuf::from("/tmp/pw")),
            print_password: print,
        }
    }

    #[test]
    fn test_generated_password_needs_destination() {
        assert!(source(false, false, false).check().is_err());
        assert!(source(false, true, false).check().is_ok());
        assert!(source(false, false, true).check().is_ok());
    }

    #[test]
    fn test_supplied_password_rejects_output_flags() {
        assert!(source(true, false, false).check().is_ok());
        assert!(source(true, true, false).check().is_err());
    }

    fn generated_to(path: PathBuf) -> PasswordSource {
        PasswordSource {
            from_stdin: false,
            prompt: false,
            output: Some(path),
            print_password: false,
        }
    }

    #[test]
    fn test_stage_fails_before_any_change() {
        let dir = TempDir::new().unwrap();
        let src = generated_to(dir.path().join("missing/pw"));
        assert!(src.stage().is_err());
    }

    #[test]
    fn test_supplied_password_stages_nothing() {
        let dir = TempDir::new().unwrap();
        let mut src = generated_to(dir.path().join("pw"));
        src.from_stdin = true;
        assert!(src.stage().unwrap().is_none());
    }

    #[test]
    fn test_deliver_writes_staged_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pw");
        let src = generated_to(path.clone());
        let staged = src.stage().unwrap();
        src.deliver(staged, "app", "Xy9#abc").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "Xy9#abc\n");
    }

    #[test]
    fn test_deliver_reports_failed_write() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("out");
        fs::create_dir(&sub).unwrap();
        let src = generated_to(sub.join("pw"));
        let staged = src.stage().unwrap();
        fs::remove_dir_all(&sub).unwrap();
        assert!(src.deliver(staged, "app", "Xy9#abc").is_err());
    }

    #[test]
    fn test_renamed_user_exists() {
        assert!(renamed_user_exists(&Ok(())));
        assert!(!renamed_user_exists(&Err(Error::invalid("x"))));
        let cleanup = Err(Error::CleanupFailed {
            from: "a".into(),
            to: "b".into(),
            source: Box::new(Error::invalid("x")),
        });
        assert!(renamed_user_exists(&cleanup));
    }
}

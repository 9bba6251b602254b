//! Diagnostics for etcdctl, settings, and cluster reachability.

use crate::cli::CliContext;
use anyhow::Result;
use clap::Args;

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Skip the endpoint health probe
    #[arg(long)]
    pub offline: bool,
}

pub fn run(ctx: &CliContext, args: DoctorArgs) -> Result<()> {
    let conn = ctx.store.connection();
    let mut ok = 0u32;
    let mut warn = 0u32;
    let mut fail = 0u32;

    println!("Doctor: {}", conn.endpoints.join(","));

    match (&ctx.settings_path, &ctx.settings_warning) {
        (_, Some(w)) => {
            println!("  [FAIL] settings unreadable: {}", w);
            fail += 1;
        }
        (Some(path), None) => {
            println!("  [PASS] settings loaded: {}", path.display());
            ok += 1;
        }
        (None, None) => {
            println!("  [WARN] no settings file; using flags and environment only");
            warn += 1;
        }
    }

    match ctx.store.version() {
        Ok(version) => {
            let first = version.lines().next().unwrap_or("").to_string();
            println!("  [PASS] etcdctl available: {}", first);
            ok += 1;
        }
        Err(e) => {
            println!("  [FAIL] etcdctl: {}", e);
            fail += 1;
        }
    }

    match &conn.credentials {
        Some(creds) => {
            println!("  [PASS] authenticating as {}", creds.username);
            ok += 1;
        }
        None => {
            println!("  [WARN] no complete credentials; connecting unauthenticated");
            warn += 1;
        }
    }

    if let Some(ca) = &conn.ca_cert {
        if ca.is_file() {
            println!("  [PASS] CA certificate exists: {}", ca.display());
            ok += 1;
        } else {
            println!("  [FAIL] CA certificate missing: {}", ca.display());
            fail += 1;
        }
    }

    match &ctx.audit {
        Some(log) => {
            println!("  [INFO] audit log: {}", log.path().display());
        }
        None => {
            println!("  [WARN] audit logging disabled");
            warn += 1;
        }
    }

    if let Err(e) = ctx.settings.password.validate() {
        println!("  [FAIL] password policy: {}", e);
        fail += 1;
    }

    if !args.offline {
        match ctx.store.endpoint_health() {
            Ok(report) => {
                println!("  [PASS] endpoints healthy");
                for line in report.lines() {
                    println!("    {}", line);
                }
                ok += 1;
            }
            Err(e) => {
                println!("  [FAIL] endpoint health: {}", e);
                fail += 1;
            }
        }
    }

    println!();
    println!("Doctor summary: {} pass, {} warn, {} fail", ok, warn, fail);
    if fail > 0 {
        std::process::exit(1);
    }
    Ok(())
}

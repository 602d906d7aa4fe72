//! `sweep` and `config`: go through the daemon when it runs, in-process otherwise.

use std::sync::atomic::AtomicBool;

use anyhow::{bail, Context, Result};
use thread_reaper::guild::{GuildId, UserId};
use thread_reaper::ipc_client;
use thread_reaper::moderation::scheduler::{SweepOutcome, SweepReport};

use super::{daemon, local_pipeline};

pub fn sweep(guild_id: GuildId, actor: UserId) -> Result<()> {
    if daemon::is_running() {
        let resp = ipc_client::sweep_now(guild_id, actor).context("Daemon sweep failed")?;
        match resp.get("status").and_then(|s| s.as_str()) {
            Some("completed") => {
                let r = &resp["report"];
                println!(
                    "Sweep complete: {} guilds, {} threads, {} archived, {} skipped, {} errors ({}ms)",
                    r["guilds"], r["threads_seen"], r["archived"], r["skipped"], r["errors"], r["duration_ms"]
                );
            }
            Some("already_running") => println!("A sweep is already running; request dropped."),
            _ => bail!("Unexpected daemon reply: {}", resp),
        }
        return Ok(());
    }

    let pipeline = local_pipeline()?;
    match pipeline.commands.sweep_now(guild_id, actor, &AtomicBool::new(true))? {
        SweepOutcome::Completed(report) => print_report(&report),
        SweepOutcome::AlreadyRunning => println!("A sweep is already running; request dropped."),
    }
    Ok(())
}

fn print_report(r: &SweepReport) {
    println!(
        "Sweep complete: {} guilds, {} threads, {} archived, {} skipped, {} errors ({}ms)",
        r.guilds, r.threads_seen, r.archived, r.skipped, r.errors, r.duration_ms
    );
}

pub fn config(guild_id: GuildId, actor: UserId, inactive_time: Option<u64>) -> Result<()> {
    if daemon::is_running() {
        let resp = ipc_client::configure(guild_id, actor, inactive_time)
            .context("Daemon configure failed")?;
        match resp.get("message").and_then(|m| m.as_str()) {
            Some(msg) => println!("{}", msg),
            None => println!("{}", serde_json::to_string_pretty(&resp)?),
        }
        return Ok(());
    }

    let pipeline = local_pipeline()?;
    let reply = pipeline.commands.configure(guild_id, actor, inactive_time)?;
    println!("{}", reply.render());
    Ok(())
}

use anyhow::{Context, Result};
use thread_reaper::guild::GuildId;
use thread_reaper::platform::Platform;

use super::local_pipeline;

/// Dry run: print the verdict for every mirrored thread without archiving
/// or writing default guild configs.
pub fn run(guild: Option<GuildId>) -> Result<()> {
    let pipeline = local_pipeline()?;

    let guilds = match guild {
        Some(g) => vec![g],
        None => pipeline.platform.list_guilds().context("Failed to list guilds")?,
    };

    println!(
        "{:<20}  {:<20}  {:<25}  {}",
        "GUILD", "THREAD", "LAST ACTIVITY", "VERDICT"
    );
    println!("{}", "-".repeat(85));

    let mut total = 0usize;
    let mut candidates = 0usize;
    for guild_id in guilds {
        let threads = pipeline
            .platform
            .list_threads(guild_id)
            .with_context(|| format!("Failed to list threads of guild {}", guild_id))?;
        for thread in &threads {
            total += 1;
            match pipeline.reaper.inspect(thread) {
                Ok((decision, snapshot)) => {
                    if decision.is_archive() {
                        candidates += 1;
                    }
                    let last = snapshot
                        .last_activity
                        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!("{:<20}  {:<20}  {:<25}  {}", guild_id.to_string(), thread.id.to_string(), last, decision);
                }
                Err(e) => println!("{:<20}  {:<20}  {:<25}  error: {}", guild_id.to_string(), thread.id.to_string(), "?", e),
            }
        }
    }

    println!("\nTotal: {} threads, {} would be archived", total, candidates);
    Ok(())
}

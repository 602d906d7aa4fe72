mod cli;
mod daemon;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use thread_reaper::guild::{GuildId, MessageId, ThreadId, ThreadState, UserId};

#[derive(Parser)]
#[command(name = "thread-reaper", version, about = "Thread Reaper -- archive inactive threads automatically")]
struct App {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the daemon
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },
    /// Run a full sweep now (guild administrators only)
    Sweep {
        #[arg(long)]
        guild: GuildId,
        /// User issuing the command
        #[arg(long)]
        actor: UserId,
    },
    /// View or set a guild's inactivity threshold (guild administrators only)
    Config {
        #[arg(long)]
        guild: GuildId,
        #[arg(long)]
        actor: UserId,
        /// New threshold in seconds; omit to view
        #[arg(long)]
        inactive_time: Option<u64>,
    },
    /// Deliver a platform event to the running daemon
    Notify {
        #[command(subcommand)]
        event: NotifyEvent,
    },
    /// Dry run: show what a sweep would do, without archiving
    Threads {
        #[arg(long)]
        guild: Option<GuildId>,
    },
    /// Seed or mutate the local platform mirror
    Mirror {
        #[command(subcommand)]
        action: MirrorAction,
    },
}

#[derive(Subcommand)]
enum DaemonAction {
    /// Run the daemon in the foreground
    Run,
    /// Start the daemon in the background
    Start,
    /// Stop the daemon
    Stop,
    /// Show daemon status
    Status,
}

#[derive(Subcommand)]
enum NotifyEvent {
    /// A thread's state changed
    ThreadUpdated {
        #[arg(long)]
        guild: GuildId,
        #[arg(long)]
        thread: ThreadId,
        #[arg(long)]
        archived: bool,
        #[arg(long)]
        locked: bool,
        #[arg(long)]
        pinned: bool,
    },
    /// A message was deleted from a thread
    MessageDeleted {
        #[arg(long)]
        guild: GuildId,
        #[arg(long)]
        thread: ThreadId,
    },
}

#[derive(Subcommand)]
enum MirrorAction {
    /// Create or rename a guild
    Guild {
        id: GuildId,
        #[arg(long, default_value = "")]
        name: String,
    },
    /// Make a user administrator of a guild
    Admin {
        #[arg(long)]
        guild: GuildId,
        #[arg(long)]
        user: UserId,
    },
    /// Create a thread or change its flags
    Thread {
        #[arg(long)]
        guild: GuildId,
        #[arg(long)]
        id: ThreadId,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        archived: Option<bool>,
        #[arg(long)]
        locked: Option<bool>,
        #[arg(long)]
        pinned: Option<bool>,
    },
    /// Post a message in a thread
    Post {
        #[arg(long)]
        thread: ThreadId,
        #[arg(long)]
        id: MessageId,
        #[arg(long)]
        author: UserId,
        /// RFC 3339 timestamp (defaults to now)
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Delete a message
    Delete { id: MessageId },
}

fn main() {
    let app = App::parse();

    let result = match app.command {
        Commands::Daemon { action } => match action {
            DaemonAction::Run => daemon::run(),
            DaemonAction::Start => cli::daemon::start(),
            DaemonAction::Stop => cli::daemon::stop(),
            DaemonAction::Status => cli::daemon::status(),
        },
        Commands::Sweep { guild, actor } => cli::commands::sweep(guild, actor),
        Commands::Config { guild, actor, inactive_time } => {
            cli::commands::config(guild, actor, inactive_time)
        }
        Commands::Notify { event } => match event {
            NotifyEvent::ThreadUpdated { guild, thread, archived, locked, pinned } => {
                let state = ThreadState {
                    archived,
                    locked,
                    pinned,
                    ..ThreadState::new(thread, guild)
                };
                cli::notify::thread_updated(&state)
            }
            NotifyEvent::MessageDeleted { guild, thread } => cli::notify::message_deleted(guild, thread),
        },
        Commands::Threads { guild } => cli::threads::run(guild),
        Commands::Mirror { action } => match action {
            MirrorAction::Guild { id, name } => cli::mirror::guild(id, &name),
            MirrorAction::Admin { guild, user } => cli::mirror::admin(guild, user),
            MirrorAction::Thread { guild, id, name, archived, locked, pinned } => {
                cli::mirror::thread(guild, id, name.as_deref(), archived, locked, pinned)
            }
            MirrorAction::Post { thread, id, author, at } => cli::mirror::post(thread, id, author, at),
            MirrorAction::Delete { id } => cli::mirror::delete(id),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

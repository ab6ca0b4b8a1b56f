//! tanchat - chat history on the command line
//!
//! Opens the same snapshot the app keeps in its storage slot and exposes
//! every store and session operation as a subcommand.

mod commands;
mod offline;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tanchat")]
#[command(about = "tanchat - persisted chat conversations, prompts and settings", long_about = None)]
struct Cli {
    /// Config file (defaults to <config dir>/tanchat/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Slot directory, overriding the config file
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show engine status and storage location
    Status,
    /// List conversations, newest first
    List,
    /// Print a conversation with its messages as JSON
    Show { id: String },
    /// Start an empty conversation
    New,
    /// Retitle a conversation
    Rename { id: String, title: String },
    /// Delete a conversation and its messages
    Delete { id: String },
    /// Delete every conversation
    Clear {
        #[arg(long)]
        yes: bool,
    },
    /// Send a message and store the reply
    Send {
        /// Continue this conversation instead of starting a new one
        #[arg(long)]
        conversation: Option<String>,
        /// Reply text to store in place of a model call
        #[arg(long)]
        reply: Option<String>,
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Print the completion request a conversation would send
    Request { id: String },
    /// Manage system prompts
    Prompt {
        #[command(subcommand)]
        action: PromptAction,
    },
    /// Read or write generic settings
    Setting {
        #[command(subcommand)]
        action: SettingAction,
    },
    /// Read or write per-user settings
    UserSetting {
        #[command(subcommand)]
        action: UserSettingAction,
    },
    /// Model, reasoning and theme preferences
    Prefs {
        #[command(subcommand)]
        action: PrefsAction,
    },
    /// Print the encoded database snapshot
    Export,
    /// Delete the stored database and start empty
    Reset {
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum PromptAction {
    /// List prompts, newest first
    List,
    /// Add a prompt and make it active
    Add { name: String, content: String },
    /// Change a prompt's name and content
    Update {
        id: String,
        name: String,
        content: String,
    },
    /// Make a prompt the active one
    Activate { id: String },
    /// Leave no prompt active
    Deactivate { id: String },
    Delete { id: String },
}

#[derive(Subcommand)]
enum SettingAction {
    Get {
        key: String,
    },
    Set {
        key: String,
        value: String,
        #[arg(long)]
        enabled: bool,
    },
}

#[derive(Subcommand)]
enum UserSettingAction {
    Get { key: String },
    Set { key: String, value: String },
}

#[derive(Subcommand)]
enum PrefsAction {
    /// Show effective preferences
    Show,
    Model { id: String },
    Theme { id: String },
    /// Set reasoning effort (low|medium|high) and summary (auto|detailed|none)
    Reasoning { effort: String, summary: String },
    /// Forget all preferences
    Clear,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut app = commands::App::open(cli.config.as_deref(), cli.data_dir)?;

    match cli.command {
        Commands::Status => app.status(),
        Commands::List => app.list()?,
        Commands::Show { id } => app.show(&id)?,
        Commands::New => app.new_chat()?,
        Commands::Rename { id, title } => app.rename(&id, &title)?,
        Commands::Delete { id } => app.delete(&id)?,
        Commands::Clear { yes } => {
            require_confirmation(yes, "clear")?;
            app.clear()?
        }
        Commands::Send {
            conversation,
            reply,
            text,
        } => app.send(conversation.as_deref(), reply, &text.join(" "))?,
        Commands::Request { id } => app.request(&id)?,
        Commands::Prompt { action } => match action {
            PromptAction::List => app.prompts()?,
            PromptAction::Add { name, content } => app.add_prompt(&name, &content)?,
            PromptAction::Update { id, name, content } => app.update_prompt(&id, &name, &content)?,
            PromptAction::Activate { id } => app.set_prompt_active(&id, true)?,
            PromptAction::Deactivate { id } => app.set_prompt_active(&id, false)?,
            PromptAction::Delete { id } => app.delete_prompt(&id)?,
        },
        Commands::Setting { action } => match action {
            SettingAction::Get { key } => app.get_setting(&key)?,
            SettingAction::Set {
                key,
                value,
                enabled,
            } => app.set_setting(&key, &value, enabled)?,
        },
        Commands::UserSetting { action } => match action {
            UserSettingAction::Get { key } => app.get_user_setting(&key)?,
            UserSettingAction::Set { key, value } => app.set_user_setting(&key, &value)?,
        },
        Commands::Prefs { action } => match action {
            PrefsAction::Show => app.show_prefs()?,
            PrefsAction::Model { id } => app.set_model(&id)?,
            PrefsAction::Theme { id } => app.set_theme(&id)?,
            PrefsAction::Reasoning { effort, summary } => app.set_reasoning(&effort, &summary)?,
            PrefsAction::Clear => app.clear_prefs()?,
        },
        Commands::Export => app.export()?,
        Commands::Reset { yes } => {
            require_confirmation(yes, "reset")?;
            app.reset()?
        }
    }

    Ok(())
}

fn require_confirmation(yes: bool, command: &str) -> Result<(), String> {
    if yes {
        Ok(())
    } else {
        Err(format!("{} deletes data; pass --yes to confirm", command))
    }
}

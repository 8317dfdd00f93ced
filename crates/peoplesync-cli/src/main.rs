//! peoplesync CLI
//!
//! Thin wrapper around peoplesync-core for command-line usage.
//!
//! ## Usage
//!
//! ```bash
//! # Create an account (signs in on success)
//! peoplesync signup ada@example.com 'Abc123!@' 'Abc123!@'
//!
//! # Add a contact
//! peoplesync contact add "Grace Hopper" grace@example.com "+1 202 555 0199" --role Admiral
//!
//! # List contacts, optionally filtered
//! peoplesync contact list --search grace --category active
//!
//! # Mark a contact inactive
//! peoplesync contact edit <contact_id> --status inactive
//!
//! # Dashboard summary
//! peoplesync dashboard
//!
//! # Profile
//! peoplesync profile set-name "Ada L."
//! peoplesync profile set-avatar ./me.png
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use peoplesync_core::{
    Category, CommitReport, Contact, ContactFormData, ContactId, ContactStatus, CredentialChange,
    Directory, FilterState, ImageBlob, ProfileUpdate,
};

/// peoplesync - personal contact directory
#[derive(Parser)]
#[command(name = "peoplesync")]
#[command(version = "0.1.0")]
#[command(about = "peoplesync - personal contact directory")]
#[command(
    long_about = "A per-user contact directory with a live local view, search and status tabs, and a profile kept consistent across the identity provider, memory and the device cache."
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Data directory (default: ~/.peoplesync/data)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and sign in
    Signup {
        email: String,
        password: String,
        /// Password confirmation
        confirm: String,
    },

    /// Sign in to an existing account
    Login { email: String, password: String },

    /// End the current session
    Logout,

    /// Request a password reset email
    ResetPassword { email: String },

    /// Show the signed-in identity
    Whoami,

    /// Contact management
    Contact {
        #[command(subcommand)]
        action: ContactAction,
    },

    /// Show contact statistics and the most recent contacts
    Dashboard,

    /// Profile management
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
}

#[derive(Subcommand)]
enum ContactAction {
    /// Add a contact
    Add {
        name: String,
        email: String,
        phone: String,
        #[arg(short, long, default_value = "")]
        role: String,
        #[arg(short, long, default_value = "")]
        location: String,
    },
    /// List contacts
    List {
        /// Case-insensitive search over name, email and role
        #[arg(short, long, default_value = "")]
        search: String,
        /// One of: all, contacts, active, inactive, dashboard
        #[arg(short, long, default_value = "contacts")]
        category: String,
    },
    /// Edit a contact; omitted fields keep their current value
    Edit {
        /// Contact ID (ULID string)
        contact_id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        role: Option<String>,
        #[arg(long)]
        location: Option<String>,
        /// active or inactive
        #[arg(long)]
        status: Option<String>,
    },
    /// Delete a contact
    Delete {
        /// Contact ID (ULID string)
        contact_id: String,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Show your profile
    Show,
    /// Set the display name
    SetName { name: String },
    /// Upload an avatar image (JPEG, PNG, GIF or WEBP, up to 2 MB)
    SetAvatar { path: PathBuf },
    /// Change the account password
    ChangePassword {
        /// Current password
        #[arg(long)]
        current: Option<String>,
        /// New password
        #[arg(long)]
        new: String,
        /// New password confirmation
        #[arg(long)]
        confirm: String,
    },
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();
}

/// Get the default data directory (~/.peoplesync/data)
fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".peoplesync")
        .join("data")
}

/// Parse a category selector
fn parse_category(s: &str) -> Result<Category> {
    s.parse::<Category>().map_err(|e| anyhow::anyhow!(e))
}

/// Parse a contact status
fn parse_status(s: &str) -> Result<ContactStatus> {
    s.parse::<ContactStatus>().map_err(|e| anyhow::anyhow!(e))
}

/// Resume the persisted session, failing when nobody is signed in
async fn require_session(dir: &Directory) -> Result<()> {
    if dir.resume().await?.is_none() {
        anyhow::bail!("Not signed in. Run 'peoplesync login' first.");
    }
    dir.wait_until_synced().await?;
    Ok(())
}

fn find_contact(dir: &Directory, id: &ContactId) -> Result<Contact> {
    dir.snapshot()
        .contacts
        .into_iter()
        .find(|c| &c.id == id)
        .ok_or_else(|| anyhow::anyhow!("Contact not found: {}", id))
}

fn print_contact(contact: &Contact) {
    println!(
        "  {} [{}] {} <{}> {}",
        contact.id, contact.status, contact.name, contact.email, contact.phone
    );
    if !contact.role.is_empty() || !contact.location.is_empty() {
        println!("      {} {}", contact.role, contact.location);
    }
}

/// Print saved fields, then fail with the first rejection, if any
fn report_commit(report: CommitReport) -> Result<()> {
    if report.nothing_to_save() {
        println!("No changes to save.");
        return Ok(());
    }
    for field in &report.saved {
        println!("Saved {}", field);
    }
    if let Some((field, err)) = report.rejected.into_iter().next() {
        anyhow::bail!("Could not save {}: {}", field, err);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);
    let dir = Directory::open_dir(&data_dir)?;

    match cli.command {
        // ═══════════════════════════════════════════════════════════════════════
        // Session Commands
        // ═══════════════════════════════════════════════════════════════════════
        Commands::Signup {
            email,
            password,
            confirm,
        } => {
            let identity = dir.sign_up(&email, &password, &confirm).await?;
            println!("Account created: {}", identity.email);
            println!("  ID: {}", identity.id);
        }

        Commands::Login { email, password } => {
            let identity = dir.sign_in(&email, &password).await?;
            println!("Signed in as {}", identity.email);
            if let Some(name) = dir.profile().display_name {
                println!("  Name: {}", name);
            }
        }

        Commands::Logout => {
            if dir.resume().await?.is_none() {
                println!("Not signed in.");
            } else {
                dir.sign_out().await?;
                println!("Signed out.");
            }
        }

        Commands::ResetPassword { email } => {
            dir.send_password_reset(&email).await?;
            println!("Password reset email sent to {}", email.trim());
        }

        Commands::Whoami => match dir.resume().await? {
            Some(identity) => {
                let profile = dir.profile();
                println!("Signed in as {}", identity.email);
                println!("  ID: {}", identity.id);
                if let Some(label) = profile.label() {
                    println!("  Name: {}", label);
                }
            }
            None => println!("Not signed in."),
        },

        // ═══════════════════════════════════════════════════════════════════════
        // Contact Commands
        // ═══════════════════════════════════════════════════════════════════════
        Commands::Contact { action } => {
            require_session(&dir).await?;
            match action {
                ContactAction::Add {
                    name,
                    email,
                    phone,
                    role,
                    location,
                } => {
                    let contact = dir
                        .add_contact(ContactFormData {
                            name,
                            email,
                            phone,
                            role,
                            location,
                        })
                        .await?;
                    println!("Added contact: {}", contact.name);
                    println!("  ID: {}", contact.id);
                }

                ContactAction::List { search, category } => {
                    let filter = FilterState::new(search, parse_category(&category)?);
                    let view = dir.view(&filter);

                    println!("{} ({}):", filter.category.title(), view.len());
                    if view.is_empty() {
                        println!("  No contacts found.");
                        println!("  {}", peoplesync_core::filter::empty_hint(&filter.search_term));
                    }
                    for contact in &view {
                        print_contact(contact);
                    }
                }

                ContactAction::Edit {
                    contact_id,
                    name,
                    email,
                    phone,
                    role,
                    location,
                    status,
                } => {
                    let id = ContactId::new(contact_id);
                    let current = find_contact(&dir, &id)?;
                    let status = status.as_deref().map(parse_status).transpose()?;

                    let mut data = current.form_data();
                    let edits_fields = name.is_some()
                        || email.is_some()
                        || phone.is_some()
                        || role.is_some()
                        || location.is_some();
                    data.name = name.unwrap_or(data.name);
                    data.email = email.unwrap_or(data.email);
                    data.phone = phone.unwrap_or(data.phone);
                    data.role = role.unwrap_or(data.role);
                    data.location = location.unwrap_or(data.location);

                    if edits_fields {
                        dir.edit_contact(&id, data).await?;
                    }
                    if let Some(status) = status {
                        dir.set_contact_status(&id, status).await?;
                    }
                    if !edits_fields && status.is_none() {
                        println!("No changes to save.");
                    } else {
                        println!("Updated contact: {}", id);
                    }
                }

                ContactAction::Delete { contact_id } => {
                    let id = ContactId::new(contact_id);
                    dir.delete_contact(&id).await?;
                    println!("Deleted contact: {}", id);
                }
            }
        }

        Commands::Dashboard => {
            require_session(&dir).await?;
            let (stats, recent) = dir.dashboard_today();

            println!("Dashboard:");
            println!("  Total contacts: {}", stats.total);
            println!("  Active: {}", stats.active);
            println!("  Inactive: {}", stats.inactive);
            println!("  Added this month: {}", stats.added_this_month);
            println!();
            println!("Recent contacts:");
            if recent.is_empty() {
                println!("  (none)");
            }
            for contact in &recent {
                print_contact(contact);
            }
        }

        // ═══════════════════════════════════════════════════════════════════════
        // Profile Commands
        // ═══════════════════════════════════════════════════════════════════════
        Commands::Profile { action } => {
            if dir.resume().await?.is_none() {
                anyhow::bail!("Not signed in. Run 'peoplesync login' first.");
            }
            match action {
                ProfileAction::Show => {
                    let profile = dir.profile();
                    println!("Profile:");
                    println!(
                        "  Name: {}",
                        profile.display_name.as_deref().unwrap_or("(not set)")
                    );
                    println!("  Email: {}", profile.email.as_deref().unwrap_or("(unknown)"));
                    match &profile.avatar_image {
                        Some(avatar) => println!(
                            "  Avatar: {} ({} bytes encoded)",
                            avatar.mime_type(),
                            avatar.encoded_len()
                        ),
                        None => println!("  Avatar: (none)"),
                    }
                }

                ProfileAction::SetName { name } => {
                    report_commit(dir.commit_profile(ProfileUpdate::display_name(name)).await?)?;
                }

                ProfileAction::SetAvatar { path } => {
                    let blob = ImageBlob::from_path(&path).map_err(|e| {
                        anyhow::anyhow!("Cannot read image '{}': {}", path.display(), e)
                    })?;
                    report_commit(dir.set_avatar(&blob).await?)?;
                }

                ProfileAction::ChangePassword {
                    current,
                    new,
                    confirm,
                } => {
                    let update = ProfileUpdate {
                        credential: Some(CredentialChange {
                            current_password: current,
                            new_password: new,
                            confirm,
                        }),
                        ..Default::default()
                    };
                    report_commit(dir.commit_profile(update).await?)?;
                }
            }
        }
    }

    Ok(())
}

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod credentials;
mod error;
mod form;
mod logs;
mod models;
mod navigator;
mod page;
mod secrets;
mod status;
mod terminal;
mod wizard;

use api::{ApiClient, CloudBackupApi};
use config::{ClientSettings, Profile};
use credentials::{CredentialForm, CredentialState};
use error::FormError;
use models::BackupMode;
use navigator::{CredentialSupplier, FolderNavigator};
use page::CloudBackupPage;
use status::{ScheduleForm, StatusPanel};
use terminal::TerminalTarget;
use wizard::BackupStep;

#[derive(Parser)]
#[command(name = "cloudbackup-ctl")]
#[command(about = "Manage the cloud backup of a backup appliance", long_about = None)]
struct Cli {
    /// Appliance profile to use (defaults to `default_profile` from config.toml)
    #[arg(long, global = true)]
    profile: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store an appliance profile and its login password
    Setup {
        /// Name of the profile
        name: String,

        /// Base URL of the appliance web interface
        #[arg(long)]
        url: String,

        /// Administrator user name
        #[arg(long)]
        username: String,
    },

    /// List stored profiles
    Profiles,

    /// Show cloud backup status, configuration and schedule
    Status,

    /// Start a cloud backup now
    Run,

    /// Show or change the backup destination
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Show or change the backup schedule
    #[command(subcommand)]
    Schedule(ScheduleCommand),

    /// Browse MEGA folders using the stored credentials
    Browse,

    /// Run the setup wizard's backup destination step
    #[command(subcommand)]
    Wizard(WizardCommand),

    /// Show the log of a task
    Logs {
        /// Task name
        #[arg(default_value = "Cloud Backup")]
        task: String,

        /// Number of log lines to fetch
        #[arg(long)]
        lines: Option<u32>,

        /// Keep polling until Ctrl+C
        #[arg(long, short)]
        follow: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Show the current destination
    Show,

    /// Back up to MEGA
    Mega {
        /// MEGA account email; prompts for the password and re-validates
        #[arg(long)]
        email: Option<String>,

        /// Destination folder on MEGA
        #[arg(long, conflicts_with = "browse")]
        folder: Option<String>,

        /// Pick the destination folder interactively
        #[arg(long)]
        browse: bool,
    },

    /// Back up to any rclone remote
    Advanced {
        /// rclone.conf to upload
        #[arg(long)]
        rclone_config: PathBuf,

        /// Remote and path, e.g. `myremote:/backups`
        #[arg(long)]
        remote_name: String,
    },
}

#[derive(Subcommand)]
enum ScheduleCommand {
    /// Show the current schedule
    Show,

    /// Change the daily backup time and bandwidth limit
    Set {
        /// Time of day, e.g. 03:00
        #[arg(long)]
        time: String,

        /// rclone bandwidth limit, e.g. 10M
        #[arg(long, default_value = "")]
        bandwidth_limit: String,
    },
}

#[derive(Subcommand)]
enum WizardCommand {
    /// Connect a MEGA account and choose a folder
    Mega {
        #[arg(long)]
        email: String,
    },

    /// Use an rclone remote
    Rclone {
        #[arg(long)]
        rclone_config: PathBuf,

        #[arg(long)]
        remote_name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cloudbackup_ctl=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = ClientSettings::load()?;

    match cli.command {
        Commands::Setup {
            name,
            url,
            username,
        } => setup_profile(&settings, name, url, username).await,
        Commands::Profiles => list_profiles(&settings).await,
        command => {
            let api = connect(cli.profile.as_deref(), &settings).await?;
            run_command(&api, &settings, command).await
        }
    }
}

fn read_password(prompt: &str) -> Result<String> {
    use std::io::Write;

    print!("{}", prompt);
    std::io::stdout().flush()?;
    Ok(rpassword::read_password()?)
}

async fn setup_profile(
    settings: &ClientSettings,
    name: String,
    url: String,
    username: String,
) -> Result<()> {
    println!("Setting up profile: {}", name);
    println!("URL: {}", url);
    println!("Username: {}", username);

    let password = read_password("Password: ")?;

    println!("Testing connection...");
    let api = ApiClient::new(&url, settings.request_timeout())?;
    api.login(&username, &password)
        .await
        .context("Could not log in to the appliance")?;
    println!("✓ Logged in successfully!");

    let profile = Profile {
        name: name.clone(),
        url,
        username,
    };

    let secret_store = secrets::SecretStore::new().await?;
    secret_store.store_profile(&profile).await?;
    secret_store.store_password(&name, &password).await?;

    println!("\n✓ Profile '{}' configured successfully!", name);
    Ok(())
}

async fn list_profiles(settings: &ClientSettings) -> Result<()> {
    let secret_store = secrets::SecretStore::new().await?;
    let names = secret_store.list_profiles().await?;

    if names.is_empty() {
        println!("No profiles configured.");
        println!("\nTo add a profile:");
        println!("  cloudbackup-ctl setup <name> --url <url> --username <user>");
        return Ok(());
    }

    println!("Configured profiles:\n");
    for name in names {
        if let Ok(profile) = secret_store.load_profile(&name).await {
            let marker = if settings.default_profile.as_deref() == Some(name.as_str()) {
                " (default)"
            } else {
                ""
            };
            println!("  {}{}", name, marker);
            println!("    URL:      {}", profile.url);
            println!("    Username: {}", profile.username);
            println!();
        }
    }

    Ok(())
}

async fn connect(profile: Option<&str>, settings: &ClientSettings) -> Result<ApiClient> {
    let name = profile
        .or(settings.default_profile.as_deref())
        .context("No profile given; pass --profile or set default_profile in config.toml")?;

    let secret_store = secrets::SecretStore::new().await?;
    let profile = secret_store.load_profile(name).await?;
    let password = secret_store.load_password(name).await?;

    let api = ApiClient::new(&profile.url, settings.request_timeout())?;
    api.login(&profile.username, &password)
        .await
        .with_context(|| format!("Could not log in to {}", profile.url))?;
    Ok(api)
}

/// Prints a form error and turns it into the command's failure.
fn report(result: Result<(), FormError>) -> Result<()> {
    result.map_err(|e| {
        eprintln!("✗ {}", e);
        anyhow::anyhow!(e)
    })
}

async fn run_command(api: &ApiClient, settings: &ClientSettings, command: Commands) -> Result<()> {
    match command {
        Commands::Status => {
            let page = CloudBackupPage::load(api).await;
            terminal::print_status(&page.status);
            println!();
            terminal::print_form(&page.form);
            println!();
            terminal::print_schedule(&page.schedule);
            Ok(())
        }
        Commands::Run => {
            let mut panel = StatusPanel::default();
            report(panel.run_backup(api).await)?;
            println!("✓ Cloud backup started\n");
            terminal::print_status(&panel);
            Ok(())
        }
        Commands::Config(command) => run_config(api, command).await,
        Commands::Schedule(command) => run_schedule(api, command).await,
        Commands::Browse => {
            let supplier = || None::<models::MegaCredentials>;
            match pick_folder(api, supplier).await? {
                Some(path) => println!("{}", path),
                None => println!("No folder selected."),
            }
            Ok(())
        }
        Commands::Wizard(command) => run_wizard(api, command).await,
        Commands::Logs {
            task,
            lines,
            follow,
        } => {
            let mut follower = logs::LogFollower::new(api, &task, lines.unwrap_or(settings.log_lines));
            if !follow {
                print!("{}", follower.poll().await?.text);
                return Ok(());
            }
            let stop = async {
                tokio::signal::ctrl_c().await.ok();
            };
            follower
                .follow(settings.log_poll_interval(), stop, |update| {
                    match &update.appended {
                        Some(appended) if !update.scroll_to_bottom => print!("{}", appended),
                        _ => print!("{}", update.text),
                    }
                })
                .await;
            Ok(())
        }
        Commands::Setup { .. } | Commands::Profiles => unreachable!("handled before login"),
    }
}

/// Opens the interactive picker and returns the confirmed folder, if any.
async fn pick_folder<A, C>(api: &A, credentials: C) -> Result<Option<String>>
where
    A: CloudBackupApi,
    C: CredentialSupplier,
{
    let mut selected = None;
    {
        let on_select = |path: &str| selected = Some(path.to_string());
        let mut navigator =
            FolderNavigator::open(api, credentials, on_select, TerminalTarget).await;
        terminal::run_picker(&mut navigator).await?;
    }
    Ok(selected)
}

async fn run_config(api: &ApiClient, command: ConfigCommand) -> Result<()> {
    let mut form = CredentialForm::new();
    form.load(api).await;

    match command {
        ConfigCommand::Show => {}
        ConfigCommand::Mega {
            email,
            folder,
            browse,
        } => {
            let previous_folder = form.folder.value.clone();
            form.set_mode(BackupMode::Mega);

            if let Some(email) = email {
                if form.state() == CredentialState::Locked {
                    report(form.change_credentials())?;
                }
                form.email.set(email);
                form.password.set(read_password("MEGA password: ")?);
                println!("Validating credentials...");
                report(form.validate(api).await)?;
                form.folder.set(previous_folder);
            }

            if browse {
                if !form.browse_enabled() {
                    anyhow::bail!("MEGA credentials must be validated before browsing; pass --email");
                }
                if let Some(path) = pick_folder(api, form.credential_supplier()).await? {
                    form.apply_selection(&path);
                }
            } else if let Some(folder) = folder {
                form.apply_selection(&folder);
            }

            if form.folder_warning {
                println!("Note: changing the folder starts a new backup in that location.");
            }
            report(form.submit(api).await)?;
        }
        ConfigCommand::Advanced {
            rclone_config,
            remote_name,
        } => {
            let content = std::fs::read_to_string(&rclone_config)
                .with_context(|| format!("Failed to read {}", rclone_config.display()))?;
            form.set_mode(BackupMode::Advanced);
            form.rclone_config.set(content);
            form.remote_name.set(remote_name);
            report(form.submit(api).await)?;
        }
    }

    terminal::print_form(&form);
    Ok(())
}

async fn run_schedule(api: &ApiClient, command: ScheduleCommand) -> Result<()> {
    let mut schedule = ScheduleForm::default();
    schedule.load(api).await;

    match command {
        ScheduleCommand::Show => terminal::print_schedule(&schedule),
        ScheduleCommand::Set {
            time,
            bandwidth_limit,
        } => {
            let mut status = StatusPanel::default();
            schedule.time.set(time);
            schedule.bandwidth_limit.set(bandwidth_limit);
            report(schedule.save(api, &mut status).await)?;
            terminal::print_schedule(&schedule);
            println!();
            terminal::print_status(&status);
        }
    }
    Ok(())
}

async fn run_wizard(api: &ApiClient, command: WizardCommand) -> Result<()> {
    let mut step = match command {
        WizardCommand::Mega { email } => {
            let mut step = BackupStep::new(BackupMode::Mega);
            step.email.set(email);
            step.password.set(read_password("MEGA password: ")?);
            println!("Connecting to MEGA...");
            report(step.connect(api).await)?;

            if let Some(path) = pick_folder(api, step.credential_supplier()).await? {
                step.apply_selection(&path);
            }
            step
        }
        WizardCommand::Rclone {
            rclone_config,
            remote_name,
        } => {
            let mut step = BackupStep::new(BackupMode::Advanced);
            let content = std::fs::read_to_string(&rclone_config)
                .with_context(|| format!("Failed to read {}", rclone_config.display()))?;
            step.rclone_config.set(content);
            step.remote_name.set(remote_name);
            step
        }
    };

    if !step.can_save() {
        terminal::print_wizard_step(&step);
        anyhow::bail!("Backup destination is incomplete");
    }
    let result = step.save(api).await;
    terminal::print_wizard_step(&step);
    result.map_err(anyhow::Error::from)?;
    println!("✓ Backup destination saved");
    Ok(())
}

use anyhow::Result;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::api::CloudBackupApi;
use crate::credentials::CredentialForm;
use crate::form::Banner;
use crate::models::BackupMode;
use crate::navigator::{
    CredentialSupplier, FolderNavigator, PickerRow, PickerTarget, PickerView, SelectionSink,
    EMPTY_LISTING,
};
use crate::status::{Badge, ScheduleForm, StatusPanel, Tone};
use crate::wizard::BackupStep;

/// Renders the folder picker on stdout.
#[derive(Default)]
pub struct TerminalTarget;

impl PickerTarget for TerminalTarget {
    fn show(&mut self, _view: &PickerView) {
        println!("Select a MEGA folder");
        println!("  <number> open folder   .. up   n <name> new folder   s select   q cancel\n");
    }

    fn render(&mut self, view: &PickerView) {
        if view.rows == [PickerRow::Loading] {
            println!("Loading...");
            return;
        }
        if view.creating {
            println!("Creating...");
            return;
        }

        println!("\n{}", view.current_path);
        let mut index = 0;
        for row in &view.rows {
            match row {
                PickerRow::Folder(name) => {
                    index += 1;
                    println!("  {:>3}. {}/", index, name);
                }
                PickerRow::Empty => println!("       {}", EMPTY_LISTING),
                PickerRow::Loading => {}
            }
        }
        if let Some(error) = &view.error {
            println!("✗ {}", error);
        }
        if !view.new_folder.hidden && view.new_folder.invalid {
            println!("✗ Enter a folder name");
        }
    }

    fn close(&mut self) {
        println!();
    }
}

enum PickerCommand {
    Open(usize),
    Up,
    Create(String),
    Select,
    Cancel,
    Unknown,
}

fn parse_command(line: &str) -> PickerCommand {
    let line = line.trim();
    match line {
        ".." | "u" | "up" => PickerCommand::Up,
        "s" | "select" => PickerCommand::Select,
        "q" | "quit" => PickerCommand::Cancel,
        _ => {
            if let Some(name) = line.strip_prefix("n ").or_else(|| line.strip_prefix("new ")) {
                return PickerCommand::Create(name.to_string());
            }
            if line == "n" || line == "new" {
                return PickerCommand::Create(String::new());
            }
            match line.parse::<usize>() {
                Ok(n) if n > 0 => PickerCommand::Open(n - 1),
                _ => PickerCommand::Unknown,
            }
        }
    }
}

/// Reads picker commands from stdin until a folder is selected or the picker is cancelled.
pub async fn run_picker<A, C, S, T>(navigator: &mut FolderNavigator<'_, A, C, S, T>) -> Result<()>
where
    A: CloudBackupApi,
    C: CredentialSupplier,
    S: SelectionSink,
    T: PickerTarget,
{
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while navigator.is_open() {
        print!("{}> ", navigator.current_path());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            navigator.cancel();
            break;
        };

        match parse_command(&line) {
            PickerCommand::Open(index) => {
                let name = navigator.view().folders().nth(index).map(str::to_string);
                match name {
                    Some(name) => navigator.select_child(&name).await,
                    None => println!("No folder number {}", index + 1),
                }
            }
            PickerCommand::Up => navigator.ascend().await,
            PickerCommand::Create(name) => {
                navigator.show_new_folder_input();
                // Failures are already shown by the render
                let _ = navigator.create_folder(&name).await;
            }
            PickerCommand::Select => navigator.confirm_selection(),
            PickerCommand::Cancel => navigator.cancel(),
            PickerCommand::Unknown => println!("Unknown command: {}", line.trim()),
        }
    }

    Ok(())
}

fn icon_glyph(icon: &str) -> &'static str {
    match icon {
        "circle-check" => "✓",
        "circle-xmark" => "✗",
        "spinner" => "↻",
        "clock" => "◷",
        _ => "!",
    }
}

fn tone_glyph(tone: Tone) -> &'static str {
    match tone {
        Tone::Success => "✓",
        Tone::Danger => "✗",
        Tone::Info => "↻",
        Tone::Warning => "!",
        Tone::Secondary => "·",
    }
}

pub fn badge_text(badge: &Badge) -> String {
    match badge {
        Badge::Loading => "…".to_string(),
        Badge::Label { tone, icon, text } => {
            let mark = icon.map(icon_glyph).unwrap_or_else(|| tone_glyph(*tone));
            format!("{} {}", mark, text)
        }
    }
}

fn print_banner(banner: &Option<Banner>) {
    match banner {
        Some(Banner::Success(text)) => println!("✓ {}", text),
        Some(Banner::Danger(text)) => println!("✗ {}", text),
        None => {}
    }
}

pub fn print_status(panel: &StatusPanel) {
    println!("Cloud backup: {}", badge_text(&panel.badge));
    println!("  Last run:      {}", panel.last_run);
    println!("  Next run:      {}", panel.next_run);
    println!("  Last duration: {}", panel.last_duration);
    if let Some(error) = &panel.error {
        println!("✗ {}", error);
    }
}

pub fn print_form(form: &CredentialForm) {
    print_banner(&form.banner);
    match form.mode() {
        BackupMode::Mega => {
            println!("Mode:     MEGA");
            println!("Email:    {}", or_dash(&form.email.value));
            println!("Password: {}", or_dash(&form.password.value));
            println!("Folder:   {}", or_dash(&form.folder.value));
            print_banner(&form.credential_status);
        }
        BackupMode::Advanced => {
            println!("Mode:     advanced (rclone)");
            println!("Remote:   {}", or_dash(&form.remote_name.value));
            let lines = form.rclone_config.value.lines().count();
            println!("Config:   {} line(s)", lines);
        }
    }
}

pub fn print_schedule(schedule: &ScheduleForm) {
    println!("Backup time:     {}", or_dash(&schedule.time.value));
    println!("Bandwidth limit: {}", or_dash(&schedule.bandwidth_limit.value));
    if let Some(error) = &schedule.error {
        println!("✗ {}", error);
    }
    print_banner(&schedule.success);
}

pub fn print_wizard_step(step: &BackupStep) {
    match step.mode {
        BackupMode::Mega => {
            println!("MEGA account: {}", or_dash(step.email.trimmed()));
            println!("Folder:       {}", or_dash(&step.folder.value));
            if step.folder_warning {
                println!("Note: backups will be written to this folder from now on.");
            }
        }
        BackupMode::Advanced => {
            println!("Remote: {}", or_dash(step.remote_name.trimmed()));
        }
    }
    if let Some(error) = &step.error {
        println!("✗ {}", error);
    }
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

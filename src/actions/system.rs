use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use sysinfo::System;

use super::{run_program, ActionContext, ActionError, ActionRegistry, ActionResult};
use crate::actions::power::Platform;
use crate::display;
use crate::phrases::PhraseSet;
use crate::prompts::ask_volume;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceUsage {
    pub cpu_percent: f32,
    pub ram_used_mb: u64,
    pub ram_total_mb: u64,
}

impl ResourceUsage {
    pub fn sample() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_usage();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        sys.refresh_cpu_usage();
        sys.refresh_memory();

        Self {
            cpu_percent: sys.global_cpu_usage(),
            ram_used_mb: sys.used_memory() / (1024 * 1024),
            ram_total_mb: sys.total_memory() / (1024 * 1024),
        }
    }

    pub fn ram_percent(&self) -> f32 {
        if self.ram_total_mb == 0 {
            return 0.0;
        }
        self.ram_used_mb as f32 * 100.0 / self.ram_total_mb as f32
    }
}

pub fn status_report(usage: &ResourceUsage, online: bool) -> String {
    let connection = if online {
        "Network connection is stable."
    } else {
        "Network connection is not present."
    };
    format!(
        "CPU usage is {:.0} percent, and RAM usage is {:.0} percent. {}",
        usage.cpu_percent,
        usage.ram_percent(),
        connection
    )
}

fn system_status(ctx: &mut ActionContext<'_>) -> ActionResult {
    let usage = ResourceUsage::sample();
    let report = status_report(&usage, ctx.network.is_online());
    log::info!(
        "📊 RAM {} / {} MB",
        usage.ram_used_mb,
        usage.ram_total_mb
    );
    println!("{}", report);
    Ok(Some(report))
}

fn list_phrases(ctx: &mut ActionContext<'_>) -> ActionResult {
    let phrases = PhraseSet::build(ctx.store, ctx.catalog);
    display::print_grid("Active phrases", &phrases.all());
    Ok(None)
}

fn list_commands(ctx: &mut ActionContext<'_>) -> ActionResult {
    let commands: Vec<&str> = ctx.catalog.phrases().collect();
    display::print_grid("Active commands", &commands);
    Ok(None)
}

/// "It's 3:07 PM"
pub fn spoken_time(now: DateTime<Local>) -> String {
    let time_str = now.format("%I:%M %p").to_string();
    format!("It's {}", time_str.trim_start_matches('0'))
}

fn tell_time(_ctx: &mut ActionContext<'_>) -> ActionResult {
    Ok(Some(spoken_time(Local::now())))
}

fn terminate(ctx: &mut ActionContext<'_>) -> ActionResult {
    log::info!("🛑 Termination requested by voice command");
    ctx.shutdown.cancel();
    Ok(None)
}

fn restart(ctx: &mut ActionContext<'_>) -> ActionResult {
    log::info!("🔁 Restart requested by voice command");
    ctx.restart.store(true, Ordering::SeqCst);
    ctx.shutdown.cancel();
    Ok(Some("Restarting.".to_string()))
}

/// Screenshot tools to try, in order, each writing to `target`
pub fn screenshot_programs(platform: Platform, target: &Path) -> Vec<(&'static str, Vec<String>)> {
    let target = target.display().to_string();
    match platform {
        Platform::Linux => vec![
            ("gnome-screenshot", vec!["-f".to_string(), target.clone()]),
            ("grim", vec![target.clone()]),
            ("scrot", vec![target]),
        ],
        Platform::MacOs => vec![("screencapture", vec!["-x".to_string(), target])],
        Platform::Windows => vec![(
            "powershell",
            vec![
                "-NoProfile".to_string(),
                "-Command".to_string(),
                format!(
                    "Add-Type -AssemblyName System.Windows.Forms,System.Drawing; \
                     $b = [System.Windows.Forms.Screen]::PrimaryScreen.Bounds; \
                     $i = New-Object System.Drawing.Bitmap $b.Width, $b.Height; \
                     [System.Drawing.Graphics]::FromImage($i).CopyFromScreen($b.Location, [System.Drawing.Point]::Empty, $b.Size); \
                     $i.Save('{}')",
                    target
                ),
            ],
        )],
    }
}

/// `<pictures dir>/screenshot_20240501_150700.png`
pub fn screenshot_path(now: DateTime<Local>) -> PathBuf {
    dirs::picture_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(format!("screenshot_{}.png", now.format("%Y%m%d_%H%M%S")))
}

fn take_screenshot(_ctx: &mut ActionContext<'_>) -> ActionResult {
    let target = screenshot_path(Local::now());
    let mut last_error = None;
    for (program, args) in screenshot_programs(Platform::current(), &target) {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        match run_program(program, &args) {
            Ok(_) => {
                println!("Screenshot saved to {}", target.display());
                return Ok(Some("Screenshot taken.".to_string()));
            }
            Err(e) => {
                log::debug!("Screenshot with {} failed: {}", program, e);
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| ActionError::Unsupported("screenshots".into())))
}

pub fn volume_program(platform: Platform, level: u8) -> Option<(&'static str, Vec<String>)> {
    match platform {
        Platform::Linux => Some((
            "pactl",
            vec![
                "set-sink-volume".to_string(),
                "@DEFAULT_SINK@".to_string(),
                format!("{}%", level),
            ],
        )),
        Platform::MacOs => Some((
            "osascript",
            vec!["-e".to_string(), format!("set volume output volume {}", level)],
        )),
        Platform::Windows => None,
    }
}

fn set_volume(ctx: &mut ActionContext<'_>) -> ActionResult {
    let Some(level) = ask_volume(ctx)? else {
        println!("⚠️ No volume number found in command.");
        return Ok(Some("I couldn't hear any volume value.".to_string()));
    };

    let (program, args) = volume_program(Platform::current(), level)
        .ok_or_else(|| ActionError::Unsupported("system volume".into()))?;
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    run_program(program, &args)?;
    Ok(Some(format!("System volume set to {}%", level)))
}

pub fn register(registry: &mut ActionRegistry) {
    registry.register("check system status", system_status);
    registry.register("list active phrases", list_phrases);
    registry.register("list active commands", list_commands);
    registry.register("what time is it", tell_time);
    registry.register("set system volume", set_volume);
    registry.register("terminate assistant program", terminate);
    registry.register("restart assistant program", restart);
    registry.register("take screen shot", take_screenshot);
}

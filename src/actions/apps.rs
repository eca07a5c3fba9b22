use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use sysinfo::{ProcessesToUpdate, System};

use super::{ActionContext, ActionError, ActionRegistry, ActionResult};
use crate::config;
use crate::prompts::ask_single_entry;

/// Executable file name used to find the running process
pub fn process_name(exe_path: &str) -> Option<String> {
    Path::new(exe_path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
}

fn choose_application(ctx: &mut ActionContext<'_>) -> Result<Option<(String, String)>, ActionError> {
    let apps = config::applications(ctx.store);
    let names: Vec<String> = apps.keys().cloned().collect();
    let Some(name) = ask_single_entry(ctx, names, "application", false)? else {
        return Ok(None);
    };
    // Entry prompts lowercase their answers; configured keys may not be
    let path = apps
        .iter()
        .find(|(key, _)| key.to_lowercase() == name)
        .map(|(_, path)| path.clone())
        .unwrap_or_default();
    Ok(Some((name, path)))
}

/// Wait for a launched application on a detached thread so it does not
/// linger as a zombie after it exits
pub fn reap(mut child: Child, name: String) -> Option<thread::JoinHandle<()>> {
    let spawned = thread::Builder::new()
        .name(format!("reap-{}", name))
        .spawn(move || match child.wait() {
            Ok(status) => log::debug!("{} exited with {}", name, status),
            Err(e) => log::warn!("⚠️ Could not wait for {}: {}", name, e),
        });
    match spawned {
        Ok(handle) => Some(handle),
        Err(e) => {
            log::warn!("⚠️ Could not start reaper thread: {}", e);
            None
        }
    }
}

fn launch(ctx: &mut ActionContext<'_>) -> ActionResult {
    let Some((name, path)) = choose_application(ctx)? else {
        return Ok(None);
    };

    if path.trim().is_empty() || !Path::new(&path).exists() {
        println!(
            "No executable configured for '{}'. Set applications.{} in {}",
            name,
            name,
            ctx.store.path().display()
        );
        return Ok(Some(format!("I was not able to locate {}!", name)));
    }

    let child = Command::new(&path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| ActionError::Command {
            program: path.clone(),
            reason: e.to_string(),
        })?;
    log::info!("🚀 Launched {} ({})", name, path);
    reap(child, name.clone());
    Ok(Some(format!("Alright, Opening {}!", name)))
}

fn close(ctx: &mut ActionContext<'_>) -> ActionResult {
    let Some((name, path)) = choose_application(ctx)? else {
        return Ok(None);
    };
    let Some(process) = process_name(&path) else {
        println!("No path configured for '{}'.", name);
        return Ok(None);
    };

    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::All, true);
    let mut killed = 0;
    for proc_ in sys.processes().values() {
        if proc_.name().to_string_lossy() == process.as_str() && proc_.kill() {
            killed += 1;
        }
    }

    if killed == 0 {
        log::warn!("⚠️ No running process named {}", process);
        return Ok(Some(format!("{} is not running.", name)));
    }
    println!("{} closed.", process);
    Ok(None)
}

pub fn register(registry: &mut ActionRegistry) {
    registry.register("launch application", launch);
    registry.register("close application", close);
}

use strum::{Display, EnumIter, IntoEnumIterator};

use super::{run_program, ActionContext, ActionRegistry, ActionResult, CommandHandler};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum PowerAction {
    Lock,
    Sleep,
    Shutdown,
    Restart,
    Hibernate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }
}

impl PowerAction {
    /// Spoken command that triggers this action, e.g. "lock system"
    pub fn command(self) -> String {
        format!("{} system", self)
    }

    pub fn program(self, platform: Platform) -> (&'static str, Vec<&'static str>) {
        use PowerAction::*;
        match platform {
            Platform::Linux => match self {
                Lock => ("loginctl", vec!["lock-session"]),
                Sleep => ("systemctl", vec!["suspend"]),
                Shutdown => ("systemctl", vec!["poweroff"]),
                Restart => ("systemctl", vec!["reboot"]),
                Hibernate => ("systemctl", vec!["hibernate"]),
            },
            Platform::MacOs => match self {
                Lock => ("pmset", vec!["displaysleepnow"]),
                Sleep | Hibernate => ("pmset", vec!["sleepnow"]),
                Shutdown => ("osascript", vec!["-e", "tell app \"System Events\" to shut down"]),
                Restart => ("osascript", vec!["-e", "tell app \"System Events\" to restart"]),
            },
            Platform::Windows => match self {
                Lock => ("rundll32.exe", vec!["user32.dll,LockWorkStation"]),
                Sleep => ("rundll32.exe", vec!["powrprof.dll,SetSuspendState", "0,1,0"]),
                Shutdown => ("shutdown", vec!["/s", "/t", "1"]),
                Restart => ("shutdown", vec!["/r", "/t", "1"]),
                Hibernate => ("shutdown", vec!["/h"]),
            },
        }
    }

    pub fn run(self) -> ActionResult {
        let (program, args) = self.program(Platform::current());
        println!("[System] Executing: {}", self);
        run_program(program, &args)?;
        Ok(None)
    }
}

impl CommandHandler for PowerAction {
    fn execute(&self, _ctx: &mut ActionContext<'_>) -> ActionResult {
        self.run()
    }
}

pub fn register(registry: &mut ActionRegistry) {
    for action in PowerAction::iter() {
        registry.register(&action.command(), action);
    }
}

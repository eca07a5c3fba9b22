use std::process::Command;
use std::time::Duration;
use strum::{Display, EnumIter, IntoEnumIterator};

use super::{ActionContext, ActionError, ActionRegistry, ActionResult, CommandHandler};

pub const YTMUSIC_API: &str = "http://localhost:26538/api/v1";

/// Transport commands shared by both media backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum MediaCommand {
    #[strum(serialize = "play-pause")]
    PlayPause,
    #[strum(serialize = "next")]
    Next,
    #[strum(serialize = "previous")]
    Previous,
}

impl MediaCommand {
    /// Phrase for the desktop media player
    fn media_phrase(self) -> &'static str {
        match self {
            MediaCommand::PlayPause => "toggle media",
            MediaCommand::Next => "next media track",
            MediaCommand::Previous => "previous media track",
        }
    }

    /// Phrase and API endpoint for the YouTube Music companion server
    fn music_phrase(self) -> (&'static str, &'static str) {
        match self {
            MediaCommand::PlayPause => ("toggle youtube music", "toggle-play"),
            MediaCommand::Next => ("next music track", "next"),
            MediaCommand::Previous => ("previous music track", "previous"),
        }
    }
}

/// Pick a player from `playerctl --list-all` output: the preferred player
/// (prefix match) if given, else spotifyd, spotify, then the first listed.
pub fn pick_player(list_output: &str, preferred: Option<&str>) -> Option<String> {
    let players: Vec<&str> = list_output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    if let Some(pattern) = preferred {
        return players
            .iter()
            .find(|p| p.starts_with(pattern))
            .map(|p| p.to_string());
    }

    for priority in ["spotifyd", "spotify"] {
        if let Some(player) = players.iter().find(|p| p.starts_with(priority)) {
            return Some(player.to_string());
        }
    }
    players.first().map(|p| p.to_string())
}

/// Desktop media control through `playerctl` (MPRIS)
#[derive(Debug, Clone, Default)]
pub struct MediaController {
    preferred_player: Option<String>,
}

impl MediaController {
    pub fn new(preferred_player: Option<String>) -> Self {
        Self { preferred_player }
    }

    fn player_args(&self) -> Vec<String> {
        let output = match Command::new("playerctl").arg("--list-all").output() {
            Ok(output) if output.status.success() => output,
            Ok(_) => return Vec::new(),
            Err(e) => {
                log::debug!("Failed to run 'playerctl --list-all': {}", e);
                return Vec::new();
            }
        };

        let players = String::from_utf8_lossy(&output.stdout);
        match pick_player(&players, self.preferred_player.as_deref()) {
            Some(player) => {
                log::debug!("Using media player: {}", player);
                vec!["--player".to_string(), player]
            }
            // No match: let playerctl pick
            None => Vec::new(),
        }
    }

    pub fn send(&self, command: MediaCommand) -> Result<(), ActionError> {
        if !cfg!(target_os = "linux") {
            return Err(ActionError::Unsupported("media control needs playerctl".into()));
        }

        let mut args = self.player_args();
        args.push(command.to_string());

        let output = Command::new("playerctl")
            .args(&args)
            .output()
            .map_err(|e| ActionError::Command {
                program: "playerctl".into(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            let error_msg = String::from_utf8_lossy(&output.stderr);
            return Err(ActionError::Command {
                program: "playerctl".into(),
                reason: error_msg.trim().to_string(),
            });
        }

        log::info!("🎵 Media {}", command);
        Ok(())
    }
}

struct DesktopMedia(MediaCommand);

impl CommandHandler for DesktopMedia {
    fn execute(&self, ctx: &mut ActionContext<'_>) -> ActionResult {
        let player: String = ctx.store.get_entry("media", "player", String::new());
        let preferred = (!player.trim().is_empty()).then_some(player);
        MediaController::new(preferred).send(self.0)?;
        Ok(None)
    }
}

/// Client for the YouTube Music desktop app's local API
#[derive(Debug, Clone)]
pub struct YtMusicClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl YtMusicClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ActionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(3))
            .build()?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    pub fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint)
    }

    pub fn send(&self, endpoint: &str) -> Result<(), ActionError> {
        let response = self
            .client
            .post(self.url(endpoint))
            .header("Authorization", "Bearer")
            .header("Accept", "*/*")
            .send()?;

        let status = response.status();
        println!("{}: {}", endpoint.to_uppercase(), status);
        if !status.is_success() {
            return Err(ActionError::Response(format!("{} returned {}", endpoint, status)));
        }
        Ok(())
    }
}

struct YtMusic(&'static str);

impl CommandHandler for YtMusic {
    fn execute(&self, ctx: &mut ActionContext<'_>) -> ActionResult {
        let base: String = ctx.store.get_entry("apis", "ytmusic", YTMUSIC_API.to_string());
        YtMusicClient::new(base)?.send(self.0)?;
        Ok(None)
    }
}

pub fn register(registry: &mut ActionRegistry) {
    for command in MediaCommand::iter() {
        registry.register(command.media_phrase(), DesktopMedia(command));
        let (phrase, endpoint) = command.music_phrase();
        registry.register(phrase, YtMusic(endpoint));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAYERS: &str = "firefox.instance_1_23\nspotifyd.instance4321\nvlc\n";

    #[test]
    fn test_pick_player_priority() {
        assert_eq!(pick_player(PLAYERS, None).as_deref(), Some("spotifyd.instance4321"));
        assert_eq!(pick_player("vlc\nmpv\n", None).as_deref(), Some("vlc"));
        assert_eq!(pick_player("", None), None);
    }

    #[test]
    fn test_pick_preferred_player() {
        assert_eq!(pick_player(PLAYERS, Some("firefox")).as_deref(), Some("firefox.instance_1_23"));
        assert_eq!(pick_player(PLAYERS, Some("mpv")), None);
    }

    #[test]
    fn test_playerctl_verbs() {
        let verbs: Vec<String> = MediaCommand::iter().map(|c| c.to_string()).collect();
        assert_eq!(verbs, vec!["play-pause", "next", "previous"]);
    }

    #[test]
    fn test_ytmusic_url() {
        let client = YtMusicClient::new("http://localhost:26538/api/v1/").unwrap();
        assert_eq!(client.url("toggle-play"), "http://localhost:26538/api/v1/toggle-play");
    }

    #[test]
    fn test_registered_phrases() {
        let mut registry = ActionRegistry::new();
        register(&mut registry);
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(
            names,
            vec![
                "toggle media",
                "toggle youtube music",
                "next media track",
                "next music track",
                "previous media track",
                "previous music track"
            ]
        );
    }
}

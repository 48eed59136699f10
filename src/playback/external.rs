// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{
    error::Error,
    ffi::OsString,
    fmt,
    io::Write,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use parking_lot::Mutex;
use tokio::{process::Command, runtime::Handle};
use tracing::{debug, error, info, warn};

use super::PlaybackError;
use crate::{
    config,
    sounds::{Asset, SoundBank, SoundId},
};

/// An audio player found on the PATH.
#[derive(Clone, Debug)]
struct Player {
    name: String,
    path: PathBuf,
}

impl Player {
    /// Finds the first of the given players that is installed.
    fn find(players: &[String]) -> Result<Player, PlaybackError> {
        players
            .iter()
            .find_map(|name| {
                which::which(name).ok().map(|path| Player {
                    name: name.clone(),
                    path,
                })
            })
            .ok_or_else(|| PlaybackError::NoPlayer(players.join(", ")))
    }

    /// The command line for playing the file at the given gain.
    fn args(&self, file: &Path, gain: f32) -> Vec<OsString> {
        let gain = gain.clamp(0.0, 1.0);
        let kind = Path::new(&self.name)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.name);
        let mut args: Vec<OsString> = match kind {
            "paplay" => vec![format!("--volume={}", (gain * 65536.0).round() as u32).into()],
            "ffplay" => ["-nodisp", "-autoexit", "-loglevel", "error", "-volume"]
                .into_iter()
                .map(OsString::from)
                .chain([((gain * 100.0).round() as u32).to_string().into()])
                .collect(),
            "aplay" => vec!["-q".into()],
            _ => Vec::new(),
        };
        args.push(file.as_os_str().to_os_string());
        args
    }
}

/// A file handed to a player.
#[derive(Debug)]
struct Launch {
    path: PathBuf,
    /// True if the file was materialized and will be deleted.
    temporary: bool,
}

/// Writes a packaged asset out to a temporary file that keeps its extension.
/// Files on disk are played where they are.
async fn materialize(asset: &Asset) -> Result<Launch, PlaybackError> {
    match asset {
        Asset::File(path) => match tokio::fs::metadata(path).await {
            Ok(metadata) if metadata.is_file() => Ok(Launch {
                path: path.clone(),
                temporary: false,
            }),
            _ => Err(PlaybackError::MissingAsset(path.display().to_string())),
        },
        Asset::Packaged(_) => {
            let data = asset.load()?;
            let suffix = format!(".{}", asset.extension());
            let path = tokio::task::spawn_blocking(move || -> Result<PathBuf, PlaybackError> {
                let mut file = tempfile::Builder::new()
                    .prefix("bandhub-")
                    .suffix(&suffix)
                    .tempfile()?;
                file.write_all(&data)?;
                file.flush()?;
                let (_, path) = file.keep().map_err(|e| PlaybackError::Io(e.error))?;
                Ok(path)
            })
            .await
            .map_err(|e| PlaybackError::Runtime(e.to_string()))??;
            Ok(Launch {
                path,
                temporary: true,
            })
        }
    }
}

/// One queued play: everything needed to start the player off the caller's
/// thread.
struct Job {
    sound: SoundId,
    gain: f32,
    asset: Asset,
    player: Player,
    cleanup_delay: Duration,
}

impl Job {
    /// Materializes the asset, spawns the player and schedules its reaping and
    /// the temporary file's removal.
    async fn run(self) -> Result<Launch, PlaybackError> {
        let launch = materialize(&self.asset).await?;

        let spawned = Command::new(&self.player.path)
            .args(self.player.args(&launch.path, self.gain))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                if launch.temporary {
                    let _ = tokio::fs::remove_file(&launch.path).await;
                }
                return Err(e.into());
            }
        };

        let sound = self.sound;
        let player = self.player.name;
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => debug!(player, %sound, "Player finished."),
                Ok(status) => warn!(player, %sound, %status, "Player exited unsuccessfully."),
                Err(e) => warn!(player, %sound, err = %e, "Unable to wait for player."),
            }
        });

        // The file goes away after a fixed delay whether or not the player is
        // done with it.
        if launch.temporary {
            let path = launch.path.clone();
            let delay = self.cleanup_delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    warn!(path = %path.display(), err = %e, "Unable to remove temporary file.");
                }
            });
        }

        Ok(launch)
    }
}

/// Plays each sound with a detached external player process.
pub struct Backend {
    bank: SoundBank,
    players: Vec<String>,
    /// Looked up again on each play until one is found.
    player: Mutex<Option<Player>>,
    cleanup_delay: Duration,
    runtime: Handle,
}

impl Backend {
    /// Must be called from within a tokio runtime, which runs the players.
    /// A missing player is not fatal: plays fail until one is installed.
    pub fn new(config: &config::ExternalPlayback, bank: SoundBank) -> Result<Backend, Box<dyn Error>> {
        let runtime = Handle::try_current().map_err(|e| PlaybackError::Runtime(e.to_string()))?;
        let players = config.players();
        let player = match Player::find(&players) {
            Ok(player) => {
                info!(player = player.name, path = %player.path.display(), "Using external player.");
                Some(player)
            }
            Err(e) => {
                warn!(err = %e, "No external player installed, sounds will not play.");
                None
            }
        };

        Ok(Backend {
            bank,
            players,
            player: Mutex::new(player),
            cleanup_delay: config.cleanup_delay()?,
            runtime,
        })
    }

    fn player(&self) -> Result<Player, PlaybackError> {
        let mut player = self.player.lock();
        if let Some(player) = player.as_ref() {
            return Ok(player.clone());
        }
        let found = Player::find(&self.players)?;
        info!(player = found.name, path = %found.path.display(), "Using external player.");
        *player = Some(found.clone());
        Ok(found)
    }

    fn job(&self, sound: SoundId, gain: f32) -> Result<Job, PlaybackError> {
        Ok(Job {
            sound,
            gain,
            asset: self.bank.asset(sound),
            player: self.player()?,
            cleanup_delay: self.cleanup_delay,
        })
    }
}

impl super::Backend for Backend {
    fn play(&self, sound: SoundId, gain: f32) -> Result<(), PlaybackError> {
        let job = self.job(sound, gain)?;
        self.runtime.spawn(async move {
            match job.run().await {
                Ok(launch) => {
                    debug!(%sound, gain, path = %launch.path.display(), "Launched player.")
                }
                Err(e) => error!(%sound, err = %e, "Unable to launch player."),
            }
        });
        Ok(())
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.player.lock().as_ref() {
            Some(player) => write!(f, "{} (External)", player.name),
            None => write!(f, "no player (External)"),
        }
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, ffi::OsString, fs, path::Path};

    use super::{Backend, Player};
    use crate::{
        config::ExternalPlayback,
        playback::{Backend as _, PlaybackError},
        sounds::{DrumPiece, PianoNote, SoundBank, SoundId},
        testutil::eventually_async,
    };

    fn player(name: &str) -> Player {
        Player {
            name: name.to_string(),
            path: name.into(),
        }
    }

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_player_args() {
        let file = Path::new("/tmp/piano_c.wav");
        assert_eq!(
            strings(player("paplay").args(file, 0.5)),
            vec!["--volume=32768", "/tmp/piano_c.wav"]
        );
        assert_eq!(
            strings(player("/usr/bin/ffplay").args(file, 1.0)),
            vec![
                "-nodisp",
                "-autoexit",
                "-loglevel",
                "error",
                "-volume",
                "100",
                "/tmp/piano_c.wav"
            ]
        );
        assert_eq!(
            strings(player("aplay").args(file, 0.2)),
            vec!["-q", "/tmp/piano_c.wav"]
        );
        assert_eq!(strings(player("play").args(file, 1.0)), vec!["/tmp/piano_c.wav"]);
    }

    #[test]
    fn test_no_player() {
        assert!(matches!(
            Player::find(&["bandhub-no-such-player".to_string()]),
            Err(PlaybackError::NoPlayer(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_packaged_asset_is_cleaned_up() -> Result<(), Box<dyn Error>> {
        let config = ExternalPlayback::new(vec!["true".to_string()], Some("200ms"));
        let backend = Backend::new(&config, SoundBank::packaged())?;

        let launch = backend.job(SoundId::Piano(PianoNote::C), 1.0)?.run().await?;
        assert!(launch.temporary);
        assert_eq!(
            launch.path.extension().and_then(|ext| ext.to_str()),
            Some("wav")
        );
        assert!(launch.path.exists());

        let path = launch.path.clone();
        eventually_async(
            || {
                let path = path.clone();
                async move { !path.exists() }
            },
            "temporary file was never removed",
        )
        .await;
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_directory_asset_is_played_in_place() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let sound = SoundId::Piano(PianoNote::D);
        fs::write(dir.path().join(sound.file_name()), b"RIFF")?;

        let config = ExternalPlayback::new(vec!["true".to_string()], Some("10ms"));
        let backend = Backend::new(&config, SoundBank::from_directory(dir.path()))?;

        let launch = backend.job(sound, 0.5)?.run().await?;
        assert!(!launch.temporary);
        assert_eq!(launch.path, dir.path().join("piano_d.wav"));

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(launch.path.exists());

        assert!(matches!(
            backend.job(SoundId::Piano(PianoNote::E), 0.5)?.run().await,
            Err(PlaybackError::MissingAsset(_))
        ));

        // A missing file is reported from the queued job, not the trigger.
        backend.play(SoundId::Piano(PianoNote::E), 0.5)?;
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_missing_player_fails_per_trigger() -> Result<(), Box<dyn Error>> {
        let config = ExternalPlayback::new(vec!["bandhub-no-such-player".to_string()], None);
        let backend = Backend::new(&config, SoundBank::packaged())?;
        assert_eq!(backend.to_string(), "no player (External)");

        for _ in 0..2 {
            assert!(matches!(
                backend.play(SoundId::Drum(DrumPiece::Kick), 1.0),
                Err(PlaybackError::NoPlayer(_))
            ));
        }
        Ok(())
    }
}

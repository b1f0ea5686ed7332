// SPDX-License-Identifier: GPL-3.0-only

//! Audio playback and capture through the `tinyalsa` command line tools
//!
//! The board's sound card is driven with `tinyplay` and `tinycap`. The card
//! can only be held by one process at a time, so every call first kills
//! whatever still has `/dev/snd/*` open (usually a previous run that died).

use crate::config::AudioConfig;
use crate::constants;
use crate::errors::AudioError;
use crate::backends::system::SystemCommand;
use std::collections::BTreeSet;
use std::path::Path;
use std::process::Output;
use tracing::{debug, info, warn};

/// Something that can play and record WAV files
///
/// Implemented by [`Audio`] for the real hardware; the control loop only
/// depends on this trait.
pub trait AudioBackend {
    /// Play a WAV file, blocking until playback ends
    fn play(&mut self, path: &Path) -> Result<(), AudioError>;

    /// Record `duration_secs` seconds into a WAV file
    fn record(&mut self, path: &Path, duration_secs: u32) -> Result<(), AudioError>;
}

/// `tinyplay` / `tinycap` driver
#[derive(Debug, Clone, Default)]
pub struct Audio {
    config: AudioConfig,
}

impl Audio {
    pub fn new(config: AudioConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    /// `tinyplay <file> -D <card> -d <device>`
    pub fn play_command(&self, path: &Path) -> SystemCommand {
        SystemCommand::privileged(self.config.use_sudo, "tinyplay")
            .arg(path.to_string_lossy())
            .args(["-D".to_string(), self.config.card.to_string()])
            .args(["-d".to_string(), self.config.device_play.to_string()])
    }

    /// `tinycap <file> -D <card> -d <device> -c <ch> -r <rate> -b <bits> -p <size> -n <count> -t <secs>`
    pub fn record_command(&self, path: &Path, duration_secs: u32) -> SystemCommand {
        let c = &self.config;
        SystemCommand::privileged(c.use_sudo, "tinycap")
            .arg(path.to_string_lossy())
            .args(["-D".to_string(), c.card.to_string()])
            .args(["-d".to_string(), c.device_rec.to_string()])
            .args(["-c".to_string(), c.channels.to_string()])
            .args(["-r".to_string(), c.rate.to_string()])
            .args(["-b".to_string(), c.bits.to_string()])
            .args(["-p".to_string(), c.fragment_size.to_string()])
            .args(["-n".to_string(), c.fragments.to_string()])
            .args(["-t".to_string(), duration_secs.to_string()])
    }

    /// `lsof <device>...`, the expanded form of `lsof /dev/snd/*`
    pub fn lsof_command(&self, devices: &[String]) -> SystemCommand {
        SystemCommand::privileged(self.config.use_sudo, "lsof").args(devices.iter().cloned())
    }

    /// `kill -9 <pid>...`
    pub fn kill_command(&self, pids: &BTreeSet<u32>) -> SystemCommand {
        SystemCommand::kill(self.config.use_sudo, pids)
    }

    /// Kill every process holding a sound device
    ///
    /// Best effort: a missing `lsof`, a timeout or a failed kill are logged at
    /// debug level and otherwise ignored.
    pub fn cleanup_audio_devices(&self) {
        if !self.config.cleanup_conflicts {
            return;
        }

        let devices = sound_devices(Path::new(constants::audio::SOUND_DEVICE_DIR));
        if devices.is_empty() {
            debug!("No sound device nodes, skipping cleanup");
            return;
        }

        let lsof = self.lsof_command(&devices);
        let output = match lsof.output_with_timeout(constants::audio::CLEANUP_TIMEOUT) {
            Ok(Some(output)) => output,
            Ok(None) => {
                debug!(command = %lsof, "lsof timed out");
                return;
            }
            Err(e) => {
                debug!(command = %lsof, error = %e, "lsof unavailable");
                return;
            }
        };

        let pids = pids_to_kill(&output);
        if pids.is_empty() {
            return;
        }

        info!(?pids, "Releasing sound devices held by other processes");
        self.kill_command(&pids).run_quiet();
    }
}

impl AudioBackend for Audio {
    fn play(&mut self, path: &Path) -> Result<(), AudioError> {
        self.cleanup_audio_devices();

        run_tool(&self.play_command(path), AudioError::PlaybackFailed)
            .inspect_err(|_| warn!(file = %path.display(), "tinyplay failed"))?;

        debug!(file = %path.display(), "Playback finished");
        Ok(())
    }

    fn record(&mut self, path: &Path, duration_secs: u32) -> Result<(), AudioError> {
        self.cleanup_audio_devices();

        run_tool(&self.record_command(path, duration_secs), AudioError::RecordingFailed)
            .inspect_err(|_| warn!(file = %path.display(), "tinycap failed"))?;

        debug!(file = %path.display(), duration_secs, "Recording finished");
        Ok(())
    }
}

/// Run an audio tool to completion
///
/// A tool that cannot be started is [`AudioError::SpawnFailed`]; a non-zero
/// exit goes through [`tool_result`].
pub fn run_tool(cmd: &SystemCommand, on_failure: fn(String) -> AudioError) -> Result<(), AudioError> {
    let output = cmd.output().map_err(|e| AudioError::SpawnFailed {
        program: cmd.program().to_string(),
        reason: e.to_string(),
    })?;
    tool_result(&output, on_failure)
}

/// Map a finished tool to a result, carrying its trimmed stderr on failure
pub fn tool_result(output: &Output, on_failure: fn(String) -> AudioError) -> Result<(), AudioError> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    debug!(status = %output.status, stderr = %stderr, "Audio tool failed");
    Err(on_failure(stderr))
}

/// Device nodes under `dir`, sorted
pub fn sound_devices(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut devices: Vec<String> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path().to_string_lossy().into_owned())
        .collect();
    devices.sort();
    devices
}

/// PIDs to kill from a finished `lsof`
///
/// `lsof` exits non-zero when nothing holds the devices, so only a successful
/// run yields PIDs.
pub fn pids_to_kill(output: &Output) -> BTreeSet<u32> {
    if !output.status.success() {
        return BTreeSet::new();
    }
    parse_lsof_pids(&String::from_utf8_lossy(&output.stdout))
}

/// Extract the PID column from `lsof` output
///
/// The PID is the second whitespace-separated field. Lines where it does not
/// parse (the header, blank lines) are skipped. Duplicates collapse because a
/// process usually holds several device nodes.
pub fn parse_lsof_pids(output: &str) -> BTreeSet<u32> {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .filter_map(|field| field.parse::<u32>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_play_command() {
        let audio = Audio::default();
        let cmd = audio.play_command(Path::new("beep.wav"));
        assert_eq!(
            cmd.argv(),
            vec!["sudo", "tinyplay", "beep.wav", "-D", "0", "-d", "0"]
        );
    }

    #[test]
    fn test_record_command() {
        let audio = Audio::default();
        let cmd = audio.record_command(Path::new("user.wav"), 2);
        assert_eq!(
            cmd.argv(),
            vec![
                "sudo", "tinycap", "user.wav", "-D", "0", "-d", "1", "-c", "4", "-r", "48000",
                "-b", "16", "-p", "512", "-n", "4", "-t", "2",
            ]
        );
    }

    #[test]
    fn test_commands_without_sudo() {
        let audio = Audio::new(AudioConfig {
            use_sudo: false,
            ..Default::default()
        });
        assert_eq!(audio.play_command(Path::new("a.wav")).program(), "tinyplay");
        let devices = vec!["/dev/snd/controlC0".to_string(), "/dev/snd/pcmC0D0p".to_string()];
        assert_eq!(
            audio.lsof_command(&devices).argv(),
            vec!["lsof", "/dev/snd/controlC0", "/dev/snd/pcmC0D0p"]
        );
    }

    #[test]
    fn test_kill_command_lists_sorted_pids() {
        let audio = Audio::default();
        let pids: BTreeSet<u32> = [812, 77].into_iter().collect();
        assert_eq!(
            audio.kill_command(&pids).argv(),
            vec!["sudo", "kill", "-9", "77", "812"]
        );
    }

    #[test]
    fn test_parse_lsof_pids() {
        let output = "\
COMMAND   PID USER   FD   TYPE DEVICE SIZE/OFF NODE NAME
pulseaudi 812 root  mem    CHR  116,5           433 /dev/snd/pcmC0D0p
pulseaudi 812 root   29u   CHR 116,12      0t0  440 /dev/snd/controlC0
tinycap    77 root    3u   CHR  116,6      0t0  434 /dev/snd/pcmC0D1c

";
        let pids = parse_lsof_pids(output);
        assert_eq!(pids.into_iter().collect::<Vec<_>>(), vec![77, 812]);
    }

    #[test]
    fn test_parse_lsof_pids_ignores_garbage() {
        assert!(parse_lsof_pids("").is_empty());
        assert!(parse_lsof_pids("lsof: WARNING: can't stat() fuse.gvfsd-fuse").is_empty());
        assert!(parse_lsof_pids("single").is_empty());
    }

    #[test]
    fn test_cleanup_disabled_is_noop() {
        let audio = Audio::new(AudioConfig {
            cleanup_conflicts: false,
            ..Default::default()
        });
        // Must return immediately without touching the system
        audio.cleanup_audio_devices();
    }

    #[cfg(unix)]
    fn shell_output(script: &str) -> Output {
        SystemCommand::new("sh").args(["-c", script]).output().unwrap()
    }

    #[cfg(unix)]
    #[test]
    fn test_tool_failure_carries_stderr() {
        let output = shell_output("echo 'device busy' >&2; exit 1");
        assert_eq!(
            tool_result(&output, AudioError::PlaybackFailed),
            Err(AudioError::PlaybackFailed("device busy".to_string()))
        );
        assert_eq!(
            tool_result(&output, AudioError::RecordingFailed),
            Err(AudioError::RecordingFailed("device busy".to_string()))
        );

        let output = shell_output("echo ignored >&2; exit 0");
        assert_eq!(tool_result(&output, AudioError::PlaybackFailed), Ok(()));
    }

    #[test]
    fn test_missing_tool_is_spawn_failure() {
        let cmd = SystemCommand::privileged(false, "tinyplay-not-installed-robot-brain").arg("beep.wav");
        match run_tool(&cmd, AudioError::PlaybackFailed) {
            Err(AudioError::SpawnFailed { program, .. }) => {
                assert_eq!(program, "tinyplay-not-installed-robot-brain")
            }
            other => panic!("expected spawn failure, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_lsof_kills_nothing() {
        let listing = "echo 'COMMAND PID USER'; echo 'tinycap 77 root'";

        let output = shell_output(&format!("{}; exit 1", listing));
        assert!(pids_to_kill(&output).is_empty());

        let output = shell_output(&format!("{}; exit 0", listing));
        assert_eq!(pids_to_kill(&output).into_iter().collect::<Vec<_>>(), vec![77]);
    }

    #[test]
    fn test_sound_devices_lists_directory() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["pcmC0D1c", "controlC0", "pcmC0D0p"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }

        let devices = sound_devices(dir.path());
        let names: Vec<_> = devices
            .iter()
            .map(|d| Path::new(d).file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["controlC0", "pcmC0D0p", "pcmC0D1c"]);

        assert!(sound_devices(&dir.path().join("missing")).is_empty());
    }
}

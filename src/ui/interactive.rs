use anyhow::{bail, Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use std::time::Duration;

use crate::config::PlayerConfig;
use crate::core::events::PlayerEvent;
use crate::core::player::Player;
use crate::core::presentation::PlayerState;
use crate::shared::constants;
use crate::utils::logger;
use crate::utils::terminal_control::{self, TerminalGuard};
use crate::utils::time_utils::format_timestamp;

/// Terminal playback with keyboard transport controls.
///
/// Space toggles pause, Left/Right seek by [`constants::SEEK_STEP_SECS`],
/// Home rewinds, q or Esc quits.
pub fn run(config: PlayerConfig, source: &str) -> Result<()> {
    let player = Player::new(config)?;
    player
        .open_video(source)
        .with_context(|| format!("failed to open {}", source))?;

    let guard = TerminalGuard::enter()?;
    if !guard.is_active() {
        bail!("interactive playback needs a terminal; use `bench` for headless runs");
    }

    let refresh = Duration::from_millis(constants::STATUS_REFRESH_MS);
    let mut message = String::new();

    loop {
        for event in player.events().try_iter() {
            if let Some(text) = describe(&event) {
                message = text;
            }
        }
        terminal_control::write_status(&status_line(&player.state(), &message));

        if !event::poll(refresh)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => break,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => break,
            KeyCode::Char(' ') => {
                if player.is_playing() {
                    player.pause()?;
                } else if let Err(e) = player.play() {
                    message = e.to_string();
                }
            }
            KeyCode::Left => {
                let target = (player.current_time() - constants::SEEK_STEP_SECS).max(0.0);
                player.seek_async(target)?;
            }
            KeyCode::Right => {
                let state = player.state();
                let mut target = state.current_time + constants::SEEK_STEP_SECS;
                if state.duration > 0.0 {
                    target = target.min(state.duration);
                }
                player.seek_async(target)?;
            }
            KeyCode::Home => player.seek_async(0.0)?,
            _ => {}
        }
    }

    drop(guard);
    let state = player.state();
    logger::info(&format!(
        "Interactive session ended at {}: {} displayed, {} stutters",
        format_timestamp(state.current_time),
        state.stats.frames_displayed(),
        state.stutter_count()
    ));
    Ok(())
}

fn describe(event: &PlayerEvent) -> Option<String> {
    match event {
        PlayerEvent::FirstFrame { load_ms } => Some(format!("first frame in {:.0} ms", load_ms)),
        PlayerEvent::Stutter(s) => Some(format!(
            "stutter {:.0} ms at {}",
            s.duration_ms,
            format_timestamp(s.video_time)
        )),
        PlayerEvent::SeekCompleted { landed, .. } => {
            Some(format!("seeked to {}", format_timestamp(*landed)))
        }
        PlayerEvent::SeekFailed { message, .. } => Some(format!("seek failed: {}", message)),
        PlayerEvent::Finished(report) => Some(format!(
            "finished: {} frames, {} dropped",
            report.frames_displayed, report.frames_dropped
        )),
        PlayerEvent::Error(message) => Some(message.clone()),
        PlayerEvent::Opened(_) => None,
    }
}

fn status_line(state: &PlayerState, message: &str) -> String {
    let icon = if state.is_loading {
        "…"
    } else if state.is_playing {
        "▶"
    } else {
        "⏸"
    };
    let mut line = format!(
        "{} {} / {}  dropped {}  stutters {} ({:.0} ms)",
        icon,
        format_timestamp(state.current_time),
        format_timestamp(state.duration),
        state.stats.frames_dropped(),
        state.stutter_count(),
        state.total_stutter_ms()
    );
    if !message.is_empty() {
        line.push_str("  | ");
        line.push_str(message);
    }
    line
}

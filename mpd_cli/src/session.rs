//! Drive an [`MpdClient`] from the command line
//!
//! The client itself never blocks for long; this module owns the caller
//! loop around it: ticking, answering password requests, periodic refreshes
//! and saving finished cover art.

use crate::error::{CliError, CliResult};
use crate::output::{NowPlaying, OutputFormatter};
use crate::password::PasswordSource;
use log::{debug, info, warn};
use mpd_client_core::protocol::LOOP_SLEEP_TIME_MS;
use mpd_client_core::{ArtBuffer, ClientConfig, MpdClient};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Extensions a previous cover may have been saved with
const COVER_EXTENSIONS: [&str; 5] = ["jpg", "png", "gif", "webp", "bin"];

/// Install a SIGINT/SIGTERM handler that raises the returned flag
pub fn install_signal_handler() -> CliResult<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&flag);
    ctrlc::set_handler(move || {
        info!("Received interrupt signal, stopping");
        handler_flag.store(true, Ordering::SeqCst);
    })
    .map_err(|e| CliError::general(&format!("Failed to set signal handler: {e}")))?;
    Ok(flag)
}

/// Options for [`Session::watch`]
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Directory to save `cover.<ext>` into
    pub art_dir: Option<PathBuf>,
    /// Stop once the first track's art fetch has settled
    pub once_art: bool,
    pub update_interval: Duration,
}

/// One client plus what the caller loop needs around it
pub struct Session {
    client: MpdClient,
    password: PasswordSource,
    shutdown: Arc<AtomicBool>,
    tick_sleep: Duration,
}

impl Session {
    pub fn new(
        config: ClientConfig,
        password: PasswordSource,
        shutdown: Arc<AtomicBool>,
    ) -> CliResult<Self> {
        config
            .validate()
            .map_err(|e| CliError::config(&e.to_string()))?;

        Ok(Self {
            client: MpdClient::new(config),
            password,
            shutdown,
            tick_sleep: Duration::from_millis(LOOP_SLEEP_TIME_MS),
        })
    }

    pub fn client(&self) -> &MpdClient {
        &self.client
    }

    fn interrupted(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Run one update and answer a password request if one came up
    pub fn tick(&mut self) -> CliResult<()> {
        self.client.update();

        if !self.client.is_ok() {
            let reason = self.client.last_error().unwrap_or("connection failed");
            return Err(CliError::connection(reason));
        }

        if self.client.needs_auth() {
            info!("Server requested a password");
            let password = self.password.resolve()?;
            self.client.attempt_auth(password)?;
        }
        Ok(())
    }

    /// Tick until a full poll cycle is done and the art fetch has settled
    ///
    /// Fails if no poll completes within `timeout`. Art still downloading
    /// at the deadline is left out.
    pub fn poll_once(&mut self, timeout: Duration) -> CliResult<NowPlaying> {
        let deadline = Instant::now() + timeout;

        loop {
            if self.interrupted() {
                return Err(CliError::interrupted());
            }
            self.tick()?;

            let polled = self.client.has_polled();
            if polled && self.art_settled() {
                break;
            }
            if Instant::now() >= deadline {
                if polled {
                    debug!("Deadline reached with art still pending");
                    break;
                }
                return Err(CliError::connection(&format!(
                    "Timed out after {}ms waiting for MPD status",
                    timeout.as_millis()
                )));
            }
            thread::sleep(self.tick_sleep);
        }

        Ok(NowPlaying::from_client(&self.client))
    }

    fn art_settled(&self) -> bool {
        let state = self.client.state();
        !self.client.song().has_file() || !state.art_pending || state.art_failed
    }

    /// Keep the view current until interrupted
    ///
    /// Prints whenever the displayed track, state or art changes.
    pub fn watch(
        &mut self,
        formatter: &dyn OutputFormatter,
        options: &WatchOptions,
        out: &mut dyn Write,
    ) -> CliResult<()> {
        let mut last_refresh = Instant::now();
        let mut last_view: Option<NowPlaying> = None;
        let mut saved_for: Option<String> = None;
        let mut saved_path: Option<PathBuf> = None;

        while !self.interrupted() {
            self.tick()?;

            if last_refresh.elapsed() >= options.update_interval {
                self.client.request_data_update();
                last_refresh = Instant::now();
            }

            let filename = self.client.filename().to_string();
            if saved_for.as_deref() != Some(filename.as_str()) {
                saved_path = None;
                if let (Some(dir), Some(_)) = (&options.art_dir, self.client.art_bytes()) {
                    let path = save_art(dir, self.client.art())
                        .map_err(|e| CliError::from_io_error(e, &dir.display().to_string()))?;
                    info!("Saved cover art for {filename} to {}", path.display());
                    saved_path = Some(path);
                    saved_for = Some(filename.clone());
                }
            }

            if self.client.has_polled() {
                let view = NowPlaying::from_client(&self.client).with_saved_art(saved_path.clone());
                if last_view.as_ref().is_none_or(|last| !last.same_track_view(&view)) {
                    let mut text = formatter.format(&view)?;
                    if !text.ends_with('\n') {
                        text.push('\n');
                    }
                    out.write_all(text.as_bytes())
                        .and_then(|_| out.flush())
                        .map_err(|e| CliError::from_io_error(e, "stdout"))?;
                    last_view = Some(view);
                }

                if options.once_art && !filename.is_empty() && self.art_settled() {
                    debug!("Art settled for {filename}, stopping");
                    return Ok(());
                }
            }

            thread::sleep(self.tick_sleep);
        }

        info!("Watch stopped");
        Ok(())
    }
}

/// Write finished art to `<dir>/cover.<ext>`, replacing older covers
pub fn save_art(dir: &Path, art: &ArtBuffer) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let ext = art.file_extension();
    let path = dir.join(format!("cover.{ext}"));
    let partial = dir.join(format!(".cover.{ext}.part"));

    fs::write(&partial, art.data())?;
    fs::rename(&partial, &path)?;

    for stale in COVER_EXTENSIONS.iter().filter(|e| **e != ext) {
        let old = dir.join(format!("cover.{stale}"));
        if old.exists()
            && let Err(e) = fs::remove_file(&old)
        {
            warn!("Could not remove {}: {e}", old.display());
        }
    }
    Ok(path)
}

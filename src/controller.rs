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
use std::error::Error;
use std::io;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{error, info, span, Instrument, Level};

use crate::mixer::MixerControl;

pub mod keyboard;

/// Mixer control events.
#[derive(Debug, PartialEq)]
pub enum Event {
    /// Sets an instrument's volume, in percent.
    SetVolume { instrument: String, percent: i32 },

    /// Mutes or unmutes an instrument.
    SetMute { instrument: String, muted: bool },
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Applies events from a driver to the mixer.
pub struct Controller {
    handle: JoinHandle<()>,
}

impl Controller {
    /// Creates a new controller with the given driver.
    pub fn new(
        mixer: Arc<dyn MixerControl>,
        driver: Arc<dyn Driver>,
    ) -> Result<Controller, Box<dyn Error>> {
        Ok(Controller {
            handle: tokio::spawn(
                Controller::apply_events(mixer, driver).instrument(span!(Level::INFO, "controller")),
            ),
        })
    }

    /// Join will block until the controller finishes.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    /// Watches the driver and applies its events until it stops sending them.
    async fn apply_events(mixer: Arc<dyn MixerControl>, driver: Arc<dyn Driver>) {
        let (events_tx, mut events_rx) = mpsc::channel(1);
        let join_handle = driver.monitor_events(events_tx);

        info!("Controller started.");

        while let Some(event) = events_rx.recv().await {
            info!(event = format!("{:?}", event), "Received event.");

            if let Err(e) = match &event {
                Event::SetVolume {
                    instrument,
                    percent,
                } => mixer.set_volume(instrument, *percent),
                Event::SetMute { instrument, muted } => mixer.set_mute(instrument, *muted),
            } {
                error!(err = %e, "Error talking to mixer.");
            }
        }

        info!("Controller closing.");
        match join_handle.await {
            Ok(Err(e)) => error!(err = %e, "Event monitor failed."),
            Err(e) => error!(err = %e, "Error waiting for event monitor to stop."),
            Ok(Ok(())) => {}
        }
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, io, sync::Arc};

    use parking_lot::Mutex;
    use tokio::{sync::mpsc::Sender, task::JoinHandle};

    use super::{Controller, Driver, Event};
    use crate::{instruments::Instrument, mixer::MixerState};

    /// Sends a fixed list of events, then stops.
    struct TestDriver {
        events: Mutex<Vec<Event>>,
    }

    impl Driver for TestDriver {
        fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
            let events = std::mem::take(&mut *self.events.lock());
            tokio::spawn(async move {
                for event in events {
                    events_tx
                        .send(event)
                        .await
                        .map_err(|e| io::Error::new(io::ErrorKind::BrokenPipe, e.to_string()))?;
                }
                Ok(())
            })
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_controller() -> Result<(), Box<dyn Error>> {
        let mixer = Arc::new(MixerState::new());
        let driver = Arc::new(TestDriver {
            events: Mutex::new(vec![
                Event::SetVolume {
                    instrument: "piano".to_string(),
                    percent: 40,
                },
                Event::SetMute {
                    instrument: "GUITAR".to_string(),
                    muted: true,
                },
                // Rejected by the mixer, doesn't stop the controller.
                Event::SetMute {
                    instrument: "BASS".to_string(),
                    muted: true,
                },
                Event::SetVolume {
                    instrument: "DRUM".to_string(),
                    percent: 250,
                },
            ]),
        });

        let mut controller = Controller::new(mixer.clone(), driver)?;
        controller.join().await?;

        assert_eq!(mixer.channel(Instrument::Piano).volume_percent(), 40);
        assert!(mixer.channel(Instrument::Guitar).is_muted());
        assert_eq!(mixer.channel(Instrument::Drum).volume_percent(), 100);
        assert!(!mixer.channel(Instrument::Drum).is_muted());
        Ok(())
    }
}

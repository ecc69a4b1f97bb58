//! A minimal image viewer GUI.
//!
//! [`run`] turns the calling (main) thread into the GUI thread and runs the application on a
//! second thread. The application shows frames with [`show_image`] and picks up keyboard input and
//! window closes with [`poll_events`].

mod renderer;

use std::{
    collections::{HashMap, HashSet},
    panic::{catch_unwind, AssertUnwindSafe},
    process,
    sync::{
        mpsc::{self, Receiver, Sender},
        Mutex,
    },
};

use anyhow::anyhow;
use once_cell::sync::OnceCell;
use winit::{
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopBuilder, EventLoopProxy},
    window::WindowId,
};

use crate::{image::Image, resolution::Resolution, termination::Termination};

use self::renderer::{Gpu, Renderer, Window};

/// User input relevant to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuiEvent {
    /// A character was typed into one of the windows.
    Char(char),
    /// The user closed the window with this title.
    WindowClosed(String),
}

impl GuiEvent {
    /// Returns whether this event asks the application to quit: typing a lowercase `q`, or closing
    /// a window.
    pub fn is_quit(&self) -> bool {
        matches!(self, GuiEvent::Char('q') | GuiEvent::WindowClosed(_))
    }
}

/// Titles of windows the user has closed. Images sent to them are dropped, so that a window does
/// not reappear while the application is still reacting to the close.
#[derive(Debug, Default)]
struct ClosedWindows(HashSet<String>);

impl ClosedWindows {
    fn close(&mut self, title: String) {
        self.0.insert(title);
    }

    fn is_closed(&self, title: &str) -> bool {
        self.0.contains(title)
    }
}

struct Gui {
    gpu: Gpu,
    windows: HashMap<String, Renderer>,
    win_id_to_title: HashMap<WindowId, String>,
    closed: ClosedWindows,
    events: Sender<GuiEvent>,
}

impl Gui {
    fn new(events: Sender<GuiEvent>) -> anyhow::Result<Self> {
        Ok(Self {
            gpu: pollster::block_on(Gpu::open())?,
            windows: HashMap::new(),
            win_id_to_title: HashMap::new(),
            closed: ClosedWindows::default(),
            events,
        })
    }

    fn emit(&self, event: GuiEvent) {
        log::trace!("{event:?}");
        // Nobody is listening once the application is shutting down.
        self.events.send(event).ok();
    }

    fn run(mut self, event_loop: EventLoop<Msg>) -> ! {
        event_loop.run(move |event, target, flow| {
            *flow = ControlFlow::Wait;
            match event {
                Event::UserEvent(Msg::Image { title, .. }) if self.closed.is_closed(&title) => {
                    log::trace!("dropping image for closed window '{title}'");
                }
                Event::UserEvent(Msg::Image { title, res, data }) => {
                    if !self.windows.contains_key(&title) {
                        log::debug!("creating window '{title}' at {res}");
                        let renderer = Window::open(target, &title, res)
                            .and_then(|win| Renderer::new(win, &self.gpu));
                        match renderer {
                            Ok(renderer) => {
                                self.win_id_to_title
                                    .insert(renderer.window().id(), title.clone());
                                self.windows.insert(title.clone(), renderer);
                            }
                            Err(e) => fatal(e.context(format!("failed to open window '{title}'"))),
                        }
                    }

                    if let Some(renderer) = self.windows.get_mut(&title) {
                        renderer.update_texture(&self.gpu, res, &data);
                        renderer.window().request_redraw();
                    }
                }
                Event::RedrawRequested(id) => {
                    let renderer = self
                        .win_id_to_title
                        .get(&id)
                        .and_then(|title| self.windows.get_mut(title));
                    if let Some(renderer) = renderer {
                        renderer.redraw(&self.gpu);
                    }
                }
                Event::WindowEvent { window_id, event } => match event {
                    WindowEvent::ReceivedCharacter(c) => self.emit(GuiEvent::Char(c)),
                    WindowEvent::CloseRequested => {
                        if let Some(title) = self.win_id_to_title.remove(&window_id) {
                            log::debug!("window '{title}' closed");
                            self.windows.remove(&title);
                            self.closed.close(title.clone());
                            self.emit(GuiEvent::WindowClosed(title));
                        }
                    }
                    _ => {}
                },
                _ => {}
            }
        })
    }
}

#[derive(Debug)]
enum Msg {
    Image {
        title: String,
        res: Resolution,
        data: Vec<u8>,
    },
}

struct Channels {
    proxy: Mutex<EventLoopProxy<Msg>>,
    events: Mutex<Receiver<GuiEvent>>,
}

static CHANNELS: OnceCell<Channels> = OnceCell::new();

fn channels() -> anyhow::Result<&'static Channels> {
    CHANNELS
        .get()
        .ok_or_else(|| anyhow!("GUI is not running (the application must be started with `run`)"))
}

fn fatal(error: anyhow::Error) -> ! {
    log::error!("{error:?}");
    process::exit(1);
}

/// Runs `app` on a background thread while the calling thread runs the GUI.
///
/// Must be called from the main thread. When `app` returns, the process exits with a status
/// derived from its return value (like `main`). A panic in `app` exits with status 101.
pub fn run<F, R>(app: F) -> !
where
    F: FnOnce() -> R + Send + 'static,
    R: Termination + Send,
{
    let event_loop = EventLoopBuilder::with_user_event().build();
    let (sender, receiver) = mpsc::channel();
    let channels = Channels {
        proxy: Mutex::new(event_loop.create_proxy()),
        events: Mutex::new(receiver),
    };
    if CHANNELS.set(channels).is_err() {
        fatal(anyhow!("`run` called twice"));
    }

    let gui = Gui::new(sender).unwrap_or_else(|e| fatal(e.context("failed to initialize GPU")));

    std::thread::spawn(move || {
        // Unwinding drops everything `app` owns before the process exits.
        match catch_unwind(AssertUnwindSafe(app)) {
            Ok(r) => {
                if r.is_success() {
                    process::exit(0);
                } else {
                    r.report(); // prints the error
                    process::exit(1);
                }
            }
            Err(_payload) => {
                // The panic hook has printed the message already, exit like libstd would.
                process::exit(101);
            }
        }
    });

    gui.run(event_loop);
}

/// Displays `image` in the window titled `title`, creating the window on first use.
///
/// The window is not resizable. It keeps the size of the first image shown in it.
pub fn show_image(title: impl Into<String>, image: &Image) -> anyhow::Result<()> {
    // Image data is RGBA8 internally, so it can be uploaded to the GPU as-is.
    let msg = Msg::Image {
        title: title.into(),
        res: image.resolution(),
        data: image.data().to_vec(),
    };

    channels()?
        .proxy
        .lock()
        .map_err(|_| anyhow!("GUI channel poisoned"))?
        .send_event(msg)
        .map_err(|_closed| anyhow!("GUI event loop has exited"))
}

/// Returns all input events received since the last call, without blocking.
///
/// Returns nothing when the GUI is not running.
pub fn poll_events() -> Vec<GuiEvent> {
    let Some(channels) = CHANNELS.get() else {
        return Vec::new();
    };
    match channels.events.lock() {
        Ok(events) => events.try_iter().collect(),
        Err(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quit_events() {
        assert!(GuiEvent::Char('q').is_quit());
        assert!(GuiEvent::WindowClosed("Hand Gesture Tracker".into()).is_quit());

        assert!(!GuiEvent::Char('Q').is_quit());
        assert!(!GuiEvent::Char('w').is_quit());
        assert!(!GuiEvent::Char('\u{11}').is_quit()); // Ctrl+Q
    }

    #[test]
    fn closed_windows_stay_closed() {
        let mut closed = ClosedWindows::default();
        assert!(!closed.is_closed("Hand Gesture Tracker"));

        closed.close("Hand Gesture Tracker".into());
        assert!(closed.is_closed("Hand Gesture Tracker"));
        assert!(!closed.is_closed("debug"));
    }

    #[test]
    fn not_running() {
        assert!(poll_events().is_empty());
        let err = show_image("test", &Image::new(2, 2)).unwrap_err();
        assert!(err.to_string().contains("not running"), "{err}");
    }
}

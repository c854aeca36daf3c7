use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crossterm::cursor::{Hide, Show};
use crossterm::event::{DisableFocusChange, EnableFocusChange};
use crossterm::execute;
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use signal_hook::SigId;
use signal_hook::consts::TERM_SIGNALS;
use thiserror::Error;

use crate::error::WindowError;
use crate::runtime::input::{CrosstermInput, InputSource};
use crate::runtime::{Window, WindowStatus};
use crate::surface::AnsiSurface;

pub type DriverResult<T> = std::result::Result<T, DriverError>;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("window error: {0}")]
    Window(#[from] WindowError),
    #[error("terminal error: {0}")]
    Terminal(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Termination signals routed to the window's shutdown hook. The handlers
/// only record the signal; the driver acts on it from its pump.
struct ShutdownSignals {
    received: Arc<AtomicUsize>,
    ids: Vec<SigId>,
}

impl ShutdownSignals {
    fn install() -> io::Result<Self> {
        let received = Arc::new(AtomicUsize::new(0));
        let mut signals = Self {
            received,
            ids: Vec::new(),
        };
        #[cfg(unix)]
        let hangup = [signal_hook::consts::SIGHUP];
        #[cfg(not(unix))]
        let hangup: [i32; 0] = [];
        for &signal in TERM_SIGNALS.iter().chain(hangup.iter()) {
            let id = signal_hook::flag::register_usize(
                signal,
                Arc::clone(&signals.received),
                signal as usize,
            )?;
            signals.ids.push(id);
        }
        Ok(signals)
    }

    fn received(&self) -> Option<i32> {
        match self.received.load(Ordering::Acquire) {
            0 => None,
            signal => Some(signal as i32),
        }
    }
}

impl Drop for ShutdownSignals {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            let _ = signal_hook::low_level::unregister(id);
        }
    }
}

/// Hosts a [`Window`] in the terminal: raw mode and alternate screen, an
/// [`AnsiSurface`] over stdout, and terminal input pumped into the window
/// until it closes.
///
/// While running, SIGTERM and SIGINT (plus SIGQUIT and SIGHUP on Unix) run
/// the window's shutdown hook ([`Window::handle_process_exit`]) and end the
/// run; [`TerminalDriver::received_signal`] reports which one arrived.
pub struct TerminalDriver<I: InputSource = CrosstermInput> {
    window: Window,
    input: I,
    poll_interval: Duration,
    signals: Option<ShutdownSignals>,
    received_signal: Option<i32>,
}

impl TerminalDriver<CrosstermInput> {
    pub fn new(window: Window) -> Self {
        Self {
            window,
            input: CrosstermInput,
            poll_interval: Duration::from_millis(16),
            signals: None,
            received_signal: None,
        }
    }
}

impl<I: InputSource> TerminalDriver<I> {
    pub fn with_input<J: InputSource>(self, input: J) -> TerminalDriver<J> {
        TerminalDriver {
            window: self.window,
            input,
            poll_interval: self.poll_interval,
            signals: self.signals,
            received_signal: self.received_signal,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Route termination signals to the window's shutdown hook. [`run`]
    /// installs the handlers itself; hosts driving [`pump`] directly call
    /// this once. The handlers are removed when the driver is dropped.
    ///
    /// [`run`]: TerminalDriver::run
    /// [`pump`]: TerminalDriver::pump
    pub fn install_signal_hook(&mut self) -> DriverResult<()> {
        if self.signals.is_none() {
            self.signals = Some(ShutdownSignals::install()?);
        }
        Ok(())
    }

    /// The termination signal that ended the run, if any.
    pub fn received_signal(&self) -> Option<i32> {
        self.received_signal
    }

    pub fn run(mut self) -> DriverResult<()> {
        self.install_signal_hook()?;
        let mut stdout = io::stdout();
        self.enter(&mut stdout)?;
        let result = self.run_inner();
        if self.window.status() == WindowStatus::Open {
            let _ = self.window.close_unexpected();
        }
        self.exit(&mut stdout);
        result
    }

    fn run_inner(&mut self) -> DriverResult<()> {
        let (width, height) = terminal::size()?;
        self.window
            .publish_surface(AnsiSurface::new(io::stdout(), width, height))?;
        self.window.open()?;
        while self.window.status() != WindowStatus::Close && self.received_signal.is_none() {
            self.pump()?;
        }
        Ok(())
    }

    /// Poll the input source once and feed everything it returned to the
    /// window. Returns how many inputs were handled.
    pub fn pump(&mut self) -> DriverResult<usize> {
        if self.check_signals() {
            return Ok(0);
        }
        let inputs = self.input.poll_input(self.poll_interval)?;
        let count = inputs.len();
        for input in inputs {
            match self.window.handle_input(input) {
                Ok(_) => {}
                // refusals are already logged by the window
                Err(
                    WindowError::NotOpen
                    | WindowError::CloseVetoed { .. }
                    | WindowError::CloseInProgress
                    | WindowError::CloseDeferred
                    | WindowError::AlreadyClosed,
                ) => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(count)
    }

    fn check_signals(&mut self) -> bool {
        if self.received_signal.is_some() {
            return true;
        }
        let Some(signal) = self.signals.as_ref().and_then(ShutdownSignals::received) else {
            return false;
        };
        self.received_signal = Some(signal);
        self.window.handle_process_exit();
        true
    }

    fn enter(&self, stdout: &mut impl Write) -> DriverResult<()> {
        terminal::enable_raw_mode().map_err(|err| DriverError::Terminal(err.to_string()))?;
        execute!(
            stdout,
            EnterAlternateScreen,
            EnableFocusChange,
            Hide,
            Clear(ClearType::All)
        )?;
        Ok(())
    }

    fn exit(&self, stdout: &mut impl Write) {
        execute!(stdout, Show, DisableFocusChange, LeaveAlternateScreen).ok();
        terminal::disable_raw_mode().ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use crate::event::{KeyInfo, KeyPressEvent};
    use crate::logging::{Logger, MemorySink};
    use crate::runtime::WindowConfig;
    use crate::runtime::input::{KeyPhase, RawInput};
    use crate::script::Script;

    struct Queued(VecDeque<Vec<RawInput>>);

    impl InputSource for Queued {
        fn poll_input(&mut self, _timeout: Duration) -> io::Result<Vec<RawInput>> {
            Ok(self.0.pop_front().unwrap_or_default())
        }
    }

    struct Stubborn;

    impl Script for Stubborn {
        fn close_queue(&mut self) -> bool {
            false
        }
    }

    fn window() -> Window {
        Window::with_config(WindowConfig::default().with_logger(Logger::new(MemorySink::new())))
    }

    #[test]
    fn pump_feeds_inputs_until_close() {
        let window = window();
        let presses = std::sync::Arc::new(std::sync::Mutex::new(0));
        {
            let presses = presses.clone();
            window.add_event_fn("count", move |_: &KeyPressEvent| {
                *presses.lock().unwrap() += 1;
                Ok(())
            });
        }
        window.open().unwrap();

        let key = RawInput::Key {
            phase: KeyPhase::Press,
            info: KeyInfo::new('a', 65, false),
        };
        let mut driver = TerminalDriver::new(window.clone()).with_input(Queued(VecDeque::from([
            vec![RawInput::FocusGained, key],
            vec![RawInput::CloseRequested],
        ])));

        assert_eq!(driver.pump().unwrap(), 2);
        assert_eq!(*presses.lock().unwrap(), 1);
        assert_eq!(driver.pump().unwrap(), 1);
        assert_eq!(window.status(), WindowStatus::Close);
        assert_eq!(driver.pump().unwrap(), 0);
    }

    #[test]
    fn vetoed_close_request_is_not_an_error() {
        let window = window();
        window.add_script(Stubborn);
        window.open().unwrap();

        let mut driver = TerminalDriver::new(window.clone())
            .with_input(Queued(VecDeque::from([vec![RawInput::CloseRequested]])));
        assert_eq!(driver.pump().unwrap(), 1);
        assert_eq!(window.status(), WindowStatus::Open);

        window.close_unexpected().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn termination_signal_runs_the_shutdown_hook() {
        use crate::script::CloseType;
        use std::sync::{Arc, Mutex};

        struct Recorder(Arc<Mutex<Vec<CloseType>>>);

        impl Script for Recorder {
            fn close(&mut self, close_type: CloseType) {
                self.0.lock().unwrap().push(close_type);
            }
        }

        let closes = Arc::new(Mutex::new(Vec::new()));
        let window = window();
        window.add_script(Stubborn);
        window.add_script(Recorder(Arc::clone(&closes)));
        window.open().unwrap();

        let mut driver =
            TerminalDriver::new(window.clone()).with_input(Queued(VecDeque::new()));
        driver.install_signal_hook().unwrap();
        assert_eq!(driver.pump().unwrap(), 0);
        assert_eq!(window.status(), WindowStatus::Open);

        signal_hook::low_level::raise(signal_hook::consts::SIGHUP).unwrap();
        assert_eq!(driver.pump().unwrap(), 0);
        assert_eq!(driver.received_signal(), Some(signal_hook::consts::SIGHUP));
        assert_eq!(window.status(), WindowStatus::Close);
        assert_eq!(*closes.lock().unwrap(), vec![CloseType::Unexpected]);
    }
}

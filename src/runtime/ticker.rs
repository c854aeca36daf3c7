use std::io;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

/// What the tick callback wants the scheduler to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickControl {
    Continue,
    Stop,
}

/// Fixed-period scheduler running a callback on its own thread.
///
/// The first tick fires immediately. [`Ticker::stop`] returns only after the
/// thread has exited, unless it is called from the tick thread itself.
pub struct Ticker {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
    thread_id: ThreadId,
}

impl Ticker {
    pub fn spawn<F>(name: impl Into<String>, period: Duration, mut tick: F) -> io::Result<Self>
    where
        F: FnMut() -> TickControl + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new().name(name.into()).spawn(move || {
            loop {
                if tick() == TickControl::Stop {
                    break;
                }
                match stop_rx.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        })?;
        let thread_id = handle.thread().id();
        Ok(Self {
            stop_tx,
            handle: Some(handle),
            thread_id,
        })
    }

    pub fn is_current_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            if !self.is_current_thread() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn ticks_until_stopped() {
        let count = Arc::new(AtomicUsize::new(0));
        let ticker = {
            let count = Arc::clone(&count);
            Ticker::spawn("test-ticker", Duration::from_millis(1), move || {
                count.fetch_add(1, Ordering::SeqCst);
                TickControl::Continue
            })
            .unwrap()
        };

        thread::sleep(Duration::from_millis(30));
        ticker.stop();
        let after_stop = count.load(Ordering::SeqCst);
        assert!(after_stop > 0);

        thread::sleep(Duration::from_millis(10));
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn callback_can_stop_the_loop() {
        let count = Arc::new(AtomicUsize::new(0));
        let ticker = {
            let count = Arc::clone(&count);
            Ticker::spawn("test-ticker", Duration::from_millis(1), move || {
                if count.fetch_add(1, Ordering::SeqCst) >= 2 {
                    TickControl::Stop
                } else {
                    TickControl::Continue
                }
            })
            .unwrap()
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!ticker.is_running());
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}

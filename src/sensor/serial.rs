use super::{MotionSensor, SensorSample};
use crate::config::SensorKind;
use crate::error::SensorError;
use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::thread;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Line the trigger board sends when it sees motion
pub const PLAY_LINE: &str = "PLAY";

/// Presence from a microcontroller on a serial line. Each `PLAY` line reads
/// as presence for the hold period; any other line is logged and ignored.
pub struct SerialSensor {
    plays: Receiver<()>,
    hold: Duration,
    last_play: Option<Instant>,
    disconnected: bool,
    closed: bool,
    cancellation_token: CancellationToken,
}

impl SerialSensor {
    /// Open the device, set the line speed when it is a terminal, and start
    /// the line reader thread
    pub fn open(device: impl AsRef<Path>, baud: u32, hold: Duration) -> Result<Self, SensorError> {
        let device = device.as_ref();
        let unavailable = |details: String| SensorError::Unavailable {
            sensor: format!("serial {}", device.display()),
            details,
        };

        let port = OpenOptions::new()
            .read(true)
            .open(device)
            .map_err(|e| unavailable(e.to_string()))?;
        configure_line(&port, baud).map_err(unavailable)?;

        let sensor = Self::from_reader(port, hold)?;
        info!(
            "Serial sensor listening on {} at {} baud",
            device.display(),
            baud
        );
        Ok(sensor)
    }

    /// Sensor fed from any line source, e.g. an already opened port
    pub fn from_reader<R>(reader: R, hold: Duration) -> Result<Self, SensorError>
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = channel::unbounded();
        let cancellation_token = CancellationToken::new();
        let token = cancellation_token.clone();

        thread::Builder::new()
            .name("serial-input".to_string())
            .spawn(move || read_lines(BufReader::new(reader), tx, token))
            .map_err(|e| SensorError::Unavailable {
                sensor: "serial".to_string(),
                details: format!("failed to spawn reader: {}", e),
            })?;

        Ok(Self {
            plays: rx,
            hold,
            last_play: None,
            disconnected: false,
            closed: false,
            cancellation_token,
        })
    }
}

fn read_lines<R: BufRead>(reader: R, tx: Sender<()>, token: CancellationToken) {
    for line in reader.lines() {
        if token.is_cancelled() {
            break;
        }

        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Serial read failed: {}", e);
                break;
            }
        };

        let message = line.trim();
        if message == PLAY_LINE {
            debug!("Serial trigger received");
            if tx.send(()).is_err() {
                break;
            }
        } else if !message.is_empty() {
            debug!("Serial: {}", message);
        }
    }

    debug!("Serial reader exited");
}

/// Raw 8N1 at `baud`. Regular files are left alone.
#[cfg(unix)]
fn configure_line(port: &File, baud: u32) -> Result<(), String> {
    use std::os::unix::io::AsRawFd;

    let fd = port.as_raw_fd();
    if unsafe { libc::isatty(fd) } != 1 {
        debug!("Serial source is not a terminal, skipping line setup");
        return Ok(());
    }

    let speed = match baud {
        9600 => libc::B9600,
        19200 => libc::B19200,
        38400 => libc::B38400,
        57600 => libc::B57600,
        115200 => libc::B115200,
        other => return Err(format!("unsupported baud rate {}", other)),
    };

    let mut tio: libc::termios = unsafe { std::mem::zeroed() };
    if unsafe { libc::tcgetattr(fd, &mut tio) } != 0 {
        return Err(format!("tcgetattr: {}", std::io::Error::last_os_error()));
    }

    unsafe { libc::cfmakeraw(&mut tio) };
    tio.c_cflag |= libc::CLOCAL | libc::CREAD;
    // Block until at least one byte arrives
    tio.c_cc[libc::VMIN] = 1;
    tio.c_cc[libc::VTIME] = 0;

    let rc = unsafe {
        libc::cfsetispeed(&mut tio, speed);
        libc::cfsetospeed(&mut tio, speed);
        libc::tcsetattr(fd, libc::TCSANOW, &tio)
    };
    if rc != 0 {
        return Err(format!("tcsetattr: {}", std::io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(not(unix))]
fn configure_line(_port: &File, _baud: u32) -> Result<(), String> {
    Ok(())
}

impl MotionSensor for SerialSensor {
    fn read(&mut self) -> Result<SensorSample, SensorError> {
        if self.closed {
            return Err(SensorError::Closed);
        }

        let now = Instant::now();
        loop {
            match self.plays.try_recv() {
                Ok(()) => self.last_play = Some(now),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.disconnected = true;
                    break;
                }
            }
        }

        let present = self
            .last_play
            .map(|at| now.saturating_duration_since(at) < self.hold)
            .unwrap_or(false);

        // Let a final PLAY finish its hold before reporting the line gone
        if self.disconnected && !present {
            warn!("Serial line closed");
            self.closed = true;
            return Err(SensorError::Closed);
        }

        Ok(SensorSample::presence(present, now))
    }

    fn close(&mut self) {
        // The reader thread may sit in a blocking read; it exits on the
        // next line or when the process does
        self.cancellation_token.cancel();
        self.closed = true;
    }

    fn kind(&self) -> SensorKind {
        SensorKind::Serial
    }
}

impl Drop for SerialSensor {
    fn drop(&mut self) {
        self.close();
    }
}

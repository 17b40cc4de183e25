use std::io::{BufRead, Write};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Source of the MFA device choice and token code.
#[async_trait]
pub trait ReadMfaToken {
    /// Picks one of `mfa_serials`, which is never empty.
    async fn select_mfa_device(&self, mfa_serials: &[String]) -> Result<String>;

    async fn read_mfa_token(&self, mfa_serial: &str) -> Result<String>;
}

/// Interactive prompt over line-oriented streams, usually stdin and stderr.
///
/// An invalid selection re-renders the whole menu; there is no retry limit.
/// Running out of input is the only way out besides a valid answer.
pub struct StreamMfaTokenReader<R, W> {
    input: Mutex<R>,
    output: Mutex<W>,
}

enum Selection {
    Selected(usize),
    NotANumber,
    NotInRange,
}

impl<R, W> StreamMfaTokenReader<R, W>
where
    R: BufRead,
    W: Write,
{
    pub fn new(input: R, output: W) -> Self {
        StreamMfaTokenReader {
            input: Mutex::new(input),
            output: Mutex::new(output),
        }
    }

    pub fn into_inner(self) -> (R, W) {
        let input = self.input.into_inner().unwrap_or_else(|e| e.into_inner());
        let output = self.output.into_inner().unwrap_or_else(|e| e.into_inner());
        (input, output)
    }

    fn output(&self) -> MutexGuard<'_, W> {
        self.output.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn read_line(&self) -> Result<String> {
        let mut line = String::new();
        let read = self
            .input
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .read_line(&mut line)?;
        if read == 0 {
            return Err(Error::UnexpectedEndOfInput);
        }
        Ok(line)
    }

    fn render_menu(&self, mfa_serials: &[String]) -> Result<()> {
        let mut out = self.output();
        for (i, serial) in mfa_serials.iter().enumerate() {
            writeln!(out, "[{}]: {}", i + 1, serial)?;
        }
        write!(out, "Select MFA device: ")?;
        out.flush()?;
        Ok(())
    }

    fn select(&self, mfa_serials: &[String]) -> Result<String> {
        loop {
            self.render_menu(mfa_serials)?;
            let line = self.read_line()?;

            match parse_selection(&line, mfa_serials.len()) {
                Selection::Selected(index) => return Ok(mfa_serials[index].clone()),
                Selection::NotANumber => {
                    writeln!(self.output(), "Invalid input (not a number)")?;
                }
                Selection::NotInRange => {
                    writeln!(self.output(), "Invalid input (not in range)")?;
                }
            }
        }
    }

    fn token(&self) -> Result<String> {
        {
            let mut out = self.output();
            write!(out, "Enter MFA token: ")?;
            out.flush()?;
        }

        let line = self.read_line()?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

fn parse_selection(line: &str, device_count: usize) -> Selection {
    match line.trim().parse::<i64>() {
        Err(_) => Selection::NotANumber,
        Ok(n) if n >= 1 && (n as u64) <= device_count as u64 => Selection::Selected(n as usize - 1),
        Ok(_) => Selection::NotInRange,
    }
}

#[async_trait]
impl<R, W> ReadMfaToken for StreamMfaTokenReader<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    async fn select_mfa_device(&self, mfa_serials: &[String]) -> Result<String> {
        let serial = self.select(mfa_serials)?;
        debug!("selected MFA device: {}", serial);
        Ok(serial)
    }

    async fn read_mfa_token(&self, _mfa_serial: &str) -> Result<String> {
        self.token()
    }
}

/// Non-interactive reader for a token passed on the command line.
pub struct StaticMfaTokenReader {
    token: String,
    mfa_serial: Option<String>,
}

impl StaticMfaTokenReader {
    pub fn with_mfa_serial(mut self, mfa_serial: Option<String>) -> Self {
        self.mfa_serial = mfa_serial;
        self
    }
}

impl<S: Into<String>> From<S> for StaticMfaTokenReader {
    fn from(s: S) -> Self {
        StaticMfaTokenReader {
            token: s.into(),
            mfa_serial: None,
        }
    }
}

#[async_trait]
impl ReadMfaToken for StaticMfaTokenReader {
    async fn select_mfa_device(&self, mfa_serials: &[String]) -> Result<String> {
        match self.mfa_serial.as_ref() {
            Some(wanted) if mfa_serials.contains(wanted) => Ok(wanted.clone()),
            Some(wanted) => Err(Error::MfaDeviceNotFound(wanted.clone())),
            None => {
                if mfa_serials.len() > 1 {
                    warn!(
                        "{} MFA devices registered, using the first one: {}",
                        mfa_serials.len(),
                        mfa_serials[0]
                    );
                }
                mfa_serials
                    .first()
                    .cloned()
                    .ok_or_else(|| Error::MfaDeviceNotFound("<none>".to_string()))
            }
        }
    }

    async fn read_mfa_token(&self, _mfa_serial: &str) -> Result<String> {
        Ok(self.token.clone())
    }
}

//! Serial balance source.
//!
//! Reads line-oriented output from a Mettler-Toledo NewClassic balance
//! configured for PRINTER or HOST mode (never PC-DIR mode, which emits
//! keystroke-capture line terminators instead of the configured ones).
//!
//! In both modes, non-stable readings carry a `D` marker character; the
//! stable-only filter drops those lines before classification is attempted.

use log::{debug, warn};

use crate::error::AppResult;
use crate::sample::{Sample, EMISSION_REGEX};

use super::SampleSource;

/// The physical acquisition channel: something that yields text lines.
///
/// `Ok(None)` means "no data yet", not end-of-stream.
pub trait LineReader: Send {
    /// Opens the channel. Failure is fatal to the pipeline.
    fn open(&mut self) -> AppResult<()>;

    /// Blocks until a line arrives or the channel's timeout fires.
    fn read_line(&mut self) -> AppResult<Option<String>>;

    /// Closes the channel.
    fn close(&mut self);
}

/// A source that extracts weight readings from balance output lines.
pub struct BalanceSource<R: LineReader> {
    reader: R,
    stable_only: bool,
}

impl<R: LineReader> BalanceSource<R> {
    pub fn new(reader: R, stable_only: bool) -> Self {
        Self {
            reader,
            stable_only,
        }
    }
}

impl<R: LineReader> SampleSource for BalanceSource<R> {
    fn name(&self) -> &str {
        "balance"
    }

    fn open(&mut self) -> AppResult<()> {
        self.reader.open()
    }

    fn poll(&mut self) -> AppResult<Option<Sample>> {
        let Some(line) = self.reader.read_line()? else {
            return Ok(None);
        };
        let s = line.trim();
        if s.is_empty() {
            return Ok(None);
        }
        debug!("Read line: [{s}]");
        if self.stable_only && s.contains('D') {
            return Ok(None);
        }
        match EMISSION_REGEX.find(s) {
            Some(m) => Ok(Some(Sample::text(m.as_str()))),
            None => {
                warn!("Unable to find emission match for: [{s}]");
                Ok(None)
            }
        }
    }

    fn close(&mut self) {
        self.reader.close();
    }
}

#[cfg(feature = "instrument_serial")]
pub use serial::SerialLineReader;

#[cfg(feature = "instrument_serial")]
mod serial {
    use std::io::Read;
    use std::time::Duration;

    use log::{error, info};
    use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

    use crate::config::SerialSettings;
    use crate::error::{AppResult, DaqError};

    use super::LineReader;

    /// Line-oriented reader over a serial port.
    pub struct SerialLineReader {
        port_name: String,
        settings: SerialSettings,
        port: Option<Box<dyn SerialPort>>,
        buf: Vec<u8>,
    }

    impl SerialLineReader {
        pub fn new(port_name: impl Into<String>, settings: SerialSettings) -> Self {
            Self {
                port_name: port_name.into(),
                settings,
                port: None,
                buf: Vec::new(),
            }
        }
    }

    fn data_bits(bits: u8) -> DataBits {
        match bits {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            _ => DataBits::Eight,
        }
    }

    fn parity(name: &str) -> Parity {
        match name {
            "odd" => Parity::Odd,
            "even" => Parity::Even,
            _ => Parity::None,
        }
    }

    fn stop_bits(bits: u8) -> StopBits {
        match bits {
            2 => StopBits::Two,
            _ => StopBits::One,
        }
    }

    impl LineReader for SerialLineReader {
        fn open(&mut self) -> AppResult<()> {
            let flow = if self.settings.xonxoff {
                FlowControl::Software
            } else {
                FlowControl::None
            };
            let port = serialport::new(&self.port_name, self.settings.baud_rate)
                .data_bits(data_bits(self.settings.data_bits))
                .parity(parity(&self.settings.parity))
                .stop_bits(stop_bits(self.settings.stop_bits))
                .flow_control(flow)
                .timeout(Duration::from_millis(self.settings.timeout_ms))
                .open()
                .map_err(|e| {
                    DaqError::Serial(format!("failed to open {}: {e}", self.port_name))
                })?;
            info!("Opened serial port {}", self.port_name);
            self.port = Some(port);
            Ok(())
        }

        fn read_line(&mut self) -> AppResult<Option<String>> {
            let Some(port) = self.port.as_mut() else {
                return Err(DaqError::Serial("port not open".into()));
            };
            let mut byte = [0u8; 1];
            loop {
                match port.read(&mut byte) {
                    Ok(0) => return Ok(None),
                    Ok(_) => {
                        if byte[0] == b'\n' {
                            let raw = std::mem::take(&mut self.buf);
                            return match String::from_utf8(raw) {
                                Ok(s) => Ok(Some(s)),
                                Err(e) => {
                                    error!("Failed to decode line: {:?}", e.as_bytes());
                                    Ok(None)
                                }
                            };
                        }
                        self.buf.push(byte[0]);
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                        // No data yet; keep any partial line for next poll.
                        return Ok(None);
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        fn close(&mut self) {
            info!("Closing serial port");
            self.port = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Payload;
    use std::collections::VecDeque;

    struct ScriptedReader {
        lines: VecDeque<Option<String>>,
        opened: bool,
    }

    impl ScriptedReader {
        fn new(lines: Vec<Option<&str>>) -> Self {
            Self {
                lines: lines
                    .into_iter()
                    .map(|l| l.map(String::from))
                    .collect(),
                opened: false,
            }
        }
    }

    impl LineReader for ScriptedReader {
        fn open(&mut self) -> AppResult<()> {
            self.opened = true;
            Ok(())
        }

        fn read_line(&mut self) -> AppResult<Option<String>> {
            Ok(self.lines.pop_front().flatten())
        }

        fn close(&mut self) {}
    }

    fn texts(source: &mut BalanceSource<ScriptedReader>, polls: usize) -> Vec<String> {
        let mut out = Vec::new();
        for _ in 0..polls {
            if let Ok(Some(sample)) = source.poll() {
                match sample.payload {
                    Payload::Text(s) => out.push(s),
                    other => panic!("unexpected payload: {other:?}"),
                }
            }
        }
        out
    }

    #[test]
    fn extracts_the_emission_from_a_reading() {
        let reader = ScriptedReader::new(vec![Some("     12.34 g\r")]);
        let mut source = BalanceSource::new(reader, false);
        assert_eq!(texts(&mut source, 1), vec!["12.34 g"]);
    }

    #[test]
    fn empty_reads_produce_no_sample() {
        let reader = ScriptedReader::new(vec![None, Some(""), Some("   \r")]);
        let mut source = BalanceSource::new(reader, false);
        assert!(texts(&mut source, 3).is_empty());
    }

    #[test]
    fn malformed_lines_are_dropped_not_fatal() {
        let reader = ScriptedReader::new(vec![Some("garbage"), Some("1.00 g")]);
        let mut source = BalanceSource::new(reader, false);
        assert_eq!(texts(&mut source, 2), vec!["1.00 g"]);
    }

    #[test]
    fn stable_only_drops_dynamic_readings() {
        // HOST mode marks changing values with 'S D'.
        let reader = ScriptedReader::new(vec![Some("S D   3.21 g"), Some("S S   3.20 g")]);
        let mut source = BalanceSource::new(reader, true);
        assert_eq!(texts(&mut source, 2), vec!["3.20 g"]);
    }
}

//! Serial console client.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use anyhow::Result;
use serialport::SerialPort;

/// Prompt printed by the firmware after every command
pub const PROMPT: &str = "> ";

/// Package name reported by the `version` command
const FIRMWARE_NAME: &str = "sensor-node-rust-firmware";

/// Find console ports by scanning ttyACM devices and testing with `version`.
pub fn find_console_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports()?;
    let mut console_ports = Vec::new();

    for port_info in ports {
        // USB Serial JTAG enumerates as CDC-ACM
        if !port_info.port_name.contains("ttyACM") {
            continue;
        }

        if let Ok(mut client) = DeviceClient::new(&port_info.port_name, 115200) {
            client.set_timeout(Duration::from_millis(500));
            if let Ok(output) = client.run_command("version") {
                if output.contains(FIRMWARE_NAME) {
                    console_ports.push(port_info.port_name.clone());
                }
            }
        }
    }

    Ok(console_ports)
}

/// Resolve a port argument - returns the port path if not "auto", otherwise auto-detects.
pub fn resolve_port(port_arg: &str) -> Result<String> {
    if port_arg != "auto" {
        return Ok(port_arg.to_string());
    }
    match find_console_ports()?.into_iter().next() {
        Some(port) => Ok(port),
        None => anyhow::bail!("No sensor node console found - ensure device is connected"),
    }
}

/// Client for the sensor node's line shell.
pub struct DeviceClient {
    port: Box<dyn SerialPort>,
    timeout: Duration,
}

impl DeviceClient {
    /// Create a new device client.
    pub fn new(port_name: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(100))
            .open()?;

        Ok(Self {
            port,
            timeout: Duration::from_secs(2),
        })
    }

    /// Set the response timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Drain all pending data from the serial port.
    pub fn drain_buffer(&mut self) -> Result<()> {
        self.port.clear(serialport::ClearBuffer::All)?;

        let mut buf = [0u8; 256];
        loop {
            match self.port.read(&mut buf) {
                Ok(0) => break,
                Ok(_) => continue,
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Send one line and return everything printed before the next prompt.
    pub fn run_command(&mut self, line: &str) -> Result<String> {
        self.send_raw(line.as_bytes())?;
        self.send_raw(b"\r\n")?;
        self.read_until_prompt()
    }

    /// Write raw bytes without a terminator.
    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    /// Read until the prompt appears; returns the text before it.
    pub fn read_until_prompt(&mut self) -> Result<String> {
        let mut data = Vec::new();
        let mut buf = [0u8; 64];
        let start = Instant::now();

        while start.elapsed() < self.timeout {
            match self.port.read(&mut buf) {
                Ok(n) => {
                    data.extend_from_slice(&buf[..n]);
                    if data.ends_with(PROMPT.as_bytes()) {
                        data.truncate(data.len() - PROMPT.len());
                        return Ok(String::from_utf8_lossy(&data).into_owned());
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                Err(e) => return Err(e.into()),
            }
        }

        anyhow::bail!(
            "Timeout waiting for prompt, got {} bytes: {:?}",
            data.len(),
            String::from_utf8_lossy(&data)
        );
    }
}

//! Serial console shell task
//!
//! Generic over any type implementing embedded_io_async traits, so it runs on
//! USB Serial JTAG or a UART alike.

use embedded_io_async::{Read, Write};
use heapless::String;

use crate::config::shell::{MAX_OUTPUT_LEN, PROMPT};
use crate::shell::{LineAccumulator, Shell};

/// Read lines from `reader`, execute them and answer on `writer`.
pub async fn shell_task<R: Read, W: Write>(mut reader: R, mut writer: W) {
    let shell = Shell::new();
    let mut accumulator = LineAccumulator::new();
    let mut output: String<MAX_OUTPUT_LEN> = String::new();

    let _ = writer.write_all(PROMPT.as_bytes()).await;

    loop {
        let mut buf = [0u8; 64];
        let n = match reader.read(&mut buf).await {
            Ok(0) => continue,
            Ok(n) => n,
            Err(_) => {
                // Console error, back off briefly
                embassy_time::Timer::after(embassy_time::Duration::from_millis(10)).await;
                continue;
            }
        };

        for &byte in &buf[..n] {
            let Some(line) = accumulator.push(byte) else {
                continue;
            };

            output.clear();
            if let Err(e) = shell.execute(&line, &mut output) {
                log::debug!("Shell: {:?}", e);
            }
            let _ = writer.write_all(output.as_bytes()).await;
            let _ = writer.write_all(PROMPT.as_bytes()).await;
        }
    }
}

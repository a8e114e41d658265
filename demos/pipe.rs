//! Streams stdin (or a generated pattern if stdin is a terminal) through a mirrored ring into stdout.
//!
//! `RUST_LOG=debug cargo run --example pipe < some_file > copy`

use anyhow::{Context, Result};
use mirror_ring::{MirroredRing, RingConfig};
use std::io::{self, BufRead, IsTerminal, Read, Write};

fn main() -> Result<()> {
    env_logger::init();

    let mut ring = MirroredRing::with_config(RingConfig::new(64 * 1024)).context("creating the ring")?;
    let capacity = ring.capacity()?;
    log::info!("ring capacity: {capacity} bytes");

    let stdin = io::stdin();
    let mut input: Box<dyn Read> = if stdin.is_terminal() {
        let pattern: Vec<u8> = (0..capacity * 3).map(|i| b'a' + (i % 26) as u8).collect();
        Box::new(io::Cursor::new(pattern))
    } else {
        Box::new(stdin.lock())
    };
    let mut output = io::stdout().lock();

    let mut total = 0usize;
    loop {
        let spare = ring.spare_mut()?;
        let n = input.read(spare).context("reading input")?;
        if n == 0 {
            break;
        }
        ring.commit(n)?;

        // Every unread byte is one slice, even after the cursors wrap.
        let chunk = ring.fill_buf()?;
        output.write_all(chunk).context("writing output")?;
        let written = chunk.len();
        ring.consume(written)?;
        total += written;
        log::debug!("moved {written} bytes, head at {}", ring.head()?);
    }
    output.flush()?;

    ring.close()?;
    log::info!("copied {total} bytes");
    Ok(())
}

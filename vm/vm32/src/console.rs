//! Host console bridging for guest I/O.
//!
//! Guest program output goes through an injected writer pair so the
//! test suite can capture it; the engine's own diagnostics use the
//! logger and never touch these streams.

use std::io::{self, BufRead, BufReader, Write};

pub struct Console {
    out: Box<dyn Write + Send>,
    err: Box<dyn Write + Send>,
    input: Box<dyn BufRead + Send>,
}

impl Console {
    /// The real thing: stdout/stderr/stdin of the host process.
    pub fn stdio() -> Console {
        Console::new(
            Box::new(io::stdout()),
            Box::new(io::stderr()),
            Box::new(BufReader::new(io::stdin())),
        )
    }

    pub fn new(
        out: Box<dyn Write + Send>,
        err: Box<dyn Write + Send>,
        input: Box<dyn BufRead + Send>,
    ) -> Console {
        Console { out, err, input }
    }

    pub(crate) fn write_out(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.out.write_all(bytes)
    }

    pub(crate) fn write_err(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.err.write_all(bytes)
    }

    pub(crate) fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let buf = self.input.fill_buf()?;
        match buf.first().copied() {
            Some(byte) => {
                self.input.consume(1);
                Ok(Some(byte))
            }
            None => Ok(None),
        }
    }

    pub(crate) fn read_line(&mut self) -> io::Result<String> {
        let mut line = String::new();
        self.input.read_line(&mut line)?;
        Ok(line)
    }

    /// Flushed between distinct output groups so that interleaving
    /// with host-side writes stays sane.
    pub(crate) fn flush(&mut self) -> io::Result<()> {
        self.out.flush()?;
        self.err.flush()
    }
}

impl Default for Console {
    fn default() -> Console {
        Console::stdio()
    }
}

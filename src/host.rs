//! The narrow boundary between the interpreter and its host: byte input,
//! byte output and optional module loading.

use std::cell::RefCell;
use std::io::{self, Read, Write};
use std::rc::Rc;

/// Byte-level I/O supplied by the host. Both calls are treated as blocking and
/// synchronous; the interpreter does its own one-byte putback on top.
pub trait Io {
    /// Next input byte, or None at end of input.
    fn read_byte(&mut self) -> Option<u8>;
    fn write_byte(&mut self, byte: u8);
    fn flush(&mut self) {}
}

/// Optional dynamic module loading. The default refuses everything.
pub trait ModuleLoader {
    fn load(&mut self, name: &str) -> bool;
}

#[derive(Debug, Default)]
pub struct NoModules;

impl ModuleLoader for NoModules {
    fn load(&mut self, _name: &str) -> bool {
        false
    }
}

/// Process stdin/stdout.
#[derive(Debug, Default)]
pub struct StdIo;

impl Io for StdIo {
    fn read_byte(&mut self) -> Option<u8> {
        let mut buf = [0u8; 1];
        loop {
            match io::stdin().lock().read(&mut buf) {
                Ok(0) => return None,
                Ok(_) => return Some(buf[0]),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => return None,
            }
        }
    }

    fn write_byte(&mut self, byte: u8) {
        let mut out = io::stdout().lock();
        let _ = out.write_all(&[byte]);
        if byte == b'\n' {
            let _ = out.flush();
        }
    }

    fn flush(&mut self) {
        let _ = io::stdout().flush();
    }
}

/// In-memory I/O: reads from a fixed buffer, appends output to a shared one.
#[derive(Debug, Default)]
pub struct BufferIo {
    input: Vec<u8>,
    pos: usize,
    output: Rc<RefCell<Vec<u8>>>,
}

impl BufferIo {
    pub fn new(input: impl Into<Vec<u8>>) -> Self {
        BufferIo {
            input: input.into(),
            pos: 0,
            output: Rc::default(),
        }
    }

    /// A handle on everything written so far; stays valid after the Io is boxed.
    pub fn output(&self) -> Rc<RefCell<Vec<u8>>> {
        self.output.clone()
    }
}

impl Io for BufferIo {
    fn read_byte(&mut self) -> Option<u8> {
        let byte = self.input.get(self.pos).copied()?;
        self.pos += 1;
        Some(byte)
    }

    fn write_byte(&mut self, byte: u8) {
        self.output.borrow_mut().push(byte);
    }
}

/// An input source with a one-byte putback buffer.
pub struct Port {
    io: Box<dyn Io>,
    putback: Option<u8>,
}

impl Port {
    pub fn new(io: Box<dyn Io>) -> Self {
        Port { io, putback: None }
    }

    pub fn getc(&mut self) -> Option<u8> {
        self.putback.take().or_else(|| self.io.read_byte())
    }

    /// Make the next `getc` return `byte`. A second putback replaces the first.
    pub fn putback(&mut self, byte: u8) {
        self.putback = Some(byte);
    }

    pub fn putc(&mut self, byte: u8) {
        self.io.write_byte(byte);
    }

    pub fn write_all(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.io.write_byte(b);
        }
    }

    pub fn flush(&mut self) {
        self.io.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn putback_is_returned_before_fresh_input() {
        let mut port = Port::new(Box::new(BufferIo::new("ab")));
        assert_eq!(port.getc(), Some(b'a'));
        port.putback(b'a');
        assert_eq!(port.getc(), Some(b'a'));
        assert_eq!(port.getc(), Some(b'b'));
        assert_eq!(port.getc(), None);
    }

    #[test]
    fn buffer_output_is_shared() {
        let io = BufferIo::new("");
        let out = io.output();
        let mut port = Port::new(Box::new(io));
        port.write_all(b"hi");
        assert_eq!(out.borrow().as_slice(), b"hi");
    }
}

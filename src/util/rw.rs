use std::{cell::RefCell, fmt::Write, fs::File, io, rc::Rc};

/// An in-memory `io::Write` sink, so rendered output can be inspected in
/// tests instead of going to stdout.
#[derive(Default)]
pub struct StringBuffer {
    s: String,
}

impl StringBuffer {
    pub fn new() -> StringBuffer {
        StringBuffer { s: String::new() }
    }

    pub fn as_str(&self) -> &str {
        self.s.as_str()
    }

    /// Takes the buffered text, leaving the buffer empty.
    pub fn export_string(&mut self) -> String {
        std::mem::take(&mut self.s)
    }
}

// String only implements fmt::Write
impl io::Write for StringBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let str_rep = std::str::from_utf8(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.s
            .write_str(str_rep)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// A cloneable handle to some output stream.
//
// The CLI hands out stdout/stderr handles; tests hand out string buffers
// and read back what was rendered.
#[derive(Clone)]
pub struct WriteHandle {
    w: Rc<RefCell<dyn io::Write>>,
}

impl WriteHandle {
    pub fn stdout_write_handle() -> WriteHandle {
        WriteHandle { w: Rc::new(RefCell::new(io::stdout())) }
    }

    pub fn stderr_write_handle() -> WriteHandle {
        WriteHandle { w: Rc::new(RefCell::new(io::stderr())) }
    }

    pub fn string_buff_write_handle() -> (WriteHandle, Rc<RefCell<StringBuffer>>) {
        let buffer = Rc::new(RefCell::new(StringBuffer::new()));
        let h = WriteHandle { w: buffer.clone() };
        (h, buffer)
    }

    pub fn file_write_handle(f: File) -> WriteHandle {
        WriteHandle { w: Rc::new(RefCell::new(f)) }
    }
}

impl io::Write for WriteHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.w.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.w.borrow_mut().flush()
    }
}

/// Writes a line to a `WriteHandle` (or any `io::Write`), ignoring write
/// failures. Used for messages meant for the user, not for data output.
#[macro_export]
macro_rules! write_errln {
    ($w:expr, $($arg:tt)*) => {{
        // Takes a handle or a `&mut` to one.
        use ::std::io::Write as _;
        let _ = $w.write_fmt(format_args!("{}\n", format_args!($($arg)*)));
    }};
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::{StringBuffer, WriteHandle};

    #[test]
    fn test_string_buffer() {
        let mut buff = StringBuffer::new();
        let _ = write!(buff, "Some {}", "text");
        let _ = writeln!(buff, " 1");
        assert_eq!(buff.as_str(), "Some text 1\n");
        assert_eq!(buff.export_string(), "Some text 1\n");
        assert_eq!(buff.as_str(), "");
    }

    #[test]
    fn test_write_handle() {
        let (handle, buff) = WriteHandle::string_buff_write_handle();
        let mut h2 = handle.clone();
        let _ = write!(h2, "Some {}", "text");
        let _ = writeln!(h2, " 1");
        assert_eq!(buff.borrow().as_str(), "Some text 1\n");
    }

    #[test]
    fn test_write_errln() {
        let (mut handle, buff) = WriteHandle::string_buff_write_handle();
        write_errln!(handle, "[!] {} failed", "Transactions");
        assert_eq!(buff.borrow().as_str(), "[!] Transactions failed\n");

        fn report(err_printer: &mut WriteHandle, step: &str) {
            write_errln!(err_printer, "{step} skipped");
        }
        report(&mut handle, "Document");
        assert_eq!(buff.borrow().as_str(), "[!] Transactions failed\nDocument skipped\n");
    }
}

use super::StandardRing;
use std::io::{self, Read, Write};

#[cfg(any(unix, windows))]
mod mirrored {
    use crate::MirroredRing;
    use std::io::{self, BufRead, Read, Write};

    impl Read for MirroredRing {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> { Ok(MirroredRing::read(self, buf)?) }
    }

    impl BufRead for MirroredRing {
        fn fill_buf(&mut self) -> io::Result<&[u8]> { Ok(self.peek()?) }

        fn consume(&mut self, amt: usize) {
            // A closed ring has nothing to consume.
            let _ = MirroredRing::consume(self, amt);
        }
    }

    /// Writes are partial once the ring fills up, so `write_all` on a full ring fails with `WriteZero`.
    impl Write for MirroredRing {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> { Ok(MirroredRing::write(self, buf)?) }

        fn flush(&mut self) -> io::Result<()> {
            self.capacity()?;
            Ok(())
        }
    }
}

impl Read for StandardRing {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> { Ok(StandardRing::read(self, buf)) }
}

impl Write for StandardRing {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> { Ok(StandardRing::write(self, buf)) }

    fn flush(&mut self) -> io::Result<()> { Ok(()) }
}

#[cfg(all(test, any(unix, windows)))]
mod tests {
    use crate::{MirroredRing, StandardRing};
    use std::io::{self, BufRead, Read, Write};

    #[test]
    fn test_read() {
        let mut source = MirroredRing::new(1).unwrap();
        source.write_all(b"hello").unwrap();
        let mut dest = [0u8; 3];

        let bytes_read = Read::read(&mut source, &mut dest).unwrap();
        assert_eq!(bytes_read, 3);
        assert_eq!(&dest, b"hel");
        assert_eq!(source.peek().unwrap(), b"lo");

        let bytes_read = Read::read(&mut source, &mut dest).unwrap();
        assert_eq!(bytes_read, 2);
        assert_eq!(&dest[..2], b"lo");

        assert_eq!(Read::read(&mut source, &mut dest).unwrap(), 0);
    }

    #[test]
    fn test_write_all_on_a_full_ring() {
        let mut ring = MirroredRing::new(1).unwrap();
        let cap = ring.capacity().unwrap();
        let err = ring.write_all(&vec![0; cap + 1]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WriteZero);
        assert!(ring.is_full().unwrap());
    }

    #[test]
    fn test_buf_read_lines() {
        let mut ring = MirroredRing::new(1).unwrap();
        ring.write_all(b"first\nsecond\n").unwrap();
        let lines: Vec<String> = (&mut ring).lines().map(Result::unwrap).collect();
        assert_eq!(lines, ["first", "second"]);
        assert!(ring.is_empty().unwrap());
    }

    #[test]
    fn test_io_copy() {
        let mut source = MirroredRing::new(1).unwrap();
        source.write_all(b"copy me").unwrap();
        let mut dest = StandardRing::new(64).unwrap();

        let bytes_copied = io::copy(&mut source, &mut dest).unwrap();
        assert_eq!(bytes_copied, 7);
        assert!(source.is_empty().unwrap());
        assert_eq!(dest.as_slices().0, b"copy me");
    }

    #[test]
    fn test_closed_ring_is_a_broken_pipe() {
        let mut ring = MirroredRing::new(1).unwrap();
        ring.close().unwrap();
        assert_eq!(Write::write(&mut ring, b"x").unwrap_err().kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(Read::read(&mut ring, &mut [0; 1]).unwrap_err().kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(ring.fill_buf().unwrap_err().kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(ring.flush().unwrap_err().kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_standard_ring_io() {
        let mut ring = StandardRing::new(4).unwrap();
        assert_eq!(Write::write(&mut ring, b"abcdef").unwrap(), 4);
        let mut out = Vec::new();
        ring.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"abcd");
    }
}

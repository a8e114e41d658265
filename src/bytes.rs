use super::MirroredRing;
use bytes::{Buf, BufMut, buf::UninitSlice};

/// A closed ring has nothing remaining and an empty chunk.
impl Buf for MirroredRing {
    #[inline]
    fn remaining(&self) -> usize { self.len().unwrap_or(0) }

    #[inline]
    fn chunk(&self) -> &[u8] { self.peek().unwrap_or_default() }

    #[inline]
    fn advance(&mut self, cnt: usize) {
        assert!(cnt <= self.remaining(), "cannot advance past the end of the buffer");
        if cnt > 0 {
            let _ = self.consume(cnt);
        }
    }
}

unsafe impl BufMut for MirroredRing {
    #[inline]
    fn remaining_mut(&self) -> usize { self.free_len().unwrap_or(0) }

    #[inline]
    unsafe fn advance_mut(&mut self, cnt: usize) {
        assert!(cnt <= self.remaining_mut(), "cannot advance past the buffer's capacity");
        if cnt > 0 {
            let _ = self.commit(cnt);
        }
    }

    #[inline]
    fn chunk_mut(&mut self) -> &mut UninitSlice {
        match self.spare_mut() {
            Ok(spare) => UninitSlice::new(spare),
            Err(_) => UninitSlice::new(&mut []),
        }
    }
}

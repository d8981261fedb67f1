//! Immutable action code buffers and slices of them.

use byteorder::{ByteOrder, LittleEndian};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// One block of compiled actions, owned by its enclosing timeline.
///
/// The bytes never change after load. The constant pool is the one piece
/// of interior state: a `ConstantPool` action replaces it wholesale, and
/// `Push` records index into whatever pool is current at that point.
pub struct ActionBuffer {
    data: Vec<u8>,
    swf_version: u8,
    constant_pool: RefCell<Rc<Vec<Rc<str>>>>,
}

impl ActionBuffer {
    pub fn new(data: Vec<u8>, swf_version: u8) -> Rc<Self> {
        Rc::new(Self {
            data,
            swf_version,
            constant_pool: RefCell::new(Rc::new(Vec::new())),
        })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() || self.data[0] == 0
    }

    pub fn swf_version(&self) -> u8 {
        self.swf_version
    }

    pub fn get(&self, offset: usize) -> u8 {
        self.data.get(offset).copied().unwrap_or(0)
    }

    pub fn read_u8(&self, offset: usize) -> u8 {
        self.get(offset)
    }

    pub fn read_u16(&self, offset: usize) -> u16 {
        if offset + 2 > self.data.len() {
            return 0;
        }
        LittleEndian::read_u16(&self.data[offset..])
    }

    pub fn read_i16(&self, offset: usize) -> i16 {
        self.read_u16(offset) as i16
    }

    pub fn read_i32(&self, offset: usize) -> i32 {
        if offset + 4 > self.data.len() {
            return 0;
        }
        LittleEndian::read_i32(&self.data[offset..])
    }

    pub fn read_f32(&self, offset: usize) -> f32 {
        if offset + 4 > self.data.len() {
            return 0.0;
        }
        LittleEndian::read_f32(&self.data[offset..])
    }

    /// Read a 64-bit double stored in the file's odd word order: the high
    /// word comes first (bytes 4 5 6 7 0 1 2 3 of the canonical
    /// little-endian layout).
    pub fn read_f64_swapped(&self, offset: usize) -> f64 {
        if offset + 8 > self.data.len() {
            return 0.0;
        }
        let b = &self.data[offset..offset + 8];
        let canonical = [b[4], b[5], b[6], b[7], b[0], b[1], b[2], b[3]];
        f64::from_bits(LittleEndian::read_u64(&canonical))
    }

    /// Read a NUL-terminated string. Returns the string and the offset one
    /// past its terminator.
    pub fn read_string(&self, offset: usize) -> (Rc<str>, usize) {
        let mut end = offset;
        while end < self.data.len() && self.data[end] != 0 {
            end += 1;
        }
        let s = String::from_utf8_lossy(&self.data[offset..end]);
        (Rc::from(&*s), (end + 1).min(self.data.len() + 1))
    }

    /// Read a variable-length u32, 7 bits per byte, at most 5 bytes.
    /// Returns the value and its encoded length.
    pub fn read_v32(&self, offset: usize) -> (u32, usize) {
        let mut result = 0u32;
        for i in 0..5 {
            let byte = self.get(offset + i) as u32;
            result |= (byte & 0x7F) << (7 * i as u32);
            if byte & 0x80 == 0 {
                return (result, i + 1);
            }
        }
        (result, 5)
    }

    /// Install a new constant pool, replacing any prior one.
    pub fn set_constant_pool(&self, pool: Vec<Rc<str>>) {
        *self.constant_pool.borrow_mut() = Rc::new(pool);
    }

    pub fn constant_pool(&self) -> Rc<Vec<Rc<str>>> {
        Rc::clone(&self.constant_pool.borrow())
    }

    /// Fetch one pool entry; out-of-range indices read as the empty
    /// string and are the caller's to report.
    pub fn dictionary_get(&self, index: usize) -> Option<Rc<str>> {
        self.constant_pool.borrow().get(index).cloned()
    }

    pub fn as_slice(self: &Rc<Self>) -> CodeSlice {
        CodeSlice {
            start: 0,
            end: self.len(),
            buffer: Rc::clone(self),
        }
    }
}

impl fmt::Debug for ActionBuffer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ActionBuffer")
            .field("len", &self.data.len())
            .field("swf_version", &self.swf_version)
            .finish()
    }
}

/// A half-open `[start, end)` range of an action buffer: the unit of one
/// interpreter invocation.
#[derive(Clone, Debug)]
pub struct CodeSlice {
    pub buffer: Rc<ActionBuffer>,
    pub start: usize,
    pub end: usize,
}

impl CodeSlice {
    pub fn subslice(&self, start: usize, end: usize) -> CodeSlice {
        CodeSlice {
            buffer: Rc::clone(&self.buffer),
            start: start.min(self.buffer.len()),
            end: end.min(self.buffer.len()),
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn swf_version(&self) -> u8 {
        self.buffer.swf_version()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn swapped_double_reassembles() {
        let value = 1234.5678f64;
        let le = value.to_le_bytes();
        // File order: high word first.
        let wire = [le[4], le[5], le[6], le[7], le[0], le[1], le[2], le[3]];
        let buf = ActionBuffer::new(wire.to_vec(), 6);
        assert_eq!(buf.read_f64_swapped(0), value);
    }

    #[test]
    fn v32_decoding() {
        let buf = ActionBuffer::new(vec![0x7F, 0x80, 0x01, 0xFF, 0xFF, 0x7F], 6);
        assert_eq!(buf.read_v32(0), (0x7F, 1));
        assert_eq!(buf.read_v32(1), (0x80, 2));
        assert_eq!(buf.read_v32(3), (0x1F_FFFF, 3));
    }

    #[test]
    fn strings_are_nul_terminated() {
        let buf = ActionBuffer::new(b"abc\0def\0".to_vec(), 6);
        let (s, next) = buf.read_string(0);
        assert_eq!(&*s, "abc");
        assert_eq!(next, 4);
        let (s, _) = buf.read_string(next);
        assert_eq!(&*s, "def");
    }

    #[test]
    fn constant_pool_replacement() {
        let buf = ActionBuffer::new(vec![], 6);
        buf.set_constant_pool(vec!["a".into(), "b".into()]);
        assert_eq!(buf.dictionary_get(1).as_deref(), Some("b"));
        buf.set_constant_pool(vec!["c".into()]);
        assert_eq!(buf.dictionary_get(0).as_deref(), Some("c"));
        assert_eq!(buf.dictionary_get(1), None);
    }
}

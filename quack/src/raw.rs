//! Unchecked memory access into vector storage.
//!
//! Everything that reads or writes through a pointer handed out by the engine goes through this
//! module. None of the functions check bounds; each documents what its caller must guarantee.

use std::ffi::c_void;
use std::mem::size_of;
use std::ptr;

use static_assertions::const_assert_eq;

/// Byte width of one string slot (`VARCHAR`, `BLOB`, `BIT`, `VARINT`).
pub const STRING_SLOT_WIDTH: usize = 16;
/// Longest value kept inside its slot; longer values live behind a pointer.
pub const INLINE_LENGTH: usize = 12;

const LENGTH_OFFSET: usize = 0;
const INLINE_OFFSET: usize = 4;
const POINTER_OFFSET: usize = 8;

/// Out-of-line layout: length, four byte prefix, pointer to the full value.
#[allow(dead_code)]
#[repr(C)]
struct PointerSlot {
    length: u32,
    prefix: [u8; 4],
    ptr: *const u8,
}

/// Inline layout: length followed by up to twelve bytes.
#[allow(dead_code)]
#[repr(C)]
struct InlineSlot {
    length: u32,
    inlined: [u8; INLINE_LENGTH],
}

const_assert_eq!(size_of::<PointerSlot>(), STRING_SLOT_WIDTH);
const_assert_eq!(size_of::<InlineSlot>(), STRING_SLOT_WIDTH);
const_assert_eq!(INLINE_OFFSET + INLINE_LENGTH, STRING_SLOT_WIDTH);

/// Read the `index`-th `T` of a typed buffer.
///
/// # Safety
///
/// `data` must point to at least `index + 1` initialized values of `T`.
#[inline]
pub unsafe fn read<T: Copy>(data: *const c_void, index: usize) -> T {
    unsafe { data.cast::<T>().add(index).read_unaligned() }
}

/// Overwrite the `index`-th `T` of a typed buffer.
///
/// # Safety
///
/// `data` must point to writable storage for at least `index + 1` values of `T`.
#[inline]
pub unsafe fn write<T: Copy>(data: *mut c_void, index: usize, value: T) {
    unsafe { data.cast::<T>().add(index).write_unaligned(value) }
}

/// Copy `len` bytes from the address stored at byte `offset` of `buffer`.
///
/// # Safety
///
/// `buffer + offset` must hold a pointer, and that pointer must be valid for reads of `len` bytes.
pub unsafe fn read_pointer_bytes(buffer: *const u8, offset: usize, len: usize) -> Vec<u8> {
    unsafe {
        let target = buffer.add(offset).cast::<*const u8>().read_unaligned();
        std::slice::from_raw_parts(target, len).to_vec()
    }
}

/// Copy `src` to byte `offset` of `dest`.
///
/// # Safety
///
/// `dest` must be valid for writes of `offset + src.len()` bytes and must not overlap `src`.
pub unsafe fn copy_bytes(dest: *mut u8, offset: usize, src: &[u8]) {
    unsafe { ptr::copy_nonoverlapping(src.as_ptr(), dest.add(offset), src.len()) }
}

/// The bytes of the string slot at `row`.
///
/// # Safety
///
/// `data` must be the data buffer of a string-typed vector with a valid slot at `row`.
pub unsafe fn string_bytes(data: *const c_void, row: usize) -> Vec<u8> {
    unsafe {
        let slot = data.cast::<u8>().add(row * STRING_SLOT_WIDTH);
        let length = slot.add(LENGTH_OFFSET).cast::<u32>().read_unaligned() as usize;
        if length <= INLINE_LENGTH {
            std::slice::from_raw_parts(slot.add(INLINE_OFFSET), length).to_vec()
        } else {
            read_pointer_bytes(slot, POINTER_OFFSET, length)
        }
    }
}

/// Fill a string slot with a value short enough to inline.
///
/// # Safety
///
/// `data` must be the data buffer of a string-typed vector with a writable slot at `row`, and
/// `bytes` must be at most [`INLINE_LENGTH`] long.
pub unsafe fn write_inline_string(data: *mut c_void, row: usize, bytes: &[u8]) {
    debug_assert!(bytes.len() <= INLINE_LENGTH);
    unsafe {
        let slot = data.cast::<u8>().add(row * STRING_SLOT_WIDTH);
        ptr::write_bytes(slot, 0, STRING_SLOT_WIDTH);
        let length = u32::try_from(bytes.len()).unwrap_or_default();
        slot.add(LENGTH_OFFSET).cast::<u32>().write_unaligned(length);
        copy_bytes(slot, INLINE_OFFSET, bytes);
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn pointer_slot(value: &[u8]) -> [u8; STRING_SLOT_WIDTH] {
        let slot = PointerSlot {
            length: u32::try_from(value.len()).unwrap(),
            prefix: value[..4].try_into().unwrap(),
            ptr: value.as_ptr(),
        };
        // SAFETY: PointerSlot is plain old data of exactly this size.
        unsafe { std::mem::transmute::<PointerSlot, [u8; STRING_SLOT_WIDTH]>(slot) }
    }

    #[rstest]
    #[case(b"".as_slice())]
    #[case(b"a".as_slice())]
    #[case(b"exactly12byt".as_slice())]
    fn inline_strings(#[case] value: &[u8]) {
        let mut buffer = [0xAAu8; STRING_SLOT_WIDTH * 2];
        unsafe {
            write_inline_string(buffer.as_mut_ptr().cast(), 1, value);
            assert_eq!(string_bytes(buffer.as_ptr().cast(), 1), value);
        }
        assert_eq!(&buffer[..STRING_SLOT_WIDTH], &[0xAA; STRING_SLOT_WIDTH]);
    }

    #[rstest]
    #[case(b"thirteen byte".as_slice())]
    #[case(b"a considerably longer value stored out of line".as_slice())]
    fn pointer_strings(#[case] value: &[u8]) {
        let slot = pointer_slot(value);
        let decoded = unsafe { string_bytes(slot.as_ptr().cast(), 0) };
        assert_eq!(decoded, value);
    }

    #[test]
    fn typed_access() {
        let mut buffer = [0i64; 4];
        unsafe {
            write::<i64>(buffer.as_mut_ptr().cast(), 2, -42);
            assert_eq!(read::<i64>(buffer.as_ptr().cast(), 2), -42);
        }
        assert_eq!(buffer, [0, 0, -42, 0]);
    }

    #[test]
    fn copy_at_offset() {
        let mut dest = [0u8; 8];
        unsafe { copy_bytes(dest.as_mut_ptr(), 3, &[1, 2, 3]) };
        assert_eq!(dest, [0, 0, 0, 1, 2, 3, 0, 0]);
    }
}

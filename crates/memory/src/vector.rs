use std::mem::ManuallyDrop;
use std::slice;

/// An owned byte buffer (`Option<Vec<u8>>`) whose allocation has been
/// detached from Rust's ownership tracking so it can cross the boundary.
///
/// The type deliberately does not implement `Drop` or `Clone`: every instance
/// that was produced must be turned back into a `Vec` exactly once, either via
/// [`UnmanagedVector::consume`] or [`destroy_unmanaged_vector`]. Forgetting to
/// do so leaks the allocation.
#[repr(C)]
#[derive(Debug)]
pub struct UnmanagedVector {
    /// True when the buffer is absent (`None`).
    is_none: bool,
    ptr: *mut u8,
    len: usize,
    cap: usize,
}

impl UnmanagedVector {
    /// Takes ownership of `source` and detaches its allocation.
    pub fn new(source: Option<Vec<u8>>) -> Self {
        match source {
            Some(data) => {
                let mut data = ManuallyDrop::new(data);
                Self {
                    is_none: false,
                    ptr: data.as_mut_ptr(),
                    len: data.len(),
                    cap: data.capacity(),
                }
            }
            None => Self::none(),
        }
    }

    pub fn some(data: impl Into<Vec<u8>>) -> Self {
        Self::new(Some(data.into()))
    }

    pub fn none() -> Self {
        Self {
            is_none: true,
            ptr: std::ptr::null_mut(),
            len: 0,
            cap: 0,
        }
    }

    pub fn is_none(&self) -> bool {
        self.is_none
    }

    pub fn is_some(&self) -> bool {
        !self.is_none
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Re-attaches the allocation and returns it as a regular vector.
    ///
    /// A buffer with capacity 0 never owned an allocation; it comes back as
    /// `Some(Vec::new())` without reading the pointer.
    pub fn consume(self) -> Option<Vec<u8>> {
        if self.is_none {
            None
        } else if self.cap == 0 {
            Some(Vec::new())
        } else {
            // SAFETY: ptr/len/cap were produced by `new` from a live Vec<u8>
            // and `self` is consumed, so the allocation is restored once.
            Some(unsafe { Vec::from_raw_parts(self.ptr, self.len, self.cap) })
        }
    }
}

impl Default for UnmanagedVector {
    /// The absent buffer, used to initialise output parameters.
    fn default() -> Self {
        Self::none()
    }
}

/// Copies `length` bytes starting at `ptr` into a freshly allocated
/// [`UnmanagedVector`].
///
/// Exported so the foreign side can hand results back without allocating
/// memory that Rust would later free.
///
/// A null `ptr` with a non-zero `length` cannot describe any bytes and
/// yields the absent buffer, so the receiver sees `None` rather than a
/// silently emptied value.
///
/// # Safety
///
/// Unless `nil` is set, `ptr` is null or `length` is 0, `ptr` must point to
/// `length` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn new_unmanaged_vector(
    nil: bool,
    ptr: *const u8,
    length: usize,
) -> UnmanagedVector {
    if nil || (ptr.is_null() && length > 0) {
        UnmanagedVector::new(None)
    } else if length == 0 {
        UnmanagedVector::new(Some(Vec::new()))
    } else {
        let external = slice::from_raw_parts(ptr, length);
        UnmanagedVector::new(Some(external.to_vec()))
    }
}

/// Releases a buffer produced by this crate. Must be called exactly once per
/// produced instance.
#[no_mangle]
pub extern "C" fn destroy_unmanaged_vector(v: UnmanagedVector) {
    let _ = v.consume();
}

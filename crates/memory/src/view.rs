use std::marker::PhantomData;
use std::slice;

/// A view into an externally owned byte slice (`Option<&[u8]>`).
///
/// The view never owns its bytes. It is only valid for the synchronous
/// duration of the call it is passed to.
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct ByteSliceView {
    /// True when the whole slice is absent (`None`).
    is_nil: bool,
    ptr: *const u8,
    len: usize,
}

impl ByteSliceView {
    /// Creates a view of the given slice. `None` produces the absent state.
    pub fn new(source: Option<&[u8]>) -> Self {
        match source {
            Some(data) => Self {
                is_nil: false,
                ptr: data.as_ptr(),
                len: data.len(),
            },
            None => Self::nil(),
        }
    }

    /// Creates the absent view.
    pub fn nil() -> Self {
        Self {
            is_nil: true,
            ptr: std::ptr::null(),
            len: 0,
        }
    }

    /// Returns true if the view describes an absent slice.
    pub fn is_nil(&self) -> bool {
        self.is_nil
    }

    /// Length of the viewed slice, 0 for the absent state.
    pub fn len(&self) -> usize {
        if self.is_nil {
            0
        } else {
            self.len
        }
    }

    /// Returns true for both the absent and the empty state.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrows the viewed bytes.
    ///
    /// An empty, non-absent view returns `Some(&[])` without touching the
    /// pointer, which may be null in that case.
    ///
    /// # Safety
    ///
    /// The creator of the view must keep the underlying memory alive and
    /// unchanged for the returned lifetime.
    pub unsafe fn read<'a>(&self) -> Option<&'a [u8]> {
        if self.is_nil {
            return None;
        }
        if self.len == 0 || self.ptr.is_null() {
            return Some(&[]);
        }
        Some(slice::from_raw_parts(self.ptr, self.len))
    }

    /// Copies the viewed bytes into an owned vector.
    ///
    /// # Safety
    ///
    /// Same contract as [`ByteSliceView::read`].
    pub unsafe fn to_owned(&self) -> Option<Vec<u8>> {
        self.read().map(|bytes| bytes.to_vec())
    }
}

impl Default for ByteSliceView {
    fn default() -> Self {
        Self::nil()
    }
}

/// A [`ByteSliceView`] bound to the lifetime of the slice it was created from.
///
/// Useful on the Rust side of a call to keep the borrow checker aware of the
/// view's validity window.
#[derive(Copy, Clone, Debug)]
pub struct BorrowedView<'a> {
    view: ByteSliceView,
    _marker: PhantomData<&'a [u8]>,
}

impl<'a> BorrowedView<'a> {
    pub fn new(source: Option<&'a [u8]>) -> Self {
        Self {
            view: ByteSliceView::new(source),
            _marker: PhantomData,
        }
    }

    pub fn raw(&self) -> ByteSliceView {
        self.view
    }
}

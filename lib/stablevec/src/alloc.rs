//! Allocation & deallocation of [StableVecs](StableVec).
//!
//! Much of this is very similar to [std::alloc::RawVec], which would be used directly if it was
//! part of std's public interface.

use std::{
    alloc::{handle_alloc_error, Layout, LayoutError},
    mem::{self, MaybeUninit},
    ptr::NonNull,
    slice,
};

use bitvec::vec::BitVec;

use crate::StableVec;

const fn is_zst<T>() -> bool {
    mem::size_of::<T>() == 0
}

fn capacity_overflow() -> ! {
    panic!("capacity overflow")
}

#[inline]
const fn can_alloc(size: usize) -> bool {
    usize::BITS >= 64 || size <= isize::MAX as usize
}

#[inline(never)]
fn finish_grow(
    new_layout: Result<Layout, LayoutError>,
    current_memory: Option<(NonNull<u8>, Layout)>,
) -> NonNull<u8> {
    let new_layout = match new_layout {
        Ok(l) => l,
        Err(_) => capacity_overflow(),
    };
    if !can_alloc(new_layout.size()) {
        capacity_overflow()
    }

    let res = unsafe { std::alloc::alloc(new_layout) };
    if res.is_null() {
        handle_alloc_error(new_layout)
    }

    if let Some((ptr, old_layout)) = current_memory {
        debug_assert_eq!(old_layout.align(), new_layout.align());
        unsafe {
            ptr.as_ptr().copy_to_nonoverlapping(res, old_layout.size());
            std::alloc::dealloc(ptr.as_ptr(), old_layout);
        }
    }
    unsafe { NonNull::new_unchecked(res) }
}

impl<T> StableVec<T> {
    /// Minimum reserved capacity. Strategy taken from the standard library's RawVec type.
    const MIN_NON_ZERO_CAP: usize = if mem::size_of::<T>() == 1 {
        8
    } else if mem::size_of::<T>() <= 1024 {
        4
    } else {
        1
    };

    /// Create a new, empty [StableVec].
    pub fn new() -> Self {
        Self {
            data: Box::new([]),
            flags: BitVec::new(),
            count: 0,
        }
    }

    pub(crate) fn expand_flags(&mut self, new_len: usize) {
        let extra = match new_len.checked_sub(self.flags.len()) {
            Some(e) => e,
            None => return,
        };
        self.flags.reserve_exact(extra);
        for _i in 0..extra {
            self.flags.push(false);
        }
    }

    fn leak_memory(&mut self) -> Option<(NonNull<u8>, Layout)> {
        if is_zst::<T>() || self.capacity() == 0 {
            None
        } else {
            unsafe {
                Some((
                    NonNull::new_unchecked(self.data.as_mut_ptr().cast::<u8>()),
                    Layout::array::<MaybeUninit<T>>(self.capacity()).unwrap_unchecked(),
                ))
            }
        }
    }

    /// Grow capacity by at least `additional`, amortized (doubling) like `Vec`'s own growth
    /// strategy -- callback slots (`src/subscribe.rs`) get pushed one at a time as subscribers
    /// come and go, so amortized growth keeps repeated `subscribe` calls cheap.
    pub(crate) fn grow_amortized(&mut self, additional: usize) {
        if is_zst::<T>() {
            capacity_overflow()
        }
        let cap = match self.capacity().checked_add(additional) {
            Some(c) => c.max(self.len_init() * 2).max(Self::MIN_NON_ZERO_CAP),
            None => capacity_overflow(),
        };
        let new_layout = Layout::array::<T>(cap);
        let mem = finish_grow(new_layout, self.leak_memory());
        unsafe {
            self.data = Box::from_raw(slice::from_raw_parts_mut(
                mem.as_ptr().cast::<MaybeUninit<T>>(),
                cap,
            ));
        }
        self.expand_flags(self.capacity());
    }
}

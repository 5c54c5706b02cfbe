use {crate::utils::ptr_ext::PtrExt, std::cell::Cell};

/// Emptiness checks for `Cell<Option<T>>` without requiring `T: Copy`.
pub trait CellExt {
    fn is_some(&self) -> bool;

    fn is_none(&self) -> bool {
        !self.is_some()
    }
}

impl<T> CellExt for Cell<Option<T>> {
    fn is_some(&self) -> bool {
        unsafe { self.as_ptr().deref().is_some() }
    }
}

use {
    std::{cell::Cell, rc::Rc},
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum PixmapError {
    #[error("the surface has no committed buffer")]
    NoBuffer,
    #[error("the committed buffer is {actual_width}x{actual_height} but the pixmap is bound to {bound_width}x{bound_height}")]
    SizeMismatch {
        bound_width: i32,
        bound_height: i32,
        actual_width: i32,
        actual_height: i32,
    },
    #[error("the storage the pixmap was bound to is gone")]
    Defunct,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PixmapContents {
    pub width: i32,
    pub height: i32,
    pub has_alpha: bool,
}

/// Storage behind one pixmap generation.
///
/// `attach` performs the backend allocation (e.g. binding a new client
/// buffer) and may fail. `refresh` rebinds the latest contents of the
/// already attached storage and must be cheap and non-blocking; it fails if
/// the storage changed geometry underneath the binding, in which case the
/// pixmap has to be discarded and recreated.
pub trait PixmapBacking {
    fn attach(&self) -> Result<PixmapContents, PixmapError>;

    fn refresh(&self) -> Result<PixmapContents, PixmapError>;
}

/// One generation of surface contents.
///
/// A pixmap starts out invalid, becomes valid when [`create`](Self::create)
/// succeeds and stays bound to the same buffer geometry for its entire
/// life. When a newer generation supersedes it, it is marked discarded
/// exactly once. A discarded pixmap stays alive for as long as an in-flight
/// render holds a reference to it; see
/// `SurfaceItem::reference_previous_pixmap`.
pub struct SurfacePixmap {
    backing: Rc<dyn PixmapBacking>,
    valid: Cell<bool>,
    discarded: Cell<bool>,
    size: Cell<(i32, i32)>,
    has_alpha: Cell<bool>,
}

impl SurfacePixmap {
    pub fn new(backing: Rc<dyn PixmapBacking>) -> Rc<Self> {
        Rc::new(Self {
            backing,
            valid: Cell::new(false),
            discarded: Cell::new(false),
            size: Cell::new((0, 0)),
            has_alpha: Cell::new(false),
        })
    }

    pub fn is_valid(&self) -> bool {
        self.valid.get()
    }

    pub fn is_discarded(&self) -> bool {
        self.discarded.get()
    }

    pub fn mark_discarded(&self) {
        debug_assert!(!self.discarded.get());
        self.discarded.set(true);
    }

    pub fn size(&self) -> (i32, i32) {
        self.size.get()
    }

    pub fn has_alpha(&self) -> bool {
        self.has_alpha.get()
    }

    /// Allocates the backing storage. Failure is not fatal; the item keeps
    /// painting from the previous pixmap and retries on the next damage.
    pub fn create(&self) -> Result<(), PixmapError> {
        let contents = self.backing.attach()?;
        self.size.set((contents.width, contents.height));
        self.has_alpha.set(contents.has_alpha);
        self.valid.set(true);
        Ok(())
    }

    /// Rebinds the latest committed contents. On failure the pixmap
    /// becomes invalid and the next paint pass recreates it.
    pub fn update(&self) -> Result<(), PixmapError> {
        match self.backing.refresh() {
            Ok(contents) => {
                self.has_alpha.set(contents.has_alpha);
                Ok(())
            }
            Err(e) => {
                self.valid.set(false);
                Err(e)
            }
        }
    }
}

use {
    crate::{
        format::Format,
        rect::Region,
        surface::{
            Surface, SurfaceBackend,
            pixmap::{PixmapBacking, PixmapContents, PixmapError, SurfacePixmap},
        },
        utils::clonecell::CloneCell,
    },
    std::{
        cell::{Cell, RefCell},
        rc::Rc,
    },
};

/// One client buffer generation.
///
/// The protocol layer creates one of these per committed wl_buffer (or X11
/// pixmap) and hands it to [`ClientSurfaceBackend::commit`]. The scene
/// never writes to it.
pub struct GraphicsBuffer {
    pub width: i32,
    pub height: i32,
    pub format: &'static Format,
}

impl GraphicsBuffer {
    pub fn new(width: i32, height: i32, format: &'static Format) -> Rc<Self> {
        Rc::new(Self {
            width,
            height,
            format,
        })
    }
}

/// The latest committed buffer, shared between the backend and all pixmap
/// bindings created from it.
struct BufferSlot {
    buffer: CloneCell<Option<Rc<GraphicsBuffer>>>,
}

/// Surface contents backed by client-committed buffers. This is the
/// Wayland and X11 case.
pub struct ClientSurfaceBackend {
    slot: Rc<BufferSlot>,
    opaque: RefCell<Region>,
}

impl ClientSurfaceBackend {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            slot: Rc::new(BufferSlot {
                buffer: Default::default(),
            }),
            opaque: Default::default(),
        })
    }

    pub fn buffer(&self) -> Option<Rc<GraphicsBuffer>> {
        self.slot.buffer.get()
    }

    /// Applies one client commit: the new buffer, the damage accumulated
    /// in the commit, and the opaque region state.
    pub fn commit(
        &self,
        surface: &Surface,
        buffer: Option<Rc<GraphicsBuffer>>,
        damage: &Region,
        opaque: Region,
    ) {
        *self.opaque.borrow_mut() = opaque;
        let old = self.slot.buffer.set(buffer.clone());
        let Some(buffer) = buffer else {
            surface.set_mapped(false);
            return;
        };
        let geometry_changed = match &old {
            Some(old) => {
                (old.width, old.height) != (buffer.width, buffer.height)
                    || old.format != buffer.format
            }
            None => false,
        };
        if geometry_changed {
            surface.handle_buffer_geometry_changed();
        }
        surface.apply_damage(damage);
    }
}

impl SurfaceBackend for ClientSurfaceBackend {
    fn create_pixmap(&self, _surface: &Rc<Surface>) -> Rc<SurfacePixmap> {
        SurfacePixmap::new(Rc::new(ClientPixmapBacking {
            slot: self.slot.clone(),
            bound: Default::default(),
            bound_size: Cell::new(None),
        }))
    }

    fn shape(&self, surface: &Surface) -> Region {
        Region::new(surface.rect())
    }

    fn opaque(&self, surface: &Surface) -> Region {
        let rect = surface.rect();
        if let Some(buffer) = self.slot.buffer.get() {
            if !buffer.format.has_alpha {
                return Region::new(rect);
            }
        }
        self.opaque.borrow().intersected(rect)
    }
}

struct ClientPixmapBacking {
    slot: Rc<BufferSlot>,
    /// The buffer this binding currently presents from. Keeping the `Rc`
    /// alive is what allows a discarded pixmap to outlive newer commits.
    bound: CloneCell<Option<Rc<GraphicsBuffer>>>,
    bound_size: Cell<Option<(i32, i32)>>,
}

impl PixmapBacking for ClientPixmapBacking {
    fn attach(&self) -> Result<PixmapContents, PixmapError> {
        let buffer = self.slot.buffer.get().ok_or(PixmapError::NoBuffer)?;
        self.bound_size.set(Some((buffer.width, buffer.height)));
        let contents = PixmapContents {
            width: buffer.width,
            height: buffer.height,
            has_alpha: buffer.format.has_alpha,
        };
        self.bound.set(Some(buffer));
        Ok(contents)
    }

    fn refresh(&self) -> Result<PixmapContents, PixmapError> {
        let Some((bound_width, bound_height)) = self.bound_size.get() else {
            return Err(PixmapError::NoBuffer);
        };
        // The binding attached to a buffer that has since been retracted.
        let buffer = self.slot.buffer.get().ok_or(PixmapError::Defunct)?;
        if (buffer.width, buffer.height) != (bound_width, bound_height) {
            return Err(PixmapError::SizeMismatch {
                bound_width,
                bound_height,
                actual_width: buffer.width,
                actual_height: buffer.height,
            });
        }
        let contents = PixmapContents {
            width: buffer.width,
            height: buffer.height,
            has_alpha: buffer.format.has_alpha,
        };
        self.bound.set(Some(buffer));
        Ok(contents)
    }
}

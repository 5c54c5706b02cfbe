use {
    crate::{
        rect::Region,
        surface::{
            Surface, SurfaceBackend,
            pixmap::{PixmapBacking, PixmapContents, PixmapError, SurfacePixmap},
        },
    },
    std::rc::Rc,
};

/// Surface contents rendered by the compositor itself, e.g. on-screen
/// display elements. Allocation cannot fail and the contents always have
/// an alpha channel.
pub struct InternalSurfaceBackend;

impl InternalSurfaceBackend {
    pub fn new() -> Rc<Self> {
        Rc::new(Self)
    }
}

impl SurfaceBackend for InternalSurfaceBackend {
    fn create_pixmap(&self, surface: &Rc<Surface>) -> Rc<SurfacePixmap> {
        SurfacePixmap::new(Rc::new(InternalPixmapBacking {
            surface: surface.clone(),
        }))
    }

    fn shape(&self, surface: &Surface) -> Region {
        Region::new(surface.rect())
    }

    fn opaque(&self, _surface: &Surface) -> Region {
        Region::empty()
    }
}

struct InternalPixmapBacking {
    surface: Rc<Surface>,
}

impl PixmapBacking for InternalPixmapBacking {
    fn attach(&self) -> Result<PixmapContents, PixmapError> {
        let (width, height) = self.surface.buffer_size();
        Ok(PixmapContents {
            width,
            height,
            has_alpha: true,
        })
    }

    fn refresh(&self) -> Result<PixmapContents, PixmapError> {
        self.attach()
    }
}

pub mod client;
pub mod internal;
pub mod pixmap;

use {
    crate::{
        rect::{Rect, Region},
        scene::{item::Node, surface_item::SurfaceItem},
        surface::pixmap::SurfacePixmap,
        utils::clonecell::CloneCell,
    },
    std::{
        cell::{Cell, RefCell},
        rc::Rc,
    },
};

id!(SurfaceId, SurfaceIds);

/// Buffer-to-surface transform of committed contents.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Transform {
    #[default]
    Normal,
    Rotate90,
    Rotate180,
    Rotate270,
    Flipped,
    Flipped90,
    Flipped180,
    Flipped270,
}

impl Transform {
    pub fn swaps_dimensions(self) -> bool {
        match self {
            Transform::Normal => false,
            Transform::Rotate90 => true,
            Transform::Rotate180 => false,
            Transform::Rotate270 => true,
            Transform::Flipped => false,
            Transform::Flipped90 => true,
            Transform::Flipped180 => false,
            Transform::Flipped270 => true,
        }
    }
}

/// Backend-specific behavior of a surface.
///
/// One implementation per contents source: client buffers committed over a
/// wire protocol ([`client::ClientSurfaceBackend`]) or textures rendered by
/// the compositor itself ([`internal::InternalSurfaceBackend`]). The trait
/// is deliberately small; surfaces differ only in how pixel contents come
/// into existence, not in how they sit in the scene graph.
pub trait SurfaceBackend {
    /// Returns a fresh, not yet valid pixmap for this surface.
    fn create_pixmap(&self, surface: &Rc<Surface>) -> Rc<SurfacePixmap>;

    /// The input/render shape of the surface in surface-local coordinates.
    fn shape(&self, surface: &Surface) -> Region;

    /// The region known to be fully opaque, in surface-local coordinates.
    fn opaque(&self, surface: &Surface) -> Region;

    /// Backends that have to actively fetch damage before the pixel
    /// contents can be trusted (e.g. X11) return it here. Called once per
    /// paint pass before the pixmap is updated.
    fn fetch_damage(&self) -> Option<Region> {
        None
    }
}

/// The abstract contents of one window or subsurface.
///
/// All coordinates are logical. The protocol layer drives a surface
/// exclusively through the `set_*`/`apply_*` methods below; each of them
/// synchronously forwards to the observing [`SurfaceItem`], which turns the
/// change into damage and repaint scheduling. There is no deferred
/// notification step.
pub struct Surface {
    pub id: SurfaceId,
    backend: Rc<dyn SurfaceBackend>,
    parent: CloneCell<Option<Rc<Surface>>>,
    below: RefCell<Vec<Rc<Surface>>>,
    above: RefCell<Vec<Rc<Surface>>>,
    position: Cell<(i32, i32)>,
    size: Cell<(i32, i32)>,
    buffer_scale: Cell<i32>,
    buffer_transform: Cell<Transform>,
    mapped: Cell<bool>,
    item: CloneCell<Option<Rc<SurfaceItem>>>,
}

impl Surface {
    pub fn new(ids: &SurfaceIds, backend: Rc<dyn SurfaceBackend>) -> Rc<Self> {
        Rc::new(Self {
            id: ids.next(),
            backend,
            parent: Default::default(),
            below: Default::default(),
            above: Default::default(),
            position: Cell::new((0, 0)),
            size: Cell::new((0, 0)),
            buffer_scale: Cell::new(1),
            buffer_transform: Cell::new(Transform::Normal),
            mapped: Cell::new(false),
            item: Default::default(),
        })
    }

    pub fn backend(&self) -> &Rc<dyn SurfaceBackend> {
        &self.backend
    }

    pub fn item(&self) -> Option<Rc<SurfaceItem>> {
        self.item.get()
    }

    pub fn set_item(&self, item: Option<Rc<SurfaceItem>>) {
        self.item.set(item);
    }

    pub fn parent(&self) -> Option<Rc<Surface>> {
        self.parent.get()
    }

    pub fn position(&self) -> (i32, i32) {
        self.position.get()
    }

    /// Moves the surface relative to its parent surface.
    pub fn set_position(&self, x: i32, y: i32) {
        if self.position.replace((x, y)) == (x, y) {
            return;
        }
        if let Some(item) = self.item.get() {
            item.set_position(x, y);
        }
    }

    pub fn size(&self) -> (i32, i32) {
        self.size.get()
    }

    pub fn set_size(&self, width: i32, height: i32) {
        if self.size.replace((width, height)) == (width, height) {
            return;
        }
        if let Some(item) = self.item.get() {
            item.handle_surface_size_changed();
        }
    }

    pub fn rect(&self) -> Rect {
        let (width, height) = self.size.get();
        Rect::new_sized(0, 0, width.max(0), height.max(0)).unwrap_or_default()
    }

    pub fn buffer_scale(&self) -> i32 {
        self.buffer_scale.get()
    }

    pub fn set_buffer_scale(&self, scale: i32) {
        if self.buffer_scale.replace(scale) == scale {
            return;
        }
        self.handle_buffer_geometry_changed();
    }

    pub fn buffer_transform(&self) -> Transform {
        self.buffer_transform.get()
    }

    pub fn set_buffer_transform(&self, transform: Transform) {
        if self.buffer_transform.replace(transform) == transform {
            return;
        }
        self.handle_buffer_geometry_changed();
    }

    /// The size the committed buffer must have for the current
    /// scale/transform state.
    pub fn buffer_size(&self) -> (i32, i32) {
        let (mut width, mut height) = self.size.get();
        width *= self.buffer_scale.get();
        height *= self.buffer_scale.get();
        if self.buffer_transform.get().swaps_dimensions() {
            (height, width)
        } else {
            (width, height)
        }
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped.get()
    }

    pub fn set_mapped(&self, mapped: bool) {
        if self.mapped.replace(mapped) == mapped {
            return;
        }
        if let Some(item) = self.item.get() {
            item.handle_mapped_changed();
        }
    }

    pub fn below(&self) -> Vec<Rc<Surface>> {
        self.below.borrow().clone()
    }

    pub fn above(&self) -> Vec<Rc<Surface>> {
        self.above.borrow().clone()
    }

    /// Replaces the subsurface stacking lists. Both lists are in paint
    /// order, bottom to top.
    pub fn set_subsurfaces(self: &Rc<Self>, below: Vec<Rc<Surface>>, above: Vec<Rc<Surface>>) {
        for sub in below.iter().chain(above.iter()) {
            sub.parent.set(Some(self.clone()));
        }
        *self.below.borrow_mut() = below;
        *self.above.borrow_mut() = above;
        if let Some(item) = self.item.get() {
            item.handle_subsurfaces_changed();
        }
    }

    pub fn shape(&self) -> Region {
        self.backend.shape(self)
    }

    pub fn opaque(&self) -> Region {
        self.backend.opaque(self)
    }

    /// New damage in surface-local coordinates, e.g. from a buffer commit.
    pub fn apply_damage(&self, region: &Region) {
        if let Some(item) = self.item.get() {
            item.add_damage(region);
        }
    }

    /// The committed buffer was replaced by one with different geometry or
    /// format. The current pixmap can no longer be trusted.
    pub fn handle_buffer_geometry_changed(&self) {
        if let Some(item) = self.item.get() {
            item.discard_pixmap();
        }
    }

    /// Severs the link between this surface and the scene. Called when the
    /// association between window and contents ends.
    pub fn destroy(&self) {
        self.parent.take();
        self.below.borrow_mut().clear();
        self.above.borrow_mut().clear();
        self.item.take();
    }
}

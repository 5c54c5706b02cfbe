use {
    crate::{
        rect::{Rect, Region},
        scene::{
            Scene,
            item::{ItemBase, Node, set_node_parent},
        },
        surface::{Surface, SurfaceId, pixmap::SurfacePixmap},
        utils::{
            clonecell::CloneCell, copyhashmap::CopyHashMap, errorfmt::ErrorFmt, numcell::NumCell,
        },
    },
    std::{cell::RefCell, rc::Rc},
};

/// The item that paints the contents of one [`Surface`].
///
/// It tracks accumulated damage, the current pixmap generation, and at most
/// one discarded previous generation that in-flight renders may still
/// reference. Subsurfaces become child `SurfaceItem`s.
pub struct SurfaceItem {
    base: ItemBase,
    surface: Rc<Surface>,
    pixmap: CloneCell<Option<Rc<SurfacePixmap>>>,
    previous_pixmap: CloneCell<Option<Rc<SurfacePixmap>>>,
    /// The number of outstanding references to the discarded previous
    /// pixmap. The discard itself holds one.
    previous_pixmap_refs: NumCell<u32>,
    damage: RefCell<Region>,
    quads: RefCell<Option<Vec<Rect>>>,
    subsurface_items: CopyHashMap<SurfaceId, Rc<SurfaceItem>>,
}

impl SurfaceItem {
    pub fn new(scene: &Rc<Scene>, surface: &Rc<Surface>) -> Rc<Self> {
        let slf = Rc::new(Self {
            base: ItemBase::new(scene),
            surface: surface.clone(),
            pixmap: Default::default(),
            previous_pixmap: Default::default(),
            previous_pixmap_refs: Default::default(),
            damage: Default::default(),
            quads: Default::default(),
            subsurface_items: Default::default(),
        });
        surface.set_item(Some(slf.clone()));
        let (x, y) = surface.position();
        slf.base.position.set((x, y));
        slf.base.size.set(surface.size());
        slf.base.visible.set(surface.is_mapped());
        slf.handle_subsurfaces_changed();
        slf
    }

    pub fn surface(&self) -> &Rc<Surface> {
        &self.surface
    }

    /// New damage in item-local coordinates. Accumulates until the next
    /// successful paint and bubbles up as a repaint immediately.
    pub fn add_damage(&self, region: &Region) {
        if region.is_empty() {
            return;
        }
        self.damage.borrow_mut().union(region);
        self.base.schedule_repaint(region);
    }

    pub fn damage(&self) -> Region {
        self.damage.borrow().clone()
    }

    pub fn reset_damage(&self) {
        self.damage.borrow_mut().clear();
    }

    /// The pixmap to paint from. Prefers the current generation, falls back
    /// to the discarded previous one while the current one is not yet
    /// valid.
    pub fn pixmap(&self) -> Option<Rc<SurfacePixmap>> {
        if let Some(pixmap) = self.pixmap.get()
            && pixmap.is_valid()
        {
            return Some(pixmap);
        }
        if let Some(previous) = self.previous_pixmap.get()
            && previous.is_valid()
        {
            return Some(previous);
        }
        None
    }

    pub fn previous_pixmap(&self) -> Option<Rc<SurfacePixmap>> {
        self.previous_pixmap.get()
    }

    /// Brings the current pixmap up to date with the committed contents.
    /// Failure is not fatal; the previous generation keeps being painted
    /// and the next paint pass retries.
    pub fn update_pixmap(&self) {
        let pixmap = match self.pixmap.get() {
            Some(pixmap) => pixmap,
            None => {
                let pixmap = self.surface.backend().create_pixmap(&self.surface);
                self.pixmap.set(Some(pixmap.clone()));
                pixmap
            }
        };
        if pixmap.is_valid() {
            if let Err(e) = pixmap.update() {
                log::debug!("Could not update surface pixmap: {}", ErrorFmt(e));
            }
        } else {
            match pixmap.create() {
                Ok(()) => {
                    self.unreference_previous_pixmap();
                    self.discard_quads();
                }
                Err(e) => {
                    log::debug!("Could not allocate surface pixmap: {}", ErrorFmt(e));
                }
            }
        }
    }

    /// The current pixmap no longer matches the committed buffer geometry.
    /// A valid pixmap becomes the referenced previous generation so that it
    /// can be painted until a replacement exists; an invalid one is simply
    /// dropped.
    pub fn discard_pixmap(&self) {
        if let Some(pixmap) = self.pixmap.take() {
            if pixmap.is_valid() {
                pixmap.mark_discarded();
                let old = self.previous_pixmap.set(Some(pixmap));
                if old.is_some() && self.previous_pixmap_refs.get() > 0 {
                    log::error!("Dropping a previous pixmap that is still referenced");
                    debug_assert!(false);
                }
                self.previous_pixmap_refs.set(1);
            }
        }
        self.discard_quads();
        self.add_damage(&Region::new(self.base.rect()));
    }

    /// Called by renderers that submitted a frame sampling the previous
    /// pixmap. Keeps the pixmap alive until the frame has completed.
    pub fn reference_previous_pixmap(&self) {
        if let Some(previous) = self.previous_pixmap.get()
            && previous.is_discarded()
        {
            self.previous_pixmap_refs.fetch_add(1);
        }
    }

    pub fn unreference_previous_pixmap(&self) {
        let Some(previous) = self.previous_pixmap.get() else {
            return;
        };
        if !previous.is_discarded() {
            return;
        }
        if self.previous_pixmap_refs.get() == 0 {
            log::error!("Unbalanced unreference of the previous pixmap");
            debug_assert!(false);
            return;
        }
        if self.previous_pixmap_refs.fetch_sub(1) == 1 {
            self.previous_pixmap.take();
        }
    }

    /// The tessellation of the paintable area, derived from the surface
    /// shape and cached until the geometry changes.
    pub fn quads(&self) -> Vec<Rect> {
        let mut quads = self.quads.borrow_mut();
        if let Some(quads) = &*quads {
            return quads.clone();
        }
        let fresh = self.surface.shape().rects().to_vec();
        *quads = Some(fresh.clone());
        fresh
    }

    pub fn discard_quads(&self) {
        self.quads.take();
    }

    pub fn handle_surface_size_changed(&self) {
        let (width, height) = self.surface.size();
        self.set_size(width, height);
    }

    pub fn handle_mapped_changed(&self) {
        self.set_visible(self.surface.is_mapped());
    }

    /// Rebuilds the child items from the surface's subsurface lists.
    /// Children below the parent surface get negative z values so that the
    /// parent itself paints at z = 0.
    pub fn handle_subsurfaces_changed(self: &Rc<Self>) {
        let below = self.surface.below();
        let above = self.surface.above();
        let stale: Vec<_> = self
            .subsurface_items
            .lock()
            .values()
            .filter(|item| {
                let id = item.surface.id;
                !below.iter().chain(above.iter()).any(|s| s.id == id)
            })
            .cloned()
            .collect();
        for item in stale {
            self.subsurface_items.remove(&item.surface.id);
            item.destroy_node();
        }
        for (i, sub) in below.iter().enumerate() {
            let item = self.ensure_subsurface_item(sub);
            item.set_z(i as i32 - below.len() as i32);
        }
        for (i, sub) in above.iter().enumerate() {
            let item = self.ensure_subsurface_item(sub);
            item.set_z(i as i32);
        }
    }

    fn ensure_subsurface_item(self: &Rc<Self>, sub: &Rc<Surface>) -> Rc<SurfaceItem> {
        if let Some(item) = self.subsurface_items.get(&sub.id) {
            return item;
        }
        let item = SurfaceItem::new(self.base.scene(), sub);
        set_node_parent(
            &(item.clone() as Rc<dyn Node>),
            Some(&(self.clone() as Rc<dyn Node>)),
        );
        let (x, y) = sub.position();
        item.set_position(x, y);
        self.subsurface_items.set(sub.id, item.clone());
        item
    }
}

impl Node for SurfaceItem {
    fn base(&self) -> &ItemBase {
        &self.base
    }

    fn into_node(self: Rc<Self>) -> Rc<dyn Node> {
        self
    }

    fn shape(&self) -> Region {
        self.surface.shape()
    }

    fn opaque(&self) -> Region {
        self.surface.opaque()
    }

    fn preprocess(self: Rc<Self>) {
        if let Some(damage) = self.surface.backend().fetch_damage() {
            self.add_damage(&damage);
        }
        if !self.damage.borrow().is_empty() || self.pixmap.get().is_none() {
            self.update_pixmap();
        }
    }

    fn into_surface_item(self: Rc<Self>) -> Option<Rc<SurfaceItem>> {
        Some(self)
    }

    fn handle_size_changed(&self) {
        self.discard_quads();
    }

    fn destroy_node(&self) {
        self.surface.set_item(None);
        self.subsurface_items.clear();
        self.pixmap.take();
        self.previous_pixmap.take();
        self.base.destroy();
    }
}

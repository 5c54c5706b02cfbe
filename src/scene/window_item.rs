use {
    crate::{
        scene::{
            Scene,
            decoration_item::DecorationItem,
            item::{ItemBase, Node, set_node_parent},
            shadow_item::ShadowItem,
            surface_item::SurfaceItem,
        },
        surface::Surface,
        utils::{clonecell::CloneCell, numcell::NumCell},
        window::Window,
    },
    linearize::{Linearize, StaticMap},
    std::rc::Rc,
};

/// Why a window that would normally be hidden must stay visible, e.g. while
/// an effect animates it. Each reason is reference counted independently.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Linearize)]
pub enum VisibilityReason {
    Lock,
    Delete,
    Desktop,
    Minimize,
    Activity,
    Hidden,
}

/// The root item of one toplevel window.
///
/// Its children are the surface item with the window contents and the
/// optional shadow and decoration items. The window item derives its
/// visibility from the window flags and the per-reason force-visible
/// counters.
pub struct WindowItem {
    base: ItemBase,
    window: Rc<Window>,
    surface_item: CloneCell<Option<Rc<SurfaceItem>>>,
    shadow_item: CloneCell<Option<Rc<ShadowItem>>>,
    decoration_item: CloneCell<Option<Rc<DecorationItem>>>,
    force_visible: StaticMap<VisibilityReason, NumCell<u32>>,
}

impl WindowItem {
    pub fn new(scene: &Rc<Scene>, window: &Rc<Window>, surface: &Rc<Surface>) -> Rc<Self> {
        let slf = Rc::new(Self {
            base: ItemBase::new(scene),
            window: window.clone(),
            surface_item: Default::default(),
            shadow_item: Default::default(),
            decoration_item: Default::default(),
            force_visible: Default::default(),
        });
        window.set_item(Some(slf.clone()));
        let rect = window.rect();
        slf.base.position.set((rect.x1(), rect.y1()));
        slf.base.size.set((rect.width(), rect.height()));
        let surface_item = SurfaceItem::new(scene, surface);
        set_node_parent(
            &(surface_item.clone() as Rc<dyn Node>),
            Some(&(slf.clone() as Rc<dyn Node>)),
        );
        slf.surface_item.set(Some(surface_item));
        slf.update_decoration_item();
        slf.update_shadow_item();
        slf.update_visibility();
        scene.add_window(&slf);
        slf
    }

    pub fn window(&self) -> &Rc<Window> {
        &self.window
    }

    pub fn surface_item(&self) -> Option<Rc<SurfaceItem>> {
        self.surface_item.get()
    }

    pub fn shadow_item(&self) -> Option<Rc<ShadowItem>> {
        self.shadow_item.get()
    }

    pub fn decoration_item(&self) -> Option<Rc<DecorationItem>> {
        self.decoration_item.get()
    }

    /// Forces the window to stay visible for `reason` until the matching
    /// [`unref_visible`](Self::unref_visible).
    pub fn ref_visible(&self, reason: VisibilityReason) {
        self.force_visible[reason].fetch_add(1);
        self.update_visibility();
    }

    pub fn unref_visible(&self, reason: VisibilityReason) {
        if self.force_visible[reason].get() == 0 {
            log::error!("Unbalanced visibility unreference for {:?}", reason);
            debug_assert!(false);
            return;
        }
        self.force_visible[reason].fetch_sub(1);
        self.update_visibility();
    }

    fn compute_visibility(&self) -> bool {
        let window = &self.window;
        if self.base.scene().screen_locked() {
            let shown_over_lock = window.is_lock_screen()
                || window.is_input_method()
                || self.force_visible[VisibilityReason::Lock].get() > 0;
            if !shown_over_lock {
                return false;
            }
        }
        if window.is_deleted() && self.force_visible[VisibilityReason::Delete].get() == 0 {
            return false;
        }
        if !window.is_on_current_desktop() && self.force_visible[VisibilityReason::Desktop].get() == 0
        {
            return false;
        }
        if !window.is_on_current_activity()
            && self.force_visible[VisibilityReason::Activity].get() == 0
        {
            return false;
        }
        if window.is_minimized() && self.force_visible[VisibilityReason::Minimize].get() == 0 {
            return false;
        }
        if window.is_hidden() && self.force_visible[VisibilityReason::Hidden].get() == 0 {
            return false;
        }
        true
    }

    pub fn update_visibility(&self) {
        self.set_visible(self.compute_visibility());
    }

    pub fn update_shadow_item(self: &Rc<Self>) {
        let current = self.shadow_item.get();
        let Some(shadow) = self.window.shadow() else {
            if let Some(item) = current {
                self.shadow_item.take();
                item.destroy_node();
            }
            return;
        };
        if let Some(item) = &current
            && Rc::ptr_eq(item.shadow(), &shadow)
        {
            return;
        }
        if let Some(item) = current {
            self.shadow_item.take();
            item.destroy_node();
        }
        let item = ShadowItem::new(self.base.scene(), &shadow, &self.window);
        set_node_parent(
            &(item.clone() as Rc<dyn Node>),
            Some(&(self.clone() as Rc<dyn Node>)),
        );
        // The shadow paints below everything else in the window.
        let above: Option<Rc<dyn Node>> = match self.decoration_item.get() {
            Some(decoration) => Some(decoration),
            None => self.surface_item.get().map(|s| s as Rc<dyn Node>),
        };
        if let Some(above) = above {
            item.stack_before(&above);
        }
        self.shadow_item.set(Some(item));
    }

    pub fn update_decoration_item(self: &Rc<Self>) {
        let current = self.decoration_item.get();
        let Some(decoration) = self.window.decoration() else {
            if let Some(item) = current {
                self.decoration_item.take();
                item.destroy_node();
            }
            self.update_content_position();
            return;
        };
        if let Some(item) = &current
            && Rc::ptr_eq(item.decoration(), &decoration)
        {
            return;
        }
        if let Some(item) = current {
            self.decoration_item.take();
            item.destroy_node();
        }
        let item = DecorationItem::new(self.base.scene(), &decoration, &self.window);
        set_node_parent(
            &(item.clone() as Rc<dyn Node>),
            Some(&(self.clone() as Rc<dyn Node>)),
        );
        match self.shadow_item.get() {
            Some(shadow) => item.stack_after(&(shadow as Rc<dyn Node>)),
            None => {
                if let Some(surface) = self.surface_item.get() {
                    item.stack_before(&(surface as Rc<dyn Node>));
                }
            }
        }
        self.decoration_item.set(Some(item));
        self.update_content_position();
    }

    /// Keeps the contents offset by the decoration borders.
    pub fn update_content_position(&self) {
        let (x, y) = match self.window.decoration() {
            Some(decoration) => {
                let borders = decoration.borders();
                (borders.left, borders.top)
            }
            None => (0, 0),
        };
        if let Some(item) = self.surface_item.get() {
            item.set_position(x, y);
        }
    }

    pub fn handle_frame_geometry_changed(&self) {
        let rect = self.window.rect();
        self.set_position(rect.x1(), rect.y1());
        self.set_size(rect.width(), rect.height());
        if let Some(item) = self.shadow_item.get() {
            item.update_geometry();
        }
        if let Some(item) = self.decoration_item.get() {
            item.update_geometry();
        }
    }
}

impl Node for WindowItem {
    fn base(&self) -> &ItemBase {
        &self.base
    }

    fn into_node(self: Rc<Self>) -> Rc<dyn Node> {
        self
    }

    fn destroy_node(&self) {
        self.window.set_item(None);
        self.base.scene().remove_window(self.base.id);
        self.surface_item.take();
        self.shadow_item.take();
        self.decoration_item.take();
        self.base.destroy();
    }
}

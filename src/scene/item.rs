use {
    crate::{
        rect::{Rect, Region},
        scene::{Scene, surface_item::SurfaceItem},
        utils::clonecell::CloneCell,
    },
    std::{
        cell::{Cell, RefCell},
        mem,
        rc::Rc,
    },
};

id!(ItemId, ItemIds);

/// A node in the scene graph.
///
/// Concrete items embed an [`ItemBase`] and implement `base`/`into_node`.
/// Everything else has a default implementation. Items own their children;
/// dropping an item without calling [`destroy_node`](Node::destroy_node)
/// first is a bug because parent and child keep each other alive.
pub trait Node {
    fn base(&self) -> &ItemBase;

    fn into_node(self: Rc<Self>) -> Rc<dyn Node>;

    fn id(&self) -> ItemId {
        self.base().id
    }

    /// The renderable shape in item-local coordinates.
    fn shape(&self) -> Region {
        Region::new(self.base().rect())
    }

    /// The part of the item known to be fully opaque, in item-local
    /// coordinates.
    fn opaque(&self) -> Region {
        Region::empty()
    }

    /// Called once per paint pass before the stack is rendered.
    fn preprocess(self: Rc<Self>) {}

    fn into_surface_item(self: Rc<Self>) -> Option<Rc<SurfaceItem>> {
        None
    }

    /// Hook invoked after the size of the item changed.
    fn handle_size_changed(&self) {}

    fn set_position(&self, x: i32, y: i32) {
        let base = self.base();
        if base.position.get() == (x, y) {
            return;
        }
        // The whole subtree moves along, so damage the bounding rect.
        base.schedule_repaint(&Region::new(base.bounding_rect()));
        base.position.set((x, y));
        base.invalidate_parent_bounding_rects();
        base.schedule_repaint(&Region::new(base.bounding_rect()));
    }

    fn set_size(&self, width: i32, height: i32) {
        let base = self.base();
        if base.size.get() == (width, height) {
            return;
        }
        base.schedule_repaint(&Region::new(base.rect()));
        base.size.set((width, height));
        base.invalidate_bounding_rects();
        base.schedule_repaint(&Region::new(base.rect()));
        self.handle_size_changed();
    }

    /// Explicit visibility. The item is painted if it and all of its
    /// ancestors are visible.
    fn set_visible(&self, visible: bool) {
        let base = self.base();
        if base.visible.replace(visible) == visible {
            return;
        }
        // The repaint must be scheduled even when the item just became
        // invisible, so bypass the visibility check.
        base.schedule_repaint_internal(&Region::new(base.bounding_rect()));
    }

    fn set_z(&self, z: i32) {
        let base = self.base();
        if base.z.replace(z) == z {
            return;
        }
        if let Some(parent) = base.parent.get() {
            parent.base().sorted_children_dirty.set(true);
        }
        base.schedule_repaint(&Region::new(base.bounding_rect()));
    }

    fn set_parent(self: &Rc<Self>, parent: Option<&Rc<dyn Node>>)
    where
        Self: Sized + 'static,
    {
        set_node_parent(&self.clone().into_node(), parent);
    }

    fn stack_before(self: &Rc<Self>, sibling: &Rc<dyn Node>)
    where
        Self: Sized + 'static,
    {
        restack_node(&self.clone().into_node(), sibling, false);
    }

    fn stack_after(self: &Rc<Self>, sibling: &Rc<dyn Node>)
    where
        Self: Sized + 'static,
    {
        restack_node(&self.clone().into_node(), sibling, true);
    }

    /// Destroys this item and its entire subtree and detaches it from its
    /// parent. Overrides must sever their own links and then call
    /// `self.base().destroy()`.
    fn destroy_node(&self) {
        self.base().destroy();
    }
}

pub struct ItemBase {
    pub id: ItemId,
    pub(super) scene: Rc<Scene>,
    pub(super) position: Cell<(i32, i32)>,
    pub(super) size: Cell<(i32, i32)>,
    pub(super) z: Cell<i32>,
    pub(super) visible: Cell<bool>,
    pub(super) parent: CloneCell<Option<Rc<dyn Node>>>,
    pub(super) children: RefCell<Vec<Rc<dyn Node>>>,
    pub(super) sorted_children: RefCell<Vec<Rc<dyn Node>>>,
    pub(super) sorted_children_dirty: Cell<bool>,
    pub(super) bounding_rect: Cell<Rect>,
    pub(super) bounding_rect_dirty: Cell<bool>,
}

impl ItemBase {
    pub fn new(scene: &Rc<Scene>) -> Self {
        Self {
            id: scene.item_ids.next(),
            scene: scene.clone(),
            position: Cell::new((0, 0)),
            size: Cell::new((0, 0)),
            z: Cell::new(0),
            visible: Cell::new(true),
            parent: Default::default(),
            children: Default::default(),
            sorted_children: Default::default(),
            sorted_children_dirty: Cell::new(false),
            bounding_rect: Cell::new(Rect::default()),
            bounding_rect_dirty: Cell::new(true),
        }
    }

    pub fn scene(&self) -> &Rc<Scene> {
        &self.scene
    }

    pub fn position(&self) -> (i32, i32) {
        self.position.get()
    }

    pub fn size(&self) -> (i32, i32) {
        self.size.get()
    }

    pub fn z(&self) -> i32 {
        self.z.get()
    }

    pub fn visible(&self) -> bool {
        self.visible.get()
    }

    pub fn parent(&self) -> Option<Rc<dyn Node>> {
        self.parent.get()
    }

    pub fn children(&self) -> Vec<Rc<dyn Node>> {
        self.children.borrow().clone()
    }

    /// The item-local rect covered by the item itself.
    pub fn rect(&self) -> Rect {
        let (width, height) = self.size.get();
        Rect::new_sized(0, 0, width.max(0), height.max(0)).unwrap_or_default()
    }

    /// The union of `rect()` and all descendant bounding rects mapped into
    /// this item's coordinate space. Invalidated on geometry changes and
    /// recomputed on demand.
    pub fn bounding_rect(&self) -> Rect {
        if !self.bounding_rect_dirty.get() {
            return self.bounding_rect.get();
        }
        let mut bounding = self.rect();
        for child in self.children.borrow().iter() {
            let base = child.base();
            let (x, y) = base.position.get();
            bounding = bounding.union(base.bounding_rect().move_(x, y));
        }
        self.bounding_rect.set(bounding);
        self.bounding_rect_dirty.set(false);
        bounding
    }

    /// Children in paint order, back to front: stable-sorted by z.
    pub fn sorted_children(&self) -> Vec<Rc<dyn Node>> {
        if self.sorted_children_dirty.replace(false) {
            let mut sorted = self.children.borrow().clone();
            sorted.sort_by_key(|c| c.base().z.get());
            *self.sorted_children.borrow_mut() = sorted;
        }
        self.sorted_children.borrow().clone()
    }

    /// Reorders children to match `order` (back to front). Children not
    /// listed keep their relative order and end up on top.
    pub fn stack_children(&self, order: &[ItemId]) {
        let index = |id: ItemId| order.iter().position(|&o| o == id).unwrap_or(usize::MAX);
        self.children
            .borrow_mut()
            .sort_by_key(|c| index(c.base().id));
        self.sorted_children_dirty.set(true);
        self.schedule_repaint(&Region::new(self.bounding_rect()));
    }

    pub fn effective_visible(&self) -> bool {
        if !self.visible.get() {
            return false;
        }
        let mut parent = self.parent.get();
        while let Some(node) = parent {
            let base = node.base();
            if !base.visible.get() {
                return false;
            }
            parent = base.parent.get();
        }
        true
    }

    /// Maps item-local coordinates to scene coordinates.
    pub fn map_to_scene(&self, x: i32, y: i32) -> (i32, i32) {
        let (mut ox, mut oy) = self.position.get();
        let mut parent = self.parent.get();
        while let Some(node) = parent {
            let base = node.base();
            let (px, py) = base.position.get();
            ox += px;
            oy += py;
            parent = base.parent.get();
        }
        (ox + x, oy + y)
    }

    /// Bubbles a damage region, given in item-local coordinates, up to the
    /// scene, which forwards it to every affected output's render loop.
    pub fn schedule_repaint(&self, region: &Region) {
        if self.effective_visible() {
            self.schedule_repaint_internal(region);
        }
    }

    pub(super) fn schedule_repaint_internal(&self, region: &Region) {
        if region.is_empty() {
            return;
        }
        let (ox, oy) = self.map_to_scene(0, 0);
        self.scene.add_repaint(self.id, &region.translated(ox, oy));
    }

    /// Invalidates the bounding rect of this item and all its ancestors.
    pub(super) fn invalidate_bounding_rects(&self) {
        if self.bounding_rect_dirty.replace(true) {
            return;
        }
        self.invalidate_parent_bounding_rects();
    }

    /// Invalidates the bounding rects of all ancestors.
    pub(super) fn invalidate_parent_bounding_rects(&self) {
        let mut parent = self.parent.get();
        while let Some(node) = parent {
            let base = node.base();
            if base.bounding_rect_dirty.replace(true) {
                break;
            }
            parent = base.parent.get();
        }
    }

    fn add_child(&self, child: Rc<dyn Node>) {
        self.children.borrow_mut().push(child);
        self.sorted_children_dirty.set(true);
        self.invalidate_bounding_rects();
    }

    fn remove_child(&self, id: ItemId) {
        let mut children = self.children.borrow_mut();
        if let Some(pos) = children.iter().position(|c| c.base().id == id) {
            children.remove(pos);
        }
        drop(children);
        self.sorted_children_dirty.set(true);
        self.invalidate_bounding_rects();
    }

    pub(super) fn destroy(&self) {
        self.schedule_repaint_internal(&Region::new(self.bounding_rect()));
        if let Some(parent) = self.parent.take() {
            parent.base().remove_child(self.id);
        }
        let children = mem::take(&mut *self.children.borrow_mut());
        self.sorted_children.borrow_mut().clear();
        for child in children {
            child.base().parent.take();
            child.destroy_node();
        }
    }
}

/// Re-parents `item`. Re-parenting to a node inside the item's own subtree
/// is a call-site bug and is ignored.
pub fn set_node_parent(item: &Rc<dyn Node>, parent: Option<&Rc<dyn Node>>) {
    let base = item.base();
    let old = base.parent.get();
    match (&old, parent) {
        (Some(o), Some(n)) if o.base().id == n.base().id => return,
        (None, None) => return,
        _ => {}
    }
    if let Some(new_parent) = parent {
        let mut node = Some(new_parent.clone());
        while let Some(cur) = node {
            if cur.base().id == base.id {
                log::warn!("Cannot parent an item to a node in its own subtree");
                debug_assert!(false);
                return;
            }
            node = cur.base().parent.get();
        }
    }
    if let Some(old) = old {
        base.schedule_repaint(&Region::new(base.bounding_rect()));
        old.base().remove_child(base.id);
        base.parent.take();
    }
    if let Some(new_parent) = parent {
        base.parent.set(Some(new_parent.clone()));
        new_parent.base().add_child(item.clone());
        base.schedule_repaint(&Region::new(base.bounding_rect()));
    }
}

fn restack_node(item: &Rc<dyn Node>, sibling: &Rc<dyn Node>, after: bool) {
    let base = item.base();
    if base.id == sibling.base().id {
        return;
    }
    let (Some(parent), Some(sibling_parent)) = (base.parent.get(), sibling.base().parent.get())
    else {
        log::warn!("Cannot restack an item without a parent");
        return;
    };
    if parent.base().id != sibling_parent.base().id {
        log::warn!("Cannot restack items that are not siblings");
        return;
    }
    let parent = parent.base();
    {
        let mut children = parent.children.borrow_mut();
        let self_idx = children.iter().position(|c| c.base().id == base.id);
        let sibling_idx = children
            .iter()
            .position(|c| c.base().id == sibling.base().id);
        let (Some(self_idx), Some(sibling_idx)) = (self_idx, sibling_idx) else {
            return;
        };
        let target = match (after, self_idx > sibling_idx) {
            (false, true) => sibling_idx,
            (false, false) => sibling_idx - 1,
            (true, true) => sibling_idx + 1,
            (true, false) => sibling_idx,
        };
        if target == self_idx {
            return;
        }
        let node = children.remove(self_idx);
        children.insert(target, node);
    }
    parent.sorted_children_dirty.set(true);
    base.schedule_repaint(&Region::new(base.bounding_rect()));
    sibling
        .base()
        .schedule_repaint(&Region::new(sibling.base().bounding_rect()));
}

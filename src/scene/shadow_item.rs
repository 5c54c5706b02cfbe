use {
    crate::{
        rect::Region,
        scene::{
            Scene,
            item::{ItemBase, Node},
        },
        window::{Shadow, Window},
    },
    std::rc::Rc,
};

/// The item that paints the drop shadow of a window. It extends beyond the
/// window frame by the shadow margins.
pub struct ShadowItem {
    base: ItemBase,
    shadow: Rc<Shadow>,
    window: Rc<Window>,
}

impl ShadowItem {
    pub fn new(scene: &Rc<Scene>, shadow: &Rc<Shadow>, window: &Rc<Window>) -> Rc<Self> {
        let slf = Rc::new(Self {
            base: ItemBase::new(scene),
            shadow: shadow.clone(),
            window: window.clone(),
        });
        shadow.set_item(Some(slf.clone()));
        slf.update_geometry();
        slf
    }

    pub fn shadow(&self) -> &Rc<Shadow> {
        &self.shadow
    }

    pub fn update_geometry(&self) {
        let margins = self.shadow.margins();
        let rect = self.window.rect();
        self.set_position(-margins.left, -margins.top);
        self.set_size(
            rect.width() + margins.left + margins.right,
            rect.height() + margins.top + margins.bottom,
        );
    }

    pub fn handle_damaged(&self) {
        self.base.schedule_repaint(&Region::new(self.base.rect()));
    }
}

impl Node for ShadowItem {
    fn base(&self) -> &ItemBase {
        &self.base
    }

    fn into_node(self: Rc<Self>) -> Rc<dyn Node> {
        self
    }

    fn destroy_node(&self) {
        self.shadow.set_item(None);
        self.base.destroy();
    }
}

use {
    crate::{
        rect::Region,
        scene::{
            Scene,
            item::{ItemBase, Node},
        },
        window::{Decoration, Window},
    },
    std::rc::Rc,
};

/// The item that paints the server-side decoration frame of a window. It
/// covers the whole window frame; the contents item is drawn on top of it,
/// offset by the border widths.
pub struct DecorationItem {
    base: ItemBase,
    decoration: Rc<Decoration>,
    window: Rc<Window>,
}

impl DecorationItem {
    pub fn new(scene: &Rc<Scene>, decoration: &Rc<Decoration>, window: &Rc<Window>) -> Rc<Self> {
        let slf = Rc::new(Self {
            base: ItemBase::new(scene),
            decoration: decoration.clone(),
            window: window.clone(),
        });
        decoration.set_item(Some(slf.clone()));
        slf.update_geometry();
        slf
    }

    pub fn decoration(&self) -> &Rc<Decoration> {
        &self.decoration
    }

    pub fn update_geometry(&self) {
        let rect = self.window.rect();
        self.set_size(rect.width(), rect.height());
        if let Some(item) = self.window.item() {
            item.update_content_position();
        }
    }

    pub fn handle_damaged(&self) {
        self.base.schedule_repaint(&Region::new(self.base.rect()));
    }
}

impl Node for DecorationItem {
    fn base(&self) -> &ItemBase {
        &self.base
    }

    fn into_node(self: Rc<Self>) -> Rc<dyn Node> {
        self
    }

    fn destroy_node(&self) {
        self.decoration.set_item(None);
        self.base.destroy();
    }
}

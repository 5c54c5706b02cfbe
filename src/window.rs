use {
    crate::{
        rect::Rect,
        scene::{
            decoration_item::DecorationItem,
            shadow_item::ShadowItem,
            window_item::WindowItem,
        },
        utils::clonecell::CloneCell,
    },
    std::{cell::Cell, rc::Rc},
};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WindowRole {
    Normal,
    LockScreen,
    InputMethod,
}

/// The windowing-policy view of a toplevel window.
///
/// The compositing core only reads the flags; the window manager owns them
/// and flips them through the setters, which forward to the window's item.
/// A window is never deallocated while the scene might still reference it.
/// When the association with its contents ends it is marked deleted instead
/// and acts as a tombstone until the delete animation releases it.
pub struct Window {
    role: Cell<WindowRole>,
    rect: Cell<Rect>,
    deleted: Cell<bool>,
    minimized: Cell<bool>,
    hidden: Cell<bool>,
    on_current_desktop: Cell<bool>,
    on_current_activity: Cell<bool>,
    shadow: CloneCell<Option<Rc<Shadow>>>,
    decoration: CloneCell<Option<Rc<Decoration>>>,
    item: CloneCell<Option<Rc<WindowItem>>>,
}

impl Window {
    pub fn new(role: WindowRole, rect: Rect) -> Rc<Self> {
        Rc::new(Self {
            role: Cell::new(role),
            rect: Cell::new(rect),
            deleted: Cell::new(false),
            minimized: Cell::new(false),
            hidden: Cell::new(false),
            on_current_desktop: Cell::new(true),
            on_current_activity: Cell::new(true),
            shadow: Default::default(),
            decoration: Default::default(),
            item: Default::default(),
        })
    }

    pub fn role(&self) -> WindowRole {
        self.role.get()
    }

    pub fn is_lock_screen(&self) -> bool {
        self.role.get() == WindowRole::LockScreen
    }

    pub fn is_input_method(&self) -> bool {
        self.role.get() == WindowRole::InputMethod
    }

    pub fn rect(&self) -> Rect {
        self.rect.get()
    }

    pub fn set_rect(&self, rect: Rect) {
        if self.rect.replace(rect) == rect {
            return;
        }
        if let Some(item) = self.item.get() {
            item.handle_frame_geometry_changed();
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.get()
    }

    /// Turns the window into a tombstone. There is no way back.
    pub fn mark_deleted(&self) {
        if self.deleted.replace(true) {
            return;
        }
        if let Some(item) = self.item.get() {
            item.update_visibility();
        }
    }

    pub fn is_minimized(&self) -> bool {
        self.minimized.get()
    }

    pub fn set_minimized(&self, minimized: bool) {
        if self.minimized.replace(minimized) == minimized {
            return;
        }
        if let Some(item) = self.item.get() {
            item.update_visibility();
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden.get()
    }

    pub fn set_hidden(&self, hidden: bool) {
        if self.hidden.replace(hidden) == hidden {
            return;
        }
        if let Some(item) = self.item.get() {
            item.update_visibility();
        }
    }

    pub fn is_on_current_desktop(&self) -> bool {
        self.on_current_desktop.get()
    }

    pub fn set_on_current_desktop(&self, on: bool) {
        if self.on_current_desktop.replace(on) == on {
            return;
        }
        if let Some(item) = self.item.get() {
            item.update_visibility();
        }
    }

    pub fn is_on_current_activity(&self) -> bool {
        self.on_current_activity.get()
    }

    pub fn set_on_current_activity(&self, on: bool) {
        if self.on_current_activity.replace(on) == on {
            return;
        }
        if let Some(item) = self.item.get() {
            item.update_visibility();
        }
    }

    pub fn shadow(&self) -> Option<Rc<Shadow>> {
        self.shadow.get()
    }

    pub fn set_shadow(&self, shadow: Option<Rc<Shadow>>) {
        self.shadow.set(shadow);
        if let Some(item) = self.item.get() {
            item.update_shadow_item();
        }
    }

    pub fn decoration(&self) -> Option<Rc<Decoration>> {
        self.decoration.get()
    }

    pub fn set_decoration(&self, decoration: Option<Rc<Decoration>>) {
        self.decoration.set(decoration);
        if let Some(item) = self.item.get() {
            item.update_decoration_item();
        }
    }

    pub fn item(&self) -> Option<Rc<WindowItem>> {
        self.item.get()
    }

    pub fn set_item(&self, item: Option<Rc<WindowItem>>) {
        self.item.set(item);
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ShadowMargins {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

/// A drop shadow attached to a window by the decoration/theming layer.
pub struct Shadow {
    margins: Cell<ShadowMargins>,
    item: CloneCell<Option<Rc<ShadowItem>>>,
}

impl Shadow {
    pub fn new(margins: ShadowMargins) -> Rc<Self> {
        Rc::new(Self {
            margins: Cell::new(margins),
            item: Default::default(),
        })
    }

    pub fn margins(&self) -> ShadowMargins {
        self.margins.get()
    }

    pub fn set_margins(&self, margins: ShadowMargins) {
        if self.margins.replace(margins) == margins {
            return;
        }
        if let Some(item) = self.item.get() {
            item.update_geometry();
        }
    }

    /// The shadow texture changed without a geometry change.
    pub fn damage(&self) {
        if let Some(item) = self.item.get() {
            item.handle_damaged();
        }
    }

    pub fn set_item(&self, item: Option<Rc<ShadowItem>>) {
        self.item.set(item);
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct DecorationBorders {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

/// A server-side decoration frame attached to a window.
pub struct Decoration {
    borders: Cell<DecorationBorders>,
    item: CloneCell<Option<Rc<DecorationItem>>>,
}

impl Decoration {
    pub fn new(borders: DecorationBorders) -> Rc<Self> {
        Rc::new(Self {
            borders: Cell::new(borders),
            item: Default::default(),
        })
    }

    pub fn borders(&self) -> DecorationBorders {
        self.borders.get()
    }

    pub fn set_borders(&self, borders: DecorationBorders) {
        if self.borders.replace(borders) == borders {
            return;
        }
        if let Some(item) = self.item.get() {
            item.update_geometry();
        }
    }

    /// The decoration was repainted by the theming layer.
    pub fn damage(&self) {
        if let Some(item) = self.item.get() {
            item.handle_damaged();
        }
    }

    pub fn set_item(&self, item: Option<Rc<DecorationItem>>) {
        self.item.set(item);
    }
}

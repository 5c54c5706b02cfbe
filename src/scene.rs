pub mod decoration_item;
pub mod item;
pub mod shadow_item;
pub mod surface_item;
#[cfg(test)]
mod tests;
pub mod window_item;

use {
    crate::{
        rect::{Rect, Region},
        render_loop::RenderLoop,
        scene::{
            item::{ItemId, ItemIds, Node},
            window_item::WindowItem,
        },
        utils::{copyhashmap::CopyHashMap, errorfmt::ErrorFmt},
    },
    std::{
        cell::{Cell, RefCell},
        rc::Rc,
    },
    thiserror::Error,
};

id!(OutputId, OutputIds);

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("the graphics backend could not render the frame")]
    Backend(#[source] Box<dyn std::error::Error>),
}

/// Paints one frame. Implemented by the graphics backends; the scene hands
/// them the flattened item stack in paint order, back to front, together
/// with the accumulated damage in scene coordinates.
pub trait FrameRenderer {
    fn render_frame(
        &mut self,
        output: &SceneOutput,
        damage: &Region,
        stack: &[Rc<dyn Node>],
    ) -> Result<(), RenderError>;
}

/// The scene graph. Windows are its roots, in stacking order, bottom to
/// top. All repaint scheduling funnels through [`add_repaint`](Self::add_repaint),
/// which splits scene-global damage across the outputs.
pub struct Scene {
    pub item_ids: ItemIds,
    output_ids: OutputIds,
    outputs: CopyHashMap<OutputId, Rc<SceneOutput>>,
    windows: RefCell<Vec<Rc<WindowItem>>>,
    screen_locked: Cell<bool>,
}

pub struct SceneOutput {
    pub id: OutputId,
    position: Cell<Rect>,
    repaints: RefCell<Region>,
    pub render_loop: Rc<RenderLoop>,
}

impl SceneOutput {
    pub fn position(&self) -> Rect {
        self.position.get()
    }

    /// The accumulated damage in scene coordinates.
    pub fn repaints(&self) -> Region {
        self.repaints.borrow().clone()
    }
}

impl Scene {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            item_ids: Default::default(),
            output_ids: Default::default(),
            outputs: Default::default(),
            windows: Default::default(),
            screen_locked: Cell::new(false),
        })
    }

    pub fn add_output(&self, position: Rect, render_loop: Rc<RenderLoop>) -> Rc<SceneOutput> {
        let output = Rc::new(SceneOutput {
            id: self.output_ids.next(),
            position: Cell::new(position),
            repaints: RefCell::new(Region::new(position)),
            render_loop,
        });
        output.render_loop.schedule_repaint(None);
        self.outputs.set(output.id, output.clone());
        output
    }

    pub fn remove_output(&self, id: OutputId) {
        self.outputs.remove(&id);
    }

    pub fn set_output_position(&self, output: &SceneOutput, position: Rect) {
        if output.position.replace(position) == position {
            return;
        }
        *output.repaints.borrow_mut() = Region::new(position);
        output.render_loop.schedule_repaint(None);
    }

    pub fn screen_locked(&self) -> bool {
        self.screen_locked.get()
    }

    pub fn set_screen_locked(&self, locked: bool) {
        if self.screen_locked.replace(locked) == locked {
            return;
        }
        let windows = self.windows.borrow().clone();
        for window in windows {
            window.update_visibility();
        }
    }

    pub fn window_stack(&self) -> Vec<Rc<WindowItem>> {
        self.windows.borrow().clone()
    }

    pub(super) fn add_window(&self, window: &Rc<WindowItem>) {
        self.windows.borrow_mut().push(window.clone());
        let base = window.base();
        base.schedule_repaint(&Region::new(base.bounding_rect()));
    }

    pub(super) fn remove_window(&self, id: ItemId) {
        self.windows.borrow_mut().retain(|w| w.base().id != id);
    }

    pub fn raise_window(&self, id: ItemId) {
        let mut windows = self.windows.borrow_mut();
        let Some(pos) = windows.iter().position(|w| w.base().id == id) else {
            return;
        };
        if pos == windows.len() - 1 {
            return;
        }
        let window = windows.remove(pos);
        windows.push(window.clone());
        drop(windows);
        let base = window.base();
        base.schedule_repaint(&Region::new(base.bounding_rect()));
    }

    /// Reorders the window stack to match `order`, bottom to top. Windows
    /// not listed keep their relative order and end up on top.
    pub fn restack_windows(&self, order: &[ItemId]) {
        let index = |id: ItemId| order.iter().position(|&o| o == id).unwrap_or(usize::MAX);
        self.windows
            .borrow_mut()
            .sort_by_key(|w| index(w.base().id));
        for window in self.windows.borrow().iter() {
            let base = window.base();
            base.schedule_repaint(&Region::new(base.bounding_rect()));
        }
    }

    /// Damage in scene coordinates, attributed to `item`. Clips the region
    /// to each output and wakes the affected render loops.
    pub fn add_repaint(&self, item: ItemId, region: &Region) {
        for output in self.outputs.lock().values() {
            let clipped = region.intersected(output.position.get());
            if clipped.is_empty() {
                continue;
            }
            output.repaints.borrow_mut().union(&clipped);
            output.render_loop.schedule_repaint(Some(item));
        }
    }

    pub fn add_repaint_full(&self) {
        for output in self.outputs.lock().values() {
            let position = output.position.get();
            output.repaints.borrow_mut().add_rect(position);
            output.render_loop.schedule_repaint(None);
        }
    }

    /// Paints one output. Returns true if a frame was submitted.
    ///
    /// Flattens the visible window subtrees into one back-to-front stack,
    /// gives every item a chance to update its pixmap, then hands the stack
    /// and the accumulated damage to the renderer. Damage is consumed only
    /// when the renderer succeeds, so a failed frame repaints the same
    /// region on the next attempt.
    pub fn paint_output(&self, output: &SceneOutput, renderer: &mut dyn FrameRenderer) -> bool {
        let mut stack = Vec::new();
        for window in self.windows.borrow().iter() {
            if window.base().visible() {
                flatten(window.clone().into_node(), &mut stack);
            }
        }
        for node in &stack {
            node.clone().preprocess();
        }
        let damage = output.repaints.borrow().clone();
        if damage.is_empty() {
            return false;
        }
        output.render_loop.begin_frame();
        let res = renderer.render_frame(output, &damage, &stack);
        output.render_loop.end_frame();
        match res {
            Ok(()) => {
                output.repaints.borrow_mut().clear();
                for node in &stack {
                    if let Some(item) = node.clone().into_surface_item() {
                        item.reset_damage();
                    }
                }
                true
            }
            Err(e) => {
                log::warn!("Could not render frame: {}", ErrorFmt(e));
                output.render_loop.notify_frame_failed();
                false
            }
        }
    }
}

fn flatten(node: Rc<dyn Node>, out: &mut Vec<Rc<dyn Node>>) {
    let children = node.base().sorted_children();
    for child in &children {
        if child.base().z() < 0 && child.base().visible() {
            flatten(child.clone(), out);
        }
    }
    out.push(node);
    for child in &children {
        if child.base().z() >= 0 && child.base().visible() {
            flatten(child.clone(), out);
        }
    }
}

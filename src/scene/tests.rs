use {
    crate::{
        backend::{OutputBackend, RenderTimer},
        rect::{Rect, Region},
        render_loop::RenderLoop,
        scene::{
            FrameRenderer, RenderError, Scene, SceneOutput,
            item::{ItemId, Node, set_node_parent},
            surface_item::SurfaceItem,
            window_item::{VisibilityReason, WindowItem},
        },
        surface::{Surface, SurfaceIds, internal::InternalSurfaceBackend},
        time::{Clock, Time},
        window::{Decoration, DecorationBorders, Shadow, ShadowMargins, Window, WindowRole},
    },
    std::{
        cell::{Cell, RefCell},
        rc::Rc,
    },
};

struct ManualClock {
    now: Cell<u64>,
}

impl Clock for ManualClock {
    fn now(&self) -> Time {
        Time::from_nsec(self.now.get())
    }
}

struct NullTimer;

impl RenderTimer for NullTimer {
    fn program(&self, _expires: Option<Time>) {}
}

struct StaticOutput;

impl OutputBackend for StaticOutput {
    fn refresh_rate_millihz(&self) -> u32 {
        60_000
    }

    fn vrr_capable(&self) -> bool {
        false
    }
}

struct OkRenderer;

impl FrameRenderer for OkRenderer {
    fn render_frame(
        &mut self,
        _output: &SceneOutput,
        _damage: &Region,
        _stack: &[Rc<dyn Node>],
    ) -> Result<(), RenderError> {
        Ok(())
    }
}

struct FailRenderer;

impl FrameRenderer for FailRenderer {
    fn render_frame(
        &mut self,
        _output: &SceneOutput,
        _damage: &Region,
        _stack: &[Rc<dyn Node>],
    ) -> Result<(), RenderError> {
        Err(RenderError::Backend("out of memory".into()))
    }
}

#[derive(Default)]
struct RecordingRenderer {
    frames: RefCell<Vec<Vec<ItemId>>>,
}

impl FrameRenderer for RecordingRenderer {
    fn render_frame(
        &mut self,
        _output: &SceneOutput,
        _damage: &Region,
        stack: &[Rc<dyn Node>],
    ) -> Result<(), RenderError> {
        self.frames
            .borrow_mut()
            .push(stack.iter().map(|n| n.id()).collect());
        Ok(())
    }
}

fn add_test_output(scene: &Rc<Scene>, position: Rect) -> Rc<SceneOutput> {
    let rl = RenderLoop::new(
        Rc::new(ManualClock {
            now: Cell::new(1_000_000_000),
        }),
        Rc::new(NullTimer),
        Rc::new(StaticOutput),
    );
    scene.add_output(position, rl)
}

fn mapped_surface(ids: &SurfaceIds, size: (i32, i32)) -> Rc<Surface> {
    let surface = Surface::new(ids, InternalSurfaceBackend::new());
    surface.set_size(size.0, size.1);
    surface.set_mapped(true);
    surface
}

fn test_window(
    scene: &Rc<Scene>,
    ids: &SurfaceIds,
    rect: Rect,
) -> (Rc<Window>, Rc<Surface>, Rc<WindowItem>) {
    let surface = mapped_surface(ids, (rect.width(), rect.height()));
    let window = Window::new(WindowRole::Normal, rect);
    let item = WindowItem::new(scene, &window, &surface);
    (window, surface, item)
}

fn drain(scene: &Scene, output: &SceneOutput) {
    assert!(scene.paint_output(output, &mut OkRenderer));
    assert!(output.repaints().is_empty());
}

struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    fn range(&mut self, max: u64) -> i32 {
        (self.next() % max) as i32
    }
}

fn reference_bounding(node: &Rc<dyn Node>) -> Rect {
    let mut bounding = node.base().rect();
    for child in node.base().children() {
        let (x, y) = child.base().position();
        bounding = bounding.union(reference_bounding(&child).move_(x, y));
    }
    bounding
}

#[test]
fn window_move_damages_old_and_new_location() {
    let scene = Scene::new();
    let ids = SurfaceIds::default();
    let output = add_test_output(&scene, Rect::new_sized(0, 0, 1000, 1000).unwrap());
    let old = Rect::new_sized(100, 100, 200, 150).unwrap();
    let (window, _surface, _item) = test_window(&scene, &ids, old);
    drain(&scene, &output);
    let new = Rect::new_sized(400, 300, 200, 150).unwrap();
    window.set_rect(new);
    let repaints = output.repaints();
    assert!(repaints.intersects(&old));
    assert!(repaints.intersects(&new));
}

#[test]
fn bounding_rect_tracks_randomized_subtree_mutations() {
    let scene = Scene::new();
    let ids = SurfaceIds::default();
    let rect = Rect::new_sized(0, 0, 200, 150).unwrap();
    let (_window, surface, item) = test_window(&scene, &ids, rect);
    let subs: Vec<_> = (0..4).map(|_| mapped_surface(&ids, (50, 50))).collect();
    surface.set_subsurfaces(subs[..2].to_vec(), subs[2..].to_vec());
    let mut rng = XorShift(0xdead_beef_cafe_1234);
    for _ in 0..200 {
        let sub = &subs[rng.range(4) as usize];
        match rng.range(3) {
            0 => sub.set_position(rng.range(600) - 300, rng.range(600) - 300),
            1 => sub.set_size(rng.range(200) + 1, rng.range(200) + 1),
            _ => surface.set_position(rng.range(100), rng.range(100)),
        }
        let node = item.clone().into_node();
        assert_eq!(node.base().bounding_rect(), reference_bounding(&node));
    }
}

#[test]
fn subsurfaces_below_get_negative_z() {
    let scene = Scene::new();
    let ids = SurfaceIds::default();
    let rect = Rect::new_sized(0, 0, 200, 150).unwrap();
    let (_window, surface, _item) = test_window(&scene, &ids, rect);
    let a = mapped_surface(&ids, (10, 10));
    let b = mapped_surface(&ids, (10, 10));
    let c = mapped_surface(&ids, (10, 10));
    surface.set_subsurfaces(vec![a.clone(), b.clone()], vec![c.clone()]);
    assert_eq!(a.item().unwrap().base().z(), -2);
    assert_eq!(b.item().unwrap().base().z(), -1);
    assert_eq!(c.item().unwrap().base().z(), 0);
    // b is promoted above the parent surface.
    surface.set_subsurfaces(vec![a.clone()], vec![c.clone(), b.clone()]);
    assert_eq!(a.item().unwrap().base().z(), -1);
    assert_eq!(c.item().unwrap().base().z(), 0);
    assert_eq!(b.item().unwrap().base().z(), 1);
}

#[test]
fn shadow_and_decoration_paint_below_the_contents() {
    let scene = Scene::new();
    let ids = SurfaceIds::default();
    let output = add_test_output(&scene, Rect::new_sized(0, 0, 1000, 1000).unwrap());
    let rect = Rect::new_sized(100, 100, 200, 150).unwrap();
    let (window, _surface, item) = test_window(&scene, &ids, rect);
    window.set_decoration(Some(Decoration::new(DecorationBorders {
        left: 5,
        top: 20,
        right: 5,
        bottom: 5,
    })));
    window.set_shadow(Some(Shadow::new(ShadowMargins {
        left: 10,
        top: 10,
        right: 10,
        bottom: 10,
    })));
    let shadow_item = item.shadow_item().unwrap();
    let decoration_item = item.decoration_item().unwrap();
    let surface_item = item.surface_item().unwrap();
    assert_eq!(shadow_item.base().position(), (-10, -10));
    assert_eq!(shadow_item.base().size(), (220, 170));
    assert_eq!(decoration_item.base().size(), (200, 150));
    assert_eq!(surface_item.base().position(), (5, 20));
    let mut renderer = RecordingRenderer::default();
    assert!(scene.paint_output(&output, &mut renderer));
    let frames = renderer.frames.borrow();
    let expected = vec![
        item.id(),
        shadow_item.id(),
        decoration_item.id(),
        surface_item.id(),
    ];
    assert_eq!(frames[0], expected);
}

#[test]
fn minimized_window_is_skipped_until_forced_visible() {
    let scene = Scene::new();
    let ids = SurfaceIds::default();
    let output = add_test_output(&scene, Rect::new_sized(0, 0, 1000, 1000).unwrap());
    let rect = Rect::new_sized(100, 100, 200, 150).unwrap();
    let (window, _surface, item) = test_window(&scene, &ids, rect);
    window.set_minimized(true);
    assert!(!item.base().visible());
    let mut renderer = RecordingRenderer::default();
    assert!(scene.paint_output(&output, &mut renderer));
    assert!(renderer.frames.borrow()[0].is_empty());
    item.ref_visible(VisibilityReason::Minimize);
    assert!(item.base().visible());
    item.unref_visible(VisibilityReason::Minimize);
    assert!(!item.base().visible());
    window.set_minimized(false);
    assert!(item.base().visible());
}

#[test]
fn screen_lock_hides_everything_but_the_lock_screen() {
    let scene = Scene::new();
    let ids = SurfaceIds::default();
    let rect = Rect::new_sized(0, 0, 100, 100).unwrap();
    let (_normal_win, _s1, normal) = test_window(&scene, &ids, rect);
    let lock_surface = mapped_surface(&ids, (100, 100));
    let lock_window = Window::new(WindowRole::LockScreen, rect);
    let lock = WindowItem::new(&scene, &lock_window, &lock_surface);
    let im_surface = mapped_surface(&ids, (100, 100));
    let im_window = Window::new(WindowRole::InputMethod, rect);
    let im = WindowItem::new(&scene, &im_window, &im_surface);
    scene.set_screen_locked(true);
    assert!(!normal.base().visible());
    assert!(lock.base().visible());
    assert!(im.base().visible());
    normal.ref_visible(VisibilityReason::Lock);
    assert!(normal.base().visible());
    normal.unref_visible(VisibilityReason::Lock);
    assert!(!normal.base().visible());
    scene.set_screen_locked(false);
    assert!(normal.base().visible());
}

#[test]
fn deleted_window_acts_as_tombstone() {
    let scene = Scene::new();
    let ids = SurfaceIds::default();
    let rect = Rect::new_sized(0, 0, 100, 100).unwrap();
    let (window, _surface, item) = test_window(&scene, &ids, rect);
    item.ref_visible(VisibilityReason::Delete);
    window.mark_deleted();
    assert!(item.base().visible());
    item.unref_visible(VisibilityReason::Delete);
    assert!(!item.base().visible());
}

#[test]
fn failed_frame_keeps_damage_for_the_retry() {
    let scene = Scene::new();
    let ids = SurfaceIds::default();
    let output = add_test_output(&scene, Rect::new_sized(0, 0, 1000, 1000).unwrap());
    let rect = Rect::new_sized(0, 0, 200, 150).unwrap();
    let (_window, surface, item) = test_window(&scene, &ids, rect);
    drain(&scene, &output);
    surface.apply_damage(&Region::new(Rect::new_sized(0, 0, 10, 10).unwrap()));
    assert!(!scene.paint_output(&output, &mut FailRenderer));
    assert!(!output.repaints().is_empty());
    assert!(!item.surface_item().unwrap().damage().is_empty());
    assert!(scene.paint_output(&output, &mut OkRenderer));
    assert!(output.repaints().is_empty());
    assert!(item.surface_item().unwrap().damage().is_empty());
}

#[test]
fn restacking_moves_items_between_their_siblings() {
    let scene = Scene::new();
    let ids = SurfaceIds::default();
    let rect = Rect::new_sized(0, 0, 200, 150).unwrap();
    let (_window, _surface, item) = test_window(&scene, &ids, rect);
    let parent = item.surface_item().unwrap().into_node();
    let make_child = || {
        let child = SurfaceItem::new(&scene, &mapped_surface(&ids, (10, 10)));
        set_node_parent(&(child.clone() as Rc<dyn Node>), Some(&parent));
        child
    };
    let a = make_child();
    let b = make_child();
    let c = make_child();
    let order = || -> Vec<ItemId> {
        parent
            .base()
            .children()
            .iter()
            .map(|c| c.base().id)
            .collect()
    };
    assert_eq!(order(), vec![a.id(), b.id(), c.id()]);
    c.stack_before(&(a.clone() as Rc<dyn Node>));
    assert_eq!(order(), vec![c.id(), a.id(), b.id()]);
    c.stack_after(&(b.clone() as Rc<dyn Node>));
    assert_eq!(order(), vec![a.id(), b.id(), c.id()]);
    // Already directly before b, a no-op.
    a.stack_before(&(b.clone() as Rc<dyn Node>));
    assert_eq!(order(), vec![a.id(), b.id(), c.id()]);
    // Already directly after a, a no-op.
    b.stack_after(&(a.clone() as Rc<dyn Node>));
    assert_eq!(order(), vec![a.id(), b.id(), c.id()]);
}

#[test]
fn reparenting_to_a_descendant_is_rejected() {
    let scene = Scene::new();
    let ids = SurfaceIds::default();
    let rect = Rect::new_sized(0, 0, 200, 150).unwrap();
    let (_window, _surface, item) = test_window(&scene, &ids, rect);
    let parent = item.surface_item().unwrap();
    let child = SurfaceItem::new(&scene, &mapped_surface(&ids, (10, 10)));
    set_node_parent(
        &(child.clone() as Rc<dyn Node>),
        Some(&(parent.clone().into_node())),
    );
    let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        set_node_parent(
            &(parent.clone().into_node()),
            Some(&(child.clone() as Rc<dyn Node>)),
        );
    }));
    // Rejected via debug assertion in debug builds, ignored otherwise.
    if res.is_ok() {
        assert!(child.base().children().is_empty());
    }
}

#[test]
fn raising_a_window_reorders_the_stack() {
    let scene = Scene::new();
    let ids = SurfaceIds::default();
    let rect = Rect::new_sized(0, 0, 100, 100).unwrap();
    let (_w1, _s1, first) = test_window(&scene, &ids, rect);
    let (_w2, _s2, second) = test_window(&scene, &ids, rect);
    assert_eq!(scene.window_stack()[0].id(), first.id());
    scene.raise_window(first.id());
    assert_eq!(scene.window_stack()[1].id(), first.id());
    scene.restack_windows(&[first.id(), second.id()]);
    assert_eq!(scene.window_stack()[0].id(), first.id());
    assert_eq!(scene.window_stack()[1].id(), second.id());
}

#[test]
fn destroying_a_window_item_severs_all_links() {
    let scene = Scene::new();
    let ids = SurfaceIds::default();
    let rect = Rect::new_sized(0, 0, 100, 100).unwrap();
    let (window, surface, item) = test_window(&scene, &ids, rect);
    window.set_shadow(Some(Shadow::new(ShadowMargins::default())));
    item.destroy_node();
    assert!(window.item().is_none());
    assert!(surface.item().is_none());
    assert!(scene.window_stack().is_empty());
    assert_eq!(Rc::strong_count(&item), 1);
}

#[test]
fn output_removal_stops_repaint_forwarding() {
    let scene = Scene::new();
    let ids = SurfaceIds::default();
    let output = add_test_output(&scene, Rect::new_sized(0, 0, 1000, 1000).unwrap());
    let rect = Rect::new_sized(0, 0, 100, 100).unwrap();
    let (window, _surface, _item) = test_window(&scene, &ids, rect);
    drain(&scene, &output);
    scene.remove_output(output.id);
    window.set_rect(Rect::new_sized(10, 10, 100, 100).unwrap());
    assert!(output.repaints().is_empty());
}

use {crate::rect::Rect, smallvec::SmallVec, std::fmt::Debug};

/// A damage region: a set of rectangles with cached extents.
///
/// Damage regions are conservative hints for the renderer. Rectangles are
/// allowed to overlap, but a rectangle fully contained in another one is
/// never stored twice.
#[derive(Clone, Default, Eq, PartialEq)]
pub struct Region {
    rects: SmallVec<[Rect; 1]>,
    extents: Rect,
}

impl Debug for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.rects.iter()).finish()
    }
}

impl Region {
    pub fn new(rect: Rect) -> Self {
        if rect.is_empty() {
            return Self::default();
        }
        let mut rects = SmallVec::new();
        rects.push(rect);
        Self {
            rects,
            extents: rect,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn extents(&self) -> Rect {
        self.extents
    }

    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    pub fn clear(&mut self) {
        self.rects.clear();
        self.extents = Rect::default();
    }

    pub fn add_rect(&mut self, rect: Rect) {
        if rect.is_empty() {
            return;
        }
        let mut i = 0;
        while i < self.rects.len() {
            if self.rects[i].contains_rect(&rect) {
                return;
            }
            if rect.contains_rect(&self.rects[i]) {
                self.rects.swap_remove(i);
                continue;
            }
            i += 1;
        }
        self.extents = self.extents.union(rect);
        self.rects.push(rect);
    }

    pub fn union(&mut self, other: &Region) {
        for rect in &other.rects {
            self.add_rect(*rect);
        }
    }

    pub fn translated(&self, dx: i32, dy: i32) -> Region {
        let mut res = Region::default();
        for rect in &self.rects {
            res.add_rect(rect.move_(dx, dy));
        }
        res
    }

    pub fn intersected(&self, bounds: Rect) -> Region {
        let mut res = Region::default();
        for rect in &self.rects {
            res.add_rect(rect.intersect(bounds));
        }
        res
    }

    pub fn intersects(&self, rect: &Rect) -> bool {
        if !self.extents.intersects(rect) {
            return false;
        }
        self.rects.iter().any(|r| r.intersects(rect))
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        if !self.extents.contains(x, y) {
            return false;
        }
        self.rects.iter().any(|r| r.contains(x, y))
    }
}

impl From<Rect> for Region {
    fn from(rect: Rect) -> Self {
        Self::new(rect)
    }
}

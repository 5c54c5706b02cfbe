#[derive(Debug, Eq, PartialEq)]
pub struct Format {
    pub name: &'static str,
    pub has_alpha: bool,
}

pub static ARGB8888: Format = Format {
    name: "argb8888",
    has_alpha: true,
};

pub static XRGB8888: Format = Format {
    name: "xrgb8888",
    has_alpha: false,
};

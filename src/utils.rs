pub mod cell_ext;
pub mod clonecell;
pub mod copyhashmap;
pub mod errorfmt;
pub mod numcell;
pub mod ptr_ext;

pub mod values;
pub mod xml;

pub use values::*;
pub use xml::{Element, XmlEvent, XmlStream};

pub mod binding;

pub use binding::{Binding, Bindings};

// Lifecycle - Ordered teardown and fatal error reporting

mod close_stack;
mod fatal;

pub use close_stack::{CloseStack, Closer};
pub use fatal::FatalErrors;

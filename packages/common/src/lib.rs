pub mod event_loop;
pub mod logging;

pub use event_loop::{EventLoop, FrameId, Task, TimerId};
pub use logging::init_logging;

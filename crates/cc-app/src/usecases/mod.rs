pub mod poll_loop;
pub mod publish_loop;

pub use poll_loop::{PollLoop, PollStep};
pub use publish_loop::{PublishLoop, TickOutcome};

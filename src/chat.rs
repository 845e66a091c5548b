//! The client-side view of the chat contract: messages, live updates and
//! message submission.

mod event;
mod log;
mod message;
mod status;
mod view;

pub use event::ChatEvent;
pub use log::MessageLog;
pub use message::Message;
pub use status::TxnStatus;
pub use view::ChatView;

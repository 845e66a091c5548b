//! Everything needed to turn (address, interface, account) into a usable
//! handle on the chat contract.

mod handle;
mod interface;
mod provider;

pub use handle::{derive_handle, Connection, ContractHandle, HandleId, HandleInputs, HandleMode};
pub use interface::{ChatInterface, GET_MESSAGES, NEW_MESSAGE, SEND_MESSAGE};
pub use provider::HandleProvider;

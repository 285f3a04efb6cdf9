//! lanfunk-signaling – TCP Control Layer
//!
//! ```text
//! TCP Listener (ControlServer)
//!     |
//!     v
//! ClientSession (pro Verbindung ein Task)
//!     |  Ausstehend --AUDIO_PORT:<port>--> Registriert --QUIT/EOF--> entfernt
//!     v
//! SessionRegistry (lanfunk-voice)
//! ```

pub mod connection;
pub mod error;
pub mod tcp;

pub use connection::ClientSession;
pub use error::{SignalingError, SignalingResult};
pub use tcp::ControlServer;

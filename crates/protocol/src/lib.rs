//! lanfunk-protocol – Netzwerkprotokoll-Definitionen
//!
//! - [`control`] – Zeilen-Nachrichten des TCP-Control-Kanals
//! - [`wire`] – tokio-util Codec fuer den Control-Kanal
//! - [`codec`] – Audio-Format und Groessen des UDP-Audio-Kanals

pub mod codec;
pub mod control;
pub mod wire;

pub use codec::{AudioFormat, MAX_DATAGRAM_SIZE};
pub use control::{relay_port, ControlMessage, AUDIO_PORT_OFFSET, DEFAULT_SERVER_PORT};
pub use wire::{ControlCodec, WireError};

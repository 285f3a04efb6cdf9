//! Wire-Format fuer den Control-Kanal
//!
//! Zeilenbasiert: jede `ControlMessage` wird als eine mit `\n`
//! terminierte UTF-8-Zeile uebertragen. Intern wird `LinesCodec` aus
//! tokio-util verwendet; ein `\r` vor dem Zeilenende wird entfernt.
//!
//! ## Laengenbegrenzung
//! Zeilen laenger als `DEFAULT_MAX_ZEILEN_LAENGE` fuehren zu
//! `WireError::ZeileZuLang`. Die Verbindung gilt danach als fehlerhaft.

use bytes::BytesMut;
use std::io;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

use crate::control::ControlMessage;

/// Standard-maximale Zeilenlaenge in Bytes
pub const DEFAULT_MAX_ZEILEN_LAENGE: usize = 256;

/// Fehler beim Lesen oder Schreiben des Control-Kanals
#[derive(Debug, Error)]
pub enum WireError {
    #[error("IO-Fehler: {0}")]
    Io(#[from] io::Error),

    #[error("Zeile ueberschreitet die maximale Laenge")]
    ZeileZuLang,
}

impl From<LinesCodecError> for WireError {
    fn from(e: LinesCodecError) -> Self {
        match e {
            LinesCodecError::MaxLineLengthExceeded => Self::ZeileZuLang,
            LinesCodecError::Io(e) => Self::Io(e),
        }
    }
}

// ---------------------------------------------------------------------------
// ControlCodec
// ---------------------------------------------------------------------------

/// tokio-util Codec fuer den Control-Kanal
///
/// Implementiert `Encoder<ControlMessage>` und `Decoder` fuer die
/// Verwendung mit `tokio_util::codec::Framed`.
#[derive(Debug, Clone)]
pub struct ControlCodec {
    zeilen: LinesCodec,
}

impl ControlCodec {
    /// Erstellt einen neuen `ControlCodec` mit Standard-Limit
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_ZEILEN_LAENGE)
    }

    /// Erstellt einen `ControlCodec` mit benutzerdefinierter maximaler Zeilenlaenge
    pub fn with_max_length(max_laenge: usize) -> Self {
        Self {
            zeilen: LinesCodec::new_with_max_length(max_laenge),
        }
    }
}

impl Default for ControlCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ControlCodec {
    type Item = ControlMessage;
    type Error = WireError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let zeile = self.zeilen.decode(src)?;
        Ok(zeile.map(|z| ControlMessage::parsen(&z)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Eine unterminierte letzte Zeile wird beim Verbindungsende noch ausgeliefert
        let zeile = self.zeilen.decode_eof(src)?;
        Ok(zeile.map(|z| ControlMessage::parsen(&z)))
    }
}

impl Encoder<ControlMessage> for ControlCodec {
    type Error = WireError;

    fn encode(&mut self, item: ControlMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.zeilen.encode(item.to_string(), dst)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    #[test]
    fn encode_schreibt_zeile_mit_newline() {
        let mut codec = ControlCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(ControlMessage::AudioPort(5001), &mut buf).unwrap();
        codec.encode(ControlMessage::Quit, &mut buf).unwrap();
        assert_eq!(&buf[..], b"AUDIO_PORT:5001\nQUIT\n");
    }

    #[test]
    fn decode_wartet_auf_zeilenende() {
        let mut codec = ControlCodec::new();
        let mut buf = BytesMut::from(&b"AUDIO_"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"OK\r\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(ControlMessage::AudioOk));
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_mehrere_zeilen_in_einem_puffer() {
        let mut codec = ControlCodec::new();
        let mut buf = BytesMut::from(&b"AUDIO_PORT:7000\nhallo\nQUIT\n"[..]);
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(ControlMessage::AudioPort(7000))
        );
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(ControlMessage::Unbekannt("hallo".into()))
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(ControlMessage::Quit));
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn zu_lange_zeile_ist_fehler() {
        let mut codec = ControlCodec::with_max_length(16);
        let mut buf = BytesMut::from(&[b'A'; 64][..]);
        let result = codec.decode(&mut buf);
        assert!(matches!(result, Err(WireError::ZeileZuLang)));
    }

    #[test]
    fn decode_eof_liefert_unterminierte_zeile() {
        let mut codec = ControlCodec::new();
        let mut buf = BytesMut::from(&b"QUIT"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), Some(ControlMessage::Quit));
    }

    #[tokio::test]
    async fn framed_ueber_duplex_stream() {
        let (client, server) = tokio::io::duplex(256);
        let mut writer = FramedWrite::new(client, ControlCodec::new());
        let mut reader = FramedRead::new(server, ControlCodec::new());

        writer.send(ControlMessage::AudioPort(40123)).await.unwrap();
        writer.send(ControlMessage::Quit).await.unwrap();
        drop(writer);

        assert_eq!(
            reader.next().await.unwrap().unwrap(),
            ControlMessage::AudioPort(40123)
        );
        assert_eq!(reader.next().await.unwrap().unwrap(), ControlMessage::Quit);
        assert!(reader.next().await.is_none(), "Stream muss nach EOF enden");
    }
}

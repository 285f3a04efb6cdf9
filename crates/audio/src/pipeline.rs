//! Capture-Pipeline: PTT-Gate -> Encode -> Senden
//!
//! ```text
//! cpal Capture Callback (beliebige Puffergroesse)
//!     -> FrameSammler: feste Fenster (20ms = 960 Samples bei 48kHz)
//!     -> CapturePipeline::frame_verarbeiten()
//!          Gate AUS  -> verwerfen, kein Netzwerkverkehr
//!          Gate AN   -> VoiceCodec::encode()
//!                         -> PaketSenke::senden() (nicht-blockierend)
//! ```
//!
//! Alles hier laeuft im Echtzeit-Callback und darf nie blockieren.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::codec::VoiceCodec;
use crate::ptt::PttGate;

// ---------------------------------------------------------------------------
// PaketSenke
// ---------------------------------------------------------------------------

/// Ziel fuer kodierte Frames
///
/// Implementierungen muessen sofort zurueckkehren; ein Frame der nicht
/// sofort gesendet werden kann, ist verloren.
pub trait PaketSenke: Send {
    fn senden(&mut self, daten: &[u8]) -> io::Result<()>;
}

/// Sendet Frames als einzelne UDP-Datagramme an den Relay-Server
///
/// Der Socket muss ein Klon des registrierten Audio-Sockets sein, damit
/// die Absenderadresse dem gemeldeten Audio-Endpunkt entspricht.
pub struct UdpPaketSenke {
    socket: UdpSocket,
    server_addr: SocketAddr,
}

impl UdpPaketSenke {
    /// Schaltet den Socket in den nicht-blockierenden Modus
    pub fn neu(socket: UdpSocket, server_addr: SocketAddr) -> io::Result<Self> {
        socket.set_nonblocking(true)?;
        Ok(Self {
            socket,
            server_addr,
        })
    }
}

impl PaketSenke for UdpPaketSenke {
    fn senden(&mut self, daten: &[u8]) -> io::Result<()> {
        self.socket.send_to(daten, self.server_addr).map(|_| ())
    }
}

// ---------------------------------------------------------------------------
// FrameSammler
// ---------------------------------------------------------------------------

/// Zerlegt Callback-Puffer beliebiger Laenge in Fenster fester Groesse
pub struct FrameSammler {
    puffer: Vec<f32>,
    frame_samples: usize,
}

impl FrameSammler {
    pub fn new(frame_samples: usize) -> Self {
        Self {
            puffer: Vec::with_capacity(frame_samples),
            frame_samples,
        }
    }

    /// Haengt Samples an und ruft `fertig` fuer jedes volle Fenster auf
    pub fn hinzufuegen(&mut self, samples: &[f32], mut fertig: impl FnMut(&[f32])) {
        let mut rest = samples;
        while !rest.is_empty() {
            let n = (self.frame_samples - self.puffer.len()).min(rest.len());
            self.puffer.extend_from_slice(&rest[..n]);
            rest = &rest[n..];

            if self.puffer.len() == self.frame_samples {
                fertig(&self.puffer);
                self.puffer.clear();
            }
        }
    }

    /// Anzahl der Samples im angefangenen Fenster
    pub fn ausstehend(&self) -> usize {
        self.puffer.len()
    }
}

// ---------------------------------------------------------------------------
// CapturePipeline
// ---------------------------------------------------------------------------

/// Zaehler der Capture-Pipeline, lesbar ausserhalb des Callbacks
#[derive(Debug, Default)]
pub struct CaptureStats {
    pub fenster: AtomicU64,
    pub gesendet: AtomicU64,
    pub encode_fehler: AtomicU64,
    pub sende_fehler: AtomicU64,
}

impl CaptureStats {
    fn zaehlen(zaehler: &AtomicU64) {
        zaehler.fetch_add(1, Ordering::Relaxed);
    }
}

/// Ergebnis der Verarbeitung eines Fensters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameErgebnis {
    /// Gate geschlossen, nichts gesendet
    Verworfen,
    /// Ein Datagramm gesendet
    Gesendet,
    /// Encoder lieferte nichts, Frame verloren
    EncodeFehlgeschlagen,
    /// Senden fehlgeschlagen, Frame verloren
    SendenFehlgeschlagen,
}

/// PTT-gesteuerte Capture-Pipeline
pub struct CapturePipeline<S: PaketSenke> {
    gate: PttGate,
    codec: Box<dyn VoiceCodec>,
    senke: S,
    stats: Arc<CaptureStats>,
}

impl<S: PaketSenke> CapturePipeline<S> {
    pub fn new(gate: PttGate, codec: Box<dyn VoiceCodec>, senke: S) -> Self {
        debug!(codec = codec.name(), "Capture-Pipeline erstellt");
        Self {
            gate,
            codec,
            senke,
            stats: Arc::new(CaptureStats::default()),
        }
    }

    /// Verarbeitet ein volles Fenster
    pub fn frame_verarbeiten(&mut self, fenster: &[f32]) -> FrameErgebnis {
        CaptureStats::zaehlen(&self.stats.fenster);

        if !self.gate.ist_offen() {
            return FrameErgebnis::Verworfen;
        }

        let Some(daten) = self.codec.encode(fenster) else {
            CaptureStats::zaehlen(&self.stats.encode_fehler);
            return FrameErgebnis::EncodeFehlgeschlagen;
        };

        match self.senke.senden(&daten) {
            Ok(()) => {
                trace!(bytes = daten.len(), "Audio-Frame gesendet");
                CaptureStats::zaehlen(&self.stats.gesendet);
                FrameErgebnis::Gesendet
            }
            Err(e) => {
                if e.kind() == io::ErrorKind::WouldBlock {
                    debug!("Sendepuffer voll, Frame verworfen");
                } else {
                    warn!(fehler = %e, "Audio-Frame konnte nicht gesendet werden");
                }
                CaptureStats::zaehlen(&self.stats.sende_fehler);
                FrameErgebnis::SendenFehlgeschlagen
            }
        }
    }

    /// Geteilte Zaehler
    pub fn stats(&self) -> Arc<CaptureStats> {
        Arc::clone(&self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::RawCodec;
    use crate::ptt::{PttController, PttEreignis, PttMode};

    /// Sammelt gesendete Datagramme
    #[derive(Default)]
    struct TestSenke {
        pakete: Vec<Vec<u8>>,
        fehler: bool,
    }

    impl PaketSenke for TestSenke {
        fn senden(&mut self, daten: &[u8]) -> io::Result<()> {
            if self.fehler {
                return Err(io::Error::from(io::ErrorKind::WouldBlock));
            }
            self.pakete.push(daten.to_vec());
            Ok(())
        }
    }

    /// Codec der nie kodieren kann
    struct KaputterCodec;

    impl VoiceCodec for KaputterCodec {
        fn encode(&mut self, _fenster: &[f32]) -> Option<Vec<u8>> {
            None
        }
        fn decode(&mut self, _daten: &[u8]) -> Vec<f32> {
            Vec::new()
        }
        fn name(&self) -> &'static str {
            "kaputt"
        }
    }

    fn pipeline(gate: PttGate) -> CapturePipeline<TestSenke> {
        CapturePipeline::new(gate, Box::new(RawCodec::new()), TestSenke::default())
    }

    #[test]
    fn gate_aus_sendet_nichts() {
        let mut p = pipeline(PttGate::new());
        for _ in 0..10 {
            assert_eq!(p.frame_verarbeiten(&[0.1; 960]), FrameErgebnis::Verworfen);
        }
        assert!(p.senke.pakete.is_empty());
        assert_eq!(p.stats().fenster.load(Ordering::Relaxed), 10);
    }

    #[test]
    fn gate_an_sendet_genau_ein_datagramm_pro_fenster() {
        let gate = PttGate::new();
        let mut ptt = PttController::new(PttMode::Hold, gate.clone());
        let mut p = pipeline(gate);

        ptt.ereignis(PttEreignis::Gedrueckt);
        for _ in 0..5 {
            assert_eq!(p.frame_verarbeiten(&[0.1; 960]), FrameErgebnis::Gesendet);
        }
        assert_eq!(p.senke.pakete.len(), 5);
        assert!(p.senke.pakete.iter().all(|d| d.len() == 1920));

        ptt.ereignis(PttEreignis::Losgelassen);
        p.frame_verarbeiten(&[0.1; 960]);
        assert_eq!(p.senke.pakete.len(), 5, "Nach Loslassen kein weiteres Paket");
    }

    #[test]
    fn encode_fehler_sendet_nichts() {
        let gate = PttGate::new();
        PttController::new(PttMode::Hold, gate.clone()).ereignis(PttEreignis::Gedrueckt);
        let mut p = CapturePipeline::new(gate, Box::new(KaputterCodec), TestSenke::default());

        assert_eq!(
            p.frame_verarbeiten(&[0.0; 960]),
            FrameErgebnis::EncodeFehlgeschlagen
        );
        assert!(p.senke.pakete.is_empty());
        assert_eq!(p.stats().encode_fehler.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn sendefehler_wird_gezaehlt_nicht_propagiert() {
        let gate = PttGate::new();
        PttController::new(PttMode::Hold, gate.clone()).ereignis(PttEreignis::Gedrueckt);
        let senke = TestSenke {
            fehler: true,
            ..TestSenke::default()
        };
        let mut p = CapturePipeline::new(gate, Box::new(RawCodec::new()), senke);

        assert_eq!(
            p.frame_verarbeiten(&[0.0; 960]),
            FrameErgebnis::SendenFehlgeschlagen
        );
        assert_eq!(p.stats().sende_fehler.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn sammler_bildet_feste_fenster() {
        let mut sammler = FrameSammler::new(4);
        let mut fenster = Vec::new();

        sammler.hinzufuegen(&[1.0, 2.0, 3.0], |f| fenster.push(f.to_vec()));
        assert!(fenster.is_empty());
        assert_eq!(sammler.ausstehend(), 3);

        sammler.hinzufuegen(&[4.0, 5.0, 6.0, 7.0, 8.0, 9.0], |f| fenster.push(f.to_vec()));
        assert_eq!(
            fenster,
            vec![vec![1.0, 2.0, 3.0, 4.0], vec![5.0, 6.0, 7.0, 8.0]]
        );
        assert_eq!(sammler.ausstehend(), 1);
    }

    #[test]
    fn udp_senke_sendet_datagramm() {
        let empfaenger = UdpSocket::bind("127.0.0.1:0").unwrap();
        let ziel = empfaenger.local_addr().unwrap();
        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        let absender = sender.local_addr().unwrap();

        let mut senke = UdpPaketSenke::neu(sender, ziel).unwrap();
        senke.senden(b"frame").unwrap();

        empfaenger
            .set_read_timeout(Some(std::time::Duration::from_secs(1)))
            .unwrap();
        let mut buf = [0u8; 16];
        let (n, von) = empfaenger.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"frame");
        assert_eq!(von, absender, "Absender muss der Audio-Endpunkt sein");
    }
}

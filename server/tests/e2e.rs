//! End-to-End-Tests gegen echte Loopback-Sockets

use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use lanfunk_server::config::ServerConfig;
use lanfunk_server::{GebundeneAdressen, Server};
use lanfunk_voice::SessionRegistry;

struct TestServer {
    adressen: GebundeneAdressen,
    registry: SessionRegistry,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<anyhow::Result<()>>,
}

async fn server_starten(registrierungs_timeout_ms: u64) -> TestServer {
    let mut config = ServerConfig::default();
    config.netzwerk.bind_adresse = "127.0.0.1".into();
    config.netzwerk.tcp_port = 0;
    config.signaling.registrierungs_timeout_ms = registrierungs_timeout_ms;

    let server = Server::binden(config).await.expect("Server muss binden");
    let adressen = server.adressen().unwrap();
    let registry = server.registry();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(server.laufen(shutdown_rx));

    TestServer {
        adressen,
        registry,
        shutdown_tx,
        task,
    }
}

impl TestServer {
    async fn stoppen(self) {
        self.shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), self.task)
            .await
            .expect("Server muss nach Shutdown enden")
            .unwrap()
            .unwrap();
    }
}

struct TestClient {
    control: BufReader<TcpStream>,
    audio: UdpSocket,
}

impl TestClient {
    async fn verbinden(server: &TestServer) -> Self {
        let audio = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = audio.local_addr().unwrap().port();

        let mut control =
            BufReader::new(TcpStream::connect(server.adressen.control).await.unwrap());
        control
            .write_all(format!("AUDIO_PORT:{port}\n").as_bytes())
            .await
            .unwrap();
        assert_eq!(zeile_lesen(&mut control).await.as_deref(), Some("AUDIO_OK"));

        Self { control, audio }
    }

    fn audio_addr(&self) -> SocketAddr {
        self.audio.local_addr().unwrap()
    }

    async fn empfangen(&self, warten: Duration) -> Option<Vec<u8>> {
        let mut buf = [0u8; lanfunk_protocol::MAX_DATAGRAM_SIZE];
        match tokio::time::timeout(warten, self.audio.recv_from(&mut buf)).await {
            Ok(Ok((n, _))) => Some(buf[..n].to_vec()),
            _ => None,
        }
    }
}

async fn zeile_lesen(control: &mut BufReader<TcpStream>) -> Option<String> {
    let mut zeile = String::new();
    let n = tokio::time::timeout(Duration::from_secs(2), control.read_line(&mut zeile))
        .await
        .expect("Antwort oder EOF erwartet")
        .unwrap_or(0);
    (n > 0).then(|| zeile.trim_end().to_string())
}

async fn warten_bis(registry: &SessionRegistry, anzahl: usize) {
    for _ in 0..100 {
        if registry.anzahl() == anzahl {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("Registry erreicht {anzahl} Sessions nicht (aktuell {})", registry.anzahl());
}

const KURZ: Duration = Duration::from_millis(200);
const LANG: Duration = Duration::from_secs(1);

#[tokio::test]
async fn gleichzeitige_handshakes_und_abmeldung() {
    let server = server_starten(5000).await;
    const N: usize = 8;

    let handshakes: Vec<_> = (0..N)
        .map(|_| {
            let control = server.adressen.control;
            tokio::spawn(async move {
                let audio = UdpSocket::bind("127.0.0.1:0").await.unwrap();
                let port = audio.local_addr().unwrap().port();
                let mut stream = BufReader::new(TcpStream::connect(control).await.unwrap());
                stream
                    .write_all(format!("AUDIO_PORT:{port}\n").as_bytes())
                    .await
                    .unwrap();
                assert_eq!(zeile_lesen(&mut stream).await.as_deref(), Some("AUDIO_OK"));
                TestClient {
                    control: stream,
                    audio,
                }
            })
        })
        .collect();

    let mut clients = Vec::new();
    for h in handshakes {
        clients.push(h.await.unwrap());
    }

    assert_eq!(server.registry.anzahl(), N);
    let adressen: HashSet<_> = server.registry.audio_adressen().into_iter().collect();
    assert_eq!(adressen.len(), N, "Jede Session hat eine eigene Audio-Adresse");

    // Ein Client trennt den Control-Kanal
    let TestClient {
        control: getrennt_control,
        audio: getrennt_audio,
    } = clients.remove(N - 1);
    let getrennt_addr = getrennt_audio.local_addr().unwrap();
    drop(getrennt_control);
    warten_bis(&server.registry, N - 1).await;
    assert!(!server.registry.ist_audio_registriert(&getrennt_addr));

    clients[0]
        .audio
        .send_to(b"nach-abmeldung", server.adressen.relay)
        .await
        .unwrap();
    for client in &clients[1..] {
        assert_eq!(client.empfangen(LANG).await.as_deref(), Some(&b"nach-abmeldung"[..]));
    }
    let mut buf = [0u8; 64];
    let nachzuegler = tokio::time::timeout(KURZ, getrennt_audio.recv_from(&mut buf)).await;
    assert!(nachzuegler.is_err(), "Abgemeldeter Client darf nichts mehr erhalten");

    server.stoppen().await;
}

#[tokio::test]
async fn weiterleitung_an_alle_ausser_absender() {
    let server = server_starten(5000).await;
    let a = TestClient::verbinden(&server).await;
    let b = TestClient::verbinden(&server).await;
    let c = TestClient::verbinden(&server).await;

    let frame = vec![0x42u8; 1920];
    a.audio.send_to(&frame, server.adressen.relay).await.unwrap();

    assert_eq!(b.empfangen(LANG).await, Some(frame.clone()));
    assert_eq!(c.empfangen(LANG).await, Some(frame));
    assert_eq!(a.empfangen(KURZ).await, None, "Kein Echo an den Absender");

    server.stoppen().await;
}

#[tokio::test]
async fn unregistrierte_quelle_hat_keine_wirkung() {
    let server = server_starten(5000).await;
    let a = TestClient::verbinden(&server).await;
    let b = TestClient::verbinden(&server).await;

    let fremd = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    fremd.send_to(b"stoerung", server.adressen.relay).await.unwrap();

    assert_eq!(a.empfangen(KURZ).await, None);
    assert_eq!(b.empfangen(KURZ).await, None);
    assert_eq!(server.registry.anzahl(), 2);

    server.stoppen().await;
}

#[tokio::test]
async fn fehlerhafter_handshake_wird_ohne_antwort_geschlossen() {
    let server = server_starten(5000).await;

    let mut stream = BufReader::new(TcpStream::connect(server.adressen.control).await.unwrap());
    stream.write_all(b"HELLO\n").await.unwrap();

    assert_eq!(zeile_lesen(&mut stream).await, None);
    assert!(server.registry.ist_leer());

    server.stoppen().await;
}

#[tokio::test]
async fn registrierungs_timeout_schliesst_verbindung() {
    let server = server_starten(200).await;

    let mut stream = BufReader::new(TcpStream::connect(server.adressen.control).await.unwrap());
    assert_eq!(zeile_lesen(&mut stream).await, None);
    assert!(server.registry.ist_leer());

    server.stoppen().await;
}

#[tokio::test]
async fn quit_entfernt_session() {
    let server = server_starten(5000).await;
    let mut a = TestClient::verbinden(&server).await;
    let _b = TestClient::verbinden(&server).await;

    a.control.write_all(b"QUIT\n").await.unwrap();
    warten_bis(&server.registry, 1).await;
    assert!(!server.registry.ist_audio_registriert(&a.audio_addr()));

    server.stoppen().await;
}

#[tokio::test]
async fn shutdown_schliesst_alle_verbindungen() {
    let server = server_starten(5000).await;
    let mut a = TestClient::verbinden(&server).await;
    let mut b = TestClient::verbinden(&server).await;
    let registry = server.registry.clone();

    server.stoppen().await;

    assert!(registry.ist_leer());
    assert_eq!(zeile_lesen(&mut a.control).await, None);
    assert_eq!(zeile_lesen(&mut b.control).await, None);
}

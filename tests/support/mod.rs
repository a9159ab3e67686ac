//! Loopback WebSocket server shared by the integration tests.
//!
//! Every accepted connection forwards the frames it receives into one
//! `inbound` queue and writes whatever the test pushes through
//! [`Loopback::push`].

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use breeze_rs::TokenRegistry;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

pub const MASTER: &str = "\
ShortName,DisplayName,ExchangeCode,Symbol,Series,Token,Lot,ContractCode
1,RELIANCE INDUSTRIES,NSE,RELIND,EQ,2885,1,
2,INFOSYS,NSE,INFTEC,EQ,1594,1,
3,NIFTY 25JAN24 FUT,NFO,,FUT,35001,50,FUT-NIFTY-25-Jan-2024
4,NIFTY 25JAN24 21000 CE,NFO,,OPT,35002,50,OPT-NIFTY-25-Jan-2024-21000-CE
5,RELIANCE,BSE,RELIND,EQ,500325,1,
";

pub fn registry() -> Arc<TokenRegistry> {
    Arc::new(TokenRegistry::from_csv(MASTER).unwrap())
}

pub struct Loopback {
    pub url: String,
    inbound: mpsc::UnboundedReceiver<Message>,
    outbound: broadcast::Sender<Message>,
    accepted: Arc<AtomicUsize>,
}

impl Loopback {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let (outbound, _) = broadcast::channel(64);
        let accepted = Arc::new(AtomicUsize::new(0));

        let server_outbound = outbound.clone();
        let server_accepted = Arc::clone(&accepted);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let mut out = server_outbound.subscribe();
                let inbound_tx = inbound_tx.clone();
                server_accepted.fetch_add(1, Ordering::SeqCst);

                tokio::spawn(async move {
                    let Ok(ws) = accept_async(stream).await else {
                        return;
                    };
                    let (mut write, mut read) = ws.split();
                    loop {
                        tokio::select! {
                            msg = read.next() => match msg {
                                Some(Ok(msg)) => {
                                    let close = msg.is_close();
                                    let _ = inbound_tx.send(msg);
                                    if close {
                                        break;
                                    }
                                }
                                _ => break,
                            },
                            frame = out.recv() => match frame {
                                Ok(frame) => {
                                    if write.send(frame).await.is_err() {
                                        break;
                                    }
                                }
                                Err(broadcast::error::RecvError::Lagged(_)) => {}
                                Err(broadcast::error::RecvError::Closed) => break,
                            },
                        }
                    }
                });
            }
        });

        Self {
            url,
            inbound,
            outbound,
            accepted,
        }
    }

    /// Connections accepted so far.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Send a frame to every connected client.
    pub fn push(&self, msg: Message) {
        let _ = self.outbound.send(msg);
    }

    pub fn push_json(&self, value: Value) {
        self.push(Message::Text(value.to_string().into()));
    }

    /// Next frame received from a client.
    pub async fn next(&mut self) -> Message {
        tokio::time::timeout(Duration::from_secs(5), self.inbound.recv())
            .await
            .expect("timed out waiting for a client frame")
            .expect("server stopped")
    }

    /// Next text frame received from a client, parsed as JSON.
    pub async fn next_json(&mut self) -> Value {
        let msg = self.next().await;
        serde_json::from_str(msg.to_text().unwrap()).unwrap()
    }

    /// Assert that nothing else arrives within a short window.
    pub async fn assert_quiet(&mut self) {
        let res = tokio::time::timeout(Duration::from_millis(200), self.inbound.recv()).await;
        assert!(res.is_err(), "unexpected frame: {res:?}");
    }
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

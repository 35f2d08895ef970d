mod common;

use std::{collections::HashMap, sync::Arc};

use anyhow::{anyhow, Result};
use linewire::{Client, Server};

use common::{init_tracing, next_event, RecordingServerListener, ServerEvent};

const CLIENT_COUNT: usize = 50;

#[tokio::test]
async fn fan_in_loses_and_duplicates_nothing() -> Result<()> {
    init_tracing();
    let (listener, mut events) = RecordingServerListener::silent();
    let server = Server::open("127.0.0.1:0".parse()?, Arc::new(listener)).await?;

    // Connect everyone first so all sends overlap in time.
    let mut clients = Vec::with_capacity(CLIENT_COUNT);
    let mut expected = HashMap::new();
    for index in 0..CLIENT_COUNT {
        let mut client = Client::new(server.local_addr());
        client.connect().await?;
        let id = client
            .local_addr()
            .ok_or_else(|| anyhow!("client {index} should be connected"))?
            .to_string();
        expected.insert(id, format!("payload-{index}"));
        clients.push(client);
    }

    for (index, client) in clients.iter_mut().enumerate() {
        client.send(&format!("payload-{index}")).await?;
    }

    let mut observed = HashMap::new();
    let mut remaining = CLIENT_COUNT;
    while remaining > 0 {
        match next_event(&mut events).await? {
            ServerEvent::Message { session, text } => {
                let previous = observed.insert(session.clone(), text);
                assert!(previous.is_none(), "duplicate message from {session}");
                remaining -= 1;
            }
            ServerEvent::Connected(_) => {}
            ServerEvent::Disconnected(id) => {
                return Err(anyhow!("unexpected disconnect of {id} mid-test"));
            }
        }
    }

    // Every message arrived exactly once, attributed to its true sender.
    assert_eq!(observed, expected);

    for mut client in clients {
        client.close().await;
    }
    server.close().await;
    Ok(())
}

#[tokio::test]
async fn interleaved_sessions_each_keep_their_own_order() -> Result<()> {
    init_tracing();
    let (listener, mut events) = RecordingServerListener::silent();
    let server = Server::open("127.0.0.1:0".parse()?, Arc::new(listener)).await?;

    let mut alice = Client::new(server.local_addr());
    let mut bob = Client::new(server.local_addr());
    alice.connect().await?;
    bob.connect().await?;

    let alice_id = alice
        .local_addr()
        .ok_or_else(|| anyhow!("alice should be connected"))?
        .to_string();
    let bob_id = bob
        .local_addr()
        .ok_or_else(|| anyhow!("bob should be connected"))?
        .to_string();

    // Alternate sends so the two sessions interleave in global time.
    for round in 0..5 {
        alice.send(&format!("a{round}")).await?;
        bob.send(&format!("b{round}")).await?;
    }

    let mut per_session: HashMap<String, Vec<String>> = HashMap::new();
    let mut remaining = 10;
    while remaining > 0 {
        if let ServerEvent::Message { session, text } = next_event(&mut events).await? {
            per_session.entry(session).or_default().push(text);
            remaining -= 1;
        }
    }

    let expected_alice: Vec<String> = (0..5).map(|round| format!("a{round}")).collect();
    let expected_bob: Vec<String> = (0..5).map(|round| format!("b{round}")).collect();
    assert_eq!(per_session.get(&alice_id), Some(&expected_alice));
    assert_eq!(per_session.get(&bob_id), Some(&expected_bob));

    alice.close().await;
    bob.close().await;
    server.close().await;
    Ok(())
}

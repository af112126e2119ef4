//! End-to-end scenarios for the tree relay (§8 S2-S7).

use std::time::Duration;

use cast::connection::inproc;
use cast::{Connection, Message, NodeError, Options};

async fn within(duration: Duration, future: impl std::future::Future<Output = ()>) {
    tokio::time::timeout(duration, future)
        .await
        .expect("expected to complete within the deadline");
}

#[tokio::test(flavor = "multi_thread")]
async fn node_to_parent() {
    // S2
    let (node, send, _receive, _errors) = cast::Node::new(Options::default());
    let (local, mut remote) = inproc::new();
    node.join(local).await;

    send.send(Message::new(["x"], "hi")).await.unwrap();

    within(Duration::from_millis(120), async {
        assert_eq!(remote.recv().await.unwrap().val, "hi");
    })
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn fan_out_to_three_children() {
    // S3
    let (node, send, mut receive, _errors) = cast::Node::new(Options::default());
    let (listener_tx, listener_rx) = cast::listener::channel(4);
    node.listen(listener_rx).await.unwrap();

    let mut remotes = Vec::new();
    for _ in 0..3 {
        let (local, remote) = inproc::new();
        listener_tx.send(local).await.unwrap();
        remotes.push(remote);
    }
    // give the dispatcher a beat to pull the connections off the listener
    tokio::time::sleep(Duration::from_millis(20)).await;

    send.send(Message::new(["x"], "broadcast")).await.unwrap();

    within(Duration::from_millis(120), async {
        for remote in &mut remotes {
            assert_eq!(remote.recv().await.unwrap().val, "broadcast");
        }
    })
    .await;

    assert!(
        tokio::time::timeout(Duration::from_millis(50), receive.recv())
            .await
            .is_err(),
        "user-send must never be echoed back to user-receive"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_child_does_not_stall_others() {
    // S4
    let opt = Options {
        child_buffer: 3,
        ..Default::default()
    };
    let (node, send, _receive, _errors) = cast::Node::new(opt);
    let (listener_tx, listener_rx) = cast::listener::channel(4);
    node.listen(listener_rx).await.unwrap();

    let (local0, _remote0_never_read) = inproc::new();
    let (local1, mut remote1) = inproc::new();
    let (local2, mut remote2) = inproc::new();
    for local in [local0, local1, local2] {
        listener_tx.send(local).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(20)).await;

    for i in 0..5 {
        send.send(Message::new(["x"], i.to_string())).await.unwrap();
    }

    within(Duration::from_millis(120), async {
        for i in 0..5 {
            assert_eq!(remote1.recv().await.unwrap().val, i.to_string());
        }
        for i in 0..5 {
            assert_eq!(remote2.recv().await.unwrap().val, i.to_string());
        }
    })
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn timeout_drops_and_reports() {
    // S5
    let opt = Options {
        child_timeout: Duration::from_millis(1),
        ..Default::default()
    };
    let (node, send, _receive, mut errors) = cast::Node::new(opt);
    let (listener_tx, listener_rx) = cast::listener::channel(4);
    node.listen(listener_rx).await.unwrap();

    let (local, _remote_never_read) = inproc::new();
    listener_tx.send(local).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    send.send(Message::new(["x"], "lost")).await.unwrap();

    within(Duration::from_millis(120), async {
        match errors.recv().await {
            Some(NodeError::Timeout(message)) => assert_eq!(message.val, "lost"),
            other => panic!("expected a timeout error, got {other:?}"),
        }
    })
    .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn source_suppression_with_parent_and_children() {
    // S6
    let (node, _send, mut receive, _errors) = cast::Node::new(Options::default());

    let (parent_local, mut parent_remote) = inproc::new();
    node.join(parent_local).await;

    let (listener_tx, listener_rx) = cast::listener::channel(4);
    node.listen(listener_rx).await.unwrap();

    let mut children: Vec<Connection> = Vec::new();
    for _ in 0..3 {
        let (local, remote) = inproc::new();
        listener_tx.send(local).await.unwrap();
        children.push(remote);
    }
    tokio::time::sleep(Duration::from_millis(20)).await;

    // c1 (index 1) sends the message.
    children[1]
        .send(Message::new(["x"], "from-c1"))
        .await
        .unwrap();

    within(Duration::from_millis(120), async {
        assert_eq!(receive.recv().await.unwrap().val, "from-c1");
        assert_eq!(parent_remote.recv().await.unwrap().val, "from-c1");
        assert_eq!(children[0].recv().await.unwrap().val, "from-c1");
        assert_eq!(children[2].recv().await.unwrap().val, "from-c1");
    })
    .await;

    assert!(
        tokio::time::timeout(Duration::from_millis(50), children[1].recv())
            .await
            .is_err(),
        "the source child must never receive its own message back"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn graceful_shutdown() {
    // S7
    let (node, send, mut receive, _errors) = cast::Node::new(Options::default());

    let (parent_local, mut parent_remote) = inproc::new();
    node.join(parent_local).await;

    let (listener_tx, listener_rx) = cast::listener::channel(4);
    node.listen(listener_rx).await.unwrap();
    let (child_local, mut child_remote) = inproc::new();
    listener_tx.send(child_local).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    drop(send);

    within(Duration::from_millis(120), async {
        assert!(receive.recv().await.is_none());
        assert!(parent_remote.recv().await.is_none());
        assert!(child_remote.recv().await.is_none());
    })
    .await;
}

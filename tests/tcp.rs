mod common;

use std::time::Duration;

use chord_dht::{chord::state::ChordState, Chord, ChordConfig, ChordHandle, ChordId};
use tokio::time::sleep;


fn config() -> ChordConfig {
	ChordConfig {
		bits: 16,
		maintenance_interval_ms: 50,
		rpc_timeout_ms: 1_000,
		..Default::default()
	}
}

async fn start_ring(count: usize) -> Vec<ChordHandle> {
	let first = Chord::new("127.0.0.1:0", config())
		.start(None)
		.await
		.expect("first node should host");
	let entry = first.descriptor().addr.clone();

	let mut handles = vec![first];
	for _ in 1..count {
		let handle = Chord::new("127.0.0.1:0", config())
			.start(Some(entry.clone()))
			.await
			.expect("node should join");
		handles.push(handle);
	}
	handles
}

fn is_converged(handles: &[ChordHandle]) -> bool {
	let mut ids: Vec<ChordId> = handles.iter().map(|h| h.descriptor().id).collect();
	ids.sort();
	handles.iter().all(|handle| {
		let node = handle.node();
		let me = ids.iter().position(|id| *id == node.id()).unwrap_or(0);
		let next = ids[(me + 1) % ids.len()];
		let prev = ids[(me + ids.len() - 1) % ids.len()];
		let successor = node.successor().map(|s| s.id).ok();
		let predecessor = node.predecessor().ok().flatten().map(|p| p.id);
		successor == Some(next) && predecessor == Some(prev)
	})
}

async fn wait_for_convergence(handles: &[ChordHandle]) {
	for _ in 0..200 {
		if is_converged(handles) {
			return;
		}
		sleep(Duration::from_millis(50)).await;
	}
	panic!("ring did not converge");
}

#[tokio::test]
async fn tcp_ring_stores_and_survives_a_leave() {
	common::init_tracing();
	let mut handles = start_ring(4).await;
	wait_for_convergence(&handles).await;

	let client = handles[0].associate();
	for n in 0..20 {
		client.put(&format!("key-{}", n), format!("value-{}", n)).await.unwrap();
	}
	let other = handles[3].associate();
	for n in 0..20 {
		assert_eq!(other.get(&format!("key-{}", n)).await.unwrap(), format!("value-{}", n));
	}

	let leaving = handles.remove(1);
	leaving.leave().await.unwrap();
	wait_for_convergence(&handles).await;

	// stale fingers are dropped on first contact, so allow a retry
	for n in 0..20 {
		let key = format!("key-{}", n);
		let mut value = client.get(&key).await;
		if matches!(&value, Err(e) if e.is_unreachable()) {
			sleep(Duration::from_millis(200)).await;
			value = client.get(&key).await;
		}
		assert_eq!(value.unwrap(), format!("value-{}", n));
	}

	for handle in handles {
		handle.stop().await;
	}
}

#[tokio::test]
async fn start_fails_without_a_reachable_bootstrap() {
	// bind then drop to get a port nobody listens on
	let dead = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().to_string();

	let result = Chord::new("127.0.0.1:0", config()).start(Some(dead.clone())).await;
	assert!(matches!(result, Err(e) if e.is_unreachable()));

	let mut chord = Chord::new("127.0.0.1:0", config());
	chord.set_join_or_host(true);
	let handle = chord.start(Some(dead)).await.unwrap();
	assert!(handle.node().is_joined().unwrap());
	handle.stop().await;
}

#[tokio::test]
async fn state_file_is_written_by_maintenance() {
	let path = std::env::temp_dir().join(format!("chord_tcp_state_{}.json", std::process::id()));
	ChordState::new("127.0.0.1:0", config()).save(&path).await.unwrap();

	let mut chord = Chord::from_file(path.clone()).await.unwrap();
	chord.set_id(ChordId(4242));
	let handle = chord.start(None).await.unwrap();

	let mut saved = None;
	for _ in 0..40 {
		sleep(Duration::from_millis(50)).await;
		// the file may be caught mid-write
		if let Ok(state) = ChordState::from_file(&path).await {
			if state.node_id.is_some() {
				saved = Some(state);
				break;
			}
		}
	}
	let saved = saved.expect("maintenance should save the node state");
	assert_eq!(saved.node_id, Some(ChordId(4242)));
	assert_eq!(saved.node_addr.as_deref(), Some(handle.descriptor().addr.as_str()));

	handle.stop().await;
	let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn start_reports_a_taken_id_as_configuration() {
	let mut first = Chord::new("127.0.0.1:0", config());
	first.set_id(ChordId(777));
	let first = first.start(None).await.unwrap();

	let mut second = Chord::new("127.0.0.1:0", config());
	second.set_id(ChordId(777));
	second.set_join_or_host(true);
	let result = second.start(Some(first.descriptor().addr.clone())).await;
	assert!(matches!(result, Err(chord_dht::Error::Configuration(_))));

	first.stop().await;
}

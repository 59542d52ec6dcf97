//! Fan-out of avatar state to connected clients
//!
//! Two delivery paths read from the registry:
//! - Immediate relay forwards a client's frame to every other client as soon
//!   as it arrives. Only the id bytes are rewritten; the rest is not re-encoded.
//! - The snapshot broadcast re-sends every client's latest stored state to
//!   every client, the originator included, so late joiners and clients that
//!   missed a relayed frame converge within one snapshot interval.

use crate::client_manager::ClientManager;
use crate::transport::send_if_open;
use shared::{AvatarUpdate, ProtocolError};
use tokio_tungstenite::tungstenite::Message;

/// Decodes `frame` from `sender_id`, stores it and forwards it to the peers
///
/// Both the stored copy and the forwarded bytes carry the sender's
/// server-assigned id, whatever id the frame claimed. Returns how many peers
/// the frame was queued for. An undecodable frame is neither stored nor
/// forwarded.
pub fn relay_update(
    clients: &mut ClientManager,
    sender_id: u16,
    frame: &[u8],
) -> Result<usize, ProtocolError> {
    let update = AvatarUpdate::decode(frame)?;

    let Some(sender) = clients.get_mut(sender_id) else {
        return Ok(0);
    };
    sender.store_update(update);

    let mut stamped = frame.to_vec();
    stamped[..2].copy_from_slice(&sender_id.to_be_bytes());

    let mut forwarded = 0;
    for peer in clients.iter().filter(|peer| peer.id != sender_id) {
        if send_if_open(peer.transport.as_ref(), Message::Binary(stamped.clone())) {
            forwarded += 1;
        }
    }

    Ok(forwarded)
}

/// Sends every live client's latest state to every open client
///
/// Returns the number of frames queued.
pub fn broadcast_snapshot(clients: &ClientManager) -> usize {
    let frames: Vec<[u8; shared::FRAME_SIZE]> =
        clients.iter().map(|client| client.update.encode()).collect();

    let mut sent = 0;
    for frame in &frames {
        for client in clients.iter() {
            if send_if_open(client.transport.as_ref(), Message::Binary(frame.to_vec())) {
                sent += 1;
            }
        }
    }
    sent
}

/// Sends the newcomer one frame per other live client's latest state
pub fn send_catch_up(clients: &ClientManager, newcomer: u16) -> usize {
    let Some(target) = clients.get(newcomer) else {
        return 0;
    };

    let mut sent = 0;
    for client in clients.iter().filter(|client| client.id != newcomer) {
        let frame = client.update.encode();
        if send_if_open(target.transport.as_ref(), Message::Binary(frame.to_vec())) {
            sent += 1;
        }
    }
    sent
}

/// Sends a text frame to every open client except `exclude`
pub fn broadcast_text(clients: &ClientManager, text: &str, exclude: Option<u16>) -> usize {
    let mut sent = 0;
    for client in clients.iter() {
        if Some(client.id) == exclude {
            continue;
        }

        if send_if_open(client.transport.as_ref(), Message::Text(text.to_owned())) {
            sent += 1;
        }
    }
    sent
}

/// Sends a text frame to a single client if it is live and open
pub fn send_text(clients: &ClientManager, client_id: u16, text: &str) -> bool {
    clients.get(client_id).is_some_and(|client| {
        send_if_open(client.transport.as_ref(), Message::Text(text.to_owned()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ChannelTransport, Transport};
    use shared::{AnimationState, Location, Rotation};
    use std::time::Instant;
    use tokio::sync::mpsc::Receiver;

    fn connect(clients: &mut ClientManager) -> (u16, Receiver<Message>) {
        let (transport, rx) = ChannelTransport::new(64);
        let session = clients.len() as u64;
        let id = clients
            .add_client(session, Box::new(transport), Instant::now())
            .unwrap();
        (id, rx)
    }

    fn drain(rx: &mut Receiver<Message>) -> Vec<Message> {
        let mut messages = Vec::new();
        while let Ok(message) = rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    fn decode_all(messages: &[Message]) -> Vec<AvatarUpdate> {
        messages
            .iter()
            .map(|message| match message {
                Message::Binary(frame) => AvatarUpdate::decode(frame).unwrap(),
                other => panic!("Expected binary frame, got {:?}", other),
            })
            .collect()
    }

    fn walking(id: u16, x: f32) -> AvatarUpdate {
        AvatarUpdate::new(
            id,
            Location::new(x, 0.0, 0.0),
            Rotation::new(0.0, 1.0),
            AnimationState::Walking,
        )
    }

    #[test]
    fn test_relay_stores_and_forwards_to_peers_only() {
        let mut clients = ClientManager::new(8);
        let (a, mut rx_a) = connect(&mut clients);
        let (_b, mut rx_b) = connect(&mut clients);
        let (_c, mut rx_c) = connect(&mut clients);

        let frame = walking(a, 4.0).encode();
        assert_eq!(relay_update(&mut clients, a, &frame), Ok(2));

        assert_eq!(clients.get(a).unwrap().update, walking(a, 4.0));
        assert!(drain(&mut rx_a).is_empty());
        assert_eq!(drain(&mut rx_b), vec![Message::Binary(frame.to_vec())]);
        assert_eq!(drain(&mut rx_c), vec![Message::Binary(frame.to_vec())]);
    }

    #[test]
    fn test_relay_rewrites_claimed_id() {
        let mut clients = ClientManager::new(8);
        let (a, _rx_a) = connect(&mut clients);
        let (_b, mut rx_b) = connect(&mut clients);

        let spoofed = walking(500, 9.0).encode();
        relay_update(&mut clients, a, &spoofed).unwrap();

        assert_eq!(clients.get(a).unwrap().update.id, a);
        assert_eq!(
            drain(&mut rx_b),
            vec![Message::Binary(walking(a, 9.0).encode().to_vec())]
        );
    }

    #[test]
    fn test_relay_rejects_bad_frames_without_side_effects() {
        let mut clients = ClientManager::new(8);
        let (a, _rx_a) = connect(&mut clients);
        let (_b, mut rx_b) = connect(&mut clients);

        let mut bad_state = walking(a, 1.0).encode();
        bad_state[18] = 7;

        assert_eq!(
            relay_update(&mut clients, a, &bad_state),
            Err(ProtocolError::UnknownAnimationState(7))
        );
        assert_eq!(
            relay_update(&mut clients, a, &[0u8; 4]),
            Err(ProtocolError::InvalidFrameLength(4))
        );

        assert_eq!(clients.get(a).unwrap().update, AvatarUpdate::idle(a));
        assert!(drain(&mut rx_b).is_empty());
    }

    #[test]
    fn test_relay_skips_closed_peers() {
        let mut clients = ClientManager::new(8);
        let (a, _rx_a) = connect(&mut clients);
        let (b, _rx_b) = connect(&mut clients);
        let (_c, mut rx_c) = connect(&mut clients);

        clients.get(b).unwrap().transport.close();

        let frame = walking(a, 2.0).encode();
        assert_eq!(relay_update(&mut clients, a, &frame), Ok(1));
        assert_eq!(drain(&mut rx_c).len(), 1);
    }

    #[test]
    fn test_snapshot_reaches_everyone_including_originator() {
        let mut clients = ClientManager::new(8);
        let (a, mut rx_a) = connect(&mut clients);
        let (b, mut rx_b) = connect(&mut clients);

        clients.get_mut(a).unwrap().store_update(walking(a, 1.0));

        assert_eq!(broadcast_snapshot(&clients), 4);

        let expected = vec![walking(a, 1.0), AvatarUpdate::idle(b)];
        assert_eq!(decode_all(&drain(&mut rx_a)), expected);
        assert_eq!(decode_all(&drain(&mut rx_b)), expected);
    }

    #[test]
    fn test_snapshot_with_no_clients() {
        let clients = ClientManager::new(8);
        assert_eq!(broadcast_snapshot(&clients), 0);
    }

    #[test]
    fn test_catch_up_sends_other_clients_state() {
        let mut clients = ClientManager::new(8);
        let (a, _rx_a) = connect(&mut clients);
        let (b, _rx_b) = connect(&mut clients);
        clients.get_mut(a).unwrap().store_update(walking(a, 3.0));

        let (c, mut rx_c) = connect(&mut clients);
        assert_eq!(send_catch_up(&clients, c), 2);

        assert_eq!(
            decode_all(&drain(&mut rx_c)),
            vec![walking(a, 3.0), AvatarUpdate::idle(b)]
        );
    }

    #[test]
    fn test_broadcast_text_excludes() {
        let mut clients = ClientManager::new(8);
        let (a, mut rx_a) = connect(&mut clients);
        let (_b, mut rx_b) = connect(&mut clients);

        assert_eq!(broadcast_text(&clients, "hi", Some(a)), 1);
        assert!(drain(&mut rx_a).is_empty());
        assert_eq!(drain(&mut rx_b), vec![Message::Text("hi".into())]);

        assert!(send_text(&clients, a, "direct"));
        assert!(!send_text(&clients, 99, "nobody"));
        assert_eq!(drain(&mut rx_a), vec![Message::Text("direct".into())]);
    }
}

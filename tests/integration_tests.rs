//! Integration tests for the room → frame → reconciler pipeline
//!
//! These tests drive a server room through real ticks and feed its frames to
//! client-side boards, plus one session over a real UDP socket.

use bincode::{deserialize, serialize};
use client::game::GameBoard;
use client::reconciler::{ReconcilerConfig, RemoteEvent, RemoteStateReconciler};
use server::config::RoomConfig;
use server::network::{Server, ServerMessage};
use server::room::Room;
use shared::driver::key_codes;
use shared::snapshot::{decode_frame, frame_len};
use shared::{CarConfig, KeyMap, MapObject, ObjectType, Packet, Vec2, PROTOCOL_VERSION};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tokio_test::assert_ok;

fn throttle() -> KeyMap {
    [key_codes::ARROW_UP].into_iter().collect()
}

fn track() -> Vec<MapObject> {
    vec![
        MapObject::fixture(1, ObjectType::Terrain),
        MapObject::fixture(2, ObjectType::Road),
    ]
}

fn two_player_room() -> Room {
    let mut room = Room::new(RoomConfig::default(), CarConfig::default(), track()).unwrap();
    room.add_player(1, "alice".to_string()).unwrap();
    room.add_player(2, "bob".to_string()).unwrap();
    room
}

/// ROOM SIMULATION TESTS
mod simulation_tests {
    use super::*;

    /// Two cars at full throttle move straight ahead, every tick
    #[test]
    fn cars_advance_monotonically_along_heading() {
        let mut room = two_player_room();
        let start: Vec<Vec2> = [1, 2].iter().map(|id| room.car(*id).unwrap().pos).collect();
        let heading = Vec2::heading(room.config().spawn_angle);
        let mut previous = start.clone();

        for _ in 0..100 {
            room.enqueue_input(1, throttle()).unwrap();
            room.enqueue_input(2, throttle()).unwrap();
            room.tick().unwrap();

            for (index, id) in [1, 2].iter().enumerate() {
                let car = room.car(*id).unwrap();
                assert_eq!(car.steer_angle(), 0.0);

                let step = car.pos - previous[index];
                assert!(step.dot(&heading) > 0.0, "car {} stalled", id);
                previous[index] = car.pos;
            }
        }

        for (index, id) in [1, 2].iter().enumerate() {
            let displacement = room.car(*id).unwrap().pos - start[index];
            assert!(displacement.dot(&heading) > 0.0);
            assert_eq!(displacement.x, 0.0);
        }
    }

    /// Same inputs in two rooms give bit-identical frames
    #[test]
    fn simulation_is_deterministic() {
        let mut a = two_player_room();
        let mut b = two_player_room();
        let left: KeyMap = [key_codes::ARROW_UP, key_codes::A].into_iter().collect();

        for tick in 0..200 {
            let key_map = if tick % 3 == 0 { left.clone() } else { throttle() };
            a.enqueue_input(1, key_map.clone()).unwrap();
            b.enqueue_input(1, key_map).unwrap();

            assert_eq!(a.tick().unwrap(), b.tick().unwrap());
        }
    }

    /// A player leaving between ticks is dropped from the next frame
    #[test]
    fn partial_disconnect_omits_player_from_next_frame() {
        let mut room = two_player_room();
        room.enqueue_input(2, throttle()).unwrap();
        assert_eq!(room.tick().unwrap().len(), frame_len(2));

        room.enqueue_input(2, throttle()).unwrap();
        room.remove_player(2).unwrap();

        let frame = room.tick().unwrap();
        assert_eq!(frame.len(), frame_len(1));
        let records = decode_frame(&frame).unwrap();
        assert_eq!(records[0].id, room.slot(1).unwrap().info.car_id);
    }
}

/// CLIENT RECONCILIATION TESTS
mod reconciliation_tests {
    use super::*;

    fn client_for(room: &Room, local_car: u32) -> RemoteStateReconciler<GameBoard> {
        let mut board = GameBoard::from_initial_room_state(room.initial_room_state());
        board.set_local_car(Some(local_car));
        RemoteStateReconciler::new(
            ReconcilerConfig {
                local_car: Some(local_car),
            },
            board,
        )
    }

    /// The local car keeps its own state while remote cars follow the server
    #[test]
    fn self_exclusion_keeps_local_car() {
        let mut room = two_player_room();
        let local = room.slot(1).unwrap().info.car_id;
        let remote = room.slot(2).unwrap().info.car_id;
        let mut client = client_for(&room, local);
        let local_before = client.listeners().unwrap().car(local).unwrap().pos;

        for _ in 0..20 {
            room.enqueue_input(1, throttle()).unwrap();
            room.enqueue_input(2, throttle()).unwrap();
            let frame = room.tick().unwrap();
            client.handle_packet(&Packet::RaceState { frame });
        }

        let board = client.listeners().unwrap();
        assert_eq!(board.car(local).unwrap().pos, local_before);
        assert_ne!(room.car(1).unwrap().pos, local_before);
        assert_eq!(board.car(remote).unwrap().pos, room.car(2).unwrap().pos);
        assert_eq!(
            board.car(remote).unwrap().velocity,
            room.car(2).unwrap().velocity
        );
    }

    /// Local driving on the client matches the server given the same key maps
    #[test]
    fn local_simulation_matches_server() {
        let mut room = two_player_room();
        let local = room.slot(1).unwrap().info.car_id;
        let mut client = client_for(&room, local);

        for _ in 0..50 {
            room.enqueue_input(1, throttle()).unwrap();
            let frame = room.tick().unwrap();
            client.handle_packet(&Packet::RaceState { frame });
            client
                .listeners_mut()
                .unwrap()
                .drive_local_car(&throttle(), 0.015);
        }

        let board = client.listeners().unwrap();
        assert_eq!(board.local_car().unwrap().pos, room.car(1).unwrap().pos);
    }

    /// Join and leave broadcasts keep the client registry in step with the room
    #[test]
    fn join_and_leave_propagate_to_client() {
        let mut room = two_player_room();
        let local = room.slot(1).unwrap().info.car_id;
        let mut client = client_for(&room, local);

        let (player, car) = room.add_player(3, "carol".to_string()).unwrap();
        client.handle_packet(&Packet::PlayerJoined {
            player: player.clone(),
            car,
        });
        let frame = room.tick().unwrap();
        assert_eq!(client.handle_packet(&Packet::RaceState { frame }), 2);

        let board = client.listeners().unwrap();
        assert_eq!(board.registry().player_count(), 3);
        assert_eq!(board.car(player.car_id).unwrap().pos, room.car(3).unwrap().pos);

        let left = room.remove_player(3).unwrap();
        client.handle_packet(&Packet::PlayerLeft { player: left });
        let frame = room.tick().unwrap();
        client.handle_packet(&Packet::RaceState { frame });

        let board = client.listeners().unwrap();
        assert_eq!(board.registry().player_count(), 2);
        assert!(board.car(player.car_id).is_none());
        assert_eq!(board.unknown_syncs(), 0);
    }

    /// A truncated frame is skipped and the next good frame still applies
    #[test]
    fn corrupt_frame_does_not_break_reconciler() {
        let mut room = two_player_room();
        let local = room.slot(1).unwrap().info.car_id;
        let remote = room.slot(2).unwrap().info.car_id;
        let mut client = client_for(&room, local);

        room.enqueue_input(2, throttle()).unwrap();
        let mut frame = room.tick().unwrap();
        frame.truncate(frame.len() - 3);
        assert_eq!(client.handle_packet(&Packet::RaceState { frame }), 0);

        let frame = room.tick().unwrap();
        let events = client.decode(&Packet::RaceState {
            frame: frame.clone(),
        });
        assert!(matches!(events.as_slice(), [RemoteEvent::Synced(info)] if info.id == remote));

        client.handle_packet(&Packet::RaceState { frame });
        let board = client.listeners().unwrap();
        assert_eq!(board.car(remote).unwrap().pos, room.car(2).unwrap().pos);
    }

    /// Loading, releasing and reloading a room state gives the same registry
    #[test]
    fn reload_after_release_is_idempotent() {
        let room = two_player_room();
        let state = room.initial_room_state();

        let mut board = GameBoard::from_initial_room_state(state.clone());
        let first = board.registry().clone();

        board.release();
        board.load_initial_room_state(state);

        assert_eq!(board.registry(), &first);
        assert_eq!(board.registry().road_elements(), &[2]);
    }
}

/// NETWORK SESSION TESTS
mod network_tests {
    use super::*;

    async fn recv_packet(socket: &UdpSocket) -> Packet {
        let mut buf = vec![0u8; 65_536];
        let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
            .await
            .expect("timed out waiting for packet")
            .unwrap();
        deserialize(&buf[..len]).unwrap()
    }

    /// A raw UDP client joins, drives, receives frames and leaves
    #[tokio::test]
    async fn udp_session_round_trip() {
        let mut server = assert_ok!(
            Server::new("127.0.0.1:0", RoomConfig::default(), CarConfig::default(), track()).await
        );
        let server_addr = server.local_addr().unwrap();
        let shutdown = server.shutdown_handle();
        let handle = tokio::spawn(async move {
            let _ = server.run().await;
        });

        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let connect = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            nick: "udp".to_string(),
        };
        socket
            .send_to(&serialize(&connect).unwrap(), server_addr)
            .await
            .unwrap();

        let mut car_id = None;
        let mut saw_state = false;
        let mut saw_frame = false;
        for _ in 0..100 {
            match recv_packet(&socket).await {
                Packet::Connected { player_id, car_id: id } => {
                    assert_eq!(player_id, 1);
                    car_id = Some(id);
                }
                Packet::RoomInitialState(state) => {
                    assert!(state.objects.iter().any(|o| Some(o.id) == car_id));
                    saw_state = true;
                }
                Packet::RaceState { frame } => {
                    let records = decode_frame(&frame).unwrap();
                    assert!(records.len() <= 1);
                    if records.first().map(|r| r.id) == car_id && car_id.is_some() {
                        saw_frame = true;
                    }
                }
                other => panic!("Unexpected packet {:?}", other),
            }
            if saw_state && saw_frame {
                break;
            }
        }
        assert!(saw_state && saw_frame);

        socket
            .send_to(&serialize(&Packet::Disconnect).unwrap(), server_addr)
            .await
            .unwrap();
        shutdown.send(ServerMessage::Shutdown).unwrap();
        timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }

    /// Packets that are not valid bincode are ignored by the server
    #[tokio::test]
    async fn malformed_datagram_is_ignored() {
        let mut server = assert_ok!(
            Server::new("127.0.0.1:0", RoomConfig::default(), CarConfig::default(), track()).await
        );
        let server_addr = server.local_addr().unwrap();
        let shutdown = server.shutdown_handle();
        let handle = tokio::spawn(async move {
            let _ = server.run().await;
        });

        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        socket.send_to(&[0xFF; 7], server_addr).await.unwrap();

        let connect = Packet::Connect {
            client_version: PROTOCOL_VERSION,
            nick: "after-garbage".to_string(),
        };
        socket
            .send_to(&serialize(&connect).unwrap(), server_addr)
            .await
            .unwrap();
        let mut connected = false;
        for _ in 0..20 {
            if let Packet::Connected { .. } = recv_packet(&socket).await {
                connected = true;
                break;
            }
        }
        assert!(connected);

        shutdown.send(ServerMessage::Shutdown).unwrap();
        timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}

use std::sync::{Arc, Mutex};

use factoryplan_core::prototypes::{PIPE, PIPE_TO_GROUND};
use factoryplan_core::{CellCoord, Direction, EntityDescriptor, EntityStore, Position};
use factoryplan_editor::{ChunkRefresh, Editor, EditorSettings, SharedPeer, SyncError, SyncPeer};
use factoryplan_io::sync::PeerEntityUpdate;
use factoryplan_io::{ChunkCoord, InboundMessage, OutboundMessage};

#[derive(Default)]
struct RecordingPeer {
    sent: Vec<OutboundMessage>,
    requests: Vec<ChunkCoord>,
    offline: bool,
}

impl SyncPeer for RecordingPeer {
    fn emit(&mut self, message: &OutboundMessage) -> Result<(), SyncError> {
        if self.offline {
            return Err(SyncError::Unreachable("offline".into()));
        }
        self.sent.push(message.clone());
        Ok(())
    }

    /// Every chunk holds a single pipe in its top-left cell.
    fn request_chunk(&mut self, chunk: ChunkCoord) -> Result<Vec<PeerEntityUpdate>, SyncError> {
        if self.offline {
            return Err(SyncError::Unreachable("offline".into()));
        }
        self.requests.push(chunk);
        Ok(vec![PeerEntityUpdate {
            name: "pipe".into(),
            x: chunk.x as f64 * 32.0 + 0.5,
            y: chunk.y as f64 * 32.0 + 0.5,
            direction: Direction::North,
        }])
    }
}

fn connected(settings: EditorSettings) -> (Editor, Arc<Mutex<RecordingPeer>>) {
    let recorder = Arc::new(Mutex::new(RecordingPeer::default()));
    let peer: SharedPeer = recorder.clone();
    let mut editor = Editor::with_store(EntityStore::with_seed("sync", 4), settings);
    editor.connect_peer(peer);
    (editor, recorder)
}

fn sent(recorder: &Arc<Mutex<RecordingPeer>>) -> Vec<OutboundMessage> {
    recorder.lock().unwrap().sent.clone()
}

#[test]
fn test_local_edits_reach_the_peer_in_map_coordinates() {
    let (mut editor, recorder) = connected(EditorSettings::default());
    let id = editor
        .create_entity(
            EntityDescriptor::new(PIPE_TO_GROUND, Position::new(2003.5, 1998.5))
                .with_direction(Direction::South),
        )
        .unwrap();
    editor.remove_entity(id).unwrap();
    assert!(editor.undo());

    let messages = sent(&recorder);
    assert_eq!(messages.len(), 3);
    match &messages[0] {
        OutboundMessage::CreateEntity { entity } => {
            assert_eq!(entity.name, "pipe-to-ground");
            assert_eq!(entity.position, Position::new(3.5, -1.5));
            assert_eq!(entity.direction, Direction::South);
        }
        other => panic!("expected a creation, got {other:?}"),
    }
    match &messages[1] {
        OutboundMessage::DeleteEntity { entity } => {
            assert_eq!(entity.position, Position::new(3.0, -2.0));
        }
        other => panic!("expected a deletion, got {other:?}"),
    }
    assert!(matches!(messages[2], OutboundMessage::CreateEntity { .. }));
}

#[test]
fn test_peer_updates_are_not_echoed() {
    let (mut editor, recorder) = connected(EditorSettings::default());
    let raw = r#"{"event":"updateEntity","data":{"entities":[
        {"name":"stone-furnace","x":10,"y":10},
        {"name":"pipe","x":20.5,"y":20.5,"direction":2}
    ]}}"#;
    editor.handle_inbound(serde_json::from_str::<InboundMessage>(raw).unwrap());

    let store = editor.store();
    assert_eq!(store.entity_count(), 2);
    let furnace = store.entity_at(CellCoord::new(2009, 2009)).unwrap();
    assert_eq!(furnace.name, "stone_furnace");
    assert_eq!(furnace.position, Position::new(2010.0, 2010.0));
    assert_eq!(
        store.entity_at(CellCoord::new(2020, 2020)).map(|e| e.direction),
        Some(Direction::East)
    );

    let raw = r#"{"event":"updateEntity","data":{"entities":[
        {"name":"deleted","x":10,"y":10},
        {"name":"deleted","x":50,"y":50}
    ]}}"#;
    editor.handle_inbound(serde_json::from_str::<InboundMessage>(raw).unwrap());
    assert_eq!(editor.store().entity_count(), 1);
    assert!(editor.store().entity_at(CellCoord::new(2009, 2009)).is_none());

    assert!(sent(&recorder).is_empty());
}

#[test]
fn test_peer_failures_do_not_block_edits() {
    let (mut editor, recorder) = connected(EditorSettings::default());
    recorder.lock().unwrap().offline = true;
    editor
        .create_entity(EntityDescriptor::new(PIPE, Position::new(2000.5, 2000.5)))
        .unwrap();
    assert_eq!(editor.store().entity_count(), 1);

    let refresh = editor.refresh_chunks(Position::new(2000.5, 2000.5));
    assert_eq!(refresh.loaded, 0);
    assert!(editor.chunks().loaded_chunks().is_empty());
}

#[test]
fn test_chunks_load_evict_and_reload_from_cache() {
    let settings = EditorSettings {
        chunk_load_span: 2,
        chunk_keep_margin: 1,
        ..EditorSettings::default()
    };
    let (mut editor, recorder) = connected(settings);

    let home = Position::new(2000.5, 2000.5);
    let refresh = editor.refresh_chunks(home);
    assert_eq!(
        refresh,
        ChunkRefresh {
            requested: 4,
            loaded: 4,
            evicted: 0
        }
    );
    assert_eq!(editor.store().entity_count(), 4);
    assert!(editor.chunks().is_loaded(ChunkCoord::new(1, 1)));

    // Four chunks east: the home block falls outside the keep margin.
    let away = Position::new(2000.5 + 4.0 * 32.0, 2000.5);
    let refresh = editor.refresh_chunks(away);
    assert_eq!(refresh.requested, 4);
    assert_eq!(refresh.evicted, 4);
    assert_eq!(editor.store().entity_count(), 4);
    assert!(editor.chunks().is_cached(ChunkCoord::new(0, 0)));
    assert!(!editor.chunks().is_loaded(ChunkCoord::new(0, 0)));

    let refresh = editor.refresh_chunks(home);
    assert_eq!(
        refresh,
        ChunkRefresh {
            requested: 0,
            loaded: 4,
            evicted: 4
        }
    );
    assert!(editor
        .store()
        .entity_at(CellCoord::new(2000 + 32, 2000))
        .is_some());

    let recorder = recorder.lock().unwrap();
    assert_eq!(recorder.requests.len(), 8);
    assert!(recorder.sent.is_empty());
}
